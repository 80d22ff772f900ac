pub mod api_types;
pub mod cache;
pub mod cached_client;
pub mod client;
pub mod remote;
pub mod types;

#[cfg(test)]
pub mod testing;

pub use cached_client::CachedGitLabClient;
pub use client::GitLabClient;
pub use remote::RemoteClient;
