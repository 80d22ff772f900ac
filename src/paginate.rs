//! Collects a paged remote listing into a single ordered collection.

use color_eyre::{eyre::eyre, Result};
use std::future::Future;
use tracing::debug;

/// Index of the first page. GitLab pages are 1-based; page 0 is served as
/// page 1, which would duplicate the first page.
pub const FIRST_PAGE: u32 = 1;

/// Fetch every page of a listing for `scope`.
///
/// Pages are requested one at a time, in order, until a page comes back with
/// fewer than `page_size` items (an empty page included). The first error
/// aborts the whole aggregation and discards what was collected.
pub async fn fetch_all<'a, T, S, F, Fut>(
  scope: &'a S,
  page_size: u32,
  mut fetch_page: F,
) -> Result<Vec<T>>
where
  S: ?Sized,
  F: FnMut(&'a S, u32, u32) -> Fut,
  Fut: Future<Output = Result<Vec<T>>>,
{
  if page_size == 0 {
    return Err(eyre!("Page size must be at least 1"));
  }

  let mut all_items = Vec::new();
  let mut page = FIRST_PAGE;

  loop {
    let items = fetch_page(scope, page, page_size).await?;
    let count = items.len();
    all_items.extend(items);

    debug!(page, count, total = all_items.len(), "fetched page");

    // A short page is the end of the stream
    if count < page_size as usize {
      break;
    }
    page += 1;
  }

  Ok(all_items)
}
