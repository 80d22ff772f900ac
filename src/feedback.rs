//! Launcher script-filter output and query filtering.

use serde::Serialize;
use std::collections::BTreeMap;

/// A single row shown by the launcher.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Item {
  pub title: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub subtitle: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub arg: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub autocomplete: Option<String>,
  pub valid: bool,
  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub variables: BTreeMap<String, String>,
}

impl Item {
  pub fn new(title: impl Into<String>) -> Self {
    Self {
      title: title.into(),
      ..Self::default()
    }
  }

  pub fn subtitle(mut self, subtitle: impl Into<String>) -> Self {
    self.subtitle = Some(subtitle.into());
    self
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.arg = Some(arg.into());
    self
  }

  pub fn autocomplete(mut self, autocomplete: impl Into<String>) -> Self {
    self.autocomplete = Some(autocomplete.into());
    self
  }

  pub fn valid(mut self, valid: bool) -> Self {
    self.valid = valid;
    self
  }

  pub fn var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.variables.insert(key.into(), value.into());
    self
  }
}

/// The full response printed to stdout.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Feedback {
  pub items: Vec<Item>,
}

impl Feedback {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, item: Item) {
    self.items.push(item);
  }

  /// A response made of one alert row.
  pub fn failure(message: impl Into<String>) -> Self {
    Self {
      items: vec![Item::new("Failure").subtitle(message)],
    }
  }

  /// Keep only items whose title matches `query`, best matches first.
  ///
  /// Ranking, case-insensitive: exact title, title prefix, word prefix,
  /// substring. Items with equal rank keep their original order.
  pub fn filter(&mut self, query: &str) {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
      return;
    }

    let mut ranked: Vec<(u32, Item)> = std::mem::take(&mut self.items)
      .into_iter()
      .filter_map(|item| match_rank(&item.title, &query).map(|rank| (rank, item)))
      .collect();

    // Stable sort keeps the remote ordering within a rank
    ranked.sort_by_key(|(rank, _)| *rank);

    self.items = ranked.into_iter().map(|(_, item)| item).collect();
  }

  /// Show a placeholder row when there is nothing to show.
  pub fn warn_empty(&mut self, title: &str, subtitle: &str) {
    if self.items.is_empty() {
      self.items.push(Item::new(title).subtitle(subtitle));
    }
  }

  pub fn to_json(&self) -> String {
    // Only strings, bools and maps of strings: serialization cannot fail
    serde_json::to_string(self).unwrap_or_else(|_| r#"{"items":[]}"#.to_string())
  }
}

fn match_rank(title: &str, query: &str) -> Option<u32> {
  let title = title.to_lowercase();

  if title == query {
    return Some(0);
  }

  if title.starts_with(query) {
    return Some(1);
  }

  if title
    .split(|c: char| !c.is_alphanumeric())
    .any(|word| word.starts_with(query))
  {
    return Some(2);
  }

  if title.contains(query) {
    return Some(3);
  }

  None
}

#[cfg(test)]
mod tests {
  use super::*;

  fn feedback(titles: &[&str]) -> Feedback {
    Feedback {
      items: titles.iter().map(|t| Item::new(*t)).collect(),
    }
  }

  fn titles(feedback: &Feedback) -> Vec<&str> {
    feedback.items.iter().map(|i| i.title.as_str()).collect()
  }

  #[test]
  fn test_empty_query_keeps_all() {
    let mut fb = feedback(&["Run", "Open", "main"]);
    fb.filter("  ");
    assert_eq!(titles(&fb), vec!["Run", "Open", "main"]);
  }

  #[test]
  fn test_exact_match_first() {
    let mut fb = feedback(&["main-hotfix", "release/main", "main"]);
    fb.filter("main");
    assert_eq!(titles(&fb), vec!["main", "main-hotfix", "release/main"]);
  }

  #[test]
  fn test_prefix_match() {
    let mut fb = feedback(&["Open", "Run", "running-tests"]);
    fb.filter("RUN");
    assert_eq!(titles(&fb), vec!["Run", "running-tests"]);
  }

  #[test]
  fn test_fuzzy_match() {
    let mut fb = feedback(&["feature/cache", "bugfix", "main"]);
    fb.filter("ach");
    assert_eq!(titles(&fb), vec!["feature/cache"]);
  }

  #[test]
  fn test_warn_empty_only_when_empty() {
    let mut fb = Feedback::new();
    fb.warn_empty("Empty", "No Issues");
    assert_eq!(titles(&fb), vec!["Empty"]);
    assert!(!fb.items[0].valid);

    let mut fb = feedback(&["a"]);
    fb.warn_empty("Empty", "No Issues");
    assert_eq!(titles(&fb), vec!["a"]);
  }

  #[test]
  fn test_json_shape() {
    let mut fb = Feedback::new();
    fb.push(
      Item::new("main")
        .subtitle("success")
        .var("pipeline_id", "812")
        .valid(true),
    );
    fb.push(Item::new("Empty"));

    let value: serde_json::Value = serde_json::from_str(&fb.to_json()).unwrap();
    assert_eq!(
      value,
      serde_json::json!({
        "items": [
          {
            "title": "main",
            "subtitle": "success",
            "valid": true,
            "variables": {"pipeline_id": "812"}
          },
          {"title": "Empty", "valid": false}
        ]
      })
    );
  }

  #[test]
  fn test_failure_is_single_alert() {
    let fb = Feedback::failure("Rate limit exceeded");
    assert_eq!(fb.items.len(), 1);
    assert_eq!(fb.items[0].title, "Failure");
    assert_eq!(fb.items[0].subtitle.as_deref(), Some("Rate limit exceeded"));
  }
}
