//! Pattern extraction from message text
//!
//! Pure functions over text: issue keys (`ABC-123` shapes) and user
//! mentions (`<@U…>`). No I/O, no state.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static ISSUE_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{2,}-\d+\b").expect("issue key pattern is valid"));

static USER_MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@(U[A-Z0-9]+)>").expect("mention pattern is valid"));

/// Issue keys in `text`, deduped, first-occurrence order preserved
pub fn extract_issue_keys(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    ISSUE_KEY_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .filter(|key| seen.insert(key.clone()))
        .collect()
}

/// User ids mentioned in `text`, deduped, first-occurrence order preserved
pub fn extract_user_mentions(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    USER_MENTION_RE
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Replace each `<@Uxxxx>` with `@<display name>` when the id is known;
/// unknown mentions keep their literal form.
pub fn resolve_user_mentions(text: &str, users: &HashMap<String, String>) -> String {
    USER_MENTION_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            match users.get(&caps[1]) {
                Some(name) => format!("@{name}"),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
