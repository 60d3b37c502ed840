/// Compares a subscription filter against a published topic.
///
/// Returns `0` on a match and `1` on a mismatch; a missing or empty filter or
/// topic never matches. Filters are plain topics or end in `#`: a lone `#` matches every
/// topic, and `prefix/#` matches `prefix` itself and any topic below it. `+` has
/// no special meaning.
///
/// ```rust
/// use libiotc::mqtt::topic::match_topics;
///
/// assert_eq!(match_topics(Some("t/#"), Some("t/subfolder")), 0);
/// assert_eq!(match_topics(Some("t1/#"), Some("t2")), 1);
/// assert_eq!(match_topics(None, Some("short")), 1);
/// assert_eq!(match_topics(Some("#"), Some("")), 1);
/// ```
pub fn match_topics(filter: Option<&str>, topic: Option<&str>) -> u8 {
    match (filter, topic) {
        (Some(filter), Some(topic)) if topic_matches(filter, topic) => 0,
        _ => 1,
    }
}

/// `true` when `topic` is covered by `filter`. See [`match_topics`].
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    if filter.is_empty() || topic.is_empty() {
        return false;
    }
    if filter == "#" {
        return true;
    }
    match filter.strip_suffix("/#") {
        Some(prefix) => match topic.strip_prefix(prefix) {
            Some("") => true,
            Some(rest) => rest.starts_with('/'),
            None => false,
        },
        None => filter == topic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_topics() {
        assert!(topic_matches("a/b", "a/b"));
        assert!(!topic_matches("a/b", "a/c"));
        assert!(!topic_matches("a/b", "a/b/c"));
        assert!(!topic_matches("a/+", "a/b"));
    }

    #[test]
    fn test_multi_level_wildcard() {
        assert!(topic_matches("t/#", "t"));
        assert!(topic_matches("t/#", "t/x/y"));
        assert!(!topic_matches("t/#", "tx"));
        assert!(!topic_matches("#", ""));
        assert!(!topic_matches("", ""));
    }
}
