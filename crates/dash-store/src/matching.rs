//! Conversation id matching with progressively looser fallbacks.
//!
//! Ids come from phone numbers typed or pasted by people, so stored ids
//! and requested ids often differ only in whitespace. Lookups try an exact
//! match first, then a trimmed match, then a pattern that ignores all
//! whitespace between characters.

use regex::Regex;

pub struct GroupMatcher {
    exact: String,
    trimmed: String,
    pattern: Option<Regex>,
}

impl GroupMatcher {
    pub fn new(id: &str) -> Self {
        let trimmed = id.trim().to_string();
        let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
        let pattern = if compact.is_empty() {
            None
        } else {
            let body = compact
                .chars()
                .map(|c| regex::escape(&c.to_string()))
                .collect::<Vec<_>>()
                .join(r"\s*");
            Regex::new(&format!(r"^\s*{}\s*$", body)).ok()
        };
        Self {
            exact: id.to_string(),
            trimmed,
            pattern,
        }
    }

    /// Select the items whose key matches, using the first tier that matches anything.
    pub fn select<'a, T, F>(&self, items: &'a [T], key: F) -> Vec<&'a T>
    where
        F: Fn(&T) -> &str,
    {
        let exact: Vec<&T> = items.iter().filter(|i| key(i) == self.exact).collect();
        if !exact.is_empty() {
            return exact;
        }

        let trimmed: Vec<&T> = items
            .iter()
            .filter(|i| key(i).trim() == self.trimmed)
            .collect();
        if !trimmed.is_empty() {
            return trimmed;
        }

        match &self.pattern {
            Some(re) => items.iter().filter(|i| re.is_match(key(i))).collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn pick(query: &str, items: &[String]) -> Vec<String> {
        GroupMatcher::new(query)
            .select(items, |s| s.as_str())
            .into_iter()
            .cloned()
            .collect()
    }

    #[test]
    fn test_exact_match_wins() {
        let items = ids(&["966500000001", " 966500000001 "]);
        assert_eq!(pick("966500000001", &items), ids(&["966500000001"]));
    }

    #[test]
    fn test_trimmed_fallback() {
        let items = ids(&[" 966500000001 ", "966500000002"]);
        assert_eq!(pick("966500000001", &items), ids(&[" 966500000001 "]));
        assert_eq!(pick("  966500000002", &items), ids(&["966500000002"]));
    }

    #[test]
    fn test_whitespace_tolerant_fallback() {
        let items = ids(&["966 50 000 0001", "966500000002"]);
        assert_eq!(pick("966500000001", &items), ids(&["966 50 000 0001"]));
        assert_eq!(pick("9665 0000 0002", &items), ids(&["966500000002"]));
    }

    #[test]
    fn test_pattern_escapes_metacharacters() {
        let items = ids(&["a.b", "axb"]);
        assert_eq!(pick("a . b", &items), ids(&["a.b"]));
    }

    #[test]
    fn test_no_match() {
        let items = ids(&["966500000001"]);
        assert!(pick("966500000009", &items).is_empty());
        assert!(pick("   ", &items).is_empty());
    }
}
