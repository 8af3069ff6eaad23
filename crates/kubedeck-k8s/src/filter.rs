//! Name filtering for resource lists

use regex::Regex;

use kubedeck_types::ResourceSummary;

/// Compiled name filter for resource lists
///
/// Patterns are regular expressions; a pattern that fails to compile is
/// applied as a literal substring match instead, so partially typed input
/// still narrows the list.
#[derive(Clone, Debug)]
pub struct NameFilter {
    regex: Option<Regex>,
    pattern: String,
    case_insensitive: bool,
}

impl NameFilter {
    /// Create a filter; an empty pattern matches everything
    pub fn new(pattern: &str) -> Self {
        Self::build(pattern, false)
    }

    /// Create a case-insensitive filter
    pub fn new_case_insensitive(pattern: &str) -> Self {
        Self::build(pattern, true)
    }

    fn build(pattern: &str, case_insensitive: bool) -> Self {
        let regex = if pattern.is_empty() {
            None
        } else {
            let source = if case_insensitive {
                format!("(?i){}", pattern)
            } else {
                pattern.to_string()
            };
            Regex::new(&source).ok()
        };

        Self {
            regex,
            pattern: pattern.to_string(),
            case_insensitive,
        }
    }

    /// Check whether a name matches this filter
    pub fn matches(&self, name: &str) -> bool {
        if self.pattern.is_empty() {
            return true;
        }
        match &self.regex {
            Some(re) => re.is_match(name),
            None if self.case_insensitive => name
                .to_lowercase()
                .contains(&self.pattern.to_lowercase()),
            None => name.contains(&self.pattern),
        }
    }

    /// Keep only matching summaries, preserving order
    pub fn apply<'a>(&self, items: &'a [ResourceSummary]) -> Vec<&'a ResourceSummary> {
        items
            .iter()
            .filter(|item| self.matches(&item.name))
            .collect()
    }

    /// Get the original pattern
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Check if the filter matches everything
    pub fn is_empty(&self) -> bool {
        self.pattern.is_empty()
    }
}
