//! Sharding tags deciding which APIs a gateway serves.

use crate::error::{SyncError, SyncResult};
use std::collections::BTreeSet;

/// Parsed gateway sharding tags.
///
/// Entries are trimmed and compared case- and accent-insensitively. An entry
/// starting with `!` excludes the tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardingTags {
    inclusions: BTreeSet<String>,
    exclusions: BTreeSet<String>,
}

impl ShardingTags {
    /// Tags of a gateway accepting everything.
    pub fn none() -> Self {
        Self::default()
    }

    /// Parses tag entries. Each entry may hold several comma-separated tags.
    pub fn parse<S: AsRef<str>>(entries: impl IntoIterator<Item = S>) -> SyncResult<Self> {
        let mut tags = Self::default();
        for entry in entries {
            for raw in entry.as_ref().split(',') {
                let raw = raw.trim();
                if let Some(excluded) = raw.strip_prefix('!') {
                    let excluded = normalize(excluded);
                    if !excluded.is_empty() {
                        tags.exclusions.insert(excluded);
                    }
                } else {
                    let included = normalize(raw);
                    if !included.is_empty() {
                        tags.inclusions.insert(included);
                    }
                }
            }
        }
        if let Some(conflict) = tags.inclusions.intersection(&tags.exclusions).next() {
            return Err(SyncError::invalid_config(format!(
                "sharding tag '{conflict}' is both included and excluded"
            )));
        }
        Ok(tags)
    }

    /// Returns true if no tag is configured.
    pub fn is_empty(&self) -> bool {
        self.inclusions.is_empty() && self.exclusions.is_empty()
    }

    /// Returns true if an entity carrying `tags` belongs on this gateway.
    pub fn matches<S: AsRef<str>>(&self, tags: impl IntoIterator<Item = S>) -> bool {
        if self.is_empty() {
            return true;
        }
        let tags: BTreeSet<String> = tags
            .into_iter()
            .map(|t| normalize(t.as_ref()))
            .filter(|t| !t.is_empty())
            .collect();
        if tags.is_empty() {
            return self.inclusions.is_empty();
        }
        let included =
            self.inclusions.is_empty() || tags.iter().any(|t| self.inclusions.contains(t));
        let excluded = tags.iter().any(|t| self.exclusions.contains(t));
        included && !excluded
    }
}

fn normalize(tag: &str) -> String {
    tag.trim()
        .chars()
        .flat_map(char::to_lowercase)
        .map(fold_accent)
        .collect()
}

fn fold_accent(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(entries: &[&str]) -> ShardingTags {
        ShardingTags::parse(entries).unwrap()
    }

    #[test]
    fn tagless_gateway_accepts_everything() {
        assert!(ShardingTags::none().matches(["test"]));
        assert!(ShardingTags::none().matches(Vec::<String>::new()));
    }

    #[test]
    fn accepted_combinations() {
        assert!(tags(&["!test"]).matches(["toto"]));
        assert!(tags(&["test", "toto"]).matches(["test"]));
        assert!(tags(&["test", "toto"]).matches(["Test"]));
        assert!(tags(&["test", "toto"]).matches(["tést"]));
        assert!(tags(&["test"]).matches(["Tést"]));
        assert!(tags(&["test", "!toto"]).matches(["test"]));
        assert!(tags(&["test", " !toto"]).matches(["test"]));
        assert!(tags(&["test ", "!toto"]).matches(["test"]));
        assert!(tags(&[" test", "!toto"]).matches(["test"]));
        assert!(tags(&["test, !toto"]).matches(["test"]));
    }

    #[test]
    fn exclusion_wins_over_inclusion() {
        assert!(!tags(&["product", "!international"]).matches(["product", "international"]));
    }

    #[test]
    fn untagged_entity_needs_a_gateway_without_inclusions() {
        assert!(!tags(&["product"]).matches(Vec::<String>::new()));
        assert!(tags(&["!product"]).matches(Vec::<String>::new()));
    }

    #[test]
    fn non_matching_tag() {
        assert!(!tags(&["test"]).matches(["test2"]));
    }

    #[test]
    fn included_and_excluded_is_rejected() {
        assert!(ShardingTags::parse(["test,!test"]).is_err());
        assert!(ShardingTags::parse(["Test", "!tést"]).is_err());
    }
}
