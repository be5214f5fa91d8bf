//! Tag sets attached to metric points and metadata records.

use std::collections::BTreeMap;

use serde::Serialize;

/// Replaces whitespace runs and `:` with `_`.
///
/// Leading and trailing whitespace is dropped first, so `" eth0 "` stays
/// `eth0` rather than growing underscores.
pub fn sanitize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_space = false;

    for c in s.trim().chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        out.push(if c == ':' { '_' } else { c });
    }

    out
}

/// Key/value dimensions of a metric point.
///
/// Keys and values are sanitized on insertion. A `TagSet` is never mutated in
/// place after construction: the builder methods consume it and return a new
/// set. Ordering is by key, which gives structural equality and a stable
/// hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TagSet(BTreeMap<String, String>);

impl TagSet {
    /// Creates an empty tag set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a set with one more tag. An existing key is replaced.
    pub fn with(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.0
            .insert(sanitize(key.as_ref()), sanitize(value.as_ref()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns a copy of `self` with every tag of `defaults` whose key is not
    /// already present.
    pub fn merge_defaults(&self, defaults: &TagSet) -> TagSet {
        let mut merged = self.0.clone();
        for (k, v) in &defaults.0 {
            merged.entry(k.clone()).or_insert_with(|| v.clone());
        }
        TagSet(merged)
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(TagSet::new(), |tags, (k, v)| tags.with(k, v))
    }
}

impl std::fmt::Display for TagSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("Power Supply 1"), "Power_Supply_1");
        assert_eq!(sanitize("0:1"), "0_1");
        assert_eq!(sanitize("0:0:1"), "0_0_1");
        assert_eq!(sanitize("System  Board\tFan"), "System_Board_Fan");
        assert_eq!(sanitize("  eth0 "), "eth0");
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn test_tagset_sanitizes_keys_and_values() {
        let tags = TagSet::new().with("power supply", "PS 1:A");
        assert_eq!(tags.get("power_supply"), Some("PS_1_A"));
        assert!(!tags.contains_key("power supply"));
    }

    #[test]
    fn test_tagset_structural_equality() {
        let a = TagSet::new().with("dev", "sda").with("host", "web1");
        let b: TagSet = [("host", "web1"), ("dev", "sda")].into_iter().collect();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "{dev=sda,host=web1}");
    }

    #[test]
    fn test_merge_defaults_keeps_explicit_tags() {
        let defaults = TagSet::new().with("host", "web1").with("dc", "ams");
        let tags = TagSet::new().with("host", "override");

        let merged = tags.merge_defaults(&defaults);
        assert_eq!(merged.get("host"), Some("override"));
        assert_eq!(merged.get("dc"), Some("ams"));
        // the original set is untouched
        assert_eq!(tags.len(), 1);
    }
}
