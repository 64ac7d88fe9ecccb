//! Metadata attached to every object and property.
//!
//! An ordered string-to-string mapping with a compact wire form. Two jobs:
//! schema identification (the `schema` key, matched by typed readers) and
//! free-form interpretation hints (`interpretation`, `geoScope`, ...).

use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;

/// Ordered key/value metadata.
///
/// Most entities carry at most a handful of entries, hence the inline
/// storage.
#[derive(Clone, Default, PartialEq)]
pub struct MetaData {
    entries: SmallVec<[(String, String); 4]>,
}

impl MetaData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, replacing an existing entry with the same key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        for (k, v) in &mut self.entries {
            if k == &key {
                *v = value;
                return;
            }
        }
        self.entries.push((key, value));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Wire form: `key=value;key2=value2` with `\`-escaped delimiters.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                out.push(';');
            }
            out.push_str(&escape(k));
            out.push('=');
            out.push_str(&escape(v));
        }
        out
    }

    /// Parse the wire form. Malformed fragments (no `=`, empty key) are
    /// skipped rather than rejected.
    pub fn parse(s: &str) -> Self {
        let mut meta = Self::new();
        if s.is_empty() {
            return meta;
        }
        for part in split_unescaped(s, b';') {
            if let Some(eq) = find_unescaped(part, b'=') {
                let key = unescape(&part[..eq]);
                let value = unescape(&part[eq + 1..]);
                if !key.is_empty() {
                    meta.set(key, value);
                }
            }
        }
        meta
    }

    /// Schema tag key.
    pub const SCHEMA_KEY: &'static str = "schema";
    /// Schema base type key.
    pub const SCHEMA_BASE_KEY: &'static str = "schemaBaseType";
    /// Interpretation hint key ("point", "vector", "rgb", ...).
    pub const INTERPRETATION_KEY: &'static str = "interpretation";

    pub fn schema(&self) -> Option<&str> {
        self.get(Self::SCHEMA_KEY)
    }

    pub fn set_schema(&mut self, tag: &str) {
        self.set(Self::SCHEMA_KEY, tag);
    }

    pub fn interpretation(&self) -> Option<&str> {
        self.get(Self::INTERPRETATION_KEY)
    }

    /// Does the `schema` tag equal `tag`?
    pub fn matches_schema(&self, tag: &str) -> bool {
        self.schema() == Some(tag)
    }
}

impl fmt::Debug for MetaData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

impl From<HashMap<String, String>> for MetaData {
    fn from(map: HashMap<String, String>) -> Self {
        let mut meta = Self::new();
        for (k, v) in map {
            meta.set(k, v);
        }
        meta
    }
}

impl FromIterator<(String, String)> for MetaData {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut meta = Self::new();
        for (k, v) in iter {
            meta.set(k, v);
        }
        meta
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            '=' => out.push_str("\\="),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some(&n @ ('\\' | ';' | '=')) => {
                    out.push(n);
                    chars.next();
                }
                _ => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Index of the first `ch` not preceded by an odd number of backslashes.
fn find_unescaped(s: &str, ch: u8) -> Option<usize> {
    let bytes = s.as_bytes();
    for i in 0..bytes.len() {
        if bytes[i] == ch && !is_escaped(bytes, i) {
            return Some(i);
        }
    }
    None
}

fn is_escaped(bytes: &[u8], i: usize) -> bool {
    let mut backslashes = 0;
    let mut j = i;
    while j > 0 && bytes[j - 1] == b'\\' {
        backslashes += 1;
        j -= 1;
    }
    backslashes % 2 == 1
}

fn split_unescaped(s: &str, ch: u8) -> Vec<&str> {
    let bytes = s.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    for i in 0..bytes.len() {
        if bytes[i] == ch && !is_escaped(bytes, i) {
            parts.push(&s[start..i]);
            start = i + 1;
        }
    }
    if start < s.len() {
        parts.push(&s[start..]);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic() {
        let mut meta = MetaData::new();
        meta.set("a", "1");
        meta.set("b", "2");
        assert_eq!(meta.get("a"), Some("1"));
        assert_eq!(meta.get("c"), None);
        assert_eq!(meta.len(), 2);
    }

    #[test]
    fn set_replaces() {
        let mut meta = MetaData::new();
        meta.set("k", "old");
        meta.set("k", "new");
        assert_eq!(meta.get("k"), Some("new"));
        assert_eq!(meta.len(), 1);
    }

    #[test]
    fn order_preserved() {
        let mut meta = MetaData::new();
        meta.set("z", "1");
        meta.set("a", "2");
        let keys: Vec<&str> = meta.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["z", "a"]);
    }

    #[test]
    fn wire_roundtrip() {
        let mut meta = MetaData::new();
        meta.set("schema", "AbcGeom_PolyMesh_v1");
        meta.set("interpretation", "point");
        let parsed = MetaData::parse(&meta.serialize());
        assert_eq!(parsed.schema(), Some("AbcGeom_PolyMesh_v1"));
        assert_eq!(parsed.interpretation(), Some("point"));
    }

    #[test]
    fn wire_roundtrip_escaped() {
        let mut meta = MetaData::new();
        meta.set("k=ey;1", "v\\al;ue=2");
        let parsed = MetaData::parse(&meta.serialize());
        assert_eq!(parsed.get("k=ey;1"), Some("v\\al;ue=2"));
    }

    #[test]
    fn schema_matching() {
        let mut meta = MetaData::new();
        meta.set_schema("AbcGeom_Xform_v3");
        assert!(meta.matches_schema("AbcGeom_Xform_v3"));
        assert!(!meta.matches_schema("AbcGeom_PolyMesh_v1"));
    }
}
