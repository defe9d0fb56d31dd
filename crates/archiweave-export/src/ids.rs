//! Exchange-format identifier mapping.
//!
//! The exchange schema constrains `identifier` attributes to an NCName-like
//! alphabet, while report identities are arbitrary strings. Source ids that do
//! not conform are remapped deterministically; the mapping is one-to-one and
//! stable for the lifetime of the mapper (one mapper per serialized document,
//! assignments in emission order), so the same source identity always lands on
//! the same output identity.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;

#[derive(Debug, Default)]
pub struct IdMapper {
    map: IndexMap<String, String>,
    used: FxHashSet<String>,
}

impl IdMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps a source identity, assigning a conformant output identity on first
    /// sight. Distinct sources that sanitize to the same candidate get a stable
    /// numeric suffix in assignment order.
    pub fn assign(&mut self, raw: &str) -> String {
        if let Some(mapped) = self.map.get(raw) {
            return mapped.clone();
        }

        let base = sanitize_identifier(raw);
        let mut candidate = base.clone();
        let mut n = 2usize;
        while !self.used.insert(candidate.clone()) {
            candidate = format!("{base}-{n}");
            n += 1;
        }
        self.map.insert(raw.to_string(), candidate.clone());
        candidate
    }

    pub fn get(&self, raw: &str) -> Option<&str> {
        self.map.get(raw).map(String::as_str)
    }

    /// Marks an output identity as taken without binding it to a source, so
    /// fixed document-level identifiers can never be shadowed by a remapping.
    pub fn reserve(&mut self, identifier: &str) {
        self.used.insert(identifier.to_string());
    }
}

/// Reduces an arbitrary identity to the exchange format's identifier alphabet:
/// ASCII alphanumerics plus `-`, `_` and `.`, starting with a letter or `_`.
pub fn sanitize_identifier(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "id".to_string();
    }

    let mut out = String::with_capacity(trimmed.len() + 3);
    for ch in trimmed.chars() {
        let ok = ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.';
        out.push(if ok { ch } else { '-' });
    }

    let starts_ok = out
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if starts_ok {
        out
    } else {
        format!("id-{out}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conformant_ids_pass_through() {
        assert_eq!(sanitize_identifier("id-81fe4c5a"), "id-81fe4c5a");
    }

    #[test]
    fn offending_characters_are_replaced_and_prefixed() {
        assert_eq!(sanitize_identifier("42 actors/main"), "id-42-actors-main");
        assert_eq!(sanitize_identifier("  "), "id");
    }

    #[test]
    fn reserved_identifiers_are_never_assigned() {
        let mut mapper = IdMapper::new();
        mapper.reserve("id-model");
        assert_eq!(mapper.assign("id-model"), "id-model-2");
    }

    #[test]
    fn mapping_is_stable_and_one_to_one() {
        let mut mapper = IdMapper::new();
        let a = mapper.assign("node a");
        let b = mapper.assign("node/a");
        let a_again = mapper.assign("node a");

        assert_eq!(a, a_again);
        assert_ne!(a, b);
        assert_eq!(a, "node-a");
        assert_eq!(b, "node-a-2");
    }
}
