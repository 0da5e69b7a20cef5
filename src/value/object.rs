use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use dashmap::DashMap;
use log::trace;

use crate::value::Value;

/// How an [`Object`] behaves under iteration, truthiness and `contains`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// Named members; always true, not iterable.
    Struct,
    /// Indexed elements.
    Seq,
    /// String-keyed entries.
    Map,
}

/// Capability through which templates see host aggregates.
///
/// Implement it by hand, derive it with `#[derive(Object)]`, or let
/// [`Value::from_serialize`] build a [`Record`] for any `Serialize` type.
pub trait Object: fmt::Debug + Send + Sync {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Struct
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Field lookup for structs, key lookup for mappings.
    fn get_member(&self, _name: &str) -> Option<Value> {
        None
    }

    fn get_indexed(&self, _idx: usize) -> Option<Value> {
        None
    }

    fn len(&self) -> Option<usize> {
        None
    }

    /// Field names for structs, keys for mappings.
    fn keys(&self) -> Vec<String> {
        Vec::new()
    }

    /// The object's own stringifier, if it has one.
    fn render(&self) -> Option<String> {
        None
    }
}

/// Type name -> field name -> position of that field in a [`Record`].
///
/// Entries are written once and never overwritten.
pub(crate) struct FieldIndexCache {
    entries: DashMap<&'static str, HashMap<String, usize>>,
}

pub(crate) static FIELD_INDEX_CACHE: LazyLock<FieldIndexCache> =
    LazyLock::new(|| FieldIndexCache {
        entries: DashMap::new(),
    });

impl FieldIndexCache {
    pub(crate) fn get(&self, type_name: &'static str, field: &str) -> Option<usize> {
        self.entries
            .get(type_name)
            .and_then(|fields| fields.get(field).copied())
    }

    pub(crate) fn insert(&self, type_name: &'static str, field: &str, idx: usize) {
        self.entries
            .entry(type_name)
            .or_default()
            .entry(field.to_string())
            .or_insert(idx);
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, type_name: &'static str, field: &str) -> bool {
        self.get(type_name, field).is_some()
    }
}

/// A struct captured through serde: type name plus ordered named fields.
#[derive(Debug, Clone)]
pub struct Record {
    type_name: &'static str,
    fields: Vec<(&'static str, Value)>,
}

impl Record {
    pub fn new(type_name: &'static str, fields: Vec<(&'static str, Value)>) -> Self {
        Self { type_name, fields }
    }

    fn field_index(&self, name: &str) -> Option<usize> {
        if let Some(idx) = FIELD_INDEX_CACHE.get(self.type_name, name) {
            // skip_serializing_if can shift positions between instances of one type
            if self.fields.get(idx).is_some_and(|(field, _)| *field == name) {
                trace!("field index cache hit: {}.{}", self.type_name, name);
                return Some(idx);
            }
            return self.fields.iter().position(|(field, _)| *field == name);
        }

        let idx = self.fields.iter().position(|(field, _)| *field == name)?;
        FIELD_INDEX_CACHE.insert(self.type_name, name, idx);
        Some(idx)
    }
}

impl Object for Record {
    fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn get_member(&self, name: &str) -> Option<Value> {
        self.field_index(name).map(|idx| self.fields[idx].1.clone())
    }

    fn keys(&self) -> Vec<String> {
        self.fields.iter().map(|(name, _)| name.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_member_lookup_populates_cache() {
        let record = Record::new(
            "CacheProbe",
            vec![("a", Value::from(1)), ("b", Value::from("two"))],
        );
        assert!(!FIELD_INDEX_CACHE.contains("CacheProbe", "b"));
        assert_eq!(record.get_member("b").map(|v| v.to_string()), Some("two".into()));
        assert!(FIELD_INDEX_CACHE.contains("CacheProbe", "b"));
        assert_eq!(record.get_member("b").map(|v| v.to_string()), Some("two".into()));
        assert!(record.get_member("c").is_none());
    }

    #[test]
    fn test_record_with_shifted_fields_still_resolves() {
        let full = Record::new(
            "ShiftProbe",
            vec![("x", Value::from(1)), ("y", Value::from(2))],
        );
        assert_eq!(full.get_member("y").map(|v| v.to_integer()), Some(2));

        // same type, first field skipped during serialization
        let partial = Record::new("ShiftProbe", vec![("y", Value::from(3))]);
        assert_eq!(partial.get_member("y").map(|v| v.to_integer()), Some(3));
        // the cached entry is never overwritten
        assert_eq!(FIELD_INDEX_CACHE.get("ShiftProbe", "y"), Some(1));
    }

    #[test]
    fn test_cache_is_write_once() {
        FIELD_INDEX_CACHE.insert("OnceProbe", "f", 0);
        FIELD_INDEX_CACHE.insert("OnceProbe", "f", 5);
        assert_eq!(FIELD_INDEX_CACHE.get("OnceProbe", "f"), Some(0));
    }
}
