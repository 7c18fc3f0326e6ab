//! Qualified names
//!
//! Type names are written `assembly%namespace/name`. The namespace itself
//! may contain `/`, so the short name is everything after the last `/`.
//! Field names are written `Class.name` and split at the last `.`.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashSet;

/// Interned string pool shared by a vault
#[derive(Debug, Default)]
pub struct Interner {
    pool: FxHashSet<Arc<str>>,
}

impl Interner {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the pooled copy of `s`
    pub fn intern(&mut self, s: &str) -> Arc<str> {
        if let Some(existing) = self.pool.get(s) {
            return existing.clone();
        }
        let arc: Arc<str> = Arc::from(s);
        self.pool.insert(arc.clone());
        arc
    }

    /// Number of distinct strings
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    /// Whether the pool is empty
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }
}

/// Fully qualified type name
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedTypeName(Arc<str>);

impl QualifiedTypeName {
    /// Build from its parts
    pub fn new(assembly: &str, namespace: &str, name: &str) -> Self {
        Self(format!("{assembly}%{namespace}/{name}").into())
    }

    /// Wrap an already formatted full name
    pub fn from_full(full: impl Into<Arc<str>>) -> Self {
        Self(full.into())
    }

    /// Full `assembly%namespace/name` text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Assembly (module) part
    pub fn assembly(&self) -> &str {
        self.0.split_once('%').map_or("", |(asm, _)| asm)
    }

    /// `namespace/name` part
    pub fn name_with_ns(&self) -> &str {
        self.0.split_once('%').map_or(&*self.0, |(_, rest)| rest)
    }

    /// Namespace part
    pub fn namespace(&self) -> &str {
        let rest = self.name_with_ns();
        rest.rsplit_once('/').map_or("", |(ns, _)| ns)
    }

    /// Short name
    pub fn name(&self) -> &str {
        let rest = self.name_with_ns();
        rest.rsplit_once('/').map_or(rest, |(_, name)| name)
    }

    /// Whether `query` names this type by short name, `namespace/name` or full name
    pub fn matches(&self, query: &str) -> bool {
        self.name() == query || self.name_with_ns() == query || self.as_str() == query
    }
}

impl fmt::Display for QualifiedTypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for QualifiedTypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

/// Field name qualified by its owning class
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FieldName {
    class: Arc<str>,
    name: Arc<str>,
}

impl FieldName {
    /// Build from class and field name
    pub fn new(class: impl Into<Arc<str>>, name: impl Into<Arc<str>>) -> Self {
        Self {
            class: class.into(),
            name: name.into(),
        }
    }

    /// Split `Class.name` at the last `.`; text without a dot is a bare name
    pub fn parse(full: &str) -> Self {
        match full.rsplit_once('.') {
            Some((class, name)) => Self::new(class, name),
            None => Self::new("", full),
        }
    }

    /// Owning class part
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Field part
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.class.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}.{}", self.class, self.name)
        }
    }
}

impl fmt::Debug for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldName({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_name_parts() {
        let name = QualifiedTypeName::new("std", "std/collections", "List");
        assert_eq!(name.as_str(), "std%std/collections/List");
        assert_eq!(name.assembly(), "std");
        assert_eq!(name.namespace(), "std/collections");
        assert_eq!(name.name(), "List");
        assert_eq!(name.name_with_ns(), "std/collections/List");
        assert!(name.matches("List"));
        assert!(name.matches("std/collections/List"));
        assert!(!name.matches("collections/List"));
    }

    #[test]
    fn test_field_name_splits_at_last_dot() {
        let field = FieldName::parse("aspect/\\native/\\class/\\A.b._0");
        assert_eq!(field.class(), "aspect/\\native/\\class/\\A.b");
        assert_eq!(field.name(), "_0");
        assert_eq!(FieldName::parse("bare").to_string(), "bare");
    }

    #[test]
    fn test_interner_reuses_allocation() {
        let mut pool = Interner::new();
        let a = pool.intern("Object");
        let b = pool.intern("Object");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(pool.len(), 1);
    }
}
