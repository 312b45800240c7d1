//! Reflection registry
//!
//! Compiled code publishes one field table per aggregate definition at load time.
//! The registry is append-only for the life of the process: entries are never
//! replaced, deduplicated or removed, so snapshots handed out earlier stay valid.
//!
//! Field annotations (`I64 x format "%d" data 5;`) arrive as one string and are
//! split into `key value` pairs once, at registration.

pub mod hash;

pub use hash::{
    ClassEntry, FunctionEntry, HashEntry, HashKind, HashTables, NativeFn, Symbol, HTT_CLASS,
    HTT_FUNCTION,
};

use std::ops::Range;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

/// One `key value` annotation attached to a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaEntry {
    pub key: String,
    /// Empty when the key carries no value.
    pub value: String,
}

/// Immutable description of one aggregate field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    aggregate: String,
    field: String,
    ty: String,
    annotations: String,
    meta: Vec<MetaEntry>,
}

impl FieldDescriptor {
    pub fn new(
        aggregate: impl Into<String>,
        field: impl Into<String>,
        ty: impl Into<String>,
        annotations: impl Into<String>,
    ) -> Self {
        let annotations = annotations.into();
        let meta = parse_annotations(&annotations);
        Self {
            aggregate: aggregate.into(),
            field: field.into(),
            ty: ty.into(),
            annotations,
            meta,
        }
    }

    #[inline]
    pub fn aggregate(&self) -> &str {
        &self.aggregate
    }

    #[inline]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[inline]
    pub fn ty(&self) -> &str {
        &self.ty
    }

    /// Raw annotation text as published.
    #[inline]
    pub fn annotations(&self) -> &str {
        &self.annotations
    }

    /// Parsed annotations in source order.
    #[inline]
    pub fn meta(&self) -> &[MetaEntry] {
        &self.meta
    }
}

/// Split annotation text into `key value` pairs.
///
/// Tokens are whitespace separated; double-quoted tokens may contain spaces and
/// keep their escapes verbatim. A trailing key without a value maps to `""`.
pub fn parse_annotations(text: &str) -> Vec<MetaEntry> {
    let tokens = tokenize_annotations(text);
    tokens
        .chunks(2)
        .map(|pair| MetaEntry {
            key: pair[0].clone(),
            value: pair.get(1).cloned().unwrap_or_default(),
        })
        .collect()
}

fn tokenize_annotations(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let mut token = String::new();
        if c == '"' {
            chars.next();
            let mut escaped = false;
            for c in chars.by_ref() {
                if escaped {
                    token.push(c);
                    escaped = false;
                } else if c == '\\' {
                    token.push(c);
                    escaped = true;
                } else if c == '"' {
                    break;
                } else {
                    token.push(c);
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                token.push(c);
                chars.next();
            }
        }
        tokens.push(token);
    }

    tokens
}

/// Look up the value of annotation `key` on `member`.
pub fn member_meta_data<'a>(
    key: &str,
    member: &'a FieldDescriptor,
) -> Option<&'a str> {
    member_meta_find(key, member).map(|entry| entry.value.as_str())
}

/// Look up the annotation entry `key` on `member`.
pub fn member_meta_find<'a>(
    key: &str,
    member: &'a FieldDescriptor,
) -> Option<&'a MetaEntry> {
    member.meta.iter().find(|entry| entry.key == key)
}

/// Process-wide, append-only table of field descriptors.
#[derive(Debug, Default)]
pub struct ReflectionRegistry {
    fields: RwLock<Vec<Arc<FieldDescriptor>>>,
}

impl ReflectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one aggregate's fields; returns the positions they occupy.
    ///
    /// Concurrent registrations are serialized; each table stays contiguous.
    pub fn register_table(
        &self,
        fields: impl IntoIterator<Item = FieldDescriptor>,
    ) -> Range<usize> {
        let mut table = self.fields.write();
        let start = table.len();
        table.extend(fields.into_iter().map(Arc::new));
        let end = table.len();
        debug!(start, end, "registered reflection table");
        start..end
    }

    /// Number of descriptors published so far.
    pub fn field_count(&self) -> usize {
        self.fields.read().len()
    }

    /// Snapshot of every descriptor in registration order.
    pub fn fields(&self) -> Vec<Arc<FieldDescriptor>> {
        self.fields.read().clone()
    }

    /// Descriptor at `index`, if published.
    pub fn field(
        &self,
        index: usize,
    ) -> Option<Arc<FieldDescriptor>> {
        self.fields.read().get(index).cloned()
    }

    /// Members of `aggregate`, in registration order, across all its tables.
    pub fn aggregate_fields(
        &self,
        aggregate: &str,
    ) -> Vec<Arc<FieldDescriptor>> {
        self.fields
            .read()
            .iter()
            .filter(|field| field.aggregate == aggregate)
            .cloned()
            .collect()
    }
}
