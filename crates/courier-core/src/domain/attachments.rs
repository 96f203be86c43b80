//! Attachments - request-scoped key→value store.
//!
//! Cross-cutting extensions (interceptors, tracing, auth helpers) hang their
//! state off a descriptor without the descriptor knowing their types.
//!
//! ## Phantom Type パターン
//! `AttachmentKey<T>` は名前（opaque tag）と値の型を結びつけます。
//! 同じ名前で別の型を読もうとすると `None` になり、panic はしません。

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Typed tag that names one attachment slot.
///
/// ```ignore
/// const TRACE_ID: AttachmentKey<String> = AttachmentKey::new("trace-id");
/// descriptor.attachments_mut().insert(&TRACE_ID, "abc".to_string());
/// ```
pub struct AttachmentKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> AttachmentKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> fmt::Debug for AttachmentKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AttachmentKey").field(&self.name).finish()
    }
}

/// The store itself. Values are shared (`Arc`) so cloning a descriptor is cheap.
#[derive(Clone, Default)]
pub struct Attachments {
    values: HashMap<&'static str, Arc<dyn Any + Send + Sync>>,
}

impl Attachments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning whether a previous value was replaced.
    pub fn insert<T: Send + Sync + 'static>(&mut self, key: &AttachmentKey<T>, value: T) -> bool {
        self.values.insert(key.name, Arc::new(value)).is_some()
    }

    pub fn get<T: Send + Sync + 'static>(&self, key: &AttachmentKey<T>) -> Option<&T> {
        self.values
            .get(key.name)
            .and_then(|v| v.as_ref().downcast_ref::<T>())
    }

    pub fn remove<T: Send + Sync + 'static>(&mut self, key: &AttachmentKey<T>) -> bool {
        self.values.remove(key.name).is_some()
    }

    pub fn contains<T>(&self, key: &AttachmentKey<T>) -> bool {
        self.values.contains_key(key.name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Attachments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.values.keys().collect();
        keys.sort();
        f.debug_struct("Attachments").field("keys", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACE_ID: AttachmentKey<String> = AttachmentKey::new("trace-id");
    const RETRY_BUDGET: AttachmentKey<u32> = AttachmentKey::new("retry-budget");

    #[test]
    fn insert_and_get_roundtrip() {
        let mut store = Attachments::new();
        assert!(!store.insert(&TRACE_ID, "abc".to_string()));
        assert!(store.insert(&TRACE_ID, "def".to_string()));

        assert_eq!(store.get(&TRACE_ID).map(String::as_str), Some("def"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn mismatched_type_reads_none() {
        const SAME_NAME: AttachmentKey<u64> = AttachmentKey::new("trace-id");

        let mut store = Attachments::new();
        store.insert(&TRACE_ID, "abc".to_string());

        assert!(store.contains(&SAME_NAME));
        assert_eq!(store.get(&SAME_NAME), None);
    }

    #[test]
    fn clones_share_values_but_not_slots() {
        let mut store = Attachments::new();
        store.insert(&RETRY_BUDGET, 3);

        let mut cloned = store.clone();
        cloned.remove(&RETRY_BUDGET);

        assert_eq!(store.get(&RETRY_BUDGET), Some(&3));
        assert!(cloned.is_empty());
    }
}
