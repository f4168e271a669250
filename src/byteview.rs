//! Immutable byte payload wrapper
//!
//! Cached values are opaque byte snapshots. A [`ByteView`] is value-typed:
//! clones share no mutable state with the source buffer or with each other,
//! so a reader holding a view is unaffected by concurrent eviction.

use bytes::Bytes;

/// An immutable snapshot of a cached byte payload.
///
/// Construction takes ownership of the bytes; content never mutates
/// afterwards. Equality and hashing are by byte content.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ByteView {
    data: Bytes,
}

impl ByteView {
    /// Create a view over an owned byte payload.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the payload.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Owned copy of the payload, detached from the view.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }

    /// Text projection of the payload (lossy UTF-8).
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

impl std::fmt::Debug for ByteView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ByteView({} bytes)", self.data.len())
    }
}

impl From<Vec<u8>> for ByteView {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&str> for ByteView {
    fn from(text: &str) -> Self {
        Self::new(Bytes::copy_from_slice(text.as_bytes()))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byteview_len_and_content() {
        let view = ByteView::from("hello");
        assert_eq!(view.len(), 5);
        assert!(!view.is_empty());
        assert_eq!(view.as_slice(), b"hello");
        assert_eq!(view.to_string_lossy(), "hello");
    }

    #[test]
    fn test_byteview_equality_by_content() {
        let a = ByteView::new(vec![1u8, 2, 3]);
        let b = ByteView::new(vec![1u8, 2, 3]);
        let c = ByteView::new(vec![1u8, 2, 4]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_byteview_copy_does_not_alias_source() {
        let source = vec![1u8, 2, 3];
        let view = ByteView::new(source);

        let mut copy = view.to_vec();
        assert_eq!(copy, view.as_slice());

        // Mutating the copy leaves the view untouched
        copy[0] = 99;
        assert_eq!(view.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn test_byteview_clone_shares_content() {
        let view = ByteView::from("score");
        let clone = view.clone();
        assert_eq!(view, clone);
        assert_eq!(clone.to_string_lossy(), "score");
    }

    #[test]
    fn test_byteview_default_is_empty() {
        let view = ByteView::default();
        assert!(view.is_empty());
        assert_eq!(view.len(), 0);
    }
}
