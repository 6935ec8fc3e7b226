// src/cache/message.rs
//! The in-core response message: a growable, append-only byte buffer with a
//! completion flag.
//!
//! Unlike [`crate::buffer::Buffer`], which tracks a single shared read/write
//! position, a `ResponseMessage` is written by exactly one producer and read
//! independently by any number of subscribers, each tracking its own cursor
//! externally (see [`super::entry::CacheEntry`]).

use zeroize::Zeroize;

/// The upstream response bytes accumulated so far, plus a completion flag.
///
/// Securely zeroized on drop, matching the rest of the buffer layer's
/// security discipline: proxied response bodies may carry session cookies or
/// bearer tokens that should not linger in freed heap memory once an entry is
/// evicted.
#[derive(Clone)]
pub struct ResponseMessage {
    bytes: Vec<u8>,
    complete: bool,
}

impl ResponseMessage {
    /// Creates a response message from an initial (possibly empty, possibly
    /// partial) byte slice.
    pub fn new(initial: &[u8]) -> Self {
        Self {
            bytes: initial.to_vec(),
            complete: false,
        }
    }

    /// Creates an empty, incomplete response message.
    pub fn empty() -> Self {
        Self::new(&[])
    }

    /// Appends bytes. Producer-only; must not be called after [`Self::mark_complete`].
    ///
    /// # Panics
    ///
    /// Panics (debug-only) if called after the message was marked complete —
    /// a hard invariant violation by the producer, not a recoverable runtime
    /// condition.
    pub fn append(&mut self, chunk: &[u8]) {
        debug_assert!(!self.complete, "append() called after mark_complete()");
        self.bytes.extend_from_slice(chunk);
    }

    /// Marks the response complete. Producer-only; idempotent.
    pub fn mark_complete(&mut self) {
        self.complete = true;
    }

    /// Whether the response has been fully received.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Total bytes accumulated so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether no bytes have been accumulated yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// All bytes accumulated so far.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Bytes from `cursor` onward, or `None` if `cursor` is past the end.
    pub fn bytes_from(&self, cursor: usize) -> Option<&[u8]> {
        if cursor > self.bytes.len() {
            None
        } else {
            Some(&self.bytes[cursor..])
        }
    }
}

impl Drop for ResponseMessage {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_complete() {
        let mut msg = ResponseMessage::empty();
        assert!(!msg.is_complete());
        msg.append(b"hello ");
        msg.append(b"world");
        assert_eq!(msg.as_slice(), b"hello world");
        msg.mark_complete();
        assert!(msg.is_complete());
    }

    #[test]
    fn test_bytes_from_cursor() {
        let mut msg = ResponseMessage::empty();
        msg.append(b"0123456789");
        assert_eq!(msg.bytes_from(0).unwrap(), b"0123456789");
        assert_eq!(msg.bytes_from(5).unwrap(), b"56789");
        assert_eq!(msg.bytes_from(10).unwrap(), b"");
        assert!(msg.bytes_from(11).is_none());
    }

    #[test]
    fn test_initial_partial_response() {
        let msg = ResponseMessage::new(b"partial");
        assert_eq!(msg.len(), 7);
        assert!(!msg.is_complete());
    }
}
