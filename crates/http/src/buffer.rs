use std::ops::{Deref, DerefMut};

/// A reusable byte buffer with a consumed-prefix offset, so bytes can
/// be handed off from the front without shifting the allocation on
/// every read.
#[derive(Debug, Default)]
#[doc(hidden)]
pub struct Buffer {
    consumed: usize,
    bytes: Vec<u8>,
}

impl Buffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            consumed: 0,
            bytes: Vec::with_capacity(capacity),
        }
    }

    /// mark `n` bytes at the front as consumed. once everything is
    /// consumed the allocation is reset for reuse.
    pub fn ignore_front(&mut self, n: usize) {
        self.consumed += n;
        if self.consumed >= self.bytes.len() {
            self.bytes.truncate(0);
            self.consumed = 0;
        }
    }

    /// truncate the unconsumed region to `n` bytes
    pub fn truncate(&mut self, n: usize) {
        if n == 0 {
            self.consumed = 0;
            self.bytes.truncate(0);
        } else {
            self.bytes.truncate(self.consumed + n);
        }
    }

    pub fn extend_from_slice(&mut self, slice: &[u8]) {
        self.bytes.extend_from_slice(slice);
    }

    pub fn len(&self) -> usize {
        self.bytes.len() - self.consumed
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.len() == self.consumed
    }

    /// zero-fill up to capacity so the tail can be used as a read
    /// destination
    pub fn fill_capacity(&mut self) {
        self.bytes.resize(self.bytes.capacity(), 0);
    }

    /// grow (if full) and zero-fill, making room for the next read
    pub fn expand(&mut self) {
        if self.bytes.len() == self.bytes.capacity() {
            self.bytes.reserve(32);
        }
        self.fill_capacity();
    }
}

impl Deref for Buffer {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.bytes[self.consumed..]
    }
}

impl DerefMut for Buffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.bytes[self.consumed..]
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self { consumed: 0, bytes }
    }
}

impl From<Buffer> for Vec<u8> {
    fn from(mut buffer: Buffer) -> Self {
        buffer.bytes.copy_within(buffer.consumed.., 0);
        let len = buffer.bytes.len() - buffer.consumed;
        buffer.bytes.truncate(len);
        buffer.bytes
    }
}

#[cfg(test)]
mod test {
    use super::Buffer;

    #[test]
    fn front_consumption() {
        let mut buffer = Buffer::from(b"hello world".to_vec());
        buffer.ignore_front(6);
        assert_eq!(&*buffer, b"world");
        assert_eq!(buffer.len(), 5);
        buffer.ignore_front(5);
        assert!(buffer.is_empty());
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn expand_grows_when_full() {
        let mut buffer = Buffer::with_capacity(4);
        buffer.extend_from_slice(b"abcd");
        buffer.expand();
        assert!(buffer.len() > 4);
        assert_eq!(&buffer[..4], b"abcd");
    }
}
