use smartstring::alias::String as SmartString;
use std::fmt::{self, Debug, Display, Formatter};

/// A header value. Usually utf8, but arbitrary bytes are preserved
/// for the rare header that carries them.
#[derive(Clone, PartialEq, Eq)]
pub struct HeaderValue(Inner);

#[derive(Clone, PartialEq, Eq)]
enum Inner {
    Utf8(SmartString),
    Bytes(Vec<u8>),
}

impl HeaderValue {
    /// construct a header value from wire bytes, preserving them
    /// as-is when they are not utf8
    pub fn parse(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(s) => Self(Inner::Utf8(s.into())),
            Err(_) => Self(Inner::Bytes(bytes.to_vec())),
        }
    }

    /// a &str representation, if this value is utf8
    pub fn as_str(&self) -> Option<&str> {
        match &self.0 {
            Inner::Utf8(s) => Some(s),
            Inner::Bytes(_) => None,
        }
    }

    /// a header value is writable to the wire if it contains no line
    /// breaks
    pub fn is_valid(&self) -> bool {
        !self.as_ref().iter().any(|b| matches!(b, b'\r' | b'\n'))
    }
}

impl AsRef<[u8]> for HeaderValue {
    fn as_ref(&self) -> &[u8] {
        match &self.0 {
            Inner::Utf8(s) => s.as_bytes(),
            Inner::Bytes(b) => b,
        }
    }
}

impl Display for HeaderValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Inner::Utf8(s) => f.write_str(s),
            Inner::Bytes(b) => write!(f, "{}", String::from_utf8_lossy(b)),
        }
    }
}

impl Debug for HeaderValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Inner::Utf8(s) => Debug::fmt(s, f),
            Inner::Bytes(b) => write!(f, "{b:?}"),
        }
    }
}

impl From<&'static str> for HeaderValue {
    fn from(value: &'static str) -> Self {
        Self(Inner::Utf8(value.into()))
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        Self(Inner::Utf8(value.into()))
    }
}

impl From<Vec<u8>> for HeaderValue {
    fn from(value: Vec<u8>) -> Self {
        Self::parse(&value)
    }
}

impl From<&[u8]> for HeaderValue {
    fn from(value: &[u8]) -> Self {
        Self::parse(value)
    }
}

impl From<u64> for HeaderValue {
    fn from(value: u64) -> Self {
        Self(Inner::Utf8(value.to_string().into()))
    }
}

impl From<usize> for HeaderValue {
    fn from(value: usize) -> Self {
        Self(Inner::Utf8(value.to_string().into()))
    }
}

impl PartialEq<&str> for HeaderValue {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

#[cfg(test)]
mod test {
    use super::HeaderValue;

    #[test]
    fn utf8_and_bytes() {
        let utf8 = HeaderValue::from("text/plain");
        assert_eq!(utf8.as_str(), Some("text/plain"));
        assert!(utf8.is_valid());

        let bytes = HeaderValue::parse(&[0xff, 0xfe]);
        assert_eq!(bytes.as_str(), None);
        assert_eq!(bytes.as_ref(), &[0xff, 0xfe]);
    }

    #[test]
    fn line_breaks_are_invalid() {
        assert!(!HeaderValue::from("evil\r\nInjected: yes").is_valid());
        assert!(HeaderValue::from("benign").is_valid());
    }
}
