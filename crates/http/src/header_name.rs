use crate::Error;
use smartstring::alias::String as SmartString;
use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

/// The name of an HTTP header.
///
/// Names are case-insensitive and stored lowercased; [`Display`]
/// renders them in `Kebab-Case`, so a name inserted as
/// `"content-type"` or `"CONTENT-TYPE"` serializes as
/// `Content-Type`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeaderName(SmartString);

pub(crate) fn is_tchar(c: u8) -> bool {
    matches!(
        c,
        b'a'..=b'z'
        | b'A'..=b'Z'
        | b'0'..=b'9'
        | b'!'
        | b'#'
        | b'$'
        | b'%'
        | b'&'
        | b'\''
        | b'*'
        | b'+'
        | b'-'
        | b'.'
        | b'^'
        | b'_'
        | b'`'
        | b'|'
        | b'~'
    )
}

impl HeaderName {
    /// construct a header name, lowercasing it for storage.
    ///
    /// prefer [`HeaderName::parse`] for untrusted input, which
    /// validates token characters.
    pub fn new(name: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        if name.bytes().any(|b| b.is_ascii_uppercase()) {
            Self(name.to_ascii_lowercase().into())
        } else {
            Self(name.into())
        }
    }

    /// parse and validate a header name from wire bytes
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.is_empty() || !bytes.iter().all(|&b| is_tchar(b)) {
            return Err(Error::InvalidHeaderName);
        }

        // token characters are always ascii
        let name = std::str::from_utf8(bytes).map_err(|_| Error::InvalidHeaderName)?;
        Ok(Self::new(name))
    }

    /// the lowercased representation of this header name
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// whether this name contains only valid token characters. Names
    /// built with [`HeaderName::parse`] are always valid; names built
    /// from strings may not be.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && self.0.bytes().all(is_tchar)
    }
}

impl Display for HeaderName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut at_word_start = true;
        for c in self.0.chars() {
            if at_word_start {
                write!(f, "{}", c.to_ascii_uppercase())?;
            } else {
                write!(f, "{c}")?;
            }
            at_word_start = c == '-';
        }
        Ok(())
    }
}

impl AsRef<str> for HeaderName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<&str> for HeaderName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for HeaderName {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl FromStr for HeaderName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s.as_bytes())
    }
}

impl PartialEq<str> for HeaderName {
    fn eq(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl PartialEq<&str> for HeaderName {
    fn eq(&self, other: &&str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

#[cfg(test)]
mod test {
    use super::HeaderName;

    #[test]
    fn normalization_is_case_insensitive_and_idempotent() {
        let a = HeaderName::new("Content-Type");
        let b = HeaderName::new("content-type");
        let c = HeaderName::new("CONTENT-TYPE");
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(HeaderName::new(a.as_str()), a);
        assert_eq!(a.as_str(), "content-type");
    }

    #[test]
    fn kebab_case_render() {
        assert_eq!(HeaderName::new("content-length").to_string(), "Content-Length");
        assert_eq!(HeaderName::new("etag").to_string(), "Etag");
        assert_eq!(
            HeaderName::new("x-forwarded-for").to_string(),
            "X-Forwarded-For"
        );
    }

    #[test]
    fn parse_rejects_non_tokens() {
        assert!(HeaderName::parse(b"valid-name").is_ok());
        assert!(HeaderName::parse(b"").is_err());
        assert!(HeaderName::parse(b"spaced name").is_err());
        assert!(HeaderName::parse(b"colon:name").is_err());
    }
}
