use crate::Error;
use std::{fmt::Display, str::FromStr};

/// HTTP request methods.
///
/// See [rfc 9110](https://httpwg.org/specs/rfc9110.html#methods)
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[non_exhaustive]
pub enum Method {
    /// The CONNECT method
    Connect,

    /// The DELETE method
    Delete,

    /// The GET method
    Get,

    /// The HEAD method
    Head,

    /// The OPTIONS method
    Options,

    /// The PATCH method
    Patch,

    /// The POST method
    Post,

    /// The PUT method
    Put,

    /// The TRACE method
    Trace,
}

impl Method {
    /// the uppercase wire representation of this method
    pub fn as_str(&self) -> &'static str {
        use Method::*;
        match self {
            Connect => "CONNECT",
            Delete => "DELETE",
            Get => "GET",
            Head => "HEAD",
            Options => "OPTIONS",
            Patch => "PATCH",
            Post => "POST",
            Put => "PUT",
            Trace => "TRACE",
        }
    }

    /// parse a method from its (case-sensitive) wire representation
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        use Method::*;
        match bytes {
            b"CONNECT" => Ok(Connect),
            b"DELETE" => Ok(Delete),
            b"GET" => Ok(Get),
            b"HEAD" => Ok(Head),
            b"OPTIONS" => Ok(Options),
            b"PATCH" => Ok(Patch),
            b"POST" => Ok(Post),
            b"PUT" => Ok(Put),
            b"TRACE" => Ok(Trace),
            _ => Err(Error::UnrecognizedMethod(
                String::from_utf8_lossy(bytes).to_string(),
            )),
        }
    }

    /// whether requests with this method carry a body.
    ///
    /// heads without a content-length or transfer-encoding for other
    /// methods terminate the message.
    pub fn has_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s.as_bytes())
    }
}

impl AsRef<str> for Method {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod test {
    use super::Method;

    #[test]
    fn parse_and_display() {
        for method in [
            Method::Connect,
            Method::Delete,
            Method::Get,
            Method::Head,
            Method::Options,
            Method::Patch,
            Method::Post,
            Method::Put,
            Method::Trace,
        ] {
            assert_eq!(method.as_str().parse::<Method>().unwrap(), method);
            assert_eq!(method.to_string(), method.as_str());
        }

        assert!("get".parse::<Method>().is_err());
        assert!("BREW".parse::<Method>().is_err());
    }

    #[test]
    fn body_policy() {
        assert!(Method::Post.has_body());
        assert!(Method::Put.has_body());
        assert!(Method::Patch.has_body());
        assert!(!Method::Get.has_body());
        assert!(!Method::Head.has_body());
        assert!(!Method::Delete.has_body());
    }
}
