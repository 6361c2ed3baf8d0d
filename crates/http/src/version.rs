use crate::Error;

/// The version of the HTTP protocol in use.
#[derive(Copy, Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[non_exhaustive]
pub enum Version {
    /// HTTP/0.9
    Http0_9,

    /// HTTP/1.0
    Http1_0,

    /// HTTP/1.1
    Http1_1,

    /// HTTP/2.0
    Http2_0,

    /// HTTP/3.0
    Http3_0,
}

impl Version {
    /// the wire representation of this version
    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http0_9 => "HTTP/0.9",
            Version::Http1_0 => "HTTP/1.0",
            Version::Http1_1 => "HTTP/1.1",
            Version::Http2_0 => "HTTP/2",
            Version::Http3_0 => "HTTP/3",
        }
    }

    /// parse a version from its wire representation
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        match bytes {
            b"HTTP/0.9" => Ok(Version::Http0_9),
            b"HTTP/1.0" => Ok(Version::Http1_0),
            b"HTTP/1.1" => Ok(Version::Http1_1),
            b"HTTP/2" | b"HTTP/2.0" => Ok(Version::Http2_0),
            b"HTTP/3" | b"HTTP/3.0" => Ok(Version::Http3_0),
            _ => Err(Error::InvalidVersion),
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn to_string() {
        let output = format!(
            "{} {} {} {} {}",
            Version::Http0_9,
            Version::Http1_0,
            Version::Http1_1,
            Version::Http2_0,
            Version::Http3_0
        );
        assert_eq!("HTTP/0.9 HTTP/1.0 HTTP/1.1 HTTP/2 HTTP/3", output);
    }

    #[test]
    fn parse_round_trips() {
        for version in [Version::Http0_9, Version::Http1_0, Version::Http1_1] {
            assert_eq!(Version::parse(version.as_str().as_bytes()).unwrap(), version);
        }
        assert!(Version::parse(b"HTTP/1.2").is_err());
        assert!(Version::parse(b"TTYH/1.1").is_err());
    }

    #[test]
    fn ord() {
        use Version::*;
        assert!(Http3_0 > Http2_0);
        assert!(Http2_0 > Http1_1);
        assert!(Http1_1 > Http1_0);
        assert!(Http1_0 > Http0_9);
    }
}
