use crate::{HeaderName, Version};
use std::{num::TryFromIntError, str::Utf8Error};
use thiserror::Error;

/// Concrete errors that occur within freshet's HTTP implementation
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// [`std::io::Error`]
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// a transport read or write outlived its deadline
    #[error("Operation timed out")]
    Timeout,

    /// the peer closed the connection before a complete message was
    /// transferred
    #[error("Connection closed by peer")]
    Closed,

    /// An incomplete or invalid HTTP head
    #[error("Partial or invalid HTTP head")]
    InvalidHead,

    /// We were unable to parse a [`HeaderName`]
    #[error("Invalid or unparseable header name")]
    InvalidHeaderName,

    /// We were unable to parse a header value for the named header
    #[error("Invalid or unparseable header value, header name: {0}")]
    InvalidHeaderValue(HeaderName),

    /// a chunked-transfer-encoding size line was not valid hex, or
    /// chunk framing was otherwise malformed
    #[error("Invalid chunk framing")]
    InvalidChunkSize,

    /// we were able to parse this [`Version`], but do not support it
    #[error("Unsupported version {0}")]
    UnsupportedVersion(Version),

    /// We were unable to parse a [`Version`]
    #[error("Invalid or missing version")]
    InvalidVersion,

    /// we were unable to parse this method
    #[error("Unrecognized method {0}")]
    UnrecognizedMethod(String),

    /// this request did not have a method
    #[error("Missing method")]
    MissingMethod,

    /// this response did not have a status code, or the status code
    /// was outside of 100..=599
    #[error("Invalid or missing status code")]
    InvalidStatus,

    /// this request did not specify a path
    #[error("Request path missing")]
    RequestPathMissing,

    /// we expected utf8 but received other bytes
    #[error(transparent)]
    EncodingError(#[from] Utf8Error),

    /// we received a header that does not make sense in context, such
    /// as a content-length alongside transfer-encoding: chunked
    #[error("Unexpected header: {0}")]
    UnexpectedHeader(HeaderName),

    /// to mitigate against malicious HTTP clients, we do not allow
    /// request heads beyond a configurable length
    #[error("Headers were malformed or longer than allowed")]
    HeadersTooLong,

    /// to mitigate against malicious peers, we do not read received
    /// bodies beyond a configurable length into memory. Longer bodies
    /// can be read through the `AsyncRead` interface or spooled.
    #[error("Received body too long. Maximum {0} bytes")]
    ReceivedBodyTooLong(u64),

    /// [`TryFromIntError`]
    #[error(transparent)]
    TryFromIntError(#[from] TryFromIntError),
}

impl Error {
    /// predicate to distinguish malformed-input errors (the
    /// bad-format family) from io-level and timeout failures
    pub fn is_bad_format(&self) -> bool {
        matches!(
            self,
            Error::InvalidHead
                | Error::InvalidHeaderName
                | Error::InvalidHeaderValue(_)
                | Error::InvalidChunkSize
                | Error::InvalidVersion
                | Error::UnsupportedVersion(_)
                | Error::UnrecognizedMethod(_)
                | Error::MissingMethod
                | Error::InvalidStatus
                | Error::RequestPathMissing
                | Error::UnexpectedHeader(_)
                | Error::HeadersTooLong
        )
    }
}

/// this crate's result type
pub type Result<T> = std::result::Result<T, Error>;
