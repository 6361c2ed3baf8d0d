use crate::Error;

/// HTTP response status codes, with their canonical reason phrases.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(u16)]
#[non_exhaustive]
pub enum Status {
    /// 100 Continue
    Continue = 100,

    /// 101 Switching Protocols
    SwitchingProtocols = 101,

    /// 200 Ok
    Ok = 200,

    /// 201 Created
    Created = 201,

    /// 202 Accepted
    Accepted = 202,

    /// 203 Non Authoritative Information
    NonAuthoritativeInformation = 203,

    /// 204 No Content
    NoContent = 204,

    /// 205 Reset Content
    ResetContent = 205,

    /// 206 Partial Content
    PartialContent = 206,

    /// 300 Multiple Choices
    MultipleChoices = 300,

    /// 301 Moved Permanently
    MovedPermanently = 301,

    /// 302 Found
    Found = 302,

    /// 303 See Other
    SeeOther = 303,

    /// 304 Not Modified
    NotModified = 304,

    /// 307 Temporary Redirect
    TemporaryRedirect = 307,

    /// 308 Permanent Redirect
    PermanentRedirect = 308,

    /// 400 Bad Request
    BadRequest = 400,

    /// 401 Unauthorized
    Unauthorized = 401,

    /// 402 Payment Required
    PaymentRequired = 402,

    /// 403 Forbidden
    Forbidden = 403,

    /// 404 Not Found
    NotFound = 404,

    /// 405 Method Not Allowed
    MethodNotAllowed = 405,

    /// 406 Not Acceptable
    NotAcceptable = 406,

    /// 407 Proxy Authentication Required
    ProxyAuthenticationRequired = 407,

    /// 408 Request Timeout
    RequestTimeout = 408,

    /// 409 Conflict
    Conflict = 409,

    /// 410 Gone
    Gone = 410,

    /// 411 Length Required
    LengthRequired = 411,

    /// 412 Precondition Failed
    PreconditionFailed = 412,

    /// 413 Payload Too Large
    PayloadTooLarge = 413,

    /// 414 URI Too Long
    UriTooLong = 414,

    /// 415 Unsupported Media Type
    UnsupportedMediaType = 415,

    /// 416 Requested Range Not Satisfiable
    RequestedRangeNotSatisfiable = 416,

    /// 417 Expectation Failed
    ExpectationFailed = 417,

    /// 418 I'm a teapot
    ImATeapot = 418,

    /// 422 Unprocessable Entity
    UnprocessableEntity = 422,

    /// 426 Upgrade Required
    UpgradeRequired = 426,

    /// 428 Precondition Required
    PreconditionRequired = 428,

    /// 429 Too Many Requests
    TooManyRequests = 429,

    /// 431 Request Header Fields Too Large
    RequestHeaderFieldsTooLarge = 431,

    /// 451 Unavailable For Legal Reasons
    UnavailableForLegalReasons = 451,

    /// 500 Internal Server Error
    InternalServerError = 500,

    /// 501 Not Implemented
    NotImplemented = 501,

    /// 502 Bad Gateway
    BadGateway = 502,

    /// 503 Service Unavailable
    ServiceUnavailable = 503,

    /// 504 Gateway Timeout
    GatewayTimeout = 504,

    /// 505 HTTP Version Not Supported
    HttpVersionNotSupported = 505,

    /// 511 Network Authentication Required
    NetworkAuthenticationRequired = 511,
}

impl Status {
    /// The canonical reason phrase for this status code, from the
    /// fixed registry table.
    pub fn canonical_reason(&self) -> &'static str {
        use Status::*;
        match self {
            Continue => "Continue",
            SwitchingProtocols => "Switching Protocols",
            Ok => "OK",
            Created => "Created",
            Accepted => "Accepted",
            NonAuthoritativeInformation => "Non-Authoritative Information",
            NoContent => "No Content",
            ResetContent => "Reset Content",
            PartialContent => "Partial Content",
            MultipleChoices => "Multiple Choices",
            MovedPermanently => "Moved Permanently",
            Found => "Found",
            SeeOther => "See Other",
            NotModified => "Not Modified",
            TemporaryRedirect => "Temporary Redirect",
            PermanentRedirect => "Permanent Redirect",
            BadRequest => "Bad Request",
            Unauthorized => "Unauthorized",
            PaymentRequired => "Payment Required",
            Forbidden => "Forbidden",
            NotFound => "Not Found",
            MethodNotAllowed => "Method Not Allowed",
            NotAcceptable => "Not Acceptable",
            ProxyAuthenticationRequired => "Proxy Authentication Required",
            RequestTimeout => "Request Timeout",
            Conflict => "Conflict",
            Gone => "Gone",
            LengthRequired => "Length Required",
            PreconditionFailed => "Precondition Failed",
            PayloadTooLarge => "Payload Too Large",
            UriTooLong => "URI Too Long",
            UnsupportedMediaType => "Unsupported Media Type",
            RequestedRangeNotSatisfiable => "Requested Range Not Satisfiable",
            ExpectationFailed => "Expectation Failed",
            ImATeapot => "I'm a teapot",
            UnprocessableEntity => "Unprocessable Entity",
            UpgradeRequired => "Upgrade Required",
            PreconditionRequired => "Precondition Required",
            TooManyRequests => "Too Many Requests",
            RequestHeaderFieldsTooLarge => "Request Header Fields Too Large",
            UnavailableForLegalReasons => "Unavailable For Legal Reasons",
            InternalServerError => "Internal Server Error",
            NotImplemented => "Not Implemented",
            BadGateway => "Bad Gateway",
            ServiceUnavailable => "Service Unavailable",
            GatewayTimeout => "Gateway Timeout",
            HttpVersionNotSupported => "HTTP Version Not Supported",
            NetworkAuthenticationRequired => "Network Authentication Required",
        }
    }
}

impl TryFrom<u16> for Status {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        use Status::*;
        Result::Ok(match value {
            100 => Continue,
            101 => SwitchingProtocols,
            200 => Ok,
            201 => Created,
            202 => Accepted,
            203 => NonAuthoritativeInformation,
            204 => NoContent,
            205 => ResetContent,
            206 => PartialContent,
            300 => MultipleChoices,
            301 => MovedPermanently,
            302 => Found,
            303 => SeeOther,
            304 => NotModified,
            307 => TemporaryRedirect,
            308 => PermanentRedirect,
            400 => BadRequest,
            401 => Unauthorized,
            402 => PaymentRequired,
            403 => Forbidden,
            404 => NotFound,
            405 => MethodNotAllowed,
            406 => NotAcceptable,
            407 => ProxyAuthenticationRequired,
            408 => RequestTimeout,
            409 => Conflict,
            410 => Gone,
            411 => LengthRequired,
            412 => PreconditionFailed,
            413 => PayloadTooLarge,
            414 => UriTooLong,
            415 => UnsupportedMediaType,
            416 => RequestedRangeNotSatisfiable,
            417 => ExpectationFailed,
            418 => ImATeapot,
            422 => UnprocessableEntity,
            426 => UpgradeRequired,
            428 => PreconditionRequired,
            429 => TooManyRequests,
            431 => RequestHeaderFieldsTooLarge,
            451 => UnavailableForLegalReasons,
            500 => InternalServerError,
            501 => NotImplemented,
            502 => BadGateway,
            503 => ServiceUnavailable,
            504 => GatewayTimeout,
            505 => HttpVersionNotSupported,
            511 => NetworkAuthenticationRequired,
            _ => return Err(Error::InvalidStatus),
        })
    }
}

impl From<Status> for u16 {
    fn from(status: Status) -> u16 {
        status as u16
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", *self as u16)
    }
}

#[cfg(test)]
mod test {
    use super::Status;

    #[test]
    fn round_trip() {
        for code in [100u16, 200, 204, 304, 400, 404, 418, 500, 503] {
            let status = Status::try_from(code).unwrap();
            assert_eq!(u16::from(status), code);
        }
        assert!(Status::try_from(600).is_err());
        assert!(Status::try_from(99).is_err());
    }

    #[test]
    fn reasons() {
        assert_eq!(Status::Ok.canonical_reason(), "OK");
        assert_eq!(Status::NotFound.canonical_reason(), "Not Found");
        assert_eq!(
            Status::InternalServerError.canonical_reason(),
            "Internal Server Error"
        );
    }
}
