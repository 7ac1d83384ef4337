//! HTTP/1.1 protocol types and parsing.
//!
//! This module provides the core HTTP primitives:
//! [`Method`], [`StatusCode`], [`Headers`], [`Request`], and [`Response`],
//! plus the conditional-request helpers in [`etag`] and HTTP dates in
//! [`date`].

use std::fmt;

pub mod date;
pub mod etag;
pub mod headers;
pub mod request;
pub mod response;

pub use headers::Headers;
pub use request::Request;
pub use response::Response;

macro_rules! status_codes {
    ($(#[$meta:meta])* { $($(#[$doc:meta])* $name:ident = $code:literal, $reason:literal;)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum StatusCode {
            $($(#[$doc])* $name = $code,)+
        }

        impl StatusCode {
            /// Returns the numeric status code as a `u16`.
            pub fn as_u16(self) -> u16 {
                self as u16
            }

            /// Returns the canonical reason phrase for this status code.
            pub fn canonical_reason(self) -> &'static str {
                match self {
                    $(Self::$name => $reason,)+
                }
            }

            /// Looks a numeric code up; codes the framework never sends give `None`.
            pub fn from_u16(code: u16) -> Option<Self> {
                match code {
                    $($code => Some(Self::$name),)+
                    _ => None,
                }
            }
        }
    };
}

status_codes! {
    /// An HTTP response status code.
    ///
    /// # Examples
    ///
    /// ```
    /// use vista::http::StatusCode;
    ///
    /// let status = StatusCode::Ok;
    /// assert_eq!(status.as_u16(), 200);
    /// assert_eq!(status.canonical_reason(), "OK");
    /// assert!(status.is_success());
    /// assert!(!StatusCode::NotModified.allows_body());
    /// assert_eq!(StatusCode::from_u16(416), Some(StatusCode::RangeNotSatisfiable));
    /// ```
    {
        Ok = 200, "OK";
        Created = 201, "Created";
        Accepted = 202, "Accepted";
        NoContent = 204, "No Content";
        /// Answer to a satisfiable `Range` request.
        PartialContent = 206, "Partial Content";

        /// Used by the mux to add a trailing slash.
        MovedPermanently = 301, "Moved Permanently";
        /// Default for [`Context::redirect`](crate::context::Context::redirect).
        Found = 302, "Found";
        SeeOther = 303, "See Other";
        NotModified = 304, "Not Modified";
        TemporaryRedirect = 307, "Temporary Redirect";
        PermanentRedirect = 308, "Permanent Redirect";

        BadRequest = 400, "Bad Request";
        Unauthorized = 401, "Unauthorized";
        Forbidden = 403, "Forbidden";
        NotFound = 404, "Not Found";
        MethodNotAllowed = 405, "Method Not Allowed";
        PayloadTooLarge = 413, "Payload Too Large";
        RangeNotSatisfiable = 416, "Range Not Satisfiable";
        UnprocessableEntity = 422, "Unprocessable Entity";

        InternalServerError = 500, "Internal Server Error";
        ServiceUnavailable = 503, "Service Unavailable";
    }
}

impl StatusCode {
    /// Returns `false` for statuses that must not carry a message body
    /// (1xx, 204 and 304, RFC 9110 §6.4.1).
    pub fn allows_body(self) -> bool {
        let code = self.as_u16();
        !(code < 200 || code == 204 || code == 304)
    }

    /// Returns `true` for 5xx statuses.
    pub fn is_server_error(self) -> bool {
        self.as_u16() >= 500
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(self) -> bool {
        (200..300).contains(&self.as_u16())
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.canonical_reason())
    }
}

impl From<StatusCode> for u16 {
    fn from(code: StatusCode) -> u16 {
        code.as_u16()
    }
}

macro_rules! methods {
    ($(#[$meta:meta])* { $($name:ident => $token:literal,)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum Method {
            $($name,)+
            /// A non-standard extension method.
            Custom(String),
        }

        impl Method {
            /// Returns the method as a string slice.
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$name => $token,)+
                    Self::Custom(s) => s.as_str(),
                }
            }

            /// Maps a request-line token to a method; unknown tokens become
            /// [`Method::Custom`]. Tokens are case-sensitive.
            pub fn from_token(token: &str) -> Self {
                match token {
                    $($token => Self::$name,)+
                    other => Self::Custom(other.to_owned()),
                }
            }
        }
    };
}

methods! {
    /// An HTTP request method.
    ///
    /// ```
    /// use vista::http::Method;
    ///
    /// let method: Method = "GET".parse().unwrap();
    /// assert_eq!(method, Method::Get);
    /// assert_eq!(method.as_str(), "GET");
    /// assert_eq!(Method::from_token("PURGE"), Method::Custom("PURGE".to_owned()));
    /// ```
    {
        Get => "GET",
        Post => "POST",
        Put => "PUT",
        Delete => "DELETE",
        Head => "HEAD",
        Options => "OPTIONS",
        Patch => "PATCH",
        Connect => "CONNECT",
        Trace => "TRACE",
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_token(s))
    }
}

impl AsRef<str> for Method {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
