//! A single error type threaded through every reconciler, the engine
//! adapter client, and the small HTTP surface the scheduler exposes.

use std::fmt;

/// A broad category used to pick an HTTP status code and to decide whether
/// an external call is worth retrying (§7 error taxonomy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Malformed input from a caller; never retried.
    BadRequest,
    /// The named row does not exist.
    NotFound,
    /// A transient external failure (connection refused, timeout, 5xx).
    /// Retried per the configured [`crate::models::RetryPolicy`].
    Transient,
    /// Metrics/adapter call exhausted its retry budget this tick; the
    /// caller should skip the affected decision rather than crash (§4.3).
    Unavailable,
    /// A database transaction conflict; the whole tick should be retried.
    Conflict,
    /// Everything else: bugs, invariant violations, serialization failures.
    Internal,
}

/// The crate's error type. Carries a [`Kind`] for callers that need to
/// branch (is this retriable?) and a human message for logs.
#[derive(Debug)]
pub struct Error {
    pub kind: Kind,
    pub msg: String,
}

impl Error {
    pub fn new(kind: Kind, msg: impl Into<String>) -> Self {
        Error {
            kind,
            msg: msg.into(),
        }
    }

    /// Whether this error belongs to a class that a retry policy would
    /// retry: connection/timeout-class failures only (§5, §7).
    pub fn is_retriable(&self) -> bool {
        matches!(self.kind, Kind::Transient)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.msg)
    }
}

impl std::error::Error for Error {}

/// Build a [`Kind::BadRequest`] error.
#[macro_export]
macro_rules! bad {
    ($msg:expr) => {
        $crate::utils::errors::Error::new($crate::utils::errors::Kind::BadRequest, $msg)
    };
}

/// Build a [`Kind::NotFound`] error.
#[macro_export]
macro_rules! not_found {
    ($msg:expr) => {
        $crate::utils::errors::Error::new($crate::utils::errors::Kind::NotFound, $msg)
    };
}

/// Build a [`Kind::Internal`] error.
#[macro_export]
macro_rules! internal_err {
    ($msg:expr) => {
        $crate::utils::errors::Error::new($crate::utils::errors::Kind::Internal, $msg)
    };
}

/// Build a [`Kind::Unavailable`] error — "no result this tick" (§4.3, §7).
#[macro_export]
macro_rules! unavailable {
    ($msg:expr) => {
        $crate::utils::errors::Error::new($crate::utils::errors::Kind::Unavailable, $msg)
    };
}

/// Build a [`Kind::Conflict`] error — a transaction conflict (§7).
#[macro_export]
macro_rules! conflict {
    ($msg:expr) => {
        $crate::utils::errors::Error::new($crate::utils::errors::Kind::Conflict, $msg)
    };
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                Error::new(Kind::Transient, err.to_string())
            }
            sqlx::Error::RowNotFound => Error::new(Kind::NotFound, err.to_string()),
            _ => Error::new(Kind::Internal, err.to_string()),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            Error::new(Kind::Transient, err.to_string())
        } else {
            Error::new(Kind::Internal, err.to_string())
        }
    }
}

impl From<kube::config::KubeconfigError> for Error {
    fn from(err: kube::config::KubeconfigError) -> Self {
        Error::new(Kind::Internal, err.to_string())
    }
}

impl From<kube::Error> for Error {
    fn from(err: kube::Error) -> Self {
        match &err {
            kube::Error::Service(_) | kube::Error::HyperError(_) => {
                Error::new(Kind::Transient, err.to_string())
            }
            _ => Error::new(Kind::Internal, err.to_string()),
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::new(Kind::Internal, err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::new(Kind::BadRequest, err.to_string())
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(err: std::num::ParseIntError) -> Self {
        Error::new(Kind::BadRequest, err.to_string())
    }
}

impl From<std::num::ParseFloatError> for Error {
    fn from(err: std::num::ParseFloatError) -> Self {
        Error::new(Kind::BadRequest, err.to_string())
    }
}

impl From<uuid::Error> for Error {
    fn from(err: uuid::Error) -> Self {
        Error::new(Kind::BadRequest, err.to_string())
    }
}

impl From<crate::models::InvalidEnum> for Error {
    fn from(err: crate::models::InvalidEnum) -> Self {
        Error::new(Kind::BadRequest, err.inner())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::new(Kind::Internal, err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::new(Kind::Internal, err.to_string())
    }
}

#[cfg(feature = "http")]
impl axum::response::IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let status = match self.kind {
            Kind::BadRequest => StatusCode::BAD_REQUEST,
            Kind::NotFound => StatusCode::NOT_FOUND,
            Kind::Conflict => StatusCode::CONFLICT,
            Kind::Transient | Kind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Kind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = axum::Json(serde_json::json!({"ok": false, "errmsg": self.msg}));
        (status, body).into_response()
    }
}
