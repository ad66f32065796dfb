//! Error taxonomy for the platform.
//!
//! Callers branch on kind, never on message text. Adapter failures carry
//! their own kind enum ([`AdapterErrorKind`]) so the engine can translate
//! them into synthetic REJECTED events without string matching.

use thiserror::Error;

/// Classification of an exchange-adapter failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterErrorKind {
    /// Operation attempted before `connect()` succeeded.
    NotConnected,
    /// The adapter's local request budget is exhausted.
    RateLimitExceeded,
    /// Bad or missing adapter configuration.
    ConfigError,
    /// Transport-level failure talking to the exchange.
    HttpError,
    /// The exchange's reply could not be decoded.
    ParseError,
    /// The exchange answered with an application-level error.
    ApiError,
    /// Cancel/modify target does not exist on the exchange.
    OrderNotFound,
    /// Anything else.
    Exception,
}

impl AdapterErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterErrorKind::NotConnected => "NOT_CONNECTED",
            AdapterErrorKind::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            AdapterErrorKind::ConfigError => "CONFIG_ERROR",
            AdapterErrorKind::HttpError => "HTTP_ERROR",
            AdapterErrorKind::ParseError => "PARSE_ERROR",
            AdapterErrorKind::ApiError => "API_ERROR",
            AdapterErrorKind::OrderNotFound => "ORDER_NOT_FOUND",
            AdapterErrorKind::Exception => "EXCEPTION",
        }
    }
}

impl std::fmt::Display for AdapterErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure reported by an exchange adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("[{exchange}] {operation}: {message} ({kind})")]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    /// Exchange name the adapter talks to.
    pub exchange: String,
    /// The adapter operation that failed ("send_order", "cancel_order", ...).
    pub operation: String,
    pub message: String,
}

impl AdapterError {
    pub fn new(
        kind: AdapterErrorKind,
        exchange: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            exchange: exchange.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn not_connected(exchange: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::new(
            AdapterErrorKind::NotConnected,
            exchange,
            operation,
            "not connected",
        )
    }

    pub fn rate_limited(exchange: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::new(
            AdapterErrorKind::RateLimitExceeded,
            exchange,
            operation,
            "request budget exhausted",
        )
    }

    pub fn order_not_found(exchange: impl Into<String>, cl_ord_id: &str) -> Self {
        Self::new(
            AdapterErrorKind::OrderNotFound,
            exchange,
            "cancel_order",
            format!("unknown order {}", cl_ord_id),
        )
    }
}

pub type AdapterResult<T> = Result<T, AdapterError>;

/// System-level error taxonomy shared by every component.
#[derive(Debug, Error)]
pub enum Error {
    /// A component cannot reach its counterparty (bind/connect failure,
    /// lost exchange connection).
    #[error("connection error: {0}")]
    Connection(String),
    /// Credentials rejected by the exchange.
    #[error("authentication error: {0}")]
    Authentication(String),
    /// A local or remote request budget was exceeded.
    #[error("rate limit exceeded: {0}")]
    RateLimit(String),
    /// Malformed or undecodable wire message.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// Order parameters failed validation before reaching an adapter.
    #[error("validation error: {0}")]
    Validation(String),
    /// An operation referenced an unknown order or an illegal state
    /// transition.
    #[error("state error: {0}")]
    State(String),
    /// A typed adapter failure, preserved for kind-based branching.
    #[error(transparent)]
    Adapter(#[from] AdapterError),
}
