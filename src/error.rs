//! Unified error type.

use thiserror::Error;

/// A type-erased error raised by a middleware unit, a resolver, or the kernel.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by strata's fallible operations.
///
/// Two variants are configuration errors and are meant to abort startup
/// rather than be handled per request: [`Error::InvalidMiddlewareKind`] and
/// [`Error::UnresolvableMiddleware`]. Everything raised by a unit or the
/// kernel travels as [`Error::Handler`] and is never translated by the
/// dispatcher itself; place a [`Recover`](crate::middleware::Recover) frame
/// in the chain for that.
#[derive(Debug, Error)]
pub enum Error {
    /// A registration value matched none of the accepted shapes.
    #[error(
        "invalid middleware: expected a `BoxedMiddleware`, \
         a resolvable reference, or a `(request, next)` callable"
    )]
    InvalidMiddlewareKind,

    /// A deferred frame could not turn its reference into a unit.
    #[error("unresolvable middleware `{reference}`")]
    UnresolvableMiddleware {
        reference: String,
        #[source]
        source: ResolveError,
    },

    /// Failure raised by a middleware unit or by the kernel.
    #[error("handler: {0}")]
    Handler(BoxError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address: {0}")]
    Addr(#[from] std::net::AddrParseError),

    /// The request body could not be read.
    #[error("request body: {0}")]
    Body(BoxError),
}

impl Error {
    /// Wraps an application failure so it can travel through the chain.
    pub fn handler(err: impl Into<BoxError>) -> Self {
        Self::Handler(err.into())
    }

    /// True for the two kinds that indicate a misconfigured chain.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::InvalidMiddlewareKind | Self::UnresolvableMiddleware { .. }
        )
    }
}

/// Why a [`Resolver`](crate::Resolver) could not produce a unit.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no middleware registered as `{0}`")]
    NotFound(String),

    #[error("failed to build middleware `{reference}`: {source}")]
    Failed {
        reference: String,
        #[source]
        source: BoxError,
    },
}
