use std::{fmt, slice, sync::Arc, vec};

use reqwest::StatusCode;

/// Boxed error accepted from transports, token providers and decoders.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Shared form of [`BoxError`] so errors can be cloned into several results.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Error type returned by this crate.
#[derive(Clone, Debug, thiserror::Error)]
pub enum Error {
    /// URL could not be parsed or joined.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    /// Request has no target URL to operate on.
    #[error("request has no URL")]
    MissingUrl,
    /// HTTP method string is not a valid token.
    #[error("invalid HTTP method '{0}'")]
    InvalidMethod(String),
    /// Header name or value could not be encoded.
    #[error("invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },
    /// A body source or file could not be read.
    #[error("io error: {0}")]
    Io(#[source] Arc<std::io::Error>),
    /// A value could not be marshalled into a request body.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// The bearer token provider failed.
    #[error("token provider error: {0}")]
    TokenProvider(#[source] SharedError),
    /// Network or request execution error from the transport.
    #[error("transport error: {0}")]
    Transport(#[source] SharedError),
    /// Response status matched one of the configured retryable codes.
    #[error("received HTTP status code {} in attempt {attempt}", .status.as_u16())]
    RetryableStatus { status: StatusCode, attempt: usize },
    /// The request context was cancelled.
    #[error("context canceled")]
    Cancelled,
    /// The request context deadline elapsed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
    /// Response status did not match the expected set.
    ///
    /// Carries the server provided body when there was one.
    #[error("{0}")]
    Assertion(String),
    /// Response body could not be decoded.
    #[error("deserialization error: {0}")]
    Deserialization(String),
}

impl Error {
    pub(crate) fn io(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }

    pub(crate) fn transport(err: BoxError) -> Self {
        Self::Transport(Arc::from(err))
    }

    /// Returns `true` for errors raised while building a request.
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            Self::InvalidUrl { .. }
                | Self::MissingUrl
                | Self::InvalidMethod(_)
                | Self::InvalidHeader { .. }
                | Self::Io(_)
                | Self::Serialization(_)
                | Self::TokenProvider(_)
        )
    }

    /// Returns `true` for errors the send loop retries on.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::RetryableStatus { .. })
    }

    /// Returns `true` when a transport error was caused by a timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Transport(inner) => inner
                .downcast_ref::<reqwest::Error>()
                .is_some_and(reqwest::Error::is_timeout),
            Self::DeadlineExceeded => true,
            _ => false,
        }
    }
}

/// Ordered collection of every failure that contributed to a result.
///
/// Errors are kept in the order they happened. Displaying the list prints
/// one cause per line.
#[derive(Clone, Debug, Default)]
pub struct ErrorList {
    errors: Vec<Error>,
}

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: Error) {
        self.errors.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> slice::Iter<'_, Error> {
        self.errors.iter()
    }

    pub fn first(&self) -> Option<&Error> {
        self.errors.first()
    }

    pub fn last(&self) -> Option<&Error> {
        self.errors.last()
    }

    /// Unwraps the list into its ordered causes.
    pub fn into_vec(self) -> Vec<Error> {
        self.errors
    }

    /// `Ok(())` when nothing was collected, otherwise the list itself.
    pub fn into_result(self) -> Result<(), ErrorList> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, err) in self.errors.iter().enumerate() {
            if index > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorList {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.errors
            .first()
            .map(|err| err as &(dyn std::error::Error + 'static))
    }
}

impl From<Error> for ErrorList {
    fn from(err: Error) -> Self {
        Self { errors: vec![err] }
    }
}

impl From<Vec<Error>> for ErrorList {
    fn from(errors: Vec<Error>) -> Self {
        Self { errors }
    }
}

impl Extend<Error> for ErrorList {
    fn extend<I: IntoIterator<Item = Error>>(&mut self, iter: I) {
        self.errors.extend(iter);
    }
}

impl IntoIterator for ErrorList {
    type Item = Error;
    type IntoIter = vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a Error;
    type IntoIter = slice::Iter<'a, Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}
