//! Error type shared by every upsert operation.
//!
//! An [`UpsertError`] carries an [`ErrorKind`] used for programmatic handling, a static
//! description, optional dynamic detail, an optional source error and the callsite that
//! created it. Errors are built with [`crate::upsert_error!`] and returned early with
//! [`crate::bail!`].

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Result alias used across the crate.
pub type UpsertResult<T> = Result<T, UpsertError>;

/// Categories of failures raised by the upsert engine.
///
/// Every kind aborts the operation that raised it. No table mutation is visible after any
/// of them: a table stays at its last committed version.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A required column is missing, null, or typed differently than the table expects.
    SchemaError,
    /// A source batch repeats a row key with conflicting content.
    KeyCollision,
    /// Reading or durably writing table data failed.
    IoError,
    /// Another writer committed a version after this operation read the table.
    ///
    /// The caller should re-run the whole merge against the fresh latest version.
    ConcurrentModification,
    TableNotFound,
    VersionNotFound,
    SerializationError,
    DeserializationError,
    InvalidData,
    InvalidState,
}

impl ErrorKind {
    /// Returns `true` when re-running the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::ConcurrentModification)
    }
}

#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type of the crate.
#[derive(Debug, Clone)]
pub struct UpsertError {
    payload: Box<ErrorPayload>,
}

impl UpsertError {
    pub fn kind(&self) -> ErrorKind {
        self.payload.kind
    }

    pub fn description(&self) -> &str {
        &self.payload.description
    }

    /// Returns the dynamic detail attached at creation, if any.
    pub fn detail(&self) -> Option<&str> {
        self.payload.detail.as_deref()
    }

    pub fn backtrace(&self) -> &Backtrace {
        self.payload.backtrace.as_ref()
    }

    /// Returns the callsite that created this error.
    pub fn location(&self) -> &'static Location<'static> {
        self.payload.location
    }

    /// Attaches the error that caused this one.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.payload.source = Some(Arc::new(source));
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        UpsertError {
            payload: Box::new(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }
}

/// Two errors are equal when they have the same kind.
impl PartialEq for UpsertError {
    fn eq(&self, other: &UpsertError) -> bool {
        self.kind() == other.kind()
    }
}

impl fmt::Display for UpsertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let payload = &self.payload;
        write!(
            f,
            "[{:?}] {} @ {}:{}:{}",
            payload.kind,
            payload.description,
            payload.location.file(),
            payload.location.line(),
            payload.location.column()
        )?;

        if let Some(detail) = payload.detail.as_deref() {
            write!(f, "\n  Detail:")?;
            for line in detail.lines() {
                write!(f, "\n    {line}")?;
            }
        }

        let backtrace = payload.backtrace.to_string();
        if !backtrace.trim().is_empty() {
            write!(f, "\n  Backtrace:")?;
            for line in backtrace.lines() {
                write!(f, "\n    {line}")?;
            }
        }

        Ok(())
    }
}

impl error::Error for UpsertError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.payload
            .source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

impl From<(ErrorKind, &'static str)> for UpsertError {
    #[track_caller]
    fn from((kind, description): (ErrorKind, &'static str)) -> UpsertError {
        UpsertError::from_components(kind, Cow::Borrowed(description), None, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for UpsertError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, description, detail): (ErrorKind, &'static str, D)) -> UpsertError {
        UpsertError::from_components(kind, Cow::Borrowed(description), Some(detail.into()), None)
    }
}

impl From<std::io::Error> for UpsertError {
    #[track_caller]
    fn from(err: std::io::Error) -> UpsertError {
        let detail = err.to_string();
        UpsertError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Maps JSON failures by category: I/O stays [`ErrorKind::IoError`], everything else is a
/// (de)serialization problem.
impl From<serde_json::Error> for UpsertError {
    #[track_caller]
    fn from(err: serde_json::Error) -> UpsertError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        let detail = err.to_string();
        UpsertError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}
