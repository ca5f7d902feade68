//! `Error` and `Result` types arising out of gateway operations.

use std::fmt;
use std::error;
use std::result;
use std::ops::Deref;
use std::borrow::Cow;
use std::num::ParseIntError;
use bson::document::ValueAccessError;
use backtrace::Backtrace;
use serde_derive::{ Serialize, Deserialize };

/// Slightly augmented trait for backtrace-able errors.
#[allow(clippy::module_name_repetitions)]
pub trait ErrorExt: error::Error + Send + Sync {
    /// Similar to `std::error::Error::source()`, but with richer type info.
    fn reason(&self) -> Option<&(dyn ErrorExt + 'static)> {
        None
    }

    /// Returns the deepest possible backtrace, if any.
    fn backtrace(&self) -> Option<&Backtrace> {
        self.reason().and_then(ErrorExt::backtrace)
    }

    /// Structured error kind.
    fn kind(&self) -> ErrorKind;

    /// Until subtrait coercions are implemented, this helper method
    /// should return the receiver as an `&std::error::Error` trait object.
    fn as_std_error(&self) -> &(dyn error::Error + 'static);
}

/// A trait for conveniently propagating errors up the call stack.
pub trait ResultExt<T>: Sized {
    /// If this `Result` is an `Err`, then prepend the specified error
    /// to the front of the linked list of causes. The kind of the cause
    /// is preserved.
    /// ```
    /// # use folio::error::{ Error, ErrorKind, ErrorExt, Result, ResultExt };
    /// #
    /// # fn main() -> Result<()> {
    /// let ok: Result<_> = Ok("success!");
    /// let ok_chained = ok.chain("dummy error message")?;
    /// assert_eq!(ok_chained, "success!");
    ///
    /// let err: Result<i32> = Err(Error::new(
    ///     ErrorKind::Index, "chained cause"
    /// ));
    /// let err_chained = err.chain("top-level message").unwrap_err();
    /// assert_eq!(err_chained.message(), "top-level message");
    /// assert_eq!(err_chained.kind(), ErrorKind::Index);
    /// # Ok(())
    /// # }
    /// ```
    fn chain<M: ErrMsg>(self, message: M) -> Result<T>;

    /// Like `chain()`, but the resulting error has the specified kind
    /// instead of the kind of its cause.
    fn chain_as<M: ErrMsg>(self, kind: ErrorKind, message: M) -> Result<T>;
}

/// Values that can act as or generate an error message.
pub trait ErrMsg: Sized {
    /// Convert the value to an error message.
    fn into_message(self) -> Cow<'static, str>;
}

/// Type alias for a `Result` containing a Folio `Error`.
pub type Result<T> = result::Result<T, Error>;

impl<T, E> ResultExt<T> for result::Result<T, E> where E: ErrorExt + 'static {
    fn chain<M: ErrMsg>(self, message: M) -> Result<T> {
        self.map_err(|cause| Error::with_cause(message.into_message(), cause))
    }

    fn chain_as<M: ErrMsg>(self, kind: ErrorKind, message: M) -> Result<T> {
        self.map_err(|cause| {
            Error::with_cause(message.into_message(), cause).with_kind(kind)
        })
    }
}

/// Blanket `impl ErrMsg` for string literals.
impl ErrMsg for &'static str {
    fn into_message(self) -> Cow<'static, str> {
        Cow::Borrowed(self)
    }
}

/// Blanket `impl ErrMsg` for error message formatting functions.
impl<F> ErrMsg for F where F: FnOnce() -> String {
    fn into_message(self) -> Cow<'static, str> {
        Cow::Owned(self())
    }
}

/// A structured, "machine-readable" error kind.
#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The store could not be reached, or the transport or authentication
    /// failed while establishing or using the connection.
    Connection,
    /// A filter, update, projection, sort or pipeline was malformed, or the
    /// store failed to execute it.
    Query,
    /// An index declaration was malformed or conflicts with an existing index.
    Index,
    /// The deadline of an operation expired before the store responded.
    Timeout,
    /// The operation was attempted on a gateway that has already been closed.
    Closed,
    /// A configuration value could not be parsed.
    Config,
    /// There was an error converting between JSON and a strongly-typed value.
    JsonTranscoding,
    /// There was an error converting a strongly-typed value to BSON.
    BsonEncoding,
    /// There was an error converting BSON to a strongly-typed value.
    BsonDecoding,
    /// A field with the specified key was not found in the BSON document.
    MissingDocumentField,
    /// A field with the specified key was found in the BSON document,
    /// but it was of an unexpected type.
    IllTypedDocumentField,
    /// An attempt was made to convert an integer that is too big
    /// for the target type.
    IntConversionOverflow,
}

impl ErrorKind {
    /// Returns a human-readable error description for this kind.
    pub fn as_str(self) -> &'static str {
        use self::ErrorKind::*;

        match self {
            Connection            => "connection error",
            Query                 => "query error",
            Index                 => "index error",
            Timeout               => "deadline exceeded",
            Closed                => "gateway already closed",
            Config                => "configuration error",
            JsonTranscoding       => "JSON transcoding error",
            BsonEncoding          => "BSON encoding error",
            BsonDecoding          => "BSON decoding error",
            MissingDocumentField  => "document field not found",
            IllTypedDocumentField => "document field of unexpected type",
            IntConversionOverflow => "integer conversion overflowed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// The central error type for Folio.
#[derive(Debug)]
pub struct Error {
    /// The structured, "machine-readable" kind of this error.
    kind: ErrorKind,
    /// The human-readable description.
    message: Cow<'static, str>,
    /// The underlying error, if any.
    cause: Option<Box<dyn ErrorExt>>,
    /// The backtrace, if any.
    backtrace: Option<Backtrace>,
}

impl Error {
    /// Creates an error with the specified kind, message, no cause,
    /// and a backtrace.
    /// ```
    /// # use folio::error::{ Error, ErrorKind, ErrorExt };
    /// #
    /// let error = Error::new(ErrorKind::Timeout, "sample error message");
    /// assert_eq!(error.message(), "sample error message");
    /// assert_eq!(error.kind(), ErrorKind::Timeout);
    /// assert!(error.reason().is_none());
    /// assert!(error.backtrace().is_some());
    /// ```
    pub fn new<S>(kind: ErrorKind, message: S) -> Self
        where S: Into<Cow<'static, str>>
    {
        Error {
            kind,
            message: message.into(),
            cause: None,
            backtrace: Some(Backtrace::new()),
        }
    }

    /// Creates an error with the specified message and cause. If the cause has
    /// no backtrace, this method will create it and add it to the new instance.
    pub fn with_cause<S, E>(message: S, cause: E) -> Self
        where S: Into<Cow<'static, str>>,
              E: ErrorExt + 'static
    {
        let kind = cause.kind();
        let message = message.into();
        let backtrace = if cause.backtrace().is_none() {
            Some(Backtrace::new())
        } else {
            None
        };
        let cause: Option<Box<dyn ErrorExt>> = Some(Box::new(cause));

        Error { kind, message, cause, backtrace }
    }

    /// Builder-style setter overriding the structured kind of the error.
    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// The human-readable message of this error, without its causes.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl ErrorExt for Error {
    fn reason(&self) -> Option<&(dyn ErrorExt + 'static)> {
        self.cause.as_ref().map(Deref::deref)
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.reason().and_then(ErrorExt::backtrace).or(self.backtrace.as_ref())
    }

    fn kind(&self) -> ErrorKind {
        self.kind
    }

    fn as_std_error(&self) -> &(dyn error::Error + 'static) {
        self
    }
}

/// The alternate form (`{:#}`) also prints the backtrace.
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;

        if let Some(cause) = self.cause.as_ref() {
            write!(f, ", caused by: {}", cause)?
        }

        if f.alternate() {
            if let Some(backtrace) = ErrorExt::backtrace(self) {
                write!(f, "; {:?}", backtrace)?
            }
        }

        Ok(())
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.reason().map(ErrorExt::as_std_error)
    }
}

impl From<ValueAccessError> for Error {
    fn from(error: ValueAccessError) -> Self {
        let message = match error {
            ValueAccessError::NotPresent => "missing value for key in Document",
            _ => "ill-typed value for key in Document",
        };
        Self::with_cause(message, error)
    }
}

impl ErrorExt for ValueAccessError {
    fn kind(&self) -> ErrorKind {
        match *self {
            ValueAccessError::NotPresent => ErrorKind::MissingDocumentField,
            _ => ErrorKind::IllTypedDocumentField,
        }
    }

    fn as_std_error(&self) -> &(dyn error::Error + 'static) {
        self
    }
}

/// Server error codes reported when a query exceeds its `maxTimeMS`.
const MAX_TIME_EXPIRED: i32 = 50;

/// Server error codes reported for malformed or conflicting indexes:
/// `CannotCreateIndex`, `IndexAlreadyExists`, `IndexOptionsConflict`,
/// `IndexKeySpecsConflict` and `InvalidIndexSpecificationOption`.
const INDEX_CONFLICTS: [i32; 5] = [67, 68, 85, 86, 197];

/// Maps a numeric server error code onto an error kind.
fn classify_server_code(code: i32) -> ErrorKind {
    if code == MAX_TIME_EXPIRED {
        ErrorKind::Timeout
    } else if INDEX_CONFLICTS.contains(&code) {
        ErrorKind::Index
    } else {
        ErrorKind::Query
    }
}

impl From<mongodb::error::Error> for Error {
    fn from(error: mongodb::error::Error) -> Self {
        Self::with_cause("MongoDB error", error)
    }
}

impl ErrorExt for mongodb::error::Error {
    fn kind(&self) -> ErrorKind {
        use mongodb::error::{ ErrorKind as DriverErrorKind, WriteFailure };

        match *self.kind {
            DriverErrorKind::ServerSelection { .. }
            | DriverErrorKind::Io(_)
            | DriverErrorKind::DnsResolve { .. }
            | DriverErrorKind::Authentication { .. }
            | DriverErrorKind::ConnectionPoolCleared { .. } => ErrorKind::Connection,
            DriverErrorKind::Command(ref error) => classify_server_code(error.code),
            DriverErrorKind::Write(WriteFailure::WriteError(ref error)) => {
                classify_server_code(error.code)
            }
            DriverErrorKind::Write(WriteFailure::WriteConcernError(ref error)) => {
                classify_server_code(error.code)
            }
            _ => ErrorKind::Query,
        }
    }

    fn as_std_error(&self) -> &(dyn error::Error + 'static) {
        self
    }
}

/// Implementing `ErrorExt` and `From` boilerplate.
macro_rules! impl_error_type {
    ($ty:path, $kind:ident, $message:expr) => {
        impl From<$ty> for Error {
            fn from(error: $ty) -> Self {
                Self::with_cause($message, error)
            }
        }

        impl ErrorExt for $ty {
            fn kind(&self) -> ErrorKind {
                ErrorKind::$kind
            }

            fn as_std_error(&self) -> &(dyn error::Error + 'static) {
                self
            }
        }
    }
}

impl_error_type! { serde_json::Error, JsonTranscoding, "JSON transcoding error" }
impl_error_type! { bson::ser::Error,  BsonEncoding,    "BSON encoding error" }
impl_error_type! { bson::de::Error,   BsonDecoding,    "BSON decoding error" }
impl_error_type! { ParseIntError,     Config,          "malformed integer" }
