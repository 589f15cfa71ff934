// Copyright 2016 `multipart` Crate Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! Errors returned while validating and reading an upload.

use std::io;

quick_error! {
    /// An error encountered while processing a `multipart/form-data` upload.
    ///
    /// None of these are retried internally; the caller decides what to do with them.
    #[derive(Debug)]
    pub enum UploadError {
        /// The request or one of its sections is malformed: bad or missing boundary,
        /// unparseable headers, a file section without a filename.
        InvalidFormat(msg: String) {
            description("invalid multipart data")
            display("invalid multipart data: {}", msg)
        }
        /// A configured limit was hit.
        LimitExceeded(msg: String) {
            description("multipart limit exceeded")
            display("{}", msg)
        }
        /// A path the upload depends on does not exist.
        NotFound(msg: String) {
            description("not found")
            display("not found: {}", msg)
        }
        /// Reading the body or writing to the filesystem failed.
        Io(err: io::Error) {
            from()
            description("I/O error during upload")
            display("I/O error during upload: {}", err)
            cause(err)
        }
        /// The upload was cancelled through its `CancelToken`.
        Cancelled {
            description("upload cancelled")
            display("upload cancelled")
        }
    }
}

/// The coarse category of an `UploadError`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidFormat,
    LimitExceeded,
    NotFound,
    Io,
    Cancelled,
}

impl UploadError {
    pub(crate) fn invalid<S: Into<String>>(msg: S) -> Self {
        UploadError::InvalidFormat(msg.into())
    }

    pub(crate) fn limit<S: Into<String>>(msg: S) -> Self {
        UploadError::LimitExceeded(msg.into())
    }

    /// Get the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match *self {
            UploadError::InvalidFormat(_) => ErrorKind::InvalidFormat,
            UploadError::LimitExceeded(_) => ErrorKind::LimitExceeded,
            UploadError::NotFound(_) => ErrorKind::NotFound,
            UploadError::Io(_) => ErrorKind::Io,
            UploadError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// `true` if the request itself was at fault, i.e. an HTTP layer would answer with a
    /// 4xx status. I/O failures and cancellation are the server's problem.
    pub fn is_client_error(&self) -> bool {
        match self.kind() {
            ErrorKind::InvalidFormat | ErrorKind::LimitExceeded | ErrorKind::NotFound => true,
            ErrorKind::Io | ErrorKind::Cancelled => false,
        }
    }
}

/// Map an error from reading the request body.
///
/// Malformed or truncated framing is the client's fault, anything else is an I/O error.
pub(crate) fn framing_error(err: io::Error) -> UploadError {
    match err.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => {
            UploadError::InvalidFormat(err.to_string())
        }
        _ => UploadError::Io(err),
    }
}

/// Result type used throughout the crate.
pub type UploadResult<T> = Result<T, UploadError>;

#[cfg(test)]
mod test {
    use super::{framing_error, ErrorKind, UploadError};

    use std::io;

    #[test]
    fn io_errors_convert() {
        let err: UploadError = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(!err.is_client_error());
    }

    #[test]
    fn truncated_body_is_client_error() {
        let err = framing_error(io::Error::new(io::ErrorKind::UnexpectedEof, "ended early"));
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);

        let err = framing_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn display_carries_message() {
        let err = UploadError::limit("form key count limit 1 exceeded.");
        assert_eq!(err.to_string(), "form key count limit 1 exceeded.");
        assert!(err.is_client_error());

        let err = UploadError::invalid("missing content-type boundary");
        assert_eq!(err.to_string(), "invalid multipart data: missing content-type boundary");
    }
}
