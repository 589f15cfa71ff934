// Copyright 2016 `multipart` Crate Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! The server-side handling of `multipart/form-data` requests.
//!
//! `Multipart` walks a request body one section at a time; `StreamUploader` drives it to the
//! end, saving file sections to disk and collecting form values.
//!
//! See the `StreamUploader` struct for more info.

use crate::error::{framing_error, UploadResult};

use std::io::Read;

pub use self::accumulator::FormValueAccumulator;
pub use self::boundary::BoundaryReader;
pub use self::headers::{ContentDisposition, ContentTypeHeader, SectionHeaders};
pub use self::options::FormOptions;
pub use self::save::{upload_small_file, FileSink, FormFile, LocalFs, PendingFile, SavedFile};
pub use self::section::MultipartSection;
pub use self::upload::{get_encoding, CancelToken, Entries, StreamUploader};
pub use self::validate::{
    get_boundary, has_file_content_disposition, has_form_data_content_disposition,
    is_multipart_content_type,
};

mod accumulator;
mod boundary;
pub mod headers;
pub mod options;
pub mod save;
mod section;
mod upload;
mod validate;

#[cfg(feature = "tiny_http")]
pub mod tiny_http;

/// A request type that can be read as `multipart/form-data`.
pub trait HttpRequest {
    /// The body of the request.
    type Body: Read;

    /// The raw value of the `Content-Type` header, if any.
    fn content_type(&self) -> Option<&str>;

    /// Take the body.
    fn body(self) -> Self::Body;
}

/// Reads the sections of a `multipart/form-data` body, one at a time.
///
/// Create this with `Multipart::from_request()` or `Multipart::with_body()`, then read
/// sections with `.read_section()` until it returns `Ok(None)`.
#[derive(Debug)]
pub struct Multipart<R> {
    reader: BoundaryReader<R>,
    options: FormOptions,
}

impl<R: Read> Multipart<R> {
    /// If `req` has a valid `multipart/` content type, wrap its body.
    pub fn from_request<Q: HttpRequest<Body = R>>(req: Q, options: FormOptions) -> UploadResult<Self> {
        validate::require_multipart(req.content_type())?;

        let content_type = req.content_type().map(ContentTypeHeader::parse).transpose()?;
        let boundary = get_boundary(content_type.as_ref(), options.multipart_boundary_length_limit)?;

        debug!("Boundary: {}", boundary);

        Ok(Multipart::with_options(req.body(), boundary, options))
    }

    /// Split `body` on `boundary` (as found in the `Content-Type` header) with default limits.
    pub fn with_body<B: AsRef<str>>(body: R, boundary: B) -> Self {
        Self::with_options(body, boundary, FormOptions::default())
    }

    pub fn with_options<B: AsRef<str>>(body: R, boundary: B, options: FormOptions) -> Self {
        Multipart {
            reader: BoundaryReader::from_reader(body, boundary),
            options,
        }
    }

    /// Advance to the next section, skipping whatever is left of the previous one.
    ///
    /// Returns `Ok(None)` once the closing boundary has been read.
    pub fn read_section(&mut self) -> UploadResult<Option<MultipartSection<R>>> {
        if !self.reader.consume_boundary().map_err(framing_error)? {
            return Ok(None);
        }

        let headers = SectionHeaders::read_from(&mut self.reader, &self.options)?;

        Ok(Some(MultipartSection::new(headers, &mut self.reader)))
    }

    pub fn options(&self) -> &FormOptions {
        &self.options
    }
}
