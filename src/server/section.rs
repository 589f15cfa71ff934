// Copyright 2016 `multipart` Crate Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! A single section of a `multipart/form-data` request.

use encoding_rs::Encoding;

use super::boundary::BoundaryReader;
use super::headers::{ContentDisposition, ContentTypeHeader, SectionHeaders};

use crate::error::{framing_error, UploadError, UploadResult};

use std::io::{self, BufRead, Read};

/// One section of the request body.
///
/// The section's body is read through its `Read` and `BufRead` impls, which stop at the next
/// boundary. The section mutably borrows its `Multipart`, so it has to be dropped before the
/// next one can be requested; whatever was left unread is skipped at that point.
#[derive(Debug)]
pub struct MultipartSection<'a, R: 'a> {
    headers: SectionHeaders,
    body: &'a mut BoundaryReader<R>,
}

impl<'a, R: Read + 'a> MultipartSection<'a, R> {
    pub(crate) fn new(headers: SectionHeaders, body: &'a mut BoundaryReader<R>) -> Self {
        MultipartSection { headers, body }
    }

    /// All headers of this section.
    pub fn headers(&self) -> &SectionHeaders {
        &self.headers
    }

    /// The `Content-Disposition` header, if present.
    pub fn content_disposition(&self) -> Option<&ContentDisposition> {
        self.headers.content_disposition()
    }

    /// The `Content-Type` header, if present and well-formed.
    pub fn content_type(&self) -> Option<&ContentTypeHeader> {
        self.headers.content_type()
    }

    /// The field name from the `Content-Disposition` header.
    pub fn name(&self) -> Option<&str> {
        self.content_disposition().and_then(|disp| disp.name.as_deref())
    }

    /// Read the rest of the body and decode it with `encoding`.
    ///
    /// A byte order mark overrides `encoding` and is stripped. Fails with `LimitExceeded` if the
    /// body is longer than `limit` bytes.
    pub fn read_text(&mut self, encoding: &'static Encoding, limit: u64) -> UploadResult<String> {
        let mut bytes = Vec::new();
        self.by_ref()
            .take(limit.saturating_add(1))
            .read_to_end(&mut bytes)
            .map_err(framing_error)?;

        if bytes.len() as u64 > limit {
            return Err(UploadError::limit(format!("form value length limit {} exceeded.", limit)));
        }

        let (text, used, malformed) = encoding.decode(&bytes);

        if malformed {
            warn!("Form value for {:?} was not valid {}", self.name(), used.name());
        }

        Ok(text.into_owned())
    }

    /// Skip the rest of the body, returning how many bytes were discarded.
    pub fn drain(&mut self) -> io::Result<u64> {
        io::copy(self, &mut io::sink())
    }
}

impl<'a, R: Read> Read for MultipartSection<'a, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.body.read(buf)
    }
}

impl<'a, R: Read> BufRead for MultipartSection<'a, R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.body.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.body.consume(amt)
    }
}
