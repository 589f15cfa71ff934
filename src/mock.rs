// Copyright 2016 `multipart` Crate Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! Mock request bodies for testing code that consumes `multipart/form-data` uploads.
use rand::distributions::Alphanumeric;
use rand::rngs::ThreadRng;
use rand::{self, Rng};

use crate::server::HttpRequest;

use std::cmp;
use std::fmt::Write as _;
use std::io::{self, Cursor, Read};

const BOUNDARY_LEN: usize = 16;

/// Builds a `multipart/form-data` body, section by section.
#[derive(Clone, Debug)]
pub struct BodyBuilder {
    boundary: String,
    buf: Vec<u8>,
}

impl Default for BodyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BodyBuilder {
    /// A builder with a random boundary.
    pub fn new() -> Self {
        let boundary = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(BOUNDARY_LEN)
            .map(char::from)
            .collect::<String>();

        Self::with_boundary(format!("----MockFormBoundary{}", boundary))
    }

    pub fn with_boundary<B: Into<String>>(boundary: B) -> Self {
        BodyBuilder {
            boundary: boundary.into(),
            buf: Vec::new(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// The `Content-Type` header value for this body.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Add a section with arbitrary headers.
    pub fn section(&mut self, headers: &[(&str, &str)], data: &[u8]) -> &mut Self {
        let mut head = format!("--{}\r\n", self.boundary);

        for (name, val) in headers {
            let _ = write!(head, "{}: {}\r\n", name, val);
        }

        head.push_str("\r\n");

        self.buf.extend_from_slice(head.as_bytes());
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\r\n");
        self
    }

    /// Add a text field.
    pub fn text(&mut self, name: &str, val: &str) -> &mut Self {
        let disp = format!("form-data; name=\"{}\"", name);
        self.section(&[("Content-Disposition", &disp)], val.as_bytes())
    }

    /// Add a file field.
    pub fn file(&mut self, name: &str, filename: &str, content_type: Option<&str>, data: &[u8]) -> &mut Self {
        let disp = format!("form-data; name=\"{}\"; filename=\"{}\"", name, filename);

        match content_type {
            Some(ct) => self.section(&[("Content-Disposition", &disp), ("Content-Type", ct)], data),
            None => self.section(&[("Content-Disposition", &disp)], data),
        }
    }

    /// The complete body, including the closing boundary.
    pub fn finish(&self) -> Vec<u8> {
        let mut body = self.buf.clone();
        body.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        body
    }
}

/// A reader that hands out its data in randomly sized pieces, like a network connection.
pub struct ChunkedReader<'a> {
    data: &'a [u8],
    rng: ThreadRng,
}

impl<'a> ChunkedReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ChunkedReader {
            data,
            rng: rand::thread_rng(),
        }
    }
}

impl<'a> Read for ChunkedReader<'a> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.data.is_empty() || out.is_empty() {
            return Ok(0);
        }

        let max = cmp::min(self.data.len(), out.len());
        let len = self.rng.gen_range(1..=max);

        out[..len].copy_from_slice(&self.data[..len]);
        self.data = &self.data[len..];

        Ok(len)
    }
}

/// An in-memory request.
#[derive(Clone, Debug)]
pub struct MockRequest {
    content_type: Option<String>,
    body: Vec<u8>,
}

impl MockRequest {
    pub fn new<C: Into<String>>(content_type: C, body: Vec<u8>) -> Self {
        MockRequest {
            content_type: Some(content_type.into()),
            body,
        }
    }

    /// A request without a `Content-Type` header.
    pub fn without_content_type(body: Vec<u8>) -> Self {
        MockRequest {
            content_type: None,
            body,
        }
    }
}

impl HttpRequest for MockRequest {
    type Body = Cursor<Vec<u8>>;

    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    fn body(self) -> Self::Body {
        Cursor::new(self.body)
    }
}

#[cfg(test)]
mod test {
    use super::{BodyBuilder, ChunkedReader};

    use std::io::Read;

    #[test]
    fn body_layout() {
        let mut body = BodyBuilder::with_boundary("b");
        body.text("key", "value");

        assert_eq!(
            body.finish(),
            b"--b\r\nContent-Disposition: form-data; name=\"key\"\r\n\r\nvalue\r\n--b--\r\n".to_vec()
        );
        assert_eq!(body.content_type(), "multipart/form-data; boundary=b");
    }

    #[test]
    fn chunked_reader_yields_everything() {
        let data = b"some data that arrives in pieces";
        let mut out = Vec::new();
        ChunkedReader::new(data).read_to_end(&mut out).unwrap();
        assert_eq!(out, data.to_vec());
    }
}
