// Copyright 2016 `multipart` Crate Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! Integration with [`tiny_http`](https://github.com/frewsxcv/tiny-http) with the `tiny_http`
//! feature (optional).
//!
//! Contains `impl HttpRequest for tiny_http::Request`, so a request can be handed straight to
//! `StreamUploader::upload()` or `Multipart::from_request()`.
use tiny_http::Request;

use super::HttpRequest;

use std::io::Read;

impl<'r> HttpRequest for &'r mut Request {
    type Body = &'r mut dyn Read;

    fn content_type(&self) -> Option<&str> {
        self.headers()
            .iter()
            .find(|header| header.field.equiv("Content-Type"))
            .map(|header| header.value.as_str())
    }

    fn body(self) -> Self::Body {
        self.as_reader()
    }
}
