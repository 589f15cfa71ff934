// Copyright 2016 `multipart` Crate Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! Streaming uploads of `multipart/form-data` requests.
//!
//! The request body is never buffered whole: it is split on its boundary one section at a
//! time, file sections are copied straight to disk and text sections are decoded into a
//! `FormValueAccumulator`, subject to the limits in `FormOptions`.
//!
//! ```rust,no_run
//! use multipart_upload::server::{FormOptions, StreamUploader};
//!
//! # fn handle(content_type: Option<&str>, body: &[u8]) -> multipart_upload::UploadResult<()> {
//! let entries = StreamUploader::new(FormOptions::default())
//!     .upload_body(content_type, body, "uploads")?;
//!
//! if let Some(path) = entries.first_path() {
//!     println!("file saved to {}", path.display());
//! }
//!
//! for (key, values) in entries.fields.iter() {
//!     println!("{} = {:?}", key, values);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Cargo Features
//!
//! * `mock` (default): in-memory requests and body builders, in the `mock` module.
//! * `tiny_http`: `server::HttpRequest` for `tiny_http::Request`.

#[macro_use]
extern crate log;
#[macro_use]
extern crate quick_error;

pub mod error;
pub mod server;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use crate::error::{ErrorKind, UploadError, UploadResult};
