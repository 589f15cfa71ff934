// Copyright 2016 `multipart` Crate Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! Limits applied while reading a `multipart/form-data` request.

/// The boundary length limit; RFC 2046 caps boundaries at 70 characters.
pub const DEFAULT_BOUNDARY_LENGTH_LIMIT: usize = 70;
pub const DEFAULT_VALUE_COUNT_LIMIT: usize = 1024;
pub const DEFAULT_VALUE_LENGTH_LIMIT: u64 = 4 * 1024 * 1024;
pub const DEFAULT_HEADERS_COUNT_LIMIT: usize = 16;
pub const DEFAULT_HEADERS_LENGTH_LIMIT: usize = 16 * 1024;
/// Ceiling for the small-file path, checked by callers with `FormFile::check_size()`.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 4_000_000;

/// Limits for reading a request, passed by value to whatever reads it.
///
/// ```rust
/// use multipart_upload::server::FormOptions;
///
/// let mut options = FormOptions::default();
/// options.value_count_limit(16).file_size_limit(10 * 1024 * 1024u64);
/// ```
#[derive(Clone, Debug)]
pub struct FormOptions {
    pub(crate) multipart_boundary_length_limit: usize,
    pub(crate) value_count_limit: usize,
    pub(crate) value_length_limit: u64,
    pub(crate) headers_count_limit: usize,
    pub(crate) headers_length_limit: usize,
    pub(crate) file_size_limit: Option<u64>,
    pub(crate) file_count_limit: Option<u32>,
    pub(crate) max_file_size: u64,
}

impl Default for FormOptions {
    fn default() -> Self {
        FormOptions {
            multipart_boundary_length_limit: DEFAULT_BOUNDARY_LENGTH_LIMIT,
            value_count_limit: DEFAULT_VALUE_COUNT_LIMIT,
            value_length_limit: DEFAULT_VALUE_LENGTH_LIMIT,
            headers_count_limit: DEFAULT_HEADERS_COUNT_LIMIT,
            headers_length_limit: DEFAULT_HEADERS_LENGTH_LIMIT,
            file_size_limit: None,
            file_count_limit: None,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl FormOptions {
    /// Set the maximum accepted length of the boundary token.
    pub fn multipart_boundary_length_limit(&mut self, limit: usize) -> &mut Self {
        self.multipart_boundary_length_limit = limit;
        self
    }

    /// Set the maximum number of form values accumulated in one request.
    pub fn value_count_limit(&mut self, limit: usize) -> &mut Self {
        self.value_count_limit = limit;
        self
    }

    /// Set the maximum length in bytes of a single form value.
    pub fn value_length_limit(&mut self, limit: u64) -> &mut Self {
        self.value_length_limit = limit;
        self
    }

    /// Set the maximum number of headers per section.
    pub fn headers_count_limit(&mut self, limit: usize) -> &mut Self {
        self.headers_count_limit = limit;
        self
    }

    /// Set the maximum length in bytes of one section's header block.
    pub fn headers_length_limit(&mut self, limit: usize) -> &mut Self {
        self.headers_length_limit = limit;
        self
    }

    /// Set the maximum number of bytes to write out *per file*.
    ///
    /// Can be `u64` or `Option<u64>`. If `None`, clears the limit.
    pub fn file_size_limit<L: Into<Option<u64>>>(&mut self, limit: L) -> &mut Self {
        self.file_size_limit = limit.into();
        self
    }

    /// Set the maximum number of files to write out.
    ///
    /// Can be `u32` or `Option<u32>`. If `None`, clears the limit.
    pub fn file_count_limit<L: Into<Option<u32>>>(&mut self, limit: L) -> &mut Self {
        self.file_count_limit = limit.into();
        self
    }

    /// Set the size ceiling for the small-file path.
    pub fn max_file_size(&mut self, max: u64) -> &mut Self {
        self.max_file_size = max;
        self
    }

    pub fn get_multipart_boundary_length_limit(&self) -> usize {
        self.multipart_boundary_length_limit
    }

    pub fn get_value_count_limit(&self) -> usize {
        self.value_count_limit
    }

    pub fn get_max_file_size(&self) -> u64 {
        self.max_file_size
    }
}
