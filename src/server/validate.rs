// Copyright 2016 `multipart` Crate Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! Boundary validation and classification of sections by their `Content-Disposition`.

use super::headers::{ContentDisposition, ContentTypeHeader};

use crate::error::{UploadError, UploadResult};

const FORM_DATA: &str = "form-data";

/// Extract the boundary from a request's content type, quotes removed.
///
/// `Content-Type: multipart/form-data; boundary="----WebKitFormBoundarymx2fSWqWSd0OxQqq"`
pub fn get_boundary(content_type: Option<&ContentTypeHeader>, length_limit: usize) -> UploadResult<String> {
    let content_type = content_type.ok_or_else(|| UploadError::invalid("missing content-type"))?;

    let boundary = match content_type.boundary() {
        Some(boundary) if !boundary.trim().is_empty() => boundary,
        _ => return Err(UploadError::invalid("missing content-type boundary")),
    };

    if boundary.len() > length_limit {
        return Err(UploadError::limit(format!(
            "multipart boundary length limit {} exceeded.",
            length_limit
        )));
    }

    Ok(boundary.to_owned())
}

/// `true` if `content_type` names any `multipart/` type.
pub fn is_multipart_content_type(content_type: Option<&str>) -> bool {
    match content_type {
        Some(ct) if !ct.trim().is_empty() => ct.to_ascii_lowercase().contains("multipart/"),
        _ => false,
    }
}

/// Fail with `InvalidFormat` unless `content_type` names a `multipart/` type.
pub(crate) fn require_multipart(content_type: Option<&str>) -> UploadResult<()> {
    if is_multipart_content_type(content_type) {
        Ok(())
    } else {
        Err(UploadError::invalid(format!(
            "expected multipart content, received {:?}",
            content_type
        )))
    }
}

/// `true` for a plain form field: `Content-Disposition: form-data; name="key"`.
pub fn has_form_data_content_disposition(disp: Option<&ContentDisposition>) -> bool {
    match disp {
        Some(disp) => {
            disp.disposition_type == FORM_DATA
                && is_blank(&disp.filename)
                && is_blank(&disp.filename_star)
        }
        None => false,
    }
}

/// `true` for a file: `Content-Disposition: form-data; name="myfile1"; filename="Misc 002.jpg"`.
pub fn has_file_content_disposition(disp: Option<&ContentDisposition>) -> bool {
    match disp {
        Some(disp) => {
            disp.disposition_type == FORM_DATA
                && (!is_blank(&disp.filename) || !is_blank(&disp.filename_star))
        }
        None => false,
    }
}

fn is_blank(val: &Option<String>) -> bool {
    val.as_deref().map_or(true, |s| s.trim().is_empty())
}
