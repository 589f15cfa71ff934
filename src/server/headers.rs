// Copyright 2016 `multipart` Crate Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! `Content-Type` and `Content-Disposition` parsing, and reading of section headers.

use httparse::{self, Status, EMPTY_HEADER};

use mime::Mime;

use encoding_rs::{Encoding, UTF_8};

use super::boundary::BoundaryReader;
use super::options::FormOptions;

use crate::error::{framing_error, UploadError, UploadResult};

use std::io::{BufRead, Read};
use std::str;

const CONTENT_DISPOSITION: &str = "Content-Disposition";
const CONTENT_TYPE: &str = "Content-Type";

/// A parsed `Content-Type` header value.
#[derive(Clone, Debug, PartialEq)]
pub struct ContentTypeHeader {
    mime: Mime,
}

impl ContentTypeHeader {
    /// Parse a raw header value such as `multipart/form-data; boundary="xyz"`.
    pub fn parse(val: &str) -> UploadResult<ContentTypeHeader> {
        val.trim()
            .parse::<Mime>()
            .map(|mime| ContentTypeHeader { mime })
            .map_err(|e| UploadError::invalid(format!("malformed content-type {:?}: {}", val, e)))
    }

    /// The parsed MIME type.
    pub fn mime(&self) -> &Mime {
        &self.mime
    }

    /// The `boundary` parameter with any surrounding quotes removed.
    pub fn boundary(&self) -> Option<&str> {
        self.mime
            .get_param(mime::BOUNDARY)
            .map(|val| trim_quotes(val.as_str()))
    }

    /// The `charset` parameter with any surrounding quotes removed.
    pub fn charset(&self) -> Option<&str> {
        self.mime
            .get_param(mime::CHARSET)
            .map(|val| trim_quotes(val.as_str()))
    }
}

impl From<Mime> for ContentTypeHeader {
    fn from(mime: Mime) -> Self {
        ContentTypeHeader { mime }
    }
}

/// A parsed `Content-Disposition` header value.
///
/// `Content-Disposition: form-data; name="myfile1"; filename="Misc 002.jpg"`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentDisposition {
    /// The disposition type, `form-data` for every well-formed form section.
    pub disposition_type: String,
    /// The form field name.
    pub name: Option<String>,
    /// The plain `filename` parameter.
    ///
    /// ##Warning
    /// This is an arbitrary string chosen by the client. Do not use it as a path without
    /// stripping it down to a single file name first.
    pub filename: Option<String>,
    /// The RFC 5987 `filename*` parameter, already percent- and charset-decoded.
    pub filename_star: Option<String>,
}

impl ContentDisposition {
    /// Parse a raw header value. Returns `None` if there is no disposition type at all.
    pub fn parse(val: &str) -> Option<ContentDisposition> {
        let mut params = split_params(val).into_iter();

        let disposition_type = params.next()?.trim();

        if disposition_type.is_empty() {
            return None;
        }

        let mut disp = ContentDisposition {
            disposition_type: disposition_type.to_owned(),
            ..ContentDisposition::default()
        };

        for param in params {
            let (name, value) = match param.split_once('=') {
                Some((name, value)) => (name.trim(), value.trim()),
                None => {
                    debug!("Ignoring Content-Disposition parameter without value: {:?}", param);
                    continue;
                }
            };

            if name.eq_ignore_ascii_case("name") {
                disp.name = Some(unquote(value));
            } else if name.eq_ignore_ascii_case("filename") {
                disp.filename = Some(unquote(value));
            } else if name.eq_ignore_ascii_case("filename*") {
                disp.filename_star = decode_ext_value(value);
            }
        }

        Some(disp)
    }
}

/// The headers at the start of one multipart section.
#[derive(Clone, Debug, Default)]
pub struct SectionHeaders {
    raw: Vec<(String, String)>,
    content_disposition: Option<ContentDisposition>,
    content_type: Option<ContentTypeHeader>,
}

impl SectionHeaders {
    /// Read the headers of the current section, consuming them and the blank line after them.
    pub(crate) fn read_from<R: Read>(
        reader: &mut BoundaryReader<R>,
        options: &FormOptions,
    ) -> UploadResult<SectionHeaders> {
        loop {
            let parsed = {
                let buf = reader.fill_buf().map_err(framing_error)?;
                let mut raw_headers = vec![EMPTY_HEADER; options.headers_count_limit];

                match httparse::parse_headers(buf, &mut raw_headers) {
                    Ok(Status::Complete((consume, parsed))) => {
                        if consume > options.headers_length_limit {
                            return Err(headers_too_long(options));
                        }

                        let mut raw = Vec::with_capacity(parsed.len());
                        for header in parsed.iter() {
                            raw.push((header.name.to_owned(), header_str(header.value)?.to_owned()));
                        }

                        Some((consume, raw))
                    }
                    Ok(Status::Partial) => {
                        if buf.len() > options.headers_length_limit {
                            return Err(headers_too_long(options));
                        }

                        None
                    }
                    Err(httparse::Error::TooManyHeaders) => {
                        return Err(UploadError::limit(format!(
                            "multipart headers count limit {} exceeded.",
                            options.headers_count_limit
                        )));
                    }
                    Err(e) => {
                        return Err(UploadError::invalid(format!("malformed section headers: {}", e)));
                    }
                }
            };

            match parsed {
                Some((consume, raw)) => {
                    reader.consume(consume);
                    debug!("Parsed section headers: {:?}", raw);
                    return Ok(SectionHeaders::from_raw(raw));
                }
                // Headers continue past what is buffered.
                None => if !reader.fill_more().map_err(framing_error)? {
                    return Err(UploadError::invalid("section ended inside its headers"));
                },
            }
        }
    }

    fn from_raw(raw: Vec<(String, String)>) -> SectionHeaders {
        let content_disposition = find_header(&raw, CONTENT_DISPOSITION)
            .and_then(ContentDisposition::parse);

        let content_type = find_header(&raw, CONTENT_TYPE).and_then(|val| {
            ContentTypeHeader::parse(val)
                .map_err(|e| debug!("Ignoring section Content-Type: {}", e))
                .ok()
        });

        SectionHeaders {
            raw,
            content_disposition,
            content_type,
        }
    }

    /// Look up a header by name, case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        find_header(&self.raw, name)
    }

    /// All headers in the order they were sent.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.raw.iter().map(|(name, val)| (name.as_str(), val.as_str()))
    }

    /// The parsed `Content-Disposition`, if present.
    pub fn content_disposition(&self) -> Option<&ContentDisposition> {
        self.content_disposition.as_ref()
    }

    /// The parsed `Content-Type`, if present and well-formed.
    pub fn content_type(&self) -> Option<&ContentTypeHeader> {
        self.content_type.as_ref()
    }
}

fn headers_too_long(options: &FormOptions) -> UploadError {
    UploadError::limit(format!(
        "multipart headers length limit {} exceeded.",
        options.headers_length_limit
    ))
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, val)| val.as_str())
}

fn header_str(val: &[u8]) -> UploadResult<&str> {
    str::from_utf8(val).map_err(|_| UploadError::invalid("section header value is not valid UTF-8"))
}

fn trim_quotes(s: &str) -> &str {
    s.trim_matches('"')
}

/// Split a header value on `;`, ignoring separators inside quoted strings.
fn split_params(val: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;

    for (idx, ch) in val.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => {
                params.push(&val[start..idx]);
                start = idx + 1;
            }
            _ => (),
        }
    }

    params.push(&val[start..]);
    params
}

/// Remove the quotes from a quoted-string, resolving backslash escapes.
fn unquote(val: &str) -> String {
    let inner = match val.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => inner,
        None => return val.to_owned(),
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(ch);
        }
    }

    out
}

/// Decode an RFC 5987 `ext-value`: `charset'[language]'percent-encoded-bytes`.
fn decode_ext_value(val: &str) -> Option<String> {
    let val = trim_quotes(val);

    let mut parts = val.splitn(3, '\'');
    let (charset, _lang, encoded) = match (parts.next(), parts.next(), parts.next()) {
        (Some(charset), Some(lang), Some(encoded)) => (charset, lang, encoded),
        _ => {
            warn!("Malformed filename* parameter: {:?}", val);
            return None;
        }
    };

    let encoding = if charset.is_empty() {
        UTF_8
    } else {
        match Encoding::for_label(charset.as_bytes()) {
            Some(encoding) => encoding,
            None => {
                warn!("Unknown charset {:?} in filename* parameter", charset);
                return None;
            }
        }
    };

    let bytes = urlencoding::decode_binary(encoded.as_bytes());
    let (decoded, _) = encoding.decode_without_bom_handling(&bytes);

    Some(decoded.into_owned())
}
