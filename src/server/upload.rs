// Copyright 2016 `multipart` Crate Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! Streaming a whole request to disk, one section at a time.

use encoding_rs::{Encoding, UTF_8};

use mime::Mime;

use super::accumulator::FormValueAccumulator;
use super::headers::{ContentDisposition, ContentTypeHeader};
use super::options::FormOptions;
use super::save::{self, FileSink, FormFile, LocalFs, SavedFile};
use super::section::MultipartSection;
use super::validate;
use super::{HttpRequest, Multipart};

use crate::error::{framing_error, UploadError, UploadResult};

use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Labels `encoding_rs` does not know, but which must never be honored.
const UTF7_LABELS: &[&str] = &[
    "utf-7",
    "utf7",
    "unicode-1-1-utf-7",
    "csunicode11utf7",
    "x-unicode20utf7",
];

/// A flag that aborts an upload in progress.
///
/// Checked before every section and before every chunk of a file section.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn check(&self) -> UploadResult<()> {
        if self.is_cancelled() {
            Err(UploadError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// The result of `StreamUploader::upload()`.
#[derive(Debug)]
pub struct Entries {
    /// The text fields of the request.
    pub fields: FormValueAccumulator,
    /// Every file saved, in the order they appeared in the request.
    pub files: Vec<SavedFile>,
    /// The directory the files were saved under.
    pub dir: PathBuf,
}

impl Entries {
    fn new(dir: PathBuf) -> Entries {
        Entries {
            fields: FormValueAccumulator::new(),
            files: Vec::new(),
            dir,
        }
    }

    /// The first file in the request, for callers that only ever expect one.
    pub fn first_file(&self) -> Option<&SavedFile> {
        self.files.first()
    }

    /// The path of the first file in the request.
    pub fn first_path(&self) -> Option<&Path> {
        self.first_file().map(|file| file.path.as_path())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.files.is_empty()
    }
}

/// Reads a `multipart/form-data` request to the end, writing file sections to a directory and
/// collecting text sections in memory.
///
/// ```rust,no_run
/// use multipart_upload::server::{FormOptions, StreamUploader};
///
/// # fn handle(content_type: &str, body: &[u8]) -> multipart_upload::UploadResult<()> {
/// let uploader = StreamUploader::new(FormOptions::default());
/// let entries = uploader.upload_body(Some(content_type), body, "/tmp/uploads")?;
///
/// for file in &entries.files {
///     println!("saved {}", file.path.display());
/// }
/// # Ok(())
/// # }
/// ```
///
/// ### Warning: Do **not** trust user input!
/// File sections are saved under the filename the client sent, reduced to its last path
/// component. Two concurrent requests sending the same filename to the same directory will
/// overwrite each other; give each request its own directory if that matters.
pub struct StreamUploader<S = LocalFs> {
    options: FormOptions,
    sink: S,
    cancel: CancelToken,
    create_dir: bool,
}

impl StreamUploader<LocalFs> {
    /// An uploader writing to the local filesystem.
    pub fn new(options: FormOptions) -> Self {
        Self::with_sink(options, LocalFs)
    }
}

impl<S: FileSink> StreamUploader<S> {
    pub fn with_sink(options: FormOptions, sink: S) -> Self {
        StreamUploader {
            options,
            sink,
            cancel: CancelToken::new(),
            create_dir: false,
        }
    }

    /// Abort uploads when `token` is cancelled.
    pub fn cancel_token(&mut self, token: CancelToken) -> &mut Self {
        self.cancel = token;
        self
    }

    /// Create the target directory if it is missing, instead of failing with `NotFound`.
    pub fn create_missing_dir(&mut self, create: bool) -> &mut Self {
        self.create_dir = create;
        self
    }

    pub fn options(&self) -> &FormOptions {
        &self.options
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Upload everything in `req`, which must carry a `multipart/` content type.
    pub fn upload<Q: HttpRequest, P: AsRef<Path>>(&self, req: Q, dir: P) -> UploadResult<Entries> {
        let mut multipart = Multipart::from_request(req, self.options.clone())?;
        self.upload_sections(&mut multipart, dir)
    }

    /// Upload a raw request body, given the request's `Content-Type` header, which must name a
    /// `multipart/` type.
    pub fn upload_body<R: Read, P: AsRef<Path>>(
        &self,
        content_type: Option<&str>,
        body: R,
        dir: P,
    ) -> UploadResult<Entries> {
        validate::require_multipart(content_type)?;

        let content_type = content_type.map(ContentTypeHeader::parse).transpose()?;
        let boundary = validate::get_boundary(
            content_type.as_ref(),
            self.options.multipart_boundary_length_limit,
        )?;

        debug!("Boundary: {}", boundary);

        let mut multipart = Multipart::with_options(body, boundary, self.options.clone());
        self.upload_sections(&mut multipart, dir)
    }

    /// Read every remaining section of `multipart`.
    pub fn upload_sections<R: Read, P: AsRef<Path>>(
        &self,
        multipart: &mut Multipart<R>,
        dir: P,
    ) -> UploadResult<Entries> {
        let dir = dir.as_ref();
        self.prepare_dir(dir)?;

        let mut entries = Entries::new(dir.to_owned());

        loop {
            self.cancel.check()?;

            let mut section = match multipart.read_section()? {
                Some(section) => section,
                None => break,
            };

            let disp = section.content_disposition().cloned();

            if validate::has_file_content_disposition(disp.as_ref()) {
                if let Some(limit) = self.options.file_count_limit {
                    if entries.files.len() as u64 >= u64::from(limit) {
                        return Err(UploadError::limit(format!("file count limit {} exceeded.", limit)));
                    }
                }

                let saved = self.save_file_section(&mut section, disp.as_ref(), dir)?;
                entries.files.push(saved);
            } else if validate::has_form_data_content_disposition(disp.as_ref()) {
                self.accumulate_form_section(&mut section, disp.as_ref(), &mut entries.fields)?;
            } else {
                let skipped = section.drain().map_err(framing_error)?;
                debug!("Skipped {} bytes of a section without form-data disposition", skipped);
            }
        }

        Ok(entries)
    }

    /// Copy a whole `FormFile` into `dir`. See `save::upload_small_file()`.
    pub fn upload_small_file<R: Read, P: AsRef<Path>>(&self, file: FormFile<R>, dir: P) -> UploadResult<SavedFile> {
        save::upload_small_file(&self.sink, file, dir.as_ref())
    }

    fn prepare_dir(&self, dir: &Path) -> UploadResult<()> {
        if self.sink.exists(dir) {
            return Ok(());
        }

        if self.create_dir {
            self.sink.make_dir(dir)?;
            Ok(())
        } else {
            Err(UploadError::NotFound(format!("target directory {} not found.", dir.display())))
        }
    }

    fn save_file_section<R: Read>(
        &self,
        section: &mut MultipartSection<R>,
        disp: Option<&ContentDisposition>,
        dir: &Path,
    ) -> UploadResult<SavedFile> {
        // `filename*` marks a file section but never names the destination.
        let raw_filename = disp
            .and_then(|disp| disp.filename.as_deref())
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| UploadError::invalid("filename missing from content disposition"))?;

        let path = dir.join(save::sanitize_filename(raw_filename)?);

        let content_type = section
            .content_type()
            .map(|ct| ct.mime().clone())
            .unwrap_or_else(|| guess_mime(raw_filename));

        let mut out = self.sink.create(&path)?;
        let size = copy_section(section, &mut out, self.options.file_size_limit, &self.cancel)?;
        out.commit()?;

        debug!("Copied the uploaded file {:?} ({} bytes)", path, size);

        Ok(SavedFile {
            path,
            filename: Some(raw_filename.to_owned()),
            content_type,
            size,
        })
    }

    fn accumulate_form_section<R: Read>(
        &self,
        section: &mut MultipartSection<R>,
        disp: Option<&ContentDisposition>,
        fields: &mut FormValueAccumulator,
    ) -> UploadResult<()> {
        // The key length is already bounded by the headers length limit.
        let key = disp.and_then(|disp| disp.name.clone()).unwrap_or_default();

        let encoding = get_encoding(section);
        let mut value = section.read_text(encoding, self.options.value_length_limit)?;

        if value.eq_ignore_ascii_case("undefined") {
            value.clear();
        }

        fields.append(key, value);

        if fields.value_count() > self.options.value_count_limit {
            return Err(UploadError::limit(format!(
                "form key count limit {} exceeded.",
                self.options.value_count_limit
            )));
        }

        Ok(())
    }
}

/// Determine the text encoding of a section from its `Content-Type` charset.
///
/// Falls back to UTF-8 when there is no usable charset. UTF-7 is never honored.
pub fn get_encoding<R: Read>(section: &MultipartSection<R>) -> &'static Encoding {
    let charset = match section.content_type().and_then(ContentTypeHeader::charset) {
        Some(charset) => charset.trim(),
        None => return UTF_8,
    };

    if UTF7_LABELS.iter().any(|label| charset.eq_ignore_ascii_case(label)) {
        warn!("Refusing to decode a form value as UTF-7; using UTF-8");
        return UTF_8;
    }

    Encoding::for_label(charset.as_bytes()).unwrap_or_else(|| {
        warn!("Unknown charset {:?}; using UTF-8", charset);
        UTF_8
    })
}

fn guess_mime(filename: &str) -> Mime {
    mime_guess::from_path(filename).first_or_octet_stream()
}

/// Stream a section's body into `out`, chunk by chunk.
fn copy_section<B: BufRead, W: Write + ?Sized>(
    body: &mut B,
    out: &mut W,
    limit: Option<u64>,
    cancel: &CancelToken,
) -> UploadResult<u64> {
    let mut written = 0u64;

    loop {
        cancel.check()?;

        let chunk = match body.fill_buf() {
            Ok(chunk) => chunk,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(framing_error(e)),
        };

        if chunk.is_empty() {
            break;
        }

        let len = chunk.len();

        if let Some(limit) = limit {
            if written + len as u64 > limit {
                return Err(UploadError::limit(format!("file size limit {} exceeded.", limit)));
            }
        }

        out.write_all(chunk)?;
        body.consume(len);
        written += len as u64;
    }

    Ok(written)
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::error::ErrorKind;
    use crate::mock::BodyBuilder;

    use std::fs;

    fn uploader() -> StreamUploader {
        StreamUploader::new(FormOptions::default())
    }

    #[test]
    fn encoding_from_charset() {
        let mut body = BodyBuilder::with_boundary("b");
        body.section(&[("Content-Disposition", "form-data; name=\"a\""),
                       ("Content-Type", "text/plain; charset=iso-8859-1")], b"x")
            .section(&[("Content-Disposition", "form-data; name=\"b\""),
                       ("Content-Type", "text/plain; charset=utf-7")], b"x")
            .section(&[("Content-Disposition", "form-data; name=\"c\"")], b"x")
            .section(&[("Content-Disposition", "form-data; name=\"d\""),
                       ("Content-Type", "text/plain; charset=no-such-charset")], b"x");
        let body = body.finish();

        let mut multipart = Multipart::with_body(&body[..], "b");

        let expected = [encoding_rs::WINDOWS_1252, UTF_8, UTF_8, UTF_8];

        for expected in &expected {
            let section = multipart.read_section().unwrap().unwrap();
            assert_eq!(get_encoding(&section), *expected);
        }

        assert!(multipart.read_section().unwrap().is_none());
    }

    #[test]
    fn latin1_value_is_decoded() {
        let mut body = BodyBuilder::with_boundary("b");
        body.section(&[("Content-Disposition", "form-data; name=\"price\""),
                       ("Content-Type", "text/plain; charset=iso-8859-1")], b"\xa35");
        let body = body.finish();

        let dir = tempfile::tempdir().unwrap();
        let entries = uploader()
            .upload_body(Some("multipart/form-data; boundary=b"), &body[..], dir.path())
            .unwrap();

        assert_eq!(entries.fields.get("price"), Some("\u{a3}5"));
    }

    #[test]
    fn file_size_limit_leaves_nothing_behind() {
        let mut body = BodyBuilder::with_boundary("b");
        body.file("upload", "big.bin", None, &[0u8; 100]);
        let body = body.finish();

        let mut options = FormOptions::default();
        options.file_size_limit(10u64);

        let dir = tempfile::tempdir().unwrap();
        let err = StreamUploader::new(options)
            .upload_body(Some("multipart/form-data; boundary=b"), &body[..], dir.path())
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::LimitExceeded);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn file_count_limit() {
        let mut body = BodyBuilder::with_boundary("b");
        body.file("one", "1.txt", None, b"1").file("two", "2.txt", None, b"2");
        let body = body.finish();

        let mut options = FormOptions::default();
        options.file_count_limit(1u32);

        let dir = tempfile::tempdir().unwrap();
        let err = StreamUploader::new(options)
            .upload_body(Some("multipart/form-data; boundary=b"), &body[..], dir.path())
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::LimitExceeded);
        assert!(dir.path().join("1.txt").exists());
        assert!(!dir.path().join("2.txt").exists());
    }

    #[test]
    fn cancelled_before_start() {
        let mut body = BodyBuilder::with_boundary("b");
        body.file("f", "a.txt", None, b"data");
        let body = body.finish();

        let token = CancelToken::new();
        token.cancel();

        let mut uploader = uploader();
        uploader.cancel_token(token);

        let dir = tempfile::tempdir().unwrap();
        let err = uploader
            .upload_body(Some("multipart/form-data; boundary=b"), &body[..], dir.path())
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(!dir.path().join("a.txt").exists());
    }

    #[test]
    fn missing_dir_is_created_on_request() {
        let mut body = BodyBuilder::with_boundary("b");
        body.file("f", "a.txt", None, b"data");
        let body = body.finish();

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("uploads");

        let err = uploader()
            .upload_body(Some("multipart/form-data; boundary=b"), &body[..], &target)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let mut creating = uploader();
        creating.create_missing_dir(true);

        let entries = creating
            .upload_body(Some("multipart/form-data; boundary=b"), &body[..], &target)
            .unwrap();
        assert_eq!(entries.first_path(), Some(target.join("a.txt").as_path()));
    }

    #[test]
    fn file_is_named_by_plain_filename() {
        let mut body = BodyBuilder::with_boundary("b");
        body.section(&[("Content-Disposition",
                        "form-data; name=\"f\"; filename=\"plain.txt\"; filename*=UTF-8''%c3%a9t%c3%a9.txt")],
                     b"summer");
        let body = body.finish();

        let dir = tempfile::tempdir().unwrap();
        let entries = uploader()
            .upload_body(Some("multipart/form-data; boundary=b"), &body[..], dir.path())
            .unwrap();

        let file = entries.first_file().unwrap();
        assert_eq!(file.path, dir.path().join("plain.txt"));
        assert_eq!(file.content_type, mime::TEXT_PLAIN);
        assert!(!dir.path().join("\u{e9}t\u{e9}.txt").exists());
    }

    #[test]
    fn filename_star_alone_is_rejected() {
        let mut body = BodyBuilder::with_boundary("b");
        body.section(&[("Content-Disposition", "form-data; name=\"f\"; filename*=UTF-8''x.txt")], b"data")
            .text("after", "never read");
        let body = body.finish();

        let dir = tempfile::tempdir().unwrap();
        let err = uploader()
            .upload_body(Some("multipart/form-data; boundary=b"), &body[..], dir.path())
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
        assert_eq!(err.to_string(), "invalid multipart data: filename missing from content disposition");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn truncated_file_is_not_saved() {
        let body = b"--b\r\nContent-Disposition: form-data; name=\"f\"; filename=\"a.txt\"\r\n\r\npartial content";

        let dir = tempfile::tempdir().unwrap();
        let err = uploader()
            .upload_body(Some("multipart/form-data; boundary=b"), &body[..], dir.path())
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
        assert!(!dir.path().join("a.txt").exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    /// Hands out the body a kilobyte at a time and fires `token` once `after` bytes are out.
    struct CancellingReader<'a> {
        data: &'a [u8],
        token: CancelToken,
        after: usize,
        sent: usize,
    }

    impl<'a> Read for CancellingReader<'a> {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            let len = self.data.len().min(out.len()).min(1024);
            out[..len].copy_from_slice(&self.data[..len]);
            self.data = &self.data[len..];
            self.sent += len;

            if self.sent > self.after {
                self.token.cancel();
            }

            Ok(len)
        }
    }

    #[test]
    fn cancelled_mid_file() {
        let mut body = BodyBuilder::with_boundary("b");
        body.file("f", "big.bin", None, &[7u8; 100 * 1024]);
        let body = body.finish();

        let token = CancelToken::new();
        let mut uploader = uploader();
        uploader.cancel_token(token.clone());

        let reader = CancellingReader {
            data: &body,
            token,
            after: 8 * 1024,
            sent: 0,
        };

        let dir = tempfile::tempdir().unwrap();
        let err = uploader
            .upload_body(Some("multipart/form-data; boundary=b"), reader, dir.path())
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn body_needs_multipart_content_type() {
        let mut body = BodyBuilder::with_boundary("x");
        body.text("a", "1");
        let body = body.finish();

        let dir = tempfile::tempdir().unwrap();
        let err = uploader()
            .upload_body(Some("application/json; boundary=x"), &body[..], dir.path())
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    }

    #[test]
    fn section_without_disposition_is_skipped() {
        let mut body = BodyBuilder::with_boundary("b");
        body.section(&[("Content-Type", "text/plain")], b"ignored")
            .section(&[("Content-Disposition", "attachment; filename=\"x.txt\"")], b"ignored")
            .text("key", "value");
        let body = body.finish();

        let dir = tempfile::tempdir().unwrap();
        let entries = uploader()
            .upload_body(Some("multipart/form-data; boundary=b"), &body[..], dir.path())
            .unwrap();

        assert!(entries.files.is_empty());
        assert_eq!(entries.fields.value_count(), 1);
        assert_eq!(entries.fields.get("key"), Some("value"));
    }
}
