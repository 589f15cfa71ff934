// Copyright 2016 `multipart` Crate Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! Utilities for saving uploaded files to the filesystem.

use mime::Mime;

use tempfile::NamedTempFile;

use crate::error::{UploadError, UploadResult};

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// A file being written that is not visible at its destination yet.
///
/// Dropping it without calling `commit()` discards everything written.
pub trait PendingFile: Write {
    /// Move the written data to its destination path, replacing any existing file.
    fn commit(self: Box<Self>) -> io::Result<()>;
}

/// Where uploaded files are written.
pub trait FileSink {
    /// Start writing a file that will end up at `path`.
    fn create(&self, path: &Path) -> io::Result<Box<dyn PendingFile>>;

    fn exists(&self, path: &Path) -> bool;

    /// Create `path` and any missing parents.
    fn make_dir(&self, path: &Path) -> io::Result<()>;
}

/// The local filesystem.
///
/// Files are written to a temporary file next to the destination and renamed over it once
/// complete, so a failed upload never leaves a half-written file behind.
#[derive(Copy, Clone, Debug, Default)]
pub struct LocalFs;

struct LocalPendingFile {
    file: NamedTempFile,
    dest: PathBuf,
}

impl Write for LocalPendingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl PendingFile for LocalPendingFile {
    fn commit(self: Box<Self>) -> io::Result<()> {
        let LocalPendingFile { mut file, dest } = *self;
        file.flush()?;
        file.persist(&dest).map_err(|e| e.error)?;
        Ok(())
    }
}

impl FileSink for LocalFs {
    fn create(&self, path: &Path) -> io::Result<Box<dyn PendingFile>> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let file = NamedTempFile::new_in(dir)?;

        Ok(Box::new(LocalPendingFile {
            file,
            dest: path.to_owned(),
        }))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn make_dir(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }
}

/// A file saved to the local filesystem from a multipart request.
#[derive(Clone, Debug, PartialEq)]
pub struct SavedFile {
    /// The complete path this file was saved at.
    pub path: PathBuf,

    /// The original filename of this file, as sent by the client.
    ///
    /// ##Warning
    /// You should treat this value as untrustworthy because it is an arbitrary string provided by
    /// the client.
    pub filename: Option<String>,

    /// The MIME type sent by the client, or guessed from the filename.
    pub content_type: Mime,

    /// The number of bytes written to the disk.
    pub size: u64,
}

/// A whole file handed over by the caller, for uploads small enough to not need streaming.
#[derive(Debug)]
pub struct FormFile<R> {
    file_name: String,
    content_type: Mime,
    length: Option<u64>,
    reader: R,
}

impl<R: Read> FormFile<R> {
    /// The content type is guessed from `file_name`.
    pub fn new<N: Into<String>>(file_name: N, reader: R) -> Self {
        let file_name = file_name.into();
        let content_type = mime_guess::from_path(&file_name).first_or_octet_stream();

        FormFile {
            file_name,
            content_type,
            length: None,
            reader,
        }
    }

    pub fn with_content_type(mut self, content_type: Mime) -> Self {
        self.content_type = content_type;
        self
    }

    /// Declare the length of the file, for `check_size()`.
    pub fn with_length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> &Mime {
        &self.content_type
    }

    pub fn length(&self) -> Option<u64> {
        self.length
    }

    /// Reject the file if its declared length is over `max` bytes.
    pub fn check_size(&self, max: u64) -> UploadResult<()> {
        match self.length {
            Some(len) if len > max => Err(UploadError::limit(format!(
                "{} is too large. Max size is {} bytes.",
                self.file_name, max
            ))),
            _ => Ok(()),
        }
    }
}

impl FormFile<File> {
    /// Open a file on disk, taking its name and length from the filesystem.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;

        let file = File::open(path)?;
        let length = file.metadata()?.len();

        Ok(FormFile::new(file_name, file).with_length(length))
    }
}

/// Copy a whole `FormFile` to `{dir}/{file name}`, replacing any existing file.
///
/// `dir` must already exist. The size ceiling is the caller's to check, with
/// `FormFile::check_size()`.
pub fn upload_small_file<R, S>(sink: &S, mut file: FormFile<R>, dir: &Path) -> UploadResult<SavedFile>
where
    R: Read,
    S: FileSink + ?Sized,
{
    if dir.as_os_str().is_empty() || dir.to_string_lossy().trim().is_empty() {
        return Err(UploadError::invalid("target directory is empty"));
    }

    if !sink.exists(dir) {
        return Err(UploadError::NotFound(format!("target directory {} not found.", dir.display())));
    }

    let filename = sanitize_filename(&file.file_name)?;
    let path = dir.join(filename);

    let mut out = sink.create(&path)?;
    let size = retry_on_interrupt(|| io::copy(&mut file.reader, &mut out))?;
    out.commit()?;

    debug!("Saved {:?} ({} bytes) to {:?}", file.file_name, size, path);

    Ok(SavedFile {
        path,
        filename: Some(file.file_name),
        content_type: file.content_type,
        size,
    })
}

/// Reduce a client-supplied filename to a bare file name.
///
/// Some clients send the full path of the file on their machine; only the last component is
/// kept.
pub fn sanitize_filename(raw: &str) -> UploadResult<&str> {
    let trimmed = raw.trim();
    let name = trimmed.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(trimmed).trim();

    if name != trimmed {
        warn!("Stripped directory components from client filename {:?}", raw);
    }

    match name {
        "" | "." | ".." => Err(UploadError::invalid(format!("unusable filename {:?}", raw))),
        name if name.contains('\0') => Err(UploadError::invalid(format!("unusable filename {:?}", raw))),
        name => Ok(name),
    }
}

pub(crate) fn retry_on_interrupt<F, T>(mut do_fn: F) -> io::Result<T>
where
    F: FnMut() -> io::Result<T>,
{
    loop {
        match do_fn() {
            Ok(val) => return Ok(val),
            Err(err) => {
                if err.kind() != io::ErrorKind::Interrupted {
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::error::ErrorKind;

    use std::io::Cursor;

    #[test]
    fn small_file_is_copied() {
        let dir = tempfile::tempdir().unwrap();

        let file = FormFile::new("report.csv", Cursor::new(b"a,b,c".to_vec()));
        let saved = upload_small_file(&LocalFs, file, dir.path()).unwrap();

        assert_eq!(saved.path, dir.path().join("report.csv"));
        assert_eq!(saved.size, 5);
        assert_eq!(saved.content_type, mime::TEXT_CSV);
        assert_eq!(fs::read(&saved.path).unwrap(), b"a,b,c");
    }

    #[test]
    fn small_file_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"old contents").unwrap();

        let file = FormFile::new("a.txt", Cursor::new(b"new".to_vec()));
        upload_small_file(&LocalFs, file, dir.path()).unwrap();

        assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"new");
    }

    #[test]
    fn small_file_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");

        let file = FormFile::new("a.txt", Cursor::new(b"data".to_vec()));
        let err = upload_small_file(&LocalFs, file, &missing).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!missing.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn small_file_blank_dir() {
        let file = FormFile::new("a.txt", Cursor::new(Vec::new()));
        let err = upload_small_file(&LocalFs, file, Path::new(" ")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    }

    #[test]
    fn size_check() {
        let file = FormFile::new("big.bin", Cursor::new(Vec::new())).with_length(4_000_001);
        assert_eq!(file.check_size(4_000_000).unwrap_err().kind(), ErrorKind::LimitExceeded);
        assert!(file.check_size(5_000_000).is_ok());

        let unknown = FormFile::new("unknown.bin", Cursor::new(Vec::new()));
        assert!(unknown.check_size(0).is_ok());
    }

    #[test]
    fn open_takes_name_and_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, b"hello").unwrap();

        let file = FormFile::open(&path).unwrap();
        assert_eq!(file.file_name(), "notes.txt");
        assert_eq!(file.length(), Some(5));
        assert_eq!(file.content_type(), &mime::TEXT_PLAIN);
    }

    #[test]
    fn uncommitted_file_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.bin");

        {
            let mut pending = LocalFs.create(&path).unwrap();
            pending.write_all(b"half").unwrap();
        }

        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(sanitize_filename("a.jpg").unwrap(), "a.jpg");
        assert_eq!(sanitize_filename("C:\\Users\\me\\a.jpg").unwrap(), "a.jpg");
        assert_eq!(sanitize_filename("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(sanitize_filename("..").unwrap_err().kind(), ErrorKind::InvalidFormat);
        assert_eq!(sanitize_filename("dir/").unwrap_err().kind(), ErrorKind::InvalidFormat);
    }
}
