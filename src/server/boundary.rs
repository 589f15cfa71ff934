// Copyright 2016 `multipart` Crate Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Boundary parsing for `multipart` requests.

use buffer_redux::BufReader;

use std::cmp;
use std::io;
use std::io::prelude::*;

const DEFAULT_BUF_SIZE: usize = 64 * 1024;

/// A struct implementing `Read` and `BufRead` that will yield bytes until it sees a given sequence.
///
/// The sequence is the delimiter `\r\n--<boundary>`; the CRLF in front of it belongs to the
/// delimiter, not to the section body.
#[derive(Debug)]
pub struct BoundaryReader<R> {
    source: BufReader<R>,
    boundary: Vec<u8>,
    search_idx: usize,
    boundary_read: bool,
    started: bool,
    at_end: bool,
}

impl<R> BoundaryReader<R> where R: Read {
    /// Wrap `reader`, splitting it on `boundary` (without the leading dashes).
    pub fn from_reader<B: AsRef<str>>(reader: R, boundary: B) -> BoundaryReader<R> {
        let mut delim = b"\r\n--".to_vec();
        delim.extend_from_slice(boundary.as_ref().as_bytes());

        BoundaryReader {
            source: BufReader::with_capacity(DEFAULT_BUF_SIZE, reader),
            boundary: delim,
            search_idx: 0,
            boundary_read: false,
            started: false,
            at_end: false,
        }
    }

    fn read_to_boundary(&mut self) -> io::Result<&[u8]> {
        let min = self.boundary.len() + 4;
        let buf = fill_buf_min(&mut self.source, min)?;

        trace!("Buf: {:?}", String::from_utf8_lossy(buf));

        if !(self.boundary_read || self.at_end) {
            match twoway::find_bytes(&buf[self.search_idx..], &self.boundary) {
                Some(found) => {
                    self.search_idx += found;
                    self.boundary_read = true;
                },
                None => {
                    // The tail of the buffer could be the start of a split delimiter;
                    // everything before it is safe to hand out.
                    let safe_len = buf.len().saturating_sub(self.boundary.len() - 1);
                    self.search_idx = cmp::max(self.search_idx, safe_len);

                    // A short buffer means the source is exhausted.
                    if buf.len() < min && self.search_idx == 0 {
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "multipart body ended before the closing boundary",
                        ));
                    }
                },
            }
        }

        debug!(
            "Buf len: {} Search idx: {} Boundary read: {:?}",
            buf.len(), self.search_idx, self.boundary_read
        );

        Ok(&buf[..self.search_idx])
    }

    /// Buffer more of the current section so `fill_buf()` can return a longer slice.
    ///
    /// Returns `false` if the section has no more bytes to give.
    pub(crate) fn fill_more(&mut self) -> io::Result<bool> {
        if self.boundary_read || self.at_end {
            return Ok(false);
        }

        let visible = self.search_idx;
        let buf_len = self.source.buf_len();

        if fill_buf_min(&mut self.source, buf_len + 1)?.len() == buf_len {
            return Ok(false);
        }

        Ok(self.read_to_boundary()?.len() > visible)
    }

    /// Skip the rest of the current section and the following delimiter.
    ///
    /// Returns `Ok(true)` if another section follows, `Ok(false)` once the closing
    /// delimiter has been read.
    pub fn consume_boundary(&mut self) -> io::Result<bool> {
        if self.at_end {
            return Ok(false);
        }

        if !self.started {
            self.started = true;

            // The first delimiter usually opens the body, without a CRLF in front of it.
            let dashes = &self.boundary[2..];
            if fill_buf_min(&mut self.source, dashes.len())?.starts_with(dashes) {
                let len = dashes.len();
                self.source.consume(len);
                return self.after_boundary();
            }
        }

        loop {
            let buf_len = self.read_to_boundary()?.len();

            if buf_len == 0 {
                break;
            }

            self.consume(buf_len);
        }

        if !self.boundary_read {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "multipart body ended before the closing boundary",
            ));
        }

        let len = self.boundary.len();
        self.source.consume(len);

        self.after_boundary()
    }

    fn after_boundary(&mut self) -> io::Result<bool> {
        self.search_idx = 0;
        self.boundary_read = false;

        // Transport padding may follow the delimiter.
        loop {
            let padding = {
                let buf = fill_buf_min(&mut self.source, 2)?;
                buf.iter().take_while(|&&b| b == b' ' || b == b'\t').count()
            };

            if padding == 0 {
                break;
            }

            self.source.consume(padding);
        }

        let buf = fill_buf_min(&mut self.source, 2)?;

        if buf.starts_with(b"--") {
            debug!("Closing boundary read");
            self.at_end = true;
            return Ok(false);
        }

        if buf.starts_with(b"\r\n") {
            self.source.consume(2);
            return Ok(true);
        }

        let kind = if buf.len() < 2 {
            io::ErrorKind::UnexpectedEof
        } else {
            io::ErrorKind::InvalidData
        };

        Err(io::Error::new(
            kind,
            format!("expected {:?} or {:?} after boundary, got {:?}", "\r\n", "--",
                    String::from_utf8_lossy(&buf[..cmp::min(buf.len(), 2)])),
        ))
    }

    /// `true` once the closing delimiter has been read.
    pub fn at_end(&self) -> bool {
        self.at_end
    }

    #[doc(hidden)]
    pub fn get_ref(&self) -> &R {
        self.source.get_ref()
    }
}

impl<R> Read for BoundaryReader<R> where R: Read {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let consume_len = {
            let buf = self.read_to_boundary()?;
            let trunc_len = cmp::min(buf.len(), out.len());
            out[..trunc_len].copy_from_slice(&buf[..trunc_len]);
            trunc_len
        };

        self.consume(consume_len);

        Ok(consume_len)
    }
}

impl<R> BufRead for BoundaryReader<R> where R: Read {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.read_to_boundary()
    }

    fn consume(&mut self, amt: usize) {
        let true_amt = cmp::min(amt, self.search_idx);
        self.source.consume(true_amt);
        self.search_idx -= true_amt;
    }
}

/// Read until at least `min` bytes are buffered or the source is exhausted.
fn fill_buf_min<R: Read>(source: &mut BufReader<R>, min: usize) -> io::Result<&[u8]> {
    while source.buf_len() < min {
        source.make_room();

        if source.capacity() == source.buf_len() {
            let additional = min - source.buf_len();
            source.reserve(additional);
        }

        match source.read_into_buf() {
            Ok(0) => break,
            Ok(_) => (),
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => (),
            Err(e) => return Err(e),
        }
    }

    Ok(source.buffer())
}
