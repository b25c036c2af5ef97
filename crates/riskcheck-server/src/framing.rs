//! Header and body reading shared by the stdio and HTTP transports.
//!
//! A request carries eight numbers, so bodies are capped well below anything a
//! client could use to exhaust memory. The cap is checked against the declared
//! `Content-Length` before any buffer is allocated.

use std::io::{self, BufRead, Read};

use thiserror::Error;

pub const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("declared body of {0} bytes exceeds the {MAX_BODY_BYTES} byte limit")]
    TooLarge(usize),

    #[error("invalid content-length `{0}`")]
    BadLength(String),

    #[error("missing content-length header")]
    MissingLength,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// True for a line that opens a `Content-Length` framed stdio message.
pub fn is_frame_header(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    lower.starts_with("content-length:") || lower.starts_with("content-type:")
}

/// Value of a `Content-Length` header line; `Ok(None)` for any other header.
pub fn parse_content_length(line: &str) -> Result<Option<usize>, FrameError> {
    let Some((name, value)) = line.split_once(':') else {
        return Ok(None);
    };
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return Ok(None);
    }
    let value = value.trim();
    value
        .parse::<usize>()
        .map(Some)
        .map_err(|_| FrameError::BadLength(value.to_string()))
}

/// Consumes header lines through the blank separator and returns the declared
/// body length. `first` is a header line the caller already read.
pub fn read_declared_length<R: BufRead>(
    reader: &mut R,
    first: Option<&str>,
) -> Result<Option<usize>, FrameError> {
    let mut declared = match first {
        Some(line) => parse_content_length(line)?,
        None => None,
    };
    let mut bad_length = None;
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "unexpected eof while reading headers",
            )
            .into());
        }
        let header = line.trim_end_matches(['\r', '\n']);
        if header.is_empty() {
            break;
        }
        // keep reading to the separator so the stream stays aligned
        match parse_content_length(header) {
            Ok(Some(len)) => declared = Some(len),
            Ok(None) => {}
            Err(err) => bad_length = Some(err),
        }
    }
    match bad_length {
        Some(err) => Err(err),
        None => Ok(declared),
    }
}

/// Reads exactly `len` body bytes, refusing lengths over `MAX_BODY_BYTES`
/// without allocating.
pub fn read_body<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>, FrameError> {
    if len > MAX_BODY_BYTES {
        return Err(FrameError::TooLarge(len));
    }
    let mut body = vec![0_u8; len];
    reader.read_exact(&mut body)?;
    Ok(body)
}

/// Discards up to `len` bytes so the next frame starts where the sender expects.
pub fn skip_body<R: Read>(reader: &mut R, len: usize) -> io::Result<u64> {
    let limit = u64::try_from(len).unwrap_or(u64::MAX);
    io::copy(&mut reader.take(limit), &mut io::sink())
}
