//! Message framing
//!
//! Records are newline terminated. A bounded read (a file read at the server,
//! a socket read at a client) usually ends in the middle of a record, so the
//! window is split into the complete prefix and a remainder that belongs to a
//! record that is not fully present yet.
//!
//! ```text
//! "100\n10\n10"  ->  complete "100\n10\n", remainder "10"
//! "x\n"          ->  complete "x\n",       remainder ""
//! "100000"       ->  FrameTooLarge
//! ```
//!
//! Streaming readers prepend the remainder to the bytes of their next read and
//! frame again.

use crate::error::FramingError;

/// Terminator of every record.
pub const RECORD_TERMINATOR: u8 = b'\n';

/// Split `buf` after its last record terminator.
///
/// Returns `(complete, remainder)` with `complete ++ remainder == buf`.
/// An empty buffer is complete. A non-empty buffer without any terminator
/// cannot hold a single record and yields [`FramingError::FrameTooLarge`].
pub fn cut_to_last_message(buf: &[u8]) -> Result<(&[u8], &[u8]), FramingError> {
    match buf.last() {
        None => return Ok((buf, &[])),
        Some(&RECORD_TERMINATOR) => return Ok((buf, &[])),
        Some(_) => {}
    }

    match buf.iter().rposition(|&b| b == RECORD_TERMINATOR) {
        Some(pos) => Ok(buf.split_at(pos + 1)),
        None => Err(FramingError::FrameTooLarge {
            buffer_len: buf.len(),
        }),
    }
}

/// Iterate over the records of a complete buffer, terminators included.
///
/// Trailing bytes without a terminator are yielded as a final item; callers
/// that pass the `complete` half of [`cut_to_last_message`] never see one.
pub fn records(buf: &[u8]) -> impl Iterator<Item = &[u8]> {
    buf.split_inclusive(|&b| b == RECORD_TERMINATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cut_to_last_message() {
        let (complete, rest) = cut_to_last_message(b"100\n10\n10").unwrap();
        assert_eq!(complete, b"100\n10\n");
        assert_eq!(rest, b"10");
    }

    #[test]
    fn test_cut_to_last_message_without_terminator() {
        let err = cut_to_last_message(b"100000").unwrap_err();
        assert_eq!(err, FramingError::FrameTooLarge { buffer_len: 6 });
    }

    #[test]
    fn test_cut_complete_buffer() {
        let (complete, rest) = cut_to_last_message(b"x\n").unwrap();
        assert_eq!(complete, b"x\n");
        assert!(rest.is_empty());
    }

    #[test]
    fn test_cut_empty_buffer() {
        let (complete, rest) = cut_to_last_message(b"").unwrap();
        assert!(complete.is_empty());
        assert!(rest.is_empty());
    }

    #[test]
    fn test_cut_reconstructs_input() {
        let inputs: [&[u8]; 6] = [
            b"a\nb\nc",
            b"\n",
            b"\nabc",
            b"one\ntwo\n",
            b"one\n\n\npartial",
            b"first\nsecond\nt",
        ];

        for input in inputs {
            let (complete, rest) = cut_to_last_message(input).unwrap();
            assert_eq!([complete, rest].concat(), input, "input {:?}", input);
            assert!(complete.is_empty() || complete.ends_with(b"\n"));
            assert!(!rest.contains(&RECORD_TERMINATOR));
        }
    }

    #[test]
    fn test_records_iterator() {
        let got: Vec<&[u8]> = records(b"1\n22\n\n333\n").collect();
        assert_eq!(got, vec![&b"1\n"[..], b"22\n", b"\n", b"333\n"]);
        assert_eq!(records(b"").count(), 0);
    }
}
