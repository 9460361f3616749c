//! Module dedicated to preparing message bodies for copying.
//!
//! A copy travelling between two stores may need two edits: the
//! engine's `X-TUID` tracking header is injected (or replaced) when
//! the copy belongs to a sync record, and line endings are converted
//! when the two stores disagree on CR-LF. CR-LF is the canonical
//! wire form; a store not declaring it gets bare LF.

use thiserror::Error;

use crate::message::Tuid;

/// Errors related to body preparation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot inject tracking id: message has an incomplete header")]
    IncompleteHeaderError,
}

/// Where the tracking header goes, and what it replaces.
struct InjectionPoint {
    /// Start of the replaced region.
    start: usize,
    /// End of the replaced region. Equal to `start` when inserting
    /// before the header/body boundary.
    end: usize,
    /// Whether any header line ended in CR-LF.
    header_crs: bool,
}

/// Scans the header section for the first `X-TUID: ` header, or the
/// empty line separating header from body.
fn find_injection_point(data: &[u8]) -> Result<InjectionPoint, Error> {
    let mut i = 0;
    let mut header_crs = false;
    while i < data.len() {
        let start = i;
        let mut line_crs = 0;
        loop {
            match data.get(i) {
                None => return Err(Error::IncompleteHeaderError),
                Some(&b'\r') => line_crs += 1,
                Some(&b'\n') => break,
                Some(_) => {}
            }
            i += 1;
        }
        i += 1;
        if data[start..].starts_with(b"X-TUID: ") {
            return Ok(InjectionPoint {
                start,
                end: i,
                header_crs,
            });
        }
        header_crs |= line_crs > 0;
        if i - line_crs - 1 == start {
            // empty line: header/body boundary
            return Ok(InjectionPoint {
                start,
                end: start,
                header_crs,
            });
        }
    }
    Err(Error::IncompleteHeaderError)
}

/// Converts line endings between the two conventions. A no-op when
/// both sides agree.
fn convert(data: &[u8], out: &mut Vec<u8>, src_crlf: bool, dst_crlf: bool) {
    if src_crlf == dst_crlf {
        out.extend_from_slice(data);
    } else if dst_crlf {
        for &byte in data {
            if byte == b'\r' {
                continue;
            }
            if byte == b'\n' {
                out.push(b'\r');
            }
            out.push(byte);
        }
    } else {
        out.extend(data.iter().copied().filter(|&byte| byte != b'\r'));
    }
}

/// Prepares a message body for storage on the destination side.
///
/// With a tracking id, the `X-TUID` header is injected just before
/// the header/body boundary, or replaces an existing one. The
/// injected line ends in CR-LF iff the destination keeps CR-LF and
/// either the body is being converted towards CR-LF or the header
/// already carried CRs.
pub fn prepare_copy(
    data: Vec<u8>,
    tuid: Option<&Tuid>,
    src_crlf: bool,
    dst_crlf: bool,
) -> Result<Vec<u8>, Error> {
    let Some(tuid) = tuid else {
        if src_crlf == dst_crlf {
            return Ok(data);
        }
        let mut out = Vec::with_capacity(data.len() + data.len() / 32);
        convert(&data, &mut out, src_crlf, dst_crlf);
        return Ok(out);
    };

    let point = find_injection_point(&data)?;
    let mut out = Vec::with_capacity(data.len() + 32);
    convert(&data[..point.start], &mut out, src_crlf, dst_crlf);
    out.extend_from_slice(b"X-TUID: ");
    out.extend_from_slice(tuid.as_bytes());
    if dst_crlf && (!src_crlf || point.header_crs) {
        out.push(b'\r');
    }
    out.push(b'\n');
    convert(&data[point.end..], &mut out, src_crlf, dst_crlf);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn tuid() -> Tuid {
        Tuid::try_from("AAAABBBBCCCC").unwrap()
    }

    #[test]
    fn injects_before_the_body_boundary() {
        let body = b"From: a\nTo: b\n\nhello\n".to_vec();
        let out = prepare_copy(body, Some(&tuid()), false, false).unwrap();
        assert_eq!(
            out,
            b"From: a\nTo: b\nX-TUID: AAAABBBBCCCC\n\nhello\n".to_vec(),
        );
    }

    #[test]
    fn replaces_an_existing_tracking_header() {
        let body = b"From: a\nX-TUID: ZZZZZZZZZZZZ\nTo: b\n\nhi\n".to_vec();
        let out = prepare_copy(body, Some(&tuid()), false, false).unwrap();
        assert_eq!(
            out,
            b"From: a\nX-TUID: AAAABBBBCCCC\nTo: b\n\nhi\n".to_vec(),
        );
    }

    #[test]
    fn injected_line_follows_destination_endings() {
        let body = b"From: a\r\n\r\nbody\r\n".to_vec();
        let out = prepare_copy(body, Some(&tuid()), true, true).unwrap();
        assert_eq!(
            out,
            b"From: a\r\nX-TUID: AAAABBBBCCCC\r\n\r\nbody\r\n".to_vec(),
        );
    }

    #[test]
    fn lf_message_on_crlf_store_keeps_bare_endings_in_header_line() {
        // both sides declare CR-LF but the message itself is LF
        let body = b"From: a\n\nbody\n".to_vec();
        let out = prepare_copy(body, Some(&tuid()), true, true).unwrap();
        assert_eq!(out, b"From: a\nX-TUID: AAAABBBBCCCC\n\nbody\n".to_vec());
    }

    #[test]
    fn converts_lf_to_crlf() {
        let body = b"From: a\nTo: b\n\nline1\nline2\n".to_vec();
        let out = prepare_copy(body, Some(&tuid()), false, true).unwrap();
        assert_eq!(
            out,
            b"From: a\r\nTo: b\r\nX-TUID: AAAABBBBCCCC\r\n\r\nline1\r\nline2\r\n".to_vec(),
        );
    }

    #[test]
    fn converts_crlf_to_lf() {
        let body = b"From: a\r\n\r\nbody\r\n".to_vec();
        let out = prepare_copy(body, Some(&tuid()), true, false).unwrap();
        assert_eq!(out, b"From: a\nX-TUID: AAAABBBBCCCC\n\nbody\n".to_vec());
    }

    #[test]
    fn converts_without_injection_for_trash_copies() {
        let body = b"From: a\n\nbody\n".to_vec();
        let out = prepare_copy(body, None, false, true).unwrap();
        assert_eq!(out, b"From: a\r\n\r\nbody\r\n".to_vec());
    }

    #[test]
    fn headerless_message_is_rejected() {
        let body = b"no boundary at all".to_vec();
        assert!(prepare_copy(body, Some(&tuid()), false, false).is_err());
        let body = b"Header: only\nnever ends".to_vec();
        assert!(prepare_copy(body, Some(&tuid()), false, false).is_err());
    }

    proptest! {
        /// Copying an LF body to a CR-LF side and back yields the
        /// original body, with the tracking header round-tripping to
        /// itself.
        #[test]
        fn crlf_round_trip(lines in proptest::collection::vec("[a-zA-Z0-9 :.-]{0,40}", 1..8)) {
            let mut body = b"Subject: t\n".to_vec();
            body.extend_from_slice(b"\n");
            for line in &lines {
                body.extend_from_slice(line.as_bytes());
                body.push(b'\n');
            }

            let tuid = tuid();
            let there = prepare_copy(body.clone(), Some(&tuid), false, true).unwrap();
            let back = prepare_copy(there, Some(&tuid), true, false).unwrap();

            let mut expected = b"Subject: t\nX-TUID: AAAABBBBCCCC\n".to_vec();
            expected.extend_from_slice(b"\n");
            for line in &lines {
                expected.extend_from_slice(line.as_bytes());
                expected.push(b'\n');
            }
            prop_assert_eq!(back, expected);
        }
    }
}
