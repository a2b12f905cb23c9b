use crate::{Result, TransportError};
use std::io::{ErrorKind, Read};
use tracing::{trace, warn};

pub const FRAME_TERMINATOR: u8 = b'\n';

/// Longest frame kept, terminator excluded. Well above a full protocol
/// frame; anything longer is line noise.
pub const MAX_FRAME_LEN: usize = 256;

/// Splits a byte stream into newline-terminated frames.
///
/// Timeouts, `WouldBlock` and `Interrupted` reads are retried, so a serial
/// port opened with a short read timeout behaves like a blocking stream.
/// Bytes received before a timeout are kept for the next attempt. A frame
/// longer than [`MAX_FRAME_LEN`] is dropped up to the next terminator.
pub struct LineReader<R> {
    inner: R,
    acc: Vec<u8>,
    // Prefix of `acc` already known to hold no terminator.
    scanned: usize,
    discarding: bool,
    eof: bool,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            acc: Vec::with_capacity(64),
            scanned: 0,
            discarding: false,
            eof: false,
        }
    }

    /// Next non-empty frame without its terminator, or `None` once the stream
    /// is closed. A trailing unterminated fragment at EOF is returned as a
    /// final frame.
    pub fn read_frame(&mut self) -> Result<Option<Vec<u8>>> {
        let mut buf = [0u8; 128];
        loop {
            if let Some(frame) = self.take_frame() {
                if frame.is_empty() {
                    continue;
                }
                return Ok(Some(frame));
            }
            if self.eof {
                if self.discarding {
                    self.acc.clear();
                }
                let rest = trim_cr(std::mem::take(&mut self.acc));
                self.scanned = 0;
                if rest.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(rest));
            }
            match self.inner.read(&mut buf) {
                Ok(0) => self.eof = true,
                Ok(n) => self.acc.extend_from_slice(&buf[..n]),
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) =>
                {
                    trace!("read retry: {e}");
                    continue;
                }
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    return Err(TransportError::Closed);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn take_frame(&mut self) -> Option<Vec<u8>> {
        loop {
            let Some(off) = self.acc[self.scanned..]
                .iter()
                .position(|&b| b == FRAME_TERMINATOR)
            else {
                self.scanned = self.acc.len();
                if self.acc.len() > MAX_FRAME_LEN {
                    self.start_discarding();
                    self.acc.clear();
                    self.scanned = 0;
                }
                return None;
            };
            let pos = self.scanned + off;
            let mut line = self.acc.drain(..=pos).collect::<Vec<u8>>();
            self.scanned = 0;
            if self.discarding {
                // Tail of an oversized frame.
                self.discarding = false;
                continue;
            }
            if pos > MAX_FRAME_LEN {
                warn!(len = pos, limit = MAX_FRAME_LEN, "dropping oversized frame");
                continue;
            }
            // Drop terminator
            line.pop();
            return Some(trim_cr(line));
        }
    }

    fn start_discarding(&mut self) {
        if !self.discarding {
            warn!(limit = MAX_FRAME_LEN, "frame too long, discarding to next terminator");
            self.discarding = true;
        }
    }
}

fn trim_cr(mut line: Vec<u8>) -> Vec<u8> {
    while line.last() == Some(&b'\r') {
        line.pop();
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct Flaky {
        chunks: Vec<std::io::Result<Vec<u8>>>,
    }

    impl Read for Flaky {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.chunks.is_empty() {
                return Ok(0);
            }
            match self.chunks.remove(0) {
                Ok(bytes) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Err(e) => Err(e),
            }
        }
    }

    #[test]
    fn test_splits_lines_and_strips_crlf() {
        let mut r = LineReader::new(Cursor::new(b"1;2;3\r\n\n4;5;6\n".to_vec()));
        assert_eq!(r.read_frame().unwrap(), Some(b"1;2;3".to_vec()));
        assert_eq!(r.read_frame().unwrap(), Some(b"4;5;6".to_vec()));
        assert_eq!(r.read_frame().unwrap(), None);
    }

    #[test]
    fn test_unterminated_tail_is_returned_at_eof() {
        let mut r = LineReader::new(Cursor::new(b"a\nb".to_vec()));
        assert_eq!(r.read_frame().unwrap(), Some(b"a".to_vec()));
        assert_eq!(r.read_frame().unwrap(), Some(b"b".to_vec()));
        assert_eq!(r.read_frame().unwrap(), None);
    }

    #[test]
    fn test_timeout_keeps_partial_frame() {
        let flaky = Flaky {
            chunks: vec![
                Ok(b"5;2;1".to_vec()),
                Err(std::io::Error::new(ErrorKind::TimedOut, "timed out")),
                Ok(b";0;0;23.5\n".to_vec()),
            ],
        };
        let mut r = LineReader::new(flaky);
        assert_eq!(r.read_frame().unwrap(), Some(b"5;2;1;0;0;23.5".to_vec()));
        assert_eq!(r.read_frame().unwrap(), None);
    }

    #[test]
    fn test_hard_error_is_reported() {
        let flaky = Flaky {
            chunks: vec![Err(std::io::Error::new(ErrorKind::Other, "unplugged"))],
        };
        let mut r = LineReader::new(flaky);
        assert!(matches!(r.read_frame(), Err(TransportError::Io(_))));
    }

    #[test]
    fn test_long_noise_is_dropped_and_reading_continues() {
        let mut input = vec![b'x'; 512 * 1024];
        input.extend_from_slice(b"\n5;2;1;0;0;23.5\n");
        let mut r = LineReader::new(Cursor::new(input));
        assert_eq!(r.read_frame().unwrap(), Some(b"5;2;1;0;0;23.5".to_vec()));
        assert_eq!(r.read_frame().unwrap(), None);
    }

    #[test]
    fn test_oversized_frame_within_one_read_is_dropped() {
        let mut input = vec![b'y'; MAX_FRAME_LEN + 1];
        input.push(b'\n');
        input.extend_from_slice(&[b'z'; MAX_FRAME_LEN]);
        input.extend_from_slice(b"\n1;1;1;0;2;1\n");
        let mut r = LineReader::new(Cursor::new(input));
        assert_eq!(r.read_frame().unwrap(), Some(vec![b'z'; MAX_FRAME_LEN]));
        assert_eq!(r.read_frame().unwrap(), Some(b"1;1;1;0;2;1".to_vec()));
        assert_eq!(r.read_frame().unwrap(), None);
    }

    #[test]
    fn test_oversized_tail_at_eof_is_dropped() {
        let mut input = b"0;255;3;0;2;\n".to_vec();
        input.extend_from_slice(&[b'n'; 4 * MAX_FRAME_LEN]);
        let mut r = LineReader::new(Cursor::new(input));
        assert_eq!(r.read_frame().unwrap(), Some(b"0;255;3;0;2;".to_vec()));
        assert_eq!(r.read_frame().unwrap(), None);
    }
}
