use crate::{codec, GatewayError, Message, Result};
use serial_transport::LineReader;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Counters kept by the handler for the metrics layer.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct HandlerStats {
    pub frames_rx: u64,
    pub frames_tx: u64,
    pub decode_errors: u64,
}

/// Owns the write half of the serial link and runs the read loop.
///
/// `transmit` may be called from any thread; writes are serialised so frames
/// never interleave on the wire.
pub struct Handler {
    writer: Mutex<Box<dyn Write + Send>>,
    frames_rx: AtomicU64,
    frames_tx: AtomicU64,
    decode_errors: AtomicU64,
}

impl Handler {
    pub fn new<W>(writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            writer: Mutex::new(Box::new(writer)),
            frames_rx: AtomicU64::new(0),
            frames_tx: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
        }
    }

    /// Read frames until the transport closes, forwarding each decoded
    /// message to `out` in arrival order.
    ///
    /// Malformed frames are logged and skipped. Returns `Ok` on EOF or when
    /// the receiving side hangs up, and the transport error otherwise.
    pub fn start<R: Read>(&self, reader: R, out: &SyncSender<Message>) -> Result<()> {
        let mut lines = LineReader::new(reader);
        info!("serial read loop started");
        loop {
            let frame = match lines.read_frame()? {
                Some(frame) => frame,
                None => {
                    info!("serial transport closed");
                    return Ok(());
                }
            };
            self.frames_rx.fetch_add(1, Ordering::Relaxed);
            let msg = match codec::decode_bytes(&frame) {
                Ok(msg) => msg,
                Err(e) => {
                    self.decode_errors.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        frame = %String::from_utf8_lossy(&frame),
                        error = %e,
                        "dropping malformed frame"
                    );
                    continue;
                }
            };
            debug!(%msg, "rx");
            if out.send(msg).is_err() {
                info!("message consumer gone, stopping read loop");
                return Ok(());
            }
        }
    }

    /// Encode and write one message to the transport.
    pub fn transmit(&self, msg: &Message) -> Result<()> {
        let line = codec::encode(msg)?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| GatewayError::TransmitFailed("writer lock poisoned".into()))?;
        writer
            .write_all(line.as_bytes())
            .and_then(|_| writer.flush())
            .map_err(|e| GatewayError::TransmitFailed(e.to_string()))?;
        drop(writer);
        self.frames_tx.fetch_add(1, Ordering::Relaxed);
        debug!(%msg, "tx");
        Ok(())
    }

    pub fn stats(&self) -> HandlerStats {
        HandlerStats {
            frames_rx: self.frames_rx.load(Ordering::Relaxed),
            frames_tx: self.frames_tx.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
        }
    }
}
