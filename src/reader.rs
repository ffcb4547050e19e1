//! Background frame reader.
//!
//! Reads one byte at a time from its own port handle, collects bytes into a
//! [`FrameBuffer`] until the `0xFF` sentinel arrives, decodes the frame and
//! hands the text to the receive callback. Runs on a dedicated thread owned
//! by [`crate::session::PortSession`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, trace};

use crate::codec::{TextEncoding, FRAME_SENTINEL};
use crate::port::{PortAdapter, PortError};
use crate::stats::LinkCounters;

/// Callback invoked once per non-empty received frame.
pub type ReceiveCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Accumulates payload bytes between sentinels.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    bytes: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte. Returns the completed payload when `byte` is the
    /// sentinel and at least one payload byte was buffered.
    pub fn push(&mut self, byte: u8) -> Option<Vec<u8>> {
        if byte != FRAME_SENTINEL {
            self.bytes.push(byte);
            return None;
        }
        if self.bytes.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Why a reader loop ended.
#[derive(Debug)]
pub enum ReaderExit {
    /// The stop flag was observed.
    Stopped,
    /// The port failed in a way retrying cannot fix.
    Fatal(PortError),
}

/// The read loop and everything it owns.
pub struct FrameReader {
    port: PortAdapter,
    buffer: FrameBuffer,
    encoding: TextEncoding,
    on_receive: ReceiveCallback,
    stop: Arc<AtomicBool>,
    counters: Arc<LinkCounters>,
}

impl FrameReader {
    pub fn new(
        port: PortAdapter,
        encoding: TextEncoding,
        on_receive: ReceiveCallback,
        stop: Arc<AtomicBool>,
        counters: Arc<LinkCounters>,
    ) -> Self {
        Self {
            port,
            buffer: FrameBuffer::new(),
            encoding,
            on_receive,
            stop,
            counters,
        }
    }

    /// Loop until stopped or a fatal read error occurs.
    ///
    /// The port handle is dropped when this returns, never earlier.
    pub fn run(mut self) -> ReaderExit {
        debug!("Frame reader started on {}", self.port.name());

        while !self.stop.load(Ordering::Acquire) {
            if let Err(e) = self.poll_once() {
                error!("Fatal read error on {}: {}", self.port.name(), e);
                return ReaderExit::Fatal(e);
            }
        }

        debug!(
            "Frame reader on {} stopped ({} byte(s) of partial frame discarded)",
            self.port.name(),
            self.buffer.len()
        );
        ReaderExit::Stopped
    }

    /// One iteration: attempt a single-byte read and process the result.
    ///
    /// Transient failures count as "no data this tick". Only fatal errors are
    /// returned.
    pub fn poll_once(&mut self) -> Result<(), PortError> {
        let mut byte = [0u8; 1];
        match self.port.read_bytes(&mut byte) {
            Ok(0) => {}
            Ok(_) => self.accept(byte[0]),
            Err(e) if e.is_transient() => {
                self.counters.record_read_timeout();
                trace!("No data on {}: {}", self.port.name(), e);
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    fn accept(&mut self, byte: u8) {
        self.counters.record_byte_received();
        if let Some(payload) = self.buffer.push(byte) {
            let text = self.encoding.decode(&payload);
            self.counters.record_frame();
            debug!("Received frame ({} bytes): {:?}", payload.len(), text);
            (self.on_receive)(&text);
        }
    }

    /// Bytes of the frame currently being assembled.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::MockSerialPort;
    use parking_lot::Mutex;
    use proptest::prelude::*;

    fn reader_over(mock: &MockSerialPort) -> (FrameReader, Arc<Mutex<Vec<String>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let reader = FrameReader::new(
            Box::new(mock.clone()),
            TextEncoding::Latin1,
            Arc::new(move |text: &str| sink.lock().push(text.to_string())),
            Arc::new(AtomicBool::new(false)),
            Arc::new(LinkCounters::default()),
        );
        (reader, received)
    }

    fn drain(reader: &mut FrameReader, mock: &MockSerialPort) {
        while mock.available_bytes() > 0 {
            reader.poll_once().unwrap();
        }
    }

    #[test]
    fn test_frame_buffer_completes_on_sentinel() {
        let mut buffer = FrameBuffer::new();
        assert_eq!(buffer.push(b'O'), None);
        assert_eq!(buffer.push(b'K'), None);
        assert_eq!(buffer.push(0xFF), Some(b"OK".to_vec()));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_frame_buffer_drops_empty_frames() {
        let mut buffer = FrameBuffer::new();
        assert_eq!(buffer.push(0xFF), None);
        assert_eq!(buffer.push(0xFF), None);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_reader_dispatches_frames() {
        let mock = MockSerialPort::new("MOCK0");
        let (mut reader, received) = reader_over(&mock);

        mock.enqueue_read(b"LIGHT ON\xFF\xFFTEMP 21\xFF");
        drain(&mut reader, &mock);

        assert_eq!(*received.lock(), vec!["LIGHT ON", "TEMP 21"]);
        assert_eq!(reader.pending(), 0);
    }

    #[test]
    fn test_partial_frame_waits_for_sentinel() {
        let mock = MockSerialPort::new("MOCK0");
        let (mut reader, received) = reader_over(&mock);

        mock.enqueue_read(b"PAR");
        drain(&mut reader, &mock);
        assert!(received.lock().is_empty());
        assert_eq!(reader.pending(), 3);

        // An idle tick leaves the buffer untouched.
        reader.poll_once().unwrap();
        assert_eq!(reader.pending(), 3);

        mock.enqueue_read(b"TIAL\xFF");
        drain(&mut reader, &mock);
        assert_eq!(*received.lock(), vec!["PARTIAL"]);
    }

    #[test]
    fn test_fatal_error_ends_run() {
        let mock = MockSerialPort::new("MOCK0");
        let (reader, received) = reader_over(&mock);
        mock.disconnect();

        assert!(matches!(reader.run(), ReaderExit::Fatal(_)));
        assert!(received.lock().is_empty());
    }

    #[test]
    fn test_stop_flag_checked_before_reading() {
        let mock = MockSerialPort::new("MOCK0");
        let stop = Arc::new(AtomicBool::new(true));
        let reader = FrameReader::new(
            Box::new(mock.clone()),
            TextEncoding::Ascii,
            Arc::new(|text: &str| assert!(text.is_empty(), "no frame expected")),
            Arc::clone(&stop),
            Arc::new(LinkCounters::default()),
        );

        mock.enqueue_read(b"X\xFF");
        assert!(matches!(reader.run(), ReaderExit::Stopped));
        assert_eq!(mock.available_bytes(), 2);
    }

    proptest! {
        #[test]
        fn prop_one_callback_per_frame(payload in proptest::collection::vec(0u8..0xFF, 1..64)) {
            let mock = MockSerialPort::new("MOCK0");
            let (mut reader, received) = reader_over(&mock);

            mock.enqueue_read(&payload);
            mock.enqueue_read(&[FRAME_SENTINEL]);
            drain(&mut reader, &mock);

            let expected = TextEncoding::Latin1.decode(&payload);
            prop_assert_eq!(received.lock().clone(), vec![expected]);
            prop_assert_eq!(reader.pending(), 0);
        }
    }
}
