//! Session lifecycle and serialized sending.
//!
//! A [`PortSession`] owns at most one open port handle and the thread running
//! its [`FrameReader`]. Hosts drive it through `new` (init), [`PortSession::start`]
//! and [`PortSession::shutdown`]; frames arrive through the callback given at
//! construction.
//!
//! # Locking
//!
//! ```text
//! lifecycle: Mutex<Lifecycle>   open/close, reader thread handle
//! writer:    Mutex<Option<..>>  the write lock; Some while open
//! ```
//!
//! `lifecycle` is always taken before `writer`. Neither lock is held while
//! joining the reader: the receive callback may itself call `close`, which
//! takes `lifecycle`.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::codec::{self, EncodeError};
use crate::error::{LinkError, LinkResult};
use crate::port::{PortAdapter, PortError, PortOpener, SystemOpener};
use crate::reader::{FrameReader, ReaderExit, ReceiveCallback};
use crate::state::{PortConfig, SessionState};
use crate::stats::{LinkCounters, SessionStats};

/// Lifecycle owner of one serial connection.
pub struct PortSession {
    config: PortConfig,
    opener: Box<dyn PortOpener>,
    on_receive: ReceiveCallback,
    lifecycle: Mutex<Lifecycle>,
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Lifecycle {
    reader: Option<ReaderHandle>,
    generation: u64,
}

struct ReaderHandle {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// State reachable from both the session and its reader thread.
struct Shared {
    writer: Mutex<Option<ActivePort>>,
    open: AtomicBool,
    counters: Arc<LinkCounters>,
}

struct ActivePort {
    port: PortAdapter,
    /// Which `open` produced this handle; a reader only releases its own.
    generation: u64,
}

impl Shared {
    fn release(&self, mut active: ActivePort) {
        if let Err(e) = active.port.flush() {
            warn!("Failed to flush {} before release: {}", active.port.name(), e);
        }
        info!("Closed serial port {}", active.port.name());
    }

    /// Take the writer if it still belongs to `generation`, marking the
    /// session Closed.
    fn take_generation(&self, generation: u64) -> Option<ActivePort> {
        let mut writer = self.writer.lock();
        if writer.as_ref().map(|a| a.generation) != Some(generation) {
            return None;
        }
        self.open.store(false, Ordering::Release);
        writer.take()
    }

    /// Called from the reader thread when it ends on its own.
    fn release_after_fault(&self, generation: u64) {
        if let Some(active) = self.take_generation(generation) {
            warn!(
                "Serial port {} lost; session closed until reopened",
                active.port.name()
            );
            self.release(active);
        }
    }
}

impl PortSession {
    /// Build a Closed session. Nothing is opened until [`start`](Self::start)
    /// or [`open`](Self::open).
    ///
    /// `on_receive` runs on the reader thread once per non-empty frame. It may
    /// call the send operations and `close`, but must not call `open`. A panic
    /// in `on_receive` stops the reader and closes the session.
    pub fn new<O, F>(config: PortConfig, opener: O, on_receive: F) -> Self
    where
        O: PortOpener + 'static,
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self {
            config,
            opener: Box::new(opener),
            on_receive: Arc::new(on_receive),
            lifecycle: Mutex::new(Lifecycle::default()),
            shared: Arc::new(Shared {
                writer: Mutex::new(None),
                open: AtomicBool::new(false),
                counters: Arc::new(LinkCounters::default()),
            }),
        }
    }

    /// A session over a real OS serial port.
    pub fn with_system_port<F>(config: PortConfig, on_receive: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self::new(config, SystemOpener, on_receive)
    }

    /// Open the port if `auto_open` is set.
    ///
    /// An open failure is logged and returned; the session stays Closed and
    /// usable.
    pub fn start(&self) -> LinkResult<()> {
        if !self.config.auto_open {
            debug!("Auto-open disabled for {}", self.config.port_name);
            return Ok(());
        }
        self.open().inspect_err(|e| error!("{}", e))
    }

    /// Open the port and start the frame reader. No-op when already open.
    pub fn open(&self) -> LinkResult<()> {
        let mut lifecycle = self.lifecycle.lock();
        if self.is_open() {
            debug!("Serial port {} already open", self.config.port_name);
            return Ok(());
        }
        // A reader that ended on its own may still need joining.
        if let Some(reader) = lifecycle.reader.take() {
            Self::stop_reader(reader);
        }

        let open_error = |source: PortError| LinkError::Open {
            port: self.config.port_name.clone(),
            source,
        };

        let port = self.opener.open(&self.config).map_err(open_error)?;
        let mut reader_port = port.try_clone_adapter().map_err(open_error)?;
        reader_port
            .set_timeout(self.config.read_timeout())
            .map_err(open_error)?;

        lifecycle.generation += 1;
        let generation = lifecycle.generation;
        let stop = Arc::new(AtomicBool::new(false));
        let reader = FrameReader::new(
            reader_port,
            self.config.encoding,
            Arc::clone(&self.on_receive),
            Arc::clone(&stop),
            Arc::clone(&self.shared.counters),
        );

        // Publish the writer before the reader can possibly fault.
        {
            let mut writer = self.shared.writer.lock();
            *writer = Some(ActivePort { port, generation });
            self.shared.open.store(true, Ordering::Release);
        }

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("serial-reader-{}", self.config.port_name))
            .spawn(move || match panic::catch_unwind(AssertUnwindSafe(|| reader.run())) {
                Ok(ReaderExit::Stopped) => {}
                Ok(ReaderExit::Fatal(_)) => shared.release_after_fault(generation),
                Err(_) => {
                    error!("Receive callback panicked; frame reader stopped");
                    shared.release_after_fault(generation);
                }
            });

        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                if let Some(active) = self.shared.writer.lock().take() {
                    self.shared.open.store(false, Ordering::Release);
                    self.shared.release(active);
                }
                return Err(open_error(PortError::Io(e)));
            }
        };

        lifecycle.reader = Some(ReaderHandle { stop, thread });
        self.shared.counters.record_open();
        info!(
            "Opened serial port {} at {} baud",
            self.config.port_name, self.config.baud_rate
        );
        Ok(())
    }

    /// Stop the reader, then flush and release the port. Safe to call in any
    /// state, any number of times.
    pub fn close(&self) {
        let (reader, generation) = {
            let mut lifecycle = self.lifecycle.lock();
            (lifecycle.reader.take(), lifecycle.generation)
        };
        if let Some(reader) = reader {
            Self::stop_reader(reader);
        }

        // A later `open` may have raced in while the reader was joined; its
        // handle is not ours to release.
        let _lifecycle = self.lifecycle.lock();
        if let Some(active) = self.shared.take_generation(generation) {
            self.shared.release(active);
        }
    }

    fn stop_reader(reader: ReaderHandle) {
        reader.stop.store(true, Ordering::Release);

        // Closing from inside the receive callback: the loop exits on its own
        // once the callback returns.
        if reader.thread.thread().id() == thread::current().id() {
            return;
        }
        if reader.thread.join().is_err() {
            warn!("Frame reader thread panicked");
        }
    }

    /// Teardown hook for the hosting application. Always closes.
    pub fn shutdown(&self) {
        debug!("Shutting down session for {}", self.config.port_name);
        self.close();
    }

    pub fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::Acquire)
    }

    pub fn state(&self) -> SessionState {
        if self.is_open() {
            SessionState::Open
        } else {
            SessionState::Closed
        }
    }

    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    pub fn stats(&self) -> SessionStats {
        self.shared.counters.snapshot()
    }

    /// Send `text` followed by the configured newline.
    pub fn send_line(&self, text: &str) -> LinkResult<usize> {
        self.send_with(|| codec::encode_line(text, self.config.newline, self.config.encoding))
    }

    /// Send raw bytes unchanged.
    pub fn send_bytes(&self, bytes: &[u8]) -> LinkResult<usize> {
        self.send_with(|| Ok(bytes.to_vec()))
    }

    /// Send the low byte of each character's code point.
    pub fn send_char_codes(&self, text: &str) -> LinkResult<usize> {
        self.send_with(|| Ok(codec::encode_char_codes(text)))
    }

    /// Send space-separated hex byte tokens, e.g. `"1A 2B FF"`.
    pub fn send_hex_tokens(&self, text: &str) -> LinkResult<usize> {
        self.send_with(|| codec::encode_hex_tokens(text))
    }

    /// Encode and write under the write lock, as a single write call.
    fn send_with<E>(&self, encode: E) -> LinkResult<usize>
    where
        E: FnOnce() -> Result<Vec<u8>, EncodeError>,
    {
        let mut writer = self.shared.writer.lock();
        let active = writer.as_mut().ok_or(LinkError::NotOpen)?;
        let bytes = encode()?;

        match active.port.write_bytes(&bytes) {
            Ok(written) => {
                self.shared.counters.record_write(written);
                debug!("Wrote {} bytes to {}", written, active.port.name());
                Ok(written)
            }
            Err(e) => {
                self.shared.counters.record_write_failure();
                warn!("Write to {} failed: {}", active.port.name(), e);
                Err(LinkError::Write(e))
            }
        }
    }
}

impl Drop for PortSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for PortSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortSession")
            .field("port_name", &self.config.port_name)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{MockOpener, MockSerialPort};

    fn session(auto_open: bool) -> (PortSession, MockOpener) {
        let opener = MockOpener::new(MockSerialPort::new("MOCK0"));
        let mut config = PortConfig::new("MOCK0", 9600);
        config.auto_open = auto_open;
        config.read_timeout_ms = 2;
        (PortSession::new(config, opener.clone(), |_| {}), opener)
    }

    #[test]
    fn test_start_honours_auto_open() {
        let (manual, _) = session(false);
        manual.start().unwrap();
        assert_eq!(manual.state(), SessionState::Closed);

        let (auto, opener) = session(true);
        auto.start().unwrap();
        assert_eq!(auto.state(), SessionState::Open);
        assert_eq!(opener.live_handles(), 1);
    }

    #[test]
    fn test_start_reports_open_failure() {
        let (session, opener) = session(true);
        opener.set_device_absent(true);

        let err = session.start().unwrap_err();
        assert!(matches!(err, LinkError::Open { .. }));
        assert!(!session.is_open());
    }

    #[test]
    fn test_send_requires_open() {
        let (session, opener) = session(false);
        assert!(matches!(session.send_bytes(b"x"), Err(LinkError::NotOpen)));
        assert!(matches!(session.send_line("x"), Err(LinkError::NotOpen)));
        assert!(opener.port().get_write_log().is_empty());
    }

    #[test]
    fn test_drop_releases_handle() {
        let (session, opener) = session(true);
        session.start().unwrap();
        drop(session);
        assert_eq!(opener.live_handles(), 0);
        assert!(opener.port().was_flushed());
    }

    #[test]
    fn test_debug_output() {
        let (session, _) = session(false);
        let debug = format!("{:?}", session);
        assert!(debug.contains("MOCK0"));
        assert!(debug.contains("Closed"));
    }
}
