//! Mock serial port implementation for testing.
//!
//! Provides a `MockSerialPort` that simulates a serial connection without
//! hardware, and a `MockOpener` that hands out handles onto it. All clones of
//! a mock share one state, so a test can keep a clone, feed it inbound bytes
//! and inspect what the session transmitted.

use super::error::PortError;
use super::traits::{PortAdapter, PortOpener, SerialPortAdapter};
use crate::state::PortConfig;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Upper bound on how long an empty mock read blocks before timing out.
const MAX_IDLE_READ: Duration = Duration::from_millis(5);

#[derive(Debug, Default)]
struct MockPortState {
    /// Queue of bytes to be returned by read operations.
    read_queue: VecDeque<u8>,
    /// One entry per successful `write_bytes` call.
    write_log: Vec<Vec<u8>>,
    /// Every transmitted byte in wire order.
    transmitted: Vec<u8>,
    /// Whether the next write should time out.
    should_timeout: bool,
    /// Reads and writes fail with a fatal error once set.
    disconnected: bool,
    timeout: Duration,
    flushed: bool,
}

/// Mock serial port implementation for testing.
///
/// # Example
/// ```
/// use serial_link::port::{MockSerialPort, SerialPortAdapter};
///
/// let mut port = MockSerialPort::new("MOCK0");
/// port.enqueue_read(b"PING\xFF");
///
/// let mut buffer = [0u8; 5];
/// let n = port.read_bytes(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], b"PING\xFF");
///
/// port.write_bytes(b"PONG\n").unwrap();
/// assert_eq!(port.get_write_log(), vec![b"PONG\n".to_vec()]);
/// ```
pub struct MockSerialPort {
    name: String,
    state: Arc<Mutex<MockPortState>>,
    /// Live-handle counter this instance contributes to, if it was opened.
    handle_count: Option<Arc<AtomicUsize>>,
    /// Counter for handles produced by `try_clone_adapter` on this one.
    clone_count: Option<Arc<AtomicUsize>>,
}

impl MockSerialPort {
    /// Create a new mock serial port with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockPortState {
                timeout: Duration::from_millis(50),
                ..Default::default()
            })),
            handle_count: None,
            clone_count: None,
        }
    }

    /// Enqueue bytes to be returned by subsequent read operations.
    pub fn enqueue_read(&self, data: &[u8]) {
        self.state.lock().read_queue.extend(data);
    }

    /// Get a copy of every write call's payload.
    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// All bytes transmitted so far, concatenated in wire order.
    pub fn transmitted(&self) -> Vec<u8> {
        self.state.lock().transmitted.clone()
    }

    /// Make the next write time out.
    pub fn set_should_timeout(&self, should_timeout: bool) {
        self.state.lock().should_timeout = should_timeout;
    }

    /// Simulate the device being unplugged.
    pub fn disconnect(&self) {
        self.state.lock().disconnected = true;
    }

    /// Get the number of bytes still waiting to be read.
    pub fn available_bytes(&self) -> usize {
        self.state.lock().read_queue.len()
    }

    /// Whether `flush` has been called on any handle.
    pub fn was_flushed(&self) -> bool {
        self.state.lock().flushed
    }

    fn tracked(&self, counter: &Arc<AtomicUsize>, clones: Option<&Arc<AtomicUsize>>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self {
            name: self.name.clone(),
            state: Arc::clone(&self.state),
            handle_count: Some(Arc::clone(counter)),
            clone_count: clones.cloned(),
        }
    }

    fn disconnected_error() -> PortError {
        PortError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "device disconnected"))
    }
}

impl Clone for MockSerialPort {
    fn clone(&self) -> Self {
        match &self.handle_count {
            Some(counter) => self.tracked(counter, self.clone_count.as_ref()),
            None => Self {
                name: self.name.clone(),
                state: Arc::clone(&self.state),
                handle_count: None,
                clone_count: None,
            },
        }
    }
}

impl Drop for MockSerialPort {
    fn drop(&mut self) {
        if let Some(counter) = &self.handle_count {
            counter.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl SerialPortAdapter for MockSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        {
            let mut state = self.state.lock();
            if state.disconnected {
                return Err(Self::disconnected_error());
            }
            if state.should_timeout {
                state.should_timeout = false;
                return Err(PortError::timeout(state.timeout));
            }
            state.write_log.push(data.to_vec());
        }

        // Byte-at-a-time with the lock released in between, like a UART
        // draining its FIFO. Unsynchronized writers would interleave here.
        for &byte in data {
            self.state.lock().transmitted.push(byte);
            thread::yield_now();
        }

        Ok(data.len())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let timeout = {
            let mut state = self.state.lock();
            if state.disconnected {
                return Err(Self::disconnected_error());
            }

            let mut bytes_read = 0;
            for slot in buffer.iter_mut() {
                match state.read_queue.pop_front() {
                    Some(byte) => {
                        *slot = byte;
                        bytes_read += 1;
                    }
                    None => break,
                }
            }
            if bytes_read > 0 {
                return Ok(bytes_read);
            }
            state.timeout
        };

        // Nothing queued: block briefly, then report a timeout like a real port.
        thread::sleep(timeout.min(MAX_IDLE_READ));
        Err(PortError::timeout(timeout))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        self.state.lock().timeout = timeout;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), PortError> {
        self.state.lock().flushed = true;
        Ok(())
    }

    fn try_clone_adapter(&self) -> Result<PortAdapter, PortError> {
        // A duplicate of an open handle, not a second open of the device,
        // so it is counted apart from the opener's live handles.
        Ok(Box::new(match &self.clone_count {
            Some(clones) => self.tracked(clones, Some(clones)),
            None => Self {
                name: self.name.clone(),
                state: Arc::clone(&self.state),
                handle_count: None,
                clone_count: None,
            },
        }))
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("available_bytes", &self.available_bytes())
            .finish()
    }
}

/// Hands out handles onto a shared `MockSerialPort` and counts them.
#[derive(Debug, Clone)]
pub struct MockOpener {
    port: MockSerialPort,
    open_calls: Arc<AtomicUsize>,
    live_handles: Arc<AtomicUsize>,
    cloned_handles: Arc<AtomicUsize>,
    fail_with_not_found: Arc<Mutex<bool>>,
}

impl MockOpener {
    pub fn new(port: MockSerialPort) -> Self {
        Self {
            port,
            open_calls: Arc::new(AtomicUsize::new(0)),
            live_handles: Arc::new(AtomicUsize::new(0)),
            cloned_handles: Arc::new(AtomicUsize::new(0)),
            fail_with_not_found: Arc::new(Mutex::new(false)),
        }
    }

    /// Make subsequent opens fail as if the device were absent.
    pub fn set_device_absent(&self, absent: bool) {
        *self.fail_with_not_found.lock() = absent;
    }

    /// Number of successful opens so far.
    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    /// Number of opened handles that have not been dropped.
    pub fn live_handles(&self) -> usize {
        self.live_handles.load(Ordering::SeqCst)
    }

    /// Number of duplicated handles (`try_clone_adapter`) not yet dropped.
    pub fn cloned_handles(&self) -> usize {
        self.cloned_handles.load(Ordering::SeqCst)
    }

    /// The shared mock behind every handle this opener returns.
    pub fn port(&self) -> &MockSerialPort {
        &self.port
    }
}

impl PortOpener for MockOpener {
    fn open(&self, config: &PortConfig) -> Result<PortAdapter, PortError> {
        if *self.fail_with_not_found.lock() {
            return Err(PortError::not_found(config.port_name.clone()));
        }
        self.port.state.lock().disconnected = false;
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        let mut handle = self
            .port
            .tracked(&self.live_handles, Some(&self.cloned_handles));
        handle.set_timeout(config.write_timeout())?;
        Ok(Box::new(handle))
    }
}
