//! Shared test utilities for serial-link integration tests.
//!
//! - Mock-backed sessions with a frame recorder
//! - Polling helper for state reached on the reader thread

#![allow(dead_code)]

use parking_lot::Mutex;
use serial_link::{MockOpener, MockSerialPort, PortConfig, PortSession};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Frames delivered to the receive callback, in order.
#[derive(Clone, Default)]
pub struct FrameRecorder {
    frames: Arc<Mutex<Vec<String>>>,
}

impl FrameRecorder {
    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn push(&self, frame: &str) {
        self.frames.lock().push(frame.to_string());
    }
}

/// Everything a test needs to drive and observe one session.
pub struct Harness {
    pub session: Arc<PortSession>,
    pub opener: MockOpener,
    pub recorder: FrameRecorder,
}

impl Harness {
    /// The shared mock behind the session's handles.
    pub fn port(&self) -> &MockSerialPort {
        self.opener.port()
    }
}

/// Fast timeouts so reader ticks and close are quick.
pub fn test_config() -> PortConfig {
    let mut config = PortConfig::new("MOCK0", 9600);
    config.read_timeout_ms = 2;
    config.write_timeout_ms = 20;
    config
}

pub fn harness_with(config: PortConfig) -> Harness {
    let opener = MockOpener::new(MockSerialPort::new(config.port_name.clone()));
    let recorder = FrameRecorder::default();
    let sink = recorder.clone();
    let session = PortSession::new(config, opener.clone(), move |frame| sink.push(frame));

    Harness {
        session: Arc::new(session),
        opener,
        recorder,
    }
}

/// A started session (auto-open) over a fresh mock.
pub fn open_harness() -> Harness {
    let harness = harness_with(test_config());
    harness.session.start().expect("mock open should succeed");
    harness
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}
