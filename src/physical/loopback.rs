//! Diagnostic self-test.
//!
//! [`TestPattern`] stands in for the far end of the cable. On request it offers a
//! pattern frame to the link server, and it checks every frame the server sends
//! against the same pattern:
//!
//! - destination: broadcast
//! - source: the configured test address
//! - type: the configured test type
//! - payload byte `i`: `i & 0xff`

use super::{HardwareTransport, Signaller, Signals};
use crate::config::LinkConfig;
use crate::data_link::{Frame, ETH_HDR_SIZE};
use crate::error::{PlipError, Result};
use crate::types::{HwAddr, PacketType};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Pattern parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestConfig {
    pub addr: HwAddr,
    pub packet_type: PacketType,
    /// Link bytes per test frame, header included
    pub packet_len: usize,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            addr: HwAddr([0x1a, 0x11, 0xaf, 0xa0, 0x47, 0x11]),
            packet_type: 0xfffd,
            packet_len: 1514,
        }
    }
}

impl TestConfig {
    /// Builds the link bytes of one pattern frame
    pub fn build_packet(&self) -> Vec<u8> {
        let len = self.packet_len.max(ETH_HDR_SIZE);
        let mut bytes = Vec::with_capacity(len);
        bytes.extend_from_slice(HwAddr::BROADCAST.as_bytes());
        bytes.extend_from_slice(self.addr.as_bytes());
        bytes.extend_from_slice(&self.packet_type.to_be_bytes());
        bytes.extend((0..len - ETH_HDR_SIZE).map(|i| (i & 0xff) as u8));
        bytes
    }

    /// Counts the bytes of `bytes` that deviate from the pattern, plus one for a size mismatch
    pub fn check_packet(&self, bytes: &[u8]) -> u32 {
        let expected = self.build_packet();
        let mut errors = u32::from(bytes.len() != expected.len());
        errors += bytes
            .iter()
            .zip(expected.iter())
            .filter(|(got, want)| got != want)
            .count() as u32;
        errors
    }
}

/// Counters for one direction
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DirectionStats {
    pub count: u64,
    pub bytes: u64,
    pub errors: u64,
    /// Highest observed rate in bytes per second
    pub max_rate: u64,
}

impl DirectionStats {
    fn record(&mut self, bytes: usize, errors: u32, elapsed: Duration) {
        if errors > 0 {
            self.errors += 1;
            return;
        }
        self.count += 1;
        self.bytes += bytes as u64;
        let rate = rate_per_sec(bytes, elapsed);
        if rate > self.max_rate {
            self.max_rate = rate;
        }
    }
}

fn rate_per_sec(bytes: usize, elapsed: Duration) -> u64 {
    let micros = elapsed.as_micros().max(1);
    (bytes as u128 * 1_000_000 / micros) as u64
}

/// Self-test counters
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TestStats {
    /// Pattern frames handed to the link server
    pub generated: DirectionStats,
    /// Frames sent by the link server and checked against the pattern
    pub checked: DirectionStats,
}

#[derive(Debug, Default)]
struct TestState {
    signaller: Option<Signaller>,
    attached: bool,
    requested: Option<Instant>,
    send_started: Option<Instant>,
    stats: TestStats,
}

/// Caller-side control of a running self-test
#[derive(Debug, Clone, Default)]
pub struct TestControl {
    state: Arc<Mutex<TestState>>,
}

impl TestControl {
    fn lock(&self) -> MutexGuard<'_, TestState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Offers one pattern frame to the link server
    pub fn request_packet(&self) {
        let signaller = {
            let mut state = self.lock();
            state.requested = Some(Instant::now());
            state.signaller.clone()
        };
        if let Some(signaller) = signaller {
            signaller.raise(Signals::RX);
        }
    }

    pub fn stats(&self) -> TestStats {
        self.lock().stats
    }

    pub fn reset_stats(&self) {
        self.lock().stats = TestStats::default();
    }
}

/// Synthetic far end used for the diagnostic self-test
#[derive(Debug)]
pub struct TestPattern {
    config: TestConfig,
    control: TestControl,
}

impl TestPattern {
    pub fn new(config: TestConfig) -> (Self, TestControl) {
        let control = TestControl::default();
        (
            Self {
                config,
                control: control.clone(),
            },
            control,
        )
    }
}

impl HardwareTransport for TestPattern {
    fn init(&mut self, config: &LinkConfig, signaller: Signaller) -> Result<()> {
        if self.config.packet_len < ETH_HDR_SIZE
            || self.config.packet_len > ETH_HDR_SIZE + config.mtu
        {
            return Err(PlipError::InvalidParameter);
        }
        self.control.lock().signaller = Some(signaller);
        log::info!(
            "self-test: {} byte frames of type {:04x} from {}",
            self.config.packet_len,
            self.config.packet_type,
            self.config.addr
        );
        Ok(())
    }

    fn cleanup(&mut self) {
        self.control.lock().signaller = None;
    }

    fn attach(&mut self) -> Result<()> {
        self.control.lock().attached = true;
        Ok(())
    }

    fn detach(&mut self) {
        self.control.lock().attached = false;
    }

    fn can_send(&self) -> bool {
        self.control.lock().attached
    }

    fn begin_send(&mut self) -> bool {
        self.control.lock().send_started = Some(Instant::now());
        true
    }

    fn abort_send(&mut self) {
        self.control.lock().send_started = None;
    }

    fn send_frame(&mut self, frame: &Frame) -> bool {
        let bytes = frame.link_bytes();
        let errors = self.config.check_packet(bytes);
        if errors > 0 {
            log::warn!("self-test: {} pattern errors in {} byte frame", errors, bytes.len());
        }
        let mut state = self.control.lock();
        let elapsed = state
            .send_started
            .take()
            .map(|t| t.elapsed())
            .unwrap_or_default();
        state.stats.checked.record(bytes.len(), errors, elapsed);
        true
    }

    fn receive_pending(&self) -> bool {
        let state = self.control.lock();
        state.attached && state.requested.is_some()
    }

    fn receive_ack(&mut self) {}

    fn receive_frame(&mut self, frame: &mut Frame) -> bool {
        let Some(requested) = self.control.lock().requested.take() else {
            return false;
        };
        let bytes = self.config.build_packet();
        let ok = frame.load(&bytes);
        let errors = u32::from(!ok);
        self.control
            .lock()
            .stats
            .generated
            .record(bytes.len(), errors, requested.elapsed());
        ok
    }

    fn signal_mask(&self) -> Signals {
        Signals::RX | Signals::TIMER
    }

    fn handle_signal(&mut self, _signals: Signals) {}

    fn handle_collision_backoff(&mut self) {
        if let Some(signaller) = &self.control.lock().signaller {
            signaller.raise(Signals::TIMER);
        }
    }
}
