use super::{HardwareTransport, Signaller, Signals};
use crate::config::LinkConfig;
use crate::data_link::{Frame, ETH_HDR_SIZE};
use crate::error::{PlipError, Result};
use crate::types::{HwAddr, PacketType};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A frame as it left the mock link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    pub bytes: Vec<u8>,
    pub crc: u16,
}

#[derive(Debug, Default)]
struct MockState {
    signaller: Option<Signaller>,
    config: Option<LinkConfig>,
    collision_delay: u32,
    attached: bool,
    fail_init: bool,
    fail_attach: bool,
    deny_arbitration: u32,
    fail_sends: u32,
    // `None` is a frame that fails to arrive intact
    inbound: VecDeque<Option<Vec<u8>>>,
    sent: Vec<SentFrame>,
    arbitration_attempts: u32,
    aborted_sends: u32,
    collision_backoffs: u32,
    handled_signals: Signals,
    attach_count: u32,
    detach_count: u32,
    cleaned_up: bool,
}

/// Test-side control of a [`MockLink`]
#[derive(Debug, Clone, Default)]
pub struct MockControl {
    state: Arc<Mutex<MockState>>,
}

impl MockControl {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn fail_init(&self, fail: bool) {
        self.lock().fail_init = fail;
    }

    pub fn fail_attach(&self, fail: bool) {
        self.lock().fail_attach = fail;
    }

    /// Lose the next `count` arbitrations
    pub fn deny_arbitration(&self, count: u32) {
        self.lock().deny_arbitration = count;
    }

    /// Fail the next `count` frame transmissions
    pub fn fail_sends(&self, count: u32) {
        self.lock().fail_sends = count;
    }

    /// Queues inbound link bytes (header + payload) and announces them
    pub fn inject(&self, bytes: Vec<u8>) {
        let signaller = {
            let mut state = self.lock();
            state.inbound.push_back(Some(bytes));
            state.signaller.clone()
        };
        if let Some(signaller) = signaller {
            signaller.raise(Signals::RX);
        }
    }

    /// Queues a framed packet
    pub fn inject_frame(&self, src: HwAddr, dst: HwAddr, packet_type: PacketType, payload: &[u8]) {
        self.inject(build_frame(src, dst, packet_type, payload));
    }

    /// Queues a frame that will fail to be received
    pub fn inject_corrupt(&self) {
        let signaller = {
            let mut state = self.lock();
            state.inbound.push_back(None);
            state.signaller.clone()
        };
        if let Some(signaller) = signaller {
            signaller.raise(Signals::RX);
        }
    }

    /// Configuration handed to the link at init
    pub fn config(&self) -> Option<LinkConfig> {
        self.lock().config.clone()
    }

    pub fn sent_frames(&self) -> Vec<SentFrame> {
        self.lock().sent.clone()
    }

    pub fn inbound_pending(&self) -> usize {
        self.lock().inbound.len()
    }

    pub fn is_attached(&self) -> bool {
        self.lock().attached
    }

    pub fn arbitration_attempts(&self) -> u32 {
        self.lock().arbitration_attempts
    }

    pub fn aborted_sends(&self) -> u32 {
        self.lock().aborted_sends
    }

    pub fn collision_backoffs(&self) -> u32 {
        self.lock().collision_backoffs
    }

    pub fn handled_signals(&self) -> Signals {
        self.lock().handled_signals
    }

    pub fn attach_count(&self) -> u32 {
        self.lock().attach_count
    }

    pub fn detach_count(&self) -> u32 {
        self.lock().detach_count
    }

    pub fn cleaned_up(&self) -> bool {
        self.lock().cleaned_up
    }
}

/// Builds link bytes for a framed packet
pub fn build_frame(src: HwAddr, dst: HwAddr, packet_type: PacketType, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(ETH_HDR_SIZE + payload.len());
    bytes.extend_from_slice(dst.as_bytes());
    bytes.extend_from_slice(src.as_bytes());
    bytes.extend_from_slice(&packet_type.to_be_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

/// In-memory link for testing
#[derive(Debug, Default)]
pub struct MockLink {
    control: MockControl,
}

impl MockLink {
    pub fn new() -> (Self, MockControl) {
        let control = MockControl::default();
        (
            Self {
                control: control.clone(),
            },
            control,
        )
    }
}

impl HardwareTransport for MockLink {
    fn init(&mut self, config: &LinkConfig, signaller: Signaller) -> Result<()> {
        let mut state = self.control.lock();
        if state.fail_init {
            return Err(PlipError::HardwareError("mock init failure".into()));
        }
        state.collision_delay = config.collision_delay;
        state.config = Some(config.clone());
        state.signaller = Some(signaller);
        Ok(())
    }

    fn cleanup(&mut self) {
        let mut state = self.control.lock();
        state.cleaned_up = true;
        state.signaller = None;
    }

    fn attach(&mut self) -> Result<()> {
        let mut state = self.control.lock();
        if state.fail_attach {
            return Err(PlipError::AttachFailed("mock attach failure".into()));
        }
        state.attached = true;
        state.attach_count += 1;
        Ok(())
    }

    fn detach(&mut self) {
        let mut state = self.control.lock();
        state.attached = false;
        state.detach_count += 1;
    }

    fn can_send(&self) -> bool {
        self.control.lock().attached
    }

    fn begin_send(&mut self) -> bool {
        let mut state = self.control.lock();
        state.arbitration_attempts += 1;
        if state.deny_arbitration > 0 {
            state.deny_arbitration -= 1;
            return false;
        }
        true
    }

    fn abort_send(&mut self) {
        self.control.lock().aborted_sends += 1;
    }

    fn send_frame(&mut self, frame: &Frame) -> bool {
        let mut state = self.control.lock();
        if state.fail_sends > 0 {
            state.fail_sends -= 1;
            return false;
        }
        state.sent.push(SentFrame {
            bytes: frame.link_bytes().to_vec(),
            crc: frame.crc(),
        });
        true
    }

    fn receive_pending(&self) -> bool {
        let state = self.control.lock();
        state.attached && !state.inbound.is_empty()
    }

    fn receive_ack(&mut self) {}

    fn receive_frame(&mut self, frame: &mut Frame) -> bool {
        match self.control.lock().inbound.pop_front() {
            Some(Some(bytes)) => frame.load(&bytes),
            _ => false,
        }
    }

    fn signal_mask(&self) -> Signals {
        Signals::RX | Signals::TIMER
    }

    fn handle_signal(&mut self, signals: Signals) {
        self.control.lock().handled_signals |= signals;
    }

    fn handle_collision_backoff(&mut self) {
        let (signaller, delay) = {
            let mut state = self.control.lock();
            state.collision_backoffs += 1;
            (state.signaller.clone(), state.collision_delay)
        };
        if let Some(signaller) = signaller {
            signaller.raise_after(Duration::from_micros(delay as u64), Signals::TIMER);
        }
    }
}
