//! Physical layer: the hardware transport consumed by the link server.
//!
//! This module defines the contract between the link server and the bit/byte
//! transport underneath it:
//! - [`HardwareTransport`]: attach/detach, arbitration, frame transfer and
//!   hardware-specific signal handling
//! - [`Signals`] and [`SignalSet`]: the wait-set the server sleeps on
//! - [`Signaller`]: the handle transports and callers use to wake the server
//!
//! Implementations provided here:
//! - [`loopback::TestPattern`]: a synthetic peer for the diagnostic self-test
//! - `mock::MockLink` (feature `mock`): a scriptable link for tests
//!
//! # Examples
//!
//! ```rust,no_run
//! use libplip::physical::{SignalSet, Signals};
//!
//! let signals = SignalSet::new();
//! let signaller = signals.signaller();
//! signaller.raise(Signals::REQUEST);
//! assert_eq!(signals.wait(Signals::REQUEST | Signals::STOP), Signals::REQUEST);
//! ```

pub mod loopback;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

use crate::config::LinkConfig;
use crate::data_link::Frame;
use crate::error::Result;
use bitflags::bitflags;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

/// Hardware type reported in device queries (Ethernet)
pub const HARDWARE_TYPE_ETHERNET: u32 = 1;

bitflags! {
    /// Wake-up conditions of the link server
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Signals: u32 {
        /// Stop the server
        const STOP = 1 << 12;
        /// A control request was queued
        const REQUEST = 1 << 16;
        /// A send request was queued
        const WRITE = 1 << 17;
        /// Hardware: inbound frame announced
        const RX = 1 << 24;
        /// Hardware: timer expired
        const TIMER = 1 << 25;
        /// Hardware: implementation specific
        const HW_AUX = 1 << 26;
    }
}

impl Signals {
    /// Signals reserved for transports
    pub const HARDWARE: Signals = Signals::RX.union(Signals::TIMER).union(Signals::HW_AUX);
}

/// Pending signals of one link server, with blocking wait
#[derive(Debug, Default)]
pub struct SignalSet {
    pending: Mutex<Signals>,
    cond: Condvar,
}

impl SignalSet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn raise(&self, signals: Signals) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        *pending |= signals;
        self.cond.notify_all();
    }

    /// Blocks until any signal in `mask` is pending, then clears and returns those
    pub fn wait(&self, mask: Signals) -> Signals {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        while !pending.intersects(mask) {
            pending = self
                .cond
                .wait(pending)
                .unwrap_or_else(PoisonError::into_inner);
        }
        let got = *pending & mask;
        pending.remove(got);
        got
    }

    /// Clears and returns the pending signals in `mask` without blocking
    pub fn take(&self, mask: Signals) -> Signals {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let got = *pending & mask;
        pending.remove(got);
        got
    }

    pub fn signaller(self: &Arc<Self>) -> Signaller {
        Signaller(Arc::clone(self))
    }
}

/// Cloneable handle raising signals on a [`SignalSet`]
#[derive(Debug, Clone)]
pub struct Signaller(Arc<SignalSet>);

impl Signaller {
    pub fn raise(&self, signals: Signals) {
        self.0.raise(signals);
    }

    /// Raises `signals` once `delay` has elapsed
    pub fn raise_after(&self, delay: Duration, signals: Signals) {
        if delay.is_zero() {
            self.raise(signals);
            return;
        }
        let set = Arc::clone(&self.0);
        thread::spawn(move || {
            thread::sleep(delay);
            set.raise(signals);
        });
    }
}

/// Byte-level link transport driven by the link server.
///
/// All calls are synchronous and bounded; failures are reported through the
/// return value.
pub trait HardwareTransport: Send {
    /// One-time setup before the server loop starts
    fn init(&mut self, config: &LinkConfig, signaller: Signaller) -> Result<()>;

    /// Releases resources acquired by [`init`](Self::init)
    fn cleanup(&mut self) {}

    fn attach(&mut self) -> Result<()>;
    fn detach(&mut self);

    /// Whether the link is able to take a frame right now
    fn can_send(&self) -> bool;

    /// Arbitrates for the link; `false` means the line could not be obtained
    fn begin_send(&mut self) -> bool;

    /// Gives up a line obtained by [`begin_send`](Self::begin_send) without sending
    fn abort_send(&mut self);

    fn send_frame(&mut self, frame: &Frame) -> bool;

    fn receive_pending(&self) -> bool;

    /// Acknowledges a pending receive before it is read
    fn receive_ack(&mut self);

    fn receive_frame(&mut self, frame: &mut Frame) -> bool;

    /// Hardware signals the server should wait for
    fn signal_mask(&self) -> Signals;

    fn handle_signal(&mut self, signals: Signals);

    /// Schedules a retry wake-up after the configured collision delay
    fn handle_collision_backoff(&mut self);

    fn hardware_type(&self) -> u32 {
        HARDWARE_TYPE_ETHERNET
    }
}
