//! Link server: the single worker owning one link instance.
//!
//! The server sleeps on a wait-set of signals (stop, new control request, new
//! send request and whatever the transport asks for) and, every time it wakes,
//! runs one service pass in a fixed order:
//!
//! 1. service a pending receive
//! 2. let the transport handle its own signals (timers and the like)
//! 3. drain the send queue through the write arbiter, if the link can send
//! 4. service a receive that became pending in the meantime
//! 5. after a collision, have the transport schedule a backoff wake-up
//! 6. drain the control port
//! 7. exit if stop was signalled
//!
//! Receive always preempts transmit and control processing.
//!
//! # Examples
//!
//! ```rust,no_run
//! use libplip::config::LinkConfig;
//! use libplip::physical::loopback::{TestConfig, TestPattern};
//! use libplip::request::{Command, Request};
//! use libplip::server::LinkDevice;
//! use libplip::types::HwAddr;
//!
//! let (link, _control) = TestPattern::new(TestConfig::default());
//! let device = LinkDevice::start(0, LinkConfig::default(), link).unwrap();
//! let addr = HwAddr([0x02, 0, 0, 0, 0, 1]);
//! device.handle().submit(Request::command(Command::ConfigInterface(addr)));
//! let done = device.completions().recv().unwrap();
//! assert!(done.outcome().is_ok());
//! device.shutdown().unwrap();
//! ```

mod event;
mod handle;
mod read;
mod state;
mod write;

#[cfg(test)]
mod tests;

pub use handle::{DefaultHandler, DeviceQuery, LinkDevice, LinkHandle};
pub use state::LinkState;

use crate::config::LinkConfig;
use crate::data_link::Frame;
use crate::error::{IoError, Result, WireError};
use crate::physical::{HardwareTransport, SignalSet, Signals};
use crate::queue::{lock, Completer, Queues};
use crate::stats::Statistics;
use crate::types::{HwAddr, Unit};
use log::{debug, info, trace};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// State shared between the server and its handles
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) unit: Unit,
    pub(crate) config: LinkConfig,
    pub(crate) hardware_type: u32,
    pub(crate) queues: Queues,
    pub(crate) signals: Arc<SignalSet>,
    pub(crate) state: Mutex<LinkState>,
    pub(crate) station: Mutex<HwAddr>,
    pub(crate) stats: Mutex<Statistics>,
    /// Cleared once the server stops taking requests
    pub(crate) running: RwLock<bool>,
}

impl Shared {
    pub(crate) fn new(unit: Unit, config: LinkConfig, hardware_type: u32) -> Self {
        Self {
            unit,
            config,
            hardware_type,
            queues: Queues::default(),
            signals: SignalSet::new(),
            state: Mutex::new(LinkState::Unconfigured),
            station: Mutex::new(HwAddr::default()),
            stats: Mutex::new(Statistics::default()),
            running: RwLock::new(true),
        }
    }

    pub(crate) fn state(&self) -> LinkState {
        *lock(&self.state)
    }

    pub(crate) fn set_state(&self, state: LinkState) {
        *lock(&self.state) = state;
    }

    pub(crate) fn station(&self) -> HwAddr {
        *lock(&self.station)
    }

    pub(crate) fn set_station(&self, addr: HwAddr) {
        *lock(&self.station) = addr;
    }

    pub(crate) fn stats(&self) -> MutexGuard<'_, Statistics> {
        lock(&self.stats)
    }

    pub(crate) fn is_running(&self) -> bool {
        *self.running.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The worker of one link instance
pub(crate) struct LinkServer<H: HardwareTransport> {
    shared: Arc<Shared>,
    hardware: H,
    frame: Frame,
    completer: Completer,
    default_handler: Option<DefaultHandler>,
    hw_mask: Signals,
    /// Set by the write arbiter when arbitration was lost during this pass
    collision: bool,
}

impl<H: HardwareTransport> LinkServer<H> {
    /// Initialises the transport and allocates the frame buffer
    pub(crate) fn new(
        shared: Arc<Shared>,
        mut hardware: H,
        completer: Completer,
        default_handler: Option<DefaultHandler>,
    ) -> Result<Self> {
        hardware.init(&shared.config, shared.signals.signaller())?;
        let hw_mask = hardware.signal_mask() & Signals::HARDWARE;
        debug!(
            "unit {}: allocating {} byte frame buffer",
            shared.unit,
            shared.config.mtu
        );
        let frame = Frame::new(shared.config.mtu);
        Ok(Self {
            shared,
            hardware,
            frame,
            completer,
            default_handler,
            hw_mask,
            collision: false,
        })
    }

    fn wait_mask(&self) -> Signals {
        Signals::STOP | Signals::REQUEST | Signals::WRITE | self.hw_mask
    }

    /// Main loop; returns after a stop signal once everything is torn down
    pub(crate) fn run(mut self) {
        info!("unit {}: server running", self.shared.unit);
        let wait_mask = self.wait_mask();
        loop {
            let recv = if self.hardware.receive_pending() {
                self.shared.signals.take(wait_mask)
            } else {
                trace!("wait {:?}", wait_mask);
                self.shared.signals.wait(wait_mask)
            };
            if !self.service(recv) {
                break;
            }
        }
        self.finish();
    }

    /// One service pass for the signals in `recv`; `false` once stop was received
    pub(crate) fn service(&mut self, recv: Signals) -> bool {
        trace!("service pass {:?}", recv);

        self.service_receive();

        let hw = recv & self.hw_mask;
        if !hw.is_empty() {
            self.hardware.handle_signal(hw);
        }

        if self.hardware.can_send() {
            self.do_write_requests();
        }

        self.service_receive();

        if std::mem::take(&mut self.collision) {
            trace!("collision backoff");
            self.hardware.handle_collision_backoff();
        }

        if recv.contains(Signals::REQUEST) {
            self.do_control_requests();
        }

        if recv.contains(Signals::STOP) {
            debug!("unit {}: received stop signal", self.shared.unit);
            return false;
        }
        true
    }

    fn service_receive(&mut self) {
        if self.hardware.receive_pending() {
            self.hardware.receive_ack();
            self.do_read_requests();
        }
    }

    /// Takes the link offline and fails every outstanding request
    pub(crate) fn finish(mut self) {
        *self
            .shared
            .running
            .write()
            .unwrap_or_else(PoisonError::into_inner) = false;

        self.go_offline();
        let pending = self.shared.queues.drain_all();
        if !pending.is_empty() {
            debug!(
                "unit {}: rejecting {} requests at shutdown",
                self.shared.unit,
                pending.len()
            );
        }
        for req in pending {
            self.completer
                .fail(req, IoError::OutOfService, WireError::UnitOffline);
        }
        self.hardware.cleanup();
        info!("unit {}: server stopped", self.shared.unit);
    }
}
