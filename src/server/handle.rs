use super::{LinkServer, LinkState, Shared};
use crate::config::LinkConfig;
use crate::data_link::ETH_HDR_SIZE;
use crate::error::{IoError, PlipError, Result, WireError};
use crate::physical::{HardwareTransport, Signals};
use crate::queue::{Completer, QueueDepths};
use crate::request::{Outcome, Request, RequestId, RequestKind};
use crate::stats::{StatsSnapshot, TypeStats};
use crate::types::{HwAddr, PacketType, Unit, ADDR_LEN};
use log::{debug, info};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, PoisonError};
use std::thread::{self, JoinHandle};

/// Receives control requests the server does not recognise. The handler owns
/// the request and is responsible for completing it.
pub type DefaultHandler = Box<dyn FnMut(Request) + Send>;

/// Static device properties
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceQuery {
    /// Hardware address size in bits
    pub addr_field_size: u32,
    pub mtu: usize,
    pub bps: u32,
    pub hardware_type: u32,
}

/// Cloneable front door of a running link server
#[derive(Debug, Clone)]
pub struct LinkHandle {
    shared: Arc<Shared>,
    completer: Completer,
}

impl LinkHandle {
    pub(super) fn new(shared: Arc<Shared>, completer: Completer) -> Self {
        Self { shared, completer }
    }

    /// Queues `req` for the server. Every submitted request comes back exactly
    /// once on the completion channel; requests failing validation come back
    /// immediately.
    pub fn submit(&self, req: Request) -> RequestId {
        let id = req.id();
        let running = self
            .shared
            .running
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if !*running {
            self.completer
                .fail(req, IoError::OutOfService, WireError::UnitOffline);
            return id;
        }

        match *req.kind() {
            RequestKind::Send { .. } => self.submit_send(req),
            RequestKind::Receive { .. } => self.shared.queues.push_read(req),
            RequestKind::ReceiveOrphan => {
                if let Err(req) = self.shared.queues.set_orphan(req) {
                    debug!("request {}: orphan receiver already waiting", id);
                    self.completer
                        .fail(req, IoError::BadState, WireError::GenericError);
                }
            }
            RequestKind::Event { mask } => {
                if mask.is_empty() {
                    self.completer
                        .fail(req, IoError::BadArgument, WireError::BadEvent);
                } else {
                    self.shared.queues.push_event(req);
                }
            }
            RequestKind::Command(_) => {
                self.shared.queues.push_control(req);
                self.shared.signals.raise(Signals::REQUEST);
            }
        }
        id
    }

    fn submit_send(&self, req: Request) {
        let len = req.data_length();
        let mtu = self.shared.config.mtu;
        if req.is_raw() && len < ETH_HDR_SIZE {
            self.completer
                .fail(req, IoError::BadArgument, WireError::GenericError);
            return;
        }
        let limit = if req.is_raw() { mtu + ETH_HDR_SIZE } else { mtu };
        if len > limit {
            self.completer
                .fail(req, IoError::MtuExceeded, WireError::GenericError);
            return;
        }

        // Held across the push so an offline transition either sees this send or rejects it here
        let state = crate::queue::lock(&self.shared.state);
        match *state {
            LinkState::Online => {
                self.shared.queues.push_write(req);
                self.shared.signals.raise(Signals::WRITE);
            }
            LinkState::Offline => {
                self.completer
                    .fail(req, IoError::OutOfService, WireError::UnitOffline)
            }
            LinkState::Unconfigured => {
                self.completer
                    .fail(req, IoError::OutOfService, WireError::NotConfigured)
            }
        }
    }

    pub fn unit(&self) -> Unit {
        self.shared.unit
    }

    pub fn state(&self) -> LinkState {
        self.shared.state()
    }

    /// `false` once the server has shut down
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Configured station address, `None` while unconfigured
    pub fn station_address(&self) -> Option<HwAddr> {
        match self.shared.state() {
            LinkState::Unconfigured => None,
            _ => Some(self.shared.station()),
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.shared.config
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared
            .stats()
            .snapshot(!self.shared.config.no_special_stats)
    }

    pub fn query(&self) -> DeviceQuery {
        DeviceQuery {
            addr_field_size: (ADDR_LEN * 8) as u32,
            mtu: self.shared.config.mtu,
            bps: self.shared.config.bps,
            hardware_type: self.shared.hardware_type,
        }
    }

    pub fn queue_depths(&self) -> QueueDepths {
        self.shared.queues.depths()
    }

    /// Starts per-type accounting for `packet_type`
    pub fn track_type(&self, packet_type: PacketType) -> Outcome {
        match self.shared.stats().track_type(packet_type) {
            Ok(()) => Outcome::OK,
            Err(wire) => Outcome::new(IoError::BadState, wire),
        }
    }

    pub fn untrack_type(&self, packet_type: PacketType) -> Outcome {
        match self.shared.stats().untrack_type(packet_type) {
            Ok(()) => Outcome::OK,
            Err(wire) => Outcome::new(IoError::BadState, wire),
        }
    }

    pub fn type_stats(&self, packet_type: PacketType) -> Option<TypeStats> {
        self.shared.stats().type_stats(packet_type)
    }
}

/// A running link: the server thread, its handle and the completion channel
#[derive(Debug)]
pub struct LinkDevice {
    handle: LinkHandle,
    completions: Receiver<Request>,
    worker: Option<JoinHandle<()>>,
}

impl LinkDevice {
    /// Starts the link server for `unit` on `hardware`
    pub fn start<H>(unit: Unit, config: LinkConfig, hardware: H) -> Result<Self>
    where
        H: HardwareTransport + 'static,
    {
        Self::start_with_handler(unit, config, hardware, None)
    }

    /// Like [`start`](Self::start), passing unrecognised commands to `default_handler`
    pub fn start_with_handler<H>(
        unit: Unit,
        config: LinkConfig,
        hardware: H,
        default_handler: Option<DefaultHandler>,
    ) -> Result<Self>
    where
        H: HardwareTransport + 'static,
    {
        let config = config.clamped();
        let shared = Arc::new(Shared::new(unit, config, hardware.hardware_type()));
        let (tx, completions) = mpsc::channel();
        let completer = Completer::new(tx);
        let (startup_tx, startup_rx) = mpsc::channel();

        let server_shared = Arc::clone(&shared);
        let server_completer = completer.clone();
        let worker = thread::Builder::new()
            .name(format!("plip.{}", unit))
            .spawn(move || {
                match LinkServer::new(server_shared, hardware, server_completer, default_handler)
                {
                    Ok(server) => {
                        let _ = startup_tx.send(Ok(()));
                        server.run();
                    }
                    Err(e) => {
                        let _ = startup_tx.send(Err(e));
                    }
                }
            })
            .map_err(|e| PlipError::StartupFailed(e.to_string()))?;

        match startup_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = worker.join();
                return Err(PlipError::StartupFailed(e.to_string()));
            }
            Err(_) => {
                let _ = worker.join();
                return Err(PlipError::ServerStopped);
            }
        }

        info!("unit {}: started", unit);
        Ok(Self {
            handle: LinkHandle::new(shared, completer),
            completions,
            worker: Some(worker),
        })
    }

    pub fn handle(&self) -> &LinkHandle {
        &self.handle
    }

    /// Completed requests, in completion order
    pub fn completions(&self) -> &Receiver<Request> {
        &self.completions
    }

    /// Stops the server and drops the device
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    /// Stops the server, failing every outstanding request, and waits for it to
    /// exit. Completions stay readable afterwards; stopping twice is a no-op.
    pub fn stop(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        self.handle.shared.signals.raise(Signals::STOP);
        worker
            .join()
            .map_err(|_| PlipError::HardwareError("link server panicked".into()))
    }
}

impl Drop for LinkDevice {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
