use super::LinkServer;
use crate::error::{IoError, WireError};
use crate::physical::{HardwareTransport, Signals};
use crate::request::{Command, Outcome, Request, RequestKind};
use crate::types::Events;
use log::{debug, info, warn};
use std::time::SystemTime;

/// Lifecycle state of a link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No station address yet
    Unconfigured,
    Offline,
    Online,
}

impl<H: HardwareTransport> LinkServer<H> {
    /// Attaches the hardware; state is left alone on failure
    pub(crate) fn go_online(&mut self) -> Outcome {
        debug!("unit {}: trying to go online", self.shared.unit);
        if let Err(e) = self.hardware.attach() {
            warn!("unit {}: error going online: {}", self.shared.unit, e);
            return Outcome::new(IoError::NoResources, WireError::GenericError);
        }
        self.shared.set_state(LinkState::Online);
        self.shared.stats().device.last_start = Some(SystemTime::now());
        self.do_event(Events::ONLINE);
        info!("unit {}: online as {}", self.shared.unit, self.shared.station());
        Outcome::OK
    }

    /// Detaches the hardware if online
    pub(crate) fn go_offline(&mut self) {
        if self.shared.state() != LinkState::Online {
            return;
        }
        self.hardware.detach();
        self.shared.set_state(LinkState::Offline);
        self.do_event(Events::OFFLINE);
        info!("unit {}: offline", self.shared.unit);
    }

    /// Fails all queued sends and receives with out-of-service
    pub(crate) fn reject_packets(&mut self) {
        for req in self.shared.queues.drain_data() {
            self.completer
                .fail(req, IoError::OutOfService, WireError::UnitOffline);
        }
    }

    /// Drains the control port, yielding to a pending receive
    pub(crate) fn do_control_requests(&mut self) {
        loop {
            if self.hardware.receive_pending() {
                debug!("incoming data, control requests deferred");
                self.shared.signals.raise(Signals::REQUEST);
                break;
            }
            let Some(req) = self.shared.queues.pop_control() else {
                break;
            };
            self.do_command(req);
        }
    }

    fn do_command(&mut self, mut req: Request) {
        let RequestKind::Command(command) = *req.kind() else {
            warn!("request {} on control port is not a command", req.id());
            self.completer
                .fail(req, IoError::NotSupported, WireError::GenericError);
            return;
        };
        debug!("unit {}: command {:?}", self.shared.unit, command);

        let outcome = match command {
            Command::Online => match self.shared.state() {
                LinkState::Online => Outcome::new(IoError::BadState, WireError::UnitOnline),
                _ => self.go_online(),
            },
            Command::Offline => match self.shared.state() {
                LinkState::Online => {
                    self.go_offline();
                    self.reject_packets();
                    Outcome::OK
                }
                _ => Outcome::new(IoError::BadState, WireError::UnitOffline),
            },
            Command::ConfigInterface(addr) => match self.shared.state() {
                LinkState::Unconfigured => {
                    self.shared.set_station(addr);
                    self.go_online()
                }
                _ => Outcome::new(IoError::BadState, WireError::IsConfigured),
            },
            Command::Other(code) => match self.default_handler.as_mut() {
                Some(handler) => {
                    debug!("command {:#06x} passed to default handler", code);
                    handler(req);
                    return;
                }
                None => Outcome::new(IoError::NotSupported, WireError::GenericError),
            },
        };

        req.set_outcome(outcome.error, outcome.wire_error);
        self.completer.complete(req);
    }
}
