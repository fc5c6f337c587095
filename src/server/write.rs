use super::LinkServer;
use crate::error::{IoError, WireError};
use crate::physical::{HardwareTransport, Signals};
use crate::request::{Request, RequestKind};
use crate::types::Events;
use log::{debug, warn};

/// Result of one arbitrated write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteResult {
    Ok,
    /// Arbitration lost, the line was not obtained
    Aborted,
    /// The request's buffer callback failed
    BufferError,
    /// The transport failed to transmit
    Error,
}

/// What the arbiter does after handling the head request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Advance,
    RetryLater,
}

impl<H: HardwareTransport> LinkServer<H> {
    fn arbitrated_write(&mut self, req: &mut Request) -> WriteResult {
        if !self.hardware.begin_send() {
            return WriteResult::Aborted;
        }

        let len = req.data_length;
        debug!("having line for request {}, size {}", req.id(), len);

        let area = match *req.kind() {
            RequestKind::Send { dst, packet_type } if !req.is_raw() => {
                let src = self.shared.station();
                self.frame.prepare_framed(&src, &dst, packet_type, len)
            }
            _ => self.frame.prepare_raw(len),
        };
        let copied = match (area, req.buffer_mut()) {
            (Some(area), Some(buffer)) => buffer.copy_from_buffer(area),
            _ => false,
        };
        if !copied {
            self.hardware.abort_send();
            return WriteResult::BufferError;
        }

        self.frame.stamp_crc(self.shared.config.send_crc);
        if self.hardware.send_frame(&self.frame) {
            WriteResult::Ok
        } else {
            debug!("error sending packet (size={})", self.frame.size());
            WriteResult::Error
        }
    }

    /// Sends queued requests in order until the queue is empty, a receive is
    /// pending or arbitration is lost
    pub(crate) fn do_write_requests(&mut self) {
        loop {
            if self.hardware.receive_pending() {
                debug!("incoming data, writes deferred");
                self.shared.signals.raise(Signals::WRITE);
                break;
            }
            let Some(req) = self.shared.queues.pop_write() else {
                break;
            };
            if self.write_request(req) == Flow::RetryLater {
                break;
            }
        }
    }

    fn write_request(&mut self, mut req: Request) -> Flow {
        match self.arbitrated_write(&mut req) {
            WriteResult::Aborted => {
                self.collision = true;
                req.retries += 1;
                let collisions = {
                    let mut stats = self.shared.stats();
                    stats.special.collisions += 1;
                    stats.special.collisions
                };
                debug!(
                    "couldn't get the line for request {} (attempt {}, {} collisions)",
                    req.id(),
                    req.retries,
                    collisions
                );
                if req.retries > self.shared.config.retries {
                    warn!("request {}: too many retries", req.id());
                    self.shared.stats().special.tx_errors += 1;
                    self.completer
                        .fail(req, IoError::TxFailure, WireError::TooManyRetries);
                } else {
                    self.shared.queues.requeue_write(req);
                }
                Flow::RetryLater
            }
            WriteResult::BufferError => {
                warn!("request {}: buffer error", req.id());
                self.do_event(Events::ERROR | Events::BUFF | Events::SOFTWARE);
                {
                    let mut stats = self.shared.stats();
                    stats.special.tx_errors += 1;
                    stats.special.buffer_errors += 1;
                }
                self.completer
                    .fail(req, IoError::Software, WireError::BuffError);
                Flow::Advance
            }
            WriteResult::Error => {
                // Line errors are final at this layer
                warn!("request {}: error while transmitting packet", req.id());
                self.do_event(Events::ERROR | Events::TX | Events::HARDWARE);
                self.shared.stats().special.tx_errors += 1;
                self.completer
                    .fail(req, IoError::TxFailure, WireError::GenericError);
                Flow::Advance
            }
            WriteResult::Ok => {
                debug!("request {}: packet transmitted", req.id());
                {
                    let mut stats = self.shared.stats();
                    stats.device.packets_sent += 1;
                    stats.track_sent(self.frame.packet_type(), req.data_length);
                }
                req.set_outcome(IoError::None, WireError::None);
                self.completer.complete(req);
                Flow::Advance
            }
        }
    }
}
