use super::LinkServer;
use crate::data_link::Frame;
use crate::error::{IoError, WireError};
use crate::physical::HardwareTransport;
use crate::request::Request;
use crate::types::{Events, IoFlags};
use log::{debug, warn};

/// Copies a received frame into `req`; `false` if the buffer callback failed.
///
/// Addresses and the broadcast flag are filled in either way.
pub(crate) fn deliver_read_request(req: &mut Request, frame: &Frame) -> bool {
    let raw = req.is_raw();
    let payload = frame.payload(raw);
    req.data_length = payload.len();
    req.flags = if raw { IoFlags::RAW } else { IoFlags::empty() };

    let ok = req
        .buffer_mut()
        .map(|buffer| buffer.copy_to_buffer(payload))
        .unwrap_or(false);
    if ok {
        req.set_outcome(IoError::None, WireError::None);
    } else {
        debug!("request {}: copy to buffer failed", req.id());
        req.set_outcome(IoError::Software, WireError::BuffError);
    }

    req.src = frame.src();
    req.dst = frame.dst();
    if frame.is_broadcast() {
        req.flags |= IoFlags::BCAST;
    }

    ok
}

impl<H: HardwareTransport> LinkServer<H> {
    /// Reads one frame and hands it to the first matching receive, else to the
    /// orphan receiver, else drops it
    pub(crate) fn do_read_requests(&mut self) {
        if !self.hardware.receive_frame(&mut self.frame) {
            warn!("unit {}: error receiving frame", self.shared.unit);
            self.do_event(Events::HARDWARE | Events::ERROR | Events::RX);
            self.shared.stats().device.bad_data += 1;
            return;
        }

        let packet_type = self.frame.packet_type();
        let datasize = self.frame.payload(false).len();
        {
            let mut stats = self.shared.stats();
            stats.device.packets_received += 1;
            stats.track_received(packet_type, datasize);
        }
        debug!("packet {:04x}, size {} received", packet_type, datasize);

        if let Some(req) = self.shared.queues.take_read(packet_type) {
            self.deliver(req);
            return;
        }

        if let Some(req) = self.shared.queues.take_orphan() {
            debug!("orphan read");
            self.deliver(req);
            return;
        }

        debug!("packet {:04x} thrown away", packet_type);
        let mut stats = self.shared.stats();
        stats.device.unknown_types_received += 1;
        stats.track_dropped(packet_type);
    }

    fn deliver(&mut self, mut req: Request) {
        if !deliver_read_request(&mut req, &self.frame) {
            self.do_event(Events::ERROR | Events::BUFF | Events::SOFTWARE);
            self.shared.stats().special.buffer_errors += 1;
        }
        self.completer.complete(req);
    }
}
