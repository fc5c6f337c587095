use super::LinkServer;
use crate::physical::HardwareTransport;
use crate::request::RequestKind;
use crate::types::Events;
use log::debug;

impl<H: HardwareTransport> LinkServer<H> {
    /// Completes every subscription interested in `events`
    pub(crate) fn do_event(&mut self, events: Events) {
        debug!("event is {:?}", events);
        for mut req in self.shared.queues.take_events(events) {
            if let RequestKind::Event { mask } = *req.kind() {
                req.events = mask & events;
            }
            self.completer.complete(req);
        }
    }
}
