use super::*;
use crate::config::LinkConfig;
use crate::data_link::crc16;
use crate::physical::mock::{build_frame, MockControl, MockLink};
use crate::queue::QueueDepths;
use crate::request::{BufferManagement, Command, Outcome, Request, RequestId, VecBuffer};
use crate::types::{Events, PacketType};
use std::sync::mpsc::{self, Receiver};

const STATION: HwAddr = HwAddr([0x02, 0x00, 0x5e, 0x00, 0x00, 0x01]);
const PEER: HwAddr = HwAddr([0x02, 0x00, 0x5e, 0x00, 0x00, 0x02]);
const IP: PacketType = 0x0800;
const ARP: PacketType = 0x0806;

/// Receive buffer the test can still read after the request is gone
#[derive(Debug, Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl BufferManagement for SharedBuffer {
    fn copy_from_buffer(&mut self, dst: &mut [u8]) -> bool {
        let data = self.0.lock().unwrap();
        if dst.len() > data.len() {
            return false;
        }
        dst.copy_from_slice(&data[..dst.len()]);
        true
    }

    fn copy_to_buffer(&mut self, src: &[u8]) -> bool {
        *self.0.lock().unwrap() = src.to_vec();
        true
    }
}

struct Harness {
    server: LinkServer<MockLink>,
    control: MockControl,
    shared: Arc<Shared>,
    handle: LinkHandle,
    completions: Receiver<Request>,
}

impl Harness {
    fn new(config: LinkConfig) -> Self {
        Self::with_handler(config, None)
    }

    fn with_handler(config: LinkConfig, handler: Option<DefaultHandler>) -> Self {
        let (link, control) = MockLink::new();
        let shared = Arc::new(Shared::new(0, config, link.hardware_type()));
        let (tx, completions) = mpsc::channel();
        let completer = Completer::new(tx);
        let server = LinkServer::new(Arc::clone(&shared), link, completer.clone(), handler).unwrap();
        let handle = LinkHandle::new(Arc::clone(&shared), completer);
        Self {
            server,
            control,
            shared,
            handle,
            completions,
        }
    }

    /// Configured and online, with the configure completion consumed
    fn online(config: LinkConfig) -> Self {
        let mut h = Self::new(config);
        h.handle
            .submit(Request::command(Command::ConfigInterface(STATION)));
        h.pass();
        let done = h.completed();
        assert_eq!(done.len(), 1);
        assert!(done[0].outcome().is_ok());
        h
    }

    /// One service pass over whatever is pending
    fn pass(&mut self) -> bool {
        let recv = self.shared.signals.take(Signals::all());
        self.server.service(recv)
    }

    fn completed(&self) -> Vec<Request> {
        self.completions.try_iter().collect()
    }
}

fn quick_config() -> LinkConfig {
    LinkConfig {
        collision_delay: 0,
        ..LinkConfig::default()
    }
}

fn find(done: &[Request], id: RequestId) -> &Request {
    done.iter()
        .find(|r| r.id() == id)
        .unwrap_or_else(|| panic!("request {} not completed", id))
}

mod control_tests {
    use super::*;

    #[test]
    fn test_configure_goes_online() {
        let mut h = Harness::new(quick_config());
        let sub = h.handle.submit(Request::on_event(Events::ONLINE | Events::OFFLINE));
        let cfg = h
            .handle
            .submit(Request::command(Command::ConfigInterface(STATION)));
        assert_eq!(h.handle.state(), LinkState::Unconfigured);
        assert_eq!(h.handle.station_address(), None);

        assert!(h.pass());
        let done = h.completed();
        assert_eq!(done.len(), 2);
        assert!(find(&done, cfg).outcome().is_ok());
        // Subscriber sees only the event it asked for that actually fired
        assert_eq!(find(&done, sub).events(), Events::ONLINE);

        assert_eq!(h.handle.state(), LinkState::Online);
        assert_eq!(h.handle.station_address(), Some(STATION));
        assert_eq!(h.control.attach_count(), 1);
        assert!(h.handle.stats().device.last_start.is_some());
    }

    #[test]
    fn test_configure_twice_keeps_address() {
        let mut h = Harness::online(quick_config());
        h.handle
            .submit(Request::command(Command::ConfigInterface(PEER)));
        h.pass();

        let done = h.completed();
        assert_eq!(done[0].outcome().error, IoError::BadState);
        assert_eq!(done[0].outcome().wire_error, WireError::IsConfigured);
        assert_eq!(h.handle.station_address(), Some(STATION));
        assert_eq!(h.control.attach_count(), 1);
    }

    #[test]
    fn test_online_and_offline_in_wrong_state() {
        let mut h = Harness::online(quick_config());
        h.handle.submit(Request::command(Command::Online));
        h.pass();
        let done = h.completed();
        assert_eq!(
            done[0].outcome(),
            Outcome::new(IoError::BadState, WireError::UnitOnline)
        );
        assert_eq!(h.control.attach_count(), 1);

        h.handle.submit(Request::command(Command::Offline));
        h.handle.submit(Request::command(Command::Offline));
        h.pass();
        let done = h.completed();
        assert!(done[0].outcome().is_ok());
        assert_eq!(
            done[1].outcome(),
            Outcome::new(IoError::BadState, WireError::UnitOffline)
        );
        assert_eq!(h.control.detach_count(), 1);
    }

    #[test]
    fn test_offline_before_configure() {
        let mut h = Harness::new(quick_config());
        h.handle.submit(Request::command(Command::Offline));
        h.pass();
        let done = h.completed();
        assert_eq!(done[0].outcome().wire_error, WireError::UnitOffline);
        assert_eq!(h.handle.state(), LinkState::Unconfigured);
    }

    #[test]
    fn test_attach_failure() {
        let mut h = Harness::new(quick_config());
        h.control.fail_attach(true);
        h.handle
            .submit(Request::command(Command::ConfigInterface(STATION)));
        h.pass();

        let done = h.completed();
        assert_eq!(
            done[0].outcome(),
            Outcome::new(IoError::NoResources, WireError::GenericError)
        );
        assert_eq!(h.handle.state(), LinkState::Unconfigured);
        assert!(!h.control.is_attached());
    }

    #[test]
    fn test_offline_rejects_queued_requests() {
        let mut config = quick_config();
        config.retries = 10;
        let mut h = Harness::online(config);
        let sub = h.handle.submit(Request::on_event(Events::OFFLINE));

        // Keep both sends queued past the write phase
        h.control.deny_arbitration(1);
        let queued = [
            h.handle.submit(Request::send(PEER, IP, 3, VecBuffer::new(vec![1, 2, 3]))),
            h.handle.submit(Request::send(PEER, IP, 3, VecBuffer::new(vec![4, 5, 6]))),
            h.handle.submit(Request::receive(IP, VecBuffer::default())),
            h.handle.submit(Request::receive(ARP, VecBuffer::default())),
            h.handle.submit(Request::receive_orphan(VecBuffer::default())),
        ];
        let offline = h.handle.submit(Request::command(Command::Offline));
        h.pass();

        let done = h.completed();
        assert_eq!(done.len(), 7);
        for id in queued {
            assert_eq!(
                find(&done, id).outcome(),
                Outcome::new(IoError::OutOfService, WireError::UnitOffline)
            );
        }
        assert!(find(&done, offline).outcome().is_ok());
        assert_eq!(find(&done, sub).events(), Events::OFFLINE);
        assert_eq!(h.handle.state(), LinkState::Offline);
        assert_eq!(h.handle.queue_depths(), QueueDepths::default());
        assert!(h.control.sent_frames().is_empty());

        // Sends are refused at the door while offline
        let late = h.handle.submit(Request::send(PEER, IP, 1, VecBuffer::new(vec![1])));
        let done = h.completed();
        assert_eq!(find(&done, late).outcome().wire_error, WireError::UnitOffline);

        // And accepted again once back online
        h.handle.submit(Request::command(Command::Online));
        h.pass();
        assert!(h.completed()[0].outcome().is_ok());
        assert_eq!(h.control.attach_count(), 2);
        assert_eq!(h.handle.station_address(), Some(STATION));
    }

    #[test]
    fn test_unknown_command_without_handler() {
        let mut h = Harness::online(quick_config());
        h.handle.submit(Request::command(Command::Other(0x42)));
        h.pass();
        assert_eq!(
            h.completed()[0].outcome(),
            Outcome::new(IoError::NotSupported, WireError::GenericError)
        );
    }

    #[test]
    fn test_unknown_command_goes_to_default_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler: DefaultHandler = Box::new(move |req: Request| {
            sink.lock().unwrap().push(req);
        });
        let mut h = Harness::with_handler(quick_config(), Some(handler));
        let id = h.handle.submit(Request::command(Command::Other(0x42)));
        h.pass();

        // The handler owns the request now
        assert!(h.completed().is_empty());
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].id(), id);
    }

    #[test]
    fn test_control_deferred_while_receive_pending() {
        let mut h = Harness::online(quick_config());
        for _ in 0..3 {
            h.control.inject_frame(PEER, STATION, ARP, &[0]);
        }
        h.handle.submit(Request::command(Command::Online));

        // Two frames are read this pass, the third is still pending at control time
        h.pass();
        assert!(h.completed().is_empty());
        assert_eq!(h.handle.queue_depths().control, 1);
        assert_eq!(h.control.inbound_pending(), 1);

        h.pass();
        let done = h.completed();
        assert_eq!(done[0].outcome().wire_error, WireError::UnitOnline);
        assert_eq!(h.handle.stats().device.unknown_types_received, 3);
    }
}

mod write_tests {
    use super::*;

    #[test]
    fn test_framed_send() {
        let mut h = Harness::online(quick_config());
        let id = h
            .handle
            .submit(Request::send(PEER, IP, 3, VecBuffer::new(vec![1, 2, 3])));
        h.pass();

        let done = h.completed();
        assert!(find(&done, id).outcome().is_ok());
        let sent = h.control.sent_frames();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].bytes, build_frame(STATION, PEER, IP, &[1, 2, 3]));
        assert_eq!(sent[0].crc, 0);
        assert_eq!(h.handle.stats().device.packets_sent, 1);
    }

    #[test]
    fn test_send_crc_is_stamped() {
        let mut config = quick_config();
        config.send_crc = true;
        let mut h = Harness::online(config);
        h.handle
            .submit(Request::send(PEER, IP, 4, VecBuffer::new(vec![9, 8, 7, 6])));
        h.pass();

        let sent = h.control.sent_frames();
        assert_eq!(sent[0].crc, crc16(&sent[0].bytes));
        assert_ne!(sent[0].crc, 0);
    }

    #[test]
    fn test_sends_keep_submission_order() {
        let mut h = Harness::online(quick_config());
        for i in 0..3u8 {
            h.handle
                .submit(Request::send(PEER, IP, 1, VecBuffer::new(vec![i])));
        }
        h.pass();

        let payloads: Vec<u8> = h
            .control
            .sent_frames()
            .iter()
            .map(|f| f.bytes[14])
            .collect();
        assert_eq!(payloads, vec![0, 1, 2]);
    }

    #[test]
    fn test_retry_limit() {
        let mut config = quick_config();
        config.retries = 4;
        let mut h = Harness::online(config);
        h.control.deny_arbitration(5);
        let first = h
            .handle
            .submit(Request::send(PEER, IP, 1, VecBuffer::new(vec![1])));
        let second = h
            .handle
            .submit(Request::send(PEER, IP, 1, VecBuffer::new(vec![2])));

        // Each lost arbitration ends the write phase of its pass
        for _ in 0..4 {
            h.pass();
            assert!(h.completed().is_empty());
            assert_eq!(h.handle.queue_depths().write, 2);
        }

        h.pass();
        let done = h.completed();
        assert_eq!(done.len(), 1);
        let failed = find(&done, first);
        assert_eq!(
            failed.outcome(),
            Outcome::new(IoError::TxFailure, WireError::TooManyRetries)
        );
        assert_eq!(failed.retries(), 5);

        let special = h.handle.stats().special.unwrap();
        assert_eq!(special.collisions, 5);
        assert_eq!(special.tx_errors, 1);
        assert_eq!(h.control.collision_backoffs(), 5);

        // The next send goes out once the line is free
        h.pass();
        let done = h.completed();
        assert!(find(&done, second).outcome().is_ok());
        assert_eq!(h.control.sent_frames()[0].bytes[14], 2);
    }

    #[test]
    fn test_collision_then_success() {
        let mut h = Harness::online(quick_config());
        h.control.deny_arbitration(2);
        let id = h
            .handle
            .submit(Request::send(PEER, IP, 1, VecBuffer::new(vec![1])));

        h.pass();
        h.pass();
        assert!(h.completed().is_empty());
        h.pass();
        let done = h.completed();
        let sent = find(&done, id);
        assert!(sent.outcome().is_ok());
        assert_eq!(sent.retries(), 2);
        assert_eq!(h.control.arbitration_attempts(), 3);
    }

    #[test]
    fn test_transmit_error_is_not_retried() {
        let mut h = Harness::online(quick_config());
        let sub = h.handle.submit(Request::on_event(Events::TX | Events::ERROR));
        h.control.fail_sends(1);
        let id = h
            .handle
            .submit(Request::send(PEER, IP, 1, VecBuffer::new(vec![1])));
        h.pass();

        let done = h.completed();
        let failed = find(&done, id);
        assert_eq!(
            failed.outcome(),
            Outcome::new(IoError::TxFailure, WireError::GenericError)
        );
        assert_eq!(failed.retries(), 0);
        assert_eq!(find(&done, sub).events(), Events::TX | Events::ERROR);
        assert_eq!(h.control.arbitration_attempts(), 1);

        let special = h.handle.stats().special.unwrap();
        assert_eq!(special.tx_errors, 1);
        assert_eq!(special.collisions, 0);
        assert_eq!(h.control.collision_backoffs(), 0);
    }

    #[test]
    fn test_send_buffer_error() {
        let mut h = Harness::online(quick_config());
        let sub = h.handle.submit(Request::on_event(Events::BUFF));
        // Claims more bytes than the buffer holds
        let id = h
            .handle
            .submit(Request::send(PEER, IP, 10, VecBuffer::new(vec![1, 2, 3])));
        h.pass();

        let done = h.completed();
        assert_eq!(
            find(&done, id).outcome(),
            Outcome::new(IoError::Software, WireError::BuffError)
        );
        assert_eq!(find(&done, sub).events(), Events::BUFF);
        assert_eq!(h.control.aborted_sends(), 1);
        assert!(h.control.sent_frames().is_empty());

        let special = h.handle.stats().special.unwrap();
        assert_eq!(special.buffer_errors, 1);
        assert_eq!(special.tx_errors, 1);
    }

    #[test]
    fn test_receive_preempts_transmit() {
        let mut h = Harness::online(quick_config());
        let send = h
            .handle
            .submit(Request::send(PEER, IP, 1, VecBuffer::new(vec![1])));
        let rx_a = h.handle.submit(Request::receive(ARP, VecBuffer::default()));
        let rx_b = h.handle.submit(Request::receive(ARP, VecBuffer::default()));
        h.control.inject_frame(PEER, STATION, ARP, &[1]);
        h.control.inject_frame(PEER, STATION, ARP, &[2]);

        h.pass();
        let done = h.completed();
        assert_eq!(done.len(), 2);
        assert_eq!(done[0].id(), rx_a);
        assert_eq!(done[1].id(), rx_b);
        assert!(h.control.sent_frames().is_empty());
        assert_eq!(h.handle.queue_depths().write, 1);

        // Nothing else is pending, so the deferred send must have left a wake-up behind
        assert_eq!(h.control.inbound_pending(), 0);
        let wake = h.shared.signals.take(Signals::all());
        assert!(wake.contains(Signals::WRITE));

        h.server.service(wake);
        assert_eq!(h.completed()[0].id(), send);
        assert_eq!(h.control.sent_frames().len(), 1);
        assert!(h.shared.signals.take(Signals::WRITE).is_empty());
    }

    #[test]
    fn test_raw_round_trip() {
        let mut a = Harness::online(quick_config());
        let mut b = Harness::online(quick_config());
        let src = HwAddr([0x02, 0, 0, 0, 0, 0x10]);
        let dst = HwAddr([0x02, 0, 0, 0, 0, 0x20]);
        let bytes = build_frame(src, dst, IP, &[0xde, 0xad, 0xbe, 0xef]);

        let inbound = SharedBuffer::default();
        let rx = b.handle.submit(Request::receive(IP, inbound.clone()).raw());
        a.handle
            .submit(Request::send_raw(bytes.len(), VecBuffer::new(bytes.clone())));
        a.pass();

        // Raw sends carry the caller's header verbatim
        let sent = a.control.sent_frames();
        assert_eq!(sent[0].bytes, bytes);

        b.control.inject(sent[0].bytes.clone());
        b.pass();
        let done = b.completed();
        let got = find(&done, rx);
        assert!(got.outcome().is_ok());
        assert!(got.is_raw());
        assert_eq!(got.src(), src);
        assert_eq!(got.dst(), dst);
        assert_eq!(got.data_length(), bytes.len());
        assert_eq!(inbound.contents(), bytes);
    }
}

mod read_tests {
    use super::*;

    #[test]
    fn test_first_matching_receive_wins() {
        let mut h = Harness::online(quick_config());
        let first = SharedBuffer::default();
        let a = h.handle.submit(Request::receive(IP, first.clone()));
        h.handle.submit(Request::receive(ARP, VecBuffer::default()));
        h.handle.submit(Request::receive(IP, VecBuffer::default()));
        h.control.inject_frame(PEER, STATION, IP, &[7, 7]);
        h.pass();

        let done = h.completed();
        assert_eq!(done.len(), 1);
        let got = find(&done, a);
        assert!(got.outcome().is_ok());
        assert_eq!(got.src(), PEER);
        assert_eq!(got.dst(), STATION);
        assert_eq!(got.data_length(), 2);
        assert_eq!(first.contents(), vec![7, 7]);
        assert_eq!(h.handle.queue_depths().read, 2);
        assert_eq!(h.handle.stats().device.packets_received, 1);
    }

    #[test]
    fn test_orphan_then_drop() {
        let mut h = Harness::online(quick_config());
        let orphan_buf = SharedBuffer::default();
        let orphan = h.handle.submit(Request::receive_orphan(orphan_buf.clone()));
        h.handle.submit(Request::receive(IP, VecBuffer::default()));

        h.control.inject_frame(PEER, HwAddr::BROADCAST, 0x9000, &[1, 2, 3]);
        h.pass();
        let done = h.completed();
        let got = find(&done, orphan);
        assert!(got.outcome().is_ok());
        assert!(got.is_broadcast());
        assert_eq!(orphan_buf.contents(), vec![1, 2, 3]);

        // Slot is empty again, so the next unmatched frame is dropped
        h.control.inject_frame(PEER, STATION, 0x9000, &[4]);
        h.pass();
        assert!(h.completed().is_empty());
        let stats = h.handle.stats();
        assert_eq!(stats.device.unknown_types_received, 1);
        assert_eq!(stats.device.packets_received, 2);
    }

    #[test]
    fn test_second_orphan_rejected() {
        let h = Harness::online(quick_config());
        h.handle.submit(Request::receive_orphan(VecBuffer::default()));
        let second = h.handle.submit(Request::receive_orphan(VecBuffer::default()));

        let done = h.completed();
        assert_eq!(
            find(&done, second).outcome(),
            Outcome::new(IoError::BadState, WireError::GenericError)
        );
        assert_eq!(h.handle.queue_depths().orphan, 1);
    }

    #[test]
    fn test_runt_frame_is_bad_data() {
        let mut h = Harness::online(quick_config());
        h.handle.submit(Request::receive(IP, VecBuffer::default()));
        h.handle.submit(Request::receive(IP, VecBuffer::default()));
        h.control.inject_frame(PEER, STATION, IP, &[1]);
        h.pass();
        assert_eq!(h.completed().len(), 1);

        // Shorter than a link header; must not reuse the previous frame's type
        h.control.inject(vec![0x02, 0x00, 0x5e, 0x00]);
        h.pass();
        assert!(h.completed().is_empty());
        assert_eq!(h.handle.queue_depths().read, 1);
        let stats = h.handle.stats();
        assert_eq!(stats.device.bad_data, 1);
        assert_eq!(stats.device.packets_received, 1);
    }

    #[test]
    fn test_receive_failure() {
        let mut h = Harness::online(quick_config());
        let sub = h.handle.submit(Request::on_event(Events::ERROR));
        h.handle.submit(Request::receive_orphan(VecBuffer::default()));
        h.control.inject_corrupt();
        h.pass();

        let done = h.completed();
        assert_eq!(done.len(), 1);
        assert_eq!(find(&done, sub).events(), Events::ERROR);
        assert_eq!(h.handle.stats().device.bad_data, 1);
        assert_eq!(h.handle.stats().device.packets_received, 0);
        assert_eq!(h.handle.queue_depths().orphan, 1);
    }

    #[test]
    fn test_receives_wait_for_online() {
        let mut h = Harness::new(quick_config());
        h.handle.submit(Request::receive(IP, VecBuffer::default()));
        h.control.inject_frame(PEER, STATION, IP, &[1]);
        h.pass();
        assert!(h.completed().is_empty());
        assert_eq!(h.control.inbound_pending(), 1);
    }

    #[test]
    fn test_type_tracking() {
        let mut h = Harness::online(quick_config());
        assert!(h.handle.track_type(IP).is_ok());
        assert_eq!(
            h.handle.track_type(IP),
            Outcome::new(IoError::BadState, WireError::AlreadyTracked)
        );

        h.handle.submit(Request::receive(IP, VecBuffer::default()));
        h.handle
            .submit(Request::send(PEER, IP, 2, VecBuffer::new(vec![1, 2])));
        h.control.inject_frame(PEER, STATION, IP, &[1, 2, 3]);
        h.control.inject_frame(PEER, STATION, IP, &[4]);
        // Both frames are read first, the send goes out on the next pass
        h.pass();
        h.pass();

        let stats = h.handle.type_stats(IP).unwrap();
        assert_eq!(stats.packets_received, 2);
        assert_eq!(stats.bytes_received, 4);
        assert_eq!(stats.packets_dropped, 1);
        assert_eq!(stats.packets_sent, 1);
        assert_eq!(stats.bytes_sent, 2);
        assert!(h.handle.type_stats(ARP).is_none());

        assert!(h.handle.untrack_type(IP).is_ok());
        assert_eq!(
            h.handle.untrack_type(IP),
            Outcome::new(IoError::BadState, WireError::NotTracked)
        );
    }
}

mod handle_tests {
    use super::*;

    #[test]
    fn test_send_before_configure() {
        let h = Harness::new(quick_config());
        let id = h
            .handle
            .submit(Request::send(PEER, IP, 1, VecBuffer::new(vec![1])));
        let done = h.completed();
        assert_eq!(
            find(&done, id).outcome(),
            Outcome::new(IoError::OutOfService, WireError::NotConfigured)
        );
    }

    #[test]
    fn test_send_size_limits() {
        let h = Harness::online(quick_config());
        let mtu = h.handle.config().mtu;

        let too_big = h
            .handle
            .submit(Request::send(PEER, IP, mtu + 1, VecBuffer::default()));
        let raw_too_big = h
            .handle
            .submit(Request::send_raw(mtu + 15, VecBuffer::default()));
        let raw_too_short = h.handle.submit(Request::send_raw(13, VecBuffer::default()));
        let raw_max = h
            .handle
            .submit(Request::send_raw(mtu + 14, VecBuffer::default()));

        let done = h.completed();
        assert_eq!(done.len(), 3);
        assert_eq!(find(&done, too_big).outcome().error, IoError::MtuExceeded);
        assert_eq!(find(&done, raw_too_big).outcome().error, IoError::MtuExceeded);
        assert_eq!(find(&done, raw_too_short).outcome().error, IoError::BadArgument);
        assert!(done.iter().all(|r| r.id() != raw_max));
        assert_eq!(h.handle.queue_depths().write, 1);
    }

    #[test]
    fn test_empty_event_mask() {
        let h = Harness::new(quick_config());
        h.handle.submit(Request::on_event(Events::empty()));
        assert_eq!(
            h.completed()[0].outcome(),
            Outcome::new(IoError::BadArgument, WireError::BadEvent)
        );
    }

    #[test]
    fn test_query_and_stats_visibility() {
        let mut config = quick_config();
        config.no_special_stats = true;
        let h = Harness::new(config);

        let query = h.handle.query();
        assert_eq!(query.addr_field_size, 48);
        assert_eq!(query.mtu, 1500);
        assert_eq!(query.bps, 500_000);
        assert_eq!(query.hardware_type, crate::physical::HARDWARE_TYPE_ETHERNET);
        assert!(h.handle.stats().special.is_none());
    }
}

mod loop_tests {
    use super::*;

    #[test]
    fn test_hardware_signals_forwarded() {
        let mut h = Harness::new(quick_config());
        h.shared.signals.raise(Signals::TIMER | Signals::REQUEST);
        h.pass();
        assert_eq!(h.control.handled_signals(), Signals::TIMER);
    }

    #[test]
    fn test_stop_ends_service() {
        let mut h = Harness::new(quick_config());
        assert!(h.pass());
        h.shared.signals.raise(Signals::STOP);
        assert!(!h.pass());
    }

    #[test]
    fn test_finish_completes_everything() {
        let mut config = quick_config();
        config.retries = 10;
        let mut h = Harness::online(config);
        let sub = h.handle.submit(Request::on_event(Events::OFFLINE));
        let other = h.handle.submit(Request::on_event(Events::BUFF));
        let pending = [
            h.handle
                .submit(Request::send(PEER, IP, 1, VecBuffer::new(vec![1]))),
            h.handle.submit(Request::receive(IP, VecBuffer::default())),
            h.handle.submit(Request::receive_orphan(VecBuffer::default())),
            h.handle.submit(Request::command(Command::Online)),
            other,
        ];

        h.server.finish();
        let done = h.completions.try_iter().collect::<Vec<_>>();
        assert_eq!(done.len(), 6);
        assert_eq!(find(&done, sub).events(), Events::OFFLINE);
        for id in pending {
            assert_eq!(
                find(&done, id).outcome(),
                Outcome::new(IoError::OutOfService, WireError::UnitOffline)
            );
        }
        assert!(h.control.cleaned_up());
        assert!(!h.control.is_attached());
        assert!(!h.handle.is_running());

        // Nothing is queued after shutdown
        let late = h.handle.submit(Request::receive(IP, VecBuffer::default()));
        let done = h.completions.try_iter().collect::<Vec<_>>();
        assert_eq!(find(&done, late).outcome().error, IoError::OutOfService);
        assert_eq!(h.handle.queue_depths(), QueueDepths::default());
    }
}
