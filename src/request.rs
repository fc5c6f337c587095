//! Requests submitted to a link server.
//!
//! A [`Request`] is created by the caller, handed to
//! [`LinkHandle::submit`](crate::server::LinkHandle::submit), lives in exactly one
//! queue while pending and comes back exactly once on the completion channel with
//! its [`Outcome`] filled in.

use crate::error::{IoError, WireError};
use crate::types::{Events, HwAddr, IoFlags, PacketType};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies a request across submission and completion
pub type RequestId = u64;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Copies payload between the caller's memory and the frame buffer.
///
/// A `false` return is reported as a buffer error on the request.
pub trait BufferManagement: Send {
    /// Fills `dst` completely with outbound payload
    fn copy_from_buffer(&mut self, dst: &mut [u8]) -> bool;

    /// Accepts an inbound payload
    fn copy_to_buffer(&mut self, src: &[u8]) -> bool;
}

/// Plain `Vec<u8>` backed buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VecBuffer {
    data: Vec<u8>,
}

impl VecBuffer {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl BufferManagement for VecBuffer {
    fn copy_from_buffer(&mut self, dst: &mut [u8]) -> bool {
        if dst.len() > self.data.len() {
            return false;
        }
        dst.copy_from_slice(&self.data[..dst.len()]);
        true
    }

    fn copy_to_buffer(&mut self, src: &[u8]) -> bool {
        self.data.clear();
        self.data.extend_from_slice(src);
        true
    }
}

/// Control-plane commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Online,
    Offline,
    /// Sets the station address and brings the link online
    ConfigInterface(HwAddr),
    /// Anything else; handed to the default handler
    Other(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Send {
        dst: HwAddr,
        packet_type: PacketType,
    },
    /// Receive of one packet type
    Receive { packet_type: PacketType },
    /// Receive of any packet nobody else asked for
    ReceiveOrphan,
    Command(Command),
    /// Subscription to link events
    Event { mask: Events },
}

/// Result slot of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Outcome {
    pub error: IoError,
    pub wire_error: WireError,
}

impl Outcome {
    pub const OK: Outcome = Outcome {
        error: IoError::None,
        wire_error: WireError::None,
    };

    pub fn new(error: IoError, wire_error: WireError) -> Self {
        Self { error, wire_error }
    }

    pub fn is_ok(&self) -> bool {
        self.error == IoError::None
    }
}

pub struct Request {
    id: RequestId,
    kind: RequestKind,
    pub(crate) flags: IoFlags,
    pub(crate) src: HwAddr,
    pub(crate) dst: HwAddr,
    pub(crate) data_length: usize,
    pub(crate) events: Events,
    pub(crate) retries: u32,
    outcome: Outcome,
    buffer: Option<Box<dyn BufferManagement>>,
}

impl Request {
    fn new(kind: RequestKind, buffer: Option<Box<dyn BufferManagement>>) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            flags: IoFlags::empty(),
            src: HwAddr::default(),
            dst: HwAddr::default(),
            data_length: 0,
            events: Events::empty(),
            retries: 0,
            outcome: Outcome::OK,
            buffer,
        }
    }

    /// Framed send of `len` payload bytes taken from `buffer`
    pub fn send(
        dst: HwAddr,
        packet_type: PacketType,
        len: usize,
        buffer: impl BufferManagement + 'static,
    ) -> Self {
        let mut req = Self::new(RequestKind::Send { dst, packet_type }, Some(Box::new(buffer)));
        req.dst = dst;
        req.data_length = len;
        req
    }

    /// Raw send: `buffer` supplies `len` bytes including the link header
    pub fn send_raw(len: usize, buffer: impl BufferManagement + 'static) -> Self {
        let mut req = Self::send(HwAddr::default(), 0, len, buffer);
        req.flags = IoFlags::RAW;
        req
    }

    pub fn receive(packet_type: PacketType, buffer: impl BufferManagement + 'static) -> Self {
        Self::new(RequestKind::Receive { packet_type }, Some(Box::new(buffer)))
    }

    pub fn receive_orphan(buffer: impl BufferManagement + 'static) -> Self {
        Self::new(RequestKind::ReceiveOrphan, Some(Box::new(buffer)))
    }

    pub fn command(command: Command) -> Self {
        Self::new(RequestKind::Command(command), None)
    }

    pub fn on_event(mask: Events) -> Self {
        Self::new(RequestKind::Event { mask }, None)
    }

    /// Deliver received frames with their link header
    pub fn raw(mut self) -> Self {
        self.flags |= IoFlags::RAW;
        self
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn kind(&self) -> &RequestKind {
        &self.kind
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn flags(&self) -> IoFlags {
        self.flags
    }

    pub fn is_raw(&self) -> bool {
        self.flags.contains(IoFlags::RAW)
    }

    pub fn is_broadcast(&self) -> bool {
        self.flags.contains(IoFlags::BCAST)
    }

    /// Source address of a received frame
    pub fn src(&self) -> HwAddr {
        self.src
    }

    /// Destination address of a send, or of a received frame
    pub fn dst(&self) -> HwAddr {
        self.dst
    }

    pub fn data_length(&self) -> usize {
        self.data_length
    }

    /// Events that completed a subscription
    pub fn events(&self) -> Events {
        self.events
    }

    /// Arbitration attempts lost by a send
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn buffer_mut(&mut self) -> Option<&mut (dyn BufferManagement + 'static)> {
        self.buffer.as_deref_mut()
    }

    pub fn take_buffer(&mut self) -> Option<Box<dyn BufferManagement>> {
        self.buffer.take()
    }

    pub(crate) fn set_outcome(&mut self, error: IoError, wire_error: WireError) {
        self.outcome = Outcome::new(error, wire_error);
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("flags", &self.flags)
            .field("data_length", &self.data_length)
            .field("retries", &self.retries)
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}
