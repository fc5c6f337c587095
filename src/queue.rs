//! Request queues and the completion channel.
//!
//! Every queue sits behind its own lock. The server never holds more than one
//! queue lock at a time and never blocks while holding one.

use crate::error::{IoError, WireError};
use crate::request::{Request, RequestKind};
use crate::types::{Events, PacketType};
use std::collections::VecDeque;
use std::sync::mpsc::Sender;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Hands completed requests back to the submitter
#[derive(Debug, Clone)]
pub(crate) struct Completer {
    tx: Sender<Request>,
}

impl Completer {
    pub(crate) fn new(tx: Sender<Request>) -> Self {
        Self { tx }
    }

    pub(crate) fn complete(&self, req: Request) {
        if let Err(e) = self.tx.send(req) {
            log::debug!("completion of request {} dropped, receiver gone", e.0.id());
        }
    }

    pub(crate) fn fail(&self, mut req: Request, error: IoError, wire_error: WireError) {
        req.set_outcome(error, wire_error);
        self.complete(req);
    }
}

#[derive(Debug, Default)]
pub(crate) struct Queues {
    write: Mutex<VecDeque<Request>>,
    read: Mutex<VecDeque<Request>>,
    orphan: Mutex<Option<Request>>,
    event: Mutex<VecDeque<Request>>,
    control: Mutex<VecDeque<Request>>,
}

/// Number of requests waiting in each queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueDepths {
    pub write: usize,
    pub read: usize,
    pub orphan: usize,
    pub event: usize,
    pub control: usize,
}

impl Queues {
    pub(crate) fn push_write(&self, req: Request) {
        lock(&self.write).push_back(req);
    }

    pub(crate) fn pop_write(&self) -> Option<Request> {
        lock(&self.write).pop_front()
    }

    /// Puts a send that must be retried back at the head
    pub(crate) fn requeue_write(&self, req: Request) {
        lock(&self.write).push_front(req);
    }

    pub(crate) fn push_read(&self, req: Request) {
        lock(&self.read).push_back(req);
    }

    /// Removes the first receive waiting for `packet_type`
    pub(crate) fn take_read(&self, packet_type: PacketType) -> Option<Request> {
        let mut read = lock(&self.read);
        let pos = read.iter().position(|req| {
            matches!(req.kind(), RequestKind::Receive { packet_type: t } if *t == packet_type)
        })?;
        read.remove(pos)
    }

    /// Fills the orphan slot, handing `req` back if it is taken
    pub(crate) fn set_orphan(&self, req: Request) -> Result<(), Request> {
        let mut slot = lock(&self.orphan);
        if slot.is_some() {
            return Err(req);
        }
        *slot = Some(req);
        Ok(())
    }

    pub(crate) fn take_orphan(&self) -> Option<Request> {
        lock(&self.orphan).take()
    }

    pub(crate) fn push_event(&self, req: Request) {
        lock(&self.event).push_back(req);
    }

    /// Removes every subscription whose mask intersects `events`
    pub(crate) fn take_events(&self, events: Events) -> Vec<Request> {
        let mut queue = lock(&self.event);
        let mut matched = Vec::new();
        let mut kept = VecDeque::with_capacity(queue.len());
        for req in queue.drain(..) {
            match req.kind() {
                RequestKind::Event { mask } if mask.intersects(events) => matched.push(req),
                _ => kept.push_back(req),
            }
        }
        *queue = kept;
        matched
    }

    pub(crate) fn push_control(&self, req: Request) {
        lock(&self.control).push_back(req);
    }

    pub(crate) fn pop_control(&self) -> Option<Request> {
        lock(&self.control).pop_front()
    }

    /// Empties the send, receive and orphan queues
    pub(crate) fn drain_data(&self) -> Vec<Request> {
        let mut drained: Vec<Request> = lock(&self.write).drain(..).collect();
        drained.extend(lock(&self.read).drain(..));
        drained.extend(lock(&self.orphan).take());
        drained
    }

    /// Empties every queue, control port included
    pub(crate) fn drain_all(&self) -> Vec<Request> {
        let mut drained = self.drain_data();
        drained.extend(lock(&self.event).drain(..));
        drained.extend(lock(&self.control).drain(..));
        drained
    }

    pub(crate) fn depths(&self) -> QueueDepths {
        QueueDepths {
            write: lock(&self.write).len(),
            read: lock(&self.read).len(),
            orphan: usize::from(lock(&self.orphan).is_some()),
            event: lock(&self.event).len(),
            control: lock(&self.control).len(),
        }
    }
}
