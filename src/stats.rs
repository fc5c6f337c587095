//! Per-unit statistics.

use crate::error::WireError;
use crate::types::PacketType;
use std::collections::HashMap;
use std::time::SystemTime;

/// Global device counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub packets_received: u64,
    pub packets_sent: u64,
    pub bad_data: u64,
    pub unknown_types_received: u64,
    /// Time of the last transition to online
    pub last_start: Option<SystemTime>,
}

/// Counters per error class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpecialStats {
    pub collisions: u64,
    pub tx_errors: u64,
    pub buffer_errors: u64,
}

/// Traffic of one tracked packet type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub packets_dropped: u64,
}

/// Read-only copy handed to callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub device: DeviceStats,
    /// `None` when special statistics are disabled
    pub special: Option<SpecialStats>,
}

#[derive(Debug, Default)]
pub(crate) struct Statistics {
    pub(crate) device: DeviceStats,
    pub(crate) special: SpecialStats,
    types: HashMap<PacketType, TypeStats>,
}

impl Statistics {
    pub(crate) fn snapshot(&self, with_special: bool) -> StatsSnapshot {
        StatsSnapshot {
            device: self.device.clone(),
            special: with_special.then_some(self.special),
        }
    }

    pub(crate) fn track_type(&mut self, packet_type: PacketType) -> Result<(), WireError> {
        if self.types.contains_key(&packet_type) {
            return Err(WireError::AlreadyTracked);
        }
        self.types.insert(packet_type, TypeStats::default());
        Ok(())
    }

    pub(crate) fn untrack_type(&mut self, packet_type: PacketType) -> Result<(), WireError> {
        self.types
            .remove(&packet_type)
            .map(|_| ())
            .ok_or(WireError::NotTracked)
    }

    pub(crate) fn type_stats(&self, packet_type: PacketType) -> Option<TypeStats> {
        self.types.get(&packet_type).copied()
    }

    pub(crate) fn track_sent(&mut self, packet_type: PacketType, bytes: usize) {
        if let Some(t) = self.types.get_mut(&packet_type) {
            t.packets_sent += 1;
            t.bytes_sent += bytes as u64;
        }
    }

    pub(crate) fn track_received(&mut self, packet_type: PacketType, bytes: usize) {
        if let Some(t) = self.types.get_mut(&packet_type) {
            t.packets_received += 1;
            t.bytes_received += bytes as u64;
        }
    }

    pub(crate) fn track_dropped(&mut self, packet_type: PacketType) {
        if let Some(t) = self.types.get_mut(&packet_type) {
            t.packets_dropped += 1;
        }
    }
}
