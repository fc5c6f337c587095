use bitflags::bitflags;
use std::fmt;

/// Length of a hardware address in bytes
pub const ADDR_LEN: usize = 6;

/// Packet type tag (Ethernet-style type field)
pub type PacketType = u16;

/// Unit number of a link instance
pub type Unit = u32;

/// Link-layer hardware address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HwAddr(pub [u8; ADDR_LEN]);

impl HwAddr {
    pub const BROADCAST: HwAddr = HwAddr([0xFF; ADDR_LEN]);

    pub fn is_broadcast(&self) -> bool {
        self.0.iter().all(|&b| b == 0xFF)
    }

    pub fn as_bytes(&self) -> &[u8; ADDR_LEN] {
        &self.0
    }
}

impl From<[u8; ADDR_LEN]> for HwAddr {
    fn from(bytes: [u8; ADDR_LEN]) -> Self {
        HwAddr(bytes)
    }
}

impl fmt::Display for HwAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

bitflags! {
    /// Asynchronous link-state and error conditions
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Events: u32 {
        const ERROR = 1;
        const TX = 2;
        const RX = 4;
        const ONLINE = 8;
        const OFFLINE = 16;
        const BUFF = 32;
        const HARDWARE = 64;
        const SOFTWARE = 128;
    }
}

bitflags! {
    /// Per-request I/O flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct IoFlags: u8 {
        /// Payload includes the link header
        const RAW = 0x80;
        /// Frame was addressed to the broadcast address
        const BCAST = 0x40;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_address() {
        assert!(HwAddr::BROADCAST.is_broadcast());
        assert!(!HwAddr([0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE]).is_broadcast());
        assert!(!HwAddr::default().is_broadcast());
    }

    #[test]
    fn address_display() {
        let addr = HwAddr([0x02, 0x00, 0x10, 0xab, 0xcd, 0xef]);
        assert_eq!(addr.to_string(), "02:00:10:ab:cd:ef");
    }
}
