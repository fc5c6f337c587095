//! Data link layer: the reusable frame buffer.
//!
//! A link frame carries a checksum word followed by an Ethernet-style header
//! (destination, source, type) and the payload:
//!
//! ```text
//! +-------+---------+---------+------+-----------------+
//! | crc:2 | dst:6   | src:6   | t:2  | payload ...     |
//! +-------+---------+---------+------+-----------------+
//!         ^ raw payloads start here
//! ```
//!
//! A *framed* request supplies only the payload and the header is filled in from
//! the request. A *raw* request supplies header and payload itself.

use crate::types::{HwAddr, PacketType, ADDR_LEN};

/// Size of the Ethernet-style header
pub const ETH_HDR_SIZE: usize = 2 * ADDR_LEN + 2;
/// Bytes carried ahead of the Ethernet-style header
pub const EXTRA_HDR_SIZE: usize = 2;

const DST_OFFSET: usize = 0;
const SRC_OFFSET: usize = ADDR_LEN;
const TYPE_OFFSET: usize = 2 * ADDR_LEN;

/// The single frame buffer of a link instance
#[derive(Debug, Clone)]
pub struct Frame {
    size: usize,
    crc: u16,
    buf: Vec<u8>,
}

impl Frame {
    /// Allocates a frame able to carry `mtu` payload bytes
    pub fn new(mtu: usize) -> Self {
        Self {
            size: 0,
            crc: 0,
            buf: vec![0; ETH_HDR_SIZE + mtu],
        }
    }

    /// Largest payload a framed packet may carry
    pub fn mtu(&self) -> usize {
        self.buf.len() - ETH_HDR_SIZE
    }

    /// Total frame size on the wire, including the checksum word
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn crc(&self) -> u16 {
        self.crc
    }

    pub fn set_crc(&mut self, crc: u16) {
        self.crc = crc;
    }

    /// Header and payload bytes as handed to the transport
    pub fn link_bytes(&self) -> &[u8] {
        &self.buf[..self.link_len()]
    }

    /// Replaces the frame contents with `bytes` received from the link.
    ///
    /// Fails if `bytes` is shorter than the link header or does not fit the
    /// buffer; the frame is left untouched then. The checksum is cleared.
    pub fn load(&mut self, bytes: &[u8]) -> bool {
        if bytes.len() < ETH_HDR_SIZE || bytes.len() > self.buf.len() {
            return false;
        }
        self.buf[..bytes.len()].copy_from_slice(bytes);
        self.size = bytes.len() + EXTRA_HDR_SIZE;
        self.crc = 0;
        true
    }

    /// Fills in the header for a framed send and returns the payload area of `len` bytes.
    ///
    /// Returns `None` if `len` exceeds the MTU.
    pub fn prepare_framed(
        &mut self,
        src: &HwAddr,
        dst: &HwAddr,
        packet_type: PacketType,
        len: usize,
    ) -> Option<&mut [u8]> {
        if len > self.mtu() {
            return None;
        }
        self.size = len + EXTRA_HDR_SIZE + ETH_HDR_SIZE;
        self.buf[DST_OFFSET..DST_OFFSET + ADDR_LEN].copy_from_slice(dst.as_bytes());
        self.buf[SRC_OFFSET..SRC_OFFSET + ADDR_LEN].copy_from_slice(src.as_bytes());
        self.buf[TYPE_OFFSET..TYPE_OFFSET + 2].copy_from_slice(&packet_type.to_be_bytes());
        Some(&mut self.buf[ETH_HDR_SIZE..ETH_HDR_SIZE + len])
    }

    /// Returns the area for a raw send of `len` bytes, header included.
    pub fn prepare_raw(&mut self, len: usize) -> Option<&mut [u8]> {
        if len > self.buf.len() {
            return None;
        }
        self.size = len + EXTRA_HDR_SIZE;
        Some(&mut self.buf[..len])
    }

    /// Payload to deliver to a receiver; a raw receiver gets the header too
    pub fn payload(&self, raw: bool) -> &[u8] {
        let end = self.link_len();
        if raw {
            &self.buf[..end]
        } else {
            &self.buf[ETH_HDR_SIZE.min(end)..end]
        }
    }

    pub fn dst(&self) -> HwAddr {
        self.addr_at(DST_OFFSET)
    }

    pub fn src(&self) -> HwAddr {
        self.addr_at(SRC_OFFSET)
    }

    pub fn packet_type(&self) -> PacketType {
        PacketType::from_be_bytes([self.buf[TYPE_OFFSET], self.buf[TYPE_OFFSET + 1]])
    }

    pub fn is_broadcast(&self) -> bool {
        self.dst().is_broadcast()
    }

    /// Stamps the checksum of the current contents, or clears it when disabled
    pub fn stamp_crc(&mut self, enabled: bool) {
        self.crc = if enabled {
            crc16(self.link_bytes())
        } else {
            0
        };
    }

    /// Checks a stamped checksum. A zero checksum means none was sent.
    pub fn verify_crc(&self) -> bool {
        self.crc == 0 || self.crc == crc16(self.link_bytes())
    }

    fn link_len(&self) -> usize {
        self.size.saturating_sub(EXTRA_HDR_SIZE).min(self.buf.len())
    }

    fn addr_at(&self, offset: usize) -> HwAddr {
        let mut addr = [0u8; ADDR_LEN];
        addr.copy_from_slice(&self.buf[offset..offset + ADDR_LEN]);
        HwAddr(addr)
    }
}

/// CRC-16/CCITT-FALSE
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}
