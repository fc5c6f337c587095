//! Link configuration.
//!
//! Options arrive already parsed as a [`ConfigArgs`] record. Each present value is
//! clamped into its `[min, max]` range; values out of range are never rejected.
//!
//! The whole [`LinkConfig`] is handed to the transport at init. The link server
//! itself uses `mtu`, `bps`, `retries`, `send_crc` and `no_special_stats`; the
//! timing values and priority are for the transport alone.

use crate::types::Unit;

pub const MIN_TIMEOUT: u32 = 500;
pub const MAX_TIMEOUT: u32 = 10_000_000;
pub const DEF_TIMEOUT: u32 = 500_000;

pub const MIN_PRIORITY: i32 = -128;
pub const MAX_PRIORITY: i32 = 127;
pub const DEF_PRIORITY: i32 = 0;

pub const MIN_MTU: usize = 576;
pub const MAX_MTU: usize = 128 * 1024;
pub const DEF_MTU: usize = 1500;

pub const MIN_BPS: u32 = 1_000;
pub const MAX_BPS: u32 = 0x7FFF_FFFF;
pub const DEF_BPS: u32 = 500_000;

pub const MIN_RETRIES: u32 = 0;
pub const MAX_RETRIES: u32 = 255;
pub const DEF_RETRIES: u32 = 6;

pub const MIN_COLLISION_DELAY: u32 = 0;
pub const MAX_COLLISION_DELAY: u32 = 10_000_000;
pub const DEF_COLLISION_DELAY: u32 = 500;
/// Added to the default collision delay of odd units so two peers don't retry in lock-step
pub const COLLISION_DELAY_DIFF: u32 = 200;

pub const MIN_ARBITRATION_DELAY: u32 = 0;
pub const MAX_ARBITRATION_DELAY: u32 = 10_000_000;
pub const DEF_ARBITRATION_DELAY: u32 = 200;

/// Return `val`, cut to `min` or `max` if it leaves the range
pub fn bounds<T: PartialOrd>(val: T, min: T, max: T) -> T {
    if val > max {
        max
    } else if val < min {
        min
    } else {
        val
    }
}

/// Recognised configuration options, as supplied by the caller
#[derive(Debug, Clone, Default)]
pub struct ConfigArgs {
    pub timeout: Option<u32>,
    pub priority: Option<i32>,
    pub mtu: Option<usize>,
    pub bps: Option<u32>,
    pub retries: Option<u32>,
    pub send_crc: bool,
    pub collision_delay: Option<u32>,
    pub arbitration_delay: Option<u32>,
    pub no_special_stats: bool,
}

/// Effective link configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Link timeout in microseconds. Only the transport reads it.
    pub timeout: u32,
    /// Scheduling priority, passed through to the transport
    pub priority: i32,
    pub mtu: usize,
    /// Bit rate reported in device queries
    pub bps: u32,
    /// Arbitration denials tolerated before a send fails
    pub retries: u32,
    pub send_crc: bool,
    /// Backoff after a collision, in microseconds
    pub collision_delay: u32,
    /// Delay before arbitration is attempted, in microseconds. Only the
    /// transport reads it.
    pub arbitration_delay: u32,
    pub no_special_stats: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self::for_unit(0)
    }
}

impl LinkConfig {
    /// Defaults for the given unit
    pub fn for_unit(unit: Unit) -> Self {
        Self {
            timeout: DEF_TIMEOUT,
            priority: DEF_PRIORITY,
            mtu: DEF_MTU,
            bps: DEF_BPS,
            retries: DEF_RETRIES,
            send_crc: false,
            collision_delay: default_collision_delay(unit),
            arbitration_delay: DEF_ARBITRATION_DELAY,
            no_special_stats: false,
        }
    }

    /// Builds a configuration from caller options, clamping every present value
    pub fn from_args(unit: Unit, args: &ConfigArgs) -> Self {
        let mut cfg = Self::for_unit(unit);

        if let Some(timeout) = args.timeout {
            cfg.timeout = bounds(timeout, MIN_TIMEOUT, MAX_TIMEOUT);
        }
        if let Some(priority) = args.priority {
            cfg.priority = bounds(priority, MIN_PRIORITY, MAX_PRIORITY);
        }
        if let Some(mtu) = args.mtu {
            cfg.mtu = bounds(mtu, MIN_MTU, MAX_MTU);
        }
        if let Some(bps) = args.bps {
            cfg.bps = bounds(bps, MIN_BPS, MAX_BPS);
        }
        if let Some(retries) = args.retries {
            cfg.retries = bounds(retries, MIN_RETRIES, MAX_RETRIES);
        }
        cfg.send_crc = args.send_crc;
        if let Some(delay) = args.collision_delay {
            cfg.collision_delay = bounds(delay, MIN_COLLISION_DELAY, MAX_COLLISION_DELAY);
        }
        if let Some(delay) = args.arbitration_delay {
            cfg.arbitration_delay = bounds(delay, MIN_ARBITRATION_DELAY, MAX_ARBITRATION_DELAY);
        }
        cfg.no_special_stats = args.no_special_stats;

        log::debug!(
            "unit {}: timeout {}, pri {}, mtu {}, bps {}, retries {}, crc {}, delay {}/{}",
            unit,
            cfg.timeout,
            cfg.priority,
            cfg.mtu,
            cfg.bps,
            cfg.retries,
            cfg.send_crc,
            cfg.collision_delay,
            cfg.arbitration_delay
        );

        cfg
    }

    /// Re-applies all bounds, for configurations built by hand
    pub fn clamped(mut self) -> Self {
        self.timeout = bounds(self.timeout, MIN_TIMEOUT, MAX_TIMEOUT);
        self.priority = bounds(self.priority, MIN_PRIORITY, MAX_PRIORITY);
        self.mtu = bounds(self.mtu, MIN_MTU, MAX_MTU);
        self.bps = bounds(self.bps, MIN_BPS, MAX_BPS);
        self.retries = bounds(self.retries, MIN_RETRIES, MAX_RETRIES);
        self.collision_delay = bounds(
            self.collision_delay,
            MIN_COLLISION_DELAY,
            MAX_COLLISION_DELAY,
        );
        self.arbitration_delay = bounds(
            self.arbitration_delay,
            MIN_ARBITRATION_DELAY,
            MAX_ARBITRATION_DELAY,
        );
        self
    }
}

fn default_collision_delay(unit: Unit) -> u32 {
    if unit % 2 == 1 {
        DEF_COLLISION_DELAY + COLLISION_DELAY_DIFF
    } else {
        DEF_COLLISION_DELAY
    }
}
