//! # wmsim-common
//!
//! Common types for the wmsim wireless medium simulator.
//!
//! This crate provides the primitives shared by every other crate:
//! - Monotonic time representation ([`MonoTime`])
//! - Hardware addresses ([`MacAddr`])
//! - Multi-rate retry schedules ([`TxRate`], [`RateSchedule`])
//! - Transmit submissions crossing the control channel ([`Submission`])

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors produced when parsing common types from text.
#[derive(Debug, Error)]
pub enum AddrError {
    /// The textual form of a hardware address was not `xx:xx:xx:xx:xx:xx`.
    #[error("invalid hardware address: {0:?}")]
    InvalidAddress(String),
}

// ============================================================================
// Time Types
// ============================================================================

/// An instant on the monotonic clock, in microseconds.
///
/// All medium scheduling happens on this clock: frame expiry times are
/// absolute `MonoTime` values and the shared delivery timer is armed to
/// them. The zero point is whatever the clock source defines (boot for
/// `CLOCK_MONOTONIC`, arbitrary for test clocks); only differences and
/// ordering matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct MonoTime(u64);

impl MonoTime {
    /// The clock origin.
    pub const ZERO: MonoTime = MonoTime(0);

    /// Create from microseconds since the clock origin.
    pub fn from_micros(us: u64) -> Self {
        MonoTime(us)
    }

    /// Get as microseconds since the clock origin.
    pub fn as_micros(&self) -> u64 {
        self.0
    }

    /// This instant moved forward by `us` microseconds.
    pub fn add_micros(&self, us: u64) -> Self {
        MonoTime(self.0.saturating_add(us))
    }

    /// Microseconds from `earlier` to `self`, zero if `earlier` is later.
    pub fn micros_since(&self, earlier: MonoTime) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for MonoTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // seconds.microseconds, the shape the delivery log uses
        write!(f, "{}.{:06}", self.0 / 1_000_000, self.0 % 1_000_000)
    }
}

// ============================================================================
// Hardware Addresses
// ============================================================================

/// Number of octets in a hardware address.
pub const ADDR_LEN: usize = 6;

/// A 48-bit hardware address identifying a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MacAddr([u8; ADDR_LEN]);

impl MacAddr {
    /// The broadcast address `ff:ff:ff:ff:ff:ff`.
    pub const BROADCAST: MacAddr = MacAddr([0xff; ADDR_LEN]);

    /// Create from raw octets.
    pub fn from_octets(octets: [u8; ADDR_LEN]) -> Self {
        MacAddr(octets)
    }

    /// Get the raw octets.
    pub fn octets(&self) -> [u8; ADDR_LEN] {
        self.0
    }

    /// Group-addressed test: the low bit of the first octet is set for
    /// multicast and broadcast destinations.
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddr {
    type Err = AddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; ADDR_LEN];
        let mut parts = s.split(':');
        for octet in octets.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| AddrError::InvalidAddress(s.to_string()))?;
            *octet = u8::from_str_radix(part, 16)
                .map_err(|_| AddrError::InvalidAddress(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(AddrError::InvalidAddress(s.to_string()));
        }
        Ok(MacAddr(octets))
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|_| {
            D::Error::custom(format!("invalid hardware address: {s:?}"))
        })
    }
}

// ============================================================================
// Transmit Flags
// ============================================================================

/// Set in the tx-status flags word when the frame was acknowledged.
pub const TX_STAT_ACK: u32 = 1 << 2;

// ============================================================================
// Multi-Rate Retry Schedules
// ============================================================================

/// Maximum number of rate slots in a retry schedule.
pub const MAX_TX_RATES: usize = 4;

/// One slot of a multi-rate retry schedule: a rate-table index and the
/// number of attempts to make at that rate. A negative index terminates
/// the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxRate {
    /// Rate table index, or negative to mark the end of the schedule.
    pub idx: i8,
    /// Attempts at this rate.
    pub count: i8,
}

impl TxRate {
    /// The terminal slot value written past the point of success.
    pub const TERMINAL: TxRate = TxRate { idx: -1, count: -1 };
}

/// A multi-rate retry schedule of up to [`MAX_TX_RATES`] slots.
///
/// The transmit simulator walks the schedule in order and, on success,
/// truncates it: the successful slot keeps the number of attempts that
/// were actually used and every later slot becomes [`TxRate::TERMINAL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateSchedule([TxRate; MAX_TX_RATES]);

impl RateSchedule {
    /// Build a schedule from up to [`MAX_TX_RATES`] slots; missing slots
    /// are filled with terminal markers.
    pub fn from_slots(slots: &[TxRate]) -> Self {
        let mut rates = [TxRate::TERMINAL; MAX_TX_RATES];
        for (dst, src) in rates.iter_mut().zip(slots.iter()) {
            *dst = *src;
        }
        RateSchedule(rates)
    }

    /// All slots, in walk order.
    pub fn slots(&self) -> &[TxRate; MAX_TX_RATES] {
        &self.0
    }

    /// The slot at `i`.
    pub fn slot(&self, i: usize) -> TxRate {
        self.0[i]
    }

    /// Record a successful transmission: slot `i` used `attempts` tries,
    /// and every slot after it is marked terminal.
    pub fn commit_success(&mut self, i: usize, attempts: i8) {
        self.0[i].count = attempts;
        for slot in self.0.iter_mut().skip(i + 1) {
            *slot = TxRate::TERMINAL;
        }
    }
}

impl Default for RateSchedule {
    fn default() -> Self {
        RateSchedule([TxRate::TERMINAL; MAX_TX_RATES])
    }
}

impl fmt::Display for RateSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, slot) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}x{}", slot.idx, slot.count)?;
        }
        write!(f, "]")
    }
}

// ============================================================================
// Submissions
// ============================================================================

/// A transmit request handed to the medium by the driver.
///
/// The payload bytes are an 802.11 frame; the cookie is opaque to the
/// medium and echoed verbatim in the resulting tx-status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Address of the submitting station.
    pub sender: MacAddr,
    /// Flags as submitted; the medium may add [`TX_STAT_ACK`].
    pub flags: u32,
    /// Driver correlation token, echoed in the tx-status.
    pub cookie: u64,
    /// The retry schedule to walk.
    pub rates: RateSchedule,
    /// Raw frame bytes.
    pub payload: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_time_arithmetic() {
        let t = MonoTime::from_micros(1_500_000);
        assert_eq!(t.add_micros(250).as_micros(), 1_500_250);
        assert_eq!(t.micros_since(MonoTime::from_micros(1_000_000)), 500_000);
        assert_eq!(MonoTime::ZERO.micros_since(t), 0);
        assert_eq!(format!("{t}"), "1.500000");
    }

    #[test]
    fn test_addr_parse_and_display() {
        let addr: MacAddr = "02:00:00:00:0a:00".parse().unwrap();
        assert_eq!(addr.octets(), [0x02, 0, 0, 0, 0x0a, 0]);
        assert_eq!(addr.to_string(), "02:00:00:00:0a:00");
        assert!("02:00:00:00:0a".parse::<MacAddr>().is_err());
        assert!("02:00:00:00:0a:00:11".parse::<MacAddr>().is_err());
        assert!("zz:00:00:00:0a:00".parse::<MacAddr>().is_err());
    }

    #[test]
    fn test_addr_multicast() {
        assert!(MacAddr::BROADCAST.is_multicast());
        assert!(MacAddr::from_octets([0x01, 0, 0x5e, 0, 0, 1]).is_multicast());
        assert!(!MacAddr::from_octets([0x02, 0, 0, 0, 0, 1]).is_multicast());
    }

    #[test]
    fn test_schedule_commit_success() {
        let mut rates = RateSchedule::from_slots(&[
            TxRate { idx: 7, count: 2 },
            TxRate { idx: 3, count: 3 },
            TxRate { idx: 0, count: 1 },
        ]);
        rates.commit_success(1, 1);
        assert_eq!(rates.slot(0), TxRate { idx: 7, count: 2 });
        assert_eq!(rates.slot(1), TxRate { idx: 3, count: 1 });
        assert_eq!(rates.slot(2), TxRate::TERMINAL);
        assert_eq!(rates.slot(3), TxRate::TERMINAL);
    }

    #[test]
    fn test_schedule_from_short_slice_pads_terminal() {
        let rates = RateSchedule::from_slots(&[TxRate { idx: 0, count: 1 }]);
        assert_eq!(rates.slot(0), TxRate { idx: 0, count: 1 });
        for i in 1..MAX_TX_RATES {
            assert_eq!(rates.slot(i), TxRate::TERMINAL);
        }
    }
}
