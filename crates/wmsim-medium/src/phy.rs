//! PHY timing: the rate table and air-time arithmetic.
//!
//! All durations are whole microseconds. The duration formula models an
//! OFDM transmission: 16 µs preamble, 4 µs signal field, then 4 µs per
//! symbol with service bits (16), payload bits and tail bits (6) packed
//! at the slot's data rate.

use serde::{Deserialize, Serialize};

/// Rate table: index → PHY rate in 100 kbps units.
pub const RATE_TABLE: [u32; 8] = [60, 90, 120, 180, 240, 360, 480, 540];

/// Length of the acknowledgement frame used for ack timing.
const ACK_FRAME_LEN: usize = 14;

/// Look up a schedule slot's rate. `None` for negative or out-of-range
/// indices; both terminate an MRR walk.
pub fn rate_for(idx: i8) -> Option<u32> {
    if idx < 0 {
        return None;
    }
    RATE_TABLE.get(idx as usize).copied()
}

/// Fixed PHY parameters, constant for a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PhyParams {
    /// Slot time in microseconds.
    pub slot_time_us: u64,
    /// Short inter-frame space in microseconds.
    pub sifs_us: u64,
}

impl PhyParams {
    /// DCF inter-frame space: two slots plus SIFS.
    pub fn difs_us(&self) -> u64 {
        2 * self.slot_time_us + self.sifs_us
    }

    /// Time on air for one acknowledgement: a 14-byte frame at the
    /// lowest configured rate, after a SIFS.
    pub fn ack_duration_us(&self) -> u64 {
        frame_duration_us(ACK_FRAME_LEN, RATE_TABLE[0]) + self.sifs_us
    }
}

impl Default for PhyParams {
    fn default() -> Self {
        PhyParams { slot_time_us: 9, sifs_us: 16 }
    }
}

/// Time on air in microseconds for a `len`-byte frame at `rate`
/// (100 kbps units): preamble + signal + one symbol time per OFDM
/// symbol, rounding symbols up.
pub fn frame_duration_us(len: usize, rate: u32) -> u64 {
    let bits_x10 = (16 + 8 * len as u64 + 6) * 10;
    16 + 4 + 4 * div_round_up(bits_x10, 4 * rate as u64)
}

fn div_round_up(a: u64, b: u64) -> u64 {
    (a + b - 1) / b
}
