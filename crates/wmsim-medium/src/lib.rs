//! # wmsim-medium
//!
//! The shared-medium core of wmsim.
//!
//! This crate turns transmit submissions into scheduled deliveries:
//! - PHY timing: rate table and air-time arithmetic ([`phy`])
//! - Channel model: per-attempt error probability ([`channel`])
//! - Stations and per-access-category queues ([`station`], [`queue`])
//! - The transmit simulator and delivery engine ([`sim`])
//!
//! The core is OS-free: the delivery timer is the [`sim::DeadlineTimer`]
//! trait, outbound events go through [`sim::EventSink`], and the caller
//! supplies the current monotonic time. The runner crate binds all three
//! to timerfd, the control socket, and `CLOCK_MONOTONIC`.

pub mod channel;
pub mod phy;
pub mod queue;
pub mod sim;
pub mod station;

pub use channel::{ErrorModel, SnrErrorModel};
pub use phy::{PhyParams, RATE_TABLE};
pub use queue::{AccessCategory, Frame, QueueParams, TxQueue};
pub use sim::{DeadlineTimer, EventSink, Medium, MediumParams, MediumStats};
pub use station::{Station, StationRegistry};

use thiserror::Error;
use wmsim_common::MacAddr;

/// Errors raised by the medium core.
#[derive(Debug, Error)]
pub enum MediumError {
    /// The submitting address is not a registered station. The
    /// submission is dropped; no tx-status is produced.
    #[error("unknown sender station {0}")]
    UnknownSender(MacAddr),

    /// The submitted payload could not be read as an 802.11 frame.
    #[error("malformed frame: {0}")]
    Frame(#[from] wmsim_proto::ProtoError),

    /// A station address was registered twice.
    #[error("duplicate station address {0}")]
    DuplicateStation(MacAddr),

    /// Arming or disarming the delivery timer failed. Fatal: the medium
    /// cannot schedule without it.
    #[error("delivery timer: {0}")]
    Timer(#[source] std::io::Error),
}
