//! # wmsim-proto
//!
//! Frame and message encoding for the wmsim wireless medium simulator.
//!
//! Two concerns live here:
//! - Read-only access to the 802.11 header of submitted frames
//!   ([`FrameView`]): access-category classification and destination
//!   extraction, which the transmit simulator needs before queueing.
//! - The control-channel wire codec ([`wire`]): the compact binary
//!   messages exchanged with the driver over the control socket.

pub mod ieee80211;
pub mod wire;

pub use ieee80211::FrameView;
pub use wire::ControlMessage;

use thiserror::Error;

/// Errors raised while decoding frames or control messages.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtoError {
    /// The frame is too short to carry an 802.11 header.
    #[error("frame too short for an 802.11 header: {0} bytes")]
    FrameTooShort(usize),

    /// A control message was shorter than its fixed layout requires.
    #[error("control message truncated: need {need} bytes, have {have}")]
    Truncated {
        /// Bytes the layout requires.
        need: usize,
        /// Bytes actually present.
        have: usize,
    },

    /// A control message carried bytes past the end of its layout.
    #[error("control message has {0} trailing bytes")]
    TrailingBytes(usize),

    /// The message kind byte is not one we know.
    #[error("unknown control message kind {0:#04x}")]
    UnknownKind(u8),

    /// The payload length field exceeds the bytes present.
    #[error("payload length {claimed} exceeds remaining {remaining} bytes")]
    BadPayloadLength {
        /// Length claimed by the header field.
        claimed: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },
}
