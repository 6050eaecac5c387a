//! Read-only access to the 802.11 header of a submitted frame.
//!
//! The medium needs exactly two facts about a frame: whether it is a
//! management frame (which selects the access category and forces the
//! noack policy) and who it is addressed to (which selects the
//! receivers at delivery time). Everything else in the header is
//! carried opaquely.

use crate::ProtoError;
use wmsim_common::{MacAddr, ADDR_LEN};

/// Frame-control type bits: both zero means a management frame.
const FC_TYPE_MASK: u8 = 0x0c;

/// Offset of the first address field (frame control + duration).
const ADDR1_OFFSET: usize = 4;

/// Minimum bytes for classification and destination extraction.
pub const MIN_HEADER_LEN: usize = ADDR1_OFFSET + ADDR_LEN;

/// A validated, borrowed view of an 802.11 frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    bytes: &'a [u8],
}

impl<'a> FrameView<'a> {
    /// Validate that `bytes` is long enough to be classified and
    /// addressed. Shorter submissions are decode errors; the original
    /// driver would never produce them.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, ProtoError> {
        if bytes.len() < MIN_HEADER_LEN {
            return Err(ProtoError::FrameTooShort(bytes.len()));
        }
        Ok(FrameView { bytes })
    }

    /// Management frame iff the type bits of the frame-control byte are
    /// both zero.
    pub fn is_mgmt(&self) -> bool {
        self.bytes[0] & FC_TYPE_MASK == 0
    }

    /// The destination address (address 1).
    pub fn dest(&self) -> MacAddr {
        let mut octets = [0u8; ADDR_LEN];
        octets.copy_from_slice(&self.bytes[ADDR1_OFFSET..ADDR1_OFFSET + ADDR_LEN]);
        MacAddr::from_octets(octets)
    }

    /// Noack frames expect no acknowledgement: management frames and
    /// frames with a group-addressed destination.
    pub fn is_noack(&self) -> bool {
        self.is_mgmt() || self.dest().is_multicast()
    }

    /// The whole frame.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }
}
