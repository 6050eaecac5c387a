//! Control-channel wire codec.
//!
//! One datagram carries one message. The layout is little-endian with a
//! one-byte kind tag:
//!
//! ```text
//! Register:  kind(1)
//! Submit:    kind(1) sender(6) flags(u32) cookie(u64)
//!            rates(4 x (idx:i8, count:i8)) len(u16) payload(len)
//! Deliver:   kind(1) receiver(6) rate_idx(u32) signal(i32)
//!            len(u16) payload(len)
//! TxStatus:  kind(1) sender(6) flags(u32) signal(i32)
//!            rates(4 x (idx:i8, count:i8)) cookie(u64)
//! ```
//!
//! Decoding is strict: truncated or over-long datagrams are errors and
//! the caller drops them.

use crate::ProtoError;
use wmsim_common::{MacAddr, RateSchedule, Submission, TxRate, ADDR_LEN, MAX_TX_RATES};

const KIND_REGISTER: u8 = 0x01;
const KIND_SUBMIT: u8 = 0x02;
const KIND_DELIVER: u8 = 0x03;
const KIND_TX_STATUS: u8 = 0x04;

/// A message crossing the control channel, either direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Medium → driver: announces the medium at startup.
    Register,
    /// Driver → medium: a transmit request.
    Submit(Submission),
    /// Medium → driver: a receive-side copy of a delivered frame.
    Deliver {
        /// Station receiving the copy.
        receiver: MacAddr,
        /// Nominal receive rate index.
        rate_idx: u32,
        /// Receive signal value.
        signal: i32,
        /// Raw frame bytes.
        payload: Vec<u8>,
    },
    /// Medium → driver: final status of a submission.
    TxStatus {
        /// Station that submitted the frame.
        sender: MacAddr,
        /// Final flags, possibly including the ack bit.
        flags: u32,
        /// Transmit signal value.
        signal: i32,
        /// The schedule truncated to what was used.
        rates: RateSchedule,
        /// Cookie echoed from the submission.
        cookie: u64,
    },
}

impl ControlMessage {
    /// Encode into a fresh datagram buffer.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            ControlMessage::Register => vec![KIND_REGISTER],
            ControlMessage::Submit(sub) => {
                let mut buf = Vec::with_capacity(1 + ADDR_LEN + 12 + 2 * MAX_TX_RATES + 2 + sub.payload.len());
                buf.push(KIND_SUBMIT);
                buf.extend_from_slice(&sub.sender.octets());
                buf.extend_from_slice(&sub.flags.to_le_bytes());
                buf.extend_from_slice(&sub.cookie.to_le_bytes());
                put_rates(&mut buf, &sub.rates);
                put_payload(&mut buf, &sub.payload);
                buf
            }
            ControlMessage::Deliver { receiver, rate_idx, signal, payload } => {
                let mut buf = Vec::with_capacity(1 + ADDR_LEN + 8 + 2 + payload.len());
                buf.push(KIND_DELIVER);
                buf.extend_from_slice(&receiver.octets());
                buf.extend_from_slice(&rate_idx.to_le_bytes());
                buf.extend_from_slice(&signal.to_le_bytes());
                put_payload(&mut buf, payload);
                buf
            }
            ControlMessage::TxStatus { sender, flags, signal, rates, cookie } => {
                let mut buf = Vec::with_capacity(1 + ADDR_LEN + 8 + 2 * MAX_TX_RATES + 8);
                buf.push(KIND_TX_STATUS);
                buf.extend_from_slice(&sender.octets());
                buf.extend_from_slice(&flags.to_le_bytes());
                buf.extend_from_slice(&signal.to_le_bytes());
                put_rates(&mut buf, rates);
                buf.extend_from_slice(&cookie.to_le_bytes());
                buf
            }
        }
    }

    /// Decode one datagram.
    pub fn decode(data: &[u8]) -> Result<Self, ProtoError> {
        let mut r = Reader::new(data);
        let msg = match r.u8()? {
            KIND_REGISTER => ControlMessage::Register,
            KIND_SUBMIT => {
                let sender = r.addr()?;
                let flags = r.u32()?;
                let cookie = r.u64()?;
                let rates = r.rates()?;
                let payload = r.payload()?;
                ControlMessage::Submit(Submission { sender, flags, cookie, rates, payload })
            }
            KIND_DELIVER => {
                let receiver = r.addr()?;
                let rate_idx = r.u32()?;
                let signal = r.i32()?;
                let payload = r.payload()?;
                ControlMessage::Deliver { receiver, rate_idx, signal, payload }
            }
            KIND_TX_STATUS => {
                let sender = r.addr()?;
                let flags = r.u32()?;
                let signal = r.i32()?;
                let rates = r.rates()?;
                let cookie = r.u64()?;
                ControlMessage::TxStatus { sender, flags, signal, rates, cookie }
            }
            kind => return Err(ProtoError::UnknownKind(kind)),
        };
        r.finish()?;
        Ok(msg)
    }
}

fn put_rates(buf: &mut Vec<u8>, rates: &RateSchedule) {
    for slot in rates.slots() {
        buf.push(slot.idx as u8);
        buf.push(slot.count as u8);
    }
}

fn put_payload(buf: &mut Vec<u8>, payload: &[u8]) {
    // caller-side invariant: 802.11 frames never approach 64 KiB
    buf.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    buf.extend_from_slice(payload);
}

/// Cursor over one inbound datagram.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtoError> {
        let end = self.pos + n;
        if end > self.data.len() {
            return Err(ProtoError::Truncated { need: end, have: self.data.len() });
        }
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, ProtoError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, ProtoError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, ProtoError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i32(&mut self) -> Result<i32, ProtoError> {
        Ok(self.u32()? as i32)
    }

    fn u64(&mut self) -> Result<u64, ProtoError> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(u64::from_le_bytes(raw))
    }

    fn addr(&mut self) -> Result<MacAddr, ProtoError> {
        let b = self.take(ADDR_LEN)?;
        let mut octets = [0u8; ADDR_LEN];
        octets.copy_from_slice(b);
        Ok(MacAddr::from_octets(octets))
    }

    fn rates(&mut self) -> Result<RateSchedule, ProtoError> {
        let mut slots = [TxRate::TERMINAL; MAX_TX_RATES];
        for slot in slots.iter_mut() {
            let b = self.take(2)?;
            *slot = TxRate { idx: b[0] as i8, count: b[1] as i8 };
        }
        Ok(RateSchedule::from_slots(&slots))
    }

    fn payload(&mut self) -> Result<Vec<u8>, ProtoError> {
        let len = self.u16()? as usize;
        let remaining = self.data.len() - self.pos;
        if len > remaining {
            return Err(ProtoError::BadPayloadLength { claimed: len, remaining });
        }
        Ok(self.take(len)?.to_vec())
    }

    fn finish(&self) -> Result<(), ProtoError> {
        if self.pos != self.data.len() {
            return Err(ProtoError::TrailingBytes(self.data.len() - self.pos));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_submission() -> Submission {
        Submission {
            sender: "02:00:00:00:00:00".parse().unwrap(),
            flags: 0,
            cookie: 0xdead_beef_cafe_f00d,
            rates: RateSchedule::from_slots(&[
                TxRate { idx: 7, count: 2 },
                TxRate { idx: 3, count: 3 },
            ]),
            payload: vec![0x08, 0, 0, 0, 0x02, 0, 0, 0, 0, 1, 0xaa, 0xbb],
        }
    }

    #[test]
    fn test_submit_round_trip() {
        let msg = ControlMessage::Submit(sample_submission());
        let decoded = ControlMessage::decode(&msg.encode()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_tx_status_round_trip() {
        let msg = ControlMessage::TxStatus {
            sender: "02:00:00:00:01:00".parse().unwrap(),
            flags: wmsim_common::TX_STAT_ACK,
            signal: 35,
            rates: RateSchedule::from_slots(&[TxRate { idx: 0, count: 1 }]),
            cookie: 17,
        };
        assert_eq!(ControlMessage::decode(&msg.encode()).unwrap(), msg);
    }

    #[test]
    fn test_deliver_round_trip_and_register() {
        let msg = ControlMessage::Deliver {
            receiver: "02:00:00:00:01:00".parse().unwrap(),
            rate_idx: 0,
            signal: -50,
            payload: vec![1, 2, 3],
        };
        assert_eq!(ControlMessage::decode(&msg.encode()).unwrap(), msg);
        assert_eq!(
            ControlMessage::decode(&ControlMessage::Register.encode()).unwrap(),
            ControlMessage::Register
        );
    }

    #[test]
    fn test_negative_rate_slots_survive() {
        let msg = ControlMessage::Submit(Submission {
            rates: RateSchedule::default(),
            ..sample_submission()
        });
        let ControlMessage::Submit(sub) = ControlMessage::decode(&msg.encode()).unwrap() else {
            panic!("wrong kind");
        };
        assert_eq!(sub.rates.slot(0), TxRate::TERMINAL);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert_eq!(
            ControlMessage::decode(&[0x7f]).unwrap_err(),
            ProtoError::UnknownKind(0x7f)
        );
        // truncated mid-cookie
        let mut buf = ControlMessage::Submit(sample_submission()).encode();
        buf.truncate(12);
        assert!(matches!(
            ControlMessage::decode(&buf).unwrap_err(),
            ProtoError::Truncated { .. }
        ));
        // payload length field larger than the datagram
        let mut buf = ControlMessage::Submit(sample_submission()).encode();
        let len_at = buf.len() - 12 - 2;
        buf[len_at] = 0xff;
        buf[len_at + 1] = 0xff;
        assert!(matches!(
            ControlMessage::decode(&buf).unwrap_err(),
            ProtoError::BadPayloadLength { .. }
        ));
        // trailing garbage
        let mut buf = ControlMessage::Register.encode();
        buf.push(0);
        assert_eq!(
            ControlMessage::decode(&buf).unwrap_err(),
            ProtoError::TrailingBytes(1)
        );
    }
}
