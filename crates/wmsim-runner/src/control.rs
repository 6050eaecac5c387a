//! Control-channel adapter: the Unix datagram socket facing the
//! driver.
//!
//! Inbound datagrams are Submit messages; everything the medium says
//! back (Register at startup, Deliver and TxStatus at delivery time)
//! goes to the driver's socket path. Outbound send failures are logged
//! and dropped — the contract has no asynchronous error path, the
//! driver observes its own timeouts.

use std::io;
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use wmsim_common::{MacAddr, RateSchedule, Submission};
use wmsim_medium::EventSink;
use wmsim_proto::ControlMessage;

/// Largest datagram the codec can produce (u16 payload length).
const RECV_BUF_LEN: usize = 1 + 6 + 4 + 8 + 8 + 2 + u16::MAX as usize;

/// The medium's end of the control channel.
pub struct ControlChannel {
    sock: UnixDatagram,
    driver: PathBuf,
    buf: Vec<u8>,
}

impl ControlChannel {
    /// Bind the listen path (replacing a stale socket file from a
    /// previous run) and remember where the driver listens.
    pub fn bind(listen: &Path, driver: &Path) -> io::Result<Self> {
        match std::fs::remove_file(listen) {
            Ok(()) => log::debug!("removed stale control socket {}", listen.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
        let sock = UnixDatagram::bind(listen)?;
        sock.set_nonblocking(true)?;
        log::info!(
            "control channel on {} -> driver {}",
            listen.display(),
            driver.display(),
        );
        Ok(ControlChannel {
            sock,
            driver: driver.to_path_buf(),
            buf: vec![0u8; RECV_BUF_LEN],
        })
    }

    /// The underlying socket, for epoll registration.
    pub fn socket(&self) -> &UnixDatagram {
        &self.sock
    }

    /// Announce the medium to the driver. Best effort: the driver may
    /// not be up yet.
    pub fn register(&self) {
        self.send(&ControlMessage::Register);
    }

    /// Pull the next decodable submission off the socket. Returns
    /// `None` once the socket would block. Undecodable datagrams and
    /// unexpected message kinds are dropped and logged.
    pub fn recv_submission(&mut self) -> io::Result<Option<Submission>> {
        loop {
            let n = match self.sock.recv(&mut self.buf) {
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };
            match ControlMessage::decode(&self.buf[..n]) {
                Ok(ControlMessage::Submit(sub)) => {
                    log::trace!(
                        "submit from {} cookie {:#x} payload {}",
                        sub.sender,
                        sub.cookie,
                        hex::encode(&sub.payload),
                    );
                    return Ok(Some(sub));
                }
                Ok(msg) => log::warn!("dropping unexpected inbound control message {msg:?}"),
                Err(err) => log::warn!("dropping undecodable control datagram ({n} bytes): {err}"),
            }
        }
    }

    fn send(&self, msg: &ControlMessage) {
        if let Err(err) = self.sock.send_to(&msg.encode(), &self.driver) {
            log::warn!("control send to {} failed: {err}", self.driver.display());
        }
    }
}

impl EventSink for ControlChannel {
    fn deliver(&mut self, receiver: MacAddr, payload: &[u8], rate_idx: u32, signal_dbm: i32) {
        self.send(&ControlMessage::Deliver {
            receiver,
            rate_idx,
            signal: signal_dbm,
            payload: payload.to_vec(),
        });
    }

    fn tx_status(
        &mut self,
        sender: MacAddr,
        flags: u32,
        signal_dbm: i32,
        rates: &RateSchedule,
        cookie: u64,
    ) {
        self.send(&ControlMessage::TxStatus {
            sender,
            flags,
            signal: signal_dbm,
            rates: *rates,
            cookie,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wmsim_common::{RateSchedule, TxRate};

    fn channel_pair(dir: &Path) -> (ControlChannel, UnixDatagram) {
        let listen = dir.join("medium.sock");
        let driver_path = dir.join("driver.sock");
        let driver = UnixDatagram::bind(&driver_path).unwrap();
        let channel = ControlChannel::bind(&listen, &driver_path).unwrap();
        (channel, driver)
    }

    #[test]
    fn test_recv_skips_garbage_and_returns_submission() {
        let dir = tempfile::tempdir().unwrap();
        let (mut channel, driver) = channel_pair(dir.path());
        let listen = dir.path().join("medium.sock");

        driver.send_to(&[0xff, 0xee], &listen).unwrap();
        let sub = Submission {
            sender: "02:00:00:00:00:00".parse().unwrap(),
            flags: 0,
            cookie: 3,
            rates: RateSchedule::from_slots(&[TxRate { idx: 0, count: 1 }]),
            payload: vec![0x08, 0, 0, 0, 2, 0, 0, 0, 1, 0],
        };
        driver
            .send_to(&ControlMessage::Submit(sub.clone()).encode(), &listen)
            .unwrap();

        assert_eq!(channel.recv_submission().unwrap(), Some(sub));
        assert_eq!(channel.recv_submission().unwrap(), None);
    }

    #[test]
    fn test_sink_events_reach_the_driver() {
        let dir = tempfile::tempdir().unwrap();
        let (mut channel, driver) = channel_pair(dir.path());

        channel.register();
        channel.deliver("02:00:00:00:01:00".parse().unwrap(), &[1, 2, 3], 0, -50);

        let mut buf = [0u8; 4096];
        let n = driver.recv(&mut buf).unwrap();
        assert_eq!(ControlMessage::decode(&buf[..n]).unwrap(), ControlMessage::Register);
        let n = driver.recv(&mut buf).unwrap();
        assert!(matches!(
            ControlMessage::decode(&buf[..n]).unwrap(),
            ControlMessage::Deliver { signal: -50, .. }
        ));
    }

    #[test]
    fn test_bind_replaces_stale_socket() {
        let dir = tempfile::tempdir().unwrap();
        let listen = dir.path().join("medium.sock");
        let driver_path = dir.path().join("driver.sock");
        drop(ControlChannel::bind(&listen, &driver_path).unwrap());
        // the socket file is left behind; a second bind must succeed
        assert!(ControlChannel::bind(&listen, &driver_path).is_ok());
    }
}
