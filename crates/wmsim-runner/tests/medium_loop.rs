//! End-to-end test of the supervisor loop over real sockets and a real
//! timer: a driver-side socket submits a frame and expects the receive
//! copy and the tx-status back.

use std::os::unix::net::UnixDatagram;
use std::time::Duration;

use wmsim_common::{MacAddr, RateSchedule, Submission, TxRate, MAX_TX_RATES, TX_STAT_ACK};
use wmsim_proto::ControlMessage;
use wmsim_runner::{request_shutdown, Supervisor};

/// A 24-byte management frame (beacon-shaped) to the broadcast
/// address: the noack path, deterministic for any channel state.
fn broadcast_mgmt_frame() -> Vec<u8> {
    let mut bytes = vec![0x80, 0x00, 0x00, 0x00];
    bytes.extend_from_slice(&MacAddr::BROADCAST.octets());
    bytes.extend_from_slice(&[0u8; 14]);
    bytes
}

fn recv_message(sock: &UnixDatagram) -> ControlMessage {
    let mut buf = [0u8; 4096];
    let n = sock.recv(&mut buf).expect("driver socket timed out");
    ControlMessage::decode(&buf[..n]).expect("undecodable message from medium")
}

#[test]
fn test_submission_round_trips_through_the_loop() {
    let dir = tempfile::tempdir().unwrap();
    let listen = dir.path().join("medium.sock");
    let driver_path = dir.path().join("driver.sock");

    let driver = UnixDatagram::bind(&driver_path).unwrap();
    driver
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();

    let yaml = format!(
        r#"
stations:
  - addr: "02:00:00:00:00:00"
  - addr: "02:00:00:00:01:00"
medium:
  seed: 7
control:
  listen: {}
  driver: {}
"#,
        listen.display(),
        driver_path.display(),
    );
    let config = wmsim_model::load_config_from_str(&yaml).unwrap();

    let worker = std::thread::spawn(move || {
        let mut supervisor = Supervisor::new(&config).expect("supervisor setup");
        supervisor.run().expect("supervisor run")
    });

    // the medium announces itself once its socket is up
    assert_eq!(recv_message(&driver), ControlMessage::Register);

    let sender: MacAddr = "02:00:00:00:00:00".parse().unwrap();
    let submission = Submission {
        sender,
        flags: 0,
        cookie: 0xc0ffee,
        rates: RateSchedule::from_slots(&[TxRate { idx: 0, count: 1 }]),
        payload: broadcast_mgmt_frame(),
    };
    driver
        .send_to(&ControlMessage::Submit(submission).encode(), &listen)
        .unwrap();

    // broadcast: one receive copy for the other station, then the status
    match recv_message(&driver) {
        ControlMessage::Deliver { receiver, payload, rate_idx, .. } => {
            assert_eq!(receiver, "02:00:00:00:01:00".parse::<MacAddr>().unwrap());
            assert_eq!(payload, broadcast_mgmt_frame());
            assert_eq!(rate_idx, 0);
        }
        other => panic!("expected Deliver, got {other:?}"),
    }
    match recv_message(&driver) {
        ControlMessage::TxStatus { sender: s, flags, rates, cookie, .. } => {
            assert_eq!(s, sender);
            assert_ne!(flags & TX_STAT_ACK, 0);
            assert_eq!(cookie, 0xc0ffee);
            assert_eq!(rates.slot(0), TxRate { idx: 0, count: 1 });
            for i in 1..MAX_TX_RATES {
                assert_eq!(rates.slot(i), TxRate::TERMINAL);
            }
        }
        other => panic!("expected TxStatus, got {other:?}"),
    }

    request_shutdown();
    let stats = worker.join().expect("supervisor thread panicked");
    assert_eq!(stats.received, 1);
    assert_eq!(stats.acked, 1);
    assert_eq!(stats.delivered, 1);
    assert_eq!(stats.dropped, 0);
}
