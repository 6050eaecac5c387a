//! The transmit simulator and delivery engine.
//!
//! `Medium` owns everything the simulation needs: the station registry,
//! the seeded PRNG, the channel model and the delivery timer handle.
//! A submission is resolved at submission time — the whole retry walk
//! happens up front and produces one absolute expiry — so delivery is
//! nothing more than draining expired queue heads when the shared timer
//! fires.

use crate::channel::ErrorModel;
use crate::phy::{frame_duration_us, rate_for, PhyParams};
use crate::queue::{AccessCategory, Frame, QueueParams};
use crate::station::StationRegistry;
use crate::MediumError;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use wmsim_common::{MacAddr, MonoTime, RateSchedule, Submission, MAX_TX_RATES, TX_STAT_ACK};

/// Receive rate index reported in every Deliver event.
pub const RX_RATE_IDX: u32 = 0;

/// Receive signal reported in every Deliver event.
pub const RX_SIGNAL_DBM: i32 = -50;

/// Transmit signal reported in every TxStatus event.
pub const TX_SIGNAL_DBM: i32 = 35;

/// PRNG seed used when the configuration does not name one.
pub const DEFAULT_SEED: u64 = 0x776d;

// ============================================================================
// Collaborator Contracts
// ============================================================================

/// The single shared delivery timer.
///
/// The medium arms it to the earliest head-of-queue expiry after every
/// enqueue and every drain, and disarms it when all queues are empty.
/// Arm failures are fatal to the simulation.
pub trait DeadlineTimer {
    /// Arm to fire at an absolute monotonic instant.
    fn arm(&mut self, deadline: MonoTime) -> std::io::Result<()>;
    /// Stop the timer.
    fn disarm(&mut self) -> std::io::Result<()>;
}

/// Where delivery-time events go.
pub trait EventSink {
    /// A receive-side copy of a delivered frame.
    fn deliver(&mut self, receiver: MacAddr, payload: &[u8], rate_idx: u32, signal_dbm: i32);

    /// The final status of a submission, back to its sender.
    fn tx_status(
        &mut self,
        sender: MacAddr,
        flags: u32,
        signal_dbm: i32,
        rates: &RateSchedule,
        cookie: u64,
    );
}

// ============================================================================
// Parameters and Statistics
// ============================================================================

/// Per-run medium parameters.
#[derive(Debug, Clone, Copy)]
pub struct MediumParams {
    /// PHY timing constants.
    pub phy: PhyParams,
    /// Link SNR in dB, shared by every station pair this version.
    pub snr_db: f64,
    /// PRNG seed.
    pub seed: u64,
}

impl Default for MediumParams {
    fn default() -> Self {
        MediumParams {
            phy: PhyParams::default(),
            snr_db: 15.0,
            seed: DEFAULT_SEED,
        }
    }
}

/// Counters kept across the run and reported at shutdown.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MediumStats {
    /// Submissions received from the driver.
    pub received: u64,
    /// Submissions whose simulated walk ended in an ack.
    pub acked: u64,
    /// Receive-side copies emitted.
    pub delivered: u64,
    /// Submissions dropped before queueing.
    pub dropped: u64,
}

// ============================================================================
// The Medium
// ============================================================================

/// Outcome of one retry walk.
struct WalkOutcome {
    /// Total simulated air time in microseconds.
    send_time_us: u64,
    /// `(slot, attempts_used)` when an attempt was acked.
    success: Option<(usize, i8)>,
}

/// The shared wireless medium.
pub struct Medium<T: DeadlineTimer> {
    registry: StationRegistry,
    phy: PhyParams,
    snr_db: f64,
    error_model: Box<dyn ErrorModel>,
    rng: ChaCha8Rng,
    timer: T,
    stats: MediumStats,
}

impl<T: DeadlineTimer> Medium<T> {
    /// Create a medium over a populated registry.
    pub fn new(
        params: MediumParams,
        registry: StationRegistry,
        error_model: Box<dyn ErrorModel>,
        timer: T,
    ) -> Self {
        Medium {
            registry,
            phy: params.phy,
            snr_db: params.snr_db,
            error_model,
            rng: ChaCha8Rng::seed_from_u64(params.seed),
            timer,
            stats: MediumStats::default(),
        }
    }

    /// The station registry.
    pub fn registry(&self) -> &StationRegistry {
        &self.registry
    }

    /// Run counters so far.
    pub fn stats(&self) -> MediumStats {
        self.stats
    }

    /// The delivery timer handle.
    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Frames currently queued across all stations.
    pub fn pending_frames(&self) -> usize {
        self.registry
            .iter()
            .map(|s| {
                s.queue(AccessCategory::Mgmt).len() + s.queue(AccessCategory::Data).len()
            })
            .sum()
    }

    /// Accept one submission: classify it, walk its retry schedule,
    /// append it to the sender's queue with an absolute expiry, and
    /// rearm the shared timer.
    ///
    /// Unknown senders and unreadable frames are dropped; the timer
    /// error is the only fatal outcome.
    pub fn submit(&mut self, sub: Submission, now: MonoTime) -> Result<(), MediumError> {
        self.stats.received += 1;
        match self.queue_submission(sub, now) {
            Ok(()) => Ok(()),
            Err(err) => {
                if !matches!(err, MediumError::Timer(_)) {
                    self.stats.dropped += 1;
                }
                Err(err)
            }
        }
    }

    fn queue_submission(&mut self, sub: Submission, now: MonoTime) -> Result<(), MediumError> {
        let view = wmsim_proto::FrameView::parse(&sub.payload)?;
        let ac = if view.is_mgmt() { AccessCategory::Mgmt } else { AccessCategory::Data };
        let noack = view.is_noack();
        let dest = view.dest();
        let len = sub.payload.len();

        let params = self
            .registry
            .get(sub.sender)
            .ok_or(MediumError::UnknownSender(sub.sender))?
            .queue(ac)
            .params();

        let outcome = self.walk_schedule(&sub.rates, len, noack, params);

        let mut flags = sub.flags;
        let mut rates = sub.rates;
        if let Some((slot, attempts)) = outcome.success {
            rates.commit_success(slot, attempts);
            flags |= TX_STAT_ACK;
            self.stats.acked += 1;
        }

        let expires = now.add_micros(outcome.send_time_us);
        log::debug!(
            "[{now}] {} queued for {expires}: len {len} {ac:?} ack {} air {} us rates {rates}",
            sub.sender,
            outcome.success.is_some(),
            outcome.send_time_us,
        );

        let frame = Frame {
            payload: sub.payload,
            sender: sub.sender,
            dest,
            cookie: sub.cookie,
            flags,
            acked: outcome.success.is_some(),
            rates,
            expires,
        };
        // existence was checked above; re-borrow mutably to enqueue
        let station = self
            .registry
            .get_mut(sub.sender)
            .ok_or(MediumError::UnknownSender(sub.sender))?;
        station.queue_mut(ac).push_back(frame);

        self.rearm()
    }

    /// Walk the retry schedule, accumulating simulated air time.
    ///
    /// PRNG draws happen only for attempts that are not noack
    /// short-circuited, and only after the attempt's air time and
    /// backoff were added — seeded runs reproduce exactly.
    fn walk_schedule(
        &mut self,
        rates: &RateSchedule,
        len: usize,
        noack: bool,
        params: QueueParams,
    ) -> WalkOutcome {
        let difs = self.phy.difs_us();
        let ack_time = self.phy.ack_duration_us();
        let slot_time = self.phy.slot_time_us;

        let mut send_time = 0u64;
        let mut cw = params.cw_min;
        let mut success = None;

        'walk: for i in 0..MAX_TX_RATES {
            let slot = rates.slot(i);
            // negative and out-of-range indices both end the schedule
            let Some(rate) = rate_for(slot.idx) else { break };
            let p_err = self.error_model.error_prob(self.snr_db, slot.idx as usize, len);

            for j in 0..slot.count.max(0) {
                send_time += difs + frame_duration_us(len, rate);

                // noack frames succeed on the first attempt and skip
                // backoff, ack time and the channel draw entirely
                if noack {
                    success = Some((i, j + 1));
                    break 'walk;
                }

                if j > 0 {
                    send_time += (u64::from(cw) * slot_time) / 2;
                    cw = params.cw_max.min((cw << 1) + 1);
                }

                let draw: f64 = self.rng.gen();
                if draw > p_err {
                    success = Some((i, j + 1));
                    break 'walk;
                }
                send_time += ack_time;
            }
        }

        WalkOutcome { send_time_us: send_time, success }
    }

    /// Drain every expired frame, earliest expiry first, and rearm.
    ///
    /// Ties go to the queue scanned first: management before data
    /// within a station, stations in registry order. A non-expired
    /// head shields everything behind it.
    pub fn deliver_expired(
        &mut self,
        now: MonoTime,
        sink: &mut dyn EventSink,
    ) -> Result<(), MediumError> {
        if log::log_enabled!(log::Level::Debug) {
            for station in self.registry.iter() {
                log::debug!(
                    "[{now}] station {} mgmt {} data {}",
                    station.addr(),
                    station.queue(AccessCategory::Mgmt).len(),
                    station.queue(AccessCategory::Data).len(),
                );
            }
        }

        while let Some((addr, ac)) = self.earliest_expired_head(now) {
            let frame = self
                .registry
                .get_mut(addr)
                .and_then(|station| station.queue_mut(ac).pop_front());
            match frame {
                Some(frame) => self.deliver_frame(frame, sink),
                None => break,
            }
        }

        self.rearm()
    }

    /// The earliest head-of-queue expiry across all queues, if any.
    pub fn next_deadline(&self) -> Option<MonoTime> {
        let mut min: Option<MonoTime> = None;
        for station in self.registry.iter() {
            for ac in [AccessCategory::Mgmt, AccessCategory::Data] {
                if let Some(head) = station.queue(ac).front() {
                    if min.map_or(true, |t| head.expires < t) {
                        min = Some(head.expires);
                    }
                }
            }
        }
        min
    }

    fn earliest_expired_head(&self, now: MonoTime) -> Option<(MacAddr, AccessCategory)> {
        let mut best: Option<(MonoTime, MacAddr, AccessCategory)> = None;
        for station in self.registry.iter() {
            for ac in [AccessCategory::Mgmt, AccessCategory::Data] {
                if let Some(head) = station.queue(ac).front() {
                    if head.expires <= now
                        && best.map_or(true, |(t, _, _)| head.expires < t)
                    {
                        best = Some((head.expires, station.addr(), ac));
                    }
                }
            }
        }
        best.map(|(_, addr, ac)| (addr, ac))
    }

    fn deliver_frame(&mut self, frame: Frame, sink: &mut dyn EventSink) {
        if frame.flags & TX_STAT_ACK != 0 {
            for station in self.registry.iter() {
                if station.addr() == frame.sender {
                    continue;
                }
                if frame.dest.is_multicast() || station.addr() == frame.dest {
                    log::trace!(
                        "deliver {} -> {} len {}",
                        frame.sender,
                        station.addr(),
                        frame.payload.len(),
                    );
                    sink.deliver(station.addr(), &frame.payload, RX_RATE_IDX, RX_SIGNAL_DBM);
                    self.stats.delivered += 1;
                }
            }
        }
        sink.tx_status(frame.sender, frame.flags, TX_SIGNAL_DBM, &frame.rates, frame.cookie);
    }

    fn rearm(&mut self) -> Result<(), MediumError> {
        match self.next_deadline() {
            Some(deadline) => self.timer.arm(deadline).map_err(MediumError::Timer),
            None => self.timer.disarm().map_err(MediumError::Timer),
        }
    }
}
