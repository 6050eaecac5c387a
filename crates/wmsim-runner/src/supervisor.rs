//! The supervisor loop: epoll over the control socket and the shared
//! delivery timer.
//!
//! One thread owns everything. The timer is a timerfd armed to
//! absolute `CLOCK_MONOTONIC` deadlines; rearming (or disarming) it
//! resets the expiration count, which also clears its epoll
//! readability, so the loop never reads the fd. Signals set a flag and
//! nothing else; the loop notices at its next iteration.

use crate::control::ControlChannel;
use crate::RunnerError;
use nix::errno::Errno;
use nix::sys::epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollFlags, EpollTimeout};
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::time::TimeSpec;
use nix::sys::timerfd::{ClockId, Expiration, TimerFd, TimerFlags, TimerSetTimeFlags};
use std::io;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use wmsim_common::MonoTime;
use wmsim_medium::{DeadlineTimer, Medium, MediumError, MediumStats};
use wmsim_model::Config;

const TOKEN_CONTROL: u64 = 0;
const TOKEN_TIMER: u64 = 1;

/// How long one epoll wait may block before the shutdown flag is
/// rechecked, in milliseconds.
const POLL_INTERVAL_MS: u16 = 500;

// ============================================================================
// Clock
// ============================================================================

/// The current instant on `CLOCK_MONOTONIC`, in microseconds.
pub fn mono_now() -> MonoTime {
    match nix::time::clock_gettime(nix::time::ClockId::CLOCK_MONOTONIC) {
        Ok(ts) => MonoTime::from_micros(
            ts.tv_sec() as u64 * 1_000_000 + ts.tv_nsec() as u64 / 1_000,
        ),
        // clock_gettime on CLOCK_MONOTONIC cannot fail on Linux
        Err(_) => MonoTime::ZERO,
    }
}

// ============================================================================
// Delivery Timer
// ============================================================================

/// The shared delivery timer, backed by a timerfd on the monotonic
/// clock. The fd is shared with the epoll registration.
pub struct MonotonicTimer {
    fd: Rc<TimerFd>,
}

impl MonotonicTimer {
    /// Create a nonblocking timerfd and the timer over it.
    pub fn new() -> io::Result<Self> {
        let fd = TimerFd::new(
            ClockId::CLOCK_MONOTONIC,
            TimerFlags::TFD_NONBLOCK | TimerFlags::TFD_CLOEXEC,
        )
        .map_err(io::Error::from)?;
        Ok(MonotonicTimer { fd: Rc::new(fd) })
    }

    /// A shared handle on the fd for epoll registration.
    pub fn fd(&self) -> Rc<TimerFd> {
        Rc::clone(&self.fd)
    }
}

impl DeadlineTimer for MonotonicTimer {
    fn arm(&mut self, deadline: MonoTime) -> io::Result<()> {
        // a zero it_value would disarm instead of firing immediately
        let us = deadline.as_micros().max(1);
        let spec = TimeSpec::new(
            (us / 1_000_000) as i64,
            ((us % 1_000_000) * 1_000) as i64,
        );
        self.fd
            .set(Expiration::OneShot(spec), TimerSetTimeFlags::TFD_TIMER_ABSTIME)
            .map_err(io::Error::from)
    }

    fn disarm(&mut self) -> io::Result<()> {
        self.fd.unset().map_err(io::Error::from)
    }
}

// ============================================================================
// Shutdown Flag
// ============================================================================

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn on_signal(_: nix::libc::c_int) {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

/// Install the shutdown handler for SIGUSR1, SIGINT and SIGTERM. The
/// handler sets a flag and nothing else.
pub fn install_signal_handlers() -> io::Result<()> {
    let action = SigAction::new(SigHandler::Handler(on_signal), SaFlags::empty(), SigSet::empty());
    for signal in [Signal::SIGUSR1, Signal::SIGINT, Signal::SIGTERM] {
        unsafe { sigaction(signal, &action) }.map_err(io::Error::from)?;
    }
    Ok(())
}

/// Whether a shutdown was requested.
pub fn shutdown_requested() -> bool {
    SHUTDOWN.load(Ordering::SeqCst)
}

/// Request a shutdown from inside the process.
pub fn request_shutdown() {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

// ============================================================================
// Supervisor
// ============================================================================

/// The event loop tying the medium to its two fds.
pub struct Supervisor {
    medium: Medium<MonotonicTimer>,
    ctrl: ControlChannel,
    epoll: Epoll,
    // keeps the timerfd registered with epoll alive
    _timer_fd: Rc<TimerFd>,
}

impl Supervisor {
    /// Build the medium from the configuration and wire up the fds.
    pub fn new(config: &Config) -> Result<Self, RunnerError> {
        let timer = MonotonicTimer::new()?;
        let timer_fd = timer.fd();
        let medium = wmsim_model::build_medium(config, timer)?;
        let ctrl = ControlChannel::bind(&config.control.listen, &config.control.driver)?;

        let epoll = Epoll::new(EpollCreateFlags::EPOLL_CLOEXEC).map_err(io::Error::from)?;
        epoll
            .add(ctrl.socket(), EpollEvent::new(EpollFlags::EPOLLIN, TOKEN_CONTROL))
            .map_err(io::Error::from)?;
        epoll
            .add(&*timer_fd, EpollEvent::new(EpollFlags::EPOLLIN, TOKEN_TIMER))
            .map_err(io::Error::from)?;

        Ok(Supervisor { medium, ctrl, epoll, _timer_fd: timer_fd })
    }

    /// Run until a shutdown is requested. Returns the run counters.
    pub fn run(&mut self) -> Result<MediumStats, RunnerError> {
        self.ctrl.register();
        log::info!("medium up with {} stations", self.medium.registry().len());

        let mut events = [EpollEvent::empty(); 8];
        while !shutdown_requested() {
            let n = match self.epoll.wait(&mut events, EpollTimeout::from(POLL_INTERVAL_MS)) {
                Ok(n) => n,
                Err(Errno::EINTR) => continue,
                Err(err) => return Err(RunnerError::Io(err.into())),
            };
            for event in &events[..n] {
                match event.data() {
                    TOKEN_CONTROL => self.drain_control()?,
                    TOKEN_TIMER => {
                        self.medium.deliver_expired(mono_now(), &mut self.ctrl)?;
                    }
                    other => log::warn!("spurious epoll token {other}"),
                }
            }
        }

        let pending = self.medium.pending_frames();
        if pending > 0 {
            log::info!("shutdown: dropping {pending} queued frames without tx-status");
        }
        Ok(self.medium.stats())
    }

    fn drain_control(&mut self) -> Result<(), RunnerError> {
        while let Some(sub) = self.ctrl.recv_submission()? {
            match self.medium.submit(sub, mono_now()) {
                Ok(()) => {}
                Err(err @ MediumError::Timer(_)) => return Err(err.into()),
                Err(err) => log::warn!("submission dropped: {err}"),
            }
        }
        Ok(())
    }
}
