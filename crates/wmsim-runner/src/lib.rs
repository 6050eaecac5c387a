//! # wmsim-runner library
//!
//! The runner binds the OS-free medium core to the operating system:
//! the control channel is a nonblocking Unix datagram socket
//! ([`control`]), the delivery timer is a timerfd armed to absolute
//! `CLOCK_MONOTONIC` deadlines, and the supervisor loop multiplexes
//! both fds with epoll ([`supervisor`]).
//!
//! The pieces are exported as a library so integration tests can drive
//! a whole simulation through real sockets and a real timer.

pub mod control;
pub mod supervisor;

pub use control::ControlChannel;
pub use supervisor::{
    install_signal_handlers, mono_now, request_shutdown, shutdown_requested, Supervisor,
};

use thiserror::Error;

/// Errors surfacing from the runner. All of them are fatal; the
/// recoverable conditions (decode failures, unknown senders) are logged
/// and swallowed before they reach this type.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Configuration loading or validation failed.
    #[error("config: {0}")]
    Model(#[from] wmsim_model::ModelError),

    /// The medium reported a fatal error.
    #[error("medium: {0}")]
    Medium(#[from] wmsim_medium::MediumError),

    /// Socket, epoll or timer setup failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Statistics serialization failed.
    #[error("stats: {0}")]
    Json(#[from] serde_json::Error),

    /// Bad command-line usage.
    #[error("{0}")]
    Usage(String),
}
