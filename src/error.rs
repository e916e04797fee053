//! Error taxonomy for the window manager
//!
//! Every fault the engine can observe is a `WmError`. The event loop decides
//! what to do with one by asking which class it falls into: setup faults end
//! the process before the loop starts, access conflicts are absorbed by the
//! screen that raised them, transient faults are counted against the error
//! budget, and connection loss ends the loop at once.

use thiserror::Error;
use x11rb::errors::{ConnectError, ConnectionError, ReplyError, ReplyOrIdError};
use x11rb::protocol::ErrorKind;
use x11rb::x11_utils::X11Error;

/// Number of transient faults the loop survives before giving up.
pub const MAX_FAULTS: u32 = 25;

/// Process exit codes.
pub mod exit_code {
    pub const CLEAN: u8 = 0;
    pub const FATAL: u8 = 1;
    pub const SETUP: u8 = 2;
    pub const CONNECTION_CLOSED: u8 = 3;
}

#[derive(Debug, Error)]
pub enum WmError {
    #[error("can't connect to display: {0}")]
    Connect(#[from] ConnectError),

    #[error("X protocol {found}.x is not supported, {required}.x is required")]
    UnsupportedProtocol { found: u16, required: u16 },

    #[error("no unmanaged screens found")]
    NoUnmanagedScreens,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("display connection closed by server")]
    ConnectionClosed,

    #[error("connection error: {0}")]
    Connection(ConnectionError),

    /// Another client already holds the resource (e.g. substructure redirect).
    #[error("access denied by server: {0}")]
    AccessDenied(String),

    #[error("X protocol error: {0}")]
    Protocol(String),

    #[error("window {0:#x} is not a managed frame")]
    UnknownFrame(u32),

    #[error("failed to launch {command}: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("error budget exhausted after {0} faults")]
    ErrorBudgetExhausted(u32),
}

impl WmError {
    /// Faults that may only appear before the event loop runs.
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            Self::Connect(_) | Self::UnsupportedProtocol { .. } | Self::NoUnmanagedScreens | Self::Config(_)
        )
    }

    /// Faults the loop cannot survive regardless of the error budget.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConnectionClosed | Self::ErrorBudgetExhausted(_)) || self.is_setup()
    }

    pub fn exit_code(&self) -> u8 {
        if self.is_setup() {
            exit_code::SETUP
        } else if matches!(self, Self::ConnectionClosed) {
            exit_code::CONNECTION_CLOSED
        } else {
            exit_code::FATAL
        }
    }
}

impl From<X11Error> for WmError {
    fn from(err: X11Error) -> Self {
        let detail = format!(
            "{:?} in request {} (bad value {:#x})",
            err.error_kind,
            err.request_name.unwrap_or("unknown"),
            err.bad_value
        );
        if err.error_kind == ErrorKind::Access {
            Self::AccessDenied(detail)
        } else {
            Self::Protocol(detail)
        }
    }
}

impl From<ConnectionError> for WmError {
    fn from(err: ConnectionError) -> Self {
        match err {
            ConnectionError::IoError(_) => Self::ConnectionClosed,
            other => Self::Connection(other),
        }
    }
}

impl From<ReplyError> for WmError {
    fn from(err: ReplyError) -> Self {
        match err {
            ReplyError::ConnectionError(e) => e.into(),
            ReplyError::X11Error(e) => e.into(),
        }
    }
}

impl From<ReplyOrIdError> for WmError {
    fn from(err: ReplyOrIdError) -> Self {
        match err {
            ReplyOrIdError::ConnectionError(e) => e.into(),
            ReplyOrIdError::X11Error(e) => e.into(),
            ReplyOrIdError::IdsExhausted => Self::Protocol("X11 resource ids exhausted".into()),
        }
    }
}

/// Counts transient faults against a fixed threshold.
///
/// The count only ever grows; it is reset by restarting the process.
#[derive(Debug)]
pub struct ErrorBudget {
    count: u32,
    threshold: u32,
}

impl ErrorBudget {
    pub fn new(threshold: u32) -> Self {
        Self { count: 0, threshold }
    }

    /// Record one fault. Returns `true` while the budget still holds.
    pub fn record(&mut self) -> bool {
        self.count += 1;
        self.count <= self.threshold
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

impl Default for ErrorBudget {
    fn default() -> Self {
        Self::new(MAX_FAULTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_holds_through_threshold() {
        let mut budget = ErrorBudget::default();
        for _ in 0..MAX_FAULTS {
            assert!(budget.record());
        }
        assert!(!budget.record());
        assert_eq!(budget.count(), MAX_FAULTS + 1);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(WmError::NoUnmanagedScreens.exit_code(), exit_code::SETUP);
        assert_eq!(WmError::Config("bad".into()).exit_code(), exit_code::SETUP);
        assert_eq!(WmError::ConnectionClosed.exit_code(), exit_code::CONNECTION_CLOSED);
        assert_eq!(WmError::ErrorBudgetExhausted(26).exit_code(), exit_code::FATAL);
        assert_eq!(WmError::Protocol("x".into()).exit_code(), exit_code::FATAL);
    }

    #[test]
    fn test_transient_faults_are_not_fatal() {
        assert!(!WmError::Protocol("BadWindow".into()).is_fatal());
        assert!(!WmError::UnknownFrame(7).is_fatal());
        assert!(WmError::ConnectionClosed.is_fatal());
        assert!(WmError::ErrorBudgetExhausted(26).is_fatal());
    }
}
