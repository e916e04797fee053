//! Operator shutdown requests
//!
//! SIGINT and SIGTERM are received on a tokio task and parked in a
//! `ShutdownSignal` that the event loop checks between events.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownRequest {
    /// SIGINT: drain and stop like a quit key
    Interrupt,
    /// SIGTERM: release every window and terminate
    Terminate,
}

const NONE: u8 = 0;
const INTERRUPT: u8 = 1;
const TERMINATE: u8 = 2;

/// Shared slot for the most severe pending shutdown request
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    pending: Arc<AtomicU8>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request. A pending terminate is never downgraded.
    pub fn request(&self, request: ShutdownRequest) {
        let value = match request {
            ShutdownRequest::Interrupt => INTERRUPT,
            ShutdownRequest::Terminate => TERMINATE,
        };
        self.pending.fetch_max(value, Ordering::SeqCst);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst) != NONE
    }

    /// Consume the pending request, if any.
    pub fn take(&self) -> Option<ShutdownRequest> {
        match self.pending.swap(NONE, Ordering::SeqCst) {
            INTERRUPT => Some(ShutdownRequest::Interrupt),
            TERMINATE => Some(ShutdownRequest::Terminate),
            _ => None,
        }
    }
}

/// Forward SIGINT and SIGTERM into `signal` for the life of the runtime.
pub fn watch(signal: ShutdownSignal) -> std::io::Result<()> {
    use tokio::signal::unix::{signal as unix_signal, SignalKind};

    let mut sigterm = unix_signal(SignalKind::terminate())?;
    let mut sigint = unix_signal(SignalKind::interrupt())?;
    tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(()) = sigterm.recv() => {
                    info!("Received SIGTERM, releasing windows before exit");
                    signal.request(ShutdownRequest::Terminate);
                }
                Some(()) = sigint.recv() => {
                    info!("Received SIGINT, draining");
                    signal.request(ShutdownRequest::Interrupt);
                }
                else => break,
            }
        }
    });
    Ok(())
}
