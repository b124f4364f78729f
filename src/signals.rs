//! Signal handling for graceful shutdown.
//!
//! SIGINT (Ctrl-C) and SIGTERM both request shutdown. The listener only logs
//! the signal and raises the shared [`Shutdown`] flag; the run loop does the rest.

use nix::sys::signal::Signal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Shutdown request shared between the signal listener and the run loop.
///
/// Carries no payload. Once raised it stays raised; raising it again is a no-op.
#[derive(Debug, Default)]
pub struct Shutdown {
    requested: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the shutdown request and wake any waiter.
    pub fn trigger(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolve once shutdown has been requested.
    pub async fn wait(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent trigger is not missed.
        notified.as_mut().enable();
        if self.is_requested() {
            return;
        }
        notified.await;
    }
}

/// Symbolic name for a signal number, e.g. `SIGTERM`. Unknown numbers are
/// rendered as digits.
pub fn signal_name(signum: i32) -> String {
    match Signal::try_from(signum) {
        Ok(sig) => sig.as_str().to_string(),
        Err(_) => signum.to_string(),
    }
}

/// React to a delivered signal: log its name and request shutdown.
#[tracing::instrument(skip_all)]
pub fn handle_signal(shutdown: &Shutdown, signum: i32) {
    tracing::info!("Caught signal {}", signal_name(signum));
    shutdown.trigger();
}

/// Registered SIGINT/SIGTERM listener. Dropping it stops listening.
pub struct SignalHandler {
    task: JoinHandle<()>,
}

impl SignalHandler {
    /// Register for SIGINT and SIGTERM and forward each delivery to
    /// [`handle_signal`]. Must be called from within a Tokio runtime.
    pub fn install(shutdown: Arc<Shutdown>) -> std::io::Result<SignalHandler> {
        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;

        let task = tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    r = interrupt.recv() => r.map(|()| Signal::SIGINT),
                    r = terminate.recv() => r.map(|()| Signal::SIGTERM),
                };
                match received {
                    Some(sig) => handle_signal(&shutdown, sig as i32),
                    None => break,
                }
            }
        });
        tracing::debug!("registered handlers for SIGINT and SIGTERM");

        Ok(SignalHandler { task })
    }
}

impl Drop for SignalHandler {
    fn drop(&mut self) {
        self.task.abort();
    }
}
