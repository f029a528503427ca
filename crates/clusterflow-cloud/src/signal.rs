//! Interrupt signal monitor
//!
//! Reconcilers poll the monitor between resources instead of being
//! interrupted asynchronously, so no cloud call is ever torn down halfway.
//!
//! ```text
//!            interrupt              interrupt
//!   Idle ─────────────▶ AbortRequested ─────────▶ exit(1)
//!     │
//!     │ terminate
//!     ▼
//!   TerminateRequested ──▶ exit(1)
//! ```
//!
//! Process exits only happen inside the OS listener and only when the
//! [`SignalPolicy`] asks for them; the reconcilers themselves return an
//! error when they observe a request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::watch;

/// Exit status used when a signal forces the process down
pub const FORCED_EXIT_CODE: i32 = 1;

/// Interrupt state observed by the reconcilers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignalState {
    #[default]
    Idle,
    AbortRequested,
    TerminateRequested,
}

impl SignalState {
    pub fn is_requested(self) -> bool {
        self != SignalState::Idle
    }
}

impl std::fmt::Display for SignalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalState::Idle => write!(f, "idle"),
            SignalState::AbortRequested => write!(f, "abort requested"),
            SignalState::TerminateRequested => write!(f, "terminate requested"),
        }
    }
}

/// Outcome of delivering a request to the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// The new state was recorded and will be seen at the next poll
    Recorded(SignalState),
    /// The user insists: stop without cleanup
    ForceExit,
}

/// What the OS listener does on escalation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalPolicy {
    pub exit_on_second_interrupt: bool,
    pub exit_on_terminate: bool,
}

impl Default for SignalPolicy {
    fn default() -> Self {
        Self {
            exit_on_second_interrupt: true,
            exit_on_terminate: true,
        }
    }
}

struct Inner {
    state: watch::Sender<SignalState>,
    listen: Option<SignalPolicy>,
    installed: AtomicBool,
}

/// Handle to an interrupt state machine
///
/// Clones share the same state. [`InterruptMonitor::process`] is the
/// process-wide instance wired to SIGINT/SIGTERM; [`InterruptMonitor::detached`]
/// only changes state when asked programmatically.
#[derive(Clone)]
pub struct InterruptMonitor {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for InterruptMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterruptMonitor")
            .field("state", &self.state())
            .field("listen", &self.inner.listen)
            .finish()
    }
}

impl InterruptMonitor {
    fn build(listen: Option<SignalPolicy>) -> Self {
        let (state, _) = watch::channel(SignalState::Idle);
        Self {
            inner: Arc::new(Inner {
                state,
                listen,
                installed: AtomicBool::new(false),
            }),
        }
    }

    /// Monitor that never listens to OS signals
    pub fn detached() -> Self {
        Self::build(None)
    }

    /// Monitor that installs SIGINT/SIGTERM listeners on first use
    pub fn with_os_signals(policy: SignalPolicy) -> Self {
        Self::build(Some(policy))
    }

    /// Process-wide monitor shared by every reconciler that does not get one
    pub fn process() -> Self {
        static PROCESS: OnceLock<InterruptMonitor> = OnceLock::new();
        PROCESS
            .get_or_init(|| InterruptMonitor::with_os_signals(SignalPolicy::default()))
            .clone()
    }

    /// Current state, without blocking
    pub fn state(&self) -> SignalState {
        *self.inner.state.borrow()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<SignalState> {
        self.inner.state.subscribe()
    }

    /// Deliver an interrupt (Ctrl+C)
    pub fn request_abort(&self) -> Escalation {
        let mut escalation = Escalation::ForceExit;
        self.inner.state.send_if_modified(|state| {
            if *state == SignalState::Idle {
                *state = SignalState::AbortRequested;
                escalation = Escalation::Recorded(SignalState::AbortRequested);
                true
            } else {
                false
            }
        });
        escalation
    }

    /// Deliver a termination request
    pub fn request_terminate(&self) -> Escalation {
        self.inner.state.send_replace(SignalState::TerminateRequested);
        Escalation::ForceExit
    }

    /// Back to idle
    pub fn reset(&self) {
        self.inner.state.send_replace(SignalState::Idle);
    }

    /// Enter a monitored phase
    ///
    /// Installs the OS listener the first time and returns a guard that
    /// resets the state to idle when the phase ends, on every return path.
    pub fn begin_phase(&self) -> PhaseGuard {
        self.install();
        PhaseGuard {
            monitor: self.clone(),
        }
    }

    fn install(&self) {
        let Some(policy) = self.inner.listen else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No tokio runtime, interrupt listener not installed");
            return;
        };
        if self.inner.installed.swap(true, Ordering::SeqCst) {
            return;
        }

        let monitor = self.clone();
        handle.spawn(async move { listen(monitor, policy).await });
        tracing::debug!("Installed interrupt listener");
    }
}

/// Resets the monitor when a reconciliation phase ends
#[must_use = "the phase ends when the guard is dropped"]
pub struct PhaseGuard {
    monitor: InterruptMonitor,
}

impl Drop for PhaseGuard {
    fn drop(&mut self) {
        self.monitor.reset();
    }
}

async fn listen(monitor: InterruptMonitor, policy: SignalPolicy) {
    let mut terminate = Terminate::new();
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::warn!("Interrupt listener stopped: {}", e);
                    return;
                }
                match monitor.request_abort() {
                    Escalation::Recorded(_) => {
                        tracing::warn!(
                            "Interrupt received, stopping after the current resource (press Ctrl+C again to exit immediately)"
                        );
                    }
                    Escalation::ForceExit if policy.exit_on_second_interrupt => {
                        tracing::error!("Second interrupt received, exiting without cleanup");
                        std::process::exit(FORCED_EXIT_CODE);
                    }
                    Escalation::ForceExit => {}
                }
            }
            _ = terminate.recv() => {
                monitor.request_terminate();
                if policy.exit_on_terminate {
                    tracing::error!("Termination requested, exiting");
                    std::process::exit(FORCED_EXIT_CODE);
                }
                tracing::warn!("Termination requested, stopping after the current resource");
            }
        }
    }
}

#[cfg(unix)]
struct Terminate(Option<tokio::signal::unix::Signal>);

#[cfg(unix)]
impl Terminate {
    fn new() -> Self {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(sig) => Self(Some(sig)),
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                Self(None)
            }
        }
    }

    async fn recv(&mut self) {
        match self.0.as_mut() {
            Some(sig) => {
                if sig.recv().await.is_none() {
                    std::future::pending::<()>().await;
                }
            }
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(not(unix))]
struct Terminate;

#[cfg(not(unix))]
impl Terminate {
    fn new() -> Self {
        Self
    }

    async fn recv(&mut self) {
        std::future::pending::<()>().await
    }
}
