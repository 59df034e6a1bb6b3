//! [`ActuationAuthority`] – one controller per agent.
//!
//! Before a waypoint control loop may drive the agent it must hold an
//! [`ActuationToken`] obtained from [`ActuationAuthority::acquire`].  At most
//! one token exists per authority at any instant; a second `acquire` fails
//! with [`NavError::ActuationBusy`] until the first token is dropped.
//!
//! The token doubles as an out-of-band cancellation signal:
//! [`ActuationAuthority::cancel_active`] (e.g. from a Ctrl-C handler or a
//! superseding command) marks the live token cancelled and wakes any task
//! awaiting [`ActuationToken::cancelled`], so a control loop stops without
//! waiting for its next tick.
//!
//! # Example
//!
//! ```
//! use voxnav_kernel::ActuationAuthority;
//!
//! let authority = ActuationAuthority::new();
//! let token = authority.acquire("navigate").unwrap();
//! assert!(authority.acquire("other").is_err());
//!
//! assert!(authority.cancel_active());
//! assert!(token.is_cancelled());
//!
//! drop(token);
//! assert!(authority.acquire("other").is_ok());
//! ```

use std::sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicBool, Ordering},
};

use tokio::sync::Notify;
use tracing::{debug, info};
use voxnav_types::NavError;

// ────────────────────────────────────────────────────────────────────────────
// Internal state
// ────────────────────────────────────────────────────────────────────────────

/// Shared between a lease and its token.
#[derive(Default)]
struct CancelSignal {
    flag: AtomicBool,
    notify: Notify,
}

impl CancelSignal {
    fn fire(&self) {
        self.flag.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

struct Lease {
    holder: String,
    generation: u64,
    cancelled: Arc<CancelSignal>,
}

#[derive(Default)]
struct AuthorityState {
    lease: Option<Lease>,
    next_generation: u64,
}

// ────────────────────────────────────────────────────────────────────────────
// ActuationAuthority
// ────────────────────────────────────────────────────────────────────────────

/// Mutual-exclusion gate over one agent's actuation.  Cheap to clone; all
/// clones share the same lease.
#[derive(Clone, Default)]
pub struct ActuationAuthority {
    state: Arc<Mutex<AuthorityState>>,
}

impl ActuationAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, AuthorityState> {
        // Lease bookkeeping stays consistent even if a holder panicked.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Take exclusive actuation authority on behalf of `holder`.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::ActuationBusy`] naming the current holder if a
    /// token is already live.
    pub fn acquire(&self, holder: &str) -> Result<ActuationToken, NavError> {
        let mut state = self.lock();
        if let Some(lease) = &state.lease {
            return Err(NavError::ActuationBusy {
                holder: lease.holder.clone(),
            });
        }

        let generation = state.next_generation;
        state.next_generation += 1;
        let cancelled = Arc::new(CancelSignal::default());
        state.lease = Some(Lease {
            holder: holder.to_string(),
            generation,
            cancelled: Arc::clone(&cancelled),
        });
        debug!(holder, generation, "actuation authority acquired");

        Ok(ActuationToken {
            state: Arc::clone(&self.state),
            holder: holder.to_string(),
            generation,
            cancelled,
        })
    }

    /// Mark the live token cancelled.  Returns `false` when nobody holds
    /// authority.
    pub fn cancel_active(&self) -> bool {
        let state = self.lock();
        match &state.lease {
            Some(lease) => {
                lease.cancelled.fire();
                info!(holder = %lease.holder, "actuation cancelled");
                true
            }
            None => false,
        }
    }

    /// Name of the current holder, if any.
    pub fn holder(&self) -> Option<String> {
        self.lock().lease.as_ref().map(|l| l.holder.clone())
    }

    pub fn is_held(&self) -> bool {
        self.lock().lease.is_some()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ActuationToken
// ────────────────────────────────────────────────────────────────────────────

/// Proof of exclusive actuation authority.  Releases the authority on drop.
pub struct ActuationToken {
    state: Arc<Mutex<AuthorityState>>,
    holder: String,
    generation: u64,
    cancelled: Arc<CancelSignal>,
}

impl ActuationToken {
    /// A token that is not registered with any authority.  Useful for driving
    /// a single traversal directly, e.g. in tests.
    pub fn detached(holder: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(AuthorityState::default())),
            holder: holder.to_string(),
            generation: 0,
            cancelled: Arc::new(CancelSignal::default()),
        }
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// `true` once the traversal has been cancelled out of band.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.is_set()
    }

    /// Resolves once the token is cancelled; immediately if it already is.
    pub async fn cancelled(&self) {
        loop {
            // Registered before the flag check so a concurrent cancel is not lost.
            let notified = self.cancelled.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Cancel from the holder's side.
    pub fn cancel(&self) {
        self.cancelled.fire();
    }
}

impl Drop for ActuationToken {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state
            .lease
            .as_ref()
            .is_some_and(|l| l.generation == self.generation)
        {
            state.lease = None;
            debug!(holder = %self.holder, generation = self.generation, "actuation authority released");
        }
    }
}

impl std::fmt::Debug for ActuationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActuationToken")
            .field("holder", &self.holder)
            .field("generation", &self.generation)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn second_acquire_reports_current_holder() {
        let authority = ActuationAuthority::new();
        let _token = authority.acquire("navigate 1 2 3").unwrap();
        assert_eq!(
            authority.acquire("observe").unwrap_err(),
            NavError::ActuationBusy {
                holder: "navigate 1 2 3".into()
            }
        );
        assert_eq!(authority.holder().as_deref(), Some("navigate 1 2 3"));
    }

    #[test]
    fn drop_releases_authority() {
        let authority = ActuationAuthority::new();
        {
            let _token = authority.acquire("a").unwrap();
            assert!(authority.is_held());
        }
        assert!(!authority.is_held());
        assert!(authority.acquire("b").is_ok());
    }

    #[test]
    fn cancel_without_holder_is_noop() {
        let authority = ActuationAuthority::new();
        assert!(!authority.cancel_active());
    }

    #[test]
    fn cancellation_is_per_lease() {
        let authority = ActuationAuthority::new();
        let first = authority.acquire("first").unwrap();
        authority.cancel_active();
        assert!(first.is_cancelled());
        drop(first);

        let second = authority.acquire("second").unwrap();
        assert!(!second.is_cancelled());
    }

    #[test]
    fn clones_share_the_lease_across_threads() {
        let authority = ActuationAuthority::new();
        let token = authority.acquire("worker").unwrap();
        let remote = authority.clone();
        let handle = thread::spawn(move || remote.cancel_active());
        assert!(handle.join().unwrap());
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_future_wakes_on_remote_cancel() {
        let authority = ActuationAuthority::new();
        let token = authority.acquire("navigate").unwrap();
        let remote = authority.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            remote.cancel_active();
        });

        let start = tokio::time::Instant::now();
        token.cancelled().await;
        assert_eq!(start.elapsed(), Duration::from_millis(30));
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_future_is_ready_after_cancel() {
        let token = ActuationToken::detached("test");
        token.cancel();
        token.cancelled().await;
    }

    #[test]
    fn detached_token_cancels_locally() {
        let token = ActuationToken::detached("test");
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.holder(), "test");
    }
}
