//! Single-flight session renewal.
//!
//! # Design
//! The coordinator is a two-state machine: Idle (`in_flight == false`) and
//! Refreshing. The first caller that reports an authorization failure while
//! Idle becomes the leader: it flips the flag and runs the refresh call.
//! Every caller that arrives while Refreshing is parked in the waiter queue
//! instead of issuing its own refresh.
//!
//! The flag check-and-set and the drain on completion each happen inside one
//! short `parking_lot::Mutex` critical section that never spans an await, so
//! no caller can observe Refreshing after the queue was drained or slip a
//! second leader in between the check and the set.
//!
//! Settling a cycle resets the flag and detaches the queue under the lock,
//! then completes waiters front to back outside it. A failed cycle hands the
//! same `RefreshFailed` value to every affected caller and fires the
//! navigation side effect once, from the leader.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::navigation::Navigator;
use crate::waiters::{RenewalOutcome, Waiter, WaiterQueue};

/// Mutable renewal state. `queue` is non-empty only while `in_flight`.
#[derive(Debug, Default)]
struct RefreshState {
    in_flight: bool,
    queue: WaiterQueue,
}

enum Role {
    Leader,
    Follower(Waiter),
}

/// Owns the refresh state for one client, or for several clients sharing a
/// session when injected through `ApiClient::with_coordinator`.
pub struct SessionRenewalCoordinator {
    state: Mutex<RefreshState>,
    navigator: Arc<dyn Navigator>,
    login_location: String,
    refresh_timeout: Option<Duration>,
}

impl SessionRenewalCoordinator {
    pub fn new(navigator: Arc<dyn Navigator>, login_location: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(RefreshState::default()),
            navigator,
            login_location: login_location.into(),
            refresh_timeout: None,
        }
    }

    pub fn from_config(config: &ClientConfig, navigator: Arc<dyn Navigator>) -> Self {
        Self::new(navigator, config.login_location.clone()).with_refresh_timeout(config.refresh_timeout())
    }

    /// Bound every refresh call by `timeout`. `None` waits indefinitely.
    pub fn with_refresh_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn is_refreshing(&self) -> bool {
        self.state.lock().in_flight
    }

    pub fn pending_waiters(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Wait for a renewed session.
    ///
    /// Runs `refresh` if no renewal is in flight, otherwise parks behind the
    /// one that is. `Ok(())` means the caller may replay its request once.
    pub async fn renew<F, Fut>(&self, refresh: F) -> RenewalOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), ApiError>>,
    {
        match self.admit() {
            Role::Follower(waiter) => {
                trace!("session refresh in flight, queueing caller");
                waiter.wait().await
            }
            Role::Leader => self.lead(refresh).await,
        }
    }

    fn admit(&self) -> Role {
        let mut state = self.state.lock();
        if state.in_flight {
            Role::Follower(state.queue.enqueue())
        } else {
            state.in_flight = true;
            Role::Leader
        }
    }

    async fn lead<F, Fut>(&self, refresh: F) -> RenewalOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), ApiError>>,
    {
        let cycle = Cycle {
            coordinator: self,
            settled: false,
        };
        debug!("starting session refresh");

        let result = match self.refresh_timeout {
            Some(limit) => tokio::time::timeout(limit, refresh())
                .await
                .unwrap_or(Err(ApiError::RefreshTimedOut(limit))),
            None => refresh().await,
        };
        let outcome = result.map_err(|err| ApiError::RefreshFailed(Arc::new(err)));

        cycle.settle(&outcome);
        if outcome.is_err() {
            self.navigator.navigate(&self.login_location);
        }
        outcome
    }

    fn settle(&self, outcome: &RenewalOutcome) {
        let waiters = {
            let mut state = self.state.lock();
            state.in_flight = false;
            state.queue.take()
        };
        match outcome {
            Ok(()) => info!(waiters = waiters.len(), "session refreshed"),
            Err(err) => warn!(waiters = waiters.len(), error = %err, "session refresh failed"),
        }
        waiters.complete(outcome);
    }
}

impl std::fmt::Debug for SessionRenewalCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRenewalCoordinator")
            .field("state", &*self.state.lock())
            .field("login_location", &self.login_location)
            .field("refresh_timeout", &self.refresh_timeout)
            .finish_non_exhaustive()
    }
}

/// Leader-side guard for one refresh cycle. If the leader is dropped before
/// the refresh finishes, the cycle is settled with `RefreshAbandoned` so
/// parked callers are released and the state returns to Idle.
struct Cycle<'a> {
    coordinator: &'a SessionRenewalCoordinator,
    settled: bool,
}

impl Cycle<'_> {
    fn settle(mut self, outcome: &RenewalOutcome) {
        self.settled = true;
        self.coordinator.settle(outcome);
    }
}

impl Drop for Cycle<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator.settle(&Err(ApiError::RefreshAbandoned));
        }
    }
}
