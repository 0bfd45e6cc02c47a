//! The unauthenticated-landing side effect.
//!
//! When a session cannot be renewed the surrounding shell has to reset to its
//! login screen. The client does not know what that shell is, so it calls a
//! `Navigator` once per failed renewal cycle.

/// Receives the redirect fired after an unrecoverable session failure.
pub trait Navigator: Send + Sync {
    fn navigate(&self, location: &str);
}

impl<F> Navigator for F
where
    F: Fn(&str) + Send + Sync,
{
    fn navigate(&self, location: &str) {
        self(location)
    }
}

/// Records the redirect in the log. Used when no UI shell is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, location: &str) {
        tracing::warn!(%location, "session expired, redirecting to unauthenticated landing");
    }
}
