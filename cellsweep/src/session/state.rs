//! Per-session state.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::backoff::Backoff;
use crate::api::MapSession;

/// Lifecycle phase of a scan session.
///
/// ```text
/// Unauthenticated ──► Authenticating ──► Active ◄──► ReAuthenticating
///                                          │
///                                   Stop ──┴──► Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No login attempted yet.
    Unauthenticated,
    /// First login in progress.
    Authenticating,
    /// Holding a ticket with enough validity for a batch of queries.
    Active,
    /// Ticket ran low; logging in again.
    ReAuthenticating,
    /// Received the stop task. Terminal.
    Stopped,
}

impl SessionPhase {
    /// Short lowercase name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Unauthenticated => "unauthenticated",
            SessionPhase::Authenticating => "authenticating",
            SessionPhase::Active => "active",
            SessionPhase::ReAuthenticating => "reauthenticating",
            SessionPhase::Stopped => "stopped",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a scan session owns exclusively.
///
/// A re-login swaps in a new connection; the old one is dropped.
pub struct SessionState {
    pub(crate) phase: SessionPhase,
    pub(crate) connection: Option<Box<dyn MapSession>>,
    pub(crate) backoff: Backoff,
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("phase", &self.phase)
            .field("connected", &self.connection.is_some())
            .field("expires_at", &self.expires_at())
            .field("backoff", &self.backoff)
            .finish()
    }
}

impl SessionState {
    pub(crate) fn new(backoff: Backoff) -> Self {
        Self {
            phase: SessionPhase::Unauthenticated,
            connection: None,
            backoff,
        }
    }

    /// Expiry of the current login ticket, if connected.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.connection
            .as_ref()
            .and_then(|connection| connection.ticket_expires_at())
    }

    /// Returns true if the current ticket outlives `now + margin`.
    pub fn is_fresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        ticket_is_fresh(self.expires_at(), now, margin)
    }
}

/// Returns true if a ticket expiring at `expires_at` still has more than
/// `margin` of validity at `now`.
///
/// A missing expiry counts as not logged in.
pub fn ticket_is_fresh(
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    margin: Duration,
) -> bool {
    let Some(expires_at) = expires_at else {
        return false;
    };
    match chrono::Duration::from_std(margin) {
        Ok(margin) => expires_at - now >= margin,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_ticket_is_stale() {
        assert!(!ticket_is_fresh(None, Utc::now(), Duration::ZERO));
    }

    #[test]
    fn test_ticket_inside_margin_is_stale() {
        let now = Utc::now();
        let expires = now + chrono::Duration::seconds(30);
        assert!(!ticket_is_fresh(Some(expires), now, Duration::from_secs(60)));
    }

    #[test]
    fn test_ticket_beyond_margin_is_fresh() {
        let now = Utc::now();
        let expires = now + chrono::Duration::seconds(61);
        assert!(ticket_is_fresh(Some(expires), now, Duration::from_secs(60)));
    }

    #[test]
    fn test_new_state_is_unauthenticated() {
        let state = SessionState::new(Backoff::new(
            Duration::from_secs(5),
            Duration::from_secs(300),
        ));
        assert_eq!(state.phase, SessionPhase::Unauthenticated);
        assert!(!state.is_fresh(Utc::now(), Duration::ZERO));
    }
}
