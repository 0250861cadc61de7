//! Session lifecycle states and the derived relay status reported to callers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of one managed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Constructed, bring-up not attempted or still being retried.
    Pending,
    /// Transport initialized; waiting for pairing or readiness.
    Initialized,
    /// Fresh pairing required; a pairing token has been published.
    NeedRegister,
    /// Resumed session asked for a fresh pairing, its credentials are stale.
    NeedDelete,
    Ready,
    Disconnected,
    AuthFailure,
    ReconnectionFailed,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Initialized => "initialized",
            Self::NeedRegister => "need_register",
            Self::NeedDelete => "need_delete",
            Self::Ready => "ready",
            Self::Disconnected => "disconnected",
            Self::AuthFailure => "auth_failure",
            Self::ReconnectionFailed => "reconnection_failed",
        }
    }

    /// No further transitions happen from a terminal state; the session has
    /// to be deleted and recreated.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Disconnected | Self::AuthFailure | Self::ReconnectionFailed
        )
    }

    /// States that mark the end of bring-up ambiguity. Reaching one of them
    /// sets `readyForAction`.
    pub fn unlocks_actions(self) -> bool {
        matches!(self, Self::NeedRegister | Self::NeedDelete | Self::Ready)
    }

    /// Whether `self -> next` is a legal lifecycle edge.
    ///
    /// `NeedRegister -> NeedRegister` is legal: every refreshed pairing token
    /// is published again.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        match self {
            Pending => matches!(
                next,
                Initialized | NeedRegister | NeedDelete | ReconnectionFailed | Disconnected | AuthFailure
            ),
            Initialized => matches!(
                next,
                NeedRegister | NeedDelete | Ready | Disconnected | AuthFailure
            ),
            NeedRegister => matches!(next, NeedRegister | Ready | Disconnected | AuthFailure),
            NeedDelete => matches!(next, Disconnected | AuthFailure),
            Ready => matches!(next, Disconnected | AuthFailure),
            Disconnected | AuthFailure | ReconnectionFailed => false,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relay status derived from the two relay flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Inactive,
    Active,
    ActiveWithMedia,
}

impl MessageStatus {
    /// Media relay alone does nothing, so it only shows up together with
    /// message relay.
    pub fn from_flags(relay_messages: bool, relay_media: bool) -> Self {
        match (relay_messages, relay_media) {
            (true, true) => Self::ActiveWithMedia,
            (true, false) => Self::Active,
            (false, _) => Self::Inactive,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::ActiveWithMedia => "active_with_media",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [SessionStatus; 8] = [
        SessionStatus::Pending,
        SessionStatus::Initialized,
        SessionStatus::NeedRegister,
        SessionStatus::NeedDelete,
        SessionStatus::Ready,
        SessionStatus::Disconnected,
        SessionStatus::AuthFailure,
        SessionStatus::ReconnectionFailed,
    ];

    #[test]
    fn message_status_covers_all_flag_combinations() {
        assert_eq!(MessageStatus::from_flags(true, true), MessageStatus::ActiveWithMedia);
        assert_eq!(MessageStatus::from_flags(true, false), MessageStatus::Active);
        assert_eq!(MessageStatus::from_flags(false, true), MessageStatus::Inactive);
        assert_eq!(MessageStatus::from_flags(false, false), MessageStatus::Inactive);
    }

    #[test]
    fn pending_never_jumps_to_ready() {
        assert!(!SessionStatus::Pending.can_transition_to(SessionStatus::Ready));
        assert!(SessionStatus::Pending.can_transition_to(SessionStatus::Initialized));
        assert!(SessionStatus::Initialized.can_transition_to(SessionStatus::Ready));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to} should be illegal");
            }
        }
    }

    #[test]
    fn ready_only_exits_to_connection_loss() {
        let exits: Vec<_> = ALL
            .into_iter()
            .filter(|to| SessionStatus::Ready.can_transition_to(*to))
            .collect();
        assert_eq!(exits, vec![SessionStatus::Disconnected, SessionStatus::AuthFailure]);
    }

    #[test]
    fn reconnection_failed_only_reachable_from_pending() {
        for from in ALL {
            let legal = from.can_transition_to(SessionStatus::ReconnectionFailed);
            assert_eq!(legal, from == SessionStatus::Pending, "{from}");
        }
    }

    #[test]
    fn unlocking_states() {
        let unlocking: Vec<_> = ALL.into_iter().filter(|s| s.unlocks_actions()).collect();
        assert_eq!(
            unlocking,
            vec![SessionStatus::NeedRegister, SessionStatus::NeedDelete, SessionStatus::Ready]
        );
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&SessionStatus::ReconnectionFailed).unwrap();
        assert_eq!(json, "\"reconnection_failed\"");
        let json = serde_json::to_string(&MessageStatus::ActiveWithMedia).unwrap();
        assert_eq!(json, "\"active_with_media\"");
    }
}
