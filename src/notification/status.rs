use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of the last delivery attempt for an event.
///
/// The host persists this alongside the event as an integer (see [`code`](Self::code)).
/// An event that was never queued for this channel has no status at all, which the
/// host stores as `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Queued for delivery, not attempted yet
    Pending,
    /// Provider confirmed the push
    Sent,
    /// Provider reported a server-side failure; eligible for another attempt
    RetryableError,
    /// Rejected or undeliverable; never attempted again
    Fatal,
}

impl DeliveryStatus {
    /// Integer stored in the host's activity status column.
    pub const fn code(self) -> u8 {
        match self {
            DeliveryStatus::Sent => 2,
            DeliveryStatus::Pending => 3,
            DeliveryStatus::Fatal => 4,
            DeliveryStatus::RetryableError => 5,
        }
    }

    /// Decode a stored column value. Unknown codes (including `0`) mean "no status".
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            2 => Some(DeliveryStatus::Sent),
            3 => Some(DeliveryStatus::Pending),
            4 => Some(DeliveryStatus::Fatal),
            5 => Some(DeliveryStatus::RetryableError),
            _ => None,
        }
    }

    /// `Sent` and `Fatal` end the life of an event for this channel.
    pub const fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Sent | DeliveryStatus::Fatal)
    }

    /// Whether the pipeline may attempt delivery from this status.
    pub const fn is_dispatchable(self) -> bool {
        matches!(self, DeliveryStatus::Pending | DeliveryStatus::RetryableError)
    }

    /// Check a status change against the delivery state machine.
    ///
    /// `None` stands for an event that has not been queued yet; the only way out of
    /// it is `Pending`.
    pub fn can_transition(from: Option<DeliveryStatus>, to: DeliveryStatus) -> bool {
        match from {
            None => to == DeliveryStatus::Pending,
            Some(current) if current.is_dispatchable() => to != DeliveryStatus::Pending,
            Some(_) => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::RetryableError => "retryable_error",
            DeliveryStatus::Fatal => "fatal",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [DeliveryStatus; 4] = [
        DeliveryStatus::Pending,
        DeliveryStatus::Sent,
        DeliveryStatus::RetryableError,
        DeliveryStatus::Fatal,
    ];

    #[test]
    fn test_codes_match_activity_column() {
        assert_eq!(DeliveryStatus::Sent.code(), 2);
        assert_eq!(DeliveryStatus::Pending.code(), 3);
        assert_eq!(DeliveryStatus::Fatal.code(), 4);
        assert_eq!(DeliveryStatus::RetryableError.code(), 5);

        for status in ALL {
            assert_eq!(DeliveryStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(DeliveryStatus::from_code(0), None);
        assert_eq!(DeliveryStatus::from_code(1), None);
    }

    #[test]
    fn test_unqueued_event_can_only_become_pending() {
        assert!(DeliveryStatus::can_transition(None, DeliveryStatus::Pending));
        assert!(!DeliveryStatus::can_transition(None, DeliveryStatus::Sent));
        assert!(!DeliveryStatus::can_transition(None, DeliveryStatus::Fatal));
    }

    #[test]
    fn test_terminal_statuses_are_final() {
        for from in [DeliveryStatus::Sent, DeliveryStatus::Fatal] {
            assert!(from.is_terminal());
            for to in ALL {
                assert!(!DeliveryStatus::can_transition(Some(from), to));
            }
        }
    }

    #[test]
    fn test_retryable_error_can_be_retried() {
        let from = Some(DeliveryStatus::RetryableError);
        assert!(DeliveryStatus::can_transition(from, DeliveryStatus::Sent));
        assert!(DeliveryStatus::can_transition(from, DeliveryStatus::RetryableError));
        assert!(DeliveryStatus::can_transition(from, DeliveryStatus::Fatal));
        assert!(!DeliveryStatus::can_transition(from, DeliveryStatus::Pending));
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&DeliveryStatus::RetryableError).unwrap();
        assert_eq!(json, "\"retryable_error\"");
    }
}
