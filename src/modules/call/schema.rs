use serde::{Deserialize, Serialize};
use sqlx::prelude::{FromRow, Type};
use uuid::Uuid;

use crate::api::error;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Type, Serialize, Deserialize)]
#[sqlx(type_name = "call_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    Audio,
    Video,
}

/// `Ringing -> {Answered, Declined, Missed}`, `Answered -> Ended`.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Type, Serialize, Deserialize)]
#[sqlx(type_name = "call_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Ringing,
    Answered,
    Ended,
    Missed,
    Declined,
}

impl CallStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended | Self::Missed | Self::Declined)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Type, Serialize, Deserialize)]
#[sqlx(type_name = "call_participant_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CallParticipantStatus {
    Ringing,
    Joined,
    Left,
    Declined,
    Missed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallAction {
    Answer,
    Decline,
    Miss,
    End,
}

impl CallAction {
    fn verb(&self) -> &'static str {
        match self {
            Self::Answer => "answer",
            Self::Decline => "decline",
            Self::Miss => "miss",
            Self::End => "end",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CallEntity {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub caller_id: Uuid,
    /// `None` for group calls.
    pub receiver_id: Option<Uuid>,
    pub call_type: CallType,
    pub status: CallStatus,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub answered_at: Option<chrono::DateTime<chrono::Utc>>,
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Whole seconds between `started_at` and `ended_at`.
    pub duration: Option<i64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CallParticipantEntity {
    pub call_id: Uuid,
    pub user_id: Uuid,
    pub status: CallParticipantStatus,
    pub joined_at: Option<chrono::DateTime<chrono::Utc>>,
    pub left_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Column values written by one aggregate transition, guarded by `expected`.
#[derive(Debug, Clone, PartialEq)]
pub struct CallTransition {
    pub expected: CallStatus,
    pub to: CallStatus,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub answered_at: Option<chrono::DateTime<chrono::Utc>>,
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
    pub duration: Option<i64>,
}

impl CallEntity {
    pub fn is_group(&self) -> bool {
        self.receiver_id.is_none()
    }

    pub fn plan(
        &self,
        action: CallAction,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<CallTransition, error::SystemError> {
        let mut transition = CallTransition {
            expected: self.status,
            to: self.status,
            started_at: None,
            answered_at: None,
            ended_at: None,
            duration: None,
        };

        match (action, self.status) {
            (CallAction::Answer, CallStatus::Ringing) => {
                // the call timer starts on answer
                transition.to = CallStatus::Answered;
                transition.started_at = Some(now);
                transition.answered_at = Some(now);
            }
            (CallAction::Decline, CallStatus::Ringing) => {
                transition.to = CallStatus::Declined;
                transition.ended_at = Some(now);
            }
            (CallAction::Miss, CallStatus::Ringing) => {
                transition.to = CallStatus::Missed;
                transition.ended_at = Some(now);
            }
            (CallAction::End, CallStatus::Ringing | CallStatus::Answered) => {
                transition.to = CallStatus::Ended;
                transition.ended_at = Some(now);
                transition.duration =
                    self.started_at.map(|started| (now - started).num_seconds().max(0));
            }
            (action, status) => {
                return Err(error::SystemError::invalid_state(format!(
                    "Cannot {} a call that is {:?}",
                    action.verb(),
                    status
                )));
            }
        }

        Ok(transition)
    }

    pub fn apply(&mut self, transition: &CallTransition) {
        self.status = transition.to;
        if transition.started_at.is_some() {
            self.started_at = transition.started_at;
        }
        if transition.answered_at.is_some() {
            self.answered_at = transition.answered_at;
        }
        if transition.ended_at.is_some() {
            self.ended_at = transition.ended_at;
        }
        if transition.duration.is_some() {
            self.duration = transition.duration;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn ringing() -> CallEntity {
        CallEntity {
            id: Uuid::now_v7(),
            chat_id: Uuid::now_v7(),
            caller_id: Uuid::now_v7(),
            receiver_id: Some(Uuid::now_v7()),
            call_type: CallType::Video,
            status: CallStatus::Ringing,
            started_at: None,
            answered_at: None,
            ended_at: None,
            duration: None,
            created_at: Utc::now(),
        }
    }

    fn step(call: &mut CallEntity, action: CallAction, now: chrono::DateTime<Utc>) -> bool {
        match call.plan(action, now) {
            Ok(t) => {
                call.apply(&t);
                true
            }
            Err(_) => false,
        }
    }

    #[test]
    fn test_answer_then_end_computes_duration() {
        let t0 = Utc::now();
        let mut call = ringing();
        assert!(step(&mut call, CallAction::Answer, t0));
        assert!(step(&mut call, CallAction::End, t0 + Duration::milliseconds(5400)));
        assert_eq!(call.status, CallStatus::Ended);
        assert_eq!(call.duration, Some(5));
        assert_eq!(call.started_at, Some(t0));
    }

    #[test]
    fn test_decline_has_no_duration() {
        let mut call = ringing();
        assert!(step(&mut call, CallAction::Decline, Utc::now()));
        assert_eq!(call.status, CallStatus::Declined);
        assert!(call.duration.is_none());
        assert!(call.ended_at.is_some());
    }

    #[test]
    fn test_end_before_answer_has_no_duration() {
        let mut call = ringing();
        assert!(step(&mut call, CallAction::End, Utc::now()));
        assert_eq!(call.status, CallStatus::Ended);
        assert!(call.duration.is_none());
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        let now = Utc::now();
        let actions = [CallAction::Answer, CallAction::Decline, CallAction::Miss, CallAction::End];
        for terminal in [CallAction::Decline, CallAction::Miss, CallAction::End] {
            let mut call = ringing();
            assert!(step(&mut call, terminal, now));
            assert!(call.status.is_terminal());
            for action in actions {
                let err = call.plan(action, now).unwrap_err();
                assert!(matches!(err, error::SystemError::InvalidState(_)));
            }
        }
    }

    #[test]
    fn test_answered_call_cannot_ring_again() {
        let now = Utc::now();
        let mut call = ringing();
        assert!(step(&mut call, CallAction::Answer, now));
        assert!(!step(&mut call, CallAction::Answer, now));
        assert!(!step(&mut call, CallAction::Decline, now));
        assert!(!step(&mut call, CallAction::Miss, now));
        assert_eq!(call.status, CallStatus::Answered);
    }

    /// Every action sequence keeps `duration.is_some()` equivalent to
    /// "answered before ended" and never returns to ringing.
    #[test]
    fn test_all_short_sequences_hold_invariants() {
        let actions = [CallAction::Answer, CallAction::Decline, CallAction::Miss, CallAction::End];
        let t0 = Utc::now();

        for a in actions {
            for b in actions {
                for c in actions {
                    let mut call = ringing();
                    let mut answered = false;
                    let mut left_ringing = false;
                    for (i, action) in [a, b, c].into_iter().enumerate() {
                        step(&mut call, action, t0 + Duration::seconds(i as i64 * 3));
                        if call.status == CallStatus::Answered {
                            answered = true;
                        }
                        if call.status != CallStatus::Ringing {
                            left_ringing = true;
                        }
                        if left_ringing {
                            assert_ne!(call.status, CallStatus::Ringing);
                        }
                    }
                    let expect_duration = call.status == CallStatus::Ended && answered;
                    assert_eq!(call.duration.is_some(), expect_duration, "{a:?} {b:?} {c:?}");
                }
            }
        }
    }
}
