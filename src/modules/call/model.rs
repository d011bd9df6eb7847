use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::modules::{
    call::schema::{CallEntity, CallParticipantEntity, CallStatus, CallType},
    user::schema::UserSummary,
};

pub const DEFAULT_LOG_LIMIT: i64 = 50;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct InitiateCallRequest {
    /// Omitted for a 1:1 call; the private chat is resolved from the receiver.
    pub chat_id: Option<Uuid>,
    pub receiver_id: Option<Uuid>,
    pub call_type: CallType,
}

#[derive(Debug, Clone)]
pub struct NewCall {
    pub chat_id: Uuid,
    pub caller_id: Uuid,
    pub receiver_id: Option<Uuid>,
    pub call_type: CallType,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CallLogQuery {
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallDetail {
    pub call: CallEntity,
    pub caller: Option<UserSummary>,
    pub participants: Vec<CallParticipantEntity>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    Outgoing,
    Incoming,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallLogEntry {
    pub call: CallEntity,
    pub direction: CallDirection,
    pub caller: Option<UserSummary>,
    pub chat_participants: Vec<UserSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CallStatistics {
    pub total: u64,
    pub outgoing: u64,
    pub incoming: u64,
    pub answered: u64,
    pub missed: u64,
    pub declined: u64,
    pub audio: u64,
    pub video: u64,
    pub total_duration: i64,
    pub average_duration: f64,
}

impl CallStatistics {
    /// `answered` counts calls that ended with a duration.
    pub fn from_calls(user_id: &Uuid, calls: &[CallEntity]) -> Self {
        let mut stats = CallStatistics::default();

        for call in calls {
            stats.total += 1;
            if call.caller_id == *user_id {
                stats.outgoing += 1;
            } else {
                stats.incoming += 1;
            }
            match call.call_type {
                CallType::Audio => stats.audio += 1,
                CallType::Video => stats.video += 1,
            }
            match call.status {
                CallStatus::Missed => stats.missed += 1,
                CallStatus::Declined => stats.declined += 1,
                _ => {}
            }
            if let Some(duration) = call.duration {
                stats.answered += 1;
                stats.total_duration += duration;
            }
        }

        if stats.answered > 0 {
            stats.average_duration = stats.total_duration as f64 / stats.answered as f64;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(caller: Uuid, status: CallStatus, call_type: CallType, duration: Option<i64>) -> CallEntity {
        CallEntity {
            id: Uuid::now_v7(),
            chat_id: Uuid::now_v7(),
            caller_id: caller,
            receiver_id: Some(Uuid::now_v7()),
            call_type,
            status,
            started_at: duration.map(|_| chrono::Utc::now()),
            answered_at: None,
            ended_at: None,
            duration,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_statistics_from_calls() {
        let me = Uuid::now_v7();
        let other = Uuid::now_v7();
        let calls = vec![
            call(me, CallStatus::Ended, CallType::Video, Some(30)),
            call(other, CallStatus::Ended, CallType::Audio, Some(90)),
            call(other, CallStatus::Missed, CallType::Audio, None),
            call(me, CallStatus::Declined, CallType::Video, None),
            call(me, CallStatus::Ended, CallType::Audio, None),
        ];

        let stats = CallStatistics::from_calls(&me, &calls);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.outgoing, 3);
        assert_eq!(stats.incoming, 2);
        assert_eq!(stats.answered, 2);
        assert_eq!(stats.missed, 1);
        assert_eq!(stats.declined, 1);
        assert_eq!(stats.audio, 3);
        assert_eq!(stats.video, 2);
        assert_eq!(stats.total_duration, 120);
        assert_eq!(stats.average_duration, 60.0);
    }

    #[test]
    fn test_statistics_empty() {
        assert_eq!(CallStatistics::from_calls(&Uuid::now_v7(), &[]), CallStatistics::default());
    }
}
