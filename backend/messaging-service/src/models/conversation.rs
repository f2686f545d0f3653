use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The two parties a conversation can connect. Every authenticated request
/// and connection carries exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Doctor,
    Patient,
}

impl UserRole {
    pub fn counterpart(self) -> UserRole {
        match self {
            UserRole::Doctor => UserRole::Patient,
            UserRole::Patient => UserRole::Doctor,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Doctor => "doctor",
            UserRole::Patient => "patient",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown user role: {0}")]
pub struct ParseRoleError(String);

impl FromStr for UserRole {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "doctor" => Ok(UserRole::Doctor),
            "patient" => Ok(UserRole::Patient),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

/// Map a (sender, counterpart) request onto the conversation's fixed
/// (doctor, patient) identity. The pair is the conversation key, so both
/// directions of a thread resolve to the same row.
pub fn participant_pair(
    sender_id: Uuid,
    sender_role: UserRole,
    counterpart_id: Uuid,
) -> (Uuid, Uuid) {
    match sender_role {
        UserRole::Doctor => (sender_id, counterpart_id),
        UserRole::Patient => (counterpart_id, sender_id),
    }
}

/// One persistent thread between a doctor and a patient. At most one row per
/// pair; created lazily on first send, never hard-deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub last_message_text: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_doctor: i64,
    pub unread_patient: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn unread_for(&self, role: UserRole) -> i64 {
        match role {
            UserRole::Doctor => self.unread_doctor,
            UserRole::Patient => self.unread_patient,
        }
    }

    pub fn counterpart_id(&self, viewer_role: UserRole) -> Uuid {
        match viewer_role {
            UserRole::Doctor => self.patient_id,
            UserRole::Patient => self.doctor_id,
        }
    }

    pub fn participant(&self, user_id: Uuid) -> bool {
        self.doctor_id == user_id || self.patient_id == user_id
    }
}
