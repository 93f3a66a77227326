use crate::participant::Participant;
use crate::types::{CommandId, ParticipantId, Seq, SessionId};
use serde::{Deserialize, Serialize};

/// FatalError makes connection be closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FatalError {
    pub reason: String,
}

/// Opaque JSON text. Kept as text so that it survives the binary codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedPayload(String);

impl SharedPayload {
    pub fn from_json(value: &serde_json::Value) -> Self {
        Self(value.to_string())
    }

    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IdentifiableCommand {
    pub command_id: CommandId,
    pub system_command: SystemCommand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SystemCommand {
    JoinSession {
        participant_id: ParticipantId,
        name: String,
    },
    LeaveSession,
    SessionCommand(SessionCommand),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionCommand {
    Cursor(CursorCommand),
    Section(SectionCommand),
    SharedPayload(SharedPayload),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorCommand {
    pub x: f32,
    pub y: f32,
    pub section: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionCommand {
    pub section: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub enum IdentifiableEvent {
    ByMyself {
        command_id: CommandId,
        result: CommandResult,
    },
    BySystem {
        system_event: SystemEvent,
    },
}

#[derive(Debug, Serialize, Deserialize)]
pub enum CommandResult {
    SystemEvent(SystemEvent),
    Error(SystemError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SystemEvent {
    JoinedSession {
        participant_id: ParticipantId,
        session_snapshot: SessionSnapshot,
    },
    LeftSession,
    SessionEvent(SessionEvent),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    ParticipantJoined {
        seq: Seq,
        participant: Participant,
    },
    ParticipantLeft {
        seq: Seq,
        participant_id: ParticipantId,
    },
    Cursor(CursorEvent),
    Section(SectionEvent),
    SharedPayload(SharedPayloadEvent),
}

impl SessionEvent {
    pub fn seq(&self) -> Seq {
        match self {
            SessionEvent::ParticipantJoined { seq, .. }
            | SessionEvent::ParticipantLeft { seq, .. } => *seq,
            SessionEvent::Cursor(e) => e.seq,
            SessionEvent::Section(e) => e.seq,
            SessionEvent::SharedPayload(e) => e.seq,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorEvent {
    pub seq: Seq,
    pub participant_id: ParticipantId,
    pub x: f32,
    pub y: f32,
    pub section: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionEvent {
    pub seq: Seq,
    pub participant_id: ParticipantId,
    pub section: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedPayloadEvent {
    pub seq: Seq,
    pub participant_id: ParticipantId,
    pub payload: SharedPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub seq: Seq,
    pub host_id: ParticipantId,
    pub participants: Vec<Participant>,
    pub shared_payload: Option<SharedPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SystemError {
    AlreadyJoined,
    NotJoined,
    DuplicateParticipant,
    PermissionDenied,
    FatalError(FatalError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionError {
    PermissionDenied,
    UnknownParticipant,
}

impl From<SessionError> for SystemError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::PermissionDenied => SystemError::PermissionDenied,
            SessionError::UnknownParticipant => SystemError::NotJoined,
        }
    }
}
