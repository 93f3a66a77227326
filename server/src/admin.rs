use serde::Serialize;
use system::{ServerRoom, SessionId, SessionSnapshot};
use tokio::sync::oneshot::Sender;

#[derive(Debug)]
pub enum AdminCommand {
    ListSessions {
        tx: Sender<Vec<SessionSummary>>,
    },
    GetSession {
        session_id: SessionId,
        tx: Sender<Result<SessionDescription, String>>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub host_id: String,
    pub participants: usize,
}

impl From<&ServerRoom> for SessionSummary {
    fn from(room: &ServerRoom) -> Self {
        Self {
            session_id: room.session_id().to_owned(),
            host_id: room.host_id().to_owned(),
            participants: room.len(),
        }
    }
}

#[derive(Debug)]
pub struct SessionDescription {
    pub snapshot: SessionSnapshot,
    pub host_online: bool,
}

impl SessionDescription {
    pub fn new(snapshot: SessionSnapshot) -> Self {
        let host_online = snapshot
            .participants
            .iter()
            .any(|p| p.id == snapshot.host_id);
        Self {
            snapshot,
            host_online,
        }
    }
}
