use system::{ConnectionId, ParticipantId, ServerRoom, SessionId, SessionSnapshot};

pub struct Session {
    pub connections: Vec<ConnectionId>,
    pub room: ServerRoom,
}

impl Session {
    /// The participant opening the session takes its host seat.
    pub fn new(session_id: SessionId, host_id: ParticipantId) -> Self {
        Self {
            connections: Vec::new(),
            room: ServerRoom::new(session_id, host_id),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.room.snapshot()
    }
}
