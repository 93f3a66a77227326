use crate::session::Session;
use std::collections::HashMap;
use std::num::Wrapping;
use system::{
    ConnectionId, FatalError, ParticipantId, SessionCommand, SessionEvent, SessionId,
    SessionSnapshot, SystemError,
};

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Connected(SessionId),
    Joined(SessionId, ParticipantId),
}

pub struct ServerState {
    connection_id_source: Wrapping<ConnectionId>,
    pub connection_states: HashMap<ConnectionId, ConnectionState>,
    pub sessions: HashMap<SessionId, Session>,
}

#[derive(Debug)]
pub enum ServerError {
    InvalidSessionId,
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            connection_id_source: Wrapping(0),
            connection_states: HashMap::new(),
            sessions: HashMap::new(),
        }
    }

    /// Registers a socket that targets `session_id`. It takes part in the
    /// session only after joining.
    pub fn create_connection(&mut self, session_id: SessionId) -> ConnectionId {
        let connection_id = self.new_connection_id();
        self.connection_states
            .insert(connection_id, ConnectionState::Connected(session_id));
        connection_id
    }

    pub fn join_session(
        &mut self,
        connection_id: &ConnectionId,
        participant_id: ParticipantId,
        name: String,
    ) -> Result<(SessionId, SessionEvent, SessionSnapshot), SystemError> {
        let session_id = match self.connection_states.get(connection_id) {
            Some(ConnectionState::Connected(session_id)) => session_id.clone(),
            Some(ConnectionState::Joined(..)) => return Err(SystemError::AlreadyJoined),
            None => {
                return Err(SystemError::FatalError(FatalError {
                    reason: "unknown connection".into(),
                }))
            }
        };

        let session = self
            .sessions
            .entry(session_id.clone())
            .or_insert_with(|| {
                log::info!("Session {} opened by {}", session_id, participant_id);
                Session::new(session_id.clone(), participant_id.clone())
            });
        let joined = session.room.join(participant_id.clone(), name);
        let joined = match joined {
            Ok(event) => event,
            Err(error) => {
                if session.room.is_empty() {
                    self.sessions.remove(&session_id);
                }
                return Err(error);
            }
        };
        session.connections.push(*connection_id);
        let snapshot = session.snapshot();
        self.connection_states.insert(
            *connection_id,
            ConnectionState::Joined(session_id.clone(), participant_id),
        );
        Ok((session_id, joined, snapshot))
    }

    pub fn leave_session(
        &mut self,
        connection_id: &ConnectionId,
    ) -> Option<(SessionId, SessionEvent)> {
        let (session_id, participant_id) = match self.connection_states.get(connection_id) {
            Some(ConnectionState::Joined(session_id, participant_id)) => {
                (session_id.clone(), participant_id.clone())
            }
            _ => return None,
        };
        self.connection_states.insert(
            *connection_id,
            ConnectionState::Connected(session_id.clone()),
        );

        let session = self.sessions.get_mut(&session_id)?;
        session.connections.retain(|c| c != connection_id);
        let left = session.room.leave(&participant_id);
        if session.room.is_empty() {
            log::info!("Session {} closed", session_id);
            self.sessions.remove(&session_id);
        }
        left.map(|event| (session_id, event))
    }

    /// Forgets the connection, leaving its session first.
    pub fn disconnect(&mut self, connection_id: &ConnectionId) -> Option<(SessionId, SessionEvent)> {
        let left = self.leave_session(connection_id);
        self.connection_states.remove(connection_id);
        left
    }

    pub fn apply(
        &mut self,
        connection_id: &ConnectionId,
        command: SessionCommand,
    ) -> Result<(SessionId, SessionEvent), SystemError> {
        let (session_id, participant_id) = match self.connection_states.get(connection_id) {
            Some(ConnectionState::Joined(session_id, participant_id)) => {
                (session_id.clone(), participant_id.clone())
            }
            Some(ConnectionState::Connected(_)) => return Err(SystemError::NotJoined),
            None => {
                return Err(SystemError::FatalError(FatalError {
                    reason: "unknown connection".into(),
                }))
            }
        };
        let session = self
            .sessions
            .get_mut(&session_id)
            .ok_or(SystemError::NotJoined)?;
        let event = session.room.apply(&participant_id, command)?;
        Ok((session_id, event))
    }

    pub fn connection_ids_in_session(
        &self,
        session_id: &str,
    ) -> Result<&[ConnectionId], ServerError> {
        self.sessions
            .get(session_id)
            .map(|s| s.connections.as_slice())
            .ok_or(ServerError::InvalidSessionId)
    }

    fn new_connection_id(&mut self) -> ConnectionId {
        loop {
            self.connection_id_source += Wrapping(1);
            let candidate = self.connection_id_source.0;
            if !self.connection_states.contains_key(&candidate) {
                break candidate;
            }
        }
    }
}
