use std::collections::HashMap;

use crate::message::*;
use crate::participant::{CursorPosition, Participant};
use crate::types::{palette_color, ParticipantId, Seq, SessionId};

/// Authoritative roster of one session, held by the server.
///
/// The first participant to join owns the host seat for the whole life of
/// the room. Identity of every command comes from the caller (the
/// connection), never from the command itself.
pub struct ServerRoom {
    session_id: SessionId,
    host_id: ParticipantId,
    participants: HashMap<ParticipantId, Participant>,
    join_count: usize,
    seq: Seq,
    shared_payload: Option<SharedPayload>,
}

impl ServerRoom {
    pub fn new(session_id: SessionId, host_id: ParticipantId) -> Self {
        Self {
            session_id,
            host_id,
            participants: HashMap::new(),
            join_count: 0,
            seq: 0,
            shared_payload: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    pub fn seq(&self) -> Seq {
        self.seq
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.participants.get(id)
    }

    fn next_seq(&mut self) -> Seq {
        self.seq += 1;
        self.seq
    }

    pub fn join(
        &mut self,
        participant_id: ParticipantId,
        name: String,
    ) -> Result<SessionEvent, SystemError> {
        if self.participants.contains_key(&participant_id) {
            return Err(SystemError::DuplicateParticipant);
        }
        let is_host = participant_id == self.host_id;
        let participant = Participant::new(
            participant_id.clone(),
            name,
            is_host,
            palette_color(self.join_count),
        );
        self.join_count += 1;
        self.participants
            .insert(participant_id.clone(), participant.clone());
        log::info!(
            "{} joined session {} (host: {})",
            participant_id,
            self.session_id,
            is_host
        );
        Ok(SessionEvent::ParticipantJoined {
            seq: self.next_seq(),
            participant,
        })
    }

    pub fn leave(&mut self, participant_id: &str) -> Option<SessionEvent> {
        self.participants.remove(participant_id)?;
        log::info!("{} left session {}", participant_id, self.session_id);
        Some(SessionEvent::ParticipantLeft {
            seq: self.next_seq(),
            participant_id: participant_id.to_owned(),
        })
    }

    pub fn apply(
        &mut self,
        from: &str,
        command: SessionCommand,
    ) -> Result<SessionEvent, SessionError> {
        let is_host = self
            .participants
            .get(from)
            .map(|p| p.is_host())
            .ok_or(SessionError::UnknownParticipant)?;

        match command {
            SessionCommand::Cursor(CursorCommand { x, y, section }) => {
                let seq = self.next_seq();
                let participant = self
                    .participants
                    .get_mut(from)
                    .ok_or(SessionError::UnknownParticipant)?;
                participant.cursor = Some(CursorPosition::new(x, y, section.clone()));
                Ok(SessionEvent::Cursor(CursorEvent {
                    seq,
                    participant_id: from.to_owned(),
                    x,
                    y,
                    section,
                }))
            }
            SessionCommand::Section(SectionCommand { section }) => {
                let seq = self.next_seq();
                let participant = self
                    .participants
                    .get_mut(from)
                    .ok_or(SessionError::UnknownParticipant)?;
                participant.current_section = section.clone();
                Ok(SessionEvent::Section(SectionEvent {
                    seq,
                    participant_id: from.to_owned(),
                    section,
                }))
            }
            SessionCommand::SharedPayload(payload) => {
                if !is_host {
                    log::warn!(
                        "{} tried to update shared payload of {} without host role",
                        from,
                        self.session_id
                    );
                    return Err(SessionError::PermissionDenied);
                }
                self.shared_payload = Some(payload.clone());
                Ok(SessionEvent::SharedPayload(SharedPayloadEvent {
                    seq: self.next_seq(),
                    participant_id: from.to_owned(),
                    payload,
                }))
            }
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let mut participants = self.participants.values().cloned().collect::<Vec<_>>();
        participants.sort_by(|a, b| a.id.cmp(&b.id));
        SessionSnapshot {
            session_id: self.session_id.clone(),
            seq: self.seq,
            host_id: self.host_id.clone(),
            participants,
            shared_payload: self.shared_payload.clone(),
        }
    }
}
