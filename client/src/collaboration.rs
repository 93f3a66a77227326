use std::num::Wrapping;

use system::{
    ClientPresence, CommandId, CommandResult, IdentifiableCommand, IdentifiableEvent,
    Participant, SessionCommand, SharedPayload, SnapshotError, SystemCommand, SystemEvent,
};

use crate::transport::{Transport, TransportError};

#[derive(Debug, Clone, PartialEq)]
pub enum CollaborationError {
    /// The join reply could not be adopted; the client stays unjoined.
    Join(SnapshotError),
    Transport(TransportError),
}

impl std::fmt::Display for CollaborationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollaborationError::Join(e) => write!(f, "join refused: {}", e),
            CollaborationError::Transport(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CollaborationError {}

impl From<SnapshotError> for CollaborationError {
    fn from(e: SnapshotError) -> Self {
        CollaborationError::Join(e)
    }
}

impl From<TransportError> for CollaborationError {
    fn from(e: TransportError) -> Self {
        CollaborationError::Transport(e)
    }
}

/// Presence of the local participant wired to a transport.
///
/// Local state is always updated first. Commands reach the transport only
/// after the server confirmed the join; whatever was reported before that is
/// sent right after the confirmation. Cursor/section reports are held back
/// while broadcasting is suspended. A transport failure is returned to the
/// caller; local state is kept.
pub struct Collaboration<T: Transport> {
    presence: ClientPresence,
    transport: T,
    command_id_source: Wrapping<CommandId>,
    joined: bool,
    broadcasting: bool,
}

impl<T: Transport> Collaboration<T> {
    pub fn new(presence: ClientPresence, transport: T) -> Self {
        Self {
            presence,
            transport,
            command_id_source: Wrapping(0),
            joined: false,
            broadcasting: true,
        }
    }

    pub fn presence(&self) -> &ClientPresence {
        &self.presence
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_joined(&self) -> bool {
        self.joined
    }

    pub fn can_interact(&self) -> bool {
        self.presence.can_interact()
    }

    pub fn list_others(&self) -> Vec<Participant> {
        self.presence.list_others()
    }

    pub fn list_in_section(&self, section: &str) -> Vec<Participant> {
        self.presence.list_in_section(section)
    }

    fn send(&mut self, system_command: SystemCommand) -> Result<CommandId, TransportError> {
        self.command_id_source += Wrapping(1);
        let command_id = self.command_id_source.0;
        self.transport.send(IdentifiableCommand {
            command_id,
            system_command,
        })?;
        Ok(command_id)
    }

    fn send_session_command(&mut self, command: SessionCommand) -> Result<(), TransportError> {
        if !self.joined {
            log::trace!("Not joined yet, keeping {:?} local", command);
            return Ok(());
        }
        self.send(SystemCommand::SessionCommand(command)).map(|_| ())
    }

    pub fn join(&mut self) -> Result<CommandId, TransportError> {
        let me = self.presence.me();
        let command = SystemCommand::JoinSession {
            participant_id: me.id.clone(),
            name: me.name.clone(),
        };
        self.send(command)
    }

    pub fn leave(&mut self) -> Result<CommandId, TransportError> {
        let command_id = self.send(SystemCommand::LeaveSession)?;
        self.joined = false;
        Ok(command_id)
    }

    /// Stops sending own cursor and section, e.g. while the view that
    /// tracks them is gone. The participant stays in the session.
    pub fn suspend_broadcast(&mut self) {
        self.broadcasting = false;
    }

    pub fn resume_broadcast(&mut self) {
        self.broadcasting = true;
    }

    pub fn is_broadcasting(&self) -> bool {
        self.broadcasting
    }

    pub fn report_cursor(&mut self, x: f32, y: f32, section: &str) -> Result<(), TransportError> {
        let command = self.presence.report_cursor(x, y, section);
        if self.broadcasting {
            self.send_session_command(command)
        } else {
            Ok(())
        }
    }

    pub fn report_section(&mut self, section: &str) -> Result<(), TransportError> {
        let command = self.presence.report_section(section);
        if self.broadcasting {
            self.send_session_command(command)
        } else {
            Ok(())
        }
    }

    /// Returns `Ok(false)` when this participant isn't allowed to update.
    pub fn update_shared_payload(&mut self, payload: SharedPayload) -> Result<bool, TransportError> {
        match self.presence.update_shared_payload(payload) {
            Some(command) => self.send_session_command(command).map(|_| true),
            None => Ok(false),
        }
    }

    /// Applies an event from the server. Returns whether the presence
    /// changed.
    pub fn handle_event(&mut self, event: IdentifiableEvent) -> Result<bool, CollaborationError> {
        match event {
            IdentifiableEvent::ByMyself { command_id, result } => match result {
                CommandResult::SystemEvent(SystemEvent::JoinedSession {
                    participant_id,
                    session_snapshot,
                }) => {
                    if participant_id != self.presence.self_id() {
                        log::warn!("Joined as {}, expected {}", participant_id, self.presence.self_id());
                        return Ok(false);
                    }
                    self.adopt_join(session_snapshot)?;
                    Ok(true)
                }
                CommandResult::SystemEvent(SystemEvent::LeftSession) => {
                    self.joined = false;
                    self.presence.clear_peers();
                    Ok(true)
                }
                CommandResult::SystemEvent(_) => Ok(false),
                CommandResult::Error(error) => {
                    log::warn!("Command {} rejected: {:?}", command_id, error);
                    Ok(false)
                }
            },
            IdentifiableEvent::BySystem {
                system_event: SystemEvent::SessionEvent(session_event),
            } => Ok(self.presence.handle_session_event(session_event)),
            IdentifiableEvent::BySystem { system_event } => {
                log::debug!("Ignoring system event {:?}", system_event);
                Ok(false)
            }
        }
    }

    fn adopt_join(&mut self, snapshot: system::SessionSnapshot) -> Result<(), CollaborationError> {
        let pending = match self.presence.adopt_snapshot(snapshot) {
            Ok(pending) => pending,
            Err(e) => {
                log::warn!("Staying out of {}: {}", self.presence.session_id(), e);
                return Err(e.into());
            }
        };
        self.joined = true;
        for command in pending {
            let is_presence = !matches!(command, SessionCommand::SharedPayload(_));
            if is_presence && !self.broadcasting {
                continue;
            }
            self.send_session_command(command)?;
        }
        Ok(())
    }
}
