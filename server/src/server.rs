use tokio::sync::mpsc::{channel, Sender};

use system::{
    CommandResult, ConnectionId, IdentifiableCommand, IdentifiableEvent,
    SessionEvent, SessionId, SystemCommand, SystemError, SystemEvent,
};

use crate::admin::{AdminCommand, SessionDescription, SessionSummary};
use crate::connection::{ConnectionCommand, ConnectionEvent};
use crate::connection_tx_storage::ConnectionTxStorage;
use crate::server_state::ServerState;

#[derive(Debug)]
pub enum ServerCommand {
    Connection(ConnectionCommand),
    AdminCommand(AdminCommand),
}

pub type ServerTx = Sender<ServerCommand>;

struct Server {
    server_state: ServerState,
    connections: ConnectionTxStorage,
}

impl Server {
    fn new() -> Self {
        Self {
            server_state: ServerState::new(),
            connections: ConnectionTxStorage::new(),
        }
    }

    async fn handle_server_command(&mut self, command: ServerCommand) {
        match command {
            ServerCommand::Connection(command) => self.handle_connection_command(command).await,
            ServerCommand::AdminCommand(command) => self.handle_admin_command(command),
        }
    }

    async fn handle_connection_command(&mut self, command: ConnectionCommand) {
        match command {
            ConnectionCommand::Connect { tx, session_id } => {
                let connection_id = self.server_state.create_connection(session_id);
                self.connections.insert(connection_id, tx);
                self.connections
                    .send(&connection_id, ConnectionEvent::Connected { connection_id })
                    .await;
            }
            ConnectionCommand::Disconnect { from } => {
                if let Some((session_id, left)) = self.server_state.disconnect(&from) {
                    self.broadcast_session_event(&session_id, left, Some(&from))
                        .await;
                }
                self.connections.remove(&from);
            }
            ConnectionCommand::IdentifiableCommand {
                from,
                command:
                    IdentifiableCommand {
                        command_id,
                        system_command,
                    },
            } => match self.handle_system_command(&from, system_command).await {
                Ok(system_event) => {
                    self.connections
                        .send(
                            &from,
                            ConnectionEvent::IdentifiableEvent(IdentifiableEvent::ByMyself {
                                command_id,
                                result: CommandResult::SystemEvent(system_event),
                            }),
                        )
                        .await
                }
                Err(SystemError::FatalError(ref fatal_error)) => {
                    log::warn!(
                        "Disconnecting a connection due to fatal error: {}",
                        fatal_error.reason
                    );
                    self.disconnect(&from).await;
                }
                Err(system_error) => {
                    log::debug!("Command {} of {} rejected: {:?}", command_id, from, system_error);
                    self.connections
                        .send(
                            &from,
                            ConnectionEvent::IdentifiableEvent(IdentifiableEvent::ByMyself {
                                command_id,
                                result: CommandResult::Error(system_error),
                            }),
                        )
                        .await;
                }
            },
        }
    }

    async fn handle_system_command(
        &mut self,
        from: &ConnectionId,
        command: SystemCommand,
    ) -> Result<SystemEvent, SystemError> {
        match command {
            SystemCommand::JoinSession {
                participant_id,
                name,
            } => {
                let (session_id, joined, session_snapshot) =
                    self.server_state
                        .join_session(from, participant_id.clone(), name)?;
                self.broadcast_session_event(&session_id, joined, Some(from))
                    .await;
                Ok(SystemEvent::JoinedSession {
                    participant_id,
                    session_snapshot,
                })
            }
            SystemCommand::LeaveSession => {
                if let Some((session_id, left)) = self.server_state.leave_session(from) {
                    self.broadcast_session_event(&session_id, left, Some(from))
                        .await;
                    Ok(SystemEvent::LeftSession)
                } else {
                    Err(SystemError::NotJoined)
                }
            }
            SystemCommand::SessionCommand(session_command) => {
                let (session_id, event) = self.server_state.apply(from, session_command)?;
                self.broadcast_session_event(&session_id, event.clone(), Some(from))
                    .await;
                Ok(SystemEvent::SessionEvent(event))
            }
        }
    }

    fn handle_admin_command(&mut self, command: AdminCommand) {
        match command {
            AdminCommand::ListSessions { tx } => {
                let mut summaries = self
                    .server_state
                    .sessions
                    .values()
                    .map(|session| SessionSummary::from(&session.room))
                    .collect::<Vec<_>>();
                summaries.sort_by(|a, b| a.session_id.cmp(&b.session_id));
                let _ = tx.send(summaries);
            }
            AdminCommand::GetSession { session_id, tx } => {
                let result = self
                    .server_state
                    .sessions
                    .get(&session_id)
                    .map(|session| SessionDescription::new(session.snapshot()))
                    .ok_or_else(|| format!("no live session {}", session_id));
                let _ = tx.send(result);
            }
        }
    }

    async fn broadcast_session_event(
        &mut self,
        session_id: &SessionId,
        session_event: SessionEvent,
        without: Option<&ConnectionId>,
    ) {
        let targets = match self.server_state.connection_ids_in_session(session_id) {
            Ok(conns) => conns
                .iter()
                .filter(|c| without.map_or(true, |w| w != *c))
                .cloned()
                .collect::<Vec<_>>(),
            Err(_) => return,
        };
        for connection_id in targets {
            let event = ConnectionEvent::IdentifiableEvent(IdentifiableEvent::BySystem {
                system_event: SystemEvent::SessionEvent(session_event.clone()),
            });
            self.connections.send(&connection_id, event).await;
        }
    }

    async fn disconnect(&mut self, connection_id: &ConnectionId) {
        if let Some((session_id, left)) = self.server_state.leave_session(connection_id) {
            self.broadcast_session_event(&session_id, left, Some(connection_id))
                .await;
        }
        self.connections
            .send(
                connection_id,
                ConnectionEvent::Disconnected {
                    connection_id: *connection_id,
                },
            )
            .await;
    }
}

pub fn spawn_server() -> ServerTx {
    let (srv_tx, mut srv_rx) = channel::<ServerCommand>(16);

    tokio::spawn(async move {
        let mut server = Box::new(Server::new());

        while let Some(command) = srv_rx.recv().await {
            server.handle_server_command(command).await;
        }
        log::info!("server loop terminated");
    });

    srv_tx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::deliver;
    use system::{CursorCommand, SessionCommand};
    use tokio::sync::oneshot;

    fn command(command_id: u16, system_command: SystemCommand) -> IdentifiableCommand {
        IdentifiableCommand {
            command_id,
            system_command,
        }
    }

    async fn list_sessions(srv_tx: &mut ServerTx) -> Vec<SessionSummary> {
        let (tx, rx) = oneshot::channel();
        srv_tx
            .send(ServerCommand::AdminCommand(AdminCommand::ListSessions { tx }))
            .await
            .expect("");
        rx.await.expect("")
    }

    #[tokio::test]
    async fn it_evicts_participant_disconnected_under_full_queue() {
        let mut srv_tx = spawn_server();
        let (conn_tx, mut conn_rx) = channel::<ConnectionEvent>(128);
        deliver(
            srv_tx.clone(),
            ConnectionCommand::Connect {
                tx: conn_tx,
                session_id: "room-1".into(),
            },
        )
        .await;
        let from = match conn_rx.recv().await {
            Some(ConnectionEvent::Connected { connection_id }) => connection_id,
            other => panic!("unexpected {:?}", other),
        };

        let join = SystemCommand::JoinSession {
            participant_id: "u1".into(),
            name: "Alice".into(),
        };
        deliver(
            srv_tx.clone(),
            ConnectionCommand::IdentifiableCommand {
                from,
                command: command(1, join),
            },
        )
        .await;
        assert!(matches!(
            conn_rx.recv().await,
            Some(ConnectionEvent::IdentifiableEvent(IdentifiableEvent::ByMyself { .. }))
        ));
        assert_eq!(list_sessions(&mut srv_tx).await.len(), 1);

        // cursor traffic until the queue refuses more
        for i in 0..64 {
            let cursor = SystemCommand::SessionCommand(SessionCommand::Cursor(CursorCommand {
                x: i as f32,
                y: 0.0,
                section: "dashboard".into(),
            }));
            let queued = srv_tx.try_send(ServerCommand::Connection(
                ConnectionCommand::IdentifiableCommand {
                    from,
                    command: command(2 + i, cursor),
                },
            ));
            if queued.is_err() {
                break;
            }
        }

        deliver(srv_tx.clone(), ConnectionCommand::Disconnect { from }).await;
        assert!(list_sessions(&mut srv_tx).await.is_empty());
    }
}

