use std::time::Instant;

use actix::fut::WrapFuture;
use actix::{Actor, ActorContext, AsyncContext, Handler, Message, Running, StreamHandler};
use actix_web::{error, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use actix_web_actors::ws::{CloseCode, CloseReason};

use system::codec::{self, Encoding};
use system::{
    ConnectionId, IdentifiableCommand, IdentifiableEvent, SessionCommand, SessionId,
    SystemCommand,
};

use crate::config::Heartbeat;
use crate::connection_tx_storage::ConnectionTx;
use crate::server::{ServerCommand, ServerTx};

#[derive(Debug)]
pub enum ConnectionCommand {
    Connect {
        tx: ConnectionTx,
        session_id: SessionId,
    },
    Disconnect {
        from: ConnectionId,
    },
    IdentifiableCommand {
        from: ConnectionId,
        command: IdentifiableCommand,
    },
}

#[derive(Debug)]
pub enum ConnectionEvent {
    Connected { connection_id: ConnectionId },
    IdentifiableEvent(IdentifiableEvent),
    Disconnected { connection_id: ConnectionId },
}

#[derive(Message)]
#[rtype(result = "()")]
struct ConnectionActorMessage(ConnectionEvent);

/// Frames accepted before the server assigned a connection id.
const MAX_PENDING_COMMANDS: usize = 32;

/// Waits for room in the server queue instead of dropping the command.
pub(crate) async fn deliver(mut srv_tx: ServerTx, command: ConnectionCommand) {
    if srv_tx
        .send(ServerCommand::Connection(command))
        .await
        .is_err()
    {
        log::warn!("Server loop is gone");
    }
}

/// Commands decoded before the server assigned a connection id.
#[derive(Default)]
struct PendingCommands(Vec<IdentifiableCommand>);

impl PendingCommands {
    /// Returns `false` once the backlog is full.
    fn hold(&mut self, command: IdentifiableCommand) -> bool {
        if self.0.len() >= MAX_PENDING_COMMANDS {
            return false;
        }
        self.0.push(command);
        true
    }

    fn release(&mut self, from: ConnectionId) -> Vec<ConnectionCommand> {
        std::mem::take(&mut self.0)
            .into_iter()
            .map(|command| ConnectionCommand::IdentifiableCommand { from, command })
            .collect()
    }
}

/// Cursor and section updates are superseded by the next one, so they may
/// be dropped under load. Everything else changes membership.
fn is_lossy(command: &IdentifiableCommand) -> bool {
    matches!(
        command.system_command,
        SystemCommand::SessionCommand(SessionCommand::Cursor(_))
            | SystemCommand::SessionCommand(SessionCommand::Section(_))
    )
}

enum ConnectionState {
    Idle,
    Connected(ConnectionId),
}

struct ConnectionActor {
    state: ConnectionState,
    srv_tx: ServerTx,
    session_id: SessionId,
    heartbeat: Heartbeat,
    last_seen: Instant,
    /// Fixed by the first data frame; replies use the same encoding.
    encoding: Option<Encoding>,
    pending: PendingCommands,
}

impl ConnectionActor {
    fn try_send_to_server(&mut self, command: ConnectionCommand) {
        if let Err(e) = self.srv_tx.try_send(ServerCommand::Connection(command)) {
            log::warn!("Server queue rejected a command: {}", e);
        }
    }

    /// Holds back further ingress until the server accepted `command`, so
    /// commands keep their order.
    fn send_to_server(&mut self, command: ConnectionCommand, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.wait(deliver(self.srv_tx.clone(), command).into_actor(self));
    }

    fn forward(
        &mut self,
        from: ConnectionId,
        command: IdentifiableCommand,
        ctx: &mut ws::WebsocketContext<Self>,
    ) {
        log::debug!("Ingress {:?}", command);
        let command_is_lossy = is_lossy(&command);
        let command = ConnectionCommand::IdentifiableCommand { from, command };
        if command_is_lossy {
            self.try_send_to_server(command);
        } else {
            self.send_to_server(command, ctx);
        }
    }

    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(self.heartbeat.interval, |act, ctx| {
            if Instant::now().duration_since(act.last_seen) > act.heartbeat.timeout {
                log::info!("Connection timed out for session {}", act.session_id);
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn ingress(&mut self, encoding: Encoding, bytes: &[u8], ctx: &mut ws::WebsocketContext<Self>) {
        log::debug!("Ingress size: {}", bytes.len());
        let encoding = *self.encoding.get_or_insert(encoding);
        let command = match codec::decode::<IdentifiableCommand>(encoding, bytes) {
            Ok(command) => command,
            Err(e) => {
                log::warn!("Closing connection for session {}: {}", self.session_id, e);
                ctx.close(Some(CloseReason {
                    code: CloseCode::Invalid,
                    description: None,
                }));
                ctx.stop();
                return;
            }
        };
        match self.state {
            ConnectionState::Connected(from) => self.forward(from, command, ctx),
            ConnectionState::Idle => {
                log::debug!("Holding {:?} until registered", command);
                if self.pending.hold(command) {
                    return;
                }
                log::warn!("Too many frames before registration, closing");
                ctx.close(Some(CloseReason {
                    code: CloseCode::Policy,
                    description: None,
                }));
                ctx.stop();
            }
        }
    }
}

impl Actor for ConnectionActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<ConnectionEvent>(32);

        self.send_to_server(
            ConnectionCommand::Connect {
                tx,
                session_id: self.session_id.clone(),
            },
            ctx,
        );
        self.start_heartbeat(ctx);

        let addr = ctx.address().recipient();

        tokio::spawn(async move {
            log::debug!("connection green thread - started");
            while let Some(msg) = rx.recv().await {
                if addr.try_send(ConnectionActorMessage(msg)).is_err() {
                    break;
                }
            }
            log::debug!("connection green thread - terminated");
        });
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        if let ConnectionState::Connected(id) = self.state {
            tokio::spawn(deliver(
                self.srv_tx.clone(),
                ConnectionCommand::Disconnect { from: id },
            ));
            self.state = ConnectionState::Idle;
        }

        Running::Stop
    }
}

/// Ingress
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ConnectionActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                log::warn!("WebSocket protocol error: {}", e);
                ctx.stop();
                return;
            }
        };
        self.last_seen = Instant::now();
        match msg {
            ws::Message::Ping(msg) => ctx.pong(&msg),
            ws::Message::Pong(_) => {}
            ws::Message::Binary(bin) => self.ingress(Encoding::Bincode, &bin, ctx),
            ws::Message::Text(text) => self.ingress(Encoding::Json, text.as_bytes(), ctx),
            ws::Message::Close(reason) => {
                ctx.close(reason);
                ctx.stop();
            }
            ws::Message::Continuation(_) => {
                log::warn!("Fragmented frames are not supported");
                ctx.stop();
            }
            ws::Message::Nop => {}
        }
    }
}

/// Egress
impl Handler<ConnectionActorMessage> for ConnectionActor {
    type Result = ();

    fn handle(
        &mut self,
        msg: ConnectionActorMessage,
        ctx: &mut ws::WebsocketContext<Self>,
    ) -> Self::Result {
        let connection_event = msg.0;
        log::debug!("Egress {:?}", connection_event);
        match connection_event {
            ConnectionEvent::Connected { connection_id } => {
                self.state = ConnectionState::Connected(connection_id);
                for command in self.pending.release(connection_id) {
                    self.send_to_server(command, ctx);
                }
            }
            ConnectionEvent::Disconnected { .. } => {
                self.state = ConnectionState::Idle;
                ctx.close(Some(CloseReason {
                    code: CloseCode::Policy,
                    description: None,
                }));
                ctx.stop();
            }
            ConnectionEvent::IdentifiableEvent(event) => {
                let encoding = self.encoding.unwrap_or(Encoding::Bincode);
                match codec::encode(encoding, &event) {
                    Ok(bytes) if encoding == Encoding::Json => {
                        ctx.text(String::from_utf8_lossy(&bytes).into_owned())
                    }
                    Ok(bytes) => ctx.binary(bytes),
                    Err(e) => log::warn!("Failed to encode egress event: {}", e),
                }
            }
        }
    }
}

pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    srv_tx: web::Data<ServerTx>,
    heartbeat: web::Data<Heartbeat>,
) -> Result<HttpResponse, Error> {
    let session_id: SessionId = req
        .match_info()
        .get("session_id")
        .filter(|s| !s.is_empty())
        .ok_or_else(|| error::ErrorBadRequest("missing session id"))?
        .to_owned();
    ws::start(
        ConnectionActor {
            srv_tx: srv_tx.get_ref().clone(),
            state: ConnectionState::Idle,
            session_id,
            heartbeat: *heartbeat.get_ref(),
            last_seen: Instant::now(),
            encoding: None,
            pending: PendingCommands::default(),
        },
        &req,
        stream,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use system::CursorCommand;
    use tokio::sync::mpsc::channel;

    fn disconnect(from: ConnectionId) -> ServerCommand {
        ServerCommand::Connection(ConnectionCommand::Disconnect { from })
    }

    #[tokio::test]
    async fn it_delivers_through_a_full_queue() {
        let (mut srv_tx, mut srv_rx) = channel::<ServerCommand>(1);
        srv_tx.try_send(disconnect(1)).expect("");
        assert!(srv_tx.try_send(disconnect(2)).is_err());

        let delivery = tokio::spawn(deliver(
            srv_tx.clone(),
            ConnectionCommand::Disconnect { from: 2 },
        ));
        let mut delivered = vec![];
        for _ in 0..2 {
            match srv_rx.recv().await {
                Some(ServerCommand::Connection(ConnectionCommand::Disconnect { from })) => {
                    delivered.push(from)
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        delivery.await.expect("");
        assert_eq!(delivered, vec![1, 2]);
    }

    #[test]
    fn it_holds_frames_until_registered() {
        let mut pending = PendingCommands::default();
        let join = IdentifiableCommand {
            command_id: 1,
            system_command: SystemCommand::JoinSession {
                participant_id: "u1".into(),
                name: "Alice".into(),
            },
        };
        assert!(pending.hold(join));
        for i in 1..MAX_PENDING_COMMANDS {
            assert!(pending.hold(IdentifiableCommand {
                command_id: 1 + i as u16,
                system_command: SystemCommand::LeaveSession,
            }));
        }
        assert!(!pending.hold(IdentifiableCommand {
            command_id: 99,
            system_command: SystemCommand::LeaveSession,
        }));

        let released = pending.release(7);
        assert_eq!(released.len(), MAX_PENDING_COMMANDS);
        match &released[0] {
            ConnectionCommand::IdentifiableCommand { from, command } => {
                assert_eq!(*from, 7);
                assert_eq!(command.command_id, 1);
                assert!(matches!(
                    command.system_command,
                    SystemCommand::JoinSession { .. }
                ));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(pending.release(7).is_empty());
    }

    #[test]
    fn it_only_lets_presence_updates_drop() {
        let command = |system_command| IdentifiableCommand {
            command_id: 1,
            system_command,
        };
        assert!(is_lossy(&command(SystemCommand::SessionCommand(
            SessionCommand::Cursor(CursorCommand {
                x: 1.0,
                y: 1.0,
                section: "users".into(),
            })
        ))));
        assert!(!is_lossy(&command(SystemCommand::LeaveSession)));
        assert!(!is_lossy(&command(SystemCommand::JoinSession {
            participant_id: "u1".into(),
            name: "Alice".into(),
        })));
        assert!(!is_lossy(&command(SystemCommand::SessionCommand(
            SessionCommand::SharedPayload(system::SharedPayload::from_raw("1"))
        ))));
    }
}
