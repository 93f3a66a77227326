use crate::admin::{AdminCommand, SessionDescription};
use crate::handlers::sessions::fetch_summaries;
use crate::server::{ServerCommand, ServerTx};
use actix_web::error;
use actix_web::web::{self, HttpRequest};
use actix_web::Responder;
use actix_web::Result;
use askama_actix::Template;
use serde::Deserialize;

pub fn configure_admin_handlers(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .service(web::resource("").route(web::get().to(admin_index)))
            .service(
                web::resource("/sessions/{session_id}")
                    .name("admin_session")
                    .route(web::get().to(show_session)),
            ),
    );
}

struct SimpleListItem {
    title: String,
    href: String,
}

#[derive(Template)]
#[template(path = "admin-index.html")]
pub struct AdminIndexTemplate {
    items: Vec<SimpleListItem>,
}

pub async fn admin_index(req: HttpRequest, srv_tx: web::Data<ServerTx>) -> Result<impl Responder> {
    let summaries = fetch_summaries(srv_tx.get_ref()).await?;
    let mut items = Vec::with_capacity(summaries.len());
    for summary in summaries {
        let href = req
            .url_for("admin_session", &[summary.session_id.as_str()])
            .map_err(|_| error::ErrorInternalServerError("Internal Server Error"))?
            .to_string();
        items.push(SimpleListItem {
            title: format!(
                "{} ({} participants, host {})",
                summary.session_id, summary.participants, summary.host_id
            ),
            href,
        });
    }
    Ok(AdminIndexTemplate { items })
}

struct ParticipantRow {
    id: String,
    name: String,
    color: String,
    host: bool,
    section: String,
    cursor: String,
}

#[derive(Template)]
#[template(path = "admin/show-session.html")]
pub struct AdminShowSessionTemplate {
    session_id: String,
    host_id: String,
    host_online: bool,
    seq: u64,
    shared_payload: String,
    participants: Vec<ParticipantRow>,
}

impl From<SessionDescription> for AdminShowSessionTemplate {
    fn from(desc: SessionDescription) -> Self {
        let snapshot = desc.snapshot;
        Self {
            session_id: snapshot.session_id,
            host_id: snapshot.host_id,
            host_online: desc.host_online,
            seq: snapshot.seq,
            shared_payload: snapshot
                .shared_payload
                .map(|p| p.as_str().to_owned())
                .unwrap_or_else(|| "-".into()),
            participants: snapshot
                .participants
                .into_iter()
                .map(|p| ParticipantRow {
                    host: p.is_host(),
                    color: p.color.to_hex(),
                    cursor: p
                        .cursor
                        .map(|c| format!("({}, {}) in {}", c.x, c.y, c.section))
                        .unwrap_or_else(|| "-".into()),
                    section: p.current_section,
                    id: p.id,
                    name: p.name,
                })
                .collect(),
        }
    }
}

#[derive(Deserialize)]
pub struct ShowSessionParam {
    session_id: String,
}

pub async fn show_session(
    path: web::Path<ShowSessionParam>,
    srv_tx: web::Data<ServerTx>,
) -> Result<impl Responder> {
    let (tx, rx) = tokio::sync::oneshot::channel::<std::result::Result<SessionDescription, String>>();

    srv_tx
        .get_ref()
        .clone()
        .send(ServerCommand::AdminCommand(AdminCommand::GetSession {
            session_id: path.session_id.clone(),
            tx,
        }))
        .await
        .map_err(|_| error::ErrorInternalServerError("Internal Server Error"))?;

    let result = rx
        .await
        .map_err(|_| error::ErrorInternalServerError("Receiver await error"))?;
    let desc = result.map_err(error::ErrorNotFound)?;

    Ok(AdminShowSessionTemplate::from(desc))
}
