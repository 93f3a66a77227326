use crate::admin::{AdminCommand, SessionSummary};
use crate::server::{ServerCommand, ServerTx};
use actix_web::{error, web, HttpResponse, Responder};

pub fn configure_session_handlers(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/sessions").route(web::get().to(get)));
}

pub(crate) async fn fetch_summaries(
    srv_tx: &ServerTx,
) -> Result<Vec<SessionSummary>, actix_web::error::Error> {
    let (tx, rx) = tokio::sync::oneshot::channel::<Vec<SessionSummary>>();

    srv_tx
        .clone()
        .send(ServerCommand::AdminCommand(AdminCommand::ListSessions { tx }))
        .await
        .map_err(|_| error::ErrorInternalServerError("Internal Server Error"))?;

    rx.await
        .map_err(|_| error::ErrorInternalServerError("Receiver await error"))
}

async fn get(srv_tx: web::Data<ServerTx>) -> Result<impl Responder, actix_web::error::Error> {
    let summaries = fetch_summaries(srv_tx.get_ref()).await?;
    Ok(HttpResponse::Ok().json(summaries))
}
