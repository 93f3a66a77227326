use actix_cors::Cors;
use actix_web::{App, HttpServer};
use clap::Parser;

use server::config::ServerConfig;
use server::handlers;
use server::server::spawn_server;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let config = ServerConfig::parse();
    let heartbeat = config.heartbeat();
    let srv_tx = spawn_server();

    log::info!("Listening on {}", config.bind);
    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .data(srv_tx.clone())
            .data(heartbeat)
            .configure(handlers::root)
    })
    .bind(&config.bind)?
    .run()
    .await
}
