use clap::Parser;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "presence-server", about = "Relays presence of call sessions over WebSocket")]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub bind: String,

    /// Seconds between heartbeat pings sent to each connection
    #[arg(long, default_value_t = 5)]
    pub heartbeat_interval: u64,

    /// Seconds of silence after which a connection is dropped and its participant evicted
    #[arg(long, default_value_t = 10)]
    pub client_timeout: u64,
}

impl ServerConfig {
    pub fn heartbeat(&self) -> Heartbeat {
        Heartbeat {
            interval: Duration::from_secs(self.heartbeat_interval),
            timeout: Duration::from_secs(self.client_timeout.max(self.heartbeat_interval)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Heartbeat {
    pub interval: Duration,
    pub timeout: Duration,
}
