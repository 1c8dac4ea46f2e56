use std::time::Duration;

/// Runtime settings for one server process.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Simulation ticks per second.
    pub tick_rate: u32,
    /// Snapshots sent per second once both players are connected.
    pub broadcast_rate: u32,
    /// Upper bound on a single socket write before the client is dropped.
    pub write_timeout: Duration,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn tick_duration(&self) -> Duration {
        rate_to_period(self.tick_rate)
    }

    pub fn broadcast_duration(&self) -> Duration {
        rate_to_period(self.broadcast_rate)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5555,
            tick_rate: 60,
            broadcast_rate: 60,
            write_timeout: Duration::from_millis(250),
        }
    }
}

fn rate_to_period(rate: u32) -> Duration {
    Duration::from_secs_f64(1.0 / rate.max(1) as f64)
}
