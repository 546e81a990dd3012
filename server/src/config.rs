use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "landlord-server", about = "Wildcard landlord card game server")]
pub struct ServerConfig {
    #[arg(long, env = "LANDLORD_BIND", default_value = "0.0.0.0:33030")]
    pub bind: SocketAddr,

    /// Seconds a bidder has to answer.
    #[arg(long, env = "LANDLORD_BID_TIMEOUT", default_value_t = 30)]
    pub bid_timeout_secs: u64,

    /// Seconds a player has to play or pass.
    #[arg(long, env = "LANDLORD_PLAY_TIMEOUT", default_value_t = 40)]
    pub play_timeout_secs: u64,

    #[arg(long, env = "LANDLORD_REAP_INTERVAL", default_value_t = 60)]
    pub reap_interval_secs: u64,

    /// Rooms idle for longer than this are destroyed.
    #[arg(long, env = "LANDLORD_ROOM_TTL_HOURS", default_value_t = 24)]
    pub room_ttl_hours: u64,

    #[arg(long, env = "LANDLORD_INBOX_CAPACITY", default_value_t = 8)]
    pub inbox_capacity: usize,

    #[arg(long, env = "LANDLORD_MAX_PLAYERS", default_value_t = 6)]
    pub max_players: usize,

    #[arg(long, env = "LANDLORD_JSON_LOGS")]
    pub json_logs: bool,
}

impl ServerConfig {
    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            bid_timeout: Duration::from_secs(self.bid_timeout_secs),
            play_timeout: Duration::from_secs(self.play_timeout_secs),
        }
    }

    pub fn lobby(&self) -> LobbyConfig {
        LobbyConfig {
            room_ttl: Duration::from_secs(self.room_ttl_hours * 60 * 60),
            inbox_capacity: self.inbox_capacity.max(1),
            max_players: self.max_players.max(2),
        }
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub bid_timeout: Duration,
    pub play_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bid_timeout: Duration::from_secs(30),
            play_timeout: Duration::from_secs(40),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LobbyConfig {
    pub room_ttl: Duration,
    pub inbox_capacity: usize,
    pub max_players: usize,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            room_ttl: Duration::from_secs(24 * 60 * 60),
            inbox_capacity: 8,
            max_players: 6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = ServerConfig::parse_from(["landlord-server"]);
        assert_eq!(config.bind.port(), 33030);
        assert_eq!(config.engine().bid_timeout, Duration::from_secs(30));
        assert_eq!(config.engine().play_timeout, Duration::from_secs(40));
        assert_eq!(config.lobby().room_ttl, Duration::from_secs(86_400));
        assert_eq!(config.lobby().max_players, 6);
        assert!(!config.json_logs);
    }

    #[test]
    fn flags_override_defaults() {
        let config = ServerConfig::parse_from([
            "landlord-server",
            "--play-timeout-secs",
            "5",
            "--max-players",
            "9",
            "--json-logs",
        ]);
        assert_eq!(config.engine().play_timeout, Duration::from_secs(5));
        assert_eq!(config.lobby().max_players, 9);
        assert!(config.json_logs);
    }
}
