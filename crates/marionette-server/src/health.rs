//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

use crate::broker::BrokerStats;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Clients joined to a room.
    pub connections: usize,
    /// Live rooms.
    pub rooms: usize,
    /// Commands awaiting an ack or an avatar.
    pub pending: usize,
}

/// Build a health response from broker table sizes.
pub fn health_check(start_time: Instant, stats: BrokerStats) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections: stats.clients,
        rooms: stats.rooms,
        pending: stats.pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_ok() {
        let resp = health_check(Instant::now(), BrokerStats::default());
        assert_eq!(resp.status, "ok");
        assert!(resp.uptime_secs < 2);
    }

    #[test]
    fn uptime_increases() {
        let start = Instant::now()
            .checked_sub(std::time::Duration::from_secs(60))
            .unwrap();
        let resp = health_check(start, BrokerStats::default());
        assert!(resp.uptime_secs >= 59);
    }

    #[test]
    fn serialization() {
        let stats = BrokerStats {
            rooms: 1,
            clients: 2,
            pending: 3,
            queued: 3,
        };
        let json = serde_json::to_value(health_check(Instant::now(), stats)).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["connections"], 2);
        assert_eq!(json["rooms"], 1);
        assert_eq!(json["pending"], 3);
        assert!(json["uptime_secs"].is_number());
    }
}
