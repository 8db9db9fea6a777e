use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counters, exposed as a JSON snapshot on `/metrics`.
#[derive(Debug, Default)]
pub struct ServerMetrics {
    pub total_connections: AtomicU64,
    pub active_connections: AtomicU64,
    pub disconnections: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub lobbies_created: AtomicU64,
    pub lobbies_closed: AtomicU64,
    pub games_finished: AtomicU64,
    pub players_joined: AtomicU64,
    pub players_kicked: AtomicU64,
    pub store_errors: AtomicU64,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub total_connections: u64,
    pub active_connections: u64,
    pub disconnections: u64,
    pub frames_dropped: u64,
    pub lobbies_created: u64,
    pub lobbies_closed: u64,
    pub games_finished: u64,
    pub players_joined: u64,
    pub players_kicked: u64,
    pub store_errors: u64,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_connections(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_active_connections(&self) {
        self.disconnections.fetch_add(1, Ordering::Relaxed);
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                current.checked_sub(1)
            });
    }

    pub fn increment_frames_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_lobbies_created(&self) {
        self.lobbies_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_lobbies_closed(&self) {
        self.lobbies_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_games_finished(&self) {
        self.games_finished.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_players_joined(&self) {
        self.players_joined.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_players_kicked(&self) {
        self.players_kicked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_store_errors(&self) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            disconnections: self.disconnections.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            lobbies_created: self.lobbies_created.load(Ordering::Relaxed),
            lobbies_closed: self.lobbies_closed.load(Ordering::Relaxed),
            games_finished: self.games_finished.load(Ordering::Relaxed),
            players_joined: self.players_joined.load(Ordering::Relaxed),
            players_kicked: self.players_kicked.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_counters_track_register_and_remove() {
        let metrics = ServerMetrics::new();
        metrics.increment_connections();
        metrics.increment_connections();
        metrics.decrement_active_connections();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_connections, 2);
        assert_eq!(snapshot.active_connections, 1);
        assert_eq!(snapshot.disconnections, 1);
    }

    #[test]
    fn active_connections_never_underflow() {
        let metrics = ServerMetrics::new();
        metrics.decrement_active_connections();
        assert_eq!(metrics.snapshot().active_connections, 0);
    }
}
