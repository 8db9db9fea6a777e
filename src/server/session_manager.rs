use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use super::Lobby;
use crate::metrics::ServerMetrics;
use crate::protocol::{OutboundFrame, SessionId, User};

/// Per-connection state: the outbound queue, the bound user once the session
/// authenticated, and the lobby the session belongs to (if any).
#[derive(Debug, Clone)]
pub(crate) struct SessionRecord {
    pub sender: mpsc::Sender<Arc<OutboundFrame>>,
    pub user: Option<User>,
    pub lobby: Option<Arc<Lobby>>,
}

/// Process-wide session registry.
pub(crate) struct SessionManager {
    sessions: DashMap<SessionId, SessionRecord>,
    metrics: Arc<ServerMetrics>,
}

impl SessionManager {
    pub fn new(metrics: Arc<ServerMetrics>) -> Self {
        Self {
            sessions: DashMap::new(),
            metrics,
        }
    }

    pub fn register(&self, sender: mpsc::Sender<Arc<OutboundFrame>>) -> SessionId {
        let session_id = Uuid::new_v4();
        self.sessions.insert(
            session_id,
            SessionRecord {
                sender,
                user: None,
                lobby: None,
            },
        );
        self.metrics.increment_connections();
        info!(%session_id, "Session registered");
        session_id
    }

    pub fn remove(&self, session_id: &SessionId) -> Option<SessionRecord> {
        self.sessions.remove(session_id).map(|(_, record)| record)
    }

    pub fn is_authenticated(&self, session_id: &SessionId) -> bool {
        self.sessions
            .get(session_id)
            .is_some_and(|record| record.user.is_some())
    }

    pub fn user(&self, session_id: &SessionId) -> Option<User> {
        self.sessions
            .get(session_id)
            .and_then(|record| record.user.clone())
    }

    pub fn bind_user(&self, session_id: &SessionId, user: User) {
        if let Some(mut record) = self.sessions.get_mut(session_id) {
            record.user = Some(user);
        }
    }

    pub fn lobby(&self, session_id: &SessionId) -> Option<Arc<Lobby>> {
        self.sessions
            .get(session_id)
            .and_then(|record| record.lobby.clone())
    }

    pub fn set_lobby(&self, session_id: &SessionId, lobby: Arc<Lobby>) {
        if let Some(mut record) = self.sessions.get_mut(session_id) {
            record.lobby = Some(lobby);
        }
    }

    pub fn clear_lobby(&self, session_id: &SessionId) {
        if let Some(mut record) = self.sessions.get_mut(session_id) {
            record.lobby = None;
        }
    }

    pub fn sender(&self, session_id: &SessionId) -> Option<mpsc::Sender<Arc<OutboundFrame>>> {
        self.sessions
            .get(session_id)
            .map(|record| record.sender.clone())
    }

    /// Enqueue a frame without blocking; a full or closed queue drops the
    /// frame so a slow socket never stalls a lobby.
    pub fn send(&self, session_id: &SessionId, frame: OutboundFrame) {
        let Some(record) = self.sessions.get(session_id) else {
            return;
        };
        if record.sender.try_send(Arc::new(frame)).is_err() {
            self.metrics.increment_frames_dropped();
            warn!(%session_id, "Outbound queue full or closed, frame dropped");
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}
