//! Session management module
//!
//! Transport-side bookkeeping for live connections:
//! - Connection id assignment
//! - Connection id -> outbound channel registry
//! - Per-IP connection limiting
//! - Telling a connection's handler when the server drops it
//!
//! The game core only ever sees connection ids; the sockets behind them live
//! here and in the connection handler.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::{mpsc, Notify};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::error::{NetworkError, Result, WordChainError};
use crate::game::player::ConnectionId;
use crate::protocol::ServerMessage;

/// Session state in the connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Socket open, no seat in the room yet
    Connected,
    /// Seated in the room
    Playing,
    /// Session is going away
    Disconnecting,
}

impl SessionState {
    /// Check if the session is still active
    pub fn is_active(&self) -> bool {
        !matches!(self, SessionState::Disconnecting)
    }

    /// Get a human-readable name for the state
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Connected => "Connected",
            SessionState::Playing => "Playing",
            SessionState::Disconnecting => "Disconnecting",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A connected client
pub struct Session {
    /// Connection identifier shared with the game core
    pub id: ConnectionId,
    /// Remote address of the client
    pub address: SocketAddr,
    /// Current session state
    state: RwLock<SessionState>,
    /// Username once seated
    username: RwLock<Option<String>>,
    /// Signalled once when the session is removed
    closed: Notify,
    /// Queue drained by the connection's writer task
    outbound_tx: mpsc::Sender<ServerMessage>,
}

impl Session {
    /// Create a new session
    pub fn new(
        id: ConnectionId,
        address: SocketAddr,
        outbound_tx: mpsc::Sender<ServerMessage>,
    ) -> Self {
        Self {
            id,
            address,
            state: RwLock::new(SessionState::Connected),
            username: RwLock::new(None),
            closed: Notify::new(),
            outbound_tx,
        }
    }

    /// Get the IP address as a string (without port)
    pub fn ip(&self) -> String {
        self.address.ip().to_string()
    }

    /// Get the current session state
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Set the session state
    pub fn set_state(&self, new_state: SessionState) {
        let old_state = {
            let mut state = self.state.write();
            let old = *state;
            *state = new_state;
            old
        };
        debug!(
            session_id = self.id,
            old_state = %old_state,
            new_state = %new_state,
            "Session state changed"
        );
    }

    /// Check if session is active
    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Record the seat this session holds
    pub fn set_username(&self, username: String) {
        *self.username.write() = Some(username);
        self.set_state(SessionState::Playing);
    }

    /// Get the username
    pub fn username(&self) -> Option<String> {
        self.username.read().clone()
    }

    /// Resolves once the session has been removed from the manager
    pub async fn closed(&self) {
        self.closed.notified().await;
    }

    /// Queue a message without waiting.
    ///
    /// A full queue or a closed writer both count as a failed delivery.
    pub fn try_send(&self, message: ServerMessage) -> Result<()> {
        self.outbound_tx.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => WordChainError::Network(NetworkError::WriteBufferFull),
            TrySendError::Closed(_) => WordChainError::Network(NetworkError::ConnectionClosed),
        })
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("state", &self.state())
            .field("username", &self.username())
            .finish()
    }
}

/// Thread-safe session registry
pub struct SessionManager {
    /// Map of connection ID to session
    sessions: DashMap<ConnectionId, Arc<Session>>,
    /// Map of IP address to list of connection IDs (for connection limiting)
    ip_to_sessions: DashMap<String, Vec<ConnectionId>>,
    /// Next connection ID to assign
    next_id: AtomicU64,
    /// Maximum sessions per IP
    max_per_ip: usize,
}

impl SessionManager {
    /// Create a session manager with the default per-IP limit
    pub fn new() -> Self {
        Self::with_limit(10)
    }

    /// Create a session manager with a custom per-IP limit
    pub fn with_limit(max_per_ip: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            ip_to_sessions: DashMap::new(),
            next_id: AtomicU64::new(1),
            max_per_ip,
        }
    }

    /// Register a new connection and its outbound channel
    pub fn create_session(
        &self,
        address: SocketAddr,
        outbound_tx: mpsc::Sender<ServerMessage>,
    ) -> Result<Arc<Session>> {
        let ip = address.ip().to_string();

        // Check connection limit per IP
        let current_count = self.ip_to_sessions.get(&ip).map(|v| v.len()).unwrap_or(0);

        if current_count >= self.max_per_ip {
            warn!(
                ip = %ip,
                count = current_count,
                max = self.max_per_ip,
                "Connection limit exceeded for IP"
            );
            return Err(WordChainError::Network(NetworkError::TooManyConnections(
                ip,
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let session = Arc::new(Session::new(id, address, outbound_tx));

        self.sessions.insert(id, session.clone());
        self.ip_to_sessions.entry(ip).or_default().push(id);

        info!(session_id = id, address = %address, "Session created");

        Ok(session)
    }

    /// Get a session by ID
    pub fn get(&self, id: ConnectionId) -> Option<Arc<Session>> {
        self.sessions.get(&id).map(|r| r.clone())
    }

    /// Queue a message for one connection
    pub fn send(&self, id: ConnectionId, message: ServerMessage) -> Result<()> {
        let session = self
            .get(id)
            .ok_or(WordChainError::Network(NetworkError::ConnectionNotFound(id)))?;
        session.try_send(message)
    }

    /// Remove a session
    pub fn remove(&self, id: ConnectionId) {
        if let Some((_, session)) = self.sessions.remove(&id) {
            session.set_state(SessionState::Disconnecting);
            session.closed.notify_one();

            let ip = session.ip();
            if let Some(mut sessions) = self.ip_to_sessions.get_mut(&ip) {
                sessions.retain(|&sid| sid != id);
            }

            // Clean up empty IP entries
            self.ip_to_sessions.retain(|_, v| !v.is_empty());

            info!(
                session_id = id,
                username = ?session.username(),
                "Session removed"
            );
        }
    }

    /// Drop every session; writer tasks end once their senders are gone
    pub fn disconnect_all(&self) {
        for id in self.session_ids() {
            self.remove(id);
        }
    }

    /// Get the count of active sessions
    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Get the count of sessions per state
    pub fn count_by_state(&self) -> HashMap<SessionState, usize> {
        let mut counts = HashMap::new();
        for session in self.sessions.iter() {
            *counts.entry(session.state()).or_insert(0) += 1;
        }
        counts
    }

    /// Get list of all connection IDs
    pub fn session_ids(&self) -> Vec<ConnectionId> {
        self.sessions.iter().map(|r| *r.key()).collect()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_address() -> SocketAddr {
        "127.0.0.1:12345".parse().unwrap()
    }

    #[test]
    fn test_session_creation() {
        let (tx, _rx) = mpsc::channel(4);
        let session = Session::new(1, test_address(), tx);
        assert_eq!(session.id, 1);
        assert_eq!(session.state(), SessionState::Connected);
        assert!(session.is_active());
        assert!(session.username().is_none());
    }

    #[test]
    fn test_set_username_marks_playing() {
        let (tx, _rx) = mpsc::channel(4);
        let session = Session::new(1, test_address(), tx);
        session.set_username("ann".to_string());
        assert_eq!(session.state(), SessionState::Playing);
        assert_eq!(session.username().as_deref(), Some("ann"));
    }

    #[test]
    fn test_try_send_reports_full_and_closed() {
        let (tx, rx) = mpsc::channel(1);
        let session = Session::new(1, test_address(), tx);

        assert!(session.try_send(ServerMessage::Pong).is_ok());
        assert!(matches!(
            session.try_send(ServerMessage::Pong),
            Err(WordChainError::Network(NetworkError::WriteBufferFull))
        ));

        drop(rx);
        assert!(matches!(
            session.try_send(ServerMessage::Pong),
            Err(WordChainError::Network(NetworkError::ConnectionClosed))
        ));
    }

    #[tokio::test]
    async fn test_manager_send_delivers() {
        let manager = SessionManager::new();
        let (tx, mut rx) = mpsc::channel(4);
        let session = manager.create_session(test_address(), tx).unwrap();

        manager.send(session.id, ServerMessage::Pong).unwrap();
        assert_eq!(rx.recv().await, Some(ServerMessage::Pong));
    }

    #[test]
    fn test_manager_send_unknown() {
        let manager = SessionManager::new();
        assert!(matches!(
            manager.send(99, ServerMessage::Pong),
            Err(WordChainError::Network(NetworkError::ConnectionNotFound(99)))
        ));
    }

    #[test]
    fn test_manager_remove() {
        let manager = SessionManager::new();
        let (tx, _rx) = mpsc::channel(4);
        let session = manager.create_session(test_address(), tx).unwrap();
        let id = session.id;

        manager.remove(id);

        assert!(manager.get(id).is_none());
        assert_eq!(manager.count(), 0);
        assert_eq!(session.state(), SessionState::Disconnecting);
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn test_remove_wakes_closed_waiter() {
        let manager = SessionManager::new();
        let (tx, _rx) = mpsc::channel(4);
        let session = manager.create_session(test_address(), tx).unwrap();

        // A removal before anyone waits is still observed
        manager.remove(session.id);

        tokio::time::timeout(std::time::Duration::from_secs(1), session.closed())
            .await
            .expect("closed() should resolve after removal");
    }

    #[test]
    fn test_manager_ip_limit() {
        let manager = SessionManager::with_limit(2);
        let addr1: SocketAddr = "192.168.1.1:12345".parse().unwrap();
        let addr2: SocketAddr = "192.168.1.1:12346".parse().unwrap();
        let addr3: SocketAddr = "192.168.1.1:12347".parse().unwrap();
        let (tx, _rx) = mpsc::channel(4);

        assert!(manager.create_session(addr1, tx.clone()).is_ok());
        let second = manager.create_session(addr2, tx.clone()).unwrap();
        assert!(manager.create_session(addr3, tx.clone()).is_err());

        // Freeing a slot lets the next connection in
        manager.remove(second.id);
        assert!(manager.create_session(addr3, tx).is_ok());
    }

    #[test]
    fn test_count_by_state() {
        let manager = SessionManager::new();
        let (tx, _rx) = mpsc::channel(4);

        let s1 = manager
            .create_session("127.0.0.1:1".parse().unwrap(), tx.clone())
            .unwrap();
        manager
            .create_session("127.0.0.1:2".parse().unwrap(), tx)
            .unwrap();
        s1.set_username("ann".to_string());

        let counts = manager.count_by_state();
        assert_eq!(counts.get(&SessionState::Playing), Some(&1));
        assert_eq!(counts.get(&SessionState::Connected), Some(&1));
    }
}
