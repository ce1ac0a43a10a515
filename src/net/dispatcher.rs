//! Game dispatcher module
//!
//! A single task owns the `GameSession` and applies inbound events one at a
//! time, so no two joins, words or disconnects ever interleave. Directives
//! coming back from the session are delivered through the `SessionManager`:
//! - sends never block; a full or closed queue is a failed delivery
//! - a failed delivery never stops delivery to the other connections
//! - each failed connection is dropped and then disconnected from the game
//!   through the same path as a normal disconnect

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use crate::error::{NetworkError, Result, WordChainError};
use crate::game::player::ConnectionId;
use crate::game::room::RoomState;
use crate::game::session::{Directive, Event, GameSession};
use crate::net::session::SessionManager;
use crate::protocol::ServerMessage;

/// Message accepted by the dispatcher task
#[derive(Debug)]
pub enum InboundEvent {
    /// A game event from one connection
    Game {
        connection: ConnectionId,
        event: Event,
    },
    /// Request a copy of the current room state
    Snapshot { reply: oneshot::Sender<RoomState> },
}

/// Cloneable sender side of the dispatcher
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<InboundEvent>,
}

impl DispatcherHandle {
    /// Queue a game event
    pub async fn send(&self, connection: ConnectionId, event: Event) -> Result<()> {
        self.tx
            .send(InboundEvent::Game { connection, event })
            .await
            .map_err(|_| WordChainError::Network(NetworkError::DispatcherUnavailable))
    }

    /// Fetch the current room state
    pub async fn snapshot(&self) -> Result<RoomState> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(InboundEvent::Snapshot { reply })
            .await
            .map_err(|_| WordChainError::Network(NetworkError::DispatcherUnavailable))?;
        rx.await
            .map_err(|_| WordChainError::Network(NetworkError::DispatcherUnavailable))
    }
}

/// Owner of the game session
pub struct GameDispatcher {
    session: GameSession,
    sessions: Arc<SessionManager>,
    events_rx: mpsc::Receiver<InboundEvent>,
}

impl GameDispatcher {
    /// Create a dispatcher and the handle used to feed it
    pub fn new(
        session: GameSession,
        sessions: Arc<SessionManager>,
        buffer: usize,
    ) -> (Self, DispatcherHandle) {
        let (tx, events_rx) = mpsc::channel(buffer);
        let dispatcher = Self {
            session,
            sessions,
            events_rx,
        };
        (dispatcher, DispatcherHandle { tx })
    }

    /// Read access to the game session
    pub fn session(&self) -> &GameSession {
        &self.session
    }

    /// Process events until every handle is dropped or shutdown is signalled
    pub async fn run(mut self, shutdown_rx: &mut broadcast::Receiver<()>) {
        info!("Game dispatcher started");

        loop {
            tokio::select! {
                inbound = self.events_rx.recv() => {
                    match inbound {
                        Some(InboundEvent::Game { connection, event }) => {
                            self.process(connection, event);
                        }
                        Some(InboundEvent::Snapshot { reply }) => {
                            let _ = reply.send(self.session.state());
                        }
                        None => {
                            debug!("All dispatcher handles dropped");
                            break;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Game dispatcher shutting down");
                    break;
                }
            }
        }

        info!(
            players = self.session.room().player_count(),
            words = self.session.room().used_words().len(),
            "Game dispatcher stopped"
        );
    }

    /// Apply one event and deliver everything it produces.
    ///
    /// Connections that fail delivery are disconnected afterwards, which may
    /// produce further broadcasts; those are delivered the same way.
    pub fn process(&mut self, connection: ConnectionId, event: Event) {
        let mut pending = VecDeque::from([(connection, event)]);

        while let Some((connection, event)) = pending.pop_front() {
            trace!(connection, event = ?event, "Processing event");
            let directives = self.session.handle(connection, event);

            for failed in self.deliver(directives) {
                pending.push_back((failed, Event::Disconnect));
            }
        }
    }

    /// Deliver directives, returning the connections that could not be reached
    fn deliver(&self, directives: Vec<Directive>) -> Vec<ConnectionId> {
        let mut failed = Vec::new();

        for directive in directives {
            match directive {
                Directive::Send { to, message } => {
                    if let ServerMessage::JoinSuccess { username, .. } = &message {
                        if let Some(session) = self.sessions.get(to) {
                            session.set_username(username.clone());
                        }
                    }
                    self.deliver_one(to, message, &mut failed);
                }
                Directive::Broadcast { message } => {
                    for to in self.session.connections() {
                        self.deliver_one(to, message.clone(), &mut failed);
                    }
                }
            }
        }

        failed
    }

    fn deliver_one(
        &self,
        to: ConnectionId,
        message: ServerMessage,
        failed: &mut Vec<ConnectionId>,
    ) {
        if failed.contains(&to) {
            return;
        }

        let kind = message.kind();
        match self.sessions.send(to, message) {
            Ok(()) => trace!(connection = to, kind, "Message queued"),
            Err(e) => {
                warn!(connection = to, kind, error = %e, "Delivery failed, dropping connection");
                self.sessions.remove(to);
                failed.push(to);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;
    use crate::game::dictionary::WordList;
    use std::net::SocketAddr;

    struct Harness {
        dispatcher: GameDispatcher,
        sessions: Arc<SessionManager>,
    }

    impl Harness {
        fn new() -> Self {
            let sessions = Arc::new(SessionManager::new());
            let session = GameSession::new(Arc::new(WordList::builtin()));
            let (dispatcher, _handle) = GameDispatcher::new(session, sessions.clone(), 16);
            Self {
                dispatcher,
                sessions,
            }
        }

        fn connect(
            &self,
            port: u16,
            buffer: usize,
        ) -> (ConnectionId, mpsc::Receiver<ServerMessage>) {
            let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
            let (tx, rx) = mpsc::channel(buffer);
            let session = self.sessions.create_session(addr, tx).unwrap();
            (session.id, rx)
        }

        fn join(&mut self, connection: ConnectionId, name: &str) {
            self.dispatcher.process(
                connection,
                Event::Join {
                    username: name.to_string(),
                },
            );
        }
    }

    fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn last_state(messages: &[ServerMessage]) -> Option<&RoomState> {
        messages.iter().rev().find_map(|m| match m {
            ServerMessage::GameState(state) => Some(state),
            _ => None,
        })
    }

    #[test]
    fn test_join_reaches_joiner_and_room() {
        let mut h = Harness::new();
        let (ann, mut ann_rx) = h.connect(1, 16);
        let (bob, mut bob_rx) = h.connect(2, 16);

        h.join(ann, "ann");
        h.join(bob, "bob");

        let ann_msgs = drain(&mut ann_rx);
        // JOIN_SUCCESS, own join state, bob's join state, start state
        assert_eq!(ann_msgs.len(), 4);
        assert!(matches!(ann_msgs[0], ServerMessage::JoinSuccess { .. }));
        assert!(last_state(&ann_msgs).unwrap().game_started);

        let bob_msgs = drain(&mut bob_rx);
        assert_eq!(bob_msgs.len(), 3);
        assert!(matches!(bob_msgs[0], ServerMessage::JoinSuccess { .. }));

        assert_eq!(
            h.sessions.get(ann).unwrap().username().as_deref(),
            Some("ann")
        );
    }

    #[test]
    fn test_errors_go_to_sender_only() {
        let mut h = Harness::new();
        let (ann, mut ann_rx) = h.connect(1, 16);
        let (stranger, mut stranger_rx) = h.connect(2, 16);
        h.join(ann, "ann");
        drain(&mut ann_rx);

        h.join(stranger, "ann");

        assert_eq!(
            drain(&mut stranger_rx),
            vec![ServerMessage::error("Username already exists")]
        );
        assert!(drain(&mut ann_rx).is_empty());
    }

    #[test]
    fn test_unseated_connections_miss_broadcasts() {
        let mut h = Harness::new();
        let (ann, _ann_rx) = h.connect(1, 16);
        let (_watcher, mut watcher_rx) = h.connect(2, 16);

        h.join(ann, "ann");
        assert!(drain(&mut watcher_rx).is_empty());
    }

    #[test]
    fn test_closed_connection_is_disconnected_during_broadcast() {
        let mut h = Harness::new();
        let (ann, mut ann_rx) = h.connect(1, 16);
        let (bob, bob_rx) = h.connect(2, 16);
        h.join(ann, "ann");
        h.join(bob, "bob");
        drain(&mut ann_rx);

        // Bob's writer goes away without the transport noticing yet
        drop(bob_rx);
        h.dispatcher.process(
            ann,
            Event::SubmitWord {
                word: "apple".to_string(),
            },
        );

        let ann_msgs = drain(&mut ann_rx);
        assert!(matches!(ann_msgs[0], ServerMessage::WordAccepted { .. }));
        let state = last_state(&ann_msgs).unwrap();
        assert!(!state.game_started);
        assert_eq!(state.players.len(), 1);

        assert!(h.sessions.get(bob).is_none());
        assert_eq!(h.dispatcher.session().room().player_count(), 1);
    }

    #[test]
    fn test_full_queue_counts_as_failure() {
        let mut h = Harness::new();
        let (ann, mut ann_rx) = h.connect(1, 64);
        let (bob, _bob_rx) = h.connect(2, 64);
        let (cat, _cat_rx) = h.connect(3, 1);
        h.join(ann, "ann");
        h.join(bob, "bob");
        // Cat's single slot fills with JOIN_SUCCESS, the broadcast overflows
        h.join(cat, "cat");

        assert!(h.sessions.get(cat).is_none());
        let room = h.dispatcher.session().room();
        assert_eq!(room.turn_order(), &["ann".to_string(), "bob".to_string()]);
        assert!(room.is_started());
        assert!(room.check_invariants().is_ok());
        assert_eq!(last_state(&drain(&mut ann_rx)).unwrap().players.len(), 2);
    }

    #[test]
    fn test_early_failure_mid_broadcast_still_reaches_others() {
        let mut h = Harness::new();
        let (ann, mut ann_rx) = h.connect(1, 16);
        let (bob, _bob_rx) = h.connect(2, 16);
        let (cat, mut cat_rx) = h.connect(3, 16);
        h.join(bob, "bob");
        h.join(ann, "ann");
        h.join(cat, "cat");
        drain(&mut ann_rx);
        drain(&mut cat_rx);

        // Bob moves first; ann's writer dies before his word is broadcast
        drop(ann_rx);
        h.dispatcher.process(
            bob,
            Event::SubmitWord {
                word: "apple".to_string(),
            },
        );

        let cat_msgs = drain(&mut cat_rx);
        let states: Vec<&RoomState> = cat_msgs
            .iter()
            .filter_map(|m| match m {
                ServerMessage::GameState(state) => Some(state),
                _ => None,
            })
            .collect();
        // The word broadcast, then the one for ann's removal
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].total_words, 1);
        assert_eq!(states[0].players.len(), 3);
        assert_eq!(states[1].players.len(), 2);
        assert!(h.sessions.get(ann).is_none());
        assert!(h.sessions.get(cat).is_some());
    }

    #[test]
    fn test_malformed_frame_reply_goes_through_delivery() {
        let mut h = Harness::new();
        let (ann, ann_rx) = h.connect(1, 16);
        let (bob, mut bob_rx) = h.connect(2, 16);
        h.join(ann, "ann");
        h.join(bob, "bob");
        drain(&mut bob_rx);

        // The error reply cannot be delivered, so ann is disconnected
        drop(ann_rx);
        h.dispatcher.process(ann, Event::Malformed(ProtocolError::InvalidFormat));

        assert!(h.sessions.get(ann).is_none());
        let state = last_state(&drain(&mut bob_rx)).cloned().unwrap();
        assert_eq!(state.players.len(), 1);
        assert!(!state.game_started);
    }

    #[tokio::test]
    async fn test_run_serves_events_and_snapshots() {
        let sessions = Arc::new(SessionManager::new());
        let session = GameSession::new(Arc::new(WordList::builtin()));
        let (dispatcher, handle) = GameDispatcher::new(session, sessions.clone(), 16);
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let mut shutdown_rx = shutdown_tx.subscribe();
        let task = tokio::spawn(async move { dispatcher.run(&mut shutdown_rx).await });

        let (tx, mut rx) = mpsc::channel(16);
        let conn = sessions
            .create_session("127.0.0.1:9".parse().unwrap(), tx)
            .unwrap()
            .id;
        handle.send(conn, Event::Ping).await.unwrap();
        assert_eq!(rx.recv().await, Some(ServerMessage::Pong));

        handle
            .send(
                conn,
                Event::Join {
                    username: "ann".to_string(),
                },
            )
            .await
            .unwrap();
        let state = handle.snapshot().await.unwrap();
        assert_eq!(state.players.len(), 1);

        shutdown_tx.send(()).unwrap();
        task.await.unwrap();
        assert!(handle.send(conn, Event::Ping).await.is_err());
    }
}
