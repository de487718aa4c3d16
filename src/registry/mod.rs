//! Session registry - tracks every connected participant
//!
//! Sessions live in an append-only arena and are referenced exclusively by
//! their [`SessionId`] index. Indices are never reused: a fully-disconnected
//! session is tombstoned in place, so a stale handle can only ever miss, not
//! alias a newer session.

use crate::server::ClientConnection;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Stable handle to a session, valid for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(usize);

impl SessionId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One connected, named participant.
pub struct Session {
    /// Display name, unique among occupied sessions
    pub name: String,

    /// The group currently receiving this session's live broadcasts.
    /// `None` means fully disconnected.
    pub active_group: Option<String>,

    /// Transport handle for delivering text
    pub conn: ClientConnection,

    /// Messages accumulated per group while the session was tuned
    /// elsewhere. Never holds an entry for the active group.
    pub pending: HashMap<String, String>,
}

impl Session {
    /// Append text to the pending buffer for `group`.
    pub fn buffer_pending(&mut self, group: &str, text: &str) {
        self.pending.entry(group.to_string()).or_default().push_str(text);
    }

    /// Remove and return the pending buffer for `group`, if any.
    pub fn take_pending(&mut self, group: &str) -> Option<String> {
        self.pending.remove(group)
    }
}

enum SessionSlot {
    Occupied(Session),
    Cleared,
}

/// Arena of all sessions ever registered, plus a connection index.
#[derive(Default)]
pub struct SessionRegistry {
    slots: Vec<SessionSlot>,
    by_conn: HashMap<Uuid, SessionId>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session for a connection. Idempotent: a connection that
    /// already has a session gets its existing handle back.
    pub fn register(&mut self, name: &str, group: &str, conn: ClientConnection) -> SessionId {
        if let Some(&existing) = self.by_conn.get(&conn.id()) {
            tracing::debug!("Connection {} already registered as {}", conn.id(), existing);
            return existing;
        }

        let id = SessionId(self.slots.len());
        self.by_conn.insert(conn.id(), id);
        self.slots.push(SessionSlot::Occupied(Session {
            name: name.to_string(),
            active_group: Some(group.to_string()),
            conn,
            pending: HashMap::new(),
        }));
        id
    }

    /// Look up a live session by handle. A miss means "disconnected or
    /// never created", not an error.
    pub fn get(&self, id: SessionId) -> Option<&Session> {
        match self.slots.get(id.0) {
            Some(SessionSlot::Occupied(session)) => Some(session),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        match self.slots.get_mut(id.0) {
            Some(SessionSlot::Occupied(session)) => Some(session),
            _ => None,
        }
    }

    /// Handle of the session owned by a connection, if it has one.
    pub fn find_by_conn(&self, conn_id: Uuid) -> Option<SessionId> {
        self.by_conn.get(&conn_id).copied().filter(|&id| self.get(id).is_some())
    }

    /// Tombstone a session. Its handle stays allocated and permanently
    /// inert; the connection itself is closed by its owning task.
    pub fn clear(&mut self, id: SessionId) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            if let SessionSlot::Occupied(session) = slot {
                self.by_conn.remove(&session.conn.id());
                *slot = SessionSlot::Cleared;
            }
        }
    }

    /// Case-sensitive exact match against all occupied sessions.
    pub fn is_name_taken(&self, name: &str) -> bool {
        self.occupied().any(|(_, s)| s.name == name)
    }

    /// All live sessions with their handles.
    pub fn occupied(&self) -> impl Iterator<Item = (SessionId, &Session)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| match slot {
            SessionSlot::Occupied(session) => Some((SessionId(i), session)),
            SessionSlot::Cleared => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn test_conn() -> ClientConnection {
        let (tx, _rx) = mpsc::channel(8);
        ClientConnection::new(tx)
    }

    #[test]
    fn register_is_idempotent_per_connection() {
        let mut registry = SessionRegistry::new();
        let conn = test_conn();

        let a = registry.register("alice", "global", conn.clone());
        let b = registry.register("alice", "global", conn);
        assert_eq!(a, b);
        assert_eq!(registry.occupied().count(), 1);
    }

    #[test]
    fn handles_are_never_reused() {
        let mut registry = SessionRegistry::new();
        let first = registry.register("alice", "global", test_conn());
        registry.clear(first);

        let second = registry.register("bob", "global", test_conn());
        assert_ne!(first.index(), second.index());
        assert!(registry.get(first).is_none());
        assert_eq!(registry.get(second).unwrap().name, "bob");
    }

    #[test]
    fn cleared_connection_can_reregister() {
        let mut registry = SessionRegistry::new();
        let conn = test_conn();
        let first = registry.register("alice", "global", conn.clone());
        registry.clear(first);

        assert!(registry.find_by_conn(conn.id()).is_none());
        let second = registry.register("alice", "global", conn.clone());
        assert_ne!(first, second);
        assert_eq!(registry.find_by_conn(conn.id()), Some(second));
    }

    #[test]
    fn name_scan_is_case_sensitive() {
        let mut registry = SessionRegistry::new();
        registry.register("Alice", "global", test_conn());

        assert!(registry.is_name_taken("Alice"));
        assert!(!registry.is_name_taken("alice"));
    }

    #[test]
    fn pending_buffer_accumulates_and_drains_once() {
        let mut registry = SessionRegistry::new();
        let id = registry.register("alice", "global", test_conn());
        let session = registry.get_mut(id).unwrap();

        session.buffer_pending("news", "one\n");
        session.buffer_pending("news", "two\n");
        assert_eq!(session.take_pending("news").unwrap(), "one\ntwo\n");
        assert!(session.take_pending("news").is_none());
    }
}
