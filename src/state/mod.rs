//! Process-wide shared chat state

use crate::group::GroupDirectory;
use crate::registry::SessionRegistry;
use crate::storage::ChatStore;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Everything the router and command handlers mutate, guarded by one coarse
/// lock. Registration, admission, membership changes, pending-buffer writes
/// and broadcast fan-out all happen while holding it.
pub struct ChatState {
    pub registry: SessionRegistry,
    pub groups: GroupDirectory,
    pub store: ChatStore,
}

/// Shared handle to [`ChatState`].
pub type SharedState = Arc<Mutex<ChatState>>;

impl ChatState {
    pub fn new(store: ChatStore) -> Self {
        Self {
            registry: SessionRegistry::new(),
            groups: GroupDirectory::new(),
            store,
        }
    }

    pub fn shared(store: ChatStore) -> SharedState {
        Arc::new(Mutex::new(Self::new(store)))
    }
}
