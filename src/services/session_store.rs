use std::collections::HashMap;

use parking_lot::RwLock;

/// Maps a principal to its single current refresh token.
///
/// Implementations must make every operation atomic per principal: once a
/// `put` or a successful `replace_if_current` lands, comparisons against the
/// previous value fail. A multi-instance deployment plugs in a shared
/// backend here.
pub trait SessionStore: Send + Sync {
    /// Records `refresh_token` as current, overwriting any previous one.
    fn put(&self, principal_id: &str, refresh_token: String);

    fn get(&self, principal_id: &str) -> Option<String>;

    /// True iff `candidate` is the currently stored token.
    fn cas_compare(&self, principal_id: &str, candidate: &str) -> bool;

    /// Installs `replacement` only if `expected` is still current.
    fn replace_if_current(&self, principal_id: &str, expected: &str, replacement: String) -> bool;
}

/// Process-local store. Entries live until overwritten or process exit.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, String>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn put(&self, principal_id: &str, refresh_token: String) {
        self.sessions
            .write()
            .insert(principal_id.to_string(), refresh_token);
    }

    fn get(&self, principal_id: &str) -> Option<String> {
        self.sessions.read().get(principal_id).cloned()
    }

    fn cas_compare(&self, principal_id: &str, candidate: &str) -> bool {
        self.sessions
            .read()
            .get(principal_id)
            .is_some_and(|current| current == candidate)
    }

    fn replace_if_current(&self, principal_id: &str, expected: &str, replacement: String) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.get_mut(principal_id) {
            Some(current) if current == expected => {
                *current = replacement;
                true
            }
            _ => false,
        }
    }
}
