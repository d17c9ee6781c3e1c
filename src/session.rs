use log::{debug, info};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::error::AnalysisError;
use crate::table::Table;

/// An uploaded sheet held for later analysis requests
///
/// The table and the lists derived from it are fixed at upload time; a new
/// upload creates a new session instead of mutating this one.
#[derive(Debug)]
pub struct Session {
    pub table: Table,
    pub modules: Vec<String>,
    pub statuses: Vec<String>,
    pub filename: String,
    pub created_at: SystemTime,
}

impl Session {
    pub fn new(filename: &str, table: Table) -> Self {
        Session {
            modules: table.modules(),
            statuses: table.statuses(),
            table,
            filename: filename.to_string(),
            created_at: SystemTime::now(),
        }
    }

    fn is_expired(&self, ttl: Option<Duration>, now: SystemTime) -> bool {
        match ttl {
            Some(ttl) => now
                .duration_since(self.created_at)
                .map(|age| age > ttl)
                .unwrap_or(false),
            None => false,
        }
    }
}

/// In-process store of uploaded sheets keyed by opaque token
///
/// Sessions are handed out as `Arc`s and never mutated, so a running
/// analysis keeps its table even if the token is replaced meanwhile.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    ttl: Option<Duration>,
}

impl SessionStore {
    /// `ttl` of `None` keeps sessions until they are replaced or evicted.
    pub fn new(ttl: Option<Duration>) -> Self {
        SessionStore {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Stores a session under a fresh token and returns the token.
    pub fn create(&self, session: Session) -> String {
        let token = Uuid::new_v4().simple().to_string();
        info!(
            "session {} created from {} ({} records)",
            token,
            session.filename,
            session.table.len()
        );
        self.write().insert(token.clone(), Arc::new(session));
        token
    }

    /// Looks a token up. Expired sessions are evicted and reported as unknown.
    pub fn get(&self, token: &str) -> Result<Arc<Session>, AnalysisError> {
        let found = self.read().get(token).cloned();
        match found {
            Some(session) if session.is_expired(self.ttl, SystemTime::now()) => {
                self.evict(token);
                Err(AnalysisError::UnknownSession(token.to_string()))
            }
            Some(session) => Ok(session),
            None => Err(AnalysisError::UnknownSession(token.to_string())),
        }
    }

    /// Swaps the session behind an existing token, returning the old one.
    pub fn replace(&self, token: &str, session: Session) -> Result<Arc<Session>, AnalysisError> {
        let mut sessions = self.write();
        match sessions.get_mut(token) {
            Some(slot) => Ok(std::mem::replace(slot, Arc::new(session))),
            None => Err(AnalysisError::UnknownSession(token.to_string())),
        }
    }

    pub fn evict(&self, token: &str) -> Option<Arc<Session>> {
        let removed = self.write().remove(token);
        if removed.is_some() {
            debug!("session {} evicted", token);
        }
        removed
    }

    /// Drops every session older than the TTL; returns how many were dropped.
    pub fn evict_expired(&self) -> usize {
        let now = SystemTime::now();
        let mut sessions = self.write();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(self.ttl, now));
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A poisoned lock only means another request panicked mid-insert; the map
    // itself is still consistent.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<Session>>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<Session>>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, Record};

    fn session(title: &str) -> Session {
        Session::new(
            "defects.xlsx",
            Table::new(
                [Column::Title, Column::Module],
                vec![Record::new(title).with_module("用户模块"), Record::new("x")],
            ),
        )
    }

    #[test]
    fn create_then_get_returns_same_table() {
        let store = SessionStore::new(None);
        let token = store.create(session("a"));
        let found = store.get(&token).unwrap();
        assert_eq!(found.table.records()[0].title.as_deref(), Some("a"));
        assert_eq!(found.modules, vec!["(empty)", "用户模块"]);
    }

    #[test]
    fn unknown_token_is_rejected() {
        let store = SessionStore::new(None);
        assert!(matches!(
            store.get("nope"),
            Err(AnalysisError::UnknownSession(t)) if t == "nope"
        ));
    }

    #[test]
    fn replace_keeps_token_and_old_handle() {
        let store = SessionStore::new(None);
        let token = store.create(session("old"));
        let held = store.get(&token).unwrap();

        let previous = store.replace(&token, session("new")).unwrap();
        assert!(Arc::ptr_eq(&held, &previous));
        assert_eq!(held.table.records()[0].title.as_deref(), Some("old"));
        assert_eq!(
            store.get(&token).unwrap().table.records()[0].title.as_deref(),
            Some("new")
        );
        assert!(store.replace("missing", session("x")).is_err());
    }

    #[test]
    fn expired_sessions_are_dropped() {
        let store = SessionStore::new(Some(Duration::ZERO));
        let token = store.create(session("a"));
        std::thread::sleep(Duration::from_millis(5));

        assert!(store.get(&token).is_err());
        assert!(store.is_empty());

        store.create(session("b"));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.evict_expired(), 1);
    }
}
