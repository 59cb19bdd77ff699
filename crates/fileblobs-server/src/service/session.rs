//! Server-side session store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use jiff::{SignedDuration, Timestamp};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::extract::Principal;

/// Tracing target for session bookkeeping.
const TRACING_TARGET: &str = "fileblobs_server::service::session";

#[derive(Debug, Clone)]
struct Session {
    principal: Principal,
    expires_at: Timestamp,
}

/// Sessions keyed by the random identifier stored in the `session_id` cookie.
#[derive(Debug, Clone)]
pub struct SessionStore {
    ttl: SignedDuration,
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
}

impl SessionStore {
    /// Creates an empty store whose sessions expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: SignedDuration::try_from(ttl).unwrap_or(SignedDuration::MAX),
            sessions: Arc::default(),
        }
    }

    /// Starts a session for `principal` and returns its identifier.
    ///
    /// Expired sessions are purged on the way.
    pub async fn create(&self, principal: Principal) -> Uuid {
        let now = Timestamp::now();
        let expires_at = now.saturating_add(self.ttl).unwrap_or(Timestamp::MAX);
        let session_id = Uuid::new_v4();

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.expires_at > now);

        tracing::debug!(
            target: TRACING_TARGET,
            purged = before - sessions.len(),
            subject = %principal.subject,
            expires_at = %expires_at,
            "Created session"
        );

        sessions.insert(session_id, Session {
            principal,
            expires_at,
        });
        session_id
    }

    /// Returns the principal of a live session.
    pub async fn get(&self, session_id: Uuid) -> Option<Principal> {
        let now = Timestamp::now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(&session_id) {
                Some(session) if session.expires_at > now => {
                    return Some(session.principal.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }

        self.remove(session_id).await;
        None
    }

    /// Drops a session; unknown identifiers are ignored.
    pub async fn remove(&self, session_id: Uuid) {
        if self.sessions.write().await.remove(&session_id).is_some() {
            tracing::debug!(target: TRACING_TARGET, "Removed session");
        }
    }

    /// Returns the number of stored sessions, expired ones included.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn session_lifecycle() {
        let store = SessionStore::new(Duration::from_secs(60));
        let id = store.create(Principal::local("ann", false)).await;

        let principal = store.get(id).await;
        assert_eq!(principal.map(|p| p.subject), Some("ann".to_owned()));
        assert!(store.get(Uuid::new_v4()).await.is_none());

        store.remove(id).await;
        assert!(store.get(id).await.is_none());
    }

    #[tokio::test]
    async fn expired_sessions_are_dropped() {
        let store = SessionStore::new(Duration::from_millis(10));
        let id = store.create(Principal::local("ann", false)).await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(store.get(id).await.is_none());
        assert_eq!(store.count().await, 0);

        store.create(Principal::local("bob", false)).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        store.create(Principal::local("cy", false)).await;
        assert_eq!(store.count().await, 1);
    }
}
