//! Signed-in user lookup, cached in client storage

use crate::api::{ApiClient, Envelope, User};
use crate::errors::Result;
use crate::storage::TtlStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Storage key of the cached session user.
pub const CURRENT_USER_KEY: &str = "current_user";

#[derive(Debug, Clone)]
pub struct SessionBootstrap {
    client: ApiClient,
    store: Arc<TtlStore>,
    ttl: Duration,
}

impl SessionBootstrap {
    pub fn new(client: ApiClient, store: Arc<TtlStore>, ttl: Duration) -> Self {
        Self { client, store, ttl }
    }

    /// Cached user, if one is stored and still fresh
    pub fn cached_user(&self) -> Option<User> {
        match self.store.get::<User>(CURRENT_USER_KEY) {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "ignoring unreadable cached user");
                None
            }
        }
    }

    /// The signed-in user: from storage when fresh, otherwise fetched from
    /// `/api/user/current/` and cached for the session TTL.
    pub async fn current_user(&self) -> Result<User> {
        if let Some(user) = self.cached_user() {
            debug!(username = %user.username, "session user from storage");
            return Ok(user);
        }

        let url = self.client.api_url("/user/current/");
        let envelope: Envelope<User> = self.client.get(&url, &Vec::new()).await?;
        let user = envelope.data;
        if let Err(e) = self.store.set(CURRENT_USER_KEY, &user, Some(self.ttl)) {
            warn!(error = %e, "session user not cached");
        }
        info!(username = %user.username, "session user loaded");
        Ok(user)
    }

    /// Drop the cached user
    pub fn forget(&self) -> Result<bool> {
        self.store.delete(CURRENT_USER_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Method, MockTransport};
    use serde_json::json;

    const CURRENT: &str = "http://site/api/user/current/";

    fn setup() -> (Arc<MockTransport>, Arc<TtlStore>, SessionBootstrap) {
        let transport = Arc::new(MockTransport::new());
        let store = Arc::new(TtlStore::new());
        let client = ApiClient::new(transport.clone(), "http://site").unwrap();
        let session = SessionBootstrap::new(client, store.clone(), Duration::from_secs(60));
        (transport, store, session)
    }

    #[tokio::test]
    async fn test_fetches_and_caches_user() {
        let (transport, store, session) = setup();
        transport.respond(
            Method::Get,
            CURRENT,
            200,
            json!({"data": {"_id": "7", "username": "rin"}}),
        );

        let user = session.current_user().await.unwrap();
        assert_eq!(user.username, "rin");
        assert!(store.ttl(CURRENT_USER_KEY).unwrap() <= Duration::from_secs(60));

        // second lookup is served from storage
        let again = session.current_user().await.unwrap();
        assert_eq!(again, user);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_uses_preexisting_cache() {
        let (transport, store, session) = setup();
        store
            .set(CURRENT_USER_KEY, &json!({"_id": "1", "username": "kai"}), None)
            .unwrap();
        assert_eq!(session.current_user().await.unwrap().username, "kai");
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_failed_lookup_is_not_cached() {
        let (transport, store, session) = setup();
        transport.respond(Method::Get, CURRENT, 401, json!({"message": "Unauthorized"}));
        assert!(session.current_user().await.is_err());
        assert!(store.keys().is_empty());
    }

    #[tokio::test]
    async fn test_unwritable_storage_still_returns_user() {
        let dir = tempfile::TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let store = Arc::new(TtlStore::open(blocker.join("store.json")).unwrap());

        let transport = Arc::new(MockTransport::new());
        transport.respond(
            Method::Get,
            CURRENT,
            200,
            json!({"data": {"_id": "7", "username": "rin"}}),
        );
        let client = ApiClient::new(transport.clone(), "http://site").unwrap();
        let session = SessionBootstrap::new(client, store, Duration::from_secs(60));

        assert_eq!(session.current_user().await.unwrap().username, "rin");
    }

    #[tokio::test]
    async fn test_corrupt_cache_refetches() {
        let (transport, store, session) = setup();
        store.set(CURRENT_USER_KEY, &"garbage", None).unwrap();
        transport.respond(Method::Get, CURRENT, 200, json!({"data": {"username": "rin"}}));
        assert_eq!(session.current_user().await.unwrap().username, "rin");
        assert!(session.forget().unwrap());
        assert!(session.cached_user().is_none());
    }
}
