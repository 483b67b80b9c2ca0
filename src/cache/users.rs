use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::OnceCell;

use crate::model::user::UserProfile;

struct Entry {
    cell: Arc<OnceCell<UserProfile>>,
    created: Instant,
}

/// Lazily populated user-id → profile cache.
///
/// Each user id owns one `OnceCell`; concurrent lookups of the same id await
/// the same fetch instead of issuing their own. Entries older than the TTL are
/// replaced on next access.
pub struct UserCache {
    ttl: Option<Duration>,
    entries: Mutex<HashMap<String, Entry>>,
}

impl UserCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn is_fresh(&self, entry: &Entry) -> bool {
        self.ttl.map_or(true, |ttl| entry.created.elapsed() < ttl)
    }

    pub async fn get_or_fetch<F, Fut>(&self, user_id: &str, fetch: F) -> Result<UserProfile>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<UserProfile>>,
    {
        let cell = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            match entries.get(user_id).filter(|e| self.is_fresh(e)) {
                Some(entry) => entry.cell.clone(),
                None => {
                    let cell = Arc::new(OnceCell::new());
                    entries.insert(
                        user_id.to_string(),
                        Entry {
                            cell: cell.clone(),
                            created: Instant::now(),
                        },
                    );
                    cell
                }
            }
        };

        cell.get_or_try_init(fetch).await.cloned()
    }

    /// Cached profile, if present and not expired.
    pub fn get(&self, user_id: &str) -> Option<UserProfile> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(user_id)
            .filter(|e| self.is_fresh(e))
            .and_then(|e| e.cell.get().cloned())
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.values().filter(|e| e.cell.initialized()).count()
    }
}
