use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::sync::Mutex as AsyncMutex;

/// Identity of a cached provider call: the operation name plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallKey {
    op: &'static str,
    args: Vec<String>,
}

impl CallKey {
    pub fn new<I, S>(op: &'static str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CallKey { op, args: args.into_iter().map(Into::into).collect() }
    }
}

type Gates = HashMap<CallKey, Arc<AsyncMutex<()>>>;

/// Memoizes provider responses until explicitly invalidated.
///
/// Clones share the same underlying storage.
pub struct CallCache<V> {
    entries: Arc<Mutex<HashMap<CallKey, V>>>,
    /// One gate per key being fetched; concurrent misses queue behind it.
    active: Arc<Mutex<Gates>>,
}

impl<V> Clone for CallCache<V> {
    fn clone(&self) -> Self {
        CallCache {
            entries: Arc::clone(&self.entries),
            active: Arc::clone(&self.active),
        }
    }
}

impl<V> Default for CallCache<V> {
    fn default() -> Self {
        CallCache {
            entries: Arc::new(Mutex::new(HashMap::new())),
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<V: Clone> CallCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CallKey) -> Option<V> {
        let hit = self.lock().get(key).cloned();
        match hit {
            Some(_) => tracing::trace!("Cache hit for {}{:?}", key.op, key.args),
            None => tracing::trace!("Cache miss for {}{:?}", key.op, key.args),
        }
        hit
    }

    pub fn insert(&self, key: CallKey, value: V) {
        self.lock().insert(key, value);
    }

    /// Returns the cached value or runs `fetch` to fill it.
    ///
    /// At most one `fetch` per key runs at a time: callers that miss while
    /// another fetch for the key is running wait for it and then read its
    /// result from the cache. Errors are not cached, so a waiter whose
    /// predecessor failed fetches again.
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: CallKey, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        let gate = Arc::clone(lock(&self.active).entry(key.clone()).or_default());
        let _turn = gate.lock().await;
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        let result = fetch().await;
        if let Ok(value) = &result {
            self.insert(key.clone(), value.clone());
        }
        lock(&self.active).remove(&key);
        result
    }

    /// Drops one entry. Returns `false` if it was not cached.
    pub fn invalidate(&self, key: &CallKey) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CallKey, V>> {
        lock(&self.entries)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
