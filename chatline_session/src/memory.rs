use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chatline_core::{PersistenceAdapter, PersistenceError};
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    lists: HashMap<String, Vec<String>>,
    /// Only kept by [`InMemoryPersistence::recording`].
    writes: Option<Vec<(String, Vec<String>)>>,
}

/// Process-local adapter. Nothing survives a restart.
///
/// Can be told to fail writes, and [`InMemoryPersistence::recording`] also
/// logs every successful `set_list`.
#[derive(Default)]
pub struct InMemoryPersistence {
    inner: RwLock<Inner>,
    fail_writes: AtomicBool,
}

impl InMemoryPersistence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Like `new`, but keeps a copy of every successful write.
    #[must_use]
    pub fn recording() -> Self {
        Self {
            inner: RwLock::new(Inner {
                lists: HashMap::new(),
                writes: Some(Vec::new()),
            }),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Seed one key before the adapter is shared.
    #[must_use]
    pub fn with_list(self, key: impl Into<String>, values: Vec<String>) -> Self {
        let mut inner = self.inner.into_inner();
        inner.lists.insert(key.into(), values);
        Self {
            inner: RwLock::new(inner),
            fail_writes: self.fail_writes,
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Every successful write in order, as `(key, values)`. Empty unless
    /// the adapter was created with `recording`.
    pub async fn writes(&self) -> Vec<(String, Vec<String>)> {
        self.inner.read().await.writes.clone().unwrap_or_default()
    }

    pub async fn write_count(&self) -> usize {
        self.inner.read().await.writes.as_ref().map_or(0, Vec::len)
    }
}

#[async_trait]
impl PersistenceAdapter for InMemoryPersistence {
    async fn get_list(&self, key: &str) -> Result<Vec<String>, PersistenceError> {
        Ok(self
            .inner
            .read()
            .await
            .lists
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_list(&self, key: &str, values: &[String]) -> Result<(), PersistenceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::Backend("write rejected".to_string()));
        }

        let mut inner = self.inner.write().await;
        inner.lists.insert(key.to_string(), values.to_vec());
        if let Some(writes) = inner.writes.as_mut() {
            writes.push((key.to_string(), values.to_vec()));
        }
        Ok(())
    }
}
