use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Per-contact mutex registry. Webhook deliveries for the same contact are
/// processed one at a time; different contacts proceed concurrently.
#[derive(Default)]
pub struct ContactLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ContactLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_for(&self, contact_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().expect("lock registry poisoned");
        Arc::clone(map.entry(contact_id.to_owned()).or_default())
    }
}
