pub mod types;

pub use types::*;

use crate::Result;
use crate::protocols;
use crate::session::Session;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::trace;

type Slot = Arc<OnceCell<Arc<Packument>>>;

/// Session-wide packument cache keyed by `registry:name`. Registry documents
/// are treated as append-only, so entries are never invalidated.
#[derive(Debug, Default)]
pub struct PackumentCache {
    slots: Mutex<BTreeMap<String, Slot>>,
}

impl PackumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(registry: RegistryKind, name: &str) -> String {
        format!("{registry}:{name}")
    }

    /// Seeds the cache, replacing nothing that was already fetched.
    pub fn insert(&self, registry: RegistryKind, name: &str, packument: Packument) {
        let slot = self.slot(registry, name);
        let _ = slot.set(Arc::new(packument));
    }

    pub fn get(&self, registry: RegistryKind, name: &str) -> Option<Arc<Packument>> {
        let slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slots
            .get(&Self::key(registry, name))
            .and_then(|slot| slot.get().cloned())
    }

    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slots.values().filter(|slot| slot.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, registry: RegistryKind, name: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slots
            .entry(Self::key(registry, name))
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }
}

/// Returns the cached packument, fetching it once per session. Concurrent
/// callers for the same key share a single request.
pub async fn fetch_packument(
    session: &Session,
    name: &str,
    registry: RegistryKind,
) -> Result<Arc<Packument>> {
    let slot = session.packuments.slot(registry, name);

    if let Some(cached) = slot.get() {
        trace!(%name, %registry, "packument cache hit");
        return Ok(cached.clone());
    }

    let packument = slot
        .get_or_try_init(|| async {
            protocols::fetch_packument(&session.config, &session.client, name, registry)
                .await
                .map(Arc::new)
        })
        .await?;

    Ok(packument.clone())
}
