use std::collections::HashMap;
use std::sync::Arc;

use opwatch_core::ViewCache;
use opwatch_logging::op_debug;
use tokio::sync::watch;

/// Staleness registry for the dependent view caches.
///
/// Each cache has a generation counter; invalidating bumps it. The views that own
/// the cached data watch their counter and refetch when it moves.
#[derive(Debug, Clone)]
pub struct ViewCaches {
    generations: Arc<HashMap<ViewCache, watch::Sender<u64>>>,
}

impl Default for ViewCaches {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewCaches {
    pub fn new() -> Self {
        let generations = ViewCache::ALL
            .iter()
            .map(|&cache| (cache, watch::channel(0).0))
            .collect();
        Self {
            generations: Arc::new(generations),
        }
    }

    pub fn invalidate(&self, cache: ViewCache) {
        if let Some(generation) = self.generations.get(&cache) {
            generation.send_modify(|value| *value += 1);
            op_debug!("invalidated {} (generation {})", cache.key(), *generation.borrow());
        }
    }

    pub fn generation(&self, cache: ViewCache) -> u64 {
        self.generations
            .get(&cache)
            .map(|generation| *generation.borrow())
            .unwrap_or_default()
    }

    /// Receiver that wakes whenever `cache` is invalidated.
    pub fn subscribe(&self, cache: ViewCache) -> Option<watch::Receiver<u64>> {
        self.generations.get(&cache).map(watch::Sender::subscribe)
    }
}
