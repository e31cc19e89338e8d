use std::collections::HashMap;
use std::sync::RwLock;

use chatty_types::ChannelId;

/// Caches derived channel ids per ordered pair. Owns no storage; the
/// derivation is `ChannelId::between`, so a cold cache gives the same answer.
#[derive(Default)]
pub struct ChannelRegistry {
    cache: RwLock<HashMap<(String, String), ChannelId>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel_for(&self, a: &str, b: &str) -> ChannelId {
        let key = if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        };

        if let Ok(cache) = self.cache.read() {
            if let Some(id) = cache.get(&key) {
                return id.clone();
            }
        }

        let id = ChannelId::between(a, b);
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(key, id.clone());
        }
        id
    }
}
