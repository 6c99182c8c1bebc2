use super::{ReactableDictionary, RegistryCounters, RegistryStats};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;

/// Dictionaries deployed on this gateway.
#[derive(Debug, Default)]
pub struct DictionaryRegistry {
    dictionaries: DashMap<String, ReactableDictionary>,
    counters: RegistryCounters,
}

impl DictionaryRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploys a dictionary unless a newer deployment is already active.
    ///
    /// Returns true if the registry changed.
    pub fn register(&self, dictionary: ReactableDictionary) -> bool {
        self.counters.registered();
        let id = dictionary.definition.id.clone();
        match self.dictionaries.entry(id.clone()) {
            Entry::Occupied(mut entry) => {
                if dictionary.definition.deployed_at > entry.get().definition.deployed_at {
                    info!(dictionary_id = %id, "updating dictionary");
                    entry.insert(dictionary);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(entry) => {
                info!(dictionary_id = %id, "deploying dictionary");
                entry.insert(dictionary);
                true
            }
        }
    }

    /// Removes a dictionary. Returns false if it was not deployed.
    pub fn unregister(&self, dictionary_id: &str) -> bool {
        self.counters.unregistered();
        let removed = self.dictionaries.remove(dictionary_id).is_some();
        if removed {
            info!(dictionary_id, "undeploying dictionary");
        }
        removed
    }

    /// Returns a deployed dictionary.
    pub fn get(&self, dictionary_id: &str) -> Option<ReactableDictionary> {
        self.dictionaries.get(dictionary_id).map(|d| d.value().clone())
    }

    /// Returns every deployed dictionary, sorted by ID.
    pub fn dictionaries(&self) -> Vec<ReactableDictionary> {
        let mut all: Vec<_> = self.dictionaries.iter().map(|d| d.value().clone()).collect();
        all.sort_by(|a, b| a.definition.id.cmp(&b.definition.id));
        all
    }

    /// Number of deployed dictionaries.
    pub fn len(&self) -> usize {
        self.dictionaries.len()
    }

    /// Returns true if no dictionary is deployed.
    pub fn is_empty(&self) -> bool {
        self.dictionaries.is_empty()
    }

    /// Returns the call counts.
    pub fn stats(&self) -> RegistryStats {
        self.counters.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatesync_protocol::DictionaryDefinition;

    fn dictionary(deployed_at: i64, value: &str) -> ReactableDictionary {
        ReactableDictionary::new(
            DictionaryDefinition::new("dict-1", "countries")
                .with_deployed_at(deployed_at)
                .with_entry("fr", value),
        )
    }

    #[test]
    fn keeps_the_newest_deployment() {
        let registry = DictionaryRegistry::new();
        assert!(registry.register(dictionary(10, "France")));
        assert!(!registry.register(dictionary(10, "France")));
        assert!(!registry.register(dictionary(5, "Old")));
        assert!(registry.register(dictionary(20, "République française")));

        let deployed = registry.get("dict-1").unwrap();
        assert_eq!(deployed.definition.properties["fr"], "République française");
        assert_eq!(registry.stats().register_calls, 4);
    }

    #[test]
    fn unregister() {
        let registry = DictionaryRegistry::new();
        registry.register(dictionary(10, "France"));
        assert!(registry.unregister("dict-1"));
        assert!(!registry.unregister("dict-1"));
        assert!(registry.is_empty());
    }
}
