use std::collections::HashMap;

/// Named static lookup tables referenced from action templates via
/// `{MapName:key}`. Map names and keys are case-insensitive, matching the
/// IIS rewrite-map behavior.
#[derive(Debug, Clone, Default)]
pub struct RewriteMaps {
    maps: HashMap<String, HashMap<String, String>>,
}

impl RewriteMaps {
    /// Add a map, replacing any existing map with the same name.
    pub fn insert(
        &mut self,
        name: &str,
        entries: impl IntoIterator<Item = (String, String)>,
    ) {
        let entries = entries
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        self.maps.insert(name.to_lowercase(), entries);
    }

    /// Absorb another set of maps; same-named maps are replaced wholesale.
    pub fn merge(&mut self, other: RewriteMaps) {
        self.maps.extend(other.maps);
    }

    pub fn lookup(&self, name: &str, key: &str) -> Option<&str> {
        self.maps
            .get(&name.to_lowercase())?
            .get(&key.to_lowercase())
            .map(String::as_str)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}
