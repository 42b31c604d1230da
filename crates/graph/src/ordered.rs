use std::collections::HashMap;

/// Identifier-keyed map that iterates in first-insertion order.
///
/// Replacing a value keeps the key's original position.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct IdMap<V> {
    order: Vec<String>,
    items: HashMap<String, V>,
}

impl<V> Default for IdMap<V> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            items: HashMap::new(),
        }
    }
}

impl<V> IdMap<V> {
    pub(crate) fn insert(&mut self, id: String, value: V) -> Option<V> {
        if !self.items.contains_key(&id) {
            self.order.push(id.clone());
        }
        self.items.insert(id, value)
    }

    pub(crate) fn get(&self, id: &str) -> Option<&V> {
        self.items.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut V> {
        self.items.get_mut(id)
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.order
            .iter()
            .filter_map(|id| self.items.get(id).map(|value| (id.as_str(), value)))
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }
}

impl<V> FromIterator<(String, V)> for IdMap<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        let mut map = Self::default();
        for (id, value) in iter {
            map.insert(id, value);
        }
        map
    }
}
