use std::collections::HashMap;
use std::num::NonZeroU32;

use super::SelectionId;

struct Entry<T> {
    object: T,
    selected: bool,
}

/// Arena of selectable objects keyed by their `SelectionId`.
///
/// Ids come from a monotonically increasing counter starting at 1 and are
/// never reused. An object enters the registry when it is created and leaves
/// it only when it is destroyed through [`Registry::unregister`], so a lookup
/// can never observe a dead object: it either finds a live one or misses.
pub struct Registry<T> {
    next_id: NonZeroU32,
    entries: HashMap<SelectionId, Entry<T>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self {
            next_id: NonZeroU32::MIN,
            entries: HashMap::new(),
        }
    }

    /// An empty registry whose ids continue after this one's, for replacing
    /// the contents without ever handing out an id twice.
    pub fn successor(&self) -> Self {
        Self {
            next_id: self.next_id,
            entries: HashMap::new(),
        }
    }

    /// Take ownership of `object` and assign it the next id.
    pub fn register(&mut self, object: T) -> SelectionId {
        let id = SelectionId(self.next_id);
        self.next_id = self
            .next_id
            .checked_add(1)
            .expect("selection id space exhausted");
        self.entries.insert(id, Entry { object, selected: false });
        id
    }

    /// Destroy the entry for `id`, handing the object back to the caller.
    pub fn unregister(&mut self, id: SelectionId) -> Option<T> {
        self.entries.remove(&id).map(|entry| entry.object)
    }

    pub fn lookup(&self, id: SelectionId) -> Option<&T> {
        self.entries.get(&id).map(|entry| &entry.object)
    }

    pub fn lookup_mut(&mut self, id: SelectionId) -> Option<&mut T> {
        self.entries.get_mut(&id).map(|entry| &mut entry.object)
    }

    /// Resolve a raw identity-buffer value. 0 and unknown ids both miss.
    pub fn lookup_raw(&self, raw: u32) -> Option<(SelectionId, &T)> {
        let id = SelectionId::from_raw(raw)?;
        self.lookup(id).map(|object| (id, object))
    }

    pub fn contains(&self, id: SelectionId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn is_selected(&self, id: SelectionId) -> bool {
        self.entries.get(&id).is_some_and(|entry| entry.selected)
    }

    /// Only the selection set writes this flag.
    pub(super) fn set_selected(&mut self, id: SelectionId, selected: bool) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.selected = selected;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SelectionId, &T)> {
        self.entries.iter().map(|(id, entry)| (*id, &entry.object))
    }

    /// Ids of every live object, ascending.
    pub fn ids(&self) -> Vec<SelectionId> {
        let mut ids: Vec<_> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_start_at_one_and_increase() {
        let mut registry = Registry::new();
        let ids: Vec<_> = (0..5).map(|i| registry.register(i)).collect();
        assert_eq!(ids[0].get(), 1);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn ids_are_not_reused_after_unregister() {
        let mut registry = Registry::new();
        let a = registry.register("a");
        let b = registry.register("b");
        assert_eq!(registry.unregister(b), Some("b"));
        let c = registry.register("c");
        assert!(c > b);
        assert!(registry.contains(a));
        assert!(!registry.contains(b));
    }

    #[test]
    fn successor_continues_the_counter() {
        let mut registry = Registry::new();
        let last = (0..3).map(|i| registry.register(i)).last().unwrap();
        let mut next = registry.successor();
        assert!(next.is_empty());
        let first = next.register(10);
        assert!(first > last);
        assert!(!next.contains(last));
    }

    #[test]
    fn lookup_misses_are_quiet() {
        let mut registry = Registry::new();
        let id = registry.register(1.5_f32);
        assert_eq!(registry.lookup(id), Some(&1.5));
        registry.unregister(id);
        assert_eq!(registry.lookup(id), None);
        assert!(registry.lookup_raw(0).is_none());
        assert!(registry.lookup_raw(id.get()).is_none());
        assert!(registry.unregister(id).is_none());
    }

    #[test]
    fn selected_flag_follows_entry_lifetime() {
        let mut registry = Registry::new();
        let id = registry.register(());
        assert!(!registry.is_selected(id));
        assert!(registry.set_selected(id, true));
        assert!(registry.is_selected(id));
        registry.unregister(id);
        assert!(!registry.is_selected(id));
        assert!(!registry.set_selected(id, true));
    }
}
