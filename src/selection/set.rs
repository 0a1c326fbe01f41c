use super::{Registry, Selectable, SelectionId};
use crate::util::math::Aabb;

/// Ordered, duplicate-free set of selected objects.
///
/// Holds ids only and resolves them through the [`Registry`] on every access,
/// so a destroyed object simply stops resolving.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    ids: Vec<SelectionId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn contains(&self, id: SelectionId) -> bool {
        self.ids.contains(&id)
    }

    /// The first selected object, which the handles use as their local frame.
    pub fn primary(&self) -> Option<SelectionId> {
        self.ids.first().copied()
    }

    /// Members in selection order.
    pub fn iter(&self) -> std::iter::Copied<std::slice::Iter<'_, SelectionId>> {
        self.ids.iter().copied()
    }

    /// Append `id` if it is live and not yet selected. Returns true if the set changed.
    pub fn select<T>(&mut self, registry: &mut Registry<T>, id: SelectionId) -> bool {
        if self.contains(id) || !registry.set_selected(id, true) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Remove `id`, keeping the order of the remaining members.
    pub fn unselect<T>(&mut self, registry: &mut Registry<T>, id: SelectionId) -> bool {
        let Some(index) = self.ids.iter().position(|&member| member == id) else {
            return false;
        };
        self.ids.remove(index);
        registry.set_selected(id, false);
        true
    }

    pub fn toggle<T>(&mut self, registry: &mut Registry<T>, id: SelectionId) {
        if self.contains(id) {
            self.unselect(registry, id);
        } else {
            self.select(registry, id);
        }
    }

    pub fn clear<T>(&mut self, registry: &mut Registry<T>) {
        for id in self.ids.drain(..) {
            registry.set_selected(id, false);
        }
    }

    /// Make `id` the only selected object.
    pub fn replace<T>(&mut self, registry: &mut Registry<T>, id: SelectionId) {
        if self.ids.len() == 1 && self.ids[0] == id {
            return;
        }
        self.clear(registry);
        self.select(registry, id);
    }

    /// Look an object up by id. Unknown and destroyed ids miss alike.
    pub fn find<'r, T>(&self, registry: &'r Registry<T>, id: SelectionId) -> Option<&'r T> {
        registry.lookup(id)
    }

    /// Drop `id` without touching the registry. Called when the object is destroyed.
    pub(crate) fn forget(&mut self, id: SelectionId) {
        self.ids.retain(|&member| member != id);
    }

    /// Run `f` on every live selected object, in selection order.
    pub fn for_each_mut<T>(&self, registry: &mut Registry<T>, mut f: impl FnMut(SelectionId, &mut T)) {
        for &id in &self.ids {
            if let Some(object) = registry.lookup_mut(id) {
                f(id, object);
            }
        }
    }

    /// Union of the bounds of every selected object that has any.
    pub fn bounds<T: Selectable>(&self, registry: &Registry<T>) -> Option<Aabb> {
        self.ids
            .iter()
            .filter_map(|&id| registry.lookup(id)?.selection_bounds())
            .reduce(|a, b| a.union(&b))
    }
}

impl<'a> IntoIterator for &'a Selection {
    type Item = SelectionId;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, SelectionId>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::selection::tests::Marker;

    fn registry_with(count: usize) -> (Registry<Marker>, Vec<SelectionId>) {
        let mut registry = Registry::new();
        let ids = (0..count)
            .map(|i| registry.register(Marker::at(Vec3::splat(i as f32))))
            .collect();
        (registry, ids)
    }

    #[test]
    fn iterates_in_selection_order() {
        let (mut registry, ids) = registry_with(3);
        let mut selection = Selection::new();
        selection.select(&mut registry, ids[1]);
        selection.select(&mut registry, ids[2]);
        let order: Vec<u32> = selection.iter().map(SelectionId::get).collect();
        assert_eq!(order, vec![2, 3]);
        // Iteration restarts from the beginning each time.
        assert_eq!((&selection).into_iter().count(), 2);
    }

    #[test]
    fn select_is_idempotent() {
        let (mut registry, ids) = registry_with(2);
        let mut selection = Selection::new();
        assert!(selection.select(&mut registry, ids[0]));
        assert!(!selection.select(&mut registry, ids[0]));
        assert_eq!(selection.len(), 1);
        assert!(registry.is_selected(ids[0]));
    }

    #[test]
    fn toggle_twice_restores_membership() {
        let (mut registry, ids) = registry_with(3);
        let mut selection = Selection::new();
        selection.select(&mut registry, ids[0]);
        selection.select(&mut registry, ids[2]);
        let before: Vec<_> = selection.iter().collect();

        selection.toggle(&mut registry, ids[1]);
        assert!(selection.contains(ids[1]));
        selection.toggle(&mut registry, ids[1]);
        assert_eq!(selection.iter().collect::<Vec<_>>(), before);
        assert!(!registry.is_selected(ids[1]));
    }

    #[test]
    fn unselect_leaves_set_empty_and_flag_cleared() {
        let (mut registry, ids) = registry_with(3);
        let mut selection = Selection::new();
        selection.select(&mut registry, ids[1]);
        selection.unselect(&mut registry, ids[1]);
        assert!(selection.is_empty());
        assert!(!registry.is_selected(ids[1]));
        assert!(!selection.unselect(&mut registry, ids[1]));
    }

    #[test]
    fn unselect_preserves_relative_order() {
        let (mut registry, ids) = registry_with(4);
        let mut selection = Selection::new();
        for &id in ids.iter().rev() {
            selection.select(&mut registry, id);
        }
        selection.unselect(&mut registry, ids[2]);
        let order: Vec<u32> = selection.iter().map(SelectionId::get).collect();
        assert_eq!(order, vec![4, 2, 1]);
    }

    #[test]
    fn clear_resets_every_flag() {
        let (mut registry, ids) = registry_with(3);
        let mut selection = Selection::new();
        for &id in &ids {
            selection.select(&mut registry, id);
        }
        selection.clear(&mut registry);
        assert!(selection.is_empty());
        assert!(ids.iter().all(|&id| !registry.is_selected(id)));
    }

    #[test]
    fn dead_ids_cannot_be_selected_or_found() {
        let (mut registry, ids) = registry_with(2);
        let mut selection = Selection::new();
        registry.unregister(ids[0]);
        assert!(!selection.select(&mut registry, ids[0]));
        assert!(selection.find(&registry, ids[0]).is_none());
        assert!(selection.find(&registry, ids[1]).is_some());
    }

    #[test]
    fn replace_keeps_single_member() {
        let (mut registry, ids) = registry_with(3);
        let mut selection = Selection::new();
        selection.select(&mut registry, ids[0]);
        selection.select(&mut registry, ids[1]);
        selection.replace(&mut registry, ids[2]);
        assert_eq!(selection.iter().collect::<Vec<_>>(), vec![ids[2]]);
        assert!(!registry.is_selected(ids[0]));
        assert!(registry.is_selected(ids[2]));
    }

    #[test]
    fn bounds_cover_all_members() {
        let (mut registry, ids) = registry_with(3);
        let mut selection = Selection::new();
        assert!(selection.bounds(&registry).is_none());
        selection.select(&mut registry, ids[0]);
        selection.select(&mut registry, ids[2]);
        let bounds = selection.bounds(&registry).unwrap();
        assert_eq!(bounds.min, Vec3::splat(-1.0));
        assert_eq!(bounds.max, Vec3::splat(3.0));
    }
}
