mod entity;
mod solid;

pub use entity::{PointEntity, ENTITY_HALF_EXTENT};
pub use solid::Solid;

use std::collections::BTreeMap;

use glam::{Mat4, Quat, Vec3};

use crate::selection::{Registry, Selectable, Selection, SelectionId, Volume};
use crate::util::math::Aabb;

/// Every kind of object a map holds.
#[derive(Debug, Clone, PartialEq)]
pub enum MapObject {
    Solid(Solid),
    Entity(PointEntity),
}

impl MapObject {
    pub fn is_deleted(&self) -> bool {
        match self {
            MapObject::Solid(solid) => solid.is_deleted(),
            MapObject::Entity(entity) => entity.is_deleted(),
        }
    }

    fn as_selectable(&self) -> &dyn Selectable {
        match self {
            MapObject::Solid(solid) => solid,
            MapObject::Entity(entity) => entity,
        }
    }

    fn as_selectable_mut(&mut self) -> &mut dyn Selectable {
        match self {
            MapObject::Solid(solid) => solid,
            MapObject::Entity(entity) => entity,
        }
    }
}

impl Selectable for MapObject {
    fn selection_bounds(&self) -> Option<Aabb> {
        self.as_selectable().selection_bounds()
    }

    fn selection_transform(&mut self, matrix: &Mat4) {
        self.as_selectable_mut().selection_transform(matrix);
    }

    fn selection_delete(&mut self) {
        self.as_selectable_mut().selection_delete();
    }

    fn selection_align_to_grid(&mut self, grid_size: Vec3) {
        self.as_selectable_mut().selection_align_to_grid(grid_size);
    }

    fn selection_set_volume(&mut self, volume: Volume) {
        self.as_selectable_mut().selection_set_volume(volume);
    }

    fn selection_orientation(&self) -> Quat {
        self.as_selectable().selection_orientation()
    }
}

/// The loaded map: owns every object through the identity registry, plus
/// the current selection.
pub struct Map {
    pub worldspawn: BTreeMap<String, String>,
    objects: Registry<MapObject>,
    selection: Selection,
}

impl Default for Map {
    fn default() -> Self {
        Self::new()
    }
}

impl Map {
    pub fn new() -> Self {
        let mut worldspawn = BTreeMap::new();
        worldspawn.insert("classname".to_string(), "worldspawn".to_string());
        Self {
            worldspawn,
            objects: Registry::new(),
            selection: Selection::new(),
        }
    }

    /// An empty map that replaces this one. Its ids carry on from this map's
    /// counter, so an id seen before is never handed out again.
    pub fn successor(&self) -> Self {
        Self {
            objects: self.objects.successor(),
            ..Self::new()
        }
    }

    /// A small starter room so a fresh editor has something to look at.
    pub fn demo() -> Self {
        let mut map = Self::new();
        map.add_solid(Solid::cuboid(Vec3::new(-512.0, -16.0, -512.0), Vec3::new(512.0, 0.0, 512.0)));
        map.add_solid(Solid::cuboid(Vec3::new(-128.0, 0.0, -128.0), Vec3::new(0.0, 128.0, 0.0)));
        map.add_solid(Solid::cuboid(Vec3::new(64.0, 0.0, -256.0), Vec3::new(192.0, 64.0, -128.0)));
        map.add_entity(PointEntity::new("info_player_start", Vec3::new(0.0, 8.0, 256.0)));
        map.add_entity(PointEntity::new("light", Vec3::new(0.0, 256.0, 0.0)));
        map
    }

    pub fn add_solid(&mut self, solid: Solid) -> SelectionId {
        self.objects.register(MapObject::Solid(solid))
    }

    pub fn add_entity(&mut self, entity: PointEntity) -> SelectionId {
        self.objects.register(MapObject::Entity(entity))
    }

    pub fn objects(&self) -> &Registry<MapObject> {
        &self.objects
    }

    pub fn object(&self, id: SelectionId) -> Option<&MapObject> {
        self.objects.lookup(id)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn is_selected(&self, id: SelectionId) -> bool {
        self.objects.is_selected(id)
    }

    pub fn select(&mut self, id: SelectionId) {
        self.selection.select(&mut self.objects, id);
    }

    pub fn unselect(&mut self, id: SelectionId) {
        self.selection.unselect(&mut self.objects, id);
    }

    pub fn toggle(&mut self, id: SelectionId) {
        self.selection.toggle(&mut self.objects, id);
    }

    pub fn replace_selection(&mut self, id: SelectionId) {
        self.selection.replace(&mut self.objects, id);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear(&mut self.objects);
    }

    /// Bounds of everything selected.
    pub fn selection_bounds(&self) -> Option<Aabb> {
        self.selection.bounds(&self.objects)
    }

    /// Local frame of the first selected object.
    pub fn primary_orientation(&self) -> Quat {
        self.selection
            .primary()
            .and_then(|id| self.objects.lookup(id))
            .map_or(Quat::IDENTITY, Selectable::selection_orientation)
    }

    pub fn transform_selected(&mut self, matrix: &Mat4) {
        self.selection
            .for_each_mut(&mut self.objects, |_, object| object.selection_transform(matrix));
    }

    pub fn align_selected_to_grid(&mut self, grid_size: Vec3) {
        self.selection
            .for_each_mut(&mut self.objects, |_, object| object.selection_align_to_grid(grid_size));
    }

    pub fn set_selected_volume(&mut self, volume: Volume) {
        self.selection
            .for_each_mut(&mut self.objects, |_, object| object.selection_set_volume(volume));
    }

    /// Mark every selected object for deletion. They are destroyed by the
    /// next [`Map::collect_deleted`].
    pub fn delete_selected(&mut self) {
        self.selection
            .for_each_mut(&mut self.objects, |_, object| object.selection_delete());
    }

    /// Destroy objects that deleted themselves. This is the only place
    /// objects leave the registry; their ids leave the selection with them.
    pub fn collect_deleted(&mut self) -> usize {
        let doomed: Vec<SelectionId> = self
            .objects
            .iter()
            .filter(|(_, object)| object.is_deleted())
            .map(|(id, _)| id)
            .collect();
        for &id in &doomed {
            self.selection.forget(id);
            self.objects.unregister(id);
            log::debug!("destroyed object {id}");
        }
        doomed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_boxes() -> (Map, Vec<SelectionId>) {
        let mut map = Map::new();
        let ids = (0..3)
            .map(|i| {
                let min = Vec3::new(i as f32 * 100.0, 0.0, 0.0);
                map.add_solid(Solid::cuboid(min, min + Vec3::splat(64.0)))
            })
            .collect();
        (map, ids)
    }

    #[test]
    fn ids_follow_registration_order() {
        let (map, ids) = three_boxes();
        let raw: Vec<u32> = ids.iter().map(|id| id.get()).collect();
        assert_eq!(raw, vec![1, 2, 3]);
        assert_eq!(map.objects().len(), 3);
    }

    #[test]
    fn deleting_destroys_on_collect_and_unselects() {
        let (mut map, ids) = three_boxes();
        map.select(ids[0]);
        map.select(ids[2]);
        map.unselect(ids[0]);
        map.delete_selected();
        // Still alive until the frame boundary.
        assert!(map.object(ids[2]).is_some());

        assert_eq!(map.collect_deleted(), 1);
        assert!(map.object(ids[2]).is_none());
        assert!(map.selection().find(map.objects(), ids[2]).is_none());
        assert!(map.selection().is_empty());
        assert!(map.object(ids[0]).is_some());
        assert_eq!(map.collect_deleted(), 0);
    }

    #[test]
    fn edits_reach_every_selected_object() {
        let (mut map, ids) = three_boxes();
        map.select(ids[0]);
        map.select(ids[1]);
        map.transform_selected(&Mat4::from_translation(Vec3::new(0.0, 10.0, 0.0)));
        map.set_selected_volume(Volume::Hollow);

        for (i, &id) in ids.iter().enumerate() {
            let Some(MapObject::Solid(solid)) = map.object(id) else { panic!("missing solid") };
            let expected_y = if i < 2 { 10.0 } else { 0.0 };
            assert_eq!(solid.selection_bounds().unwrap().min.y, expected_y);
            let expected_volume = if i < 2 { Volume::Hollow } else { Volume::Solid };
            assert_eq!(solid.volume, expected_volume);
        }
    }

    #[test]
    fn primary_orientation_follows_first_selected() {
        let (mut map, ids) = three_boxes();
        assert_eq!(map.primary_orientation(), Quat::IDENTITY);
        map.select(ids[1]);
        let spin = Quat::from_rotation_y(1.0);
        map.transform_selected(&Mat4::from_quat(spin));
        map.select(ids[0]);
        assert!(map.primary_orientation().abs_diff_eq(spin, 1e-5));
    }
}
