use glam::Vec3;

use crate::render::vertex::{LineVertex, MeshVertex};
use crate::scene::{Map, MapObject, Solid, ENTITY_HALF_EXTENT};
use crate::selection::{Selectable, SelectionId, Volume};
use crate::settings::DisplaySettings;
use crate::util::math::Aabb;

/// CPU-side geometry for one frame of the map.
#[derive(Debug, Default)]
pub struct SceneGeometry {
    pub triangles: Vec<MeshVertex>,
    /// Outlines of selected objects.
    pub outlines: Vec<LineVertex>,
}

pub fn build_scene_geometry(map: &Map, display: &DisplaySettings) -> SceneGeometry {
    let mut geometry = SceneGeometry::default();
    for (id, object) in map.objects().iter() {
        match object {
            MapObject::Solid(solid) => {
                let color = match solid.volume {
                    Volume::Solid => display.solid_color,
                    Volume::Hollow => display.hollow_color,
                };
                push_solid(&mut geometry.triangles, solid, id, color);
                if map.is_selected(id) {
                    push_solid_edges(&mut geometry.outlines, solid, display.selection_color);
                }
            }
            MapObject::Entity(entity) => {
                let half = Vec3::splat(ENTITY_HALF_EXTENT);
                let cube = Solid::cuboid(entity.origin - half, entity.origin + half);
                push_solid(&mut geometry.triangles, &cube, id, display.entity_color);
                if map.is_selected(id)
                    && let Some(bounds) = entity.selection_bounds()
                {
                    push_box(&mut geometry.outlines, &bounds, display.selection_color);
                }
            }
        }
    }
    geometry
}

fn push_solid(out: &mut Vec<MeshVertex>, solid: &Solid, id: SelectionId, color: [f32; 4]) {
    for (tri, normal) in solid.triangles() {
        for p in tri {
            out.push(MeshVertex {
                position: p.into(),
                normal: normal.into(),
                color,
                id: id.get(),
            });
        }
    }
}

fn push_solid_edges(out: &mut Vec<LineVertex>, solid: &Solid, color: [f32; 4]) {
    for (a, b) in solid.edges() {
        if let (Some(&a), Some(&b)) = (solid.vertices.get(a as usize), solid.vertices.get(b as usize)) {
            out.push(LineVertex { position: a.into(), color });
            out.push(LineVertex { position: b.into(), color });
        }
    }
}

fn push_box(out: &mut Vec<LineVertex>, bounds: &Aabb, color: [f32; 4]) {
    let corners = bounds.corners();
    for (a, b) in Aabb::EDGES {
        out.push(LineVertex { position: corners[a].into(), color });
        out.push(LineVertex { position: corners[b].into(), color });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::PointEntity;

    #[test]
    fn triangles_carry_object_ids() {
        let mut map = Map::new();
        let a = map.add_solid(Solid::cuboid(Vec3::ZERO, Vec3::ONE));
        let b = map.add_entity(PointEntity::new("light", Vec3::splat(10.0)));
        let geometry = build_scene_geometry(&map, &DisplaySettings::default());

        assert_eq!(geometry.triangles.len(), 72);
        assert_eq!(geometry.triangles.iter().filter(|v| v.id == a.get()).count(), 36);
        assert_eq!(geometry.triangles.iter().filter(|v| v.id == b.get()).count(), 36);
        assert!(geometry.outlines.is_empty());
    }

    #[test]
    fn only_selected_objects_are_outlined() {
        let display = DisplaySettings::default();
        let mut map = Map::new();
        map.add_solid(Solid::cuboid(Vec3::ZERO, Vec3::ONE));
        let b = map.add_solid(Solid::cuboid(Vec3::splat(5.0), Vec3::splat(6.0)));
        map.select(b);
        map.set_selected_volume(Volume::Hollow);

        let geometry = build_scene_geometry(&map, &display);
        assert_eq!(geometry.outlines.len(), 24);
        assert!(geometry.outlines.iter().all(|v| v.color == display.selection_color));
        assert!(geometry.outlines.iter().all(|v| v.position[0] >= 5.0));
        let hollow = geometry.triangles.iter().filter(|v| v.color == display.hollow_color).count();
        assert_eq!(hollow, 36);
    }
}
