use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::scene::{Map, MapObject, PointEntity, Solid};
use crate::selection::Volume;

/// Current map document version.
const VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("file '{}' does not exist", .0.display())]
    NotFound(PathBuf),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed map: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("map version {0} is newer than supported ({VERSION})")]
    UnsupportedVersion(u32),
    #[error("solid {index}: face refers to vertex {vertex}, but it only has {count}")]
    BadFaceIndex { index: usize, vertex: u32, count: usize },
}

/// On-disk form of a map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapDocument {
    pub version: u32,
    pub worldspawn: BTreeMap<String, String>,
    pub solids: Vec<SolidDocument>,
    pub entities: Vec<EntityDocument>,
}

impl Default for MapDocument {
    fn default() -> Self {
        Self {
            version: VERSION,
            worldspawn: BTreeMap::new(),
            solids: Vec::new(),
            entities: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolidDocument {
    #[serde(flatten)]
    pub shape: SolidShape,
    #[serde(default)]
    pub volume: Volume,
    /// Pitch, yaw, roll in degrees. Vertices are already in world space;
    /// this only feeds the local handle frame.
    #[serde(default)]
    pub angles: Vec3,
}

/// Brushes are written as meshes; hand-written maps may use the box shorthand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SolidShape {
    Box { min: Vec3, max: Vec3 },
    Mesh { vertices: Vec<Vec3>, faces: Vec<Vec<u32>> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDocument {
    pub classname: String,
    pub origin: Vec3,
    /// Pitch, yaw, roll in degrees.
    #[serde(default)]
    pub angles: Vec3,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl MapDocument {
    pub fn from_map(map: &Map) -> Self {
        let mut doc = Self {
            worldspawn: map.worldspawn.clone(),
            ..Self::default()
        };
        let objects = map.objects();
        for id in objects.ids() {
            match objects.lookup(id) {
                Some(MapObject::Solid(solid)) => doc.solids.push(SolidDocument {
                    shape: SolidShape::Mesh {
                        vertices: solid.vertices.clone(),
                        faces: solid.faces.clone(),
                    },
                    volume: solid.volume,
                    angles: to_angles(solid.orientation),
                }),
                Some(MapObject::Entity(entity)) => doc.entities.push(EntityDocument {
                    classname: entity.classname.clone(),
                    origin: entity.origin,
                    angles: to_angles(entity.orientation),
                    properties: entity.properties.clone(),
                }),
                None => {}
            }
        }
        doc
    }

    /// Build the map that replaces `previous`. Objects get ids in document
    /// order, solids first, continuing after every id `previous` handed out.
    pub fn into_map(self, previous: &Map) -> Result<Map, MapError> {
        if self.version > VERSION {
            return Err(MapError::UnsupportedVersion(self.version));
        }

        let mut map = previous.successor();
        map.worldspawn.extend(self.worldspawn);

        for (index, solid) in self.solids.into_iter().enumerate() {
            let mut built = match solid.shape {
                SolidShape::Box { min, max } => Solid::cuboid(min, max),
                SolidShape::Mesh { vertices, faces } => {
                    let count = vertices.len();
                    if let Some(&vertex) = faces.iter().flatten().find(|&&v| v as usize >= count) {
                        return Err(MapError::BadFaceIndex { index, vertex, count });
                    }
                    Solid::new(vertices, faces, Volume::Solid)
                }
            };
            built.volume = solid.volume;
            built.orientation = from_angles(solid.angles);
            map.add_solid(built);
        }

        for entity in self.entities {
            let mut built = PointEntity::new(entity.classname, entity.origin);
            built.orientation = from_angles(entity.angles);
            built.properties = entity.properties;
            map.add_entity(built);
        }

        Ok(map)
    }
}

/// Pitch, yaw, roll in degrees. Yaw turns about +Y, pitch about the turned X.
fn to_angles(orientation: Quat) -> Vec3 {
    let (yaw, pitch, roll) = orientation.to_euler(EulerRot::YXZ);
    Vec3::new(pitch, yaw, roll).map(f32::to_degrees)
}

fn from_angles(angles: Vec3) -> Quat {
    let radians = angles.map(f32::to_radians);
    Quat::from_euler(EulerRot::YXZ, radians.y, radians.x, radians.z)
}

/// Read and parse a map file meant to replace `previous`. Nothing is touched
/// on failure.
pub fn load_map(path: &Path, previous: &Map) -> Result<Map, MapError> {
    if !path.exists() {
        return Err(MapError::NotFound(path.to_path_buf()));
    }
    let data = fs::read_to_string(path)?;
    let doc: MapDocument = serde_json::from_str(&data)?;
    doc.into_map(previous)
}

pub fn save_map(map: &Map, path: &Path) -> Result<(), MapError> {
    let data = serde_json::to_string_pretty(&MapDocument::from_map(map))?;
    fs::write(path, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::Selectable;
    use glam::Mat4;

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_map(&dir.path().join("missing.json"), &Map::new()).err().unwrap();
        assert!(matches!(err, MapError::NotFound(_)));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ \"solids\": [ { \"min\": 3 } ] }").unwrap();
        assert!(matches!(load_map(&path, &Map::new()), Err(MapError::Parse(_))));
    }

    #[test]
    fn box_shorthand_and_entities_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("room.json");
        fs::write(
            &path,
            r#"{
                "worldspawn": { "skyname": "sky_day01" },
                "solids": [ { "min": [0, 0, 0], "max": [64, 32, 64], "volume": "Hollow" } ],
                "entities": [ { "classname": "light", "origin": [1, 2, 3], "angles": [0, 90, 0] } ]
            }"#,
        )
        .unwrap();

        let map = load_map(&path, &Map::new()).unwrap();
        assert_eq!(map.worldspawn.get("skyname").map(String::as_str), Some("sky_day01"));
        assert_eq!(map.worldspawn.get("classname").map(String::as_str), Some("worldspawn"));
        let ids = map.objects().ids();
        assert_eq!(ids.len(), 2);

        let Some(MapObject::Solid(solid)) = map.object(ids[0]) else { panic!("expected solid") };
        assert_eq!(solid.volume, Volume::Hollow);
        assert_eq!(solid.selection_bounds().unwrap().size(), Vec3::new(64.0, 32.0, 64.0));

        let Some(MapObject::Entity(light)) = map.object(ids[1]) else { panic!("expected entity") };
        assert_eq!(light.origin, Vec3::new(1.0, 2.0, 3.0));
        let facing = light.orientation * Vec3::NEG_Z;
        assert!(facing.abs_diff_eq(Vec3::NEG_X, 1e-5));
    }

    #[test]
    fn out_of_range_face_is_rejected() {
        let doc = MapDocument {
            solids: vec![SolidDocument {
                shape: SolidShape::Mesh { vertices: vec![Vec3::ZERO; 3], faces: vec![vec![0, 1, 7]] },
                volume: Volume::Solid,
                angles: Vec3::ZERO,
            }],
            ..MapDocument::default()
        };
        assert!(matches!(
            doc.into_map(&Map::new()),
            Err(MapError::BadFaceIndex { index: 0, vertex: 7, count: 3 })
        ));
    }

    #[test]
    fn newer_version_is_rejected() {
        let doc = MapDocument { version: VERSION + 1, ..MapDocument::default() };
        assert!(matches!(doc.into_map(&Map::new()), Err(MapError::UnsupportedVersion(_))));
    }

    #[test]
    fn saved_map_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.json");
        let map = Map::demo();
        save_map(&map, &path).unwrap();
        let loaded = load_map(&path, &map).unwrap();
        assert_eq!(MapDocument::from_map(&loaded), MapDocument::from_map(&map));
    }

    #[test]
    fn brush_orientation_survives_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("turned.json");
        let turn = Quat::from_rotation_y(0.5) * Quat::from_rotation_x(0.25);
        let mut map = Map::new();
        let id = map.add_solid(Solid::cuboid(Vec3::ZERO, Vec3::splat(64.0)));
        map.select(id);
        map.transform_selected(&Mat4::from_quat(turn));
        save_map(&map, &path).unwrap();

        let loaded = load_map(&path, &map).unwrap();
        let ids = loaded.objects().ids();
        let Some(MapObject::Solid(solid)) = loaded.object(ids[0]) else { panic!("expected solid") };
        assert!(solid.orientation.abs_diff_eq(turn, 1e-4) || solid.orientation.abs_diff_eq(-turn, 1e-4));
        let (before, after) = (map.selection_bounds().unwrap(), solid.selection_bounds().unwrap());
        assert!(after.min.abs_diff_eq(before.min, 1e-3) && after.max.abs_diff_eq(before.max, 1e-3));
    }

    #[test]
    fn brush_without_angles_is_unrotated() {
        let doc: MapDocument =
            serde_json::from_str(r#"{ "solids": [ { "min": [0, 0, 0], "max": [8, 8, 8] } ] }"#).unwrap();
        let map = doc.into_map(&Map::new()).unwrap();
        let Some(MapObject::Solid(solid)) = map.object(map.objects().ids()[0]) else { panic!("expected solid") };
        assert_eq!(solid.orientation, Quat::IDENTITY);
    }

    #[test]
    fn opened_map_never_reuses_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.json");
        let map = Map::demo();
        save_map(&map, &path).unwrap();

        let highest = map.objects().ids().into_iter().max().unwrap();
        let loaded = load_map(&path, &map).unwrap();
        let ids = loaded.objects().ids();
        assert_eq!(ids.len(), map.objects().len());
        assert!(ids.iter().all(|id| *id > highest));

        // And again for the map after that.
        let reloaded = load_map(&path, &loaded).unwrap();
        let newest = ids.into_iter().max().unwrap();
        assert!(reloaded.objects().ids().iter().all(|id| *id > newest));
    }
}
