use serde::{Deserialize, Serialize};

/// All user-configurable settings, persisted to JSON.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub camera: CameraSettings,
    pub grid: GridSettings,
    pub display: DisplaySettings,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CameraSettings {
    pub fov_degrees: f32,
    pub near_plane: f32,
    pub far_plane: f32,
    /// Mouse sensitivity multiplier.
    pub sensitivity: f32,
    /// Fly speed in units per second.
    pub max_speed: f32,
    /// Highest allowed pitch, degrees.
    pub pitch_up: f32,
    /// Lowest allowed pitch, degrees.
    pub pitch_down: f32,
    /// Degrees of pitch per mouse count, before sensitivity.
    pub m_pitch: f32,
    /// Degrees of yaw per mouse count, before sensitivity.
    pub m_yaw: f32,
    pub right_handed: bool,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            fov_degrees: 90.0,
            near_plane: 1.0,
            far_plane: 16384.0,
            sensitivity: 6.0,
            max_speed: 700.0,
            pitch_up: 89.0,
            pitch_down: -89.0,
            m_pitch: 0.022,
            m_yaw: 0.022,
            right_handed: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct GridSettings {
    pub show: bool,
    pub snap: bool,
    pub size: [f32; 3],
    pub uniform: bool,
    pub rotation_snap_degrees: f32,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            show: true,
            snap: true,
            size: [64.0; 3],
            uniform: true,
            rotation_snap_degrees: 15.0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DisplaySettings {
    pub bg_color: [f32; 3],
    pub grid_color: [f32; 4],
    pub selection_color: [f32; 4],
    pub solid_color: [f32; 4],
    pub hollow_color: [f32; 4],
    pub entity_color: [f32; 4],
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            bg_color: [0.15, 0.15, 0.18],
            grid_color: [0.35, 0.35, 0.35, 1.0],
            selection_color: [1.0, 0.3, 0.3, 1.0],
            solid_color: [0.75, 0.72, 0.65, 1.0],
            hollow_color: [0.45, 0.6, 0.8, 1.0],
            entity_color: [0.9, 0.55, 0.2, 1.0],
        }
    }
}

impl Settings {
    /// Load settings from config file. Falls back to defaults on error.
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &std::path::Path) -> Self {
        let Ok(data) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str::<Settings>(&data) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("ignoring malformed settings at {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Save settings to config file.
    pub fn save(&self) {
        self.save_to(&config_path());
    }

    pub fn save_to(&self, path: &std::path::Path) {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match serde_json::to_string_pretty(self) {
            Ok(data) => {
                if let Err(e) = std::fs::write(path, data) {
                    log::warn!("failed to save settings to {}: {e}", path.display());
                }
            }
            Err(e) => log::warn!("failed to serialize settings: {e}"),
        }
    }
}

fn config_path() -> std::path::PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    std::path::PathBuf::from(home).join(".config/chisel/settings.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("nope.json"));
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.camera.pitch_up, 89.0);
        assert_eq!(settings.grid.size, [64.0; 3]);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "camera": { "max_speed": 250.0 } }"#).unwrap();
        let settings = Settings::load_from(&path);
        assert_eq!(settings.camera.max_speed, 250.0);
        assert_eq!(settings.camera.sensitivity, 6.0);
        assert!(settings.grid.snap);
    }

    #[test]
    fn malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/settings.json");
        let mut settings = Settings::default();
        settings.grid.size = [16.0, 16.0, 8.0];
        settings.grid.uniform = false;
        settings.save_to(&path);
        assert_eq!(Settings::load_from(&path), settings);
    }
}
