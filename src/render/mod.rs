mod camera;
pub mod geometry;
pub mod gizmo;
mod grid;
mod renderer;
pub mod vertex;

pub use camera::Camera;
pub use renderer::{Renderer, ViewportScene};
