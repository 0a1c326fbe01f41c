pub mod math;
pub mod picking;
pub mod space;
