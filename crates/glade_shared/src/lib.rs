pub mod camera;
pub mod effects;
pub mod frame;
pub mod geometry;
pub mod hierarchy;
pub mod overlay;
pub mod portal;
pub mod registry;
pub mod selector;
pub mod timeline;
pub mod tween;
pub mod viewport;
pub mod visibility;
