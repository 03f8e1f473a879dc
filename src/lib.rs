pub mod error;
pub mod extract;
pub mod field;
pub mod grid;
pub mod interp;
pub mod mesh;
pub mod plugin;
pub mod tables;
pub mod types;

pub use plugin::LevelSetPlugin;
