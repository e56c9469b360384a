pub mod constants;
pub mod edit_env;
pub mod entity;
pub mod error;
pub mod clipper;
pub mod face_editor;
pub mod lightmap;
pub mod map;
pub mod model_editor;
pub mod primitives;
pub mod refgraph;
pub mod texture_store;
pub mod tree;
mod parser;
mod types;
mod utils;
mod vis;
mod writer;

pub use parser::parse_bsp;
pub use types::Bsp;

pub use types::*;

pub use vis::{compress, decompress};

pub use glam::Vec3;
