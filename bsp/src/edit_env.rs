//! The "environment struct by reference" pattern: every model/face/texture
//! editing operation takes an `&EditEnv` instead of reading module-level
//! statics for engine limits, progress reporting, or verbosity.

use crate::{
    constants::{
        DEFAULT_ATLAS_SIZE, DEFAULT_ATLAS_ZONE_SIZE, DEFAULT_MAP_EXTENT, DEFAULT_MAX_MAP_CLIPNODES,
        DEFAULT_MAX_MAP_EDGES, DEFAULT_MAX_MAP_FACES, DEFAULT_MAX_MAP_LEAFS,
        DEFAULT_MAX_MAP_MARKSURFACES, DEFAULT_MAX_MAP_MODELS, DEFAULT_MAX_MAP_NODES,
        DEFAULT_MAX_MAP_PLANES, DEFAULT_MAX_MAP_SURFEDGES, DEFAULT_MAX_MAP_TEXINFO,
        DEFAULT_MAX_MAP_TEXTURES, DEFAULT_MAX_MAP_VERTS,
    },
    error::EditError,
};

#[derive(Debug, Clone, Copy)]
pub struct EngineLimits {
    pub max_models: usize,
    pub max_planes: usize,
    pub max_clipnodes: usize,
    pub max_nodes: usize,
    pub max_leaves: usize,
    pub max_verts: usize,
    pub max_faces: usize,
    pub max_marksurfaces: usize,
    pub max_texinfo: usize,
    pub max_edges: usize,
    pub max_surfedges: usize,
    pub max_textures: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_models: DEFAULT_MAX_MAP_MODELS,
            max_planes: DEFAULT_MAX_MAP_PLANES,
            max_clipnodes: DEFAULT_MAX_MAP_CLIPNODES,
            max_nodes: DEFAULT_MAX_MAP_NODES,
            max_leaves: DEFAULT_MAX_MAP_LEAFS,
            max_verts: DEFAULT_MAX_MAP_VERTS,
            max_faces: DEFAULT_MAX_MAP_FACES,
            max_marksurfaces: DEFAULT_MAX_MAP_MARKSURFACES,
            max_texinfo: DEFAULT_MAX_MAP_TEXINFO,
            max_edges: DEFAULT_MAX_MAP_EDGES,
            max_surfedges: DEFAULT_MAX_MAP_SURFEDGES,
            max_textures: DEFAULT_MAX_MAP_TEXTURES,
        }
    }
}

/// Per-call configuration and collaborators for the editing modules.
/// Constructed once per tool invocation and threaded through by reference;
/// never a global.
pub struct EditEnv {
    pub limits: EngineLimits,
    pub map_extent: f32,
    pub atlas_size: u32,
    pub atlas_zone_size: u32,
    pub verbose: bool,
    pub progress: Option<Box<dyn FnMut(f32)>>,
}

impl std::fmt::Debug for EditEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditEnv")
            .field("limits", &self.limits)
            .field("map_extent", &self.map_extent)
            .field("atlas_size", &self.atlas_size)
            .field("atlas_zone_size", &self.atlas_zone_size)
            .field("verbose", &self.verbose)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl Default for EditEnv {
    fn default() -> Self {
        Self {
            limits: EngineLimits::default(),
            map_extent: DEFAULT_MAP_EXTENT,
            atlas_size: DEFAULT_ATLAS_SIZE,
            atlas_zone_size: DEFAULT_ATLAS_ZONE_SIZE,
            verbose: false,
            progress: None,
        }
    }
}

impl EditEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report_progress(&mut self, fraction: f32) {
        if let Some(cb) = &mut self.progress {
            cb(fraction);
        }
        if self.verbose {
            log::trace!("progress: {:.1}%", fraction * 100.0);
        }
    }

    pub fn check_limit(&self, kind: &'static str, count: usize, limit: usize) -> Result<(), EditError> {
        if count > limit {
            return Err(EditError::LimitExceeded { kind, count, limit });
        }
        Ok(())
    }

    pub fn check_in_extent(&self, coord: glam::Vec3) -> Result<(), EditError> {
        if coord.abs().max_element() > self.map_extent {
            return Err(EditError::LimitExceeded {
                kind: "map_extent",
                count: coord.abs().max_element() as usize,
                limit: self.map_extent as usize,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_limits_match_engine_defaults() {
        let env = EditEnv::new();
        assert_eq!(env.limits.max_models, DEFAULT_MAX_MAP_MODELS);
        assert_eq!(env.atlas_size, DEFAULT_ATLAS_SIZE);
    }

    #[test]
    fn check_limit_rejects_over_budget() {
        let env = EditEnv::new();
        assert!(env.check_limit("planes", 5, 4).is_err());
        assert!(env.check_limit("planes", 4, 4).is_ok());
    }
}
