use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum BspEntitiesError {
    #[error("Cannot parse all entities")]
    Parse,
    #[error("Entity is malformed: unbalanced braces or EOF inside an open entity")]
    MalformedEnts,
}

#[derive(Debug, thiserror::Error)]
pub enum BspError {
    #[error("Cannot parse entity lump: {source}")]
    ParseEntities {
        #[source]
        source: BspEntitiesError,
    },
    #[error("Cannot parse planes")]
    ParsePlanes,
    #[error("Cannot parse textures")]
    ParseTextures,
    #[error("Cannot parse vertices")]
    ParseVertices,
    #[error("Cannot parse visibility")]
    ParseVisibility,
    #[error("Cannot parse nodes")]
    ParseNodes,
    #[error("Cannot parse texinfo")]
    ParseTexInfo,
    #[error("Cannot parse faces")]
    ParseFaces,
    #[error("Cannot parse lightmap")]
    ParseLightmap,
    #[error("Cannot parse clipnodes")]
    ParseClipNodes,
    #[error("Cannot parse leaves")]
    ParseLeaves,
    #[error("Cannot parse mark surfaces")]
    ParseMarkSurfaces,
    #[error("Cannot parse edges")]
    ParseEdges,
    #[error("Cannot parse surface edges")]
    ParseSurfEdges,
    #[error("Cannot parse models")]
    ParseModels,
    #[error("Failed to parse a lump section")]
    LumpParseError,
    #[error("Generic failure to parse with nom")]
    NomParsingError,
    #[error("Bsp version is not 30: {version}")]
    BspVersion { version: i32 },
    #[error("Header is truncated or malformed")]
    BadHeader,
    #[error("Lump is shorter than its declared length")]
    TruncatedLump { lump: usize },
    #[error("Lump byte length is not a multiple of its record size")]
    BadRecordCount { lump: usize },
    #[error("Cannot read file `{path}`: {source}")]
    IOError {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

impl BspError {
    pub fn to_result<T>(self) -> Result<T, Self> {
        Err(self)
    }
}

impl BspEntitiesError {
    pub fn to_result<T>(self) -> Result<T, Self> {
        Err(self)
    }
}

/// Errors raised by the editing operations (model editor, face editor,
/// texture store, reference graph). Kept separate from [`BspError`], which
/// is reserved for load-time format errors: an edit failure never implies
/// the file on disk was invalid.
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("Index {index} is out of range for lump {lump} (len {len})")]
    BadIndex {
        lump: &'static str,
        index: i64,
        len: usize,
    },
    #[error("Face {face} has fewer than 3 edges after the edit")]
    DegenerateFace { face: usize },
    #[error("Face {face}'s vertices are not coplanar within epsilon")]
    NonPlanarFace { face: usize },
    #[error("Plane {plane} normal is not unit length ({length})")]
    PlaneNotUnit { plane: usize, length: f32 },
    #[error("Leaf index {leaf} is out of range")]
    LeafOutOfRange { leaf: i32 },
    #[error("Model {model} is not convex; operation requires convexity")]
    NonConvex { model: usize },
    #[error("Models' bounding boxes overlap; cannot merge")]
    BoundsOverlap,
    #[error("Models cannot be separated by an axis-aligned plane")]
    NotSeparable,
    #[error("Duplicate coplanar face detected where none was expected")]
    CoplanarDup,
    #[error("Shared structure between models could not be resolved")]
    SharedStructureUnresolvable,
    #[error("Engine limit exceeded for {kind}: {count} > {limit}")]
    LimitExceeded {
        kind: &'static str,
        count: usize,
        limit: usize,
    },
    #[error("Texture `{name}` is missing from every loaded WAD")]
    MissingTexture { name: String },
    #[error("WAD `{name}` could not be loaded")]
    MissingWad { name: String },
    #[error("Operation was cancelled by the caller")]
    Cancelled,
    #[error(transparent)]
    Quantize(#[from] wad::error::WadError),
}
