use glam::Vec3;
use wad::types::MipTex;

use nom::IResult as _IResult;

use crate::constants::MAX_MAP_HULLS;

pub type IResult<'a, T> = _IResult<&'a [u8], T>;
pub type SResult<'a, T> = _IResult<&'a str, T>;

#[derive(Debug)]
pub struct LumpHeader {
    pub offset: i32,
    pub length: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub enum PlaneType {
    X = 0,
    Y = 1,
    Z = 2,
    AnyX = 3,
    AnyY = 4,
    AnyZ = 5,
}

impl TryFrom<i32> for PlaneType {
    type Error = &'static str;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        if !(0..=5).contains(&value) {
            return Err("Not a valid plane type");
        }

        Ok(match value {
            0 => Self::X,
            1 => Self::Y,
            2 => Self::Z,
            3 => Self::AnyX,
            4 => Self::AnyY,
            5 => Self::AnyZ,
            _ => unreachable!(),
        })
    }
}

impl PlaneType {
    /// Classifies a (near-)unit normal into the axial bucket the compile
    /// tools use: exactly axis-aligned gets X/Y/Z, otherwise the type names
    /// the axis closest to the normal's dominant component.
    pub fn classify(normal: Vec3) -> Self {
        let (ax, ay, az) = (normal.x.abs(), normal.y.abs(), normal.z.abs());

        if ax == 1.0 {
            Self::X
        } else if ay == 1.0 {
            Self::Y
        } else if az == 1.0 {
            Self::Z
        } else if ax >= ay && ax >= az {
            Self::AnyX
        } else if ay >= ax && ay >= az {
            Self::AnyY
        } else {
            Self::AnyZ
        }
    }
}

#[derive(Debug, Clone)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
    pub type_: PlaneType,
}

impl Plane {
    pub fn from_points(a: Vec3, b: Vec3, c: Vec3) -> Option<Self> {
        let normal = (b - a).cross(c - a);
        if normal.length_squared() <= common::EPSILON * common::EPSILON {
            return None;
        }
        let normal = normal.normalize();
        let distance = normal.dot(a);
        Some(Self {
            type_: PlaneType::classify(normal),
            normal,
            distance,
        })
    }

    /// Returns the plane equation
    pub fn equation(&self) -> String {
        format!(
            "{}x {}{}y {}{}z = {}",
            self.normal.x.abs(),
            if self.normal.y.is_sign_positive() {
                "+"
            } else {
                ""
            },
            self.normal.y.abs(),
            if self.normal.z.is_sign_positive() {
                "+"
            } else {
                ""
            },
            self.normal.z.abs(),
            self.distance
        )
    }

    pub fn flip(&self) -> Self {
        Self {
            normal: -self.normal,
            distance: -self.distance,
            type_: self.type_,
        }
    }

    /// Signed distance from `p` to this plane: `n . p - d`.
    pub fn side_distance(&self, p: Vec3) -> f32 {
        self.normal.dot(p) - self.distance
    }

    pub fn is_unit(&self) -> bool {
        (self.normal.length() - 1.0).abs() <= common::EPSILON
    }
}

pub type Texture = MipTex;
pub type Vertex = Vec3;

#[derive(Debug, Clone)]
pub struct Node {
    pub plane: u32,
    pub children: [i16; 2],
    pub mins: [i16; 3],
    pub maxs: [i16; 3],
    pub first_face: u16,
    pub face_count: u16,
}

#[derive(Debug, Clone)]
pub struct TexInfo {
    pub u: Vec3,
    pub u_offset: f32,
    pub v: Vec3,
    pub v_offset: f32,
    pub texture_index: u32,
    pub flags: u32,
}

impl TexInfo {
    /// The "special" bit: faces with this flag get no lightmap.
    pub const FLAG_SPECIAL: u32 = 1;

    pub fn is_special(&self) -> bool {
        self.flags & Self::FLAG_SPECIAL != 0
    }
}

#[derive(Debug, Clone)]
pub struct Face {
    pub plane: u16,
    pub side: u16,
    pub first_edge: i32,
    pub edge_count: u16,
    pub texinfo: u16,
    pub styles: [u8; 4],
    pub lightmap_offset: i32,
}

impl Face {
    /// `styles[0] == 255` marks a face with no lightmap at all.
    pub const NO_LIGHTMAP_STYLE: u8 = 255;

    pub fn has_lightmap(&self) -> bool {
        self.styles[0] != Self::NO_LIGHTMAP_STYLE
    }

    pub fn style_count(&self) -> usize {
        self.styles.iter().take_while(|&&s| s != Self::NO_LIGHTMAP_STYLE).count()
    }
}

pub type LightMap = Vec<[u8; 3]>;

#[derive(Debug, Clone)]
pub struct ClipNode {
    pub plane: i32,
    pub children: [i16; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub enum LeafContent {
    ContentsEmpty = -1,
    ContentsSolid = -2,
    ContentsWater = -3,
    ContentsSlime = -4,
    ContentsLava = -5,
    ContentsSky = -6,
    ContentsOrigin = -7,
    ContentsClip = -8,
    ContentsCurrent0 = -9,
    ContentsCurrent90 = -10,
    ContentsCurrent180 = -11,
    ContentsCurrent270 = -12,
    ContentsCurrentUp = -13,
    ContentsCurrentDown = -14,
    ContentsTranslucent = -15,
}

impl TryFrom<i32> for LeafContent {
    type Error = &'static str;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        if !(-15..=-1).contains(&value) {
            return Err("Not a valid LeafContent value");
        }

        Ok(match value {
            -1 => Self::ContentsEmpty,
            -2 => Self::ContentsSolid,
            -3 => Self::ContentsWater,
            -4 => Self::ContentsSlime,
            -5 => Self::ContentsLava,
            -6 => Self::ContentsSky,
            -7 => Self::ContentsOrigin,
            -8 => Self::ContentsClip,
            -9 => Self::ContentsCurrent0,
            -10 => Self::ContentsCurrent90,
            -11 => Self::ContentsCurrent180,
            -12 => Self::ContentsCurrent270,
            -13 => Self::ContentsCurrentUp,
            -14 => Self::ContentsCurrentDown,
            -15 => Self::ContentsTranslucent,
            _ => unreachable!(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Leaf {
    pub contents: LeafContent,
    pub vis_offset: i32,
    pub mins: [i16; 3],
    pub maxs: [i16; 3],
    pub first_mark_surface: u16,
    pub mark_surface_count: u16,
    pub ambient_levels: [u8; 4],
}

pub type MarkSurface = u16;
pub type Edge = [u16; 2];
pub type SurfEdge = i32;

#[derive(Debug, Clone)]
pub struct Model {
    pub mins: Vec3,
    pub maxs: Vec3,
    pub origin: Vec3,
    pub head_nodes: [i32; MAX_MAP_HULLS],
    pub vis_leaves_count: i32,
    pub first_face: i32,
    pub face_count: i32,
}

impl Model {
    pub fn aabb(&self) -> crate::primitives::Aabb {
        crate::primitives::Aabb {
            mins: self.mins,
            maxs: self.maxs,
        }
    }
}

#[derive(Debug)]
pub struct Bsp {
    pub entities: crate::entity::EntityTable,
    pub planes: Vec<Plane>,
    pub textures: Vec<Texture>,
    pub vertices: Vec<Vertex>,
    pub visibility: Vec<u8>,
    pub nodes: Vec<Node>,
    pub texinfo: Vec<TexInfo>,
    pub faces: Vec<Face>,
    pub lightmap: LightMap,
    pub clipnodes: Vec<ClipNode>,
    pub leaves: Vec<Leaf>,
    pub mark_surfaces: Vec<MarkSurface>,
    pub edges: Vec<Edge>,
    pub surf_edges: Vec<SurfEdge>,
    pub models: Vec<Model>,
}
