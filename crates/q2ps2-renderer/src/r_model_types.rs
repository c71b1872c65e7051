// Copyright (C) 1997-2001 Id Software, Inc.
// GPL-2.0-or-later
//
// In-memory model structures. d*_t types in qfiles are the on-disk
// representations; everything here is decoded and native-endian.
//
// Brush data refers to other brush data by index into the arrays of the
// same BrushModel, never by pointer.

use std::rc::Rc;

use bytemuck::{Pod, Zeroable};
use q2ps2_common::q_shared::{CPlane, SurfaceFlags, Vec3};
use q2ps2_common::qfiles::{DMdl, DStVert, DTriVertx, DTriangle, MAXLIGHTMAPS};

use crate::r_hunk::Hunk;
use crate::r_image::ImageHandle;

// ============================================================================
// BRUSH MODELS
// ============================================================================

bitflags::bitflags! {
    /// Per-surface drawing flags.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct SurfDrawFlags: i32 {
        const PLANEBACK = 0x2;
        const DRAWTURB  = 0x10;
    }
}
pub const SURF_PLANEBACK: SurfDrawFlags = SurfDrawFlags::PLANEBACK;
pub const SURF_DRAWTURB: SurfDrawFlags = SurfDrawFlags::DRAWTURB;

/// Lightmap atlas page dimensions, in luxels.
pub const LM_BLOCK_WIDTH: i32 = 128;
pub const LM_BLOCK_HEIGHT: i32 = 128;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MVertex {
    pub position: Vec3,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MEdge {
    pub v: [u16; 2],
}

#[derive(Debug, Clone, PartialEq)]
pub struct MTexInfo {
    pub vecs: [[f32; 4]; 2],
    pub flags: SurfaceFlags,
    pub num_frames: i32,
    pub next: Option<usize>, // animation chain
    pub image: ImageHandle,
    pub image_width: u32,
    pub image_height: u32,
}

/// One polygon vertex as the rasterizer consumes it.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct PolyVertex {
    pub position: Vec3,
    pub texture_s: f32,
    pub texture_t: f32,
    pub lightmap_s: f32,
    pub lightmap_t: f32,
}

/// Indexes into the owning polygon's vertex list.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct MTriangle {
    pub vertexes: [u16; 3],
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MPoly {
    pub vertexes: Vec<PolyVertex>,
    pub triangles: Vec<MTriangle>,
}

impl MPoly {
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertexes)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.triangles)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MSurface {
    pub plane: usize,
    pub flags: SurfDrawFlags,

    pub first_edge: i32, // look up in surf_edges[], negative numbers
    pub num_edges: i32,  // are backwards edges

    pub texture_mins: [i32; 2],
    pub extents: [i32; 2],

    pub light_s: i32,
    pub light_t: i32, // lightmap coordinates

    pub texinfo: usize,

    pub styles: [u8; MAXLIGHTMAPS],
    pub samples: Option<usize>, // offset into light_data

    pub poly: Option<MPoly>, // none for warped surfaces
}

/// A node's child: either another node or a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeChild {
    Node(usize),
    Leaf(usize),
}

impl NodeChild {
    /// Decodes the on-disk child number; negative values are -(leaf+1).
    pub fn from_disk(p: i32) -> Self {
        if p >= 0 {
            NodeChild::Node(p as usize)
        } else {
            NodeChild::Leaf((-1 - p) as usize)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MNode {
    pub minmaxs: [f32; 6], // for bounding box culling
    pub parent: Option<usize>,

    pub plane: usize,
    pub children: [NodeChild; 2],

    pub first_surface: u16,
    pub num_surfaces: u16,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MLeaf {
    pub minmaxs: [f32; 6],
    pub parent: Option<usize>,

    pub contents: i32,
    pub cluster: i32,
    pub area: i32,

    pub first_mark_surface: usize,
    pub num_mark_surfaces: usize,
}

/// Sub-model of a world: the world itself at index 0, then doors, lifts...
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MModel {
    pub mins: Vec3,
    pub maxs: Vec3,
    pub origin: Vec3, // for sounds or lights
    pub radius: f32,
    pub head_node: i32,
    pub first_face: i32,
    pub num_faces: i32,
}

/// Decoded visibility lump. `bitofs` are byte offsets into `data`, which
/// holds the whole lump.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisData {
    pub num_clusters: usize,
    pub bitofs: Vec<[i32; 2]>,
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct BrushModel {
    pub vertexes: Vec<MVertex>,
    pub edges: Vec<MEdge>,
    pub surf_edges: Vec<i32>,
    pub light_data: Vec<u8>,
    pub planes: Vec<CPlane>,
    pub texinfos: Vec<MTexInfo>,
    pub surfaces: Vec<MSurface>,
    pub mark_surfaces: Vec<usize>,
    pub vis: Option<VisData>,
    pub leafs: Vec<MLeaf>,
    pub nodes: Vec<MNode>,
    pub submodels: Vec<MModel>,
}

// ============================================================================
// ALIAS MODELS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct AliasFrame {
    pub scale: Vec3,
    pub translate: Vec3,
    pub name: String,
    pub verts: Vec<DTriVertx>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AliasModel {
    pub header: DMdl,
    pub skin_names: Vec<String>,
    pub st: Vec<DStVert>,
    pub tris: Vec<DTriangle>,
    pub frames: Vec<AliasFrame>,
    pub glcmds: Vec<i32>,
}

// ============================================================================
// SPRITE MODELS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpriteFrame {
    pub width: i32,
    pub height: i32,
    pub origin_x: i32,
    pub origin_y: i32,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpriteModel {
    pub frames: Vec<SpriteFrame>,
}

// ===================================================================
// Whole model
// ===================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum ModType {
    #[default]
    Null = 0,
    Brush = 1,
    Sprite = 2,
    Alias = 4,
}

bitflags::bitflags! {
    /// Set of model types a lookup accepts.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ModTypes: i32 {
        const BRUSH  = ModType::Brush as i32;
        const SPRITE = ModType::Sprite as i32;
        const ALIAS  = ModType::Alias as i32;
    }
}

impl ModType {
    /// Whether a lookup for `mask` may be answered by a model of this type.
    /// Placeholder models answer any lookup.
    pub fn matches(self, mask: ModTypes) -> bool {
        self == ModType::Null || mask.bits() & (self as i32) != 0
    }
}

#[derive(Debug, Default)]
pub enum ModelData {
    #[default]
    None,
    Alias(AliasModel),
    Sprite(SpriteModel),
    /// Shared between the world and its inline models.
    Brush(Rc<BrushModel>),
}

#[derive(Debug, Default)]
pub struct Model {
    pub name: String,
    pub hash: u32,

    pub registration_sequence: i32,

    pub mod_type: ModType,
    pub num_frames: i32,

    // volume occupied by the model graphics
    pub mins: Vec3,
    pub maxs: Vec3,
    pub radius: f32,

    // brush model
    pub first_model_surface: i32,
    pub num_model_surfaces: i32,
    pub first_node: i32,

    // for alias models and sprites
    pub skins: Vec<Option<ImageHandle>>,

    pub hunk: Hunk,
    pub data: ModelData,
}

impl Model {
    pub fn new(name: &str, hash: u32) -> Self {
        Self {
            name: name.to_string(),
            hash,
            ..Default::default()
        }
    }

    pub fn brush(&self) -> Option<&BrushModel> {
        match &self.data {
            ModelData::Brush(b) => Some(b),
            _ => None,
        }
    }

    pub fn alias(&self) -> Option<&AliasModel> {
        match &self.data {
            ModelData::Alias(a) => Some(a),
            _ => None,
        }
    }

    pub fn sprite(&self) -> Option<&SpriteModel> {
        match &self.data {
            ModelData::Sprite(s) => Some(s),
            _ => None,
        }
    }
}
