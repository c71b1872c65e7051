// Copyright (C) 1997-2001 Id Software, Inc.
// GPL-2.0-or-later
//
// Model subsystem error taxonomy.
//
// Every variant is fatal-class: the data is corrupt, foreign, or a fixed
// resource ran out. Missing files and empty names are not errors; the
// loaders report those as `Ok(None)`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Out of model objects!")]
    PoolExhausted,
    #[error("Bad inline model number '{0}' or null world model")]
    BadInlineModel(String),
    #[error("Unknown file id (0x{id:X}) for '{name}'")]
    UnknownFileId { name: String, id: u32 },
    #[error("'{name}' has wrong version number ({found} should be {expected})")]
    WrongVersion { name: String, found: i32, expected: i32 },
    #[error("Funny lump size in '{name}' ({lump})")]
    FunnyLumpSize { name: String, lump: &'static str },
    #[error("Bad lump in '{name}' ({lump}: offset {fileofs}, length {filelen})")]
    BadLump { name: String, lump: &'static str, fileofs: i32, filelen: i32 },
    #[error("'{0}' is truncated")]
    Truncated(String),
    #[error("Model '{name}' {reason}")]
    BadAliasModel { name: String, reason: String },
    #[error("Sprite '{name}' has too many frames ({count} > {max})")]
    TooManySpriteFrames { name: String, count: i32, max: usize },
    #[error("Bad surf edges count in '{name}': {count}")]
    BadSurfEdgeCount { name: String, count: usize },
    #[error("Bad texinfo number: {0}")]
    BadTexInfo(i32),
    #[error("Bad texinfo animation link {next} at {index}")]
    BadTexInfoChain { index: usize, next: i32 },
    #[error("Bad plane number: {0}")]
    BadPlane(i32),
    #[error("Bad surface number: {0}")]
    BadSurface(i32),
    #[error("Bad surface extents on axis {axis}: {mins} .. {maxs}")]
    BadSurfaceExtents { axis: usize, mins: f32, maxs: f32 },
    #[error("Bad edge number: {0}")]
    BadEdge(i32),
    #[error("Bad vertex number: {0}")]
    BadVertex(u32),
    #[error("Bad light offset: {0}")]
    BadLightOffset(i32),
    #[error("Bad node child: {0}")]
    BadChild(i32),
    #[error("Bad leaf face range: {first}+{count}")]
    BadLeafFaces { first: usize, count: usize },
    #[error("Inline model {0} has bad first_node!")]
    BadFirstNode(usize),
    #[error("Hunk_Alloc: overflow ({requested} bytes requested, {used}/{max} used)")]
    HunkOverflow { requested: usize, used: usize, max: usize },
    #[error("Null teximage at {index} for model '{name}'")]
    UnresolvedTexture { name: String, index: usize },
    #[error("Triangle list overflowed!")]
    TriangleOverflow,
    #[error("Loaded a brush model after the world!")]
    BrushAfterWorld,
    #[error("Null/empty map name!")]
    EmptyWorldName,
    #[error("Unable to load level '{0}'!")]
    WorldNotFound(String),
}

pub type ModelResult<T> = Result<T, ModelError>;

impl ModelError {
    /// Maps a short read from a record decoder to `Truncated`.
    pub fn truncated(name: &str) -> impl FnOnce(std::io::Error) -> ModelError + '_ {
        move |_| ModelError::Truncated(name.to_string())
    }
}
