// Copyright (C) 1997-2001 Id Software, Inc.
// GPL-2.0-or-later
//
// Per-asset memory block. Every structure decoded for one model is charged
// against that model's hunk, which is released as a unit.

use crate::r_error::{ModelError, ModelResult};

/// Fixed budget for a world. Big enough for the largest map in the game.
pub const WORLD_HUNK_SIZE: usize = 8 * 1024 * 1024;

/// Extra bytes on top of the file size for alignment rounding.
pub const HUNK_ROUNDING_SLACK: usize = 128;

const HUNK_ALIGN: usize = 16;

/// What a hunk was allocated for; shown by the model list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemTag {
    #[default]
    None,
    ModelAlias,
    ModelSprite,
    ModelWorld,
}

#[derive(Debug, Default)]
pub struct Hunk {
    max_size: usize,
    cur_size: usize,
    tag: MemTag,
}

impl Hunk {
    pub fn begin(max_size: usize, tag: MemTag) -> Self {
        Self { max_size, cur_size: 0, tag }
    }

    /// Charges `size` bytes, aligned to 16. Returns the offset of the block.
    pub fn alloc(&mut self, size: usize) -> ModelResult<usize> {
        let offset = (self.cur_size + HUNK_ALIGN - 1) & !(HUNK_ALIGN - 1);
        let end = offset.checked_add(size).ok_or(ModelError::HunkOverflow {
            requested: size,
            used: self.cur_size,
            max: self.max_size,
        })?;
        if end > self.max_size {
            return Err(ModelError::HunkOverflow {
                requested: size,
                used: self.cur_size,
                max: self.max_size,
            });
        }
        self.cur_size = end;
        Ok(offset)
    }

    /// Charges room for `count` values of `T` and hands back an empty vector
    /// with exactly that capacity.
    pub fn alloc_vec<T>(&mut self, count: usize) -> ModelResult<Vec<T>> {
        let bytes = count.saturating_mul(std::mem::size_of::<T>());
        self.alloc(bytes)?;
        Ok(Vec::with_capacity(count))
    }

    pub fn free(&mut self) {
        *self = Self::default();
    }

    pub fn size(&self) -> usize {
        self.cur_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn tag(&self) -> MemTag {
        self.tag
    }
}
