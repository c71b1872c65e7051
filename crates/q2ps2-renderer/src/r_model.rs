// Copyright (C) 1997-2001 Id Software, Inc.
// GPL-2.0-or-later
//
// Model pool and registration: alias and sprite loaders, the inline model
// table built from the world, and the mark-and-sweep cycle run once per
// level load.

use std::io::Cursor;
use std::rc::Rc;
use std::time::Instant;

use byteorder::{LittleEndian, ReadBytesExt};
use q2ps2_common::common::{com_dprintf, com_error, com_printf, ERR_FATAL};
use q2ps2_common::cvar::CvarContext;
use q2ps2_common::files::FileLoader;
use q2ps2_common::q_shared::{com_file_extension, com_hash_string, ImageType};
use q2ps2_common::qfiles::*;

use crate::r_bsp::{load_brush_model, reference_world_textures};
use crate::r_error::{ModelError, ModelResult};
use crate::r_hunk::{Hunk, MemTag, HUNK_ROUNDING_SLACK, WORLD_HUNK_SIZE};
use crate::r_image::ImageCache;
use crate::r_model_types::*;

pub const MAX_MOD_KNOWN: usize = 512;

// ============================================================
// Configuration and statistics
// ============================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelConfig {
    /// Skip every non-world load, leaving a placeholder in its slot.
    pub force_null_entity_models: bool,
    /// Reload the world even when the same map is requested again.
    pub flush_map: bool,
}

impl ModelConfig {
    pub fn from_cvars(cvars: &mut CvarContext) -> Self {
        let force_null_entity_models = cvars.get("r_force_null_entity_models", "0", 0).value != 0.0;
        let flush_map = cvars.get("r_flush_map", "0", 0).value != 0.0;
        Self {
            force_null_entity_models,
            flush_map,
        }
    }
}

/// Counters reported after a level load. Everything but `pool_used` is
/// reset by `load_world`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelStats {
    pub pool_used: usize,
    pub cache_hits: u32,
    pub unused_freed: u32,
    pub inline_used: u32,
    pub failed: u32,
    pub fs_time_ms: f64,
    pub world_time_ms: f64,
    pub ents_time_ms: f64,
}

impl ModelStats {
    fn reset_level(&mut self) {
        *self = Self {
            pool_used: self.pool_used,
            ..Default::default()
        };
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Reference to a model in one of the two pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelHandle {
    Known(usize),
    Inline(usize),
}

// ============================================================
// Manager
// ============================================================

pub struct ModelManager<F: FileLoader, I: ImageCache> {
    files: F,
    images: I,
    mod_known: Vec<Option<Model>>,
    mod_inline: Vec<Option<Model>>,
    registration_sequence: i32,
    registration_started: bool,
    world: Option<ModelHandle>,
    config: ModelConfig,
    pub stats: ModelStats,
}

impl<F: FileLoader, I: ImageCache> ModelManager<F, I> {
    pub fn new(files: F, images: I) -> Self {
        Self {
            files,
            images,
            mod_known: (0..MAX_MOD_KNOWN).map(|_| None).collect(),
            mod_inline: (0..MAX_MOD_KNOWN).map(|_| None).collect(),
            registration_sequence: 0,
            registration_started: false,
            world: None,
            config: ModelConfig::default(),
            stats: ModelStats::default(),
        }
    }

    pub fn set_config(&mut self, config: ModelConfig) {
        self.config = config;
    }

    pub fn config(&self) -> ModelConfig {
        self.config
    }

    pub fn images(&self) -> &I {
        &self.images
    }

    pub fn images_mut(&mut self) -> &mut I {
        &mut self.images
    }

    pub fn files(&self) -> &F {
        &self.files
    }

    pub fn registration_sequence(&self) -> i32 {
        self.registration_sequence
    }

    pub fn registration_started(&self) -> bool {
        self.registration_started
    }

    pub fn model(&self, handle: ModelHandle) -> Option<&Model> {
        let slot = match handle {
            ModelHandle::Known(i) => self.mod_known.get(i),
            ModelHandle::Inline(i) => self.mod_inline.get(i),
        };
        slot.and_then(|m| m.as_ref())
    }

    pub fn get_world(&self) -> Option<&Model> {
        self.world.and_then(|h| self.model(h))
    }

    fn world_brush(&self) -> Option<&BrushModel> {
        self.get_world().and_then(|m| m.brush())
    }

    /// Finds a loaded model or loads it. `Ok(None)` for an empty name or a
    /// file that cannot be read; any other failure is an error.
    pub fn find_or_load(&mut self, name: &str, mask: ModTypes) -> ModelResult<Option<ModelHandle>> {
        if name.is_empty() {
            com_dprintf("find_or_load: empty name\n");
            self.stats.failed += 1;
            return Ok(None);
        }

        // inline models are grabbed only from the world
        if let Some(number) = name.strip_prefix('*') {
            return self.inline_model(name, number).map(Some);
        }

        let hash = com_hash_string(name);
        let hit = self.mod_known.iter().position(|slot| {
            slot.as_ref()
                .is_some_and(|m| m.hash == hash && m.name == name && m.mod_type.matches(mask))
        });
        if let Some(i) = hit {
            self.reference_all_textures(i);
            self.stats.cache_hits += 1;
            return Ok(Some(ModelHandle::Known(i)));
        }

        let slot = self
            .mod_known
            .iter()
            .position(|slot| slot.is_none())
            .ok_or(ModelError::PoolExhausted)?;
        let mut model = Model::new(name, hash);

        if self.config.force_null_entity_models && !com_file_extension(name).eq_ignore_ascii_case(".bsp") {
            com_dprintf(&format!("find_or_load: skipping '{}'\n", name));
            model.registration_sequence = self.registration_sequence;
            self.insert(slot, model);
            return Ok(Some(ModelHandle::Known(slot)));
        }

        let start = Instant::now();
        let buf = self.files.load_file(name);
        self.stats.fs_time_ms += elapsed_ms(start);
        let buf = match buf {
            Some(buf) if !buf.is_empty() => buf,
            _ => {
                com_dprintf(&format!("find_or_load: can't load '{}'\n", name));
                self.stats.failed += 1;
                return Ok(None);
            }
        };

        let ident = Cursor::new(&buf[..])
            .read_u32::<LittleEndian>()
            .map_err(|_| ModelError::UnknownFileId { name: name.to_string(), id: 0 })?;

        let start = Instant::now();
        match ident {
            IDALIASHEADER => {
                load_alias_model(&mut model, &buf, &mut self.images)?;
                self.stats.ents_time_ms += elapsed_ms(start);
            }
            IDSPRITEHEADER => {
                load_sprite_model(&mut model, &buf, &mut self.images)?;
                self.stats.ents_time_ms += elapsed_ms(start);
            }
            IDBSPHEADER => {
                if slot != 0 {
                    return Err(ModelError::BrushAfterWorld);
                }
                self.load_world_model(&mut model, &buf)?;
                self.stats.world_time_ms += elapsed_ms(start);
            }
            id => {
                return Err(ModelError::UnknownFileId { name: name.to_string(), id });
            }
        }

        model.registration_sequence = self.registration_sequence;
        self.insert(slot, model);
        Ok(Some(ModelHandle::Known(slot)))
    }

    fn insert(&mut self, slot: usize, model: Model) {
        self.mod_known[slot] = Some(model);
        self.stats.pool_used += 1;
    }

    fn inline_model(&mut self, name: &str, number: &str) -> ModelResult<ModelHandle> {
        let i = leading_int(number);
        let count = self.world_brush().map_or(0, |b| b.submodels.len());
        if i < 1 || i as usize >= count || self.mod_inline.get(i as usize).map_or(true, Option::is_none) {
            return Err(ModelError::BadInlineModel(name.to_string()));
        }
        self.stats.inline_used += 1;
        Ok(ModelHandle::Inline(i as usize))
    }

    /// Decodes a world into `model` and rebuilds the inline model table from
    /// its submodels. Submodel 0 describes the world itself.
    fn load_world_model(&mut self, model: &mut Model, buf: &[u8]) -> ModelResult<()> {
        model.hunk = Hunk::begin(WORLD_HUNK_SIZE, MemTag::ModelWorld);
        let bmod = Rc::new(load_brush_model(&model.name, buf, &mut model.hunk, &mut self.images)?);

        model.mod_type = ModType::Brush;
        model.num_frames = 2; // regular and alternate animation

        if bmod.submodels.len() > self.mod_inline.len() {
            return Err(ModelError::PoolExhausted);
        }
        self.mod_inline.iter_mut().for_each(|slot| *slot = None);
        for (i, sub) in bmod.submodels.iter().enumerate() {
            if sub.head_node < 0 || sub.head_node as usize >= bmod.nodes.len() {
                return Err(ModelError::BadFirstNode(i));
            }
            let name = format!("*{}", i);
            let inline = Model {
                hash: com_hash_string(&name),
                name,
                registration_sequence: self.registration_sequence,
                mod_type: ModType::Brush,
                num_frames: model.num_frames,
                mins: sub.mins,
                maxs: sub.maxs,
                radius: sub.radius,
                first_model_surface: sub.first_face,
                num_model_surfaces: sub.num_faces,
                first_node: sub.head_node,
                skins: Vec::new(),
                hunk: Hunk::default(),
                data: ModelData::Brush(Rc::clone(&bmod)),
            };

            if i == 0 {
                model.mins = inline.mins;
                model.maxs = inline.maxs;
                model.radius = inline.radius;
                model.first_model_surface = inline.first_model_surface;
                model.num_model_surfaces = inline.num_model_surfaces;
                model.first_node = inline.first_node;
            }
            self.mod_inline[i] = Some(inline);
        }

        reference_world_textures(&model.name, &bmod, &mut self.images, self.registration_sequence)?;
        model.data = ModelData::Brush(bmod);
        Ok(())
    }

    /// Stamps a cached model and every image it uses with the current
    /// sequence.
    fn reference_all_textures(&mut self, i: usize) {
        let sequence = self.registration_sequence;
        let images = &mut self.images;
        let Some(model) = self.mod_known[i].as_mut() else {
            return;
        };
        model.registration_sequence = sequence;

        match &model.data {
            ModelData::Brush(bmod) => {
                for ti in &bmod.texinfos {
                    images.touch_image(ti.image, sequence);
                }
            }
            ModelData::Alias(alias) => {
                model.skins = alias
                    .skin_names
                    .iter()
                    .map(|name| images.find_image(name, ImageType::Skin))
                    .collect();
                model.num_frames = alias.header.num_frames;
            }
            ModelData::Sprite(sprite) => {
                model.skins = sprite
                    .frames
                    .iter()
                    .map(|frame| images.find_image(&frame.name, ImageType::Sprite))
                    .collect();
            }
            ModelData::None => {}
        }
    }

    /// Releases one model. Freeing the world also empties the inline table.
    pub fn free(&mut self, handle: ModelHandle) {
        let ModelHandle::Known(i) = handle else {
            return;
        };
        let Some(mut model) = self.mod_known.get_mut(i).and_then(Option::take) else {
            return;
        };
        model.hunk.free();
        self.stats.pool_used = self.stats.pool_used.saturating_sub(1);

        if self.world == Some(handle) {
            self.world = None;
            self.mod_inline.iter_mut().for_each(|slot| *slot = None);
        }
    }

    /// Frees every model not stamped with the current sequence.
    pub fn free_unused(&mut self) {
        for i in 0..self.mod_known.len() {
            let stale = self.mod_known[i]
                .as_ref()
                .is_some_and(|m| m.registration_sequence != self.registration_sequence);
            if stale {
                self.free(ModelHandle::Known(i));
                self.stats.unused_freed += 1;
            }
        }
    }

    /// Loads `maps/<name>.bsp` into slot 0, keeping the current world when
    /// it is the same map.
    pub fn load_world(&mut self, name: &str) -> ModelResult<()> {
        if name.is_empty() {
            return Err(ModelError::EmptyWorldName);
        }
        self.stats.reset_level();

        let fullname = format!("maps/{}.bsp", name);

        // explicitly free the old map if different, so slot 0 is the world
        let same_map = self.mod_known[0].as_ref().is_some_and(|m| m.name == fullname);
        if self.config.flush_map || !same_map {
            self.free(ModelHandle::Known(0));
        }

        match self.find_or_load(&fullname, ModTypes::BRUSH)? {
            Some(handle) => {
                self.world = Some(handle);
                com_dprintf(&format!(
                    "load_world: '{}' fs {:.1} ms, world {:.1} ms\n",
                    fullname, self.stats.fs_time_ms, self.stats.world_time_ms
                ));
                Ok(())
            }
            None => Err(ModelError::WorldNotFound(fullname)),
        }
    }

    // ========================================================
    // Registration
    // ========================================================

    /// Starts a level load: advances the sequence and loads the world.
    pub fn begin_registration(&mut self, map: &str) -> ModelResult<()> {
        self.registration_started = true;
        self.registration_sequence += 1;
        self.images.begin_registration(self.registration_sequence);
        self.load_world(map)
    }

    pub fn register_model(&mut self, name: &str) -> ModelResult<Option<ModelHandle>> {
        self.find_or_load(name, ModTypes::all())
    }

    /// Ends a level load: everything not touched since `begin_registration`
    /// is freed, models first and then images.
    pub fn end_registration(&mut self) {
        self.free_unused();
        self.images.free_unused(self.registration_sequence);
        self.registration_started = false;

        com_dprintf(&format!(
            "end_registration: {} models, {} hits, {} freed, {} inline, {} failed\n",
            self.stats.pool_used,
            self.stats.cache_hits,
            self.stats.unused_freed,
            self.stats.inline_used,
            self.stats.failed
        ));
    }

    /// Prints every loaded model with its hunk size. Returns the total.
    pub fn model_list(&self) -> usize {
        let mut total = 0;
        com_printf("Loaded models:\n");
        for m in self.mod_known.iter().flatten() {
            com_printf(&format!("{:8} : {}\n", m.hunk.size(), m.name));
            total += m.hunk.size();
        }
        com_printf(&format!("Total resident: {}\n", total));
        total
    }

    pub fn shutdown(&mut self) {
        for i in 0..self.mod_known.len() {
            self.free(ModelHandle::Known(i));
        }
        self.mod_inline.iter_mut().for_each(|slot| *slot = None);
        self.world = None;
        self.registration_started = false;
    }
}

/// atoi-style parse: optional sign and leading digits, 0 when none.
fn leading_int(s: &str) -> i64 {
    let s = s.trim_start();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
    digits[..end].parse::<i64>().map_or(0, |n| sign * n)
}

// ============================================================
// Caller-facing wrappers: errors here end the process
// ============================================================

pub fn r_begin_registration<F: FileLoader, I: ImageCache>(models: &mut ModelManager<F, I>, map: &str) {
    if let Err(e) = models.begin_registration(map) {
        com_error(ERR_FATAL, &e.to_string());
    }
}

pub fn r_register_model<F: FileLoader, I: ImageCache>(
    models: &mut ModelManager<F, I>,
    name: &str,
) -> Option<ModelHandle> {
    match models.register_model(name) {
        Ok(handle) => handle,
        Err(e) => {
            com_error(ERR_FATAL, &e.to_string());
            None
        }
    }
}

pub fn r_end_registration<F: FileLoader, I: ImageCache>(models: &mut ModelManager<F, I>) {
    models.end_registration();
}

// ============================================================
// ALIAS MODELS
// ============================================================

/// Reads `count` records starting at byte `ofs`.
fn read_array<T: LumpRecord>(name: &str, buf: &[u8], ofs: i32, count: i32) -> ModelResult<Vec<T>> {
    let start = usize::try_from(ofs).map_err(|_| ModelError::Truncated(name.to_string()))?;
    let count = count.max(0) as usize;
    let end = count
        .checked_mul(T::SIZE)
        .and_then(|n| n.checked_add(start))
        .filter(|&end| end <= buf.len())
        .ok_or_else(|| ModelError::Truncated(name.to_string()))?;

    let mut cur = Cursor::new(&buf[start..end]);
    (0..count)
        .map(|_| T::read_le(&mut cur).map_err(ModelError::truncated(name)))
        .collect()
}

/// `count` fixed-width names starting at byte `ofs`.
fn read_names(name: &str, buf: &[u8], ofs: i32, count: i32, width: usize) -> ModelResult<Vec<String>> {
    let start = usize::try_from(ofs).map_err(|_| ModelError::Truncated(name.to_string()))?;
    (0..count.max(0) as usize)
        .map(|i| {
            let at = start + i * width;
            buf.get(at..at + width)
                .map(|raw| name_str(raw).to_string())
                .ok_or_else(|| ModelError::Truncated(name.to_string()))
        })
        .collect()
}

pub fn load_alias_model<I: ImageCache>(model: &mut Model, buf: &[u8], images: &mut I) -> ModelResult<()> {
    let name = model.name.clone();
    let header = DMdl::read_le(&mut Cursor::new(buf)).map_err(ModelError::truncated(&name))?;
    if header.version != ALIAS_VERSION {
        return Err(ModelError::WrongVersion {
            name,
            found: header.version,
            expected: ALIAS_VERSION,
        });
    }

    let bad = |reason: String| ModelError::BadAliasModel { name: name.clone(), reason };
    if header.skinheight > MAX_LBM_HEIGHT {
        return Err(bad(format!("has a skin taller than {}", MAX_LBM_HEIGHT)));
    }
    if header.num_xyz <= 0 {
        return Err(bad("has no vertices".to_string()));
    }
    if header.num_xyz > MAX_VERTS as i32 {
        return Err(bad("has too many vertices".to_string()));
    }
    if header.num_st <= 0 {
        return Err(bad("has no st vertices".to_string()));
    }
    if header.num_tris <= 0 {
        return Err(bad("has no triangles".to_string()));
    }
    if header.num_tris > MAX_TRIANGLES as i32 {
        return Err(bad("has too many triangles".to_string()));
    }
    if header.num_frames <= 0 {
        return Err(bad("has no frames".to_string()));
    }
    if header.num_frames > MAX_FRAMES as i32 {
        return Err(bad("has too many frames".to_string()));
    }
    if header.num_skins < 0 || header.num_skins > MAX_MD2SKINS as i32 {
        return Err(bad(format!("has {} skins", header.num_skins)));
    }

    model.hunk = Hunk::begin(buf.len() + HUNK_ROUNDING_SLACK, MemTag::ModelAlias);
    model.hunk.alloc(header.ofs_end.max(0) as usize)?;

    let st = read_array::<DStVert>(&name, buf, header.ofs_st, header.num_st)?;
    let tris = read_array::<DTriangle>(&name, buf, header.ofs_tris, header.num_tris)?;

    let mut frames = Vec::with_capacity(header.num_frames as usize);
    for i in 0..header.num_frames {
        let ofs = i
            .checked_mul(header.framesize)
            .and_then(|n| n.checked_add(header.ofs_frames))
            .ok_or_else(|| ModelError::Truncated(name.clone()))?;
        let frame = read_array::<DAliasFrame>(&name, buf, ofs, 1)?.remove(0);
        // verts are all 8 bit, so no swapping needed
        let verts = read_array::<DTriVertx>(&name, buf, ofs.saturating_add(DAliasFrame::SIZE as i32), header.num_xyz)?;
        frames.push(AliasFrame {
            scale: frame.scale,
            translate: frame.translate,
            name: name_str(&frame.name).to_string(),
            verts,
        });
    }

    let glcmds = read_array::<i32>(&name, buf, header.ofs_glcmds, header.num_glcmds)?;

    // register all skins
    let skin_names = read_names(&name, buf, header.ofs_skins, header.num_skins, MAX_SKINNAME)?;
    model.skins = skin_names
        .iter()
        .map(|skin| images.find_image(skin, ImageType::Skin))
        .collect();

    model.mod_type = ModType::Alias;
    model.num_frames = header.num_frames;
    model.mins = [-32.0, -32.0, -32.0];
    model.maxs = [32.0, 32.0, 32.0];
    model.data = ModelData::Alias(AliasModel {
        header,
        skin_names,
        st,
        tris,
        frames,
        glcmds,
    });

    com_dprintf(&format!("New alias model '{}' loaded\n", name));
    Ok(())
}

// ============================================================
// SPRITE MODELS
// ============================================================

pub fn load_sprite_model<I: ImageCache>(model: &mut Model, buf: &[u8], images: &mut I) -> ModelResult<()> {
    let name = model.name.clone();
    let header = DSprite::read_le(&mut Cursor::new(buf)).map_err(ModelError::truncated(&name))?;
    if header.version != SPRITE_VERSION {
        return Err(ModelError::WrongVersion {
            name,
            found: header.version,
            expected: SPRITE_VERSION,
        });
    }
    if header.numframes > MAX_MD2SKINS as i32 {
        return Err(ModelError::TooManySpriteFrames {
            name,
            count: header.numframes,
            max: MAX_MD2SKINS,
        });
    }

    model.hunk = Hunk::begin(buf.len() + HUNK_ROUNDING_SLACK, MemTag::ModelSprite);
    model.hunk.alloc(buf.len())?;

    let frames: Vec<SpriteFrame> = read_array::<DSprFrame>(&name, buf, DSprite::SIZE as i32, header.numframes)?
        .into_iter()
        .map(|f| SpriteFrame {
            width: f.width,
            height: f.height,
            origin_x: f.origin_x,
            origin_y: f.origin_y,
            name: name_str(&f.name).to_string(),
        })
        .collect();

    model.skins = frames
        .iter()
        .map(|frame| images.find_image(&frame.name, ImageType::Sprite))
        .collect();
    model.mod_type = ModType::Sprite;
    model.num_frames = frames.len() as i32;
    model.data = ModelData::Sprite(SpriteModel { frames });

    com_dprintf(&format!("New sprite model '{}' loaded\n", name));
    Ok(())
}
