// Copyright (C) 1997-2001 Id Software, Inc.
// GPL-2.0-or-later
//
// Image registry used by the model loaders. Only the metadata the loaders
// need is kept: name, usage, dimensions and registration sequence. Pixel
// upload belongs to the backend.

use std::io::Cursor;

use q2ps2_common::common::com_dprintf;
use q2ps2_common::files::FileLoader;
use q2ps2_common::q_shared::{com_file_extension, com_hash_string, ImageType};
use q2ps2_common::qfiles::{LumpRecord, MipTex};

/// Stable reference to a registry slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageHandle(pub u32);

/// What the model loaders need from a texture cache.
pub trait ImageCache {
    /// Starts a new registration; images found from now on are stamped with
    /// `sequence`.
    fn begin_registration(&mut self, sequence: i32);

    /// Finds or loads an image. `None` if it cannot be loaded.
    fn find_image(&mut self, name: &str, image_type: ImageType) -> Option<ImageHandle>;

    /// Marks an image as still referenced by `sequence`.
    fn touch_image(&mut self, handle: ImageHandle, sequence: i32);

    fn image_size(&self, handle: ImageHandle) -> Option<(u32, u32)>;

    /// Checkerboard fallback for wall textures that fail to load.
    fn no_texture(&self) -> ImageHandle;

    /// Frees every image not stamped with `sequence`.
    fn free_unused(&mut self, sequence: i32);
}

#[derive(Debug, Clone)]
pub struct Image {
    pub name: String,
    pub hash: u32,
    pub image_type: ImageType,
    pub width: u32,
    pub height: u32,
    pub registration_sequence: i32,
}

const NOTEXTURE_NAME: &str = "***r_notexture***";
const NOTEXTURE_SIZE: u32 = 16;

/// Concrete image cache backed by a file loader.
pub struct ImageRegistry<F: FileLoader> {
    files: F,
    images: Vec<Option<Image>>,
    registration_sequence: i32,
    pub cache_hits: u32,
    pub unused_freed: u32,
    pub failed: u32,
}

impl<F: FileLoader> ImageRegistry<F> {
    pub fn new(files: F) -> Self {
        let notexture = Image {
            name: NOTEXTURE_NAME.to_string(),
            hash: com_hash_string(NOTEXTURE_NAME),
            image_type: ImageType::Wall,
            width: NOTEXTURE_SIZE,
            height: NOTEXTURE_SIZE,
            registration_sequence: 0,
        };
        Self {
            files,
            images: vec![Some(notexture)],
            registration_sequence: 0,
            cache_hits: 0,
            unused_freed: 0,
            failed: 0,
        }
    }

    pub fn image(&self, handle: ImageHandle) -> Option<&Image> {
        self.images.get(handle.0 as usize).and_then(|slot| slot.as_ref())
    }

    /// Number of live images, including the built-in one.
    pub fn num_images(&self) -> usize {
        self.images.iter().filter(|slot| slot.is_some()).count()
    }

    fn insert(&mut self, image: Image) -> ImageHandle {
        if let Some(i) = self.images.iter().position(|slot| slot.is_none()) {
            self.images[i] = Some(image);
            return ImageHandle(i as u32);
        }
        self.images.push(Some(image));
        ImageHandle((self.images.len() - 1) as u32)
    }

    fn load_dimensions(&mut self, name: &str) -> Option<(u32, u32)> {
        let raw = self.files.load_file(name)?;
        let ext = com_file_extension(name).to_ascii_lowercase();
        match ext.as_str() {
            ".wal" => wal_dimensions(&raw),
            ".pcx" => pcx_dimensions(&raw),
            ".tga" => decoded_dimensions(&raw, image::ImageFormat::Tga),
            ".png" => decoded_dimensions(&raw, image::ImageFormat::Png),
            ".jpg" | ".jpeg" => decoded_dimensions(&raw, image::ImageFormat::Jpeg),
            _ => None,
        }
    }
}

/// Width and height from a miptex header.
fn wal_dimensions(raw: &[u8]) -> Option<(u32, u32)> {
    if raw.len() < MipTex::SIZE {
        return None;
    }
    let mt = MipTex::read_le(&mut Cursor::new(raw)).ok()?;
    if mt.width == 0 || mt.height == 0 {
        return None;
    }
    Some((mt.width, mt.height))
}

/// Width and height from a PCX header (manufacturer 0x0a, 8 bits per pixel).
fn pcx_dimensions(raw: &[u8]) -> Option<(u32, u32)> {
    if raw.len() < 128 || raw[0] != 0x0a || raw[2] != 1 || raw[3] != 8 {
        return None;
    }
    let word = |at: usize| u16::from_le_bytes([raw[at], raw[at + 1]]) as u32;
    let (xmin, ymin, xmax, ymax) = (word(4), word(6), word(8), word(10));
    if xmax < xmin || ymax < ymin || xmax >= 640 || ymax >= 480 {
        return None;
    }
    Some((xmax - xmin + 1, ymax - ymin + 1))
}

fn decoded_dimensions(raw: &[u8], format: image::ImageFormat) -> Option<(u32, u32)> {
    let img = image::load_from_memory_with_format(raw, format).ok()?;
    Some((img.width(), img.height()))
}

impl<F: FileLoader> ImageCache for ImageRegistry<F> {
    fn begin_registration(&mut self, sequence: i32) {
        self.registration_sequence = sequence;
        self.cache_hits = 0;
        self.unused_freed = 0;
        self.failed = 0;
    }

    fn find_image(&mut self, name: &str, image_type: ImageType) -> Option<ImageHandle> {
        if name.len() < 5 {
            return None;
        }

        let hash = com_hash_string(name);
        let sequence = self.registration_sequence;
        for (i, slot) in self.images.iter_mut().enumerate() {
            if let Some(image) = slot {
                if image.hash == hash && image.name == name {
                    image.registration_sequence = sequence;
                    self.cache_hits += 1;
                    return Some(ImageHandle(i as u32));
                }
            }
        }

        let (width, height) = match self.load_dimensions(name) {
            Some(dims) => dims,
            None => {
                com_dprintf(&format!("find_image: can't load {}\n", name));
                self.failed += 1;
                return None;
            }
        };

        Some(self.insert(Image {
            name: name.to_string(),
            hash,
            image_type,
            width,
            height,
            registration_sequence: sequence,
        }))
    }

    fn touch_image(&mut self, handle: ImageHandle, sequence: i32) {
        if let Some(Some(image)) = self.images.get_mut(handle.0 as usize) {
            image.registration_sequence = sequence;
        }
    }

    fn image_size(&self, handle: ImageHandle) -> Option<(u32, u32)> {
        self.image(handle).map(|image| (image.width, image.height))
    }

    fn no_texture(&self) -> ImageHandle {
        ImageHandle(0)
    }

    fn free_unused(&mut self, sequence: i32) {
        // never free the built-in image or pics
        for slot in self.images.iter_mut().skip(1) {
            let stale = match slot {
                Some(image) => image.registration_sequence != sequence && image.image_type != ImageType::Pic,
                None => false,
            };
            if stale {
                *slot = None;
                self.unused_freed += 1;
            }
        }
    }
}
