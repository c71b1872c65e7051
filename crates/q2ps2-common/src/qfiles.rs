// qfiles.rs — Quake 2 file format structures
// Converted from: qcommon/qfiles.h
//
// Every multi-byte field is stored little-endian on disk. Records are
// decoded field by field with byteorder, never by casting the file buffer.

use std::io::{self, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::q_shared::Vec3;

/// An on-disk record of fixed size that can be decoded from a little-endian
/// byte stream.
pub trait LumpRecord: Sized {
    /// Size of one record on disk, in bytes.
    const SIZE: usize;

    fn read_le<R: Read>(rdr: &mut R) -> io::Result<Self>;
}

fn read_vec3<R: Read>(rdr: &mut R) -> io::Result<Vec3> {
    Ok([
        rdr.read_f32::<LittleEndian>()?,
        rdr.read_f32::<LittleEndian>()?,
        rdr.read_f32::<LittleEndian>()?,
    ])
}

fn read_name<R: Read, const N: usize>(rdr: &mut R) -> io::Result<[u8; N]> {
    let mut name = [0u8; N];
    rdr.read_exact(&mut name)?;
    Ok(name)
}

/// Nul-terminated fixed-size name field as a string slice.
pub fn name_str(name: &[u8]) -> &str {
    let len = name.iter().position(|&b| b == 0).unwrap_or(name.len());
    std::str::from_utf8(&name[..len]).unwrap_or("")
}

// ============================================================
// MD2 model format
// ============================================================

/// MD2 magic: "IDP2" in little-endian
pub const IDALIASHEADER: u32 = (b'2' as u32) << 24 | (b'P' as u32) << 16 | (b'D' as u32) << 8 | b'I' as u32;
pub const ALIAS_VERSION: i32 = 8;

pub const MAX_TRIANGLES: usize = 4096;
pub const MAX_VERTS: usize = 2048;
pub const MAX_FRAMES: usize = 512;
pub const MAX_MD2SKINS: usize = 32;
pub const MAX_SKINNAME: usize = 64;

/// Tallest skin image an alias model may reference.
pub const MAX_LBM_HEIGHT: i32 = 480;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DStVert {
    pub s: i16,
    pub t: i16,
}

impl LumpRecord for DStVert {
    const SIZE: usize = 4;

    fn read_le<R: Read>(rdr: &mut R) -> io::Result<Self> {
        Ok(Self {
            s: rdr.read_i16::<LittleEndian>()?,
            t: rdr.read_i16::<LittleEndian>()?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DTriangle {
    pub index_xyz: [i16; 3],
    pub index_st: [i16; 3],
}

impl LumpRecord for DTriangle {
    const SIZE: usize = 12;

    fn read_le<R: Read>(rdr: &mut R) -> io::Result<Self> {
        let mut tri = Self::default();
        for v in tri.index_xyz.iter_mut() {
            *v = rdr.read_i16::<LittleEndian>()?;
        }
        for v in tri.index_st.iter_mut() {
            *v = rdr.read_i16::<LittleEndian>()?;
        }
        Ok(tri)
    }
}

/// Compressed frame vertex. All 8 bit, so nothing to swap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DTriVertx {
    pub v: [u8; 3],
    pub lightnormalindex: u8,
}

impl LumpRecord for DTriVertx {
    const SIZE: usize = 4;

    fn read_le<R: Read>(rdr: &mut R) -> io::Result<Self> {
        let mut raw = [0u8; 4];
        rdr.read_exact(&mut raw)?;
        Ok(Self {
            v: [raw[0], raw[1], raw[2]],
            lightnormalindex: raw[3],
        })
    }
}

/// Frame header; `num_xyz` vertexes follow it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DAliasFrame {
    pub scale: Vec3,
    pub translate: Vec3,
    pub name: [u8; 16],
}

impl LumpRecord for DAliasFrame {
    const SIZE: usize = 40;

    fn read_le<R: Read>(rdr: &mut R) -> io::Result<Self> {
        Ok(Self {
            scale: read_vec3(rdr)?,
            translate: read_vec3(rdr)?,
            name: read_name(rdr)?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DMdl {
    pub ident: i32,
    pub version: i32,
    pub skinwidth: i32,
    pub skinheight: i32,
    pub framesize: i32, // byte size of each frame
    pub num_skins: i32,
    pub num_xyz: i32,
    pub num_st: i32, // greater than num_xyz for seams
    pub num_tris: i32,
    pub num_glcmds: i32, // dwords in strip/fan command list
    pub num_frames: i32,
    pub ofs_skins: i32, // each skin is a MAX_SKINNAME string
    pub ofs_st: i32,
    pub ofs_tris: i32,
    pub ofs_frames: i32,
    pub ofs_glcmds: i32,
    pub ofs_end: i32, // end of file
}

impl LumpRecord for DMdl {
    const SIZE: usize = 17 * 4;

    fn read_le<R: Read>(rdr: &mut R) -> io::Result<Self> {
        let mut f = [0i32; 17];
        rdr.read_i32_into::<LittleEndian>(&mut f)?;
        Ok(Self {
            ident: f[0],
            version: f[1],
            skinwidth: f[2],
            skinheight: f[3],
            framesize: f[4],
            num_skins: f[5],
            num_xyz: f[6],
            num_st: f[7],
            num_tris: f[8],
            num_glcmds: f[9],
            num_frames: f[10],
            ofs_skins: f[11],
            ofs_st: f[12],
            ofs_tris: f[13],
            ofs_frames: f[14],
            ofs_glcmds: f[15],
            ofs_end: f[16],
        })
    }
}

// ============================================================
// SP2 sprite format
// ============================================================

/// Sprite magic: "IDS2" in little-endian
pub const IDSPRITEHEADER: u32 = (b'2' as u32) << 24 | (b'S' as u32) << 16 | (b'D' as u32) << 8 | b'I' as u32;
pub const SPRITE_VERSION: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DSprFrame {
    pub width: i32,
    pub height: i32,
    pub origin_x: i32, // raster coordinates inside pic
    pub origin_y: i32,
    pub name: [u8; MAX_SKINNAME], // name of pcx file
}

impl LumpRecord for DSprFrame {
    const SIZE: usize = 16 + MAX_SKINNAME;

    fn read_le<R: Read>(rdr: &mut R) -> io::Result<Self> {
        Ok(Self {
            width: rdr.read_i32::<LittleEndian>()?,
            height: rdr.read_i32::<LittleEndian>()?,
            origin_x: rdr.read_i32::<LittleEndian>()?,
            origin_y: rdr.read_i32::<LittleEndian>()?,
            name: read_name(rdr)?,
        })
    }
}

/// Sprite header; `numframes` frames follow it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DSprite {
    pub ident: i32,
    pub version: i32,
    pub numframes: i32,
}

impl LumpRecord for DSprite {
    const SIZE: usize = 12;

    fn read_le<R: Read>(rdr: &mut R) -> io::Result<Self> {
        Ok(Self {
            ident: rdr.read_i32::<LittleEndian>()?,
            version: rdr.read_i32::<LittleEndian>()?,
            numframes: rdr.read_i32::<LittleEndian>()?,
        })
    }
}

// ============================================================
// WAL texture format
// ============================================================

pub const MIPLEVELS: usize = 4;

/// WAL header. Only the fields the image registry needs are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MipTex {
    pub name: [u8; 32],
    pub width: u32,
    pub height: u32,
}

impl LumpRecord for MipTex {
    const SIZE: usize = 32 + 4 + 4 + 4 * MIPLEVELS + 32 + 3 * 4;

    fn read_le<R: Read>(rdr: &mut R) -> io::Result<Self> {
        Ok(Self {
            name: read_name(rdr)?,
            width: rdr.read_u32::<LittleEndian>()?,
            height: rdr.read_u32::<LittleEndian>()?,
        })
    }
}

// ============================================================
// BSP file format
// ============================================================

/// BSP magic: "IBSP" in little-endian
pub const IDBSPHEADER: u32 = (b'P' as u32) << 24 | (b'S' as u32) << 16 | (b'B' as u32) << 8 | b'I' as u32;
pub const BSPVERSION: i32 = 38;

// Upper design bounds
pub const MAX_MAP_MODELS: usize = 1024;
pub const MAX_MAP_LEAFS: usize = 65536;
pub const MAX_MAP_SURFEDGES: usize = 256000;

// Lump indices
pub const LUMP_ENTITIES: usize = 0;
pub const LUMP_PLANES: usize = 1;
pub const LUMP_VERTEXES: usize = 2;
pub const LUMP_VISIBILITY: usize = 3;
pub const LUMP_NODES: usize = 4;
pub const LUMP_TEXINFO: usize = 5;
pub const LUMP_FACES: usize = 6;
pub const LUMP_LIGHTING: usize = 7;
pub const LUMP_LEAFS: usize = 8;
pub const LUMP_LEAFFACES: usize = 9;
pub const LUMP_LEAFBRUSHES: usize = 10;
pub const LUMP_EDGES: usize = 11;
pub const LUMP_SURFEDGES: usize = 12;
pub const LUMP_MODELS: usize = 13;
pub const LUMP_BRUSHES: usize = 14;
pub const LUMP_BRUSHSIDES: usize = 15;
pub const LUMP_POP: usize = 16;
pub const LUMP_AREAS: usize = 17;
pub const LUMP_AREAPORTALS: usize = 18;
pub const HEADER_LUMPS: usize = 19;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lump {
    pub fileofs: i32,
    pub filelen: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DHeader {
    pub ident: i32,
    pub version: i32,
    pub lumps: [Lump; HEADER_LUMPS],
}

impl LumpRecord for DHeader {
    const SIZE: usize = 8 + HEADER_LUMPS * 8;

    fn read_le<R: Read>(rdr: &mut R) -> io::Result<Self> {
        let mut header = Self {
            ident: rdr.read_i32::<LittleEndian>()?,
            version: rdr.read_i32::<LittleEndian>()?,
            ..Default::default()
        };
        for lump in header.lumps.iter_mut() {
            lump.fileofs = rdr.read_i32::<LittleEndian>()?;
            lump.filelen = rdr.read_i32::<LittleEndian>()?;
        }
        Ok(header)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DModel {
    pub mins: Vec3,
    pub maxs: Vec3,
    pub origin: Vec3, // for sounds or lights
    pub headnode: i32,
    pub firstface: i32, // submodels just draw faces
    pub numfaces: i32,  // without walking the bsp tree
}

impl LumpRecord for DModel {
    const SIZE: usize = 48;

    fn read_le<R: Read>(rdr: &mut R) -> io::Result<Self> {
        Ok(Self {
            mins: read_vec3(rdr)?,
            maxs: read_vec3(rdr)?,
            origin: read_vec3(rdr)?,
            headnode: rdr.read_i32::<LittleEndian>()?,
            firstface: rdr.read_i32::<LittleEndian>()?,
            numfaces: rdr.read_i32::<LittleEndian>()?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DVertex {
    pub point: Vec3,
}

impl LumpRecord for DVertex {
    const SIZE: usize = 12;

    fn read_le<R: Read>(rdr: &mut R) -> io::Result<Self> {
        Ok(Self { point: read_vec3(rdr)? })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DPlane {
    pub normal: Vec3,
    pub dist: f32,
    pub plane_type: i32, // PLANE_X - PLANE_ANYZ
}

impl LumpRecord for DPlane {
    const SIZE: usize = 20;

    fn read_le<R: Read>(rdr: &mut R) -> io::Result<Self> {
        Ok(Self {
            normal: read_vec3(rdr)?,
            dist: rdr.read_f32::<LittleEndian>()?,
            plane_type: rdr.read_i32::<LittleEndian>()?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DNode {
    pub planenum: i32,
    pub children: [i32; 2], // negative numbers are -(leafs+1), not nodes
    pub mins: [i16; 3],     // for frustom culling
    pub maxs: [i16; 3],
    pub firstface: u16,
    pub numfaces: u16, // counting both sides
}

impl LumpRecord for DNode {
    const SIZE: usize = 28;

    fn read_le<R: Read>(rdr: &mut R) -> io::Result<Self> {
        let mut node = Self {
            planenum: rdr.read_i32::<LittleEndian>()?,
            ..Default::default()
        };
        rdr.read_i32_into::<LittleEndian>(&mut node.children)?;
        rdr.read_i16_into::<LittleEndian>(&mut node.mins)?;
        rdr.read_i16_into::<LittleEndian>(&mut node.maxs)?;
        node.firstface = rdr.read_u16::<LittleEndian>()?;
        node.numfaces = rdr.read_u16::<LittleEndian>()?;
        Ok(node)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexInfo {
    pub vecs: [[f32; 4]; 2], // [s/t][xyz offset]
    pub flags: i32,          // miptex flags + overrides
    pub value: i32,          // light emission, etc
    pub texture: [u8; 32],   // texture name (textures/*.wal)
    pub nexttexinfo: i32,    // for animations, -1 = end of chain
}

impl LumpRecord for TexInfo {
    const SIZE: usize = 32 + 4 + 4 + 32 + 4;

    fn read_le<R: Read>(rdr: &mut R) -> io::Result<Self> {
        let mut vecs = [[0.0f32; 4]; 2];
        for v in vecs.iter_mut() {
            rdr.read_f32_into::<LittleEndian>(v)?;
        }
        Ok(Self {
            vecs,
            flags: rdr.read_i32::<LittleEndian>()?,
            value: rdr.read_i32::<LittleEndian>()?,
            texture: read_name(rdr)?,
            nexttexinfo: rdr.read_i32::<LittleEndian>()?,
        })
    }
}

/// Note that edge 0 is never used, because negative edge nums are used for
/// counterclockwise use of the edge in a face.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DEdge {
    pub v: [u16; 2], // vertex numbers
}

impl LumpRecord for DEdge {
    const SIZE: usize = 4;

    fn read_le<R: Read>(rdr: &mut R) -> io::Result<Self> {
        Ok(Self {
            v: [rdr.read_u16::<LittleEndian>()?, rdr.read_u16::<LittleEndian>()?],
        })
    }
}

pub const MAXLIGHTMAPS: usize = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DFace {
    pub planenum: u16,
    pub side: i16,
    pub firstedge: i32, // we must support > 64k edges
    pub numedges: i16,
    pub texinfo: i16,
    pub styles: [u8; MAXLIGHTMAPS],
    pub lightofs: i32, // start of [numstyles*surfsize] samples
}

impl LumpRecord for DFace {
    const SIZE: usize = 20;

    fn read_le<R: Read>(rdr: &mut R) -> io::Result<Self> {
        let planenum = rdr.read_u16::<LittleEndian>()?;
        let side = rdr.read_i16::<LittleEndian>()?;
        let firstedge = rdr.read_i32::<LittleEndian>()?;
        let numedges = rdr.read_i16::<LittleEndian>()?;
        let texinfo = rdr.read_i16::<LittleEndian>()?;
        let styles = read_name(rdr)?;
        let lightofs = rdr.read_i32::<LittleEndian>()?;
        Ok(Self { planenum, side, firstedge, numedges, texinfo, styles, lightofs })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DLeaf {
    pub contents: i32, // OR of all brushes (not needed?)
    pub cluster: i16,
    pub area: i16,
    pub mins: [i16; 3], // for frustum culling
    pub maxs: [i16; 3],
    pub firstleafface: u16,
    pub numleaffaces: u16,
    pub firstleafbrush: u16,
    pub numleafbrushes: u16,
}

impl LumpRecord for DLeaf {
    const SIZE: usize = 28;

    fn read_le<R: Read>(rdr: &mut R) -> io::Result<Self> {
        let mut leaf = Self {
            contents: rdr.read_i32::<LittleEndian>()?,
            cluster: rdr.read_i16::<LittleEndian>()?,
            area: rdr.read_i16::<LittleEndian>()?,
            ..Default::default()
        };
        rdr.read_i16_into::<LittleEndian>(&mut leaf.mins)?;
        rdr.read_i16_into::<LittleEndian>(&mut leaf.maxs)?;
        leaf.firstleafface = rdr.read_u16::<LittleEndian>()?;
        leaf.numleaffaces = rdr.read_u16::<LittleEndian>()?;
        leaf.firstleafbrush = rdr.read_u16::<LittleEndian>()?;
        leaf.numleafbrushes = rdr.read_u16::<LittleEndian>()?;
        Ok(leaf)
    }
}

/// Leaf-face (mark surface) index.
impl LumpRecord for i16 {
    const SIZE: usize = 2;

    fn read_le<R: Read>(rdr: &mut R) -> io::Result<Self> {
        rdr.read_i16::<LittleEndian>()
    }
}

/// Surf-edge index.
impl LumpRecord for i32 {
    const SIZE: usize = 4;

    fn read_le<R: Read>(rdr: &mut R) -> io::Result<Self> {
        rdr.read_i32::<LittleEndian>()
    }
}

// Visibility
pub const DVIS_PVS: usize = 0;
pub const DVIS_PHS: usize = 1;
