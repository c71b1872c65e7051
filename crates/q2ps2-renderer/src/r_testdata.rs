// Copyright (C) 1997-2001 Id Software, Inc.
// GPL-2.0-or-later
//
// Test fixtures: little-endian BSP, MD2, SP2 and WAL images built in memory,
// and an in-memory file loader to serve them.

use std::collections::HashMap;
use std::sync::{Mutex, Once};
use std::thread::{self, ThreadId};

use byteorder::{LittleEndian, WriteBytesExt};
use q2ps2_common::files::FileLoader;
use q2ps2_common::q_shared::SURF_WARP;
use q2ps2_common::qfiles::*;

/// Files served from memory. Counts every successful load.
#[derive(Default, Clone)]
pub struct MemFiles {
    files: HashMap<String, Vec<u8>>,
    pub loads: usize,
}

impl MemFiles {
    pub fn insert(&mut self, name: &str, data: Vec<u8>) {
        self.files.insert(name.to_string(), data);
    }
}

impl FileLoader for MemFiles {
    fn load_file(&mut self, path: &str) -> Option<Vec<u8>> {
        let data = self.files.get(path).cloned();
        if data.is_some() {
            self.loads += 1;
        }
        data
    }
}

pub fn name32(s: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[..s.len()].copy_from_slice(s.as_bytes());
    out
}

fn name64(s: &str) -> [u8; 64] {
    let mut out = [0u8; 64];
    out[..s.len()].copy_from_slice(s.as_bytes());
    out
}

/// A WAL texture: miptex header followed by the first mip level.
pub fn wal_bytes(name: &str, width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&name32(name));
    out.write_u32::<LittleEndian>(width).unwrap();
    out.write_u32::<LittleEndian>(height).unwrap();
    out.write_u32::<LittleEndian>(MipTex::SIZE as u32).unwrap();
    for _ in 1..MIPLEVELS {
        out.write_u32::<LittleEndian>(0).unwrap();
    }
    out.extend_from_slice(&[0u8; 32]); // animname
    for _ in 0..3 {
        out.write_i32::<LittleEndian>(0).unwrap(); // flags, contents, value
    }
    out.resize(out.len() + (width * height) as usize, 7);
    out
}

/// A PCX with only the header filled in.
pub fn pcx_bytes(width: u16, height: u16) -> Vec<u8> {
    let mut raw = vec![0u8; 128];
    raw[0] = 0x0a;
    raw[1] = 5;
    raw[2] = 1;
    raw[3] = 8;
    raw[8..10].copy_from_slice(&(width - 1).to_le_bytes());
    raw[10..12].copy_from_slice(&(height - 1).to_le_bytes());
    raw
}

/// Every image the fixtures below reference.
pub fn texture_files() -> MemFiles {
    let mut files = MemFiles::default();
    for (name, w, h) in [
        ("e1u1/floor", 64, 64),
        ("e1u1/wall1", 64, 32),
        ("e1u1/wall2", 64, 32),
        ("e1u1/water", 64, 64),
    ] {
        files.insert(&format!("textures/{}.wal", name), wal_bytes(name, w, h));
    }
    files.insert("models/box/skin.pcx", pcx_bytes(32, 32));
    files.insert("sprites/flare_0.pcx", pcx_bytes(16, 16));
    files.insert("sprites/flare_1.pcx", pcx_bytes(16, 16));
    files
}

// ============================================================
// BSP
// ============================================================

pub struct BspBuilder {
    pub version: i32,
    pub vertexes: Vec<Vec3f>,
    pub edges: Vec<[u16; 2]>,
    pub surfedges: Vec<i32>,
    pub lighting: Vec<u8>,
    pub planes: Vec<DPlane>,
    pub texinfo: Vec<TexInfo>,
    pub faces: Vec<DFace>,
    pub leaffaces: Vec<i16>,
    pub visibility: Vec<u8>,
    pub leafs: Vec<DLeaf>,
    pub nodes: Vec<DNode>,
    pub models: Vec<DModel>,
    /// Appends junk bytes to one lump.
    pub extra_lump_bytes: Option<(usize, usize)>,
}

pub type Vec3f = [f32; 3];

fn texinfo(s: [f32; 4], t: [f32; 4], flags: i32, texture: &str, next: i32) -> TexInfo {
    TexInfo { vecs: [s, t], flags, value: 0, texture: name32(texture), nexttexinfo: next }
}

fn face(planenum: u16, side: i16, firstedge: i32, texinfo: i16, lightofs: i32) -> DFace {
    DFace { planenum, side, firstedge, numedges: 4, texinfo, styles: [0, 255, 255, 255], lightofs }
}

impl BspBuilder {
    /// A floor, a wall and a water surface split into three leafs by two
    /// nodes, with one door submodel and a two-cluster vis lump.
    ///
    /// node 0: z = 0, front -> node 1, back -> leaf 0 (solid)
    /// node 1: y = 0 facing -y, front -> leaf 1 (cluster 0), back -> leaf 2 (cluster 1)
    pub fn box_world() -> Self {
        let vertexes = vec![
            [0.0, 0.0, 0.0],
            [64.0, 0.0, 0.0],
            [64.0, 64.0, 0.0],
            [0.0, 64.0, 0.0],
            [0.0, 0.0, 64.0],
            [64.0, 0.0, 64.0],
            [0.0, 64.0, 64.0],
            [64.0, 64.0, 64.0],
        ];
        let edges = vec![[0, 0], [0, 1], [1, 2], [3, 2], [0, 3], [1, 5], [4, 5], [0, 4]];
        let surfedges = vec![
            1, 2, -3, -4, // floor
            7, 6, -5, -1, // wall
            1, 2, -3, -4, // water
        ];

        let planes = vec![
            DPlane { normal: [0.0, 0.0, 1.0], dist: 0.0, plane_type: 2 },
            DPlane { normal: [0.0, -1.0, 0.0], dist: 0.0, plane_type: 1 },
        ];

        let x = [1.0, 0.0, 0.0, 0.0];
        let texinfo = vec![
            texinfo(x, [0.0, 1.0, 0.0, 0.0], 0, "e1u1/floor", -1),
            texinfo(x, [0.0, 0.0, -1.0, 0.0], 0, "e1u1/wall1", 2),
            texinfo(x, [0.0, 0.0, -1.0, 0.0], 0, "e1u1/wall2", 1),
            texinfo(x, [0.0, 1.0, 0.0, 0.0], SURF_WARP.bits(), "e1u1/water", -1),
        ];

        let faces = vec![face(0, 0, 0, 0, 0), face(1, 1, 4, 1, 16), face(0, 0, 8, 3, -1)];

        let leaf = |contents: i32, cluster: i16, first: u16, num: u16| DLeaf {
            contents,
            cluster,
            area: 0,
            mins: [0, 0, 0],
            maxs: [64, 64, 64],
            firstleafface: first,
            numleaffaces: num,
            firstleafbrush: 0,
            numleafbrushes: 0,
        };
        let leafs = vec![leaf(1, -1, 0, 0), leaf(0, 0, 0, 2), leaf(0, 1, 2, 1)];

        let nodes = vec![
            DNode {
                planenum: 0,
                children: [1, -1],
                mins: [0, 0, 0],
                maxs: [64, 64, 64],
                firstface: 0,
                numfaces: 1,
            },
            DNode {
                planenum: 1,
                children: [-2, -3],
                mins: [0, 0, 0],
                maxs: [64, 64, 64],
                firstface: 1,
                numfaces: 2,
            },
        ];

        let models = vec![
            DModel {
                mins: [0.0, 0.0, 0.0],
                maxs: [64.0, 64.0, 64.0],
                origin: [0.0; 3],
                headnode: 0,
                firstface: 0,
                numfaces: 3,
            },
            DModel {
                mins: [16.0, -8.0, 0.0],
                maxs: [32.0, 8.0, 64.0],
                origin: [0.0; 3],
                headnode: 1,
                firstface: 1,
                numfaces: 1,
            },
        ];

        // two clusters: 0 sees itself, 1 sees both
        let mut visibility = Vec::new();
        visibility.write_i32::<LittleEndian>(2).unwrap();
        for ofs in [[20, 0], [21, 0]] {
            visibility.write_i32::<LittleEndian>(ofs[0]).unwrap();
            visibility.write_i32::<LittleEndian>(ofs[1]).unwrap();
        }
        visibility.extend_from_slice(&[0x01, 0x03]);

        Self {
            version: BSPVERSION,
            vertexes,
            edges,
            surfedges,
            lighting: (0..64u8).collect(),
            planes,
            texinfo,
            faces,
            leaffaces: vec![0, 1, 2],
            visibility,
            leafs,
            nodes,
            models,
            extra_lump_bytes: None,
        }
    }

    fn lump_data(&self, lump: usize) -> Vec<u8> {
        let mut w = Vec::new();
        match lump {
            LUMP_PLANES => {
                for p in &self.planes {
                    write_vec3(&mut w, &p.normal);
                    w.write_f32::<LittleEndian>(p.dist).unwrap();
                    w.write_i32::<LittleEndian>(p.plane_type).unwrap();
                }
            }
            LUMP_VERTEXES => {
                for v in &self.vertexes {
                    write_vec3(&mut w, v);
                }
            }
            LUMP_VISIBILITY => w.extend_from_slice(&self.visibility),
            LUMP_NODES => {
                for n in &self.nodes {
                    w.write_i32::<LittleEndian>(n.planenum).unwrap();
                    for c in n.children {
                        w.write_i32::<LittleEndian>(c).unwrap();
                    }
                    for v in n.mins.iter().chain(n.maxs.iter()) {
                        w.write_i16::<LittleEndian>(*v).unwrap();
                    }
                    w.write_u16::<LittleEndian>(n.firstface).unwrap();
                    w.write_u16::<LittleEndian>(n.numfaces).unwrap();
                }
            }
            LUMP_TEXINFO => {
                for t in &self.texinfo {
                    for v in t.vecs.iter().flatten() {
                        w.write_f32::<LittleEndian>(*v).unwrap();
                    }
                    w.write_i32::<LittleEndian>(t.flags).unwrap();
                    w.write_i32::<LittleEndian>(t.value).unwrap();
                    w.extend_from_slice(&t.texture);
                    w.write_i32::<LittleEndian>(t.nexttexinfo).unwrap();
                }
            }
            LUMP_FACES => {
                for f in &self.faces {
                    w.write_u16::<LittleEndian>(f.planenum).unwrap();
                    w.write_i16::<LittleEndian>(f.side).unwrap();
                    w.write_i32::<LittleEndian>(f.firstedge).unwrap();
                    w.write_i16::<LittleEndian>(f.numedges).unwrap();
                    w.write_i16::<LittleEndian>(f.texinfo).unwrap();
                    w.extend_from_slice(&f.styles);
                    w.write_i32::<LittleEndian>(f.lightofs).unwrap();
                }
            }
            LUMP_LIGHTING => w.extend_from_slice(&self.lighting),
            LUMP_LEAFS => {
                for l in &self.leafs {
                    w.write_i32::<LittleEndian>(l.contents).unwrap();
                    w.write_i16::<LittleEndian>(l.cluster).unwrap();
                    w.write_i16::<LittleEndian>(l.area).unwrap();
                    for v in l.mins.iter().chain(l.maxs.iter()) {
                        w.write_i16::<LittleEndian>(*v).unwrap();
                    }
                    w.write_u16::<LittleEndian>(l.firstleafface).unwrap();
                    w.write_u16::<LittleEndian>(l.numleaffaces).unwrap();
                    w.write_u16::<LittleEndian>(l.firstleafbrush).unwrap();
                    w.write_u16::<LittleEndian>(l.numleafbrushes).unwrap();
                }
            }
            LUMP_LEAFFACES => {
                for f in &self.leaffaces {
                    w.write_i16::<LittleEndian>(*f).unwrap();
                }
            }
            LUMP_EDGES => {
                for e in &self.edges {
                    w.write_u16::<LittleEndian>(e[0]).unwrap();
                    w.write_u16::<LittleEndian>(e[1]).unwrap();
                }
            }
            LUMP_SURFEDGES => {
                for e in &self.surfedges {
                    w.write_i32::<LittleEndian>(*e).unwrap();
                }
            }
            LUMP_MODELS => {
                for m in &self.models {
                    write_vec3(&mut w, &m.mins);
                    write_vec3(&mut w, &m.maxs);
                    write_vec3(&mut w, &m.origin);
                    w.write_i32::<LittleEndian>(m.headnode).unwrap();
                    w.write_i32::<LittleEndian>(m.firstface).unwrap();
                    w.write_i32::<LittleEndian>(m.numfaces).unwrap();
                }
            }
            _ => {}
        }
        if let Some((l, n)) = self.extra_lump_bytes {
            if l == lump {
                w.resize(w.len() + n, 0);
            }
        }
        w
    }

    pub fn build(&self) -> Vec<u8> {
        let lumps: Vec<Vec<u8>> = (0..HEADER_LUMPS).map(|l| self.lump_data(l)).collect();

        let mut out = Vec::new();
        out.write_u32::<LittleEndian>(IDBSPHEADER).unwrap();
        out.write_i32::<LittleEndian>(self.version).unwrap();

        let mut ofs = DHeader::SIZE;
        for data in &lumps {
            out.write_i32::<LittleEndian>(ofs as i32).unwrap();
            out.write_i32::<LittleEndian>(data.len() as i32).unwrap();
            ofs += data.len();
        }
        for data in &lumps {
            out.extend_from_slice(data);
        }
        out
    }
}

fn write_vec3(w: &mut Vec<u8>, v: &[f32; 3]) {
    for c in v {
        w.write_f32::<LittleEndian>(*c).unwrap();
    }
}

// ============================================================
// MD2
// ============================================================

pub struct Md2Builder {
    pub version: i32,
    pub skins: Vec<String>,
    pub skinheight: i32,
    pub num_xyz: i32,
    pub st: Vec<[i16; 2]>,
    pub tris: Vec<([i16; 3], [i16; 3])>,
    pub frames: Vec<(Vec3f, Vec3f, String)>,
    pub glcmds: Vec<i32>,
}

impl Md2Builder {
    /// A single triangle with two frames and one skin.
    pub fn triangle() -> Self {
        Self {
            version: ALIAS_VERSION,
            skins: vec!["models/box/skin.pcx".to_string()],
            skinheight: 32,
            num_xyz: 3,
            st: vec![[0, 0], [31, 0], [0, 31]],
            tris: vec![([0, 1, 2], [0, 1, 2])],
            frames: vec![
                ([1.0, 1.0, 1.0], [-8.0, -8.0, 0.0], "stand01".to_string()),
                ([0.5, 0.5, 2.0], [-4.0, -4.0, 0.0], "stand02".to_string()),
            ],
            glcmds: vec![3, 0, 0, 0],
        }
    }

    pub fn framesize(&self) -> i32 {
        (DAliasFrame::SIZE + DTriVertx::SIZE * self.num_xyz as usize) as i32
    }

    pub fn build(&self) -> Vec<u8> {
        let ofs_skins = DMdl::SIZE as i32;
        let ofs_st = ofs_skins + (self.skins.len() * MAX_SKINNAME) as i32;
        let ofs_tris = ofs_st + (self.st.len() * DStVert::SIZE) as i32;
        let ofs_frames = ofs_tris + (self.tris.len() * DTriangle::SIZE) as i32;
        let ofs_glcmds = ofs_frames + self.frames.len() as i32 * self.framesize();
        let ofs_end = ofs_glcmds + self.glcmds.len() as i32 * 4;

        let header = [
            IDALIASHEADER as i32,
            self.version,
            32,
            self.skinheight,
            self.framesize(),
            self.skins.len() as i32,
            self.num_xyz,
            self.st.len() as i32,
            self.tris.len() as i32,
            self.glcmds.len() as i32,
            self.frames.len() as i32,
            ofs_skins,
            ofs_st,
            ofs_tris,
            ofs_frames,
            ofs_glcmds,
            ofs_end,
        ];

        let mut w = Vec::new();
        for v in header {
            w.write_i32::<LittleEndian>(v).unwrap();
        }
        for s in &self.skins {
            w.extend_from_slice(&name64(s));
        }
        for st in &self.st {
            w.write_i16::<LittleEndian>(st[0]).unwrap();
            w.write_i16::<LittleEndian>(st[1]).unwrap();
        }
        for (xyz, st) in &self.tris {
            for v in xyz.iter().chain(st.iter()) {
                w.write_i16::<LittleEndian>(*v).unwrap();
            }
        }
        for (i, (scale, translate, name)) in self.frames.iter().enumerate() {
            write_vec3(&mut w, scale);
            write_vec3(&mut w, translate);
            let mut n = [0u8; 16];
            n[..name.len()].copy_from_slice(name.as_bytes());
            w.extend_from_slice(&n);
            for v in 0..self.num_xyz {
                w.extend_from_slice(&[v as u8, i as u8, 255, 0]);
            }
        }
        for c in &self.glcmds {
            w.write_i32::<LittleEndian>(*c).unwrap();
        }
        w
    }
}

// ============================================================
// SP2
// ============================================================

pub fn sprite_bytes(version: i32, frames: &[(i32, i32, i32, i32, &str)]) -> Vec<u8> {
    let mut w = Vec::new();
    w.write_u32::<LittleEndian>(IDSPRITEHEADER).unwrap();
    w.write_i32::<LittleEndian>(version).unwrap();
    w.write_i32::<LittleEndian>(frames.len() as i32).unwrap();
    for &(width, height, ox, oy, name) in frames {
        w.write_i32::<LittleEndian>(width).unwrap();
        w.write_i32::<LittleEndian>(height).unwrap();
        w.write_i32::<LittleEndian>(ox).unwrap();
        w.write_i32::<LittleEndian>(oy).unwrap();
        w.extend_from_slice(&name64(name));
    }
    w
}

pub fn flare_sprite() -> Vec<u8> {
    sprite_bytes(
        SPRITE_VERSION,
        &[(16, 16, 8, 8, "sprites/flare_0.pcx"), (16, 16, 8, 8, "sprites/flare_1.pcx")],
    )
}

/// Model files for the manager tests.
pub fn model_files() -> MemFiles {
    let mut files = MemFiles::default();
    files.insert("maps/box.bsp", BspBuilder::box_world().build());
    let mut other = BspBuilder::box_world();
    other.models.pop();
    files.insert("maps/other.bsp", other.build());
    files.insert("models/box/tris.md2", Md2Builder::triangle().build());
    files.insert("sprites/flare.sp2", flare_sprite());
    files
}

/// Records warnings per test thread so a test can check what it logged.
struct WarnCapture {
    records: Mutex<Vec<(ThreadId, String)>>,
}

impl log::Log for WarnCapture {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::Warn
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            if let Ok(mut records) = self.records.lock() {
                records.push((thread::current().id(), record.args().to_string()));
            }
        }
    }

    fn flush(&self) {}
}

static WARN_CAPTURE: WarnCapture = WarnCapture { records: Mutex::new(Vec::new()) };
static WARN_CAPTURE_INIT: Once = Once::new();

/// Installs the capturing logger. Safe to call from every test.
pub fn capture_warnings() {
    WARN_CAPTURE_INIT.call_once(|| {
        if log::set_logger(&WARN_CAPTURE).is_ok() {
            log::set_max_level(log::LevelFilter::Warn);
        }
    });
}

/// Warnings logged so far by the calling thread.
pub fn thread_warnings() -> Vec<String> {
    let me = thread::current().id();
    WARN_CAPTURE
        .records
        .lock()
        .map(|r| r.iter().filter(|(id, _)| *id == me).map(|(_, m)| m.clone()).collect())
        .unwrap_or_default()
}
