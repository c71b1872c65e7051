// Copyright (C) 1997-2001 Id Software, Inc.
// GPL-2.0-or-later
//
// World (IBSP) loading and the BSP queries the renderer needs.

use std::io::Cursor;

use q2ps2_common::common::com_dprintf;
use q2ps2_common::q_shared::{
    dot_product, radius_from_bounds, signbits_for_plane, CPlane, ImageType, SurfaceFlags, Vec3,
    SURF_WARP,
};
use q2ps2_common::qfiles::*;

use crate::r_error::{ModelError, ModelResult};
use crate::r_hunk::Hunk;
use crate::r_image::ImageCache;
use crate::r_model_types::*;
use crate::r_surf::{build_polygon_from_surface, calc_surface_extents};

/// Decodes every record of a lump.
fn read_records<T: LumpRecord>(name: &str, data: &[u8], lump: &'static str) -> ModelResult<Vec<T>> {
    if data.len() % T::SIZE != 0 {
        return Err(ModelError::FunnyLumpSize { name: name.to_string(), lump });
    }
    let count = data.len() / T::SIZE;
    let mut rdr = Cursor::new(data);
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(T::read_le(&mut rdr).map_err(ModelError::truncated(name))?);
    }
    Ok(out)
}

/// Builds a BrushModel from the bytes of a .bsp file. Lumps are consumed in
/// dependency order; every cross reference is checked as it is resolved.
struct BspLoader<'a, I: ImageCache> {
    name: &'a str,
    buf: &'a [u8],
    header: DHeader,
    hunk: &'a mut Hunk,
    images: &'a mut I,
    bmod: BrushModel,
}

impl<'a, I: ImageCache> BspLoader<'a, I> {
    fn lump(&self, index: usize, label: &'static str) -> ModelResult<&'a [u8]> {
        let l = self.header.lumps[index];
        let bad = || ModelError::BadLump {
            name: self.name.to_string(),
            lump: label,
            fileofs: l.fileofs,
            filelen: l.filelen,
        };
        if l.fileofs < 0 || l.filelen < 0 {
            return Err(bad());
        }
        let start = l.fileofs as usize;
        let end = start.checked_add(l.filelen as usize).ok_or_else(bad)?;
        let buf: &'a [u8] = self.buf;
        buf.get(start..end).ok_or_else(bad)
    }

    fn records<T: LumpRecord>(&self, index: usize, label: &'static str) -> ModelResult<Vec<T>> {
        read_records(self.name, self.lump(index, label)?, label)
    }

    fn load_vertexes(&mut self) -> ModelResult<()> {
        let ins: Vec<DVertex> = self.records(LUMP_VERTEXES, "vertexes")?;
        let mut out = self.hunk.alloc_vec::<MVertex>(ins.len())?;
        out.extend(ins.iter().map(|v| MVertex { position: v.point }));
        self.bmod.vertexes = out;
        Ok(())
    }

    fn load_edges(&mut self) -> ModelResult<()> {
        let ins: Vec<DEdge> = self.records(LUMP_EDGES, "edges")?;
        let mut out = self.hunk.alloc_vec::<MEdge>(ins.len())?;
        for e in &ins {
            for &v in &e.v {
                if v as usize >= self.bmod.vertexes.len() {
                    return Err(ModelError::BadVertex(v as u32));
                }
            }
            out.push(MEdge { v: e.v });
        }
        self.bmod.edges = out;
        Ok(())
    }

    fn load_surf_edges(&mut self) -> ModelResult<()> {
        let ins: Vec<i32> = self.records(LUMP_SURFEDGES, "surfedges")?;
        if ins.is_empty() || ins.len() >= MAX_MAP_SURFEDGES {
            return Err(ModelError::BadSurfEdgeCount { name: self.name.to_string(), count: ins.len() });
        }
        for &e in &ins {
            if e.unsigned_abs() as usize >= self.bmod.edges.len() {
                return Err(ModelError::BadEdge(e));
            }
        }
        let mut out = self.hunk.alloc_vec::<i32>(ins.len())?;
        out.extend_from_slice(&ins);
        self.bmod.surf_edges = out;
        Ok(())
    }

    fn load_lighting(&mut self) -> ModelResult<()> {
        let data = self.lump(LUMP_LIGHTING, "lighting")?;
        if data.is_empty() {
            self.bmod.light_data = Vec::new();
            return Ok(());
        }
        let mut out = self.hunk.alloc_vec::<u8>(data.len())?;
        out.extend_from_slice(data);
        self.bmod.light_data = out;
        Ok(())
    }

    fn load_planes(&mut self) -> ModelResult<()> {
        let ins: Vec<DPlane> = self.records(LUMP_PLANES, "planes")?;
        // Room for a back-facing copy of every plane.
        let mut out = self.hunk.alloc_vec::<CPlane>(ins.len() * 2)?;
        out.extend(ins.iter().map(|p| CPlane {
            normal: p.normal,
            dist: p.dist,
            plane_type: p.plane_type as u8,
            signbits: signbits_for_plane(&p.normal),
        }));
        self.bmod.planes = out;
        Ok(())
    }

    fn load_texinfo(&mut self) -> ModelResult<()> {
        let ins: Vec<TexInfo> = self.records(LUMP_TEXINFO, "texinfo")?;
        let count = ins.len();
        let mut out = self.hunk.alloc_vec::<MTexInfo>(count)?;

        for (i, ti) in ins.iter().enumerate() {
            let next = if ti.nexttexinfo > 0 {
                if ti.nexttexinfo as usize >= count {
                    return Err(ModelError::BadTexInfoChain { index: i, next: ti.nexttexinfo });
                }
                Some(ti.nexttexinfo as usize)
            } else {
                None
            };

            let name = format!("textures/{}.wal", name_str(&ti.texture));
            // A visible checker pattern if the texture can't be loaded.
            let image = match self.images.find_image(&name, ImageType::Wall) {
                Some(image) => image,
                None => {
                    log::warn!("Couldn't load {}", name);
                    self.images.no_texture()
                }
            };
            let (image_width, image_height) = self.images.image_size(image).ok_or_else(|| {
                ModelError::UnresolvedTexture { name: self.name.to_string(), index: i }
            })?;

            out.push(MTexInfo {
                vecs: ti.vecs,
                flags: SurfaceFlags::from_bits_retain(ti.flags),
                num_frames: 1,
                next,
                image,
                image_width,
                image_height,
            });
        }

        // Count animation frames. A chain that never returns to its start
        // stops after visiting every texinfo once.
        for i in 0..count {
            let mut num_frames = 1;
            let mut step = out[i].next;
            while let Some(s) = step {
                if s == i || num_frames as usize >= count {
                    break;
                }
                num_frames += 1;
                step = out[s].next;
            }
            out[i].num_frames = num_frames;
        }

        self.bmod.texinfos = out;
        Ok(())
    }

    fn load_faces(&mut self) -> ModelResult<()> {
        let ins: Vec<DFace> = self.records(LUMP_FACES, "faces")?;
        let mut out = self.hunk.alloc_vec::<MSurface>(ins.len())?;

        for face in &ins {
            let mut surf = MSurface {
                first_edge: face.firstedge,
                num_edges: face.numedges as i32,
                ..Default::default()
            };

            let edge_end = face.firstedge as i64 + face.numedges as i64;
            if face.firstedge < 0 || face.numedges < 0 || edge_end > self.bmod.surf_edges.len() as i64 {
                return Err(ModelError::BadEdge(face.firstedge));
            }

            if face.planenum as usize >= self.bmod.planes.len() {
                return Err(ModelError::BadPlane(face.planenum as i32));
            }
            surf.plane = face.planenum as usize;
            if face.side != 0 {
                surf.flags |= SURF_PLANEBACK;
            }

            if face.texinfo < 0 || face.texinfo as usize >= self.bmod.texinfos.len() {
                return Err(ModelError::BadTexInfo(face.texinfo as i32));
            }
            surf.texinfo = face.texinfo as usize;

            calc_surface_extents(&self.bmod, &mut surf)?;

            // lighting info
            surf.styles = face.styles;
            surf.samples = match face.lightofs {
                -1 => None,
                ofs if ofs >= 0 && (ofs as usize) < self.bmod.light_data.len() => Some(ofs as usize),
                ofs => return Err(ModelError::BadLightOffset(ofs)),
            };

            // set the drawing flags
            let warped = self.bmod.texinfos[surf.texinfo].flags.contains(SURF_WARP);
            if warped {
                surf.flags |= SURF_DRAWTURB;
                surf.extents = [16384, 16384];
                surf.texture_mins = [-8192, -8192];
            } else {
                surf.poly = Some(build_polygon_from_surface(&self.bmod, &surf)?);
            }

            out.push(surf);
        }

        self.bmod.surfaces = out;
        Ok(())
    }

    fn load_mark_surfaces(&mut self) -> ModelResult<()> {
        let ins: Vec<i16> = self.records(LUMP_LEAFFACES, "leaffaces")?;
        let mut out = self.hunk.alloc_vec::<usize>(ins.len())?;
        for &j in &ins {
            if j < 0 || j as usize >= self.bmod.surfaces.len() {
                return Err(ModelError::BadSurface(j as i32));
            }
            out.push(j as usize);
        }
        self.bmod.mark_surfaces = out;
        Ok(())
    }

    fn load_visibility(&mut self) -> ModelResult<()> {
        let data = self.lump(LUMP_VISIBILITY, "visibility")?;
        if data.is_empty() {
            self.bmod.vis = None;
            return Ok(());
        }

        let mut rdr = Cursor::new(data);
        let num_clusters = i32::read_le(&mut rdr).map_err(ModelError::truncated(self.name))?;
        if num_clusters < 0 || 4 + num_clusters as usize * 8 > data.len() {
            return Err(ModelError::Truncated(self.name.to_string()));
        }
        let mut bitofs = Vec::with_capacity(num_clusters as usize);
        for _ in 0..num_clusters {
            let pvs = i32::read_le(&mut rdr).map_err(ModelError::truncated(self.name))?;
            let phs = i32::read_le(&mut rdr).map_err(ModelError::truncated(self.name))?;
            bitofs.push([pvs, phs]);
        }

        let mut bytes = self.hunk.alloc_vec::<u8>(data.len())?;
        bytes.extend_from_slice(data);
        self.bmod.vis = Some(VisData {
            num_clusters: num_clusters as usize,
            bitofs,
            data: bytes,
        });
        Ok(())
    }

    fn load_leafs(&mut self) -> ModelResult<()> {
        let ins: Vec<DLeaf> = self.records(LUMP_LEAFS, "leafs")?;
        let mut out = self.hunk.alloc_vec::<MLeaf>(ins.len())?;
        for leaf in &ins {
            let first = leaf.firstleafface as usize;
            let count = leaf.numleaffaces as usize;
            if first + count > self.bmod.mark_surfaces.len() {
                return Err(ModelError::BadLeafFaces { first, count });
            }
            out.push(MLeaf {
                minmaxs: minmaxs(&leaf.mins, &leaf.maxs),
                parent: None,
                contents: leaf.contents,
                cluster: leaf.cluster as i32,
                area: leaf.area as i32,
                first_mark_surface: first,
                num_mark_surfaces: count,
            });
        }
        self.bmod.leafs = out;
        Ok(())
    }

    fn load_nodes(&mut self) -> ModelResult<()> {
        let ins: Vec<DNode> = self.records(LUMP_NODES, "nodes")?;
        let count = ins.len();
        let mut out = self.hunk.alloc_vec::<MNode>(count)?;

        for node in &ins {
            if node.planenum < 0 || node.planenum as usize >= self.bmod.planes.len() {
                return Err(ModelError::BadPlane(node.planenum));
            }
            if node.firstface as usize + node.numfaces as usize > self.bmod.surfaces.len() {
                return Err(ModelError::BadSurface(node.firstface as i32));
            }

            let mut children = [NodeChild::Node(0); 2];
            for (j, &p) in node.children.iter().enumerate() {
                let child = NodeChild::from_disk(p);
                let valid = match child {
                    NodeChild::Node(n) => n < count,
                    NodeChild::Leaf(l) => l < self.bmod.leafs.len(),
                };
                if !valid {
                    return Err(ModelError::BadChild(p));
                }
                children[j] = child;
            }

            out.push(MNode {
                minmaxs: minmaxs(&node.mins, &node.maxs),
                parent: None,
                plane: node.planenum as usize,
                children,
                first_surface: node.firstface,
                num_surfaces: node.numfaces,
            });
        }

        self.bmod.nodes = out;
        set_parents(&mut self.bmod);
        Ok(())
    }

    fn load_submodels(&mut self) -> ModelResult<()> {
        let ins: Vec<DModel> = self.records(LUMP_MODELS, "models")?;
        let mut out = self.hunk.alloc_vec::<MModel>(ins.len())?;
        for m in &ins {
            let face_end = m.firstface as i64 + m.numfaces as i64;
            if m.firstface < 0 || m.numfaces < 0 || face_end > self.bmod.surfaces.len() as i64 {
                return Err(ModelError::BadSurface(m.firstface));
            }
            // spread the mins / maxs by a unit
            let mins = [m.mins[0] - 1.0, m.mins[1] - 1.0, m.mins[2] - 1.0];
            let maxs = [m.maxs[0] + 1.0, m.maxs[1] + 1.0, m.maxs[2] + 1.0];
            out.push(MModel {
                mins,
                maxs,
                origin: m.origin,
                radius: radius_from_bounds(&mins, &maxs),
                head_node: m.headnode,
                first_face: m.firstface,
                num_faces: m.numfaces,
            });
        }
        self.bmod.submodels = out;
        Ok(())
    }
}

fn minmaxs(mins: &[i16; 3], maxs: &[i16; 3]) -> [f32; 6] {
    [
        mins[0] as f32,
        mins[1] as f32,
        mins[2] as f32,
        maxs[0] as f32,
        maxs[1] as f32,
        maxs[2] as f32,
    ]
}

/// Sets the parent of every node and leaf reachable from node 0. Visits
/// children in the same order as a depth-first walk, so a leaf shared by
/// several nodes ends up with the last visitor as its parent.
fn set_parents(bmod: &mut BrushModel) {
    if bmod.nodes.is_empty() {
        return;
    }
    let mut visited = vec![false; bmod.nodes.len()];
    let mut stack: Vec<(NodeChild, Option<usize>)> = vec![(NodeChild::Node(0), None)];

    while let Some((child, parent)) = stack.pop() {
        match child {
            NodeChild::Leaf(l) => bmod.leafs[l].parent = parent,
            NodeChild::Node(n) => {
                bmod.nodes[n].parent = parent;
                if visited[n] {
                    continue;
                }
                visited[n] = true;
                let [front, back] = bmod.nodes[n].children;
                stack.push((back, Some(n)));
                stack.push((front, Some(n)));
            }
        }
    }
}

/// Decodes an IBSP file into a BrushModel. The caller has already checked
/// the magic number.
pub fn load_brush_model<I: ImageCache>(
    name: &str,
    buf: &[u8],
    hunk: &mut Hunk,
    images: &mut I,
) -> ModelResult<BrushModel> {
    if buf.len() < DHeader::SIZE {
        return Err(ModelError::Truncated(name.to_string()));
    }
    let header = DHeader::read_le(&mut Cursor::new(buf)).map_err(ModelError::truncated(name))?;
    if header.version != BSPVERSION {
        return Err(ModelError::WrongVersion {
            name: name.to_string(),
            found: header.version,
            expected: BSPVERSION,
        });
    }

    let mut loader = BspLoader {
        name,
        buf,
        header,
        hunk,
        images,
        bmod: BrushModel::default(),
    };

    loader.load_vertexes()?;
    loader.load_edges()?;
    loader.load_surf_edges()?;
    loader.load_lighting()?;
    loader.load_planes()?;
    loader.load_texinfo()?;
    loader.load_faces()?;
    loader.load_mark_surfaces()?;
    loader.load_visibility()?;
    loader.load_leafs()?;
    loader.load_nodes()?;
    loader.load_submodels()?;

    com_dprintf(&format!("New brush model '{}' loaded\n", name));
    Ok(loader.bmod)
}

/// Stamps every world texture with `sequence` so the image sweep keeps it.
pub fn reference_world_textures<I: ImageCache>(
    name: &str,
    bmod: &BrushModel,
    images: &mut I,
    sequence: i32,
) -> ModelResult<()> {
    for (i, ti) in bmod.texinfos.iter().enumerate() {
        if images.image_size(ti.image).is_none() {
            return Err(ModelError::UnresolvedTexture { name: name.to_string(), index: i });
        }
        images.touch_image(ti.image, sequence);
    }
    Ok(())
}

// =============================================================
//  Queries
// =============================================================

/// Leaf containing `p`, walking down from node 0. `None` for a world with
/// no nodes.
pub fn point_in_leaf(bmod: &BrushModel, p: &Vec3) -> Option<usize> {
    if bmod.nodes.is_empty() {
        return None;
    }
    let mut child = NodeChild::Node(0);
    // Each step goes one level down, so the depth is bounded by the node count.
    for _ in 0..=bmod.nodes.len() {
        match child {
            NodeChild::Leaf(l) => return Some(l),
            NodeChild::Node(n) => {
                let node = &bmod.nodes[n];
                let plane = &bmod.planes[node.plane];
                let d = dot_product(p, &plane.normal) - plane.dist;
                child = if d > 0.0 { node.children[0] } else { node.children[1] };
            }
        }
    }
    None
}

/// Expands one run-length encoded visibility row: zero bytes are followed
/// by a repeat count.
pub fn decompress_vis(input: &[u8], num_clusters: usize) -> Vec<u8> {
    let row = (num_clusters + 7) >> 3;
    let mut out = Vec::with_capacity(row);
    let mut i = 0;

    while out.len() < row {
        let Some(&b) = input.get(i) else {
            break;
        };
        if b != 0 {
            out.push(b);
            i += 1;
            continue;
        }
        let c = input.get(i + 1).copied().unwrap_or(0) as usize;
        i += 2;
        out.resize(out.len() + c, 0);
    }

    out.resize(row, 0);
    out
}

/// Potentially visible set of a cluster, one bit per cluster. Everything is
/// visible when there is no vis data or the cluster is unknown.
pub fn cluster_pvs(bmod: &BrushModel, cluster: i32) -> Vec<u8> {
    let vis = match &bmod.vis {
        Some(vis) => vis,
        None => return vec![0xff; MAX_MAP_LEAFS / 8],
    };
    let row = (vis.num_clusters + 7) >> 3;
    if cluster < 0 || cluster as usize >= vis.num_clusters {
        return vec![0xff; row];
    }
    let ofs = vis.bitofs[cluster as usize][DVIS_PVS];
    match vis.data.get(ofs.max(0) as usize..) {
        Some(rle) if ofs >= 0 => decompress_vis(rle, vis.num_clusters),
        _ => vec![0xff; row],
    }
}
