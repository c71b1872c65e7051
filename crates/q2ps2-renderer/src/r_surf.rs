// Copyright (C) 1997-2001 Id Software, Inc.
// GPL-2.0-or-later
//
// Surface geometry: lightmap extents, polygon reconstruction from the edge
// loop, and ear-clipping triangulation.

use q2ps2_common::q_shared::{
    cross_product, dot_product, vector_add, vector_normalize, vector_normalized, vector_subtract,
    Vec3,
};

use crate::r_error::{ModelError, ModelResult};
use crate::r_model_types::{
    BrushModel, MPoly, MSurface, MTriangle, PolyVertex, LM_BLOCK_HEIGHT, LM_BLOCK_WIDTH,
};

const TRIANGULATION_EPSILON: f32 = 0.001;

/// Position of the vertex a surf-edge starts from. Negative surf-edges walk
/// their edge backwards.
pub fn surf_edge_vertex(bmod: &BrushModel, surf_edge: usize) -> ModelResult<Vec3> {
    let e = *bmod
        .surf_edges
        .get(surf_edge)
        .ok_or(ModelError::BadEdge(surf_edge as i32))?;
    let edge = bmod
        .edges
        .get(e.unsigned_abs() as usize)
        .ok_or(ModelError::BadEdge(e))?;
    let v = if e >= 0 { edge.v[0] } else { edge.v[1] };
    bmod.vertexes
        .get(v as usize)
        .map(|vert| vert.position)
        .ok_or(ModelError::BadVertex(v as u32))
}

fn surface_vertexes(bmod: &BrushModel, surf: &MSurface) -> ModelResult<Vec<Vec3>> {
    let first = surf.first_edge.max(0) as usize;
    (0..surf.num_edges.max(0) as usize)
        .map(|i| surf_edge_vertex(bmod, first + i))
        .collect()
}

fn texinfo_project(vecs: &[[f32; 4]; 2], axis: usize, v: &Vec3) -> f32 {
    let vec = &vecs[axis];
    v[0] * vec[0] + v[1] * vec[1] + v[2] * vec[2] + vec[3]
}

/// Fills `texture_mins` and `extents`: the texture-space bounds of the face
/// rounded outwards to the 16 unit lightmap grid.
pub fn calc_surface_extents(bmod: &BrushModel, surf: &mut MSurface) -> ModelResult<()> {
    let tex = bmod
        .texinfos
        .get(surf.texinfo)
        .ok_or(ModelError::BadTexInfo(surf.texinfo as i32))?;

    let mut mins = [999999.0f32; 2];
    let mut maxs = [-99999.0f32; 2];

    for v in surface_vertexes(bmod, surf)? {
        for j in 0..2 {
            let val = texinfo_project(&tex.vecs, j, &v);
            if val < mins[j] {
                mins[j] = val;
            }
            if val > maxs[j] {
                maxs[j] = val;
            }
        }
    }

    for i in 0..2 {
        let bmins = (mins[i] / 16.0).floor() as i32;
        let bmaxs = (maxs[i] / 16.0).ceil() as i32;

        // The casts saturate, so a wild vertex shows up as overflow here.
        let texture_min = bmins.checked_mul(16);
        let extent = bmaxs.checked_sub(bmins).and_then(|e| e.checked_mul(16));
        match (texture_min, extent) {
            (Some(t), Some(e)) => {
                surf.texture_mins[i] = t;
                surf.extents[i] = e;
            }
            _ => {
                return Err(ModelError::BadSurfaceExtents { axis: i, mins: mins[i], maxs: maxs[i] })
            }
        }
    }
    Ok(())
}

/// Rebuilds the face's vertex loop with texture and lightmap coordinates and
/// triangulates it.
pub fn build_polygon_from_surface(bmod: &BrushModel, surf: &MSurface) -> ModelResult<MPoly> {
    let tex = bmod
        .texinfos
        .get(surf.texinfo)
        .ok_or(ModelError::BadTexInfo(surf.texinfo as i32))?;
    let width = tex.image_width.max(1) as f32;
    let height = tex.image_height.max(1) as f32;

    let positions = surface_vertexes(bmod, surf)?;
    let mut vertexes = Vec::with_capacity(positions.len());

    for vec in &positions {
        let s = texinfo_project(&tex.vecs, 0, vec);
        let t = texinfo_project(&tex.vecs, 1, vec);

        // Lightmap texture coordinates
        let mut ls = s - surf.texture_mins[0] as f32;
        ls += (surf.light_s * 16) as f32;
        ls += 8.0;
        ls /= (LM_BLOCK_WIDTH * 16) as f32;

        let mut lt = t - surf.texture_mins[1] as f32;
        lt += (surf.light_t * 16) as f32;
        lt += 8.0;
        lt /= (LM_BLOCK_HEIGHT * 16) as f32;

        vertexes.push(PolyVertex {
            position: *vec,
            texture_s: s / width,
            texture_t: t / height,
            lightmap_s: ls,
            lightmap_t: lt,
        });
    }

    let triangles = triangulate_polygon(&positions)?;
    Ok(MPoly { vertexes, triangles })
}

/// Newell normal: the sum of the cross products of each vertex pair around
/// the loop, normalized. Zero for a degenerate loop.
pub fn compute_polygon_normal(positions: &[Vec3]) -> Vec3 {
    let mut normal = [0.0f32; 3];
    for v in 0..positions.len() {
        let v_next = (v + 1) % positions.len();
        let cross = cross_product(&positions[v], &positions[v_next]);
        normal = vector_add(&normal, &cross);
    }
    vector_normalize(&mut normal);
    normal
}

fn next_active(mut x: usize, active: &[bool]) -> usize {
    loop {
        x += 1;
        if x == active.len() {
            x = 0;
        }
        if active[x] {
            return x;
        }
    }
}

fn prev_active(mut x: usize, active: &[bool]) -> usize {
    loop {
        if x == 0 {
            x = active.len();
        }
        x -= 1;
        if active[x] {
            return x;
        }
    }
}

/// Whether (p1, p2, p3) winds positively around `normal` and contains no
/// other active vertex.
fn test_triangle(
    idx: [usize; 3],
    p1: &Vec3,
    p2: &Vec3,
    p3: &Vec3,
    normal: &Vec3,
    active: &[bool],
    positions: &[Vec3],
) -> bool {
    let edge = vector_normalized(&vector_subtract(p2, p1));
    let n1 = cross_product(normal, &edge);

    if dot_product(&n1, &vector_subtract(p3, p1)) <= TRIANGULATION_EPSILON {
        return false;
    }

    let n2 = cross_product(normal, &vector_normalized(&vector_subtract(p3, p2)));
    let n3 = cross_product(normal, &vector_normalized(&vector_subtract(p1, p3)));

    for (v, pv) in positions.iter().enumerate() {
        if !active[v] || idx.contains(&v) {
            continue;
        }
        let d1 = vector_normalized(&vector_subtract(pv, p1));
        let d2 = vector_normalized(&vector_subtract(pv, p2));
        let d3 = vector_normalized(&vector_subtract(pv, p3));

        if dot_product(&n1, &d1) > -TRIANGULATION_EPSILON
            && dot_product(&n2, &d2) > -TRIANGULATION_EPSILON
            && dot_product(&n3, &d3) > -TRIANGULATION_EPSILON
        {
            return false;
        }
    }
    true
}

fn cos_between(apex: &Vec3, a: &Vec3, b: &Vec3) -> f32 {
    let da = vector_normalized(&vector_subtract(a, apex));
    let db = vector_normalized(&vector_subtract(b, apex));
    dot_product(&da, &db)
}

/// Ear-clipping triangulation of a polygon loop. Produces `len - 2`
/// triangles for a well formed polygon. A loop of fewer than 3 vertexes
/// yields nothing; a loop where no ear can be found yields the triangles
/// emitted so far.
pub fn triangulate_polygon(positions: &[Vec3]) -> ModelResult<Vec<MTriangle>> {
    let num_verts = positions.len();
    if num_verts < 3 {
        // Broken polygons are ignored by the view draw.
        log::warn!("Broken polygon found! ({} vertexes)", num_verts);
        return Ok(Vec::new());
    }
    if num_verts - 1 > u16::MAX as usize {
        return Err(ModelError::TriangleOverflow);
    }
    if num_verts == 3 {
        return Ok(vec![MTriangle { vertexes: [0, 1, 2] }]);
    }

    let num_triangles = num_verts - 2;
    let mut tris: Vec<MTriangle> = Vec::with_capacity(num_triangles);
    let emit = |tris: &mut Vec<MTriangle>, a: usize, b: usize, c: usize| -> ModelResult<()> {
        if tris.len() == num_triangles {
            return Err(ModelError::TriangleOverflow);
        }
        tris.push(MTriangle { vertexes: [a as u16, b as u16, c as u16] });
        Ok(())
    };

    // Judges the winding of candidate ears.
    let normal = compute_polygon_normal(positions);

    let mut active = vec![true; num_verts];
    let mut start: Option<usize> = Some(0);
    let mut p1 = 0;
    let mut p2 = 1;
    let mut m1 = num_verts - 1;
    let mut m2 = num_verts - 2;
    let mut last_positive = false;

    loop {
        if p2 == m2 {
            // Only three vertexes remain.
            emit(&mut tris, m1, p1, p2)?;
            break;
        }

        let vp1 = &positions[p1];
        let vp2 = &positions[p2];
        let vm1 = &positions[m1];
        let vm2 = &positions[m2];

        // (m1, p1, p2) and (m2, m1, p1)
        let mut positive = test_triangle([p1, p2, m1], vp2, vm1, vp1, &normal, &active, positions);
        let mut negative = test_triangle([m1, m2, p1], vp1, vm2, vm1, &normal, &active, positions);

        // Both valid: take the one with the larger smallest angle.
        if positive && negative {
            let p_dot = cos_between(vm1, vp2, vm2);
            let m_dot = cos_between(vp1, vm2, vp2);

            if (p_dot - m_dot).abs() < TRIANGULATION_EPSILON {
                if last_positive {
                    positive = false;
                } else {
                    negative = false;
                }
            } else if p_dot < m_dot {
                negative = false;
            } else {
                positive = false;
            }
        }

        if positive {
            active[p1] = false;
            emit(&mut tris, m1, p1, p2)?;
            p1 = next_active(p1, &active);
            p2 = next_active(p2, &active);
            last_positive = true;
            start = None;
        } else if negative {
            active[m1] = false;
            emit(&mut tris, m2, m1, p1)?;
            m1 = prev_active(m1, &active);
            m2 = prev_active(m2, &active);
            last_positive = false;
            start = None;
        } else {
            match start {
                None => start = Some(p2),
                // Went all the way around without finding an ear.
                Some(s) if s == p2 => break,
                Some(_) => {}
            }

            m2 = m1;
            m1 = p1;
            p1 = p2;
            p2 = next_active(p2, &active);
        }
    }

    if tris.len() != num_triangles {
        log::debug!(
            "triangulate_polygon: {} of {} triangles for a {} vertex polygon",
            tris.len(),
            num_triangles,
            num_verts
        );
    }
    Ok(tris)
}
