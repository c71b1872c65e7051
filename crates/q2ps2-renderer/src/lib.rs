#![allow(dead_code)]
#![allow(clippy::needless_range_loop, clippy::too_many_arguments, clippy::float_cmp,
         clippy::manual_range_contains, clippy::identity_op, clippy::type_complexity)]
// Model subsystem: loading, caching and eviction of world, alias and sprite models

pub mod r_error;
pub mod r_hunk;
pub mod r_image;
pub mod r_model_types;
pub mod r_surf;
pub mod r_bsp;
pub mod r_model;

#[cfg(test)]
mod r_testdata;
