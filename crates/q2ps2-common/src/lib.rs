#![allow(dead_code)]
#![allow(clippy::needless_range_loop, clippy::too_many_arguments, clippy::float_cmp,
         clippy::manual_range_contains, clippy::identity_op)]

pub mod q_shared;
pub mod qfiles;
pub mod common;
pub mod cvar;
pub mod files;
