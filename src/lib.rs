//! Skinforge - skeletal animation and binary mesh/clip assets

pub mod core;
pub mod io;
pub mod math;
pub mod mesh;
pub mod animation;
