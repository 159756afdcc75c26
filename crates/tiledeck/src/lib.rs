//! Tiledeck library
//!
//! Core of the token-gated tile launcher: configuration merge and storage,
//! tile validation, program resolution, request admission and launching.

pub mod admission;
pub mod api;
pub mod config;
pub mod exec;
pub mod logging;
pub mod programs;
pub mod text;
pub mod tiles;
