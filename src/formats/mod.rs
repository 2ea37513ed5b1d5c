//! Companion file formats for alignment data.

pub mod index;
