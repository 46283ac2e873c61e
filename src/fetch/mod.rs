// src/fetch/mod.rs

pub mod source;
pub mod zips;
