// src/models/mod.rs

pub mod progress;
pub mod quiz;
pub mod user;
