// src/services/mod.rs
pub mod cache;
pub mod dashboard;
pub mod format;
pub mod news;
pub mod resolver;
pub mod yahoo;
