// src/handlers/mod.rs
pub mod cache;
pub mod dashboard;
pub mod error;
