pub mod assemble;
pub mod batch;
pub mod classify;
pub mod collections;
pub mod config;
pub mod error;
pub mod geography;
pub mod jobs;
pub mod log;
pub mod render;
pub mod stats;
pub mod web;

#[cfg(test)]
pub(crate) mod testing;
