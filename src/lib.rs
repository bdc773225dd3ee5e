pub mod api;
pub mod app;
pub mod cli;
pub mod component;
pub mod config;
pub mod entity;
pub mod events;
pub mod format;
pub mod location;
pub mod output;
pub mod render;
pub mod storage;
pub mod utils;

#[cfg(test)]
mod tests;
