//! Core library for spotify-tidal-migrator
pub mod api;
pub mod config;
pub mod db;
pub mod migrator;
pub mod models;
pub mod pacing;
pub mod reader;
pub mod report;
pub mod resolver;
pub mod select;
