// src/lib.rs

//! Local site intelligence engine for private trackers.
//!
//! Watches HR obligations and private messages, protects sites from
//! over-scanning, and keeps a local catalogue of listed torrents. All output
//! is expressed as [`models::Action`]s; [`engine::IntelEngine`] is the facade.

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod parsers;
pub mod pipeline;
pub mod policy;
pub mod services;
pub mod storage;
pub mod utils;
