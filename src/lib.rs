//! Authors Haven - a social publishing backend
//!
//! Readers and writers share articles, comment in threads, react, rate and
//! follow each other through a JSON REST API.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
