pub mod config;
pub mod controller;
pub mod error;
pub mod fetch_progress;
pub mod models;
pub mod reader;
