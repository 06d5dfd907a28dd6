pub mod api;
pub mod config;
pub mod consumer;
pub mod error;
pub mod registry;
pub mod ws;
