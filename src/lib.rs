pub mod advisory;
pub mod aggregate;
pub mod api;
pub mod config;
pub mod error;
pub mod geometry;
pub mod history;
pub mod producer;
pub mod service;
pub mod store;
pub mod types;
