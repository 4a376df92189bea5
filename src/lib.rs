pub mod analyzers;
pub mod config;
pub mod fetch;
pub mod infra;
pub mod output;
pub mod parser;
pub mod render;
pub mod services;
pub mod stats;
