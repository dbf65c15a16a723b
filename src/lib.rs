pub mod config;
pub mod engine;
pub mod pipeline;
pub mod rewrite;
pub mod store;
pub mod wordpress;
