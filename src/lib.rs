pub mod config;
pub mod content;
pub mod error;
pub mod format;
pub mod input;
pub mod models;
pub mod network;
pub mod platform;
pub mod prompts;
pub mod server;
pub mod template;
pub mod theme;
pub mod ui;
