pub mod auth;
pub mod config;
pub mod content;
pub mod dashboard;
pub mod editor;
pub mod errors;
pub mod export;
pub mod logging;
pub mod settings;
pub mod shortcuts;
pub mod store;
pub mod web;
