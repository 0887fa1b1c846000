pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod presence;
pub mod services;
pub mod state;
pub mod storage;
pub mod typing;
pub mod ws;
