//! deskpair - Desktop app pairing backend
//!
//! Exchanges a web session for a signed, stored desktop token and verifies
//! those tokens for desktop clients.

pub mod api;
pub mod client;
pub mod config;
pub mod db;
pub mod models;
pub mod pairing;
pub mod services;
