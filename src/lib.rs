pub mod auth;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod net;
pub mod proto;
pub mod server;
pub mod traffic;

pub mod logging;
