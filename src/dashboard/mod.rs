//! The collector's in-memory query store, the statistician that populates
//! it from traffic log files, and the HTTP surface that exposes it.

pub mod http;
pub mod statistician;
pub mod store;

pub use http::DashboardEndpoint;
pub use statistician::Statistician;
pub use store::TrafficStore;
