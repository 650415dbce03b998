//! Theme and text-direction preferences persisted in cookies.

pub mod client;
pub mod config;
pub mod preference;
pub mod routes;
