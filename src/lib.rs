// Library exports for the forum server.
// Integration tests drive the router built by `routes::app`.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod tls;
pub mod upload;
pub mod validation;

pub use routes::app;
