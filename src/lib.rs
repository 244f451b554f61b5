// Library exports for movieviewer
// The binary and the integration tests build on these modules

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod repository;
pub mod state;
pub mod store;
pub mod validation;
