pub mod config;
pub mod error;
pub mod output;
pub mod routes;
pub mod state;
pub mod upload;
