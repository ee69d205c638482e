//! Startup wiring: configuration discovery, database pool and service graph

pub mod config;
pub mod database;
pub mod services;

pub use config::load_config;
pub use database::init_database;
pub use services::{init_services, Services};
