// Utility modules shared by the CLI and services
pub mod config;
pub mod error;
pub mod logging;
pub mod validation;
