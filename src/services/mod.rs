// Services module for business logic
pub mod bootstrapper;
pub mod native_installer;
pub mod python_env;
pub mod runner;
pub mod source_stager;
