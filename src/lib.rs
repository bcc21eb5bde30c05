// badge-bootstrap - runtime bootstrapper for the badge application
// Core library functionality

pub mod cli;
pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use models::recipe::Recipe;
pub use models::step::{BootstrapReport, Step, StepStatus};
pub use services::bootstrapper::{BootstrapOptions, Bootstrapper};
pub use services::runner::{CommandRunner, Invocation, InvocationOutput, SystemRunner};
pub use utils::error::{BootstrapError, Result};
