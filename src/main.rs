// badge-bootstrap
// Main CLI entry point

use badge_bootstrap::cli::{Cli, CliDispatcher};
use badge_bootstrap::utils::error::UserError;
use badge_bootstrap::utils::logging;
use clap::Parser;
use std::process;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match CliDispatcher::execute(cli.command).await {
        Ok(0) => {}
        Ok(code) => process::exit(code),
        Err(err) => {
            let user_error = UserError::from_bootstrap_error(&err);
            user_error.print();
            process::exit(user_error.exit_code);
        }
    }
}
