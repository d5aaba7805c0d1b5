mod cli;
mod core;
#[cfg(test)]
mod test_fixtures;

use clap::Parser;
use cli::{Cli, Commands, FetchOptions};
use crate::core::models::DataPath;
use std::io;

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let data_path = DataPath::new(cli.data_path)?;

    match &cli.command {
        Commands::Fetch {
            style,
            cancel_after,
            delay_ms,
            json,
        } => {
            let options = FetchOptions {
                style: *style,
                cancel_after: *cancel_after,
                delay_ms: *delay_ms,
                json: *json,
            };
            cli::handle_fetch_command(&data_path, options).await
        }
        Commands::Config { command } => cli::handle_config_command(&data_path, command),
    }
}
