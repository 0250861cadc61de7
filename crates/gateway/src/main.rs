use std::sync::Arc;

use clap::Parser;

use sr_gateway::cli::{self, Cli, Command, ConfigCommand, SessionsCommand};
use sr_gateway::server;
use sr_gateway::telemetry::Telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let (config, _) = cli::load_config()?;
            let telemetry = Telemetry::init(&config.observability);
            let result = server::run(Arc::new(config)).await;
            if let Err(e) = &result {
                tracing::error!(error = %format!("{e:#}"), "server exited with error");
            }
            telemetry.shutdown();
            result
        }
        Command::Config(ConfigCommand::Validate) => {
            let (config, path) = cli::load_config()?;
            if !cli::config::validate(&config, &path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => {
            let (config, _) = cli::load_config()?;
            cli::config::show(&config)
        }
        Command::Sessions(SessionsCommand::List { json }) => {
            Telemetry::init_cli();
            let (config, _) = cli::load_config()?;
            cli::sessions::list(&config, json)
        }
        Command::Version => {
            println!("sessionrelay {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
