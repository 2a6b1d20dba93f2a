mod app;
mod cli;

use clap::Parser;
use cli::{Cli, Commands, ConfigCommand};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    derpiwall::observability::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => app::run(cli.config, args.refresh_now).await?,
        Commands::Refresh => app::refresh(cli.config).await?,
        Commands::Cleanup => app::cleanup(cli.config).await?,
        Commands::Config(ConfigCommand::Show) => app::show_config(cli.config)?,
        Commands::Config(ConfigCommand::Set { key, value }) => {
            app::set_config(cli.config, &key, &value)?
        }
    }

    Ok(())
}
