use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "derpiwall")]
#[command(about = "Rotates the desktop wallpaper with images from Derpibooru", long_about = None)]
pub struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the background workers until interrupted
    Run(RunArgs),
    /// Fetch and set one wallpaper, then exit
    Refresh,
    /// Trim the wallpaper folder to the retention count, then exit
    Cleanup,
    /// Inspect or change settings
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Refresh immediately instead of waiting for the schedule
    #[arg(long)]
    pub refresh_now: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print every setting
    Show,
    /// Set one setting and persist it
    Set { key: String, value: String },
}
