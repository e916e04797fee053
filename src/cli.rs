//! Command line arguments

use std::path::PathBuf;

use clap::Parser;

/// A minimal reparenting window manager for X11.
#[derive(Debug, Parser)]
#[command(name = "mantle", version, about)]
pub struct Args {
    /// X display to manage (defaults to $DISPLAY)
    #[arg(short, long, value_name = "NAME")]
    pub display: Option<String>,

    /// Config file (defaults to ~/.config/mantle/config.toml)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Terminal command for Alt+Return, overriding the config file
    #[arg(short, long, value_name = "CMD", num_args = 1.., allow_hyphen_values = true)]
    pub terminal: Option<Vec<String>>,
}
