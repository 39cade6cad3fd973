//! Config subcommand handlers.

use pushline_config as config;

use crate::cli::{ConfigArgs, ConfigCommand};
use crate::error::CliError;

pub fn handle(args: &ConfigArgs) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
        }
        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            print!("{}", cfg.to_redacted_toml()?);
        }
    }
    Ok(())
}
