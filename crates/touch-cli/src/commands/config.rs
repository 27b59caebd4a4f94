//! Config command implementation.

use std::path::Path;

use anyhow::Result;

use crate::cli::ConfigAction;
use crate::config::Config;

pub fn cmd_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Path => {
            println!("{}", Config::path().display());
        }
        ConfigAction::Show { config } => {
            let config = match config {
                Some(path) => Config::load_from(&path)?,
                None => Config::load(),
            };
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Init => init(&Config::path())?,
    }
    Ok(())
}

fn init(path: &Path) -> Result<()> {
    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }
    Config::default().save_to(path)?;
    println!("Created config at {}", path.display());
    Ok(())
}
