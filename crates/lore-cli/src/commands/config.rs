//! Configuration commands.

use super::config_file;
use anyhow::{Context, Result};
use colored::Colorize;
use lore_config::Config;
use std::path::Path;

pub fn show(explicit: Option<&Path>) -> Result<()> {
    let path = config_file(explicit)?;

    println!("{}", "Current Configuration".cyan().bold());
    println!("{}", "─".repeat(50));

    if !path.exists() {
        println!(
            "{}",
            format!("No config file at {}, showing defaults.", path.display()).yellow()
        );
        println!();
        println!("{}", Config::default_config_string());
        return Ok(());
    }

    let contents = std::fs::read_to_string(&path).context("Failed to read config file")?;
    // Surface parse and validation errors before printing.
    Config::load_from(&path).with_context(|| format!("Invalid config at {}", path.display()))?;
    println!("{}", contents);
    Ok(())
}

pub fn init(explicit: Option<&Path>, force: bool) -> Result<()> {
    let path = config_file(explicit)?;

    if path.exists() && !force {
        println!(
            "{} Config already exists at {} (use --force to overwrite)",
            "!".yellow(),
            path.display()
        );
        return Ok(());
    }

    Config::create_default_file(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("{} Created {}", "✓".green(), path.display());
    println!("Set [documents] path, then run 'lore ingest'.");
    Ok(())
}

pub fn path(explicit: Option<&Path>) -> Result<()> {
    println!("{}", config_file(explicit)?.display());
    Ok(())
}
