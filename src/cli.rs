// CLI module - command-line argument parsing and handlers
//
// Subcommands:
// - serve (default): run the web server
// - seed: load sample profiles and questions into the configured backend
// - config --show|--path|--reset|--edit|--update: manage the config file

use crate::config::{Config, VERSION};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::process::Command;

/// Physics Q&A - questions and answers about physics
#[derive(Parser)]
#[command(name = "physics-qa")]
#[command(version = VERSION)]
#[command(about = "Physics question and answer site", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the web server (default)
    Serve,

    /// Insert sample profiles and questions
    Seed,

    /// Manage configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Reset config file to defaults
        #[arg(long)]
        reset: bool,

        /// Open config file in $EDITOR
        #[arg(long)]
        edit: bool,

        /// Update config with new defaults (preserves user values)
        #[arg(long)]
        update: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

/// What main should do after argument parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Serve,
    Seed,
    /// A config command ran; nothing left to do
    Done,
}

/// Parse arguments and run config commands
pub fn handle_cli() -> Mode {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Commands::Serve) => Mode::Serve,
        Some(Commands::Seed) => Mode::Seed,
        Some(Commands::Config {
            show,
            reset,
            edit,
            update,
            path,
        }) => {
            if path {
                handle_config_path();
            } else if show {
                handle_config_show();
            } else if reset {
                handle_config_reset();
            } else if edit {
                handle_config_edit();
            } else if update {
                handle_config_update();
            } else {
                println!("Usage: physics-qa config [--show|--reset|--edit|--update|--path]");
                println!();
                println!("Options:");
                println!("  --show    Display effective configuration");
                println!("  --reset   Reset config file to defaults");
                println!("  --edit    Open config file in $EDITOR");
                println!("  --update  Update config with new defaults (preserves user values)");
                println!("  --path    Show config file path");
            }
            Mode::Done
        }
    }
}

fn load_or_exit() -> Config {
    match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn handle_config_path() {
    match Config::config_path() {
        Some(path) => println!("{}", path.display()),
        None => {
            eprintln!("Error: Could not determine config path");
            std::process::exit(1);
        }
    }
}

fn handle_config_show() {
    let config = load_or_exit();

    println!("# Effective configuration (env > file > defaults)");
    println!();
    println!("bind_addr = {:?}", config.bind_addr.to_string());
    println!("site_name = {:?}", config.site_name);
    println!("page_size = {}", config.page_size);
    println!("featured_limit = {}", config.featured_limit);
    println!();
    println!("[backend]");
    println!("kind = {:?}", config.backend.kind.as_str());
    println!("db_path = {:?}", config.backend.db_path.display().to_string());
    println!("rest_url = {:?}", config.backend.rest_url);
    println!(
        "rest_api_key = {}",
        if config.backend.rest_api_key.is_some() {
            "\"<set>\""
        } else {
            "(unset)"
        }
    );
    println!();
    println!("[store]");
    println!("db_path = {:?}", config.store.db_path.display().to_string());
    println!("retain_days = {}", config.store.retain_days);
    println!();
    println!("[auth]");
    println!(
        "session_secret = {}",
        if config.auth.session_secret.is_some() {
            "\"<set>\""
        } else {
            "(unset)"
        }
    );
    if let Some(url) = &config.auth.sign_in_url {
        println!("sign_in_url = {:?}", url);
    }
    println!();
    println!("[composer]");
    println!("draft_ttl_hours = {}", config.composer.draft_ttl_hours);
    println!("max_tags = {}", config.composer.max_tags);
    println!("min_title_chars = {}", config.composer.min_title_chars);
    println!("min_body_chars = {}", config.composer.min_body_chars);
    println!();
    println!("[features]");
    println!("live_updates = {}", config.features.live_updates);
    println!("featured_cache = {}", config.features.featured_cache);
    println!();
    println!("[logging]");
    println!("level = {:?}", config.logging.level);
    println!("format = {:?}", config.logging.format.as_str());
    println!("access_log = {}", config.logging.access_log);
    println!("file_enabled = {}", config.logging.file.is_some());

    println!();
    if let Some(path) = Config::config_path() {
        if path.exists() {
            println!("# Source: {}", path.display());
        } else {
            println!("# Source: defaults (no config file)");
        }
    }
}

fn handle_config_reset() {
    let Some(path) = Config::config_path() else {
        eprintln!("Error: Could not determine config path");
        std::process::exit(1);
    };

    if path.exists() {
        eprint!(
            "Config file exists at {}. Overwrite? [y/N] ",
            path.display()
        );
        let _ = std::io::stderr().flush();

        let mut input = String::new();
        if std::io::stdin().read_line(&mut input).is_err()
            || !input.trim().eq_ignore_ascii_case("y")
        {
            println!("Aborted.");
            return;
        }
    }

    if let Err(e) = Config::default().save() {
        eprintln!("Error writing config: {}", e);
        std::process::exit(1);
    }

    println!("Config reset to defaults: {}", path.display());
}

fn handle_config_edit() {
    let Some(path) = Config::config_path() else {
        eprintln!("Error: Could not determine config path");
        std::process::exit(1);
    };

    if !path.exists() {
        Config::ensure_config_exists();
        println!("Created new config file: {}", path.display());
    }

    let editor = std::env::var("EDITOR")
        .or_else(|_| std::env::var("VISUAL"))
        .unwrap_or_else(|_| {
            if cfg!(windows) {
                "notepad".to_string()
            } else {
                "nano".to_string()
            }
        });

    println!("Opening {} with {}", path.display(), editor);

    match Command::new(&editor).arg(&path).status() {
        Ok(s) if s.success() => {}
        Ok(s) => {
            eprintln!("Editor exited with status: {}", s);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Failed to launch editor '{}': {}", editor, e);
            eprintln!("Set $EDITOR environment variable to your preferred editor");
            std::process::exit(1);
        }
    }
}

fn handle_config_update() {
    let Some(path) = Config::config_path() else {
        eprintln!("Error: Could not determine config path");
        std::process::exit(1);
    };

    if !path.exists() {
        Config::ensure_config_exists();
        println!("Created new config file: {}", path.display());
        return;
    }

    let existing = load_or_exit();

    let backup_path = path.with_extension("toml.bak");
    if let Err(e) = std::fs::copy(&path, &backup_path) {
        eprintln!("Warning: Could not create backup: {}", e);
    } else {
        println!("Backup created: {}", backup_path.display());
    }

    if let Err(e) = existing.save() {
        eprintln!("Error writing config: {}", e);
        std::process::exit(1);
    }

    println!("Config updated with latest structure: {}", path.display());
    println!("Your values have been preserved.");
}
