// Startup module - banner and module status
//
// Printed once before the server starts accepting connections, then
// mirrored into the log so file output records what was enabled.

use crate::config::{BackendKind, Config, Features, VERSION};

/// ANSI color codes for terminal output
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const MAGENTA: &str = "\x1b[35m";
}

/// Module loading result for display
pub struct ModuleStatus {
    pub name: &'static str,
    pub enabled: bool,
    pub description: String,
}

/// Print the startup banner and module status
pub fn print_startup(config: &Config) {
    use colors::*;

    println!();
    println!("  {BOLD}{CYAN}{}{RESET} {DIM}v{VERSION}{RESET}", config.site_name);
    println!("  {DIM}Physics questions and answers{RESET}");
    println!();

    if let Some(path) = Config::config_path() {
        if path.exists() {
            println!("  {DIM}Config:{RESET} {GREEN}✓{RESET} {}", path.display());
        } else {
            println!("  {DIM}Config:{RESET} {DIM}(using defaults){RESET}");
        }
    }
    println!();

    println!("  {DIM}Loading modules...{RESET}");
    for module in &module_status(config) {
        print_module_status(module);
    }
    println!();

    println!(
        "  {MAGENTA}▸{RESET} Listening on {BOLD}http://{}{RESET}",
        config.bind_addr
    );
    if config.backend.kind == BackendKind::Rest && config.backend.rest_api_key.is_none() {
        println!("  {YELLOW}▸{RESET} {YELLOW}No REST API key set{RESET} {DIM}(anonymous requests){RESET}");
    }
    if config.auth.session_secret.is_none() {
        println!("  {YELLOW}▸{RESET} {YELLOW}No session secret set{RESET} {DIM}(sign-in disabled){RESET}");
    }
    println!();
}

/// Status of each module based on config
fn module_status(config: &Config) -> Vec<ModuleStatus> {
    let Features {
        live_updates,
        featured_cache,
    } = &config.features;

    vec![
        ModuleStatus {
            name: "backend",
            enabled: true,
            description: config.backend.describe(),
        },
        ModuleStatus {
            name: "store",
            enabled: true,
            description: format!("client state ({})", config.store.db_path.display()),
        },
        ModuleStatus {
            name: "composer",
            enabled: true,
            description: format!(
                "max {} tags, drafts kept {}h",
                config.composer.max_tags, config.composer.draft_ttl_hours
            ),
        },
        ModuleStatus {
            name: "live",
            enabled: *live_updates,
            description: "Live feed updates".to_string(),
        },
        ModuleStatus {
            name: "featured",
            enabled: *featured_cache,
            description: "Featured fragment cache".to_string(),
        },
        ModuleStatus {
            name: "sign-in",
            enabled: config.auth.session_secret.is_some(),
            description: "Signed session notifications".to_string(),
        },
        ModuleStatus {
            name: "access-log",
            enabled: config.logging.access_log,
            description: "One line per request".to_string(),
        },
        ModuleStatus {
            name: "file-log",
            enabled: config.logging.file.is_some(),
            description: match &config.logging.file {
                Some(file) => format!("JSON logs in {}", file.dir.display()),
                None => "JSON logs".to_string(),
            },
        },
    ]
}

fn print_module_status(module: &ModuleStatus) {
    use colors::*;

    let (icon, style) = if module.enabled {
        (format!("{GREEN}✓{RESET}"), "")
    } else {
        (format!("{DIM}○{RESET}"), DIM)
    };

    println!(
        "    {icon} {style}{:<12}{RESET} {DIM}{}{RESET}",
        module.name, module.description
    );
}

/// Mirror the banner into the log
pub fn log_startup(config: &Config) {
    tracing::info!("physics-qa v{} starting", VERSION);

    for module in &module_status(config) {
        let icon = if module.enabled { "✓" } else { "○" };
        tracing::info!("  {} {} - {}", icon, module.name, module.description);
    }

    tracing::info!("▸ Listening on http://{}", config.bind_addr);
    if config.auth.session_secret.is_none() {
        tracing::warn!("No session secret set; /auth/session refuses every notification");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_status_follows_flags() {
        let mut config = Config::default();
        config.features.live_updates = false;

        let modules = module_status(&config);
        let live = modules.iter().find(|m| m.name == "live").unwrap();
        assert!(!live.enabled);
        let backend = modules.iter().find(|m| m.name == "backend").unwrap();
        assert!(backend.description.starts_with("sqlite"));

        let sign_in = modules.iter().find(|m| m.name == "sign-in").unwrap();
        assert!(!sign_in.enabled);
        config.auth.session_secret = Some("k".into());
        assert!(module_status(&config).iter().any(|m| m.name == "sign-in" && m.enabled));
    }
}
