//! `craftbot config` — Configuration helpers.

use std::path::Path;

use craftbot_config::AppConfig;

pub fn show_default() {
    print!("{}", AppConfig::default_toml());
}

pub fn path(explicit: Option<&Path>) {
    println!("{}", super::config_path(explicit).display());
}

pub fn validate(explicit: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    let config = match super::load_config(explicit) {
        Ok(config) => config,
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   ✅ Config parsed successfully");

    let mut warnings = Vec::new();
    if config.agent.admins.is_empty() {
        warnings.push("No admins configured (set agent.admins or OWNER_USERNAME); !adminhelp is disabled");
    }
    if !config.has_api_key() && config.generator.provider != "ollama" {
        warnings.push("No generator API key (set GEMINI_API_KEY or CRAFTBOT_API_KEY); !chat is disabled");
    }
    if config.agent.auth_password.is_none() {
        warnings.push("No auth password; /register and /login prompts will be ignored");
    }

    if warnings.is_empty() {
        println!("   ✅ All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   ⚠️  {w}");
        }
    }

    println!();
    println!("   Server:    {}:{}", config.server.host, config.server.port);
    println!("   Username:  {}", config.agent.username);
    println!("   Bridge:    {}", config.bridge.addr);
    println!("   Generator: {} ({})", config.generator.provider, config.generator.model);
    println!(
        "   Gateway:   {}",
        if config.gateway.enabled {
            format!("{}:{}", config.gateway.host, config.gateway.port)
        } else {
            "disabled".into()
        }
    );

    Ok(())
}
