//! `maestro doctor` implementation

use maestro_core::GlobalConfig;
use maestro_llm::{catalog, FALLBACK_PRIORITY};

pub async fn run() -> anyhow::Result<()> {
    println!("Maestro Doctor\n");

    let config = GlobalConfig::load()?;
    let mut all_ok = true;

    all_ok &= check_providers(&config);
    check_host(&config);
    check_commands_dir(&config);

    println!();
    if all_ok {
        println!("Ready: at least one provider path is available.");
    } else {
        println!("No provider is usable. Set an API key (e.g. ANTHROPIC_API_KEY) or run inside a host with native sampling.");
        std::process::exit(1);
    }

    Ok(())
}

fn check_providers(config: &GlobalConfig) -> bool {
    let mut any = false;
    for provider in FALLBACK_PRIORITY {
        let configured = config.provider_config(provider).has_api_key();
        any |= configured;
        let models = catalog::models_for(provider).len();
        println!(
            "provider {:<10} {:<14} ({} known models)",
            provider,
            if configured { "configured" } else { "no API key" },
            models
        );
    }
    // Guided mode needs no key, so an empty host still works.
    if config.in_mcp_context {
        any = true;
    }
    any
}

fn check_host(config: &GlobalConfig) {
    if config.in_mcp_context {
        println!(
            "host: zero-config context detected ({} set)",
            GlobalConfig::MCP_HOST_ENV
        );
    } else {
        println!("host: standalone");
    }
}

fn check_commands_dir(config: &GlobalConfig) {
    match &config.commands_dir {
        Some(dir) if dir.exists() => println!("commands dir: {}", dir.display()),
        Some(dir) => println!("commands dir: {} (missing)", dir.display()),
        None => println!("commands dir: not set (built-ins only)"),
    }
}
