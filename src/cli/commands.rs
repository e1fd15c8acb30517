//! `maestro commands` implementation

use maestro_core::{CommandLoader, GlobalConfig};

pub async fn run() -> anyhow::Result<()> {
    let config = GlobalConfig::load()?;
    let loader = CommandLoader::new(config.commands_dir.clone());

    for name in loader.list() {
        match loader.load(&name) {
            Ok(command) => {
                let stages: Vec<&str> = command.stages.iter().map(|s| s.id.as_str()).collect();
                println!(
                    "{:<14} agent={:<12} dynamic={:<5} stages=[{}]",
                    command.name,
                    command.agent,
                    command.dynamic_agent_selection,
                    stages.join(", ")
                );
            }
            Err(e) => println!("{name:<14} (unloadable: {e})"),
        }
    }
    Ok(())
}
