//! Interactive prompt implementations backed by inquire

use inquire::{Confirm, Select};
use maestro_core::{
    AgentCatalog, AgentConfirmPrompt, AgentSelection, ProviderModelSuggestion,
    ProviderRemapPrompt, ScoredAgent,
};

/// Offers configured provider/model pairs when the requested provider has
/// no API key.
pub struct InquireRemapPrompt;

impl ProviderRemapPrompt for InquireRemapPrompt {
    fn remap(
        &self,
        requested: &str,
        alternatives: &[ProviderModelSuggestion],
    ) -> Option<ProviderModelSuggestion> {
        println!("Provider '{requested}' is not configured.");
        let labels: Vec<String> = alternatives.iter().map(ToString::to_string).collect();
        let choice = Select::new("Use a configured provider instead?", labels)
            .prompt()
            .ok()?;
        alternatives
            .iter()
            .find(|s| s.to_string() == choice)
            .cloned()
    }
}

/// Confirms a low-confidence agent pick, offering the ranked alternatives
pub struct InquireAgentConfirm;

impl AgentConfirmPrompt for InquireAgentConfirm {
    fn confirm(
        &self,
        suggested: &AgentSelection,
        alternatives: &[ScoredAgent],
        catalog: &AgentCatalog,
    ) -> Option<String> {
        const SHOW_ALL: &str = "other (show all agents)";

        let keep = Confirm::new(&format!(
            "Agent '{}' was selected with low confidence ({:.2}). Keep it?",
            suggested.selected_agent, suggested.confidence
        ))
        .with_default(true)
        .prompt()
        .unwrap_or(true);
        if keep {
            return None;
        }

        let mut labels: Vec<String> = alternatives
            .iter()
            .filter(|a| catalog.has_agent(&a.agent))
            .map(|a| a.agent.clone())
            .collect();
        labels.push(SHOW_ALL.to_string());

        let choice = Select::new("Pick an agent:", labels).prompt().ok()?;
        if choice != SHOW_ALL {
            return Some(choice);
        }
        let all: Vec<String> = catalog.agent_ids().iter().map(|id| (*id).to_string()).collect();
        Select::new("Pick an agent:", all).prompt().ok()
    }
}
