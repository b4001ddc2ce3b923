//! Per-turn agent resolution.
//!
//! Turns the request's model selector, tool toggles, and context strings
//! into the concrete agent configuration for this turn: which tools the
//! model sees and the exact system prompt. Resolution is total; no input
//! combination fails a turn.

use std::collections::HashMap;

use cr_domain::agent::{agent_for_selector, AgentDefinition};
use cr_domain::tool::ToolName;

/// The resolved configuration for one turn.
pub struct AgentResolution {
    pub agent: &'static AgentDefinition,
    /// Tools active this turn, in the agent's allowed-tool order.
    pub tools: Vec<ToolName>,
    pub system_prompt: String,
}

/// Resolve the turn's agent, active tool set, and system prompt.
///
/// A tool is active when the agent allows it AND (it is not toggleable, or
/// its toggle is on, or the toggle key is absent and the tool defaults on).
/// Exclusion conflicts among the survivors are settled by priority rank:
/// the lower-ranked tool stays, the other is skipped. Toggle keys that
/// name no known tool are ignored.
pub fn resolve_agent(
    selector: &str,
    toggles: &HashMap<String, bool>,
    system_queue: &[String],
    locale: Option<&str>,
) -> AgentResolution {
    let agent = agent_for_selector(selector);

    let mut candidates: Vec<ToolName> = agent
        .allowed_tools
        .iter()
        .copied()
        .filter(|tool| {
            let meta = tool.meta();
            if !meta.toggleable {
                return true;
            }
            match toggles.get(tool.as_str()) {
                Some(on) => *on,
                None => meta.default_on,
            }
        })
        .collect();

    // Settle exclusions in priority order so the outcome is deterministic
    // regardless of the agent's declaration order.
    candidates.sort_by_key(|t| t.meta().priority);
    let mut kept: Vec<ToolName> = Vec::with_capacity(candidates.len());
    for tool in candidates {
        let conflicted = kept
            .iter()
            .any(|k| tool.meta().excludes.contains(k) || k.meta().excludes.contains(&tool));
        if conflicted {
            tracing::debug!(tool = %tool, "tool skipped by exclusion conflict");
            continue;
        }
        kept.push(tool);
    }

    // Restore the agent's declared ordering for the prompt and provider.
    let tools: Vec<ToolName> = agent
        .allowed_tools
        .iter()
        .copied()
        .filter(|t| kept.contains(t))
        .collect();

    let system_prompt = build_system_prompt(agent, &tools, toggles, system_queue, locale);

    AgentResolution {
        agent,
        tools,
        system_prompt,
    }
}

fn build_system_prompt(
    agent: &AgentDefinition,
    tools: &[ToolName],
    toggles: &HashMap<String, bool>,
    system_queue: &[String],
    locale: Option<&str>,
) -> String {
    let mut blocks: Vec<String> = vec![agent.base_prompt.to_owned()];

    if !tools.is_empty() {
        let mut block = String::from("====== CURRENTLY AVAILABLE TOOLS ======");
        for tool in tools {
            let meta = tool.meta();
            block.push_str(&format!("\n- {}: {}", tool.as_str(), meta.description));
        }
        blocks.push(block);
    }

    // Capability status covers every toggleable tool the agent allows,
    // active or not, so the model can tell the user what is switched off.
    let toggleable: Vec<ToolName> = agent
        .allowed_tools
        .iter()
        .copied()
        .filter(|t| t.meta().toggleable)
        .collect();
    if !toggleable.is_empty() {
        let mut block = String::from("CAPABILITY STATUS:");
        for tool in &toggleable {
            let on = tools.contains(tool);
            let state = if on { "enabled" } else { "disabled" };
            let mut line = format!("\n- {} is {state}", tool.meta().display_name);
            if !on && toggles.get(tool.as_str()).copied() != Some(false) {
                line.push_str(" (not activated for this conversation)");
            }
            block.push_str(&line);
        }
        blocks.push(block);
    }

    blocks.push(language_directive(locale).to_owned());

    if !system_queue.is_empty() {
        blocks.push(format!(
            "## Additional Context:\n{}",
            system_queue.join("\n\n")
        ));
    }

    blocks.join("\n\n")
}

/// Response-language directive for the prompt tail.
fn language_directive(locale: Option<&str>) -> String {
    match locale {
        Some("lt") => "Always respond in Lithuanian.".to_owned(),
        Some("en") | None => "Always respond in English.".to_owned(),
        Some(other) => format!("Always respond in the language with code '{other}'."),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use cr_domain::agent::AgentType;

    fn toggles(pairs: &[(&str, bool)]) -> HashMap<String, bool> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn toggleable_tools_default_off() {
        let res = resolve_agent("chat-model", &HashMap::new(), &[], None);
        assert_eq!(res.agent.agent_type, AgentType::General);
        assert!(!res.tools.contains(&ToolName::Chart));
        assert!(!res.tools.contains(&ToolName::DeepResearch));
        assert!(res.tools.contains(&ToolName::WebSearch));
        assert!(res.tools.contains(&ToolName::GetWeather));
    }

    #[test]
    fn toggle_on_activates_tool() {
        let res = resolve_agent(
            "chat-model",
            &toggles(&[("chart", true)]),
            &[],
            None,
        );
        assert!(res.tools.contains(&ToolName::Chart));
    }

    #[test]
    fn toggle_cannot_add_disallowed_tool() {
        // The vision agent never gets deep research, toggled or not.
        let res = resolve_agent(
            "vision-model",
            &toggles(&[("deep_research", true)]),
            &[],
            None,
        );
        assert!(!res.tools.contains(&ToolName::DeepResearch));
    }

    #[test]
    fn exclusion_conflict_settled_by_rank() {
        let res = resolve_agent(
            "chat-model",
            &toggles(&[("deep_research", true), ("generate_image", true)]),
            &[],
            None,
        );
        assert!(res.tools.contains(&ToolName::DeepResearch));
        assert!(!res.tools.contains(&ToolName::GenerateImage));
    }

    #[test]
    fn unknown_toggle_keys_ignored() {
        let res = resolve_agent(
            "chat-model",
            &toggles(&[("flux_capacitor", true), ("chart", true)]),
            &[],
            None,
        );
        assert!(res.tools.contains(&ToolName::Chart));
    }

    #[test]
    fn tools_keep_agent_declaration_order() {
        let res = resolve_agent(
            "chat-model",
            &toggles(&[("chart", true), ("edit_image", true)]),
            &[],
            None,
        );
        let declared = res.agent.allowed_tools;
        let positions: Vec<usize> = res
            .tools
            .iter()
            .map(|t| declared.iter().position(|d| d == t).unwrap())
            .collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);
    }

    #[test]
    fn prompt_contains_tool_block_and_status() {
        let res = resolve_agent(
            "chat-model",
            &toggles(&[("chart", true)]),
            &[],
            None,
        );
        assert!(res.system_prompt.starts_with(res.agent.base_prompt));
        assert!(res
            .system_prompt
            .contains("====== CURRENTLY AVAILABLE TOOLS ======"));
        assert!(res.system_prompt.contains("- Charts is enabled"));
        assert!(res
            .system_prompt
            .contains("- Deep research is disabled (not activated for this conversation)"));
    }

    #[test]
    fn language_directive_variants() {
        assert_eq!(language_directive(None), "Always respond in English.");
        assert_eq!(language_directive(Some("en")), "Always respond in English.");
        assert_eq!(
            language_directive(Some("lt")),
            "Always respond in Lithuanian."
        );
        assert_eq!(
            language_directive(Some("fr")),
            "Always respond in the language with code 'fr'."
        );
    }

    #[test]
    fn system_queue_appended_verbatim() {
        let queue = vec![
            "User timezone: Europe/Vilnius".to_string(),
            "Workspace: acme".to_string(),
        ];
        let res = resolve_agent("chat-model", &HashMap::new(), &queue, None);
        assert!(res.system_prompt.ends_with(
            "## Additional Context:\nUser timezone: Europe/Vilnius\n\nWorkspace: acme"
        ));
    }
}
