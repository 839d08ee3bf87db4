//! Standard interview flow.
//!
//! Wires the five interview phases into a linear handoff chain:
//! introduction -> experience -> behavioral -> candidate_questions -> closing.
//! Instructions are integrator-supplied plain text, loaded from a prompts
//! directory keyed by agent id; the roster builder injects the transfer
//! tools that let the model advance through the chain.

use crate::agent::{Agent, AgentRoster};
use anyhow::{Context, Result};
use std::collections::HashMap;

/// Phase ids of the standard interview, in conversation order.
pub const INTERVIEW_PHASES: [&str; 5] = [
    "introduction",
    "experience",
    "behavioral",
    "candidate_questions",
    "closing",
];

/// Builds the standard interview roster from a map of agent id -> prompt
/// text. Every phase must have a prompt; the chain is wired here, not in
/// the prompt files.
pub fn build_interview_roster(prompts: &HashMap<String, String>) -> Result<AgentRoster> {
    let descriptions: HashMap<&str, &str> = HashMap::from([
        ("introduction", "Greets the candidate and opens the interview."),
        ("experience", "Asks about work history and relevant experience."),
        ("behavioral", "Asks situational and behavioral questions."),
        (
            "candidate_questions",
            "Takes questions from the candidate about the role.",
        ),
        ("closing", "Wraps up the interview and explains next steps."),
    ]);

    let mut agents = Vec::with_capacity(INTERVIEW_PHASES.len());
    for (i, id) in INTERVIEW_PHASES.iter().enumerate() {
        let instructions = prompts
            .get(*id)
            .with_context(|| format!("missing prompt for interview agent '{id}'"))?;
        let mut agent =
            Agent::new(*id, descriptions[id]).with_instructions(instructions.clone());
        if let Some(next) = INTERVIEW_PHASES.get(i + 1) {
            agent = agent.with_downstream(&[next]);
        }
        agents.push(agent);
    }

    Ok(AgentRoster::new(agents)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompts() -> HashMap<String, String> {
        INTERVIEW_PHASES
            .iter()
            .map(|id| (id.to_string(), format!("You are the {id} interviewer.")))
            .collect()
    }

    #[test]
    fn builds_linear_chain() {
        let roster = build_interview_roster(&prompts()).unwrap();
        assert_eq!(roster.entry_agent_id(), "introduction");
        assert_eq!(
            roster.get("introduction").unwrap().downstream_agent_ids,
            vec!["experience"]
        );
        assert_eq!(
            roster.get("candidate_questions").unwrap().downstream_agent_ids,
            vec!["closing"]
        );
        assert!(roster.get("closing").unwrap().downstream_agent_ids.is_empty());
    }

    #[test]
    fn every_non_terminal_phase_gets_a_transfer_tool() {
        let roster = build_interview_roster(&prompts()).unwrap();
        for pair in INTERVIEW_PHASES.windows(2) {
            let tool_name = format!("transfer_to_{}", pair[1]);
            assert!(
                roster.get(pair[0]).unwrap().tool(&tool_name).is_some(),
                "{} should carry {tool_name}",
                pair[0]
            );
        }
    }

    #[test]
    fn missing_prompt_is_an_error() {
        let mut p = prompts();
        p.remove("behavioral");
        let err = build_interview_roster(&p).unwrap_err();
        assert!(err.to_string().contains("behavioral"));
    }
}
