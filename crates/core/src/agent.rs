//! Agent Roster
//!
//! An agent is one phase of the interview: a named instruction/tool
//! configuration that governs the model's behavior while it is active.
//! Agents are stored in a flat, owned collection addressed by stable id;
//! "downstream" links between phases are id references rather than owned
//! children, because the handoff graph may reuse nodes.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;

/// The synthetic tool-name prefix that marks a transfer tool. The target
/// agent id is encoded in the name itself: `transfer_to_<agent-id>`.
pub const TRANSFER_TOOL_PREFIX: &str = "transfer_to_";

/// A single tool the model may call while an agent is active.
///
/// `parameters` is an opaque JSON-schema value supplied by the integrator;
/// the orchestrator never inspects it beyond forwarding it in the session
/// configuration.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
    /// True for the synthetic handoff tools injected by the roster builder.
    #[serde(default)]
    pub is_transfer: bool,
}

impl ToolSpec {
    /// The target agent id a transfer tool points at, if this is one.
    pub fn transfer_target(&self) -> Option<&str> {
        if self.is_transfer {
            self.name.strip_prefix(TRANSFER_TOOL_PREFIX)
        } else {
            None
        }
    }
}

/// One interview phase: immutable after roster construction.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Agent {
    pub id: String,
    pub public_description: String,
    pub instructions: String,
    pub tools: Vec<ToolSpec>,
    /// Ids of the agents this phase may hand off to, in order.
    pub downstream_agent_ids: Vec<String>,
}

impl Agent {
    pub fn new(id: impl Into<String>, public_description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            public_description: public_description.into(),
            instructions: String::new(),
            tools: Vec::new(),
            downstream_agent_ids: Vec::new(),
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_downstream(mut self, ids: &[&str]) -> Self {
        self.downstream_agent_ids = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Whether this agent may hand off to `target`.
    pub fn can_transfer_to(&self, target: &str) -> bool {
        self.downstream_agent_ids.iter().any(|id| id == target)
    }

    /// Finds a tool by name within this agent's tool set.
    pub fn tool(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|t| t.name == name)
    }
}

/// Errors raised while assembling a roster.
#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("duplicate agent id: {0}")]
    DuplicateId(String),
    #[error("agent '{0}' references unknown downstream agent '{1}'")]
    UnknownDownstream(String, String),
    #[error("roster is empty")]
    Empty,
}

/// The flat, shared collection of agents for one interview scenario.
///
/// The first agent in construction order is the entry phase.
#[derive(Debug, Clone)]
pub struct AgentRoster {
    agents: Vec<Agent>,
}

impl AgentRoster {
    /// Builds a roster, validating id uniqueness and downstream references,
    /// then injects one transfer tool per downstream link.
    pub fn new(agents: Vec<Agent>) -> Result<Self, RosterError> {
        if agents.is_empty() {
            return Err(RosterError::Empty);
        }
        let mut seen = HashSet::new();
        for agent in &agents {
            if !seen.insert(agent.id.clone()) {
                return Err(RosterError::DuplicateId(agent.id.clone()));
            }
        }
        for agent in &agents {
            for target in &agent.downstream_agent_ids {
                if !seen.contains(target) {
                    return Err(RosterError::UnknownDownstream(
                        agent.id.clone(),
                        target.clone(),
                    ));
                }
            }
        }
        let mut roster = Self { agents };
        roster.inject_transfer_tools();
        Ok(roster)
    }

    /// The id of the entry agent (the first phase).
    pub fn entry_agent_id(&self) -> &str {
        &self.agents[0].id
    }

    pub fn get(&self, id: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Appends a synthetic `transfer_to_<id>` tool to every agent with
    /// downstream links. The tool's parameters ask the model for a rationale
    /// and a context summary, which travel with the handoff for audit.
    fn inject_transfer_tools(&mut self) {
        // Descriptions need the target's public description, so resolve them
        // before taking mutable borrows.
        let descriptions: Vec<Vec<(String, String)>> = self
            .agents
            .iter()
            .map(|agent| {
                agent
                    .downstream_agent_ids
                    .iter()
                    .map(|target| {
                        let desc = self
                            .get(target)
                            .map(|a| a.public_description.clone())
                            .unwrap_or_default();
                        (target.clone(), desc)
                    })
                    .collect()
            })
            .collect();

        for (agent, targets) in self.agents.iter_mut().zip(descriptions) {
            for (target, desc) in targets {
                let name = format!("{TRANSFER_TOOL_PREFIX}{target}");
                if agent.tool(&name).is_some() {
                    continue;
                }
                agent.tools.push(ToolSpec {
                    name,
                    description: format!(
                        "Hand the conversation off to the '{target}' agent. {desc}"
                    ),
                    parameters: json!({
                        "type": "object",
                        "properties": {
                            "rationale_for_transfer": {
                                "type": "string",
                                "description": "Why the conversation should move to this agent."
                            },
                            "conversation_context": {
                                "type": "string",
                                "description": "Key facts from the conversation so far, for the next agent."
                            }
                        },
                        "required": ["rationale_for_transfer", "conversation_context"]
                    }),
                    is_transfer: true,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> AgentRoster {
        AgentRoster::new(vec![
            Agent::new("a", "first").with_downstream(&["b"]),
            Agent::new("b", "second").with_downstream(&["c"]),
            Agent::new("c", "last"),
        ])
        .unwrap()
    }

    #[test]
    fn entry_agent_is_first() {
        let roster = chain();
        assert_eq!(roster.entry_agent_id(), "a");
    }

    #[test]
    fn transfer_tools_are_injected_per_downstream_link() {
        let roster = chain();
        let a = roster.get("a").unwrap();
        let tool = a.tool("transfer_to_b").expect("transfer tool missing");
        assert!(tool.is_transfer);
        assert_eq!(tool.transfer_target(), Some("b"));
        // The terminal agent gets no transfer tools.
        assert!(roster.get("c").unwrap().tools.is_empty());
    }

    #[test]
    fn transfer_tool_description_names_target() {
        let roster = chain();
        let tool = roster.get("b").unwrap().tool("transfer_to_c").unwrap();
        assert!(tool.description.contains("'c'"));
        assert!(tool.description.contains("last"));
    }

    #[test]
    fn can_transfer_to_checks_downstream_set() {
        let roster = chain();
        assert!(roster.get("a").unwrap().can_transfer_to("b"));
        assert!(!roster.get("a").unwrap().can_transfer_to("c"));
        assert!(!roster.get("c").unwrap().can_transfer_to("b"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = AgentRoster::new(vec![Agent::new("a", ""), Agent::new("a", "")]).unwrap_err();
        assert!(matches!(err, RosterError::DuplicateId(id) if id == "a"));
    }

    #[test]
    fn unknown_downstream_is_rejected() {
        let err =
            AgentRoster::new(vec![Agent::new("a", "").with_downstream(&["ghost"])]).unwrap_err();
        assert!(
            matches!(err, RosterError::UnknownDownstream(from, to) if from == "a" && to == "ghost")
        );
    }

    #[test]
    fn non_transfer_tool_has_no_target() {
        let tool = ToolSpec {
            name: "transfer_to_b".into(),
            description: String::new(),
            parameters: json!({}),
            is_transfer: false,
        };
        assert_eq!(tool.transfer_target(), None);
    }
}
