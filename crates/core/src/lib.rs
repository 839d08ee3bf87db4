//! Interview Core Library
//!
//! Domain model shared across services: the agent roster (interview phases),
//! their tool specifications, and the wiring of the standard interview flow.
//! The orchestrator in `services/api` treats all of this as read-only
//! configuration data.

pub mod agent;
pub mod interview;
