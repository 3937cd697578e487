//! Island session orchestration behind the connection-routing tier.
//!
//! When a player asks for their island, causeway checks the control plane,
//! starts the island if needed, waits for readiness (poll or push), and then
//! registers and routes the live connection. The control plane stays the
//! sole source of truth for island lifecycle and team membership; everything
//! in-process here is transient.

pub mod config;
pub mod orchestrator;
pub mod pending;
pub mod readiness;
pub mod registry;
pub mod router_http;
pub mod routes;
pub mod state;
pub mod team_cache;
pub mod telemetry;
