//! Roadblock Agent
//!
//! Drives the core engine against the outside world: fetches the policy on a
//! schedule, installs block rules into the filtering engine, persists state,
//! and answers navigation events with redirects.
//!
//! Every host facility is a trait so the agent can run against a real network
//! and disk or against in-memory fakes:
//!
//! - `source`: policy document fetch
//! - `probe`: liveness checks for remote redirect targets
//! - `engine`: the block-rule filtering engine
//! - `store`: persistent key/value state
//! - `navigation`: navigation events in, URL overrides out

pub mod config;
pub mod engine;
pub mod error;
pub mod navigation;
pub mod orchestrator;
pub mod probe;
pub mod resolver;
pub mod source;
pub mod store;

pub use config::AgentConfig;
pub use engine::{FilterEngine, MemoryEngine};
pub use error::{AgentError, Result};
pub use navigation::{ChannelSink, NavigationEvent, NavigationOverride, NavigationSink, NavigationStatus};
pub use orchestrator::{AgentStatus, Collaborators, Command, Orchestrator, RefreshOutcome};
pub use probe::{HttpProbe, Probe};
pub use resolver::TargetResolver;
pub use source::{HttpPolicySource, PolicySource};
pub use store::{FileStore, KeyValueStore, MemoryStore, StateStore};
