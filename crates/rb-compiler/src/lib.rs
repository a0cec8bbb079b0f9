//! Roadblock Policy Compiler
//!
//! This crate parses policy documents and compiles them into block rules,
//! redirect rules and the lock state.

pub mod builder;
pub mod dnr;
pub mod parser;

pub use builder::{compile_policy, CompileStats, CompiledPolicy};
pub use dnr::{to_dnr_rules, DnrRule, DnrUpdate};
pub use parser::{parse_policy, ParseError, PolicyDocument, PolicyEntry, RedirectFields};
