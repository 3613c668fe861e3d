//! # voxa-skills: tool commands and the sandboxed executor
//!
//! The reasoning collaborator may answer with a structured tool invocation
//! instead of free-form text. This crate owns the closed command set (a
//! strictly-decoded tagged enum) and the executor that runs a command
//! against a sandboxed directory, reporting every outcome, including every
//! error, as plain text for the agent to speak.

pub mod command;
pub mod sandbox;

pub use command::{EditMode, ToolCommand};
pub use sandbox::SandboxTools;
