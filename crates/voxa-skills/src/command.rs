//! The closed tool-command set spoken by the reasoning collaborator.
//!
//! A tool invocation arrives as a JSON object `{"tool": ..., "args": ...}`.
//! Decoding is strict: unknown tool names, unknown argument fields, and
//! payloads that are not commands are all decode errors; there is no
//! best-effort key matching.

use serde::Deserialize;

/// How `edit_file` applies its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    /// Add to the end of an existing file (the default).
    #[default]
    Append,
    /// Replace the file's contents.
    Overwrite,
}

/// One validated tool invocation against the sandboxed storage area.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "tool", content = "args", rename_all = "snake_case", deny_unknown_fields)]
pub enum ToolCommand {
    CreateFile {
        filename: String,
        #[serde(default)]
        content: String,
    },
    EditFile {
        filename: String,
        content: String,
        #[serde(default)]
        mode: EditMode,
    },
    ReadFile {
        filename: String,
    },
    DeleteFile {
        filename: String,
    },
    ListFiles,
}

impl ToolCommand {
    /// Strictly decodes a reply that claims to be a tool invocation.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw.trim())
    }

    /// Cheap pre-filter: does this reply even look like a tool invocation?
    /// A positive answer still has to survive `parse`.
    pub fn looks_like_command(raw: &str) -> bool {
        let trimmed = raw.trim();
        trimmed.starts_with('{') && trimmed.contains("\"tool\"")
    }
}
