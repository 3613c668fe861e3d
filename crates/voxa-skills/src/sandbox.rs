//! Sandboxed file-tool executor.
//!
//! Every command operates inside one sandbox directory and every outcome,
//! including every filesystem error, comes back as a plain status string.
//! Nothing here can fault the conversation loop.

use crate::command::{EditMode, ToolCommand};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Max characters of file content returned by `read_file`.
const READ_PREVIEW_CHARS: usize = 1000;

/// Executes tool commands against one sandboxed directory.
pub struct SandboxTools {
    root: PathBuf,
}

impl SandboxTools {
    /// Creates the sandbox directory if it does not exist yet.
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let root = root.canonicalize()?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Runs one command. Never fails: errors come back as the status text.
    pub fn execute(&self, command: &ToolCommand) -> String {
        debug!(?command, "executing tool command");
        match command {
            ToolCommand::CreateFile { filename, content } => self.create_file(filename, content),
            ToolCommand::EditFile {
                filename,
                content,
                mode,
            } => self.edit_file(filename, content, *mode),
            ToolCommand::ReadFile { filename } => self.read_file(filename),
            ToolCommand::DeleteFile { filename } => self.delete_file(filename),
            ToolCommand::ListFiles => self.list_files(),
        }
    }

    /// Maps a requested filename to a path inside the sandbox. Absolute
    /// paths and `..` traversal are refused outright.
    fn resolve(&self, filename: &str) -> Result<PathBuf, String> {
        let normalized = filename.trim().replace('\\', "/");
        if normalized.is_empty() {
            return Err("A filename is required.".to_string());
        }
        let candidate = Path::new(&normalized);
        if candidate.is_absolute() {
            return Err("Access denied: absolute paths are not allowed.".to_string());
        }
        let mut target = self.root.clone();
        for component in candidate.components() {
            match component {
                Component::Normal(segment) => target.push(segment),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err("Access denied: path traversal is not allowed.".to_string());
                }
            }
        }
        Ok(target)
    }

    fn create_file(&self, filename: &str, content: &str) -> String {
        let target = match self.resolve(filename) {
            Ok(t) => t,
            Err(denied) => return denied,
        };
        if let Some(parent) = target.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                return format!("Error: {e}");
            }
        }
        match fs::write(&target, content) {
            Ok(()) => format!("File '{filename}' created."),
            Err(e) => format!("Error: {e}"),
        }
    }

    fn edit_file(&self, filename: &str, content: &str, mode: EditMode) -> String {
        let target = match self.resolve(filename) {
            Ok(t) => t,
            Err(denied) => return denied,
        };
        match mode {
            EditMode::Append => {
                if !target.is_file() {
                    return "File not found. Create it first.".to_string();
                }
                let opened = fs::OpenOptions::new().append(true).open(&target);
                let mut file = match opened {
                    Ok(f) => f,
                    Err(e) => return format!("Error: {e}"),
                };
                // Appended content goes on its own line.
                match write!(file, "\n{content}") {
                    Ok(()) => format!("File '{filename}' updated."),
                    Err(e) => format!("Error: {e}"),
                }
            }
            EditMode::Overwrite => match fs::write(&target, content) {
                Ok(()) => format!("File '{filename}' overwritten."),
                Err(e) => format!("Error: {e}"),
            },
        }
    }

    fn read_file(&self, filename: &str) -> String {
        let target = match self.resolve(filename) {
            Ok(t) => t,
            Err(denied) => return denied,
        };
        match fs::read_to_string(&target) {
            Ok(text) => {
                let preview: String = text.chars().take(READ_PREVIEW_CHARS).collect();
                format!("Content:\n{preview}")
            }
            Err(e) if e.kind() == ErrorKind::NotFound => "File not found.".to_string(),
            Err(e) => format!("Error: {e}"),
        }
    }

    fn delete_file(&self, filename: &str) -> String {
        let target = match self.resolve(filename) {
            Ok(t) => t,
            Err(denied) => return denied,
        };
        match fs::remove_file(&target) {
            Ok(()) => format!("File '{filename}' deleted."),
            Err(e) if e.kind() == ErrorKind::NotFound => "File not found.".to_string(),
            Err(e) => format!("Error: {e}"),
        }
    }

    fn list_files(&self) -> String {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => return format!("Error: {e}"),
        };
        let mut names: Vec<String> = entries
            .flatten()
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        if names.is_empty() {
            return "The sandbox is empty.".to_string();
        }
        names.sort();
        names.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sandbox() -> (tempfile::TempDir, SandboxTools) {
        let dir = tempdir().unwrap();
        let tools = SandboxTools::new(dir.path().join("sandbox")).unwrap();
        (dir, tools)
    }

    #[test]
    fn create_then_read_round_trip() {
        let (_dir, tools) = sandbox();
        let status = tools.execute(&ToolCommand::CreateFile {
            filename: "notes.txt".to_string(),
            content: "remember the milk".to_string(),
        });
        assert_eq!(status, "File 'notes.txt' created.");

        let status = tools.execute(&ToolCommand::ReadFile {
            filename: "notes.txt".to_string(),
        });
        assert_eq!(status, "Content:\nremember the milk");
    }

    #[test]
    fn append_requires_an_existing_file() {
        let (_dir, tools) = sandbox();
        let status = tools.execute(&ToolCommand::EditFile {
            filename: "missing.txt".to_string(),
            content: "more".to_string(),
            mode: EditMode::Append,
        });
        assert_eq!(status, "File not found. Create it first.");
    }

    #[test]
    fn append_adds_a_new_line_overwrite_replaces() {
        let (_dir, tools) = sandbox();
        tools.execute(&ToolCommand::CreateFile {
            filename: "log.txt".to_string(),
            content: "one".to_string(),
        });
        let status = tools.execute(&ToolCommand::EditFile {
            filename: "log.txt".to_string(),
            content: "two".to_string(),
            mode: EditMode::Append,
        });
        assert_eq!(status, "File 'log.txt' updated.");
        assert_eq!(
            fs::read_to_string(tools.root().join("log.txt")).unwrap(),
            "one\ntwo"
        );

        let status = tools.execute(&ToolCommand::EditFile {
            filename: "log.txt".to_string(),
            content: "fresh".to_string(),
            mode: EditMode::Overwrite,
        });
        assert_eq!(status, "File 'log.txt' overwritten.");
        assert_eq!(
            fs::read_to_string(tools.root().join("log.txt")).unwrap(),
            "fresh"
        );
    }

    #[test]
    fn traversal_and_absolute_paths_are_denied() {
        let (_dir, tools) = sandbox();
        let status = tools.execute(&ToolCommand::ReadFile {
            filename: "../outside.txt".to_string(),
        });
        assert_eq!(status, "Access denied: path traversal is not allowed.");

        let status = tools.execute(&ToolCommand::DeleteFile {
            filename: "/etc/hosts".to_string(),
        });
        assert_eq!(status, "Access denied: absolute paths are not allowed.");
    }

    #[test]
    fn delete_and_list_report_plain_statuses() {
        let (_dir, tools) = sandbox();
        assert_eq!(tools.execute(&ToolCommand::ListFiles), "The sandbox is empty.");

        tools.execute(&ToolCommand::CreateFile {
            filename: "b.txt".to_string(),
            content: String::new(),
        });
        tools.execute(&ToolCommand::CreateFile {
            filename: "a.txt".to_string(),
            content: String::new(),
        });
        assert_eq!(tools.execute(&ToolCommand::ListFiles), "a.txt, b.txt");

        assert_eq!(
            tools.execute(&ToolCommand::DeleteFile {
                filename: "a.txt".to_string(),
            }),
            "File 'a.txt' deleted."
        );
        assert_eq!(
            tools.execute(&ToolCommand::DeleteFile {
                filename: "a.txt".to_string(),
            }),
            "File not found."
        );
    }

    #[test]
    fn long_reads_are_truncated() {
        let (_dir, tools) = sandbox();
        tools.execute(&ToolCommand::CreateFile {
            filename: "big.txt".to_string(),
            content: "x".repeat(5000),
        });
        let status = tools.execute(&ToolCommand::ReadFile {
            filename: "big.txt".to_string(),
        });
        assert_eq!(status.len(), "Content:\n".len() + READ_PREVIEW_CHARS);
    }
}
