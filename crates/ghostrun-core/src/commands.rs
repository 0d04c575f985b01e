//! Slash-command whitelist and prompt construction.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;

use crate::config::CommandsConfig;
use crate::error::{Error, Result};

/// Commands a caller may run. Built once at startup and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandWhitelist {
    allowed: BTreeSet<String>,
}

impl Default for CommandWhitelist {
    fn default() -> Self {
        Self::from_config(&CommandsConfig::default())
    }
}

impl CommandWhitelist {
    pub fn new<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: commands.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &CommandsConfig) -> Self {
        Self::new(config.allowed.iter().cloned())
    }

    pub fn contains(&self, command: &str) -> bool {
        self.allowed.contains(command)
    }

    /// Reject any command outside the whitelist.
    pub fn check(&self, command: &str) -> Result<()> {
        if self.contains(command) {
            Ok(())
        } else {
            Err(Error::CommandNotAllowed(command.to_string()))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.allowed.iter().map(String::as_str)
    }
}

/// Build the prompt for a fresh execution: `/<command> <args>`, followed by
/// a numbered list of attached image paths when there are any.
pub fn build_prompt<P: AsRef<Path>>(command: &str, args: &str, image_paths: &[P]) -> String {
    let mut prompt = format!("/{command} {args}");
    if image_paths.is_empty() {
        return prompt;
    }

    prompt.push_str("\n\nAttached images:\n");
    for (i, path) in image_paths.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {}", i + 1, path.as_ref().display());
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn default_whitelist() {
        let whitelist = CommandWhitelist::default();
        let names: Vec<_> = whitelist.iter().collect();
        assert_eq!(names, ["fullstack", "go", "nextjs", "plan"]);
    }

    #[test]
    fn unlisted_command_is_rejected() {
        let whitelist = CommandWhitelist::new(["plan"]);
        assert!(whitelist.check("plan").is_ok());
        assert!(matches!(
            whitelist.check("rm"),
            Err(Error::CommandNotAllowed(name)) if name == "rm"
        ));
        assert!(whitelist.check("").is_err());
        assert!(whitelist.check("/plan").is_err());
    }

    #[test]
    fn prompt_without_images() {
        let prompt = build_prompt::<PathBuf>("plan", "add login", &[]);
        assert_eq!(prompt, "/plan add login");
    }

    #[test]
    fn prompt_lists_images_in_order() {
        let paths = [PathBuf::from("/tmp/a.png"), PathBuf::from("/tmp/b.jpg")];
        let prompt = build_prompt("go", "fix bug", &paths);
        assert_eq!(
            prompt,
            "/go fix bug\n\nAttached images:\n1. /tmp/a.png\n2. /tmp/b.jpg\n"
        );
    }
}
