//! Local desktop notifications through `terminal-notifier`.

use std::path::{Path, PathBuf};

use ghostrun_core::Event;
use ghostrun_core::config::NotificationConfig;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{Notification, NotificationError, notification_for};
use crate::executor::EventObserver;

/// Runs `terminal-notifier` once per notification.
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    program: PathBuf,
}

impl DesktopNotifier {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// `None` when no notifier binary is configured.
    pub fn from_config(config: &NotificationConfig) -> Option<Self> {
        let program = config.terminal_notifier.as_deref()?;
        info!(program = %program.display(), "Desktop notifications enabled");
        Some(Self::new(program))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn args(notification: &Notification) -> [&str; 6] {
        [
            "-title",
            notification.title.as_str(),
            "-message",
            notification.message.as_str(),
            "-sound",
            notification.priority.sound(),
        ]
    }

    /// Show `notification` and wait for the notifier to exit.
    pub async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        let output = Command::new(&self.program)
            .args(Self::args(notification))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| NotificationError::Command(e.to_string()))?;
        if output.status.success() {
            debug!(title = %notification.title, "Desktop notification shown");
            Ok(())
        } else {
            Err(NotificationError::Command(format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

impl EventObserver for DesktopNotifier {
    fn observe(&self, event: &Event) {
        let Some(notification) = notification_for(event) else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime available, dropping desktop notification");
            return;
        };
        let notifier = self.clone();
        runtime.spawn(async move {
            if let Err(e) = notifier.send(&notification).await {
                warn!(error = %e, title = %notification.title, "Failed to show desktop notification");
            }
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::notify::Priority;

    fn alert(priority: Priority) -> Notification {
        Notification {
            title: "Claude Code - Error".into(),
            message: "Execution timeout".into(),
            priority,
        }
    }

    #[test]
    fn high_priority_uses_the_alert_sound() {
        assert_eq!(
            DesktopNotifier::args(&alert(Priority::High)),
            [
                "-title",
                "Claude Code - Error",
                "-message",
                "Execution timeout",
                "-sound",
                "Basso"
            ]
        );
        assert_eq!(DesktopNotifier::args(&alert(Priority::Normal))[5], "default");
    }

    #[test]
    fn disabled_without_a_program() {
        assert!(DesktopNotifier::from_config(&NotificationConfig::default()).is_none());
        let config = NotificationConfig {
            terminal_notifier: Some(PathBuf::from("/usr/local/bin/terminal-notifier")),
            ..NotificationConfig::default()
        };
        let notifier = DesktopNotifier::from_config(&config).unwrap();
        assert_eq!(notifier.program(), Path::new("/usr/local/bin/terminal-notifier"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn send_runs_the_notifier_with_arguments() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("terminal-notifier");
        let log = dir.path().join("args.txt");
        std::fs::write(
            &script,
            format!("#!/bin/sh\nprintf '%s\\n' \"$@\" > '{}'\n", log.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        DesktopNotifier::new(&script)
            .send(&alert(Priority::High))
            .await
            .unwrap();
        let args = std::fs::read_to_string(&log).unwrap();
        assert_eq!(
            args.lines().collect::<Vec<_>>(),
            [
                "-title",
                "Claude Code - Error",
                "-message",
                "Execution timeout",
                "-sound",
                "Basso"
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_notifier_is_an_error() {
        let err = DesktopNotifier::new("false")
            .send(&alert(Priority::Normal))
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::Command(_)));
    }
}
