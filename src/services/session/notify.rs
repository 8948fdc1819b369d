// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use std::fmt;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Success,
    Error,
    Info,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Success => "success",
            Severity::Error => "error",
            Severity::Info => "info",
            Severity::Warning => "warning",
        };
        f.write_str(s)
    }
}

/// Transient, user-visible message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
}

/// Fan-out point for notifications. Every message is also logged, so a
/// session with nobody listening still leaves a trace.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: Option<mpsc::UnboundedSender<Notification>>,
}

impl Notifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Log-only notifier.
    pub fn silent() -> Self {
        Self { tx: None }
    }

    pub fn notify(&self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Error => tracing::error!(target: "notify", %message),
            Severity::Warning => tracing::warn!(target: "notify", %message),
            Severity::Success | Severity::Info => tracing::info!(target: "notify", %severity, %message),
        }
        if let Some(tx) = &self.tx
            && tx.send(Notification { message, severity }).is_err()
        {
            tracing::debug!(target: "notify", "notification receiver dropped");
        }
    }

    pub fn success(&self, message: impl Into<String>) {
        self.notify(Severity::Success, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(Severity::Error, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.notify(Severity::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.notify(Severity::Warning, message);
    }
}
