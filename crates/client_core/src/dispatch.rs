use std::time::Duration;

use shared::{
    domain::Severity,
    error::{MalformedEnvelope, TransportError},
    protocol::{Outcome, ResponseEnvelope},
};
use tracing::debug;

/// Delay the front-ends wait before a post-success redirect or reload.
pub const DEFAULT_FOLLOW_UP_DELAY: Duration = Duration::from_millis(5000);

/// Toast text shown for transport failures, which carry no server message.
pub const TRANSPORT_FAILURE_TEXT: &str = "Unknown host error";

/// What happens after a success toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessAction {
    Notify,
    RedirectAfter(Duration),
    ReloadAfter(Duration),
}

/// Where a post-success redirect gets its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectSource {
    /// A preconfigured target.
    Fixed(String),
    /// The target the server put in the envelope message (sign-out flow).
    FromMessage,
}

/// Per-call-site configuration of the success path. The error path ignores
/// it entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionPolicy {
    pub on_success: SuccessAction,
    pub redirect_source: RedirectSource,
    /// Fixed toast text overriding the envelope message on success.
    pub success_text: Option<String>,
}

impl Default for ActionPolicy {
    fn default() -> Self {
        Self {
            on_success: SuccessAction::Notify,
            redirect_source: RedirectSource::FromMessage,
            success_text: None,
        }
    }
}

impl ActionPolicy {
    pub fn notify_only() -> Self {
        Self::default()
    }

    pub fn redirect_after(delay: Duration, source: RedirectSource) -> Self {
        Self {
            on_success: SuccessAction::RedirectAfter(delay),
            redirect_source: source,
            success_text: None,
        }
    }

    pub fn reload_after(delay: Duration) -> Self {
        Self {
            on_success: SuccessAction::ReloadAfter(delay),
            ..Self::default()
        }
    }

    pub fn with_success_text(mut self, text: impl Into<String>) -> Self {
        self.success_text = Some(text.into());
        self
    }
}

/// Data-only description of what the UI should show and do next. Acting on
/// it belongs to the notifier/navigator collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayIntent {
    Notify {
        severity: Severity,
        text: String,
    },
    NotifyThenRedirect {
        severity: Severity,
        text: String,
        target: String,
        delay: Duration,
    },
    NotifyThenReload {
        severity: Severity,
        text: String,
        delay: Duration,
    },
}

impl DisplayIntent {
    pub fn severity(&self) -> Severity {
        match self {
            Self::Notify { severity, .. }
            | Self::NotifyThenRedirect { severity, .. }
            | Self::NotifyThenReload { severity, .. } => *severity,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Notify { text, .. }
            | Self::NotifyThenRedirect { text, .. }
            | Self::NotifyThenReload { text, .. } => text,
        }
    }
}

/// Map a decoded envelope to a display intent under the given policy.
///
/// `Outcome::Error` always yields a plain error toast with no follow-up,
/// whatever the policy says; an unrecognized tag is an error, not a no-op.
pub fn dispatch(
    envelope: &ResponseEnvelope,
    policy: &ActionPolicy,
) -> Result<DisplayIntent, MalformedEnvelope> {
    match envelope.outcome()? {
        Outcome::Ok => {
            let text = policy
                .success_text
                .clone()
                .unwrap_or_else(|| envelope.message.clone());
            Ok(match policy.on_success {
                SuccessAction::Notify => DisplayIntent::Notify {
                    severity: Severity::Success,
                    text,
                },
                SuccessAction::RedirectAfter(delay) => {
                    let target = match &policy.redirect_source {
                        RedirectSource::Fixed(url) => url.clone(),
                        RedirectSource::FromMessage => envelope.message.clone(),
                    };
                    DisplayIntent::NotifyThenRedirect {
                        severity: Severity::Success,
                        text,
                        target,
                        delay,
                    }
                }
                SuccessAction::ReloadAfter(delay) => DisplayIntent::NotifyThenReload {
                    severity: Severity::Success,
                    text,
                    delay,
                },
            })
        }
        Outcome::Error => Ok(DisplayIntent::Notify {
            severity: Severity::Error,
            text: envelope.message.clone(),
        }),
    }
}

/// Render a transport-level failure through the same intent shape the
/// envelope path uses.
pub fn transport_failure_intent(error: &TransportError) -> DisplayIntent {
    debug!("rendering transport failure as error toast: {error}");
    DisplayIntent::Notify {
        severity: Severity::Error,
        text: TRANSPORT_FAILURE_TEXT.to_string(),
    }
}

#[cfg(test)]
#[path = "tests/dispatch_tests.rs"]
mod tests;
