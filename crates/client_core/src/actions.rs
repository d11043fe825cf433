use std::{collections::HashMap, time::Duration};

use shared::domain::{BodyEncoding, Method};

use crate::dispatch::{ActionPolicy, RedirectSource, SuccessAction, DEFAULT_FOLLOW_UP_DELAY};

/// One server operation a front-end trigger can start: method, path, how the
/// form content is encoded, whether the request carries a CSRF token pair,
/// and what to do with the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDescriptor {
    pub name: String,
    pub method: Method,
    pub path: String,
    pub encoding: BodyEncoding,
    pub csrf: bool,
    pub policy: ActionPolicy,
}

impl ActionDescriptor {
    pub fn new(name: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method,
            path: path.into(),
            encoding: BodyEncoding::None,
            csrf: false,
            policy: ActionPolicy::notify_only(),
        }
    }

    pub fn encoding(mut self, encoding: BodyEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_csrf(mut self) -> Self {
        self.csrf = true;
        self
    }

    pub fn policy(mut self, policy: ActionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the follow-up delay while keeping the kind of follow-up.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.policy.on_success = match self.policy.on_success {
            SuccessAction::Notify => SuccessAction::Notify,
            SuccessAction::RedirectAfter(_) => SuccessAction::RedirectAfter(delay),
            SuccessAction::ReloadAfter(_) => SuccessAction::ReloadAfter(delay),
        };
        self
    }

    pub fn signup() -> Self {
        Self::new("signup", Method::Post, "/signup")
            .encoding(BodyEncoding::UrlEncoded)
            .with_csrf()
    }

    pub fn signin() -> Self {
        Self::new("signin", Method::Post, "/signin")
            .encoding(BodyEncoding::UrlEncoded)
            .with_csrf()
            .policy(ActionPolicy::redirect_after(
                DEFAULT_FOLLOW_UP_DELAY,
                RedirectSource::Fixed("/loginPage".to_string()),
            ))
    }

    /// Sign-out shows a fixed toast while redirecting to wherever the server
    /// says in the envelope message.
    pub fn signout() -> Self {
        Self::new("signout", Method::Get, "/signout").policy(
            ActionPolicy::redirect_after(DEFAULT_FOLLOW_UP_DELAY, RedirectSource::FromMessage)
                .with_success_text("Signing out..."),
        )
    }

    pub fn upload() -> Self {
        Self::new("upload", Method::Post, "/upload")
            .encoding(BodyEncoding::Multipart)
            .policy(ActionPolicy::reload_after(DEFAULT_FOLLOW_UP_DELAY))
    }

    pub fn remove() -> Self {
        Self::new("remove", Method::Get, "/remove")
            .encoding(BodyEncoding::UrlEncoded)
            .policy(ActionPolicy::reload_after(DEFAULT_FOLLOW_UP_DELAY))
    }

    pub fn clear() -> Self {
        Self::new("clear", Method::Get, "/clear")
            .policy(ActionPolicy::reload_after(DEFAULT_FOLLOW_UP_DELAY))
    }

    pub fn date() -> Self {
        Self::new("date", Method::Get, "/date").encoding(BodyEncoding::UrlEncoded)
    }
}

/// A named UI trigger. The core never touches a DOM; hosts translate their
/// real events (clicks, file-input changes) into these and fire them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Trigger {
    Click(String),
    FileChosen(String),
}

impl Trigger {
    pub fn click(selector: impl Into<String>) -> Self {
        Self::Click(selector.into())
    }

    pub fn file_chosen(selector: impl Into<String>) -> Self {
        Self::FileChosen(selector.into())
    }
}

/// Explicit subscription registry mapping triggers to the actions they
/// start, so front-ends declare their wiring instead of attaching handlers
/// at module scope.
#[derive(Debug, Clone, Default)]
pub struct TriggerBindings {
    bound: HashMap<Trigger, ActionDescriptor>,
}

impl TriggerBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an action to a trigger, returning the action it replaced, if any.
    pub fn bind(&mut self, trigger: Trigger, action: ActionDescriptor) -> Option<ActionDescriptor> {
        self.bound.insert(trigger, action)
    }

    pub fn unbind(&mut self, trigger: &Trigger) -> Option<ActionDescriptor> {
        self.bound.remove(trigger)
    }

    pub fn action_for(&self, trigger: &Trigger) -> Option<&ActionDescriptor> {
        self.bound.get(trigger)
    }

    pub fn triggers(&self) -> impl Iterator<Item = &Trigger> {
        self.bound.keys()
    }

    pub fn len(&self) -> usize {
        self.bound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }
}

/// The wiring every front-end installs on page load.
pub fn standard_bindings() -> TriggerBindings {
    standard_bindings_with_delay(DEFAULT_FOLLOW_UP_DELAY)
}

/// Standard wiring with a non-default follow-up delay.
pub fn standard_bindings_with_delay(delay: Duration) -> TriggerBindings {
    let mut bindings = TriggerBindings::new();
    bindings.bind(
        Trigger::click(".btn-create"),
        ActionDescriptor::signup().with_delay(delay),
    );
    bindings.bind(
        Trigger::click(".btn-auth"),
        ActionDescriptor::signin().with_delay(delay),
    );
    bindings.bind(
        Trigger::click(".btn-logout"),
        ActionDescriptor::signout().with_delay(delay),
    );
    bindings.bind(
        Trigger::file_chosen("input[type='file']"),
        ActionDescriptor::upload().with_delay(delay),
    );
    bindings.bind(
        Trigger::click(".btn-warning"),
        ActionDescriptor::remove().with_delay(delay),
    );
    bindings.bind(
        Trigger::click(".btn-clear"),
        ActionDescriptor::clear().with_delay(delay),
    );
    bindings.bind(
        Trigger::click(".btn-danger"),
        ActionDescriptor::date().with_delay(delay),
    );
    bindings
}

#[cfg(test)]
#[path = "tests/actions_tests.rs"]
mod tests;
