use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use shared::{
    domain::Severity,
    error::TransportError,
    protocol::{FormData, OutboundRequest, ResponseEnvelope},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

pub mod actions;
pub mod config;
pub mod dispatch;
pub mod schedule;
pub mod token;
pub mod transport;

pub use actions::{standard_bindings, ActionDescriptor, Trigger, TriggerBindings};
pub use config::{load_settings, ClientSettings};
pub use dispatch::{ActionPolicy, DisplayIntent, RedirectSource, SuccessAction};
pub use schedule::FollowUp;
pub use token::CsrfToken;
pub use transport::{HttpTransport, InMemoryCookieStore};

/// Cookie half of the anti-forgery pair.
pub const CSRF_COOKIE: &str = "CSRF-TOKEN";
/// Header half of the anti-forgery pair.
pub const CSRF_HEADER: &str = "X-CSRF-TOKEN";

#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: OutboundRequest) -> Result<ResponseEnvelope, TransportError>;
}

pub struct MissingTransport;

#[async_trait]
impl Transport for MissingTransport {
    async fn execute(&self, request: OutboundRequest) -> Result<ResponseEnvelope, TransportError> {
        Err(TransportError::Network(format!(
            "transport unavailable for {}",
            request.path
        )))
    }
}

#[async_trait]
pub trait CookieStore: Send + Sync {
    async fn set_cookie(&self, name: &str, value: &str) -> Result<()>;
}

pub struct MissingCookieStore;

#[async_trait]
impl CookieStore for MissingCookieStore {
    async fn set_cookie(&self, name: &str, _value: &str) -> Result<()> {
        Err(anyhow!("cookie store unavailable for {name}"))
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, severity: Severity, text: &str) -> Result<()>;
}

pub struct MissingNotifier;

#[async_trait]
impl Notifier for MissingNotifier {
    async fn notify(&self, _severity: Severity, _text: &str) -> Result<()> {
        Err(anyhow!("notifier is unavailable"))
    }
}

#[async_trait]
pub trait Navigator: Send + Sync {
    async fn redirect(&self, target: &str) -> Result<()>;
    async fn reload(&self) -> Result<()>;
}

pub struct MissingNavigator;

#[async_trait]
impl Navigator for MissingNavigator {
    async fn redirect(&self, target: &str) -> Result<()> {
        Err(anyhow!("navigator unavailable for redirect to {target}"))
    }

    async fn reload(&self) -> Result<()> {
        Err(anyhow!("navigator is unavailable"))
    }
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    IntentProduced {
        action: String,
        intent: DisplayIntent,
    },
    FollowUpScheduled {
        action: String,
        delay: Duration,
    },
    FollowUpsCancelled {
        count: usize,
    },
    ActionFailed {
        action: String,
        reason: String,
    },
}

/// Client-side core shared by the front-ends: runs one bound action end to
/// end and hands the resulting display intent to the UI collaborators.
///
/// Actions fired concurrently are independent; there is no ordering
/// guarantee and no mutual exclusion between in-flight requests.
pub struct FormClient {
    transport: Arc<dyn Transport>,
    cookies: Arc<dyn CookieStore>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    settings: ClientSettings,
    events: broadcast::Sender<ClientEvent>,
    pending: Mutex<Vec<FollowUp>>,
}

impl FormClient {
    pub fn new(settings: ClientSettings) -> Arc<Self> {
        Self::new_with_dependencies(
            settings,
            Arc::new(MissingTransport),
            Arc::new(MissingCookieStore),
            Arc::new(MissingNotifier),
            Arc::new(MissingNavigator),
        )
    }

    /// Wire the reqwest transport and its cookie jar from settings; the host
    /// still supplies the UI-facing collaborators.
    pub fn new_with_http_transport(
        settings: ClientSettings,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Arc<Self>> {
        let cookies = InMemoryCookieStore::new();
        let transport = HttpTransport::from_settings(&settings, Arc::clone(&cookies))
            .context("failed to build http transport")?;
        Ok(Self::new_with_dependencies(
            settings,
            Arc::new(transport),
            cookies,
            notifier,
            navigator,
        ))
    }

    pub fn new_with_dependencies(
        settings: ClientSettings,
        transport: Arc<dyn Transport>,
        cookies: Arc<dyn CookieStore>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            transport,
            cookies,
            notifier,
            navigator,
            settings,
            events,
            pending: Mutex::new(Vec::new()),
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// The standard trigger wiring, with follow-up delays taken from the
    /// client settings.
    pub fn standard_bindings(&self) -> TriggerBindings {
        actions::standard_bindings_with_delay(self.settings.follow_up_delay())
    }

    /// Resolve `trigger` through `bindings` and run the bound action.
    pub async fn fire(
        &self,
        bindings: &TriggerBindings,
        trigger: &Trigger,
        form: FormData,
    ) -> Result<DisplayIntent> {
        let action = bindings
            .action_for(trigger)
            .ok_or_else(|| anyhow!("no action bound for trigger {trigger:?}"))?;
        self.run(action, form).await
    }

    /// Run one action end to end: generate and place the CSRF pair if the
    /// action needs it, execute the request, turn the response into a
    /// display intent, deliver the toast and schedule any follow-up.
    ///
    /// Transport failures are not errors at this level; they render as the
    /// generic error toast. A token-generation failure aborts before any
    /// request is sent, and an unrecognized response tag propagates.
    pub async fn run(&self, action: &ActionDescriptor, form: FormData) -> Result<DisplayIntent> {
        let mut headers = Vec::new();
        if action.csrf {
            let csrf = match token::generate() {
                Ok(csrf) => csrf,
                Err(err) => {
                    let _ = self.events.send(ClientEvent::ActionFailed {
                        action: action.name.clone(),
                        reason: err.to_string(),
                    });
                    return Err(anyhow::Error::new(err)
                        .context(format!("aborting {} before sending", action.name)));
                }
            };
            self.cookies
                .set_cookie(CSRF_COOKIE, csrf.as_str())
                .await
                .context("failed to store csrf cookie")?;
            headers.push((CSRF_HEADER.to_string(), csrf.into_string()));
        }

        let request = OutboundRequest {
            method: action.method,
            path: action.path.clone(),
            encoding: action.encoding,
            form,
            headers,
        };

        let intent = match self.transport.execute(request).await {
            Ok(envelope) => match dispatch::dispatch(&envelope, &action.policy) {
                Ok(intent) => intent,
                Err(err) => {
                    warn!(
                        "action: unrecognized response tag action={} kind={:?}",
                        action.name, err.kind
                    );
                    let _ = self.events.send(ClientEvent::ActionFailed {
                        action: action.name.clone(),
                        reason: err.to_string(),
                    });
                    return Err(err.into());
                }
            },
            Err(err) => {
                warn!("action: transport failure action={} error={err}", action.name);
                dispatch::transport_failure_intent(&err)
            }
        };

        info!(
            "action: dispatched action={} severity={:?}",
            action.name,
            intent.severity()
        );
        self.apply(&action.name, &intent).await?;
        Ok(intent)
    }

    /// Deliver the toast and schedule the follow-up the intent describes.
    async fn apply(&self, action: &str, intent: &DisplayIntent) -> Result<()> {
        let _ = self.events.send(ClientEvent::IntentProduced {
            action: action.to_string(),
            intent: intent.clone(),
        });

        match intent {
            DisplayIntent::Notify { severity, text } => {
                self.notifier.notify(*severity, text).await?;
            }
            DisplayIntent::NotifyThenRedirect {
                severity,
                text,
                target,
                delay,
            } => {
                self.notifier.notify(*severity, text).await?;
                let navigator = Arc::clone(&self.navigator);
                let target = target.clone();
                let follow_up = FollowUp::after(*delay, async move {
                    if let Err(err) = navigator.redirect(&target).await {
                        warn!("action: redirect failed target={target} error={err}");
                    }
                });
                self.track(action, *delay, follow_up).await;
            }
            DisplayIntent::NotifyThenReload {
                severity,
                text,
                delay,
            } => {
                self.notifier.notify(*severity, text).await?;
                let navigator = Arc::clone(&self.navigator);
                let follow_up = FollowUp::after(*delay, async move {
                    if let Err(err) = navigator.reload().await {
                        warn!("action: reload failed error={err}");
                    }
                });
                self.track(action, *delay, follow_up).await;
            }
        }
        Ok(())
    }

    async fn track(&self, action: &str, delay: Duration, follow_up: FollowUp) {
        let mut pending = self.pending.lock().await;
        pending.retain(|f| !f.is_finished());
        pending.push(follow_up);
        let _ = self.events.send(ClientEvent::FollowUpScheduled {
            action: action.to_string(),
            delay,
        });
    }

    /// Cancel every pending follow-up, for hosts that navigate away before a
    /// scheduled redirect/reload fires. Returns the number cancelled.
    pub async fn cancel_pending(&self) -> usize {
        let drained: Vec<FollowUp> = {
            let mut pending = self.pending.lock().await;
            pending.drain(..).collect()
        };
        let count = drained.iter().filter(|f| !f.is_finished()).count();
        for follow_up in &drained {
            follow_up.cancel();
        }
        if count > 0 {
            let _ = self.events.send(ClientEvent::FollowUpsCancelled { count });
        }
        count
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
