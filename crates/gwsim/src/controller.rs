//! Application Controller - Routes inbound messages to applications
//!
//! The controller is itself a [`Module`]. On every connect it subscribes
//! each application's topics and runs its `connected` hook; on disconnect
//! it fans the notification out.
//!
//! Ownership of a message is decided by registration order: the first
//! application with a matching pattern (patterns tested in declaration
//! order) receives it, exactly once, however many of the gateway's
//! subscriptions the message also matches.

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use gwsim_core::{
    invoke_isolated, message_handler, Application, Message, MessageHandler, Module, ModuleResult,
    SharedTransport, Topic, TopicContext, TopicError, Transport,
};
use tracing::{debug, info, warn};

use crate::error::SimulatorError;

/// Accessor for the registered application ids, in registration order
pub type ApplicationIds = Arc<dyn Fn() -> Vec<String> + Send + Sync>;

/// A pattern together with its form rendered for this gateway
struct Route {
    pattern: Topic,
    filter: String,
    matcher: Topic,
}

impl Route {
    fn new(pattern: Topic, context: &TopicContext) -> Result<Self, TopicError> {
        let filter = pattern.render(context)?;
        let matcher = Topic::parse(&filter)?;
        Ok(Self {
            pattern,
            filter,
            matcher,
        })
    }
}

struct Registered {
    id: String,
    application: Arc<dyn Application>,
    routes: Vec<Route>,
}

/// Immutable registration table shared with message handlers
struct Registry {
    entries: Vec<Registered>,
}

impl Registry {
    /// First application, and its first route, matching `topic`
    fn owner_of(&self, topic: &str) -> Option<(&Registered, &Route)> {
        self.entries.iter().find_map(|entry| {
            entry
                .routes
                .iter()
                .find(|route| route.matcher.matches(topic))
                .map(|route| (entry, route))
        })
    }

    fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.id.clone()).collect()
    }
}

/// Module that owns the registered applications
pub struct ApplicationController {
    registry: Arc<Registry>,
}

impl ApplicationController {
    /// Build the controller for a gateway whose topics render against `context`
    ///
    /// Fails on duplicate application ids and on patterns that cannot be
    /// rendered for this gateway.
    pub fn new(
        context: &TopicContext,
        applications: Vec<Arc<dyn Application>>,
    ) -> Result<Self, SimulatorError> {
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(applications.len());

        for application in applications {
            let id = application.id().to_string();
            if !seen.insert(id.clone()) {
                return Err(SimulatorError::DuplicateApplication(id));
            }

            let routes = application
                .topics()
                .into_iter()
                .map(|pattern| Route::new(pattern, context))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|source| SimulatorError::Topic {
                    application: id.clone(),
                    source,
                })?;

            info!(
                application = %id,
                topics = ?routes.iter().map(|r| r.filter.as_str()).collect::<Vec<_>>(),
                "Registered application"
            );
            entries.push(Registered {
                id,
                application,
                routes,
            });
        }

        Ok(Self {
            registry: Arc::new(Registry { entries }),
        })
    }

    pub fn application_ids(&self) -> Vec<String> {
        self.registry.ids()
    }

    /// Shareable accessor over the (immutable) id list
    pub fn id_accessor(&self) -> ApplicationIds {
        let registry = self.registry.clone();
        Arc::new(move || registry.ids())
    }

    /// Handler for the subscription on `filter`
    ///
    /// Every subscription's handler defers to the owner lookup; only the
    /// handler whose filter is the owning route's filter delivers.
    fn handler(&self, filter: &str, transport: &SharedTransport) -> MessageHandler {
        let registry = self.registry.clone();
        let transport = Arc::downgrade(transport);
        let filter = filter.to_string();
        message_handler(move |message| {
            let registry = registry.clone();
            let transport = transport.clone();
            let filter = filter.clone();
            async move { route(&registry, &filter, &transport, message).await }
        })
    }
}

async fn route(
    registry: &Registry,
    filter: &str,
    transport: &Weak<dyn Transport>,
    message: Message,
) {
    let topic = message.topic().to_string();
    let Some((owner, owning_route)) = registry.owner_of(&topic) else {
        debug!(%topic, "No application owns message, dropping");
        return;
    };
    if owning_route.filter != filter {
        return;
    }
    let Some(transport) = transport.upgrade() else {
        return;
    };

    debug!(%topic, application = %owner.id, "Routing message");
    invoke_isolated(
        "application",
        &owner.id,
        "process",
        owner.application.process(message, &transport),
    )
    .await;
}

#[async_trait]
impl Module for ApplicationController {
    fn name(&self) -> &str {
        "application-controller"
    }

    async fn connected(&self, transport: &SharedTransport) -> ModuleResult {
        for entry in &self.registry.entries {
            for route in &entry.routes {
                let handler = self.handler(&route.filter, transport);
                if let Err(e) = transport.subscribe(&route.pattern, handler).await {
                    warn!(application = %entry.id, error = %e, "Failed to subscribe");
                }
            }
            invoke_isolated(
                "application",
                &entry.id,
                "connected",
                entry.application.connected(transport),
            )
            .await;
        }
        Ok(())
    }

    async fn disconnected(&self, transport: &SharedTransport) -> ModuleResult {
        for entry in &self.registry.entries {
            invoke_isolated(
                "application",
                &entry.id,
                "disconnected",
                entry.application.disconnected(transport),
            )
            .await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gwsim_core::ModuleError;
    use gwsim_transport::{MockConfig, MockTransport};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl Recorder {
        fn push(&self, entry: String) {
            self.0.lock().push(entry);
        }

        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.0.lock())
        }
    }

    struct TestApp {
        id: String,
        topics: Vec<Topic>,
        log: Arc<Recorder>,
        fail_connected: bool,
    }

    impl TestApp {
        fn new(id: &str, topics: &[&str], log: &Arc<Recorder>) -> Arc<dyn Application> {
            Arc::new(Self {
                id: id.to_string(),
                topics: topics.iter().map(|t| Topic::parse(t).unwrap()).collect(),
                log: log.clone(),
                fail_connected: false,
            })
        }

        fn failing(id: &str, log: &Arc<Recorder>) -> Arc<dyn Application> {
            Arc::new(Self {
                id: id.to_string(),
                topics: Vec::new(),
                log: log.clone(),
                fail_connected: true,
            })
        }
    }

    #[async_trait]
    impl Application for TestApp {
        fn id(&self) -> &str {
            &self.id
        }

        fn topics(&self) -> Vec<Topic> {
            self.topics.clone()
        }

        async fn connected(&self, _transport: &SharedTransport) -> ModuleResult {
            self.log.push(format!("{} connected", self.id));
            if self.fail_connected {
                return Err(ModuleError::Failed("refusing".to_string()));
            }
            Ok(())
        }

        async fn process(&self, message: Message, _transport: &SharedTransport) -> ModuleResult {
            self.log.push(format!("{} <- {}", self.id, message.topic()));
            Ok(())
        }
    }

    fn mock() -> Arc<MockTransport> {
        Arc::new(MockTransport::with_context(
            TopicContext::for_gateway("acme", "gw-1"),
            &MockConfig::default(),
        ))
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let log = Arc::new(Recorder::default());
        let result = ApplicationController::new(
            &TopicContext::for_gateway("acme", "gw-1"),
            vec![
                TestApp::new("clock", &[], &log),
                TestApp::new("clock", &[], &log),
            ],
        );
        assert!(matches!(result, Err(SimulatorError::DuplicateApplication(id)) if id == "clock"));
    }

    #[test]
    fn test_rejects_unrenderable_pattern() {
        let log = Arc::new(Recorder::default());
        let result = ApplicationController::new(
            &TopicContext::for_gateway("acme", "gw-1"),
            vec![TestApp::new("clock", &["{site}/clock/#"], &log)],
        );
        match result {
            Err(SimulatorError::Topic {
                application,
                source,
            }) => {
                assert_eq!(application, "clock");
                assert_eq!(source, TopicError::UnresolvedPlaceholder("site".to_string()));
            }
            _ => panic!("expected topic error"),
        }
    }

    #[test]
    fn test_ids_in_registration_order() {
        let log = Arc::new(Recorder::default());
        let controller = ApplicationController::new(
            &TopicContext::new(),
            vec![
                TestApp::new("zeta", &[], &log),
                TestApp::new("alpha", &[], &log),
            ],
        )
        .unwrap();
        assert_eq!(controller.application_ids(), vec!["zeta", "alpha"]);
        assert_eq!((controller.id_accessor())(), vec!["zeta", "alpha"]);
    }

    #[tokio::test]
    async fn test_connected_continues_past_failing_application() {
        let log = Arc::new(Recorder::default());
        let controller = ApplicationController::new(
            &TopicContext::for_gateway("acme", "gw-1"),
            vec![
                TestApp::new("a1", &[], &log),
                TestApp::failing("a2", &log),
                TestApp::new("a3", &[], &log),
            ],
        )
        .unwrap();
        let transport: SharedTransport = mock();

        controller.connected(&transport).await.unwrap();
        assert_eq!(log.take(), vec!["a1 connected", "a2 connected", "a3 connected"]);
    }

    #[tokio::test]
    async fn test_first_registered_owner_wins_exactly_once() {
        let log = Arc::new(Recorder::default());
        let controller = ApplicationController::new(
            &TopicContext::for_gateway("acme", "gw-1"),
            vec![
                TestApp::new("wide", &["{account-name}/+/clock/#"], &log),
                TestApp::new("narrow", &["{account-name}/{client-id}/clock/GET"], &log),
            ],
        )
        .unwrap();
        let mock = mock();
        let transport: SharedTransport = mock.clone();
        mock.connect().await;
        controller.connected(&transport).await.unwrap();
        log.take();

        // Both subscriptions match; only the first-registered app sees it
        assert_eq!(mock.inject("acme/gw-1/clock/GET", "").await, 2);
        assert_eq!(log.take(), vec!["wide <- acme/gw-1/clock/GET"]);
    }

    #[tokio::test]
    async fn test_shared_filter_routes_to_first_application() {
        let log = Arc::new(Recorder::default());
        let controller = ApplicationController::new(
            &TopicContext::for_gateway("acme", "gw-1"),
            vec![
                TestApp::new("first", &["{account-name}/{client-id}/shared/#"], &log),
                TestApp::new("second", &["{account-name}/{client-id}/shared/#"], &log),
            ],
        )
        .unwrap();
        let mock = mock();
        let transport: SharedTransport = mock.clone();
        mock.connect().await;
        controller.connected(&transport).await.unwrap();
        assert_eq!(log.take(), vec!["first connected", "second connected"]);

        // One table entry for the shared filter, owned by the first app
        assert_eq!(mock.inject("acme/gw-1/shared/x", "").await, 1);
        assert_eq!(log.take(), vec!["first <- acme/gw-1/shared/x"]);
    }
}
