//! Simulator - Top-level runtime of a simulated gateway
//!
//! Wires a transport to the fixed module list (application controller,
//! then birth certificate) and starts the session. The transport is owned
//! by the caller: dropping the simulator leaves it untouched, and its
//! callbacks only hold a weak reference, so later events are ignored.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use gwsim_core::{
    invoke_isolated, lifecycle_callback, Application, GatewayConfiguration, Module,
    SharedTransport,
};
use tracing::info;

use crate::birth::BirthCertificateModule;
use crate::controller::ApplicationController;
use crate::error::SimulatorError;

/// A running gateway simulation
pub struct Simulator {
    inner: Arc<SimulatorInner>,
}

struct SimulatorInner {
    transport: SharedTransport,
    controller: Arc<ApplicationController>,
    modules: Vec<Arc<dyn Module>>,
    connected: AtomicBool,
}

impl Simulator {
    /// Build the simulator and connect the transport
    ///
    /// Registration errors (duplicate ids, unrenderable topics) are
    /// returned before anything touches the transport.
    pub async fn start(
        configuration: GatewayConfiguration,
        transport: SharedTransport,
        applications: Vec<Arc<dyn Application>>,
    ) -> Result<Self, SimulatorError> {
        let controller = Arc::new(ApplicationController::new(
            &transport.topic_context(),
            applications,
        )?);
        let birth = BirthCertificateModule::new(configuration, controller.id_accessor());
        let modules: Vec<Arc<dyn Module>> = vec![controller.clone(), Arc::new(birth)];

        let inner = Arc::new(SimulatorInner {
            transport: transport.clone(),
            controller,
            modules,
            connected: AtomicBool::new(false),
        });

        let weak = Arc::downgrade(&inner);
        transport.when_connected(lifecycle_callback(move || {
            let weak = weak.clone();
            async move {
                if let Some(inner) = weak.upgrade() {
                    inner.handle_connected().await;
                }
            }
        }));
        let weak = Arc::downgrade(&inner);
        transport.when_disconnected(lifecycle_callback(move || {
            let weak = weak.clone();
            async move {
                if let Some(inner) = weak.upgrade() {
                    inner.handle_disconnected().await;
                }
            }
        }));

        info!(
            applications = ?inner.controller.application_ids(),
            "Starting simulator"
        );
        transport.connect().await;

        Ok(Self { inner })
    }

    /// Last connection state reported by the transport
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    pub fn application_ids(&self) -> Vec<String> {
        self.inner.controller.application_ids()
    }

    /// Module names in notification order
    pub fn module_names(&self) -> Vec<String> {
        self.inner
            .modules
            .iter()
            .map(|m| m.name().to_string())
            .collect()
    }

    pub fn transport(&self) -> &SharedTransport {
        &self.inner.transport
    }
}

impl SimulatorInner {
    async fn handle_connected(&self) {
        self.connected.store(true, Ordering::SeqCst);
        info!("Gateway connected");
        for module in &self.modules {
            invoke_isolated(
                "module",
                module.name(),
                "connected",
                module.connected(&self.transport),
            )
            .await;
        }
    }

    async fn handle_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
        info!("Gateway disconnected");
        for module in &self.modules {
            invoke_isolated(
                "module",
                module.name(),
                "disconnected",
                module.disconnected(&self.transport),
            )
            .await;
        }
    }
}
