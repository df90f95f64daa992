//! Gateway state
//!
//! Application state for the gateway server.

use crate::bridge::NotificationBridge;
use crate::broadcast::Dispatcher;
use crate::connection::ConnectionRegistry;
use relay_common::AppConfig;
use relay_core::{MembershipRepository, PresenceRepository, PushNotifier, TokenVerifier};
use std::sync::Arc;

/// Gateway application state
///
/// Holds the registry, dispatcher and bridge together with the collaborator
/// ports every connection handler needs.
#[derive(Clone)]
pub struct GatewayState {
    registry: Arc<ConnectionRegistry>,
    dispatcher: Arc<Dispatcher>,
    bridge: Arc<NotificationBridge>,
    verifier: Arc<dyn TokenVerifier>,
    membership: Arc<dyn MembershipRepository>,
    presence: Arc<dyn PresenceRepository>,
    config: Arc<AppConfig>,
}

impl GatewayState {
    /// Wire up the registry, dispatcher and bridge from the collaborator ports
    pub fn new(
        config: AppConfig,
        verifier: Arc<dyn TokenVerifier>,
        membership: Arc<dyn MembershipRepository>,
        presence: Arc<dyn PresenceRepository>,
        push: Arc<dyn PushNotifier>,
    ) -> Self {
        let registry = ConnectionRegistry::new_shared();
        let dispatcher = Arc::new(Dispatcher::new(registry.clone(), presence.clone()));
        let bridge = Arc::new(NotificationBridge::new(
            registry.clone(),
            dispatcher.clone(),
            membership.clone(),
            push,
        ));

        Self {
            registry,
            dispatcher,
            bridge,
            verifier,
            membership,
            presence,
            config: Arc::new(config),
        }
    }

    /// Get the connection registry
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Get the broadcast dispatcher
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Get the notification bridge
    ///
    /// The request layer calls this after storing a message.
    pub fn bridge(&self) -> &NotificationBridge {
        &self.bridge
    }

    /// Get the credential verifier
    pub fn verifier(&self) -> &dyn TokenVerifier {
        self.verifier.as_ref()
    }

    /// Get the durable membership store
    pub fn membership(&self) -> &dyn MembershipRepository {
        self.membership.as_ref()
    }

    /// Get the presence store
    pub fn presence(&self) -> &dyn PresenceRepository {
        self.presence.as_ref()
    }

    /// Get the application configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("registry", &self.registry)
            .field("config", &"AppConfig")
            .finish()
    }
}
