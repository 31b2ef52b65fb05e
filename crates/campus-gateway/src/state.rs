//! Gateway application state.
//!
//! This module defines the shared state that is available to all request handlers.

use std::sync::Arc;

use campus_auth::JwtValidator;
use campus_commute::{CommuteConfig, CommuteMatchEngine};
use campus_realtime::{ConnectionRegistry, MatchConfig, RandomMatchCoordinator, RoomChat};
use campus_store::Store;

use crate::config::GatewayConfig;

/// Shared application state for the gateway.
///
/// The registry is shared by room chat and random chat; both services and the
/// commute engine share one store.
pub struct GatewayState<S, V>
where
    S: Store,
    V: JwtValidator,
{
    /// The persistence layer.
    pub store: Arc<S>,
    /// Live sessions.
    pub registry: Arc<ConnectionRegistry>,
    /// Room chat.
    pub rooms: Arc<RoomChat<S>>,
    /// Random one-to-one chat.
    pub random: Arc<RandomMatchCoordinator<S>>,
    /// Commute grouping.
    pub commute: Arc<CommuteMatchEngine<S>>,
    /// Commute policies.
    pub commute_config: CommuteConfig,
    /// The JWT validator for authentication.
    pub jwt_validator: Arc<V>,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl<S, V> GatewayState<S, V>
where
    S: Store,
    V: JwtValidator,
{
    /// Create the gateway state and the services it owns.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        jwt_validator: Arc<V>,
        config: GatewayConfig,
        commute_config: CommuteConfig,
    ) -> Self {
        let engine = CommuteMatchEngine::new(Arc::clone(&store), commute_config.group_size_cap);
        Self::with_commute_engine(store, jwt_validator, config, commute_config, engine)
    }

    /// Create the gateway state around an existing commute engine.
    #[must_use]
    pub fn with_commute_engine(
        store: Arc<S>,
        jwt_validator: Arc<V>,
        config: GatewayConfig,
        commute_config: CommuteConfig,
        engine: CommuteMatchEngine<S>,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(config.outbound_buffer));
        let rooms = Arc::new(RoomChat::with_store_policy(
            Arc::clone(&store),
            Arc::clone(&registry),
        ));
        let random = Arc::new(RandomMatchCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            MatchConfig::default(),
        ));

        Self {
            store,
            registry,
            rooms,
            random,
            commute: Arc::new(engine),
            commute_config,
            jwt_validator,
            config,
        }
    }
}

impl<S, V> Clone for GatewayState<S, V>
where
    S: Store,
    V: JwtValidator,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            rooms: Arc::clone(&self.rooms),
            random: Arc::clone(&self.random),
            commute: Arc::clone(&self.commute),
            commute_config: self.commute_config.clone(),
            jwt_validator: Arc::clone(&self.jwt_validator),
            config: self.config.clone(),
        }
    }
}
