use std::sync::Arc;

use crate::cache::ViewCache;
use crate::config::{BackendMode, Config};
use crate::error::AppResult;
use crate::gateway::memory::InMemoryBackend;
use crate::gateway::supabase::SupabaseGateway;
use crate::gateway::{AuthGatewayRef, DataGatewayRef};
use crate::session::{AuthClient, Subscription};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: Arc<AuthClient>,
    pub data: DataGatewayRef,
    pub cache: Arc<ViewCache>,
    /// Keeps the cache listening to auth events for the life of the state.
    _auth_listener: Arc<Subscription>,
}

impl AppState {
    /// Wire the gateways together. Must be called inside a tokio runtime.
    pub fn new(config: Config, auth: AuthGatewayRef, data: DataGatewayRef) -> Self {
        let auth = Arc::new(AuthClient::new(auth));
        let cache = Arc::new(ViewCache::new());

        let listener_cache = cache.clone();
        let subscription =
            auth.on_auth_state_change(move |event| listener_cache.handle_auth_event(&event));

        Self {
            config: Arc::new(config),
            auth,
            data,
            cache,
            _auth_listener: Arc::new(subscription),
        }
    }

    /// Build the gateways named by `config.backend`.
    pub fn from_config(config: Config) -> AppResult<Self> {
        match &config.backend {
            BackendMode::Supabase { url, anon_key } => {
                let gateway = Arc::new(SupabaseGateway::new(
                    url,
                    anon_key,
                    config.request_timeout,
                )?);
                Ok(Self::new(config, gateway.clone(), gateway))
            }
            BackendMode::Memory => {
                let backend = Arc::new(InMemoryBackend::new());
                Ok(Self::new(config, backend.clone(), backend))
            }
        }
    }
}
