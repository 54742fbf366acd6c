use std::{
    convert::Infallible,
    sync::{Arc, Weak},
    time::Duration,
};

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};

use stockroom_auth::{Hs256Jwt, normalize_key};
use stockroom_core::{Aggregate, AggregateId, DomainError, TenantId};
use stockroom_events::{Command, EventBus, EventEnvelope, InMemoryEventBus};
use stockroom_infra::{
    AppConfig,
    blob_store::{BlobStore, FsBlobStore, InMemoryBlobStore},
    command_dispatcher::{CommandDispatcher, Committed, DispatchError},
    event_store::{EventStore, EventStoreError, InMemoryEventStore, PostgresEventStore},
    projections::{ProjectionError, ReadModels},
};

pub type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
pub type Dispatcher = CommandDispatcher<Arc<dyn EventStore>, Bus>;

/// Realtime message broadcast via SSE.
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeMessage {
    pub tenant_id: TenantId,
    pub topic: String,
    pub payload: JsonValue,
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("event store unavailable: {0}")]
    Store(#[from] EventStoreError),

    #[error("read model rebuild failed: {0}")]
    Projection(#[from] ProjectionError),
}

/// Explicitly constructed backends, shared by every handler through an
/// `Extension<Arc<AppServices>>`.
pub struct AppServices {
    dispatcher: Dispatcher,
    read_models: Arc<ReadModels>,
    jwt: Arc<Hs256Jwt>,
    blobs: Arc<dyn BlobStore>,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
    config: AppConfig,
}

/// Pick backends from the config, then rebuild read models from the store.
pub async fn build_services(config: AppConfig) -> Result<AppServices, BuildError> {
    let store: Arc<dyn EventStore> = match config.database_url.as_deref() {
        Some(url) => {
            tracing::info!("using postgres event store");
            Arc::new(PostgresEventStore::connect(url).await?)
        }
        None => {
            tracing::info!("using in-memory event store");
            Arc::new(InMemoryEventStore::new())
        }
    };

    let blobs: Arc<dyn BlobStore> = match config.blob_dir.as_ref() {
        Some(dir) => Arc::new(FsBlobStore::new(dir.clone())),
        None => Arc::new(InMemoryBlobStore::new()),
    };

    let jwt = Arc::new(Hs256Jwt::new(
        config.jwt_secret.as_bytes(),
        config.access_token_ttl,
        config.refresh_token_ttl,
    ));

    let read_models = Arc::new(ReadModels::new());
    read_models.rebuild(store.as_ref()).await?;

    let bus: Bus = Arc::new(InMemoryEventBus::new());

    // Realtime channel (SSE): lossy broadcast, tenant-filtered per connection.
    let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);
    spawn_realtime_relay(&bus, realtime_tx.clone());

    Ok(AppServices {
        dispatcher: CommandDispatcher::new(store, bus),
        read_models,
        jwt,
        blobs,
        realtime_tx,
        config,
    })
}

/// Background subscriber: bus -> realtime broadcast.
///
/// Read models do not hang off the bus; writers catch them up directly.
fn spawn_realtime_relay(bus: &Bus, realtime_tx: broadcast::Sender<RealtimeMessage>) {
    let sub = bus.subscribe();
    let bus_alive: Weak<InMemoryEventBus<EventEnvelope<JsonValue>>> = Arc::downgrade(bus);

    tokio::task::spawn_blocking(move || {
        loop {
            match sub.recv_timeout(Duration::from_millis(500)) {
                Ok(env) => {
                    // No receivers is fine: nobody is watching.
                    let _ = realtime_tx.send(RealtimeMessage {
                        tenant_id: env.tenant_id(),
                        topic: env.event_type().to_string(),
                        payload: serde_json::json!({
                            "aggregate_type": env.aggregate_type(),
                            "aggregate_id": env.aggregate_id().to_string(),
                            "sequence_number": env.sequence_number(),
                            "event_type": env.event_type(),
                        }),
                    });
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                    if bus_alive.strong_count() == 0 {
                        break;
                    }
                }
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
        tracing::debug!("realtime relay stopped");
    });
}

impl AppServices {
    pub fn read_models(&self) -> &Arc<ReadModels> {
        &self.read_models
    }

    pub fn jwt(&self) -> &Arc<Hs256Jwt> {
        &self.jwt
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn realtime_tx(&self) -> &broadcast::Sender<RealtimeMessage> {
        &self.realtime_tx
    }

    /// Whether `name` registering in `tenant_id` is the configured bootstrap
    /// administrator. Only the default tenant has one.
    pub fn is_bootstrap_admin(&self, tenant_id: TenantId, name: &str) -> bool {
        tenant_id == self.config.default_tenant_id
            && self
                .config
                .bootstrap_admin_name
                .as_deref()
                .is_some_and(|admin| normalize_key(admin) == normalize_key(name))
    }

    /// Dispatch a command, then bring the read models up to date with the
    /// affected stream before returning.
    pub async fn execute<A>(
        &self,
        tenant_id: TenantId,
        command: A::Command,
        make_aggregate: impl Fn(AggregateId) -> A,
    ) -> Result<Committed<A::Event>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Command: Command,
        A::Event: stockroom_events::Event + Serialize + DeserializeOwned,
    {
        let aggregate_id = command.target_aggregate_id();
        let committed = self
            .dispatcher
            .dispatch::<A>(tenant_id, command, make_aggregate)
            .await?;

        if !committed.is_empty() {
            if let Err(e) = self
                .read_models
                .catch_up(self.dispatcher.store(), tenant_id, aggregate_id)
                .await
            {
                tracing::error!(
                    %tenant_id,
                    %aggregate_id,
                    aggregate_type = A::AGGREGATE_TYPE,
                    error = %e,
                    "read model catch-up failed"
                );
            }
        }
        Ok(committed)
    }
}

/// Build an SSE stream for a tenant (used by `/stream`).
pub fn tenant_sse_stream(
    services: Arc<AppServices>,
    tenant_id: TenantId,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.realtime_tx().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |msg| match msg {
        Ok(m) if m.tenant_id == tenant_id => {
            let data = serde_json::to_string(&m.payload).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(m.topic).data(data)))
        }
        _ => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
