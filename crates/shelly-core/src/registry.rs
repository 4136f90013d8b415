// ── Device connection registry ──
//
// Owns one long-lived client per (device, transport) pair. Clients are
// created lazily on first access and shared by reference afterwards;
// sockets are closed when a device is removed or the registry is disposed.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use secrecy::ExposeSecret;
use shelly_api::{Gen1Client, Gen2Client, WsRpcClient};
use tracing::{debug, info};

use crate::config::{DeviceConfig, Generation};
use crate::error::CoreError;

/// Which client a caller wants for a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum TransportKind {
    /// Gen1 HTTP (status, description, action endpoints).
    Gen1Http,
    /// Gen2 HTTP-RPC.
    Gen2Http,
    /// Gen2 WebSocket-RPC.
    Gen2Rpc,
}

impl TransportKind {
    pub fn supports(self, generation: Generation) -> bool {
        matches!(
            (self, generation),
            (Self::Gen1Http, Generation::Gen1) | (Self::Gen2Http | Self::Gen2Rpc, Generation::Gen2)
        )
    }
}

/// A cached client. Clones share the underlying instance.
#[derive(Debug, Clone)]
pub enum ClientHandle {
    Gen1Http(Arc<Gen1Client>),
    Gen2Http(Arc<Gen2Client>),
    Gen2Rpc(WsRpcClient),
}

impl ClientHandle {
    pub fn kind(&self) -> TransportKind {
        match self {
            Self::Gen1Http(_) => TransportKind::Gen1Http,
            Self::Gen2Http(_) => TransportKind::Gen2Http,
            Self::Gen2Rpc(_) => TransportKind::Gen2Rpc,
        }
    }

    pub fn as_gen1(&self) -> Option<&Arc<Gen1Client>> {
        match self {
            Self::Gen1Http(client) => Some(client),
            _ => None,
        }
    }

    pub fn as_gen2(&self) -> Option<&Arc<Gen2Client>> {
        match self {
            Self::Gen2Http(client) => Some(client),
            _ => None,
        }
    }

    pub fn as_rpc(&self) -> Option<&WsRpcClient> {
        match self {
            Self::Gen2Rpc(client) => Some(client),
            _ => None,
        }
    }

    fn create(config: &DeviceConfig, kind: TransportKind) -> Result<Self, CoreError> {
        if !kind.supports(config.generation) {
            return Err(CoreError::Unsupported {
                operation: format!("{kind} for device '{}'", config.id),
                required: match config.generation {
                    Generation::Gen1 => TransportKind::Gen1Http.to_string(),
                    Generation::Gen2 => format!("{} or {}", TransportKind::Gen2Http, TransportKind::Gen2Rpc),
                },
            });
        }

        let handle = match kind {
            TransportKind::Gen1Http => Self::Gen1Http(Arc::new(Gen1Client::new(
                config.base_url()?,
                config.credentials(),
                &config.transport(),
            )?)),
            TransportKind::Gen2Http => {
                let client = Gen2Client::new(
                    config.base_url()?,
                    config.password.as_ref().map(ExposeSecret::expose_secret),
                    &config.transport(),
                )?;
                Self::Gen2Http(Arc::new(client))
            }
            TransportKind::Gen2Rpc => Self::Gen2Rpc(WsRpcClient::new(config.ws_config()?)),
        };
        debug!(device = %config.id, %kind, "client created");
        Ok(handle)
    }
}

/// Cache of device clients, keyed by device id and transport.
///
/// Lookup-and-create runs under the map's shard lock, so two concurrent
/// `get` calls for the same key always observe the same instance.
#[derive(Debug, Default)]
pub struct DeviceConnectionRegistry {
    devices: DashMap<String, DeviceConfig>,
    clients: DashMap<(String, TransportKind), ClientHandle>,
}

impl DeviceConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device. Ids must be unique.
    pub fn register(&self, config: DeviceConfig) -> Result<(), CoreError> {
        match self.devices.entry(config.id.clone()) {
            Entry::Occupied(_) => Err(CoreError::Config {
                message: format!("device '{}' is already registered", config.id),
            }),
            Entry::Vacant(slot) => {
                debug!(device = %config.id, generation = %config.generation, "device registered");
                slot.insert(config);
                Ok(())
            }
        }
    }

    pub fn device(&self, device_id: &str) -> Option<DeviceConfig> {
        self.devices.get(device_id).map(|d| d.value().clone())
    }

    /// The cached client for `device_id`, creating it on first access.
    pub fn get(&self, device_id: &str, kind: TransportKind) -> Result<ClientHandle, CoreError> {
        let config = self
            .device(device_id)
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: device_id.to_owned(),
            })?;

        let handle = self
            .clients
            .entry((device_id.to_owned(), kind))
            .or_try_insert_with(|| ClientHandle::create(&config, kind))?;
        Ok(handle.value().clone())
    }

    /// Forget a device and close its socket, if one was opened.
    pub async fn remove(&self, device_id: &str) -> bool {
        let known = self.devices.remove(device_id).is_some();
        let handles: Vec<ClientHandle> = [
            TransportKind::Gen1Http,
            TransportKind::Gen2Http,
            TransportKind::Gen2Rpc,
        ]
        .into_iter()
        .filter_map(|kind| self.clients.remove(&(device_id.to_owned(), kind)))
        .map(|(_, handle)| handle)
        .collect();

        close_all(handles).await;
        known
    }

    /// Close every socket and drop every cached client. Devices stay registered.
    pub async fn dispose_all(&self) {
        let keys: Vec<_> = self.clients.iter().map(|e| e.key().clone()).collect();
        let handles: Vec<ClientHandle> = keys
            .iter()
            .filter_map(|key| self.clients.remove(key))
            .map(|(_, handle)| handle)
            .collect();

        let count = handles.len();
        close_all(handles).await;
        info!(clients = count, "registry disposed");
    }

    /// Number of cached clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}

async fn close_all(handles: Vec<ClientHandle>) {
    for handle in handles {
        if let ClientHandle::Gen2Rpc(client) = handle {
            client.disconnect().await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn registry() -> DeviceConnectionRegistry {
        let registry = DeviceConnectionRegistry::new();
        registry
            .register(DeviceConfig::new("plug", "192.168.1.20", Generation::Gen1))
            .unwrap();
        registry
            .register(
                DeviceConfig::new("plus", "192.168.1.21", Generation::Gen2)
                    .with_password(SecretString::from("pw")),
            )
            .unwrap();
        registry
    }

    #[test]
    fn same_key_returns_same_instance() {
        let registry = registry();
        let a = registry.get("plug", TransportKind::Gen1Http).unwrap();
        let b = registry.get("plug", TransportKind::Gen1Http).unwrap();
        assert!(Arc::ptr_eq(a.as_gen1().unwrap(), b.as_gen1().unwrap()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn concurrent_gets_create_once() {
        let registry = registry();
        let handles: Vec<ClientHandle> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| registry.get("plus", TransportKind::Gen2Http).unwrap()))
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        let first = handles[0].as_gen2().unwrap();
        assert!(handles.iter().all(|h| Arc::ptr_eq(first, h.as_gen2().unwrap())));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn transports_are_keyed_separately() {
        let registry = registry();
        let http = registry.get("plus", TransportKind::Gen2Http).unwrap();
        let rpc = registry.get("plus", TransportKind::Gen2Rpc).unwrap();
        assert_eq!(http.kind(), TransportKind::Gen2Http);
        assert_eq!(rpc.kind(), TransportKind::Gen2Rpc);
        assert_eq!(rpc.as_rpc().unwrap().config().url.as_str(), "ws://192.168.1.21/rpc");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn unsupported_generation_pairs_are_rejected() {
        let registry = registry();
        let err = registry.get("plug", TransportKind::Gen2Rpc).unwrap_err();
        assert!(matches!(err, CoreError::Unsupported { .. }), "got: {err:?}");
        let err = registry.get("plus", TransportKind::Gen1Http).unwrap_err();
        assert!(matches!(err, CoreError::Unsupported { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn unknown_and_duplicate_devices() {
        let registry = registry();
        let err = registry.get("nope", TransportKind::Gen1Http).unwrap_err();
        assert!(matches!(err, CoreError::DeviceNotFound { .. }));

        let err = registry
            .register(DeviceConfig::new("plug", "10.0.0.1", Generation::Gen1))
            .unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }));
        assert_eq!(registry.device_count(), 2);
    }

    #[tokio::test]
    async fn dispose_all_clears_the_cache() {
        let registry = registry();
        registry.get("plug", TransportKind::Gen1Http).unwrap();
        registry.get("plus", TransportKind::Gen2Rpc).unwrap();

        registry.dispose_all().await;
        assert!(registry.is_empty());
        assert_eq!(registry.device_count(), 2);

        // A fresh client is created after disposal.
        registry.get("plus", TransportKind::Gen2Rpc).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn remove_drops_device_and_clients() {
        let registry = registry();
        registry.get("plus", TransportKind::Gen2Http).unwrap();
        registry.get("plus", TransportKind::Gen2Rpc).unwrap();

        assert!(registry.remove("plus").await);
        assert!(!registry.remove("plus").await);
        assert!(registry.is_empty());
        assert!(registry.device("plus").is_none());
    }
}
