//! One [`ConnectionManager`] per coordinator endpoint.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::Result;

use super::connection::{ConnectionManager, parse_endpoint};
use super::options::ConnectionOptions;
use super::status::ConnectionStatus;

// ============================================================================
// ConnectionRegistry
// ============================================================================

/// Hands out a shared [`ConnectionManager`] per endpoint.
///
/// Endpoints are keyed by their normalized URL, so `ws://localhost:7400`
/// and `ws://localhost:7400/` share a manager. A manager that was
/// explicitly disconnected is replaced on the next lookup; one in the
/// `error` state is kept so callers see the failure.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    options: ConnectionOptions,
    connections: Mutex<FxHashMap<String, ConnectionManager>>,
}

impl ConnectionRegistry {
    /// Creates a registry whose managers use `options`.
    #[must_use]
    pub fn new(options: ConnectionOptions) -> Self {
        Self {
            options,
            connections: Mutex::new(FxHashMap::default()),
        }
    }

    /// Returns the manager for `endpoint`, connecting if needed.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`ConnectionManager::connect`].
    pub fn connection(&self, endpoint: &str) -> Result<ConnectionManager> {
        let key = parse_endpoint(endpoint)?.to_string();
        let mut connections = self.connections.lock();

        if let Some(existing) = connections.get(&key)
            && existing.status() != ConnectionStatus::Disconnected
        {
            return Ok(existing.clone());
        }

        let manager = ConnectionManager::connect(&key, self.options.clone())?;
        debug!(endpoint = %key, "Created connection manager");
        connections.insert(key, manager.clone());
        Ok(manager)
    }

    /// Returns the manager for `endpoint` without connecting.
    #[must_use]
    pub fn get(&self, endpoint: &str) -> Option<ConnectionManager> {
        let key = parse_endpoint(endpoint).ok()?.to_string();
        self.connections.lock().get(&key).cloned()
    }

    /// Disconnects and forgets the manager for `endpoint`.
    ///
    /// Returns `true` if a manager was registered.
    ///
    /// # Errors
    ///
    /// Returns an error if `endpoint` is not a valid `ws`/`wss` URL.
    pub fn disconnect(&self, endpoint: &str) -> Result<bool> {
        let key = parse_endpoint(endpoint)?.to_string();
        let Some(manager) = self.connections.lock().remove(&key) else {
            return Ok(false);
        };
        manager.disconnect();
        Ok(true)
    }

    /// Disconnects every manager.
    pub fn disconnect_all(&self) {
        let managers: Vec<ConnectionManager> =
            self.connections.lock().drain().map(|(_, m)| m).collect();
        for manager in managers {
            manager.disconnect();
        }
    }

    /// Returns the number of registered managers.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    /// Returns `true` if no manager is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::coordinator::Coordinator;
    use crate::error::Error;

    const WAIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_same_endpoint_shares_manager() -> anyhow::Result<()> {
        let coordinator = Coordinator::new().await?;
        let registry = ConnectionRegistry::default();

        let url = coordinator.ws_url();
        let first = registry.connection(&url)?;
        let second = registry.connection(&format!("{url}/"))?;

        assert!(first.same_connection(&second));
        assert_eq!(registry.len(), 1);
        assert!(registry.get(&url).is_some());

        registry.disconnect_all();
        assert!(registry.is_empty());
        coordinator.shutdown().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_disconnected_manager_is_replaced() -> anyhow::Result<()> {
        let coordinator = Coordinator::new().await?;
        let registry = ConnectionRegistry::default();
        let url = coordinator.ws_url();

        let first = registry.connection(&url)?;
        first.disconnect();

        let second = registry.connection(&url)?;
        assert!(!first.same_connection(&second));
        second.wait_for_status(ConnectionStatus::Connected, WAIT).await?;
        assert_eq!(second.subscription_count().await?, 0);

        assert!(registry.disconnect(&url)?);
        assert!(!registry.disconnect(&url)?);
        assert_eq!(second.status(), ConnectionStatus::Disconnected);

        coordinator.shutdown().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_manager_is_kept() -> anyhow::Result<()> {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
            listener.local_addr()?.port()
        };
        let url = format!("ws://127.0.0.1:{port}");
        let registry = ConnectionRegistry::default();

        let first = registry.connection(&url)?;
        first.wait_for_status(ConnectionStatus::Error, WAIT).await?;

        let again = registry.connection(&url)?;
        assert!(first.same_connection(&again));
        assert!(matches!(
            again.subscription_count().await,
            Err(Error::TransportFailed { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let registry = ConnectionRegistry::default();
        tokio_test::assert_err!(registry.connection("http://127.0.0.1:1"));
        assert!(registry.get("not a url").is_none());
        assert!(registry.is_empty());
    }
}
