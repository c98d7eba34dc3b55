//! Semaphore-bounded renderer pool.
//!
//! Every render, queued or inline, leases a renderer from one pool, so the
//! number of live rendering engines never exceeds the configured worker
//! count no matter which path asked. A lease launches a fresh backend and
//! holds its permit until dropped or closed.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::renderer::{BackendFactory, Renderer};
use crate::{Error, Result};

/// Capacity-bounded source of renderer handles.
pub struct RendererPool {
    permits: Arc<Semaphore>,
    factory: BackendFactory,
}

/// A leased renderer plus the permit keeping its pool slot occupied.
pub struct RendererLease {
    pub renderer: Renderer,
    _permit: OwnedSemaphorePermit,
}

impl RendererPool {
    /// Create a pool with at least one slot.
    pub fn new(capacity: usize, factory: BackendFactory) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity.max(1))),
            factory,
        }
    }

    /// Wait for a free slot and launch a renderer in it.
    pub async fn lease(&self) -> Result<RendererLease> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| Error::Init(format!("Renderer pool closed: {}", e)))?;

        let renderer = Renderer::launch(self.factory.clone()).await?;
        Ok(RendererLease {
            renderer,
            _permit: permit,
        })
    }
}

impl RendererLease {
    /// Shut the leased renderer down, freeing the slot afterwards.
    pub async fn close(self) -> Result<()> {
        let RendererLease { renderer, _permit } = self;
        let result = renderer.close().await;
        drop(_permit);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::RenderBackend;
    use crate::CaptureParams;
    use std::time::Duration;

    struct NoopBackend;

    impl RenderBackend for NoopBackend {
        fn navigate(&mut self, _url: &str) -> crate::Result<()> {
            Ok(())
        }

        fn capture(&mut self, _params: &CaptureParams) -> crate::Result<Vec<u8>> {
            Ok(vec![0])
        }

        fn close(self: Box<Self>) -> crate::Result<()> {
            Ok(())
        }
    }

    fn noop_factory() -> BackendFactory {
        Arc::new(|| Ok(Box::new(NoopBackend) as Box<dyn RenderBackend>))
    }

    #[tokio::test]
    async fn test_capacity_bounds_concurrent_leases() {
        let pool = RendererPool::new(1, noop_factory());

        let first = pool.lease().await.unwrap();

        // The only slot is taken, a second lease must wait
        let blocked = tokio::time::timeout(Duration::from_millis(50), pool.lease()).await;
        assert!(blocked.is_err());

        first.close().await.unwrap();

        let second = tokio::time::timeout(Duration::from_millis(500), pool.lease())
            .await
            .expect("slot should free up")
            .unwrap();
        second.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_capacity_clamps_to_one() {
        let pool = RendererPool::new(0, noop_factory());
        let lease = pool.lease().await.unwrap();
        lease.close().await.unwrap();
    }
}
