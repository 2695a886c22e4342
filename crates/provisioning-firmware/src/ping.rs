use async_trait::async_trait;

/// Abstracts the ICMP reachability check used after a reboot-triggering
/// firmware update, so the coordinator doesn't depend on a real network
/// stack in tests.
#[async_trait]
pub trait HostPing: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

/// A [`HostPing`] that always reports the same fixed answer.
pub struct StaticHostPing {
    reachable: bool,
}

impl StaticHostPing {
    pub fn always_reachable() -> Self {
        Self { reachable: true }
    }

    pub fn never_reachable() -> Self {
        Self { reachable: false }
    }
}

#[async_trait]
impl HostPing for StaticHostPing {
    async fn is_reachable(&self) -> bool {
        self.reachable
    }
}
