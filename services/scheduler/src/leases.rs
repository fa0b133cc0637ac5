use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use shared::types::DeviceId;
use std::time::Instant;

/// At most one diagnostics pass per device at a time.
#[derive(Default)]
pub struct DeviceLeases {
    held: DashMap<DeviceId, Instant>,
}

impl DeviceLeases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the device's lease, or `None` when another pass holds it.
    pub fn try_acquire(&self, device_id: &str) -> Option<LeaseGuard<'_>> {
        match self.held.entry(device_id.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(Instant::now());
                Some(LeaseGuard {
                    leases: self,
                    device_id: device_id.to_string(),
                })
            }
        }
    }

    pub fn is_held(&self, device_id: &str) -> bool {
        self.held.contains_key(device_id)
    }
}

/// Releases the lease when dropped, including when the pass is cancelled.
pub struct LeaseGuard<'a> {
    leases: &'a DeviceLeases,
    device_id: DeviceId,
}

impl LeaseGuard<'_> {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

impl Drop for LeaseGuard<'_> {
    fn drop(&mut self) {
        if let Some((_, since)) = self.leases.held.remove(&self.device_id) {
            tracing::trace!(
                device_id = %self.device_id,
                held_ms = since.elapsed().as_millis() as u64,
                "Lease released"
            );
        }
    }
}
