//! Device enumeration and exclusive-claim arbitration.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::error::UvcError;
use crate::session::Session;
use crate::transport::UsbTransport;
use crate::types::{DeviceDescriptor, DeviceId};

/// Enumerates attached UVC devices and tracks which of them are held by a
/// live session, so a second `connect` to the same device fails with
/// `DeviceBusy` instead of silently sharing the hardware.
///
/// Cheap to clone: clones share the same transport and claim set.
#[derive(Clone)]
pub struct DeviceRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    transport: Arc<dyn UsbTransport>,
    claimed: Mutex<HashSet<DeviceId>>,
}

impl DeviceRegistry {
    pub fn new(transport: Arc<dyn UsbTransport>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                transport,
                claimed: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Enumerate currently attached devices.
    ///
    /// Idempotent and safe to call repeatedly. Descriptors from earlier
    /// calls whose device has since vanished are stale: connecting to them
    /// fails with `DeviceNotFound`. Ordering is stable only while no
    /// hardware change occurs.
    pub fn enumerate(&self) -> Result<Vec<DeviceDescriptor>, UvcError> {
        self.inner.transport.devices()
    }

    /// Connect to a device with default configuration.
    pub fn connect(&self, descriptor: &DeviceDescriptor) -> Result<Session, UvcError> {
        self.connect_with_config(descriptor, Config::default())
    }

    /// Connect to a device, claiming it for exclusive use.
    ///
    /// # Errors
    /// * `UvcError::DeviceBusy` - another session already holds the device
    /// * `UvcError::DeviceNotFound` - the descriptor is stale
    pub fn connect_with_config(
        &self,
        descriptor: &DeviceDescriptor,
        config: Config,
    ) -> Result<Session, UvcError> {
        Session::connect(self, descriptor, config)
    }

    /// Whether a device is currently held by a session.
    pub fn is_claimed(&self, id: DeviceId) -> bool {
        self.inner
            .claimed
            .lock()
            .map(|c| c.contains(&id))
            .unwrap_or(false)
    }

    pub(crate) fn transport(&self) -> &Arc<dyn UsbTransport> {
        &self.inner.transport
    }

    pub(crate) fn claim(&self, id: DeviceId) -> Result<(), UvcError> {
        let mut claimed = self
            .inner
            .claimed
            .lock()
            .map_err(|_| UvcError::Transport("registry poisoned".to_string()))?;
        if !claimed.insert(id) {
            return Err(UvcError::DeviceBusy(id));
        }
        Ok(())
    }

    pub(crate) fn release(&self, id: DeviceId) {
        if let Ok(mut claimed) = self.inner.claimed.lock() {
            claimed.remove(&id);
        }
    }
}
