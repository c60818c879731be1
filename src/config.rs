//! Single-assignment configuration holders
//!
//! A [`ConfigHolder`] keeps the first configuration it is given for the
//! lifetime of the owning launcher. It is an explicit object constructed at
//! application start and passed by reference, so tests can run isolated
//! holders concurrently instead of sharing hidden process-wide state.

use crate::error::SignInError;
use log::warn;
use std::sync::RwLock;

/// Single-assignment slot for one provider's configuration
///
/// `configure` keeps the first value; later calls are logged no-ops.
#[derive(Debug)]
pub struct ConfigHolder<T> {
    name: &'static str,
    slot: RwLock<Option<T>>,
}

impl<T: Clone> ConfigHolder<T> {
    /// Create an unconfigured holder; `name` appears in configuration errors
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: RwLock::new(None),
        }
    }

    /// Store the configuration. Safe to call multiple times - only the first
    /// config is kept; reconfiguration attempts are logged and ignored.
    pub fn configure(&self, config: T) {
        let mut slot = self.slot.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if slot.is_some() {
            warn!("{} already configured, ignoring reconfiguration", self.name);
            return;
        }
        *slot = Some(config);
    }

    /// Reset the holder to its unconfigured state
    pub fn clear(&self) {
        let mut slot = self.slot.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        *slot = None;
    }

    /// True once a configuration has been stored
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.slot
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .is_some()
    }

    /// Return the stored configuration
    ///
    /// # Errors
    ///
    /// Returns [`SignInError::Configuration`] naming the required setup call
    /// when the holder was never configured.
    pub fn get(&self) -> Result<T, SignInError> {
        self.slot
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
            .ok_or_else(|| SignInError::not_configured(self.name))
    }
}
