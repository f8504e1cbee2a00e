// SPDX-License-Identifier: GPL-3.0-only

//! Camera permission gate
//!
//! The gate asks its provider exactly once. A grant runs the activation
//! step (camera binding and analysis); a denial is logged and nothing else
//! happens. Both outcomes are terminal for the lifetime of the gate.

pub mod device;
pub mod portal;

pub use device::DevicePermission;
pub use portal::PortalPermission;

use crate::errors::PermissionError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, error, info};

/// Capabilities the application asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Camera,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Camera => write!(f, "camera"),
        }
    }
}

/// Where the gate is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionState {
    #[default]
    NotRequested,
    Pending,
    Granted,
    Denied,
}

impl PermissionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PermissionState::Granted | PermissionState::Denied)
    }
}

/// Answers a capability request
///
/// The answer arrives asynchronously and exactly once per call.
pub trait PermissionProvider: Send + Sync {
    fn request(&self, capability: Capability) -> impl Future<Output = Result<bool, PermissionError>> + Send;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Which provider to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionBackend {
    /// Portal inside Flatpak, device check otherwise
    #[default]
    Auto,
    Portal,
    Device,
}

impl PermissionBackend {
    /// Resolve `Auto` against the runtime environment
    pub fn resolve(self) -> Self {
        match self {
            PermissionBackend::Auto if crate::constants::app_info::is_flatpak() => {
                PermissionBackend::Portal
            }
            PermissionBackend::Auto => PermissionBackend::Device,
            other => other,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "auto" => Some(PermissionBackend::Auto),
            "portal" => Some(PermissionBackend::Portal),
            "device" => Some(PermissionBackend::Device),
            _ => None,
        }
    }
}

/// Provider chosen at runtime from a [`PermissionBackend`]
#[derive(Debug)]
pub enum SystemPermission {
    Portal(PortalPermission),
    Device(DevicePermission),
}

impl SystemPermission {
    pub fn new(backend: PermissionBackend, device_path: &str) -> Self {
        match backend.resolve() {
            PermissionBackend::Portal => SystemPermission::Portal(PortalPermission::new()),
            _ => SystemPermission::Device(DevicePermission::new(device_path)),
        }
    }
}

impl PermissionProvider for SystemPermission {
    async fn request(&self, capability: Capability) -> Result<bool, PermissionError> {
        match self {
            SystemPermission::Portal(portal) => portal.request(capability).await,
            SystemPermission::Device(device) => device.request(capability).await,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            SystemPermission::Portal(portal) => portal.name(),
            SystemPermission::Device(device) => device.name(),
        }
    }
}

/// One-shot permission gate
#[derive(Debug)]
pub struct PermissionGate<P> {
    provider: P,
    state: PermissionState,
}

impl<P: PermissionProvider> PermissionGate<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            state: PermissionState::NotRequested,
        }
    }

    pub fn state(&self) -> PermissionState {
        self.state
    }

    /// Ask for camera access
    ///
    /// Only the first call reaches the provider; later calls return the
    /// recorded outcome. Provider errors count as a denial.
    pub async fn request(&mut self) -> bool {
        if self.state.is_terminal() {
            debug!(state = ?self.state, "Camera permission already decided");
            return self.state == PermissionState::Granted;
        }

        self.state = PermissionState::Pending;

        let granted = match self.provider.request(Capability::Camera).await {
            Ok(true) => {
                info!(provider = self.provider.name(), "Camera permission granted");
                true
            }
            Ok(false) => {
                error!(provider = self.provider.name(), "Camera permission denied");
                false
            }
            Err(e) => {
                error!(provider = self.provider.name(), error = %e, "Camera permission denied");
                false
            }
        };

        self.state = if granted {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        };
        granted
    }

    /// Request access and run `activate` only when it is granted
    pub async fn request_then<F, Fut, T>(&mut self, activate: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if self.request().await {
            Some(activate().await)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        answer: Result<bool, PermissionError>,
        calls: AtomicUsize,
    }

    impl PermissionProvider for Fixed {
        async fn request(&self, _capability: Capability) -> Result<bool, PermissionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.clone()
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    fn fixed(answer: Result<bool, PermissionError>) -> Fixed {
        Fixed {
            answer,
            calls: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn test_second_request_does_not_ask_again() {
        let mut gate = PermissionGate::new(fixed(Ok(true)));
        assert_eq!(gate.state(), PermissionState::NotRequested);
        assert!(gate.request().await);
        assert!(gate.request().await);
        assert_eq!(gate.state(), PermissionState::Granted);
        assert_eq!(gate.provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_provider_error_is_denial() {
        let mut gate = PermissionGate::new(fixed(Err(PermissionError::PortalUnavailable(
            "no session bus".into(),
        ))));
        let activated = gate.request_then(|| async { 1 }).await;
        assert_eq!(activated, None);
        assert_eq!(gate.state(), PermissionState::Denied);
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!(PermissionBackend::parse("Portal"), Some(PermissionBackend::Portal));
        assert_eq!(PermissionBackend::parse("device"), Some(PermissionBackend::Device));
        assert_eq!(PermissionBackend::parse("maybe"), None);
        assert_eq!(PermissionBackend::Device.resolve(), PermissionBackend::Device);
    }
}
