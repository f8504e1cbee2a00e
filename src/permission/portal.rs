// SPDX-License-Identifier: GPL-3.0-only

//! XDG desktop portal camera access
//!
//! `org.freedesktop.portal.Camera.AccessCamera` returns a request object
//! path immediately; the user's answer arrives later as a `Response` signal
//! on that object. The request path is predictable from our unique bus name
//! and the `handle_token` we pass, so the signal is subscribed before the
//! call is made and the answer cannot be missed.

use super::{Capability, PermissionProvider};
use crate::constants::timing::PORTAL_RESPONSE_TIMEOUT;
use crate::errors::PermissionError;
use futures::StreamExt;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use zbus::zvariant::{OwnedObjectPath, OwnedValue, Value};

const PORTAL_DESTINATION: &str = "org.freedesktop.portal.Desktop";
const PORTAL_PATH: &str = "/org/freedesktop/portal/desktop";
const CAMERA_INTERFACE: &str = "org.freedesktop.portal.Camera";
const REQUEST_INTERFACE: &str = "org.freedesktop.portal.Request";

/// Portal response code for "user granted"
const RESPONSE_SUCCESS: u32 = 0;

/// Asks the desktop portal for camera access
#[derive(Debug, Clone, Default)]
pub struct PortalPermission;

impl PortalPermission {
    pub fn new() -> Self {
        Self
    }
}

/// Object path the portal will use for a request with `token`
///
/// The sender's unique name loses its leading `:` and has `.` replaced
/// by `_`.
pub fn request_path(unique_name: &str, token: &str) -> String {
    let sender = unique_name.trim_start_matches(':').replace('.', "_");
    format!("{}/request/{}/{}", PORTAL_PATH, sender, token)
}

fn transport(context: &str) -> impl FnOnce(zbus::Error) -> PermissionError + '_ {
    move |e| PermissionError::Transport(format!("{}: {}", context, e))
}

async fn access_camera() -> Result<bool, PermissionError> {
    let connection = zbus::Connection::session()
        .await
        .map_err(|e| PermissionError::PortalUnavailable(format!("session bus: {}", e)))?;

    let camera = zbus::Proxy::new(&connection, PORTAL_DESTINATION, PORTAL_PATH, CAMERA_INTERFACE)
        .await
        .map_err(|e| PermissionError::PortalUnavailable(e.to_string()))?;

    match camera.get_property::<bool>("IsCameraPresent").await {
        Ok(false) => {
            return Err(PermissionError::DeviceNotFound(
                "portal reports no camera".to_string(),
            ));
        }
        Ok(true) => {}
        Err(e) => debug!(error = %e, "Could not read IsCameraPresent"),
    }

    let unique_name = connection
        .unique_name()
        .map(|name| name.as_str().to_string())
        .ok_or_else(|| PermissionError::Transport("connection has no unique name".to_string()))?;
    let token = format!("barcode_camera_{}", uuid::Uuid::new_v4().simple());
    let handle_path = request_path(&unique_name, &token);

    let request = zbus::Proxy::new(
        &connection,
        PORTAL_DESTINATION,
        handle_path.clone(),
        REQUEST_INTERFACE,
    )
    .await
    .map_err(transport("request proxy"))?;
    let mut responses = request
        .receive_signal("Response")
        .await
        .map_err(transport("subscribe"))?;

    let mut options: HashMap<&str, Value> = HashMap::new();
    options.insert("handle_token", Value::new(token.as_str()));

    let returned: OwnedObjectPath = camera
        .call("AccessCamera", &(options,))
        .await
        .map_err(transport("AccessCamera"))?;
    if returned.as_str() != handle_path {
        // Old portals ignore handle_token; the signal will come on the returned path
        warn!(expected = %handle_path, returned = %returned, "Portal used a different request path");
        let request = zbus::Proxy::new(
            &connection,
            PORTAL_DESTINATION,
            returned.clone(),
            REQUEST_INTERFACE,
        )
        .await
        .map_err(transport("request proxy"))?;
        responses = request
            .receive_signal("Response")
            .await
            .map_err(transport("subscribe"))?;
    }

    debug!(request = %returned, "Waiting for portal response");

    let message = tokio::time::timeout(PORTAL_RESPONSE_TIMEOUT, responses.next())
        .await
        .map_err(|_| PermissionError::Transport("timed out waiting for portal response".into()))?
        .ok_or_else(|| PermissionError::Transport("portal response stream ended".into()))?;

    let (code, _results): (u32, HashMap<String, OwnedValue>) = message
        .body()
        .deserialize()
        .map_err(transport("response body"))?;

    info!(code, "Portal camera access response");
    Ok(code == RESPONSE_SUCCESS)
}

impl PermissionProvider for PortalPermission {
    async fn request(&self, capability: Capability) -> Result<bool, PermissionError> {
        match capability {
            Capability::Camera => access_camera().await,
        }
    }

    fn name(&self) -> &'static str {
        "portal"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_path_from_unique_name() {
        assert_eq!(
            request_path(":1.42", "barcode_camera_abc"),
            "/org/freedesktop/portal/desktop/request/1_42/barcode_camera_abc"
        );
    }
}
