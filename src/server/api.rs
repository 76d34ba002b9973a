//! Vendor request handling.
//!
//! # Key types
//!
//! - [`VendorBridge`] - request dispatcher, owns the command sender
//! - [`ApiCommand`] - mutations forwarded to the coordinator's thread
//! - [`SharedApiState`] - overlay list snapshot, refreshed by the coordinator
//! - [`OverlaySnapshot`] - one JSON row of `ListLowerThirds`
//!
//! # Thread safety
//!
//! - `SharedApiState` uses `RwLock` - coordinator writes, request handlers read
//! - `ApiCommand` sent via `mpsc::Sender` - handlers never touch the store

use std::sync::{Arc, RwLock, mpsc};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::entities::{Overlay, OverlayId, VisibilitySet};

pub const REQ_LIST: &str = "ListLowerThirds";
pub const REQ_TOGGLE: &str = "ToggleVisible";
pub const REQ_SET_VISIBLE: &str = "SetVisible";
pub const REQ_SHOW_ONLY: &str = "ShowOnly";

/// Commands sent from request handlers to the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCommand {
    ToggleVisible(OverlayId),
    SetVisible { id: OverlayId, visible: bool },
    /// Show one overlay and hide the rest
    ShowOnly(OverlayId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlaySnapshot {
    pub id: OverlayId,
    pub title: String,
    pub subtitle: String,
    pub is_visible: bool,
    pub hotkey: String,
    pub repeat_every_sec: u32,
    pub repeat_visible_sec: u32,
}

impl OverlaySnapshot {
    pub fn new(overlay: &Overlay, visible: bool) -> Self {
        Self {
            id: overlay.id.clone(),
            title: overlay.title.clone(),
            subtitle: overlay.subtitle.clone(),
            is_visible: visible,
            hotkey: overlay.hotkey.clone().unwrap_or_default(),
            repeat_every_sec: overlay.repeat_every_sec,
            repeat_visible_sec: overlay.repeat_visible_sec,
        }
    }
}

/// Shared state readable by request handlers (updated by the coordinator)
#[derive(Debug, Default)]
pub struct SharedApiState {
    pub items: RwLock<Vec<OverlaySnapshot>>,
}

impl SharedApiState {
    pub fn update<'a>(&self, overlays: impl Iterator<Item = &'a Overlay>, visibility: &VisibilitySet) {
        let items = overlays
            .map(|o| OverlaySnapshot::new(o, visibility.is_visible(&o.id)))
            .collect();
        *self.items.write().unwrap_or_else(|e| e.into_inner()) = items;
    }

    pub fn items(&self) -> Vec<OverlaySnapshot> {
        self.items.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn contains(&self, id: &OverlayId) -> bool {
        self.items
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|s| &s.id == id)
    }
}

/// Generic API response
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn ok_msg(msg: &str) -> Self {
        Self { success: true, message: Some(msg.to_string()), error: None }
    }

    pub fn err(msg: &str) -> Self {
        Self { success: false, message: None, error: Some(msg.to_string()) }
    }

    fn into_value(self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({ "success": false }))
    }
}

#[derive(Debug, Deserialize)]
struct IdRequest {
    id: OverlayId,
}

#[derive(Debug, Deserialize)]
struct SetVisibleRequest {
    id: OverlayId,
    visible: bool,
}

/// Transport-agnostic request dispatcher.
///
/// Whatever carries the requests (websocket vendor channel, CLI) hands the
/// request type and JSON payload to [`VendorBridge::handle`].
pub struct VendorBridge {
    state: Arc<SharedApiState>,
    command_tx: mpsc::Sender<ApiCommand>,
}

impl VendorBridge {
    /// Returns the bridge plus the command receiver for the coordinator to drain.
    pub fn new(state: Arc<SharedApiState>) -> (Self, mpsc::Receiver<ApiCommand>) {
        let (tx, rx) = mpsc::channel();
        (Self { state, command_tx: tx }, rx)
    }

    pub fn handle(&self, request_type: &str, data: &Value) -> Value {
        debug!("vendor request {}: {}", request_type, data);
        match request_type {
            REQ_LIST => json!({ "items": self.state.items() }),
            REQ_TOGGLE => match IdRequest::deserialize(data) {
                Ok(req) => self.send_for(req.id.clone(), ApiCommand::ToggleVisible(req.id)),
                Err(e) => ApiResponse::err(&format!("Invalid request: {}", e)).into_value(),
            },
            REQ_SET_VISIBLE => match SetVisibleRequest::deserialize(data) {
                Ok(req) => self.send_for(
                    req.id.clone(),
                    ApiCommand::SetVisible { id: req.id, visible: req.visible },
                ),
                Err(e) => ApiResponse::err(&format!("Invalid request: {}", e)).into_value(),
            },
            REQ_SHOW_ONLY => match IdRequest::deserialize(data) {
                Ok(req) => self.send_for(req.id.clone(), ApiCommand::ShowOnly(req.id)),
                Err(e) => ApiResponse::err(&format!("Invalid request: {}", e)).into_value(),
            },
            other => {
                warn!("Unknown vendor request: {}", other);
                ApiResponse::err(&format!("Unknown request type: {}", other)).into_value()
            }
        }
    }

    fn send_for(&self, id: OverlayId, cmd: ApiCommand) -> Value {
        if !self.state.contains(&id) {
            return ApiResponse::err(&format!("Unknown id: {}", id)).into_value();
        }
        let resp = match self.command_tx.send(cmd) {
            Ok(_) => ApiResponse::ok_msg(&format!("{} queued", id)),
            Err(e) => ApiResponse::err(&format!("Failed to send command: {}", e)),
        };
        resp.into_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge_with(ids: &[&str]) -> (VendorBridge, mpsc::Receiver<ApiCommand>) {
        let state = Arc::new(SharedApiState::default());
        let overlays: Vec<Overlay> = ids.iter().map(|id| Overlay::new(OverlayId::from(*id))).collect();
        let mut vis = VisibilitySet::new();
        vis.set_visible(&OverlayId::from(ids[0]), true);
        state.update(overlays.iter(), &vis);
        VendorBridge::new(state)
    }

    #[test]
    fn list_uses_camel_case_fields() {
        let (bridge, _rx) = bridge_with(&["lt-a", "lt-b"]);
        let res = bridge.handle(REQ_LIST, &json!({}));
        let items = res["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["id"], "lt-a");
        assert_eq!(items[0]["isVisible"], true);
        assert_eq!(items[1]["isVisible"], false);
        assert_eq!(items[0]["repeatEverySec"], 0);
        assert_eq!(items[0]["hotkey"], "");
    }

    #[test]
    fn toggle_and_set_forward_commands() {
        let (bridge, rx) = bridge_with(&["lt-a"]);
        let res = bridge.handle(REQ_TOGGLE, &json!({ "id": "lt-a" }));
        assert_eq!(res["success"], true);
        assert_eq!(res["message"], "lt-a queued");
        let res = bridge.handle(REQ_SET_VISIBLE, &json!({ "id": "lt-a", "visible": false }));
        assert_eq!(res["success"], true);

        let cmds: Vec<ApiCommand> = rx.try_iter().collect();
        assert_eq!(
            cmds,
            vec![
                ApiCommand::ToggleVisible(OverlayId::from("lt-a")),
                ApiCommand::SetVisible { id: OverlayId::from("lt-a"), visible: false },
            ]
        );
    }

    #[test]
    fn bad_requests_are_rejected_without_commands() {
        let (bridge, rx) = bridge_with(&["lt-a"]);
        assert_eq!(bridge.handle(REQ_TOGGLE, &json!({}))["success"], false);
        assert_eq!(bridge.handle(REQ_SET_VISIBLE, &json!({ "id": "lt-a" }))["success"], false);
        assert_eq!(bridge.handle(REQ_TOGGLE, &json!({ "id": "lt-zzz" }))["success"], false);
        let res = bridge.handle("Explode", &json!({}));
        assert_eq!(res["success"], false);
        assert!(res["error"].as_str().unwrap().contains("Explode"));
        assert!(rx.try_recv().is_err());
    }
}
