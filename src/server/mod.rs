//! Vendor request bridge for remote control of the overlays.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────┐       mpsc::channel        ┌──────────────────────┐
//! │   Transport thread      │  ───── ApiCommand ──────▶  │   Coordinator        │
//! │   (websocket vendor)    │                            │   (host UI thread)   │
//! │                         │                            │                      │
//! │  ToggleVisible {id}     │  ──▶ ToggleVisible(id) ──▶ │  toggle(id)          │
//! │  SetVisible {id,vis}    │  ──▶ SetVisible ───────▶   │  set_visible(id,vis) │
//! └─────────────────────────┘                            └──────────────────────┘
//!          │                                                      │
//!          │  Arc<SharedApiState>                                 │
//!          │◀──────────── read snapshots ─────────────────────────│
//!          │                                          updated after mutations
//! ```
//!
//! # Requests
//!
//! | Type              | Data                  | Response                      |
//! |-------------------|-----------------------|-------------------------------|
//! | `ListLowerThirds` | `{}`                  | `{items: [...]}`              |
//! | `ToggleVisible`   | `{id}`                | `{success, error?}`           |
//! | `SetVisible`      | `{id, visible}`       | `{success, error?}`           |
//! | `ShowOnly`        | `{id}`                | `{success, error?}`           |

mod api;

pub use api::{
    ApiCommand, ApiResponse, OverlaySnapshot, REQ_LIST, REQ_SET_VISIBLE, REQ_SHOW_ONLY, REQ_TOGGLE,
    SharedApiState, VendorBridge,
};
