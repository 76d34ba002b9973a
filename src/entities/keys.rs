//! File name and template placeholder constants.
//!
//! Avoid string typos between the compiler, the publisher and the script
//! runtime that reads these files back inside the rendering surface.

// === Output directory layout ===
/// Durable entity list
pub const STATE_FILE: &str = "lt-state.json";
/// Durable visibility map (polled by the compiled script)
pub const VISIBLE_FILE: &str = "lt-visible.json";
/// Merged stylesheet
pub const STYLES_FILE: &str = "lt-styles.css";
/// Merged script
pub const SCRIPT_FILE: &str = "lt-script.js";
/// Entry document prefix: `lt-index-<revision>.html`
pub const INDEX_PREFIX: &str = "lt-index-";
/// Entry document extension
pub const INDEX_EXT: &str = "html";

// === Process-wide config ===
/// Config record holding the chosen output directory
pub const CONFIG_FILE: &str = "lower-thirds.json";
/// Default log file name (data dir)
pub const LOG_FILE: &str = "lower-thirds.log";
/// Scene stand-in used by the CLI surface
pub const SCENE_FILE: &str = "lower-thirds-scene.json";

// === Rendering resource ===
/// Name of the managed browser source in the host scene
pub const SOURCE_NAME: &str = "Smart Lower Thirds";
/// Host source kind
pub const SOURCE_KIND: &str = "browser_source";
/// Fixed default dimensions for a freshly created source
pub const SOURCE_WIDTH: u32 = 1920;
pub const SOURCE_HEIGHT: u32 = 1080;

// === Template placeholders ===
pub const P_ID: &str = "{{ID}}";
pub const P_TITLE: &str = "{{TITLE}}";
pub const P_SUBTITLE: &str = "{{SUBTITLE}}";
pub const P_PROFILE_PICTURE: &str = "{{PROFILE_PICTURE}}";
pub const P_BG_COLOR: &str = "{{BG_COLOR}}";
pub const P_TEXT_COLOR: &str = "{{TEXT_COLOR}}";
pub const P_FONT_FAMILY: &str = "{{FONT_FAMILY}}";
pub const P_ANIM_IN: &str = "{{ANIM_IN}}";
pub const P_ANIM_OUT: &str = "{{ANIM_OUT}}";
pub const P_POSITION: &str = "{{POSITION}}";

/// Script poll interval for the visibility file (ms)
pub const VISIBILITY_POLL_MS: u32 = 500;
