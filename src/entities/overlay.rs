//! Overlay: one lower-third definition.
//!
//! Holds everything the compiler needs to render one element: text content,
//! animation selectors, styling, and the free-form HTML/CSS/JS fragments.
//! Visibility is deliberately NOT a field here, see `entities::visibility`.

use std::fmt;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque overlay identifier.
///
/// Doubles as the DOM id of the overlay's element in the entry document, so
/// it must be a valid CSS identifier: ASCII letter first, then letters,
/// digits, `-` or `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverlayId(String);

impl OverlayId {
    /// Fresh random id. UUID v4 keeps ids unique across restarts without
    /// any counter state on disk.
    pub fn generate() -> Self {
        Self(format!("lt-{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Safe to splice into HTML attributes, CSS selectors and JS strings.
    pub fn is_valid(&self) -> bool {
        let mut chars = self.0.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OverlayId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for OverlayId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Animation selector: a named animate.css preset or a literal class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimSelector {
    Preset(String),
    Custom(String),
}

/// (label, class) pairs offered for the "in" animation.
pub const ANIM_IN_PRESETS: &[(&str, &str)] = &[
    ("Fade In", "animate__fadeIn"),
    ("Fade In Up", "animate__fadeInUp"),
    ("Fade In Down", "animate__fadeInDown"),
    ("Fade In Left", "animate__fadeInLeft"),
    ("Fade In Right", "animate__fadeInRight"),
    ("Back In Up", "animate__backInUp"),
    ("Back In Down", "animate__backInDown"),
    ("Back In Left", "animate__backInLeft"),
    ("Back In Right", "animate__backInRight"),
    ("Bounce In", "animate__bounceIn"),
    ("Zoom In", "animate__zoomIn"),
    ("Slide In Up", "animate__slideInUp"),
    ("Slide In Down", "animate__slideInDown"),
    ("Slide In Left", "animate__slideInLeft"),
    ("Slide In Right", "animate__slideInRight"),
    ("Flip In X", "animate__flipInX"),
    ("Flip In Y", "animate__flipInY"),
    ("Jack In The Box", "animate__jackInTheBox"),
];

/// (label, class) pairs offered for the "out" animation.
pub const ANIM_OUT_PRESETS: &[(&str, &str)] = &[
    ("Fade Out", "animate__fadeOut"),
    ("Fade Out Up", "animate__fadeOutUp"),
    ("Fade Out Down", "animate__fadeOutDown"),
    ("Fade Out Left", "animate__fadeOutLeft"),
    ("Fade Out Right", "animate__fadeOutRight"),
    ("Back Out Up", "animate__backOutUp"),
    ("Back Out Down", "animate__backOutDown"),
    ("Back Out Left", "animate__backOutLeft"),
    ("Back Out Right", "animate__backOutRight"),
    ("Bounce Out", "animate__bounceOut"),
    ("Zoom Out", "animate__zoomOut"),
    ("Slide Out Up", "animate__slideOutUp"),
    ("Slide Out Down", "animate__slideOutDown"),
    ("Slide Out Left", "animate__slideOutLeft"),
    ("Slide Out Right", "animate__slideOutRight"),
    ("Flip Out X", "animate__flipOutX"),
    ("Flip Out Y", "animate__flipOutY"),
    ("Roll Out", "animate__rollOut"),
];

impl AnimSelector {
    pub fn preset(name: impl Into<String>) -> Self {
        Self::Preset(name.into())
    }

    pub fn custom(class: impl Into<String>) -> Self {
        Self::Custom(class.into())
    }

    /// Parse operator input: `custom:<class>` selects the literal branch,
    /// anything else is a preset name.
    pub fn parse(s: &str) -> Self {
        match s.strip_prefix("custom:") {
            Some(class) => Self::Custom(class.trim().to_string()),
            None => Self::Preset(s.trim().to_string()),
        }
    }

    /// Class list applied to the element when this animation runs.
    ///
    /// Presets get the `animate__animated` base class animate.css needs;
    /// custom classes are used verbatim.
    pub fn classes(&self) -> String {
        match self {
            Self::Preset(name) if name.is_empty() => String::new(),
            Self::Preset(name) => format!("animate__animated {}", name),
            Self::Custom(class) => class.clone(),
        }
    }

    pub fn is_known_preset(&self) -> bool {
        match self {
            Self::Preset(name) => ANIM_IN_PRESETS
                .iter()
                .chain(ANIM_OUT_PRESETS)
                .any(|(_, class)| class == name),
            Self::Custom(_) => false,
        }
    }
}

impl fmt::Display for AnimSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preset(name) => f.write_str(name),
            Self::Custom(class) => write!(f, "custom:{}", class),
        }
    }
}

/// Screen position of the overlay element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LtPosition {
    #[default]
    BottomLeft,
    BottomRight,
    TopLeft,
    TopRight,
    Center,
}

impl LtPosition {
    pub const ALL: [LtPosition; 5] = [
        Self::BottomLeft,
        Self::BottomRight,
        Self::TopLeft,
        Self::TopRight,
        Self::Center,
    ];

    /// CSS class emitted on the overlay element.
    pub fn class(&self) -> &'static str {
        match self {
            Self::BottomLeft => "lt-pos-bottom-left",
            Self::BottomRight => "lt-pos-bottom-right",
            Self::TopLeft => "lt-pos-top-left",
            Self::TopRight => "lt-pos-top-right",
            Self::Center => "lt-pos-center",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::BottomLeft => "Bottom Left",
            Self::BottomRight => "Bottom Right",
            Self::TopLeft => "Top Left",
            Self::TopRight => "Top Right",
            Self::Center => "Screen Center",
        }
    }

    pub fn from_class(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.class() == s)
    }
}

// Unknown classes fall back to the default instead of failing the whole
// state file.
impl From<String> for LtPosition {
    fn from(s: String) -> Self {
        Self::from_class(&s).unwrap_or_default()
    }
}

impl From<LtPosition> for String {
    fn from(p: LtPosition) -> Self {
        p.class().to_string()
    }
}

pub const DEFAULT_TITLE: &str = "New Lower Third";
pub const DEFAULT_SUBTITLE: &str = "Subtitle";
pub const DEFAULT_FONT: &str = "Inter";
pub const DEFAULT_BG_COLOR: &str = "#111827";
pub const DEFAULT_TEXT_COLOR: &str = "#f9fafb";

pub const DEFAULT_HTML_TEMPLATE: &str = r#"<div class="lt-card">
  <div class="lt-text">
    <div class="lt-title">{{TITLE}}</div>
    <div class="lt-subtitle">{{SUBTITLE}}</div>
  </div>
</div>"#;

pub const DEFAULT_CSS_TEMPLATE: &str = r#"#{{ID}} .lt-card {
  display: flex;
  align-items: center;
  gap: 16px;
  padding: 14px 22px;
  border-radius: 12px;
  background: {{BG_COLOR}};
  color: {{TEXT_COLOR}};
  font-family: '{{FONT_FAMILY}}', sans-serif;
}
#{{ID}} .lt-title { font-size: 34px; font-weight: 700; }
#{{ID}} .lt-subtitle { font-size: 22px; opacity: .85; }"#;

/// One overlay definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Overlay {
    pub id: OverlayId,
    pub title: String,
    pub subtitle: String,
    /// File name relative to the output directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    pub anim_in: AnimSelector,
    pub anim_out: AnimSelector,
    pub font_family: String,
    pub position: LtPosition,
    pub bg_color: String,
    pub text_color: String,
    pub html_template: String,
    pub css_template: String,
    pub js_template: String,
    /// Portable key sequence text, e.g. "Ctrl+Shift+1"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hotkey: Option<String>,
    /// Client-side auto-repeat period in seconds (0 = off)
    pub repeat_every_sec: u32,
    /// How long each auto-repeat stays on screen
    pub repeat_visible_sec: u32,
}

impl Default for Overlay {
    fn default() -> Self {
        Self {
            id: OverlayId(String::new()),
            title: DEFAULT_TITLE.to_string(),
            subtitle: DEFAULT_SUBTITLE.to_string(),
            profile_picture: None,
            anim_in: AnimSelector::preset("animate__fadeInUp"),
            anim_out: AnimSelector::preset("animate__fadeOutDown"),
            font_family: DEFAULT_FONT.to_string(),
            position: LtPosition::default(),
            bg_color: DEFAULT_BG_COLOR.to_string(),
            text_color: DEFAULT_TEXT_COLOR.to_string(),
            html_template: DEFAULT_HTML_TEMPLATE.to_string(),
            css_template: DEFAULT_CSS_TEMPLATE.to_string(),
            js_template: String::new(),
            hotkey: None,
            repeat_every_sec: 0,
            repeat_visible_sec: 0,
        }
    }
}

impl Overlay {
    /// Default overlay with the given id.
    pub fn new(id: OverlayId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Copy of every field under a new id.
    pub fn duplicate(&self, id: OverlayId) -> Self {
        Self {
            id,
            ..self.clone()
        }
    }

    pub fn bg_color_or_default(&self) -> &str {
        if is_hex_color(&self.bg_color) {
            &self.bg_color
        } else {
            DEFAULT_BG_COLOR
        }
    }

    pub fn text_color_or_default(&self) -> &str {
        if is_hex_color(&self.text_color) {
            &self.text_color
        } else {
            DEFAULT_TEXT_COLOR
        }
    }
}

/// `#rgb` or `#rrggbb`.
pub fn is_hex_color(s: &str) -> bool {
    match s.strip_prefix('#') {
        Some(hex) => (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// A profile image reference must be a plain relative path that stays
/// inside the output directory (no root, no `..`, no drive prefix).
pub fn is_relative_asset_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    Path::new(name)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
}
