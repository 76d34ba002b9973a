//! Artifact compiler: overlay store -> merged stylesheet, script and markup.
//!
//! Every overlay is compiled, visible or not. Showing and hiding happens
//! inside the already-loaded page (see the runtime prelude in
//! [`SCRIPT_PRELUDE`]), so the artifact only changes on content edits.
//!
//! Output is a pure function of the store: same store, same bytes for the
//! stylesheet and script. Only the entry document carries the revision.

use std::fmt::Write as _;

use crate::entities::keys::{
    P_ANIM_IN, P_ANIM_OUT, P_BG_COLOR, P_FONT_FAMILY, P_ID, P_POSITION, P_PROFILE_PICTURE,
    P_SUBTITLE, P_TEXT_COLOR, P_TITLE, SCRIPT_FILE, SOURCE_NAME, STYLES_FILE, VISIBILITY_POLL_MS,
    VISIBLE_FILE,
};
use crate::entities::{Overlay, OverlayStore};

const ANIMATE_CSS_URL: &str = "https://cdnjs.cloudflare.com/ajax/libs/animate.css/4.1.1/animate.min.css";

/// Shared layout rules emitted before any overlay fragment.
const STYLES_PRELUDE: &str = r#"html, body { margin: 0; padding: 0; background: transparent; overflow: hidden; }
#lt-root { position: fixed; inset: 0; pointer-events: none; }
.lt { position: absolute; font-family: var(--lt-font), sans-serif; }
.lt.lt-hidden { visibility: hidden; }
.lt-pos-bottom-left { left: 5%; bottom: 8%; }
.lt-pos-bottom-right { right: 5%; bottom: 8%; }
.lt-pos-top-left { left: 5%; top: 8%; }
.lt-pos-top-right { right: 5%; top: 8%; }
.lt-pos-center { left: 50%; top: 50%; transform: translate(-50%, -50%); }
"#;

/// Client runtime: polls the visibility file and swaps animation classes.
/// `__POLL_MS__` and `__VISIBLE_FILE__` are filled in at compile time.
const SCRIPT_PRELUDE: &str = r##"(function () {
  "use strict";
  var POLL_MS = __POLL_MS__;
  var VISIBLE_FILE = "__VISIBLE_FILE__";
  var wanted = {};
  var repeatTimers = {};

  function classes(el, attr) {
    return (el.getAttribute(attr) || "").split(/\s+/).filter(Boolean);
  }

  function show(el) {
    el.classList.remove.apply(el.classList, classes(el, "data-anim-out"));
    el.classList.remove("lt-hidden");
    el.classList.add.apply(el.classList, classes(el, "data-anim-in"));
    el.dataset.shown = "1";
  }

  function hide(el) {
    if (el.dataset.shown !== "1") { el.classList.add("lt-hidden"); return; }
    el.dataset.shown = "0";
    var out = classes(el, "data-anim-out");
    el.classList.remove.apply(el.classList, classes(el, "data-anim-in"));
    if (!out.length) { el.classList.add("lt-hidden"); return; }
    el.addEventListener("animationend", function done() {
      el.removeEventListener("animationend", done);
      if (el.dataset.shown !== "1") {
        el.classList.remove.apply(el.classList, out);
        el.classList.add("lt-hidden");
      }
    });
    el.classList.add.apply(el.classList, out);
  }

  function stopRepeat(id) {
    var t = repeatTimers[id];
    if (t) { clearTimeout(t); delete repeatTimers[id]; }
  }

  function startRepeat(el) {
    var every = parseInt(el.getAttribute("data-repeat-every") || "0", 10);
    var visibleFor = parseInt(el.getAttribute("data-repeat-visible") || "0", 10);
    if (!(every > 0)) return;
    if (!(visibleFor > 0)) visibleFor = Math.max(1, Math.min(every, 5));
    stopRepeat(el.id);
    var cycle = function () {
      if (!wanted[el.id]) return;
      repeatTimers[el.id] = setTimeout(function () {
        if (!wanted[el.id]) return;
        hide(el);
        repeatTimers[el.id] = setTimeout(function () {
          if (!wanted[el.id]) return;
          show(el);
          cycle();
        }, every * 1000);
      }, visibleFor * 1000);
    };
    cycle();
  }

  function apply(map) {
    var nodes = document.querySelectorAll("#lt-root > .lt[id]");
    for (var i = 0; i < nodes.length; i++) {
      var el = nodes[i];
      var want = map[el.id] === true;
      if (want === !!wanted[el.id]) continue;
      wanted[el.id] = want;
      if (want) { show(el); startRepeat(el); }
      else { stopRepeat(el.id); hide(el); }
    }
  }

  function poll() {
    fetch(VISIBLE_FILE + "?t=" + Date.now(), { cache: "no-store" })
      .then(function (r) { return r.ok ? r.json() : {}; })
      .then(function (map) { if (map && typeof map === "object") apply(map); })
      .catch(function () {})
      .then(function () { setTimeout(poll, POLL_MS); });
  }

  if (document.readyState === "loading") {
    document.addEventListener("DOMContentLoaded", poll);
  } else {
    poll();
  }
})();
"##;

/// Output of one compile pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifacts {
    /// Merged stylesheet (`lt-styles.css`)
    pub styles: String,
    /// Merged script (`lt-script.js`)
    pub script: String,
    /// One element per overlay, in store order
    pub markup: String,
    pub overlay_count: usize,
}

impl CompiledArtifacts {
    /// Entry document referencing the merged files. `revision` is appended as
    /// a query string so a cached stylesheet/script is refetched too.
    pub fn entry_document(&self, revision: u64) -> String {
        let mut doc = String::with_capacity(self.markup.len() + 1024);
        doc.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
        let _ = writeln!(doc, "<meta name=\"lt-revision\" content=\"{}\">", revision);
        let _ = writeln!(doc, "<title>{}</title>", escape_html(SOURCE_NAME));
        let _ = writeln!(doc, "<link rel=\"stylesheet\" href=\"{}\">", ANIMATE_CSS_URL);
        let _ = writeln!(doc, "<link rel=\"stylesheet\" href=\"{}?rev={}\">", STYLES_FILE, revision);
        doc.push_str("</head>\n<body>\n<div id=\"lt-root\">\n");
        doc.push_str(&self.markup);
        doc.push_str("</div>\n");
        let _ = writeln!(doc, "<script src=\"{}?rev={}\"></script>", SCRIPT_FILE, revision);
        doc.push_str("</body>\n</html>\n");
        doc
    }
}

/// Compile every overlay of `store`.
pub fn compile(store: &OverlayStore) -> CompiledArtifacts {
    let mut styles = String::from(STYLES_PRELUDE);
    let mut script = SCRIPT_PRELUDE
        .replace("__POLL_MS__", &VISIBILITY_POLL_MS.to_string())
        .replace("__VISIBLE_FILE__", VISIBLE_FILE);
    let mut markup = String::new();

    for (index, overlay) in store.all().enumerate() {
        styles.push('\n');
        styles.push_str(&compile_css(overlay));
        if !overlay.js_template.trim().is_empty() {
            script.push('\n');
            script.push_str(&compile_js(overlay));
        }
        markup.push_str(&compile_element(overlay, index));
    }

    CompiledArtifacts {
        styles,
        script,
        markup,
        overlay_count: store.len(),
    }
}

/// Which escaping applies to substituted values.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Context {
    Html,
    Css,
    Js,
}

/// Value for a placeholder token (`{{NAME}}`), escaped for `ctx`.
fn placeholder_value(overlay: &Overlay, token: &str, ctx: Context) -> Option<String> {
    let raw = match token {
        P_ID => overlay.id.as_str().to_string(),
        P_TITLE => overlay.title.clone(),
        P_SUBTITLE => overlay.subtitle.clone(),
        P_PROFILE_PICTURE => overlay.profile_picture.clone().unwrap_or_default(),
        P_BG_COLOR => overlay.bg_color_or_default().to_string(),
        P_TEXT_COLOR => overlay.text_color_or_default().to_string(),
        P_FONT_FAMILY => sanitize_font(&overlay.font_family),
        P_ANIM_IN => overlay.anim_in.classes(),
        P_ANIM_OUT => overlay.anim_out.classes(),
        P_POSITION => overlay.position.class().to_string(),
        _ => return None,
    };
    Some(match ctx {
        Context::Html => escape_html(&raw),
        Context::Css => sanitize_css(&raw),
        Context::Js => escape_js(&raw),
    })
}

/// Single-pass `{{NAME}}` substitution. Unknown tokens are left as-is, and
/// substituted values are never rescanned.
fn fill(template: &str, overlay: &Overlay, ctx: Context) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match tail.find("}}") {
            Some(end) => {
                let token = &tail[..end + 2];
                match placeholder_value(overlay, token, ctx) {
                    Some(v) => out.push_str(&v),
                    None => out.push_str(token),
                }
                rest = &tail[end + 2..];
            }
            None => {
                out.push_str(tail);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn compile_css(overlay: &Overlay) -> String {
    let id = overlay.id.as_str();
    let body = fill(&overlay.css_template, overlay, Context::Css);
    if overlay.css_template.contains(P_ID) {
        format!("/* {} */\n{}\n", id, body.trim_end())
    } else {
        format!("/* {} */\n{}", id, scope_css(id, &body))
    }
}

/// Prefix every top-level selector of an unscoped fragment with `#id`.
/// Bare declarations go into a `#id { ... }` rule; at-rules pass through.
/// No CSS nesting: embedded browsers in older hosts do not support it.
fn scope_css(id: &str, css: &str) -> String {
    let mut rules = String::new();
    let mut loose = String::new();
    let mut prelude = String::new();
    let mut body = String::new();
    let mut depth = 0usize;

    for c in css.chars() {
        match (c, depth) {
            ('{', 0) => depth = 1,
            ('{', _) => {
                depth += 1;
                body.push(c);
            }
            ('}', 0) => {}
            ('}', 1) => {
                depth = 0;
                let head = prelude.trim();
                if head.starts_with('@') {
                    let _ = writeln!(rules, "{} {{{}}}", head, body);
                } else {
                    let _ = writeln!(rules, "{} {{{}}}", scope_selectors(id, head), body);
                }
                prelude.clear();
                body.clear();
            }
            ('}', _) => {
                depth -= 1;
                body.push(c);
            }
            (';', 0) => {
                let decl = prelude.trim();
                if decl.starts_with('@') {
                    let _ = writeln!(rules, "{};", decl);
                } else if !decl.is_empty() {
                    let _ = writeln!(loose, "  {};", decl);
                }
                prelude.clear();
            }
            (_, 0) => prelude.push(c),
            _ => body.push(c),
        }
    }
    // Trailing declaration without `;`
    let tail = prelude.trim();
    if !tail.is_empty() && depth == 0 {
        let _ = writeln!(loose, "  {};", tail);
    }

    let mut out = String::new();
    if !loose.is_empty() {
        let _ = write!(out, "#{} {{\n{}}}\n", id, loose);
    }
    out.push_str(&rules);
    out
}

fn scope_selectors(id: &str, head: &str) -> String {
    head.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.strip_prefix('&') {
            Some(rest) => format!("#{}{}", id, rest),
            None => format!("#{} {}", id, s),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn compile_js(overlay: &Overlay) -> String {
    let id = overlay.id.as_str();
    let body = fill(&overlay.js_template, overlay, Context::Js);
    format!(
        "/* {id} */\n(function (root) {{\n  if (!root) return;\n{}\n}})(document.getElementById(\"{id}\"));\n",
        body.trim_end()
    )
}

fn compile_element(overlay: &Overlay, index: usize) -> String {
    let inner = fill(&overlay.html_template, overlay, Context::Html);
    format!(
        "<div id=\"{id}\" class=\"lt {pos} lt-hidden\" style=\"z-index:{z};--lt-bg:{bg};--lt-fg:{fg};--lt-font:'{font}'\" \
data-anim-in=\"{ain}\" data-anim-out=\"{aout}\" data-repeat-every=\"{every}\" data-repeat-visible=\"{vis}\">\n{inner}\n</div>\n",
        id = overlay.id.as_str(),
        pos = overlay.position.class(),
        z = index + 1,
        bg = overlay.bg_color_or_default(),
        fg = overlay.text_color_or_default(),
        font = escape_html(&sanitize_font(&overlay.font_family)),
        ain = escape_html(&overlay.anim_in.classes()),
        aout = escape_html(&overlay.anim_out.classes()),
        every = overlay.repeat_every_sec,
        vis = overlay.repeat_visible_sec,
        inner = inner.trim_end(),
    )
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape for use inside a JS string literal (either quote style).
pub fn escape_js(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '<' => out.push_str("\\u003c"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            _ => out.push(c),
        }
    }
    out
}

/// Values spliced into CSS cannot open or close blocks, strings or comments.
fn sanitize_css(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, '{' | '}' | ';' | '<' | '>' | '"' | '\'' | '\\' | '\n' | '\r'))
        .collect()
}

fn sanitize_font(s: &str) -> String {
    let cleaned = sanitize_css(s);
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        crate::entities::overlay::DEFAULT_FONT.to_string()
    } else {
        trimmed.to_string()
    }
}
