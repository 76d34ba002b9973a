use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::entities::keys::{SOURCE_HEIGHT, SOURCE_NAME, SOURCE_WIDTH};

const SOURCE_INFO: &str = const_format::formatcp!("{} ({}x{})", SOURCE_NAME, SOURCE_WIDTH, SOURCE_HEIGHT);

// Build version with surface info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Source: ", SOURCE_INFO, "\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Lower thirds overlay manager
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Enable debug logging to file (default: lower-thirds.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE", global = true)]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR", global = true)]
    pub config_dir: Option<PathBuf>,

    /// Scene file standing in for the host scene (default: lower-thirds-scene.json in data dir)
    #[arg(long = "scene", value_name = "FILE", global = true)]
    pub scene_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show output directory, overlays and current artifact
    Status,
    /// Set the output directory (loads its state and publishes)
    SetDir {
        #[arg(value_name = "DIR")]
        dir: PathBuf,
    },
    /// List overlays in stacking order
    List,
    /// Append a new overlay with default content
    Add,
    /// Duplicate an overlay (inserted right after it, hidden)
    Clone { id: String },
    /// Delete an overlay
    Remove { id: String },
    /// Print one overlay as JSON
    Show { id: String },
    /// Flip visibility
    Toggle { id: String },
    /// Set visibility explicitly
    SetVisible {
        id: String,
        #[arg(value_name = "true|false", action = clap::ArgAction::Set)]
        visible: bool,
    },
    /// Show one overlay and hide all others
    ShowOnly { id: String },
    /// Edit overlay content
    Edit(EditArgs),
    /// Copy an image into the output directory and attach it
    ImportImage {
        id: String,
        #[arg(value_name = "IMAGE")]
        path: PathBuf,
    },
    /// Create the browser source if missing and point it at the current artifact
    EnsureSource,
    /// Recompile and publish a new revision
    Rebuild,
    /// Dispatch a vendor request (ListLowerThirds, ToggleVisible, SetVisible, ShowOnly)
    Request {
        #[arg(value_name = "TYPE")]
        request_type: String,
        /// JSON request data
        #[arg(value_name = "JSON", default_value = "{}")]
        data: String,
    },
}

#[derive(clap::Args, Debug, Default)]
pub struct EditArgs {
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub subtitle: Option<String>,
    /// Preset name, or `custom:<class>` for a literal class
    #[arg(long = "anim-in")]
    pub anim_in: Option<String>,
    #[arg(long = "anim-out")]
    pub anim_out: Option<String>,
    #[arg(long)]
    pub font: Option<String>,
    /// Position class, e.g. lt-pos-top-right
    #[arg(long)]
    pub position: Option<String>,
    #[arg(long = "bg")]
    pub bg_color: Option<String>,
    #[arg(long = "fg")]
    pub text_color: Option<String>,
    /// Hotkey text; empty string clears it
    #[arg(long)]
    pub hotkey: Option<String>,
    #[arg(long = "repeat-every")]
    pub repeat_every_sec: Option<u32>,
    #[arg(long = "repeat-visible")]
    pub repeat_visible_sec: Option<u32>,
    #[arg(long = "html-file", value_name = "FILE")]
    pub html_file: Option<PathBuf>,
    #[arg(long = "css-file", value_name = "FILE")]
    pub css_file: Option<PathBuf>,
    #[arg(long = "js-file", value_name = "FILE")]
    pub js_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let args = Args::try_parse_from(["lower-thirds", "toggle", "lt-a", "-vv", "-c", "/cfg"]).unwrap();
        assert_eq!(args.verbosity, 2);
        assert_eq!(args.config_dir, Some(PathBuf::from("/cfg")));
        assert!(matches!(args.command, Some(Command::Toggle { ref id }) if id == "lt-a"));
    }

    #[test]
    fn parses_set_visible_and_edit() {
        let args = Args::try_parse_from(["lower-thirds", "set-visible", "lt-a", "false"]).unwrap();
        assert!(matches!(args.command, Some(Command::SetVisible { visible: false, .. })));

        let args = Args::try_parse_from([
            "lower-thirds", "edit", "lt-a", "--title", "Guest", "--anim-in", "custom:slide", "--repeat-every", "30",
        ])
        .unwrap();
        match args.command {
            Some(Command::Edit(edit)) => {
                assert_eq!(edit.title.as_deref(), Some("Guest"));
                assert_eq!(edit.anim_in.as_deref(), Some("custom:slide"));
                assert_eq!(edit.repeat_every_sec, Some(30));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn log_flag_with_and_without_file() {
        let args = Args::try_parse_from(["lower-thirds", "status", "-l"]).unwrap();
        assert_eq!(args.log_file, Some(None));
        let args = Args::try_parse_from(["lower-thirds", "--log=x.log", "status"]).unwrap();
        assert_eq!(args.log_file, Some(Some(PathBuf::from("x.log"))));
    }
}
