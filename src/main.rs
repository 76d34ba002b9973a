use lower_thirds::cli::{Args, Command, EditArgs};
use lower_thirds::config;
use lower_thirds::core::Coordinator;
use lower_thirds::core::surface::{RenderSurface, SceneFileSurface};
use lower_thirds::entities::keys::{CONFIG_FILE, LOG_FILE, SCENE_FILE};
use lower_thirds::entities::{AnimSelector, LtPosition, OverlayId};
use lower_thirds::server::{SharedApiState, VendorBridge};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{debug, info};
use std::path::Path;
use std::sync::Arc;

fn main() -> Result<()> {
    // Parse command-line arguments first (needed for log setup)
    let args = Args::parse();

    // Create path configuration from CLI args and environment
    let path_config = config::PathConfig::from_env_and_cli(args.config_dir.clone());

    // Ensure directories exist
    if let Err(e) = config::ensure_dirs(&path_config) {
        eprintln!("Warning: Failed to create application directories: {}", e);
    }

    // Determine log level based on verbosity flags
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    // Initialize logger based on --log flag
    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .as_ref()
            .cloned()
            .unwrap_or_else(|| config::data_file(LOG_FILE, &path_config));

        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging with specified verbosity level (respects RUST_LOG if set)
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };

        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }

    debug!("Command-line args: {:?}", args);

    let config_path = config::config_file(CONFIG_FILE, &path_config);
    let scene_path = args
        .scene_file
        .clone()
        .unwrap_or_else(|| config::data_file(SCENE_FILE, &path_config));
    info!("Config path: {}", config_path.display());

    let mut coord = Coordinator::open(config_path, SceneFileSurface::new(scene_path));
    info!("Scene path: {}", coord.surface().path().display());

    match args.command {
        Some(cmd) => run(&mut coord, cmd),
        None => {
            print_status(&coord);
            Ok(())
        }
    }
}

fn run<S: RenderSurface>(coord: &mut Coordinator<S>, cmd: Command) -> Result<()> {
    match cmd {
        Command::Status => print_status(coord),
        Command::SetDir { dir } => {
            let published = coord.set_output_dir(&dir)?;
            println!("Output directory: {}", dir.display());
            println!("Published: {}", published.display());
        }
        Command::List => {
            for o in coord.all() {
                let mark = if coord.is_visible(&o.id) { "*" } else { " " };
                println!("{} {}  [{}]  {} / {}", mark, o.id, o.position.label(), o.title, o.subtitle);
            }
        }
        Command::Add => println!("{}", coord.add()?),
        Command::Clone { id } => println!("{}", coord.clone_overlay(&OverlayId::from(id))?),
        Command::Remove { id } => {
            let removed = coord.remove(&OverlayId::from(id))?;
            println!("Removed {} ({})", removed.id, removed.title);
        }
        Command::Show { id } => {
            let overlay = coord.get(&OverlayId::from(id))?;
            println!("{}", serde_json::to_string_pretty(overlay)?);
        }
        Command::Toggle { id } => {
            let visible = coord.toggle(&OverlayId::from(id))?;
            println!("{}", if visible { "visible" } else { "hidden" });
        }
        Command::SetVisible { id, visible } => coord.set_visible(&OverlayId::from(id), visible)?,
        Command::ShowOnly { id } => coord.show_exclusive(&OverlayId::from(id))?,
        Command::Edit(edit) => apply_edit(coord, edit)?,
        Command::ImportImage { id, path } => {
            let name = coord.import_profile_image(&OverlayId::from(id), &path)?;
            println!("{}", name);
        }
        Command::EnsureSource => {
            let created = coord.ensure_source()?;
            println!("{}", if created { "created" } else { "already present" });
        }
        Command::Rebuild => println!("{}", coord.rebuild()?.display()),
        Command::Request { request_type, data } => {
            let data: serde_json::Value =
                serde_json::from_str(&data).with_context(|| format!("Invalid request JSON: {}", data))?;
            let state = Arc::new(SharedApiState::default());
            coord.attach_api_state(Arc::clone(&state));
            let (bridge, rx) = VendorBridge::new(state);
            let response = bridge.handle(&request_type, &data);
            coord.drain_commands(&rx);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }
    Ok(())
}

fn read_template(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read template: {}", path.display()))
}

fn apply_edit<S: RenderSurface>(coord: &mut Coordinator<S>, edit: EditArgs) -> Result<()> {
    let mut overlay = coord.get(&OverlayId::from(edit.id.as_str()))?.clone();

    if let Some(v) = edit.title {
        overlay.title = v;
    }
    if let Some(v) = edit.subtitle {
        overlay.subtitle = v;
    }
    if let Some(v) = edit.anim_in {
        overlay.anim_in = AnimSelector::parse(&v);
    }
    if let Some(v) = edit.anim_out {
        overlay.anim_out = AnimSelector::parse(&v);
    }
    if let Some(v) = edit.font {
        overlay.font_family = v;
    }
    if let Some(v) = edit.position {
        overlay.position = match LtPosition::from_class(&v) {
            Some(p) => p,
            None => bail!("Unknown position '{}'", v),
        };
    }
    if let Some(v) = edit.bg_color {
        overlay.bg_color = v;
    }
    if let Some(v) = edit.text_color {
        overlay.text_color = v;
    }
    if let Some(v) = edit.hotkey {
        overlay.hotkey = if v.is_empty() { None } else { Some(v) };
    }
    if let Some(v) = edit.repeat_every_sec {
        overlay.repeat_every_sec = v;
    }
    if let Some(v) = edit.repeat_visible_sec {
        overlay.repeat_visible_sec = v;
    }
    if let Some(p) = edit.html_file {
        overlay.html_template = read_template(&p)?;
    }
    if let Some(p) = edit.css_file {
        overlay.css_template = read_template(&p)?;
    }
    if let Some(p) = edit.js_file {
        overlay.js_template = read_template(&p)?;
    }

    coord.save(overlay)?;
    Ok(())
}

fn print_status<S: RenderSurface>(coord: &Coordinator<S>) {
    match coord.output_dir() {
        Some(dir) => println!("Output directory: {}", dir.display()),
        None => println!("Output directory: (not set, use `set-dir <DIR>`)"),
    }
    println!("Overlays: {}", coord.store().len());
    match coord.current_artifact() {
        Some(p) => println!("Current artifact: {}", p.display()),
        None => println!("Current artifact: (none)"),
    }
}
