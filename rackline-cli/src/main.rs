//! `rackline`: create, inspect and re-route project files from the shell.

use std::error::Error;
use std::fs::File;
use std::path::Path;
use std::process::ExitCode;
use std::rc::Rc;
use std::sync::Arc;

use rackline_audio::{BuiltinFactory, PluginFactory, ProcessGraph};
use rackline_core::config::Config;
use rackline_core::devices::{DeviceKind, StaticDevices};
use rackline_core::persistence::{load_project, save_project};
use rackline_core::project::{Host, Project};
use rackline_types::{props, ProjectView};

const USAGE: &str = "\
usage: rackline [--verbose] <command> [args]

commands:
  new <file> [--name NAME] [--tracks N]   create a project with a master and N tracks
  info <file>                             list tracks, processors and connections
  route <file> [--reset-inputs]           bring default routing up to date
  add <file> <track> <plugin> [slot]      add a processor (track by index or uuid)
  plugins                                 list known plugin identifiers";

/// Flags that take a value.
const VALUE_FLAGS: [&str; 2] = ["--name", "--tracks"];

fn init_logging(verbose: bool) {
    use simplelog::{LevelFilter, WriteLogger};

    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };

    let log_path = dirs::config_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("rackline")
        .join("rackline.log");

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = match File::create(&log_path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("rackline: cannot open {}: {}", log_path.display(), e);
            return;
        }
    };

    if WriteLogger::init(log_level, simplelog::Config::default(), log_file).is_err() {
        eprintln!("rackline: logger already initialized");
        return;
    }

    log::info!("rackline starting (log level: {:?})", log_level);
}

fn option<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// Arguments that are neither flags nor flag values.
fn positionals(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut skip = false;
    for arg in args {
        if skip {
            skip = false;
        } else if VALUE_FLAGS.contains(&arg.as_str()) {
            skip = true;
        } else if !arg.starts_with('-') {
            out.push(arg.as_str());
        }
    }
    out
}

/// Devices a headless session pretends to have.
fn system_devices() -> StaticDevices {
    StaticDevices::new()
        .with(DeviceKind::AudioInput, "System Input")
        .with(DeviceKind::AudioOutput, "System Output")
        .with(DeviceKind::MidiInput, "MIDI Keyboard")
}

fn host(devices: StaticDevices) -> Host {
    Host {
        graph: Arc::new(ProcessGraph::new()),
        factory: Rc::new(BuiltinFactory::new()),
        devices: Box::new(devices),
    }
}

fn open(path: &Path, config: &Config) -> Result<Project, Box<dyn Error>> {
    let mut devices = system_devices();
    let loaded = load_project(path, &mut devices)?;
    for warning in &loaded.warnings {
        eprintln!("warning: {}", warning);
    }
    Ok(Project::open(loaded.tree, host(devices), config)?)
}

fn cmd_new(path: &Path, name: &str, tracks: usize, config: &Config) -> Result<(), Box<dyn Error>> {
    let mut project = Project::new(name, host(system_devices()), config)?;
    project
        .create_track("Master", true)
        .ok_or("could not create the master track")?;
    let mut first = None;
    for n in 1..=tracks {
        let uuid = project
            .create_track(&format!("Track {}", n), false)
            .ok_or("could not create a track")?;
        first.get_or_insert(uuid);
    }
    if let Some(uuid) = first {
        project.focus_track(&uuid);
        project.reset_external_inputs();
    }
    save_project(path, &mut project)?;
    let connections = project.view().map(|p| p.connections().len()).unwrap_or(0);
    println!(
        "created {} ({} tracks, {} connections)",
        path.display(),
        tracks + 1,
        connections
    );
    Ok(())
}

fn cmd_info(path: &Path) -> Result<(), Box<dyn Error>> {
    let mut devices = system_devices();
    let loaded = load_project(path, &mut devices)?;
    for warning in &loaded.warnings {
        println!("warning: {}", warning);
    }
    let project = ProjectView::wrap(&loaded.tree).ok_or("not a project")?;
    let version = project
        .tree()
        .get_int(project.tree().root(), props::PROJECT_VERSION)
        .unwrap_or(0);
    println!("{} (layout {})", project.name(), version);

    for (index, track) in project.tracks().iter().enumerate() {
        let marker = if track.is_master() { " [master]" } else { "" };
        println!("track {}: {}{}  {}", index, track.name(), marker, track.uuid());
        for processor in track.all_processors() {
            let id = processor
                .node_id()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string());
            let bypass = if processor.is_bypassed() { " (bypassed)" } else { "" };
            println!(
                "  slot {:>2}  #{:<4} {}{}",
                processor.slot(),
                id,
                processor.identifier(),
                bypass
            );
        }
    }

    let connections = project.connections();
    println!("{} connections", connections.len());
    for connection in connections {
        let kind = if connection.is_custom() { "custom" } else { "default" };
        println!("  {}  {}", connection.edge(), kind);
    }
    Ok(())
}

fn cmd_route(path: &Path, reset: bool, config: &Config) -> Result<(), Box<dyn Error>> {
    let mut project = open(path, config)?;
    let changed = if reset {
        project.reset_external_inputs()
    } else {
        project.update_routing()
    };
    if !changed {
        println!("routing already current");
        return Ok(());
    }
    save_project(path, &mut project)?;
    let connections = project.view().map(|p| p.connections().len()).unwrap_or(0);
    println!("routing updated ({} connections)", connections);
    Ok(())
}

fn cmd_add(
    path: &Path,
    track: &str,
    identifier: &str,
    slot: u32,
    config: &Config,
) -> Result<(), Box<dyn Error>> {
    let mut project = open(path, config)?;
    let uuid = {
        let view = project.view().ok_or("not a project")?;
        let found = match track.parse::<usize>() {
            Ok(index) => view.tracks().get(index).map(|t| t.uuid().to_string()),
            Err(_) => view.track_by_uuid(track).map(|t| t.uuid().to_string()),
        };
        found.ok_or_else(|| format!("no track '{}'", track))?
    };
    let id = project
        .add_processor(&uuid, identifier, slot)
        .ok_or_else(|| format!("could not add '{}'", identifier))?;
    save_project(path, &mut project)?;
    println!("added {} as #{}", identifier, id);
    Ok(())
}

fn run(args: &[String]) -> Result<(), Box<dyn Error>> {
    let config = Config::load();
    let positional = positionals(args);
    match positional.as_slice() {
        ["new", file] => {
            let name = option(args, "--name").unwrap_or("Untitled");
            let tracks = match option(args, "--tracks") {
                Some(n) => n.parse().map_err(|_| format!("bad track count '{}'", n))?,
                None => 1,
            };
            cmd_new(Path::new(file), name, tracks, &config)
        }
        ["info", file] => cmd_info(Path::new(file)),
        ["route", file] => {
            let reset = args.iter().any(|a| a == "--reset-inputs");
            cmd_route(Path::new(file), reset, &config)
        }
        ["add", file, track, identifier] => {
            cmd_add(Path::new(file), track, identifier, 0, &config)
        }
        ["add", file, track, identifier, slot] => {
            let slot = slot.parse().map_err(|_| format!("bad slot '{}'", slot))?;
            cmd_add(Path::new(file), track, identifier, slot, &config)
        }
        ["plugins"] => {
            for identifier in BuiltinFactory::new().identifiers() {
                println!("{}", identifier);
            }
            Ok(())
        }
        _ => Err(USAGE.into()),
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let verbose = args.iter().any(|a| a == "--verbose" || a == "-v");
    init_logging(verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
