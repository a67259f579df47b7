//! Command-line entry point: build the built-in galaxy or project one sample.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use soundromeda::config::{self, LayoutConfig};
use soundromeda::logging::{self, LogOptions};
use soundromeda::{
    BuiltinRequest, FeatureExtractor, ProjectError, build_builtin_library, collect_audio_files,
    project_sample,
};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_args(args) {
        Ok(Some(command)) => command,
        Ok(None) => return ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(1);
        }
    };
    init_logging(command.verbose());
    match command {
        Command::Build(options) => match run_build(&options) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                tracing::error!("{err}");
                ExitCode::from(1)
            }
        },
        Command::Project(options) => run_project(&options),
    }
}

fn init_logging(verbose: bool) {
    if let Err(err) = logging::init(&LogOptions {
        verbose,
        log_dir: None,
    }) {
        logging::init_console_only(verbose);
        tracing::warn!("File logging disabled: {err}");
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Build(BuildOptions),
    Project(ProjectOptions),
}

impl Command {
    fn verbose(&self) -> bool {
        match self {
            Command::Build(options) => options.verbose,
            Command::Project(options) => options.verbose,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct BuildOptions {
    dir: Option<PathBuf>,
    files: Vec<PathBuf>,
    meta: Option<PathBuf>,
    model: Option<PathBuf>,
    no_model: bool,
    base_audio: Option<String>,
    audio_root: Option<PathBuf>,
    config: Option<PathBuf>,
    neighbors: Option<usize>,
    min_dist: Option<f32>,
    seed: Option<u64>,
    workers: Option<usize>,
    verbose: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct ProjectOptions {
    file: PathBuf,
    model: Option<PathBuf>,
    config: Option<PathBuf>,
    verbose: bool,
}

fn parse_args(args: Vec<String>) -> Result<Option<Command>, String> {
    let Some((command, rest)) = args.split_first() else {
        return Err(help_text());
    };
    match command.as_str() {
        "-h" | "--help" | "help" => {
            println!("{}", help_text());
            Ok(None)
        }
        "build" => Ok(parse_build(rest)?.map(Command::Build)),
        "project" => Ok(parse_project(rest)?.map(Command::Project)),
        unknown => Err(format!("Unknown command: {unknown}\n\n{}", help_text())),
    }
}

fn take_value<'a>(args: &'a [String], idx: &mut usize, flag: &str) -> Result<&'a str, String> {
    *idx += 1;
    args.get(*idx)
        .map(String::as_str)
        .ok_or_else(|| format!("{flag} requires a value"))
}

fn parse_number<T: std::str::FromStr>(value: &str, flag: &str) -> Result<T, String> {
    value
        .parse::<T>()
        .map_err(|_| format!("Invalid {flag} value: {value}"))
}

fn parse_build(args: &[String]) -> Result<Option<BuildOptions>, String> {
    let mut options = BuildOptions::default();
    let mut collecting_files = false;
    let mut idx = 0usize;
    while idx < args.len() {
        let arg = args[idx].as_str();
        if collecting_files && !arg.starts_with('-') {
            options.files.push(PathBuf::from(arg));
            idx += 1;
            continue;
        }
        collecting_files = false;
        match arg {
            "-h" | "--help" => {
                println!("{}", help_text());
                return Ok(None);
            }
            "-v" | "--verbose" => options.verbose = true,
            "--files" => collecting_files = true,
            "--meta" => options.meta = Some(take_value(args, &mut idx, arg)?.into()),
            "--model" => options.model = Some(take_value(args, &mut idx, arg)?.into()),
            "--no-model" => options.no_model = true,
            "--base-audio" => {
                options.base_audio = Some(take_value(args, &mut idx, arg)?.to_string());
            }
            "--audio-root" => options.audio_root = Some(take_value(args, &mut idx, arg)?.into()),
            "--config" => options.config = Some(take_value(args, &mut idx, arg)?.into()),
            "--neighbors" => {
                options.neighbors = Some(parse_number(take_value(args, &mut idx, arg)?, arg)?);
            }
            "--min-dist" => {
                options.min_dist = Some(parse_number(take_value(args, &mut idx, arg)?, arg)?);
            }
            "--seed" => options.seed = Some(parse_number(take_value(args, &mut idx, arg)?, arg)?),
            "--workers" => {
                options.workers = Some(parse_number(take_value(args, &mut idx, arg)?, arg)?);
            }
            unknown if unknown.starts_with('-') => {
                return Err(format!("Unknown argument: {unknown}\n\n{}", help_text()));
            }
            dir => {
                if options.dir.is_some() {
                    return Err(format!("Unexpected extra directory: {dir}"));
                }
                options.dir = Some(PathBuf::from(dir));
            }
        }
        idx += 1;
    }
    if options.dir.is_some() && !options.files.is_empty() {
        return Err("Pass either a directory or --files, not both".to_string());
    }
    if options.no_model && options.model.is_some() {
        return Err("--model and --no-model are mutually exclusive".to_string());
    }
    Ok(Some(options))
}

fn parse_project(args: &[String]) -> Result<Option<ProjectOptions>, String> {
    let mut file = None;
    let mut options = ProjectOptions::default();
    let mut idx = 0usize;
    while idx < args.len() {
        let arg = args[idx].as_str();
        match arg {
            "-h" | "--help" => {
                println!("{}", help_text());
                return Ok(None);
            }
            "-v" | "--verbose" => options.verbose = true,
            "--model" => options.model = Some(take_value(args, &mut idx, arg)?.into()),
            "--config" => options.config = Some(take_value(args, &mut idx, arg)?.into()),
            unknown if unknown.starts_with('-') => {
                return Err(format!("Unknown argument: {unknown}\n\n{}", help_text()));
            }
            path => {
                if file.is_some() {
                    return Err(format!("Unexpected extra file: {path}"));
                }
                file = Some(PathBuf::from(path));
            }
        }
        idx += 1;
    }
    options.file = file.ok_or_else(|| "project requires an audio file".to_string())?;
    Ok(Some(options))
}

fn help_text() -> String {
    [
        "soundromeda",
        "",
        "Lay out an audio corpus on the galaxy map and place new samples on it.",
        "",
        "Usage:",
        "  soundromeda build [DIR] [options]",
        "  soundromeda build --files <file>... [options]",
        "  soundromeda project <file> [--model <path>] [--config <path>]",
        "",
        "Build options:",
        "  --meta <path>         Metadata JSON to write (default from config).",
        "  --model <path>        Placement model to write (default from config).",
        "  --no-model            Do not persist a placement model.",
        "  --base-audio <prefix> Prefix for every audio_path (default from config).",
        "  --audio-root <dir>    Keep subdirectories relative to this root in audio_path.",
        "  --neighbors <n>       Neighborhood size for the layout.",
        "  --min-dist <f>        Minimum distance between embedded points.",
        "  --seed <u64>          Seed for deterministic layouts.",
        "  --workers <n>         Feature extraction workers (default: one per core).",
        "",
        "Common options:",
        "  --config <path>       Config TOML (defaults to the app data location).",
        "  -v, --verbose         Log at debug level unless RUST_LOG is set.",
        "",
        "project prints the coordinate as JSON; exit code 2 means no model exists yet.",
    ]
    .join("\n")
}

fn load_config(path: Option<&Path>) -> Result<LayoutConfig, String> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match config::config_path() {
            Ok(path) => path,
            Err(err) => {
                tracing::warn!("Using default configuration: {err}");
                return Ok(LayoutConfig::default());
            }
        },
    };
    config::load_or_default(&path).map_err(|err| err.to_string())
}

fn run_build(options: &BuildOptions) -> Result<(), String> {
    let mut config = load_config(options.config.as_deref())?;
    if let Some(neighbors) = options.neighbors {
        config.layout.n_neighbors = neighbors;
    }
    if let Some(min_dist) = options.min_dist {
        config.layout.min_dist = min_dist;
    }
    if let Some(seed) = options.seed {
        config.layout.seed = seed;
    }
    if let Some(workers) = options.workers {
        config.layout.worker_count = workers;
    }

    let (files, audio_root) = if options.files.is_empty() {
        let dir = options.dir.clone().unwrap_or_else(|| PathBuf::from("."));
        let files = collect_audio_files(&dir).map_err(|err| err.to_string())?;
        let root = options.audio_root.clone().unwrap_or(dir);
        (files, Some(root))
    } else {
        (options.files.clone(), options.audio_root.clone())
    };
    if files.is_empty() {
        return Err("No audio files found".to_string());
    }

    let request = BuiltinRequest {
        files,
        meta_path: options.meta.clone().unwrap_or_else(|| config.paths.meta.clone()),
        model_path: if options.no_model {
            None
        } else {
            Some(options.model.clone().unwrap_or_else(|| config.paths.model.clone()))
        },
        base_audio_path: options
            .base_audio
            .clone()
            .unwrap_or_else(|| config.paths.base_audio_path.clone()),
        audio_root,
    };
    let extractor = FeatureExtractor::new(config.extractor.clone()).map_err(|err| err.to_string())?;
    let summary = build_builtin_library(&request, &extractor, &config.layout_options(3))
        .map_err(|err| err.to_string())?;

    println!(
        "Wrote {} points to {}",
        summary.points,
        summary.meta_path.display()
    );
    if let Some(model) = &summary.model_path {
        println!("Wrote placement model to {}", model.display());
    }
    if let Some(stale) = &summary.removed_model {
        println!(
            "Removed stale placement model {}; too few usable files to fit a new one",
            stale.display()
        );
    }
    if !summary.skipped.is_empty() {
        println!("Skipped {} files:", summary.skipped.len());
        for skipped in &summary.skipped {
            println!("  {}: {}", skipped.path.display(), skipped.reason);
        }
    }
    Ok(())
}

fn run_project(options: &ProjectOptions) -> ExitCode {
    let config = match load_config(options.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("{err}");
            return ExitCode::from(1);
        }
    };
    match project_sample(&options.file, options.model.as_deref(), &config) {
        Ok(coords) => match serde_json::to_string(&coords) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                tracing::error!("Failed to encode coordinates: {err}");
                ExitCode::from(1)
            }
        },
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::from(project_exit_code(&err))
        }
    }
}

fn project_exit_code(err: &ProjectError) -> u8 {
    match err {
        ProjectError::NoModel { .. } => 2,
        ProjectError::TransformFailed { .. } => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn build_parses_directory_and_overrides() {
        let command = parse_args(args(&[
            "build",
            "samples",
            "--meta",
            "out/builtin.json",
            "--neighbors",
            "8",
            "--min-dist",
            "0.25",
            "--seed",
            "7",
            "--workers",
            "2",
        ]))
        .unwrap()
        .unwrap();
        let Command::Build(options) = command else {
            panic!("expected build command");
        };
        assert_eq!(options.dir, Some(PathBuf::from("samples")));
        assert_eq!(options.meta, Some(PathBuf::from("out/builtin.json")));
        assert_eq!(options.neighbors, Some(8));
        assert_eq!(options.min_dist, Some(0.25));
        assert_eq!(options.seed, Some(7));
        assert_eq!(options.workers, Some(2));
        assert!(!options.no_model);
    }

    #[test]
    fn build_collects_explicit_files_until_next_flag() {
        let command = parse_args(args(&["build", "--files", "a.wav", "b.mp3", "--no-model"]))
            .unwrap()
            .unwrap();
        let Command::Build(options) = command else {
            panic!("expected build command");
        };
        assert_eq!(
            options.files,
            vec![PathBuf::from("a.wav"), PathBuf::from("b.mp3")]
        );
        assert!(options.no_model);
        assert_eq!(options.dir, None);
    }

    #[test]
    fn build_rejects_conflicting_inputs() {
        assert!(parse_args(args(&["build", "dir", "--files", "a.wav"])).is_err());
        assert!(parse_args(args(&["build", "--model", "m.json", "--no-model"])).is_err());
        assert!(parse_args(args(&["build", "--seed", "abc"])).is_err());
        assert!(parse_args(args(&["build", "--meta"])).is_err());
    }

    #[test]
    fn project_requires_a_file() {
        assert!(parse_args(args(&["project"])).is_err());
        let command = parse_args(args(&["project", "kick.wav", "--model", "m.json"]))
            .unwrap()
            .unwrap();
        assert_eq!(
            command,
            Command::Project(ProjectOptions {
                file: PathBuf::from("kick.wav"),
                model: Some(PathBuf::from("m.json")),
                config: None,
                verbose: false,
            })
        );
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(parse_args(args(&["serve"])).is_err());
        assert!(parse_args(Vec::new()).is_err());
    }

    #[test]
    fn missing_model_maps_to_exit_code_two() {
        let err = ProjectError::NoModel {
            path: PathBuf::from("absent.json"),
        };
        assert_eq!(project_exit_code(&err), 2);
    }
}
