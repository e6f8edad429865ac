use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use launcher_updater::config::CONFIG_FILE;
use launcher_updater::locale::{self, Label, Lang};
use launcher_updater::{check_for_updates, game, logging, LauncherConfig, LauncherPaths, Status};

#[derive(Parser, Debug)]
#[command(version, about = "Checks for updates, then starts the game client")]
struct Args {
    /// Directory holding launcher.json and the system bundle (defaults to the executable's folder)
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// Config file (defaults to <base-dir>/launcher.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Status language: es or en
    #[arg(long, default_value = "es")]
    lang: Lang,

    /// Start the game once the client is up to date
    #[arg(long)]
    play: bool,
}

fn default_base_dir() -> Result<PathBuf> {
    //the executable's folder, not the working directory the launcher was started from
    let exe = std::env::current_exe().context("could not locate the launcher executable")?;
    Ok(exe
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(".")))
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let base_dir = match args.base_dir {
        Some(dir) => dir,
        None => default_base_dir()?,
    };
    let config_path = args.config.unwrap_or_else(|| base_dir.join(CONFIG_FILE));
    let config = LauncherConfig::load(&config_path)?;
    let paths = LauncherPaths::new(&base_dir, &config);

    logging::init(&paths.log_dir());
    tracing::info!(
        "{} v{} starting in {}",
        config.title,
        config.launcher_version,
        base_dir.display()
    );
    if !config.title.is_empty() {
        println!("{}", config.title);
    }

    let lang = args.lang;
    let mut print_status = |status: &Status| {
        let text = locale::render(status, lang);
        if status.is_error() {
            eprintln!("[ERROR] {}", text);
        } else {
            println!("[INFO] {}", text);
        }
    };
    let report = check_for_updates(&config, &paths, &mut print_status);

    if report.restart_requested {
        tracing::info!("exiting so the launcher can be replaced");
        return Ok(ExitCode::SUCCESS);
    }
    if !report.outcome.allows_play() {
        eprintln!("{}", locale::label(Label::UpdateFailed, lang));
        return Ok(ExitCode::FAILURE);
    }

    println!("{}", locale::label(Label::Ready, lang));
    if args.play {
        println!("{}", locale::label(Label::Play, lang));
        game::start(&config, &paths).context("could not start the game")?;
    }
    Ok(ExitCode::SUCCESS)
}
