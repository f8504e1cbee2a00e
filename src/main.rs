// SPDX-License-Identifier: GPL-3.0-only

use barcode_camera::config::Config;
use barcode_camera::constants::app_info;
use barcode_camera::permission::PermissionBackend;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "barcode-camera")]
#[command(about = "Live camera barcode scanner that zooms in when a code is in view")]
#[command(version = app_info::version())]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Camera index (from 'barcode-camera list') or device path
    #[arg(long, global = true)]
    camera: Option<String>,

    /// Clockwise sensor rotation in degrees (0, 90, 180, 270)
    #[arg(long, global = true)]
    rotation: Option<i32>,

    /// Config file (default: ~/.config/barcode-camera/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// How camera access is requested: auto, portal or device
    #[arg(long, global = true, value_parser = parse_permission)]
    permission: Option<PermissionBackend>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the camera in the terminal and scan (default)
    Preview,

    /// Scan without a preview, printing every decoded barcode
    Scan {
        /// Stop after this many seconds (default: until Ctrl+C)
        #[arg(short, long)]
        duration: Option<u64>,
    },

    /// Run image files or directories through the scanner
    Decode {
        /// Images or directories of images
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },

    /// List available cameras
    List,

    /// Print the effective configuration
    Config {
        /// Also write it to the config file
        #[arg(long)]
        save: bool,
    },
}

fn parse_permission(value: &str) -> Result<PermissionBackend, String> {
    PermissionBackend::parse(value)
        .ok_or_else(|| format!("unknown permission backend '{}' (auto, portal, device)", value))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let in_terminal = matches!(cli.command, None | Some(Commands::Preview));
    cli::init_logging(in_terminal)?;

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(camera) = cli.camera {
        config.camera = Some(camera);
    }
    if let Some(rotation) = cli.rotation {
        config.rotation = rotation;
    }
    if let Some(permission) = cli.permission {
        config.permission = permission;
    }

    match cli.command {
        None | Some(Commands::Preview) => cli::preview(config),
        Some(Commands::Scan { duration }) => cli::scan(config, duration),
        Some(Commands::Decode { images }) => cli::decode(config, images),
        Some(Commands::List) => cli::list_cameras(),
        Some(Commands::Config { save }) => cli::show_config(&config, save, cli.config),
    }
}
