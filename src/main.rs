// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
mod chimes;
mod clock;
mod config;
mod engine;
mod gpio;
mod midi;
mod playlist;
mod session;
mod transport;

use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{crate_version, Parser, Subcommand};

use crate::config::Settings;
use crate::engine::Engine;
use crate::session::Session;

const SYSTEMD_SERVICE: &str = r#"
[Unit]
Description=chime player

[Service]
Type=simple
Restart=on-failure
EnvironmentFile=-/etc/default/carillon
ExecStart=/usr/local/bin/carillon start "$CARILLON_CONFIG"
ExecReload=/bin/kill -HUP $MAINPID

[Install]
WantedBy=multi-user.target
Alias=carillon.service
"#;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A MIDI chime player."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Caches and prints the playlist named by the config file.
    Playlist {
        /// The path to the player config.
        config_path: String,
    },
    /// Start will start the chime player.
    Start {
        /// The path to the player config.
        config_path: String,
    },
    /// Prints a systemd service definition to stdout.
    Systemd {},
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Playlist { config_path } => {
            let config_path = PathBuf::from(config_path);
            let settings = Settings::load(&config_path)?;
            let media_dir = config_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .to_path_buf();

            let source = playlist::resolve_in(&settings.play_url, &media_dir)?;
            let cache_path = media_dir.join("playlist.cache");
            playlist::cache(&source, &cache_path)?;
            println!("{}", playlist::Playlist::load(&cache_path)?);
        }
        Commands::Start { config_path } => {
            let engine = Engine::new(PathBuf::from(config_path));
            let mut session = Session::new(
                clock::SystemClock::new(),
                gpio::console::Gpio::new(),
                engine,
            );

            session.power_on();
            session.run();
        }
        Commands::Systemd {} => {
            println!("{}", SYSTEMD_SERVICE)
        }
    }

    Ok(())
}
