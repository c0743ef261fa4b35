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
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

/// Typed error for config load failures so callers can distinguish an
/// unreadable file from an incomplete one. Both are fatal to the player.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to read config file {path}: {source}")]
    Unreadable { path: PathBuf, source: io::Error },
    #[error("config file {path} has no playUrl entry")]
    MissingPlayUrl { path: PathBuf },
}

/// Player settings, read from a line-oriented `key=value` file. The keys are
/// fixed by the config format: `ssid`, `password` and `playUrl`.
#[derive(Debug)]
pub struct Settings {
    /// The network name, if one is configured. Unused for playback since
    /// network retrieval is unsupported, but parsed and retained.
    pub ssid: Option<String>,
    /// The network password, if one is configured.
    pub password: Option<String>,
    /// The location of the playlist. Required.
    pub play_url: String,
}

impl Settings {
    /// Loads settings from the given file. Unrecognized keys and malformed
    /// lines are skipped with a diagnostic; a missing file or a missing
    /// `playUrl` key is an error.
    pub fn load(path: &Path) -> Result<Settings, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        let mut ssid: Option<String> = None;
        let mut password: Option<String> = None;
        let mut play_url: Option<String> = None;

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (key, value) = match line.split_once('=') {
                Some(key_and_value) => key_and_value,
                None => {
                    warn!(line = line, "Skipping config line with no '=' separator.");
                    continue;
                }
            };

            match key.trim() {
                "ssid" => ssid = Some(value.trim().to_string()),
                "password" => password = Some(value.trim().to_string()),
                "playUrl" => play_url = Some(value.trim().to_string()),
                unknown => {
                    warn!(key = unknown, "Skipping unrecognized config key.");
                }
            }
        }

        match play_url {
            Some(play_url) => Ok(Settings {
                ssid,
                password,
                play_url,
            }),
            None => Err(ConfigError::MissingPlayUrl {
                path: path.to_path_buf(),
            }),
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;
    use std::path::PathBuf;

    use super::{ConfigError, Settings};

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("unable to create temp file");
        file.write_all(contents.as_bytes())
            .expect("unable to write temp file");
        file
    }

    #[test]
    fn test_load() {
        let file = write_config(
            "ssid=chimenet\npassword=hunter2\nplayUrl=file://playlist.txt\nvolume=11\n\nnot a pair\n",
        );

        let settings = Settings::load(file.path()).expect("config should load");
        assert_eq!(Some("chimenet".to_string()), settings.ssid);
        assert_eq!(Some("hunter2".to_string()), settings.password);
        assert_eq!("file://playlist.txt", settings.play_url);
    }

    #[test]
    fn test_play_url_is_required() {
        let file = write_config("ssid=chimenet\n");

        match Settings::load(file.path()) {
            Err(ConfigError::MissingPlayUrl { .. }) => {}
            other => panic!("expected MissingPlayUrl, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        match Settings::load(&PathBuf::from("/nonexistent/carillon.cfg")) {
            Err(ConfigError::Unreadable { .. }) => {}
            other => panic!("expected Unreadable, got {:?}", other),
        }
    }

    #[test]
    fn test_network_settings_are_optional() {
        let file = write_config("playUrl=playlist.txt\n");

        let settings = Settings::load(file.path()).expect("config should load");
        assert_eq!(None, settings.ssid);
        assert_eq!(None, settings.password);
        assert_eq!("playlist.txt", settings.play_url);
    }
}
