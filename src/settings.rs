// Copyright 2016 Matthew Collins
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::world::Grid;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::convert;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Edge length of the renderer's grid-chunks, a power of two.
    pub chunk_size: u32,
    pub blocks: BlockMapping,
    /// Distance between the server's reported y and the player's feet.
    pub eye_height: f64,
    /// Added to the feet position to form the stance sent to the server.
    pub player_height: f64,
    /// The server expects a position update every tick (20 per second).
    pub position_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            chunk_size: 32,
            blocks: BlockMapping::default(),
            eye_height: 1.62,
            player_height: 1.74,
            position_interval_ms: 50,
        }
    }
}

impl Config {
    pub fn from_json(raw: &str) -> Result<Config, ConfigError> {
        let config: Config = serde_json::from_str(raw)?;
        config.grid()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Config::from_json(&raw)
    }

    pub fn grid(&self) -> Result<Grid, ConfigError> {
        Grid::new(self.chunk_size).ok_or(ConfigError::InvalidChunkSize(self.chunk_size))
    }

    pub fn position_interval(&self) -> Duration {
        Duration::from_millis(self.position_interval_ms)
    }
}

/// Source block id to target block name. Ids without an override map to
/// `default`, which must always be given.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockMapping {
    #[serde(default)]
    pub overrides: BTreeMap<u16, String>,
    pub default: String,
}

impl Default for BlockMapping {
    fn default() -> Self {
        // See http://minecraft.gamepedia.com/Data_values#Block_IDs
        let overrides = [
            (0, "air"),
            (1, "stone"),
            (2, "grass"),
            (3, "dirt"),
            (4, "cobblestone"),
            (5, "plankOak"),
            (7, "obsidian"), // bedrock
            (16, "oreCoal"),
            (17, "logOak"),
            (18, "leavesOak"),
            (161, "leavesOak"),
            (162, "logOak"),
        ]
        .iter()
        .map(|&(id, name)| (id, name.to_owned()))
        .collect();
        BlockMapping {
            overrides,
            default: "brick".to_owned(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidChunkSize(u32),
    UnknownBlock { source_id: Option<u16>, name: String },
    SourceIdOutOfRange(u16),
    IOError(io::Error),
    Json(serde_json::Error),
}

impl convert::From<io::Error> for ConfigError {
    fn from(e: io::Error) -> ConfigError {
        ConfigError::IOError(e)
    }
}

impl convert::From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> ConfigError {
        ConfigError::Json(e)
    }
}

impl ::std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn ::std::error::Error + 'static)> {
        match *self {
            ConfigError::IOError(ref e) => Some(e),
            ConfigError::Json(ref e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ConfigError::InvalidChunkSize(size) => {
                write!(f, "chunk size {} is not a power of two", size)
            }
            ConfigError::UnknownBlock {
                source_id: Some(id),
                ref name,
            } => write!(f, "unrecognized block name: {} for MC {}", name, id),
            ConfigError::UnknownBlock {
                source_id: None,
                ref name,
            } => write!(f, "unrecognized default block name: {}", name),
            ConfigError::SourceIdOutOfRange(id) => write!(f, "MC block id {} out of range", id),
            ConfigError::IOError(ref e) => e.fmt(f),
            ConfigError::Json(ref e) => e.fmt(f),
        }
    }
}
