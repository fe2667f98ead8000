//! Provenance record written next to an output raster.
//!
//! The record is a plain text sidecar, `<output>.hist`, with one
//! `KEY: value` line per field.

use crate::error::{RasterError, Result};
use log::debug;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const MAP_TYPE_RASTER: &str = "raster";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    pub map_name: String,
    pub map_type: String,
    pub creator: String,
    /// Creation time, seconds since the unix epoch
    pub created: u64,
    pub data_source: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub command: String,
}

/// Path of the history sidecar for a raster
pub fn sidecar_path(raster: &Path) -> PathBuf {
    let mut name = OsString::from(raster.as_os_str());
    name.push(".hist");
    PathBuf::from(name)
}

fn map_name(path: &Path) -> String {
    path.file_stem()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .into_owned()
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

impl History {
    /// Short history for a raster produced from `input` by `command`
    pub fn for_output(output: &Path, input: &Path, command: &str) -> Self {
        let created = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        Self {
            map_name: map_name(output),
            map_type: MAP_TYPE_RASTER.to_string(),
            creator: current_user(),
            created,
            data_source: input.display().to_string(),
            description: format!("Cell values of <{}> multiplied by 2", map_name(input)),
            keywords: vec!["raster".to_string(), "example".to_string()],
            command: command.to_string(),
        }
    }

    pub fn to_text(&self) -> String {
        self.to_string()
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut history = History {
            map_name: String::new(),
            map_type: String::new(),
            creator: String::new(),
            created: 0,
            data_source: String::new(),
            description: String::new(),
            keywords: Vec::new(),
            command: String::new(),
        };
        let mut seen_id = false;

        for (lineno, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (key, value) = line.split_once(':').ok_or_else(|| {
                RasterError::InvalidHistory(format!("line {}: missing ':'", lineno + 1))
            })?;
            let value = value.trim();

            match key.trim() {
                "MAPID" => {
                    history.map_name = value.to_string();
                    seen_id = true;
                }
                "MAPTYPE" => history.map_type = value.to_string(),
                "CREATOR" => history.creator = value.to_string(),
                "CREATED" => {
                    history.created = value.parse().map_err(|_| {
                        RasterError::InvalidHistory(format!(
                            "line {}: bad timestamp '{}'",
                            lineno + 1,
                            value
                        ))
                    })?
                }
                "DATSRC" => history.data_source = value.to_string(),
                "DESCRIPTION" => history.description = value.to_string(),
                "KEYWORDS" => {
                    history.keywords = value
                        .split(',')
                        .map(str::trim)
                        .filter(|k| !k.is_empty())
                        .map(String::from)
                        .collect()
                }
                "COMMAND" => history.command = value.to_string(),
                other => debug!("Ignoring unknown history key '{}'", other),
            }
        }

        if !seen_id {
            return Err(RasterError::InvalidHistory("missing MAPID".to_string()));
        }
        Ok(history)
    }

    /// Attach this record to the raster at `raster`
    pub fn write(&self, raster: &Path) -> Result<PathBuf> {
        let path = sidecar_path(raster);
        fs::write(&path, self.to_text())?;
        debug!("Wrote history: {}", path.display());
        Ok(path)
    }

    /// Load the record attached to the raster at `raster`
    pub fn read(raster: &Path) -> Result<Self> {
        Self::parse(&fs::read_to_string(sidecar_path(raster))?)
    }
}

impl fmt::Display for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "MAPID: {}", self.map_name)?;
        writeln!(f, "MAPTYPE: {}", self.map_type)?;
        writeln!(f, "CREATOR: {}", self.creator)?;
        writeln!(f, "CREATED: {}", self.created)?;
        writeln!(f, "DATSRC: {}", self.data_source)?;
        writeln!(f, "DESCRIPTION: {}", self.description)?;
        writeln!(f, "KEYWORDS: {}", self.keywords.join(","))?;
        writeln!(f, "COMMAND: {}", self.command)
    }
}
