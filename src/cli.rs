//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged over
//! the configuration from the `procwatch.toml` file and environment variables.

use crate::display::DisplayMode;
use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Host and process resource monitor with debounced email alerts.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// CPU threshold in percent.
    #[arg(long, value_name = "PCT")]
    pub cpu: Option<f64>,

    /// RAM threshold in percent.
    #[arg(long, value_name = "PCT")]
    pub ram: Option<f64>,

    /// Disk activity threshold in percent.
    #[arg(long, value_name = "PCT")]
    pub disk: Option<f64>,

    /// Monitor interval in milliseconds.
    #[arg(long, value_name = "MS")]
    pub interval: Option<u64>,

    /// Enable debug diagnostics.
    #[arg(long)]
    pub debug: bool,

    /// Console display mode.
    #[arg(long, value_enum, value_name = "MODE")]
    pub display: Option<DisplayMode>,

    /// Path of the process log file.
    #[arg(long, value_name = "FILE")]
    pub log_path: Option<PathBuf>,

    /// Queue a test email at startup.
    #[arg(long)]
    pub test_email: bool,
}

fn insert(dict: &mut Dict, section: &str, key: &str, value: Value) {
    let entry = dict
        .entry(section.to_string())
        .or_insert_with(|| Value::from(Dict::new()));
    if let Value::Dict(_, inner) = entry {
        inner.insert(key.to_string(), value);
    }
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(cpu) = self.cpu {
            insert(&mut dict, "monitor", "cpu_threshold", Value::from(cpu));
        }
        if let Some(ram) = self.ram {
            insert(&mut dict, "monitor", "ram_threshold", Value::from(ram));
        }
        if let Some(disk) = self.disk {
            insert(&mut dict, "monitor", "disk_threshold", Value::from(disk));
        }
        if let Some(interval) = self.interval {
            insert(&mut dict, "monitor", "interval_ms", Value::from(interval));
        }
        if let Some(mode) = self.display {
            insert(&mut dict, "display", "mode", Value::from(mode.as_str()));
        }
        if let Some(path) = &self.log_path {
            insert(
                &mut dict,
                "log",
                "path",
                Value::from(path.to_string_lossy().into_owned()),
            );
        }

        // A flag that is absent must not override a `debug = true` from the file.
        if self.debug {
            dict.insert("debug".into(), Value::from(true));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
