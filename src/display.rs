//! Console rendering of each cycle's metrics.
//!
//! The display only reads the aggregated process list and the system
//! metrics; nothing it does feeds back into sampling or alerting.

use crate::core::{ProcessMetrics, SystemMetrics};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::io::{self, Write};

/// How much is printed per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum DisplayMode {
    /// A header line followed by one row per process.
    Line,
    /// A single summary line with the top three processes.
    Compact,
    /// Nothing is printed.
    Silent,
}

impl DisplayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayMode::Line => "Line",
            DisplayMode::Compact => "Compact",
            DisplayMode::Silent => "Silent",
        }
    }
}

/// The metric processes are ranked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortColumn {
    Cpu,
    Ram,
    Disk,
}

impl SortColumn {
    fn label(&self) -> &'static str {
        match self {
            SortColumn::Cpu => "CPU",
            SortColumn::Ram => "RAM",
            SortColumn::Disk => "Disk",
        }
    }

    fn value(&self, process: &ProcessMetrics) -> f64 {
        match self {
            SortColumn::Cpu => process.cpu_percent,
            SortColumn::Ram => process.ram_percent,
            SortColumn::Disk => process.disk_percent,
        }
    }
}

const COMPACT_TOP: usize = 3;
const NAME_WIDTH: usize = 24;
const COMPACT_NAME_WIDTH: usize = 12;

pub struct Display {
    mode: DisplayMode,
    sort: SortColumn,
    top: usize,
    out: Box<dyn Write + Send>,
}

impl Display {
    /// A display writing to stdout.
    pub fn new(mode: DisplayMode, sort: SortColumn, top: usize) -> Self {
        Self::with_writer(mode, sort, top, Box::new(io::stdout()))
    }

    pub fn with_writer(
        mode: DisplayMode,
        sort: SortColumn,
        top: usize,
        out: Box<dyn Write + Send>,
    ) -> Self {
        Self {
            mode,
            sort,
            top,
            out,
        }
    }

    pub fn set_sort(&mut self, sort: SortColumn) {
        self.sort = sort;
    }

    /// Prints one cycle. Write errors (e.g. a closed pipe) are returned to the caller.
    pub fn render(
        &mut self,
        system: &SystemMetrics,
        processes: &[ProcessMetrics],
    ) -> io::Result<()> {
        match self.mode {
            DisplayMode::Silent => Ok(()),
            DisplayMode::Line => {
                let text = render_line(system, &self.ranked(processes, self.top), self.sort);
                self.out.write_all(text.as_bytes())?;
                self.out.flush()
            }
            DisplayMode::Compact => {
                let top = self.top.min(COMPACT_TOP);
                let text = render_compact(system, &self.ranked(processes, top), self.sort);
                self.out.write_all(text.as_bytes())?;
                self.out.flush()
            }
        }
    }

    fn ranked<'a>(&self, processes: &'a [ProcessMetrics], limit: usize) -> Vec<&'a ProcessMetrics> {
        let mut sorted: Vec<&ProcessMetrics> = processes.iter().collect();
        sorted.sort_by(|a, b| {
            self.sort
                .value(b)
                .partial_cmp(&self.sort.value(a))
                .unwrap_or(Ordering::Equal)
                .then(a.pid.cmp(&b.pid))
        });
        sorted.truncate(limit);
        sorted
    }
}

fn render_line(system: &SystemMetrics, processes: &[&ProcessMetrics], sort: SortColumn) -> String {
    let mut text = format!(
        "\n=== System Monitor ===\nSystem Usage: CPU: {:.1}%, RAM: {:.1}%, Disk I/O: {:.1}%\n\nTop Processes by {} Usage:\n",
        system.cpu_percent,
        system.ram_percent,
        system.disk_percent,
        sort.label()
    );
    for p in processes {
        text.push_str(&format!(
            "{:<25} PID: {:<8} CPU: {:>5.1}% RAM: {:>5.1}% Disk: {:>5.1}%\n",
            truncate(&p.name, NAME_WIDTH),
            p.pid,
            p.cpu_percent,
            p.ram_percent,
            p.disk_percent
        ));
    }
    text
}

fn render_compact(
    system: &SystemMetrics,
    processes: &[&ProcessMetrics],
    sort: SortColumn,
) -> String {
    let leaders: Vec<String> = processes
        .iter()
        .map(|p| format!("{}({:.1}%)", truncate(&p.name, COMPACT_NAME_WIDTH), sort.value(p)))
        .collect();
    format!(
        "SYS: CPU:{:.1}% RAM:{:.1}% DISK:{:.1}% | {}\n",
        system.cpu_percent,
        system.ram_percent,
        system.disk_percent,
        leaders.join(", ")
    )
}

/// Shortens `name` to at most `width` characters, marking the cut with "...".
fn truncate(name: &str, width: usize) -> String {
    if name.chars().count() <= width {
        return name.to_string();
    }
    let kept: String = name.chars().take(width.saturating_sub(3)).collect();
    format!("{kept}...")
}
