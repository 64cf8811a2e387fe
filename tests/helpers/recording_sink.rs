#![allow(dead_code)]
use procwatch::core::LogSink;
use std::sync::{Arc, Mutex};

/// A `LogSink` that keeps every message in memory.
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub snapshots: Arc<Mutex<Vec<String>>>,
    pub debug: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<String> {
        self.snapshots.lock().unwrap().clone()
    }

    pub fn debug_lines(&self) -> Vec<String> {
        self.debug.lock().unwrap().clone()
    }
}

impl LogSink for RecordingSink {
    fn write_snapshot(&mut self, block: &str) -> bool {
        self.snapshots.lock().unwrap().push(block.to_string());
        true
    }

    fn write_debug(&mut self, line: &str) -> bool {
        self.debug.lock().unwrap().push(line.to_string());
        true
    }
}
