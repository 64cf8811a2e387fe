//! Scripted counter source for tests.

use crate::core::{CounterSource, CpuTimes, MemoryStatus, RawProcess};
use crate::sampling::SampleError;
use std::collections::VecDeque;

/// Builds a `RawProcess` with the given cumulative counters.
pub fn raw_process(
    pid: u32,
    ppid: u32,
    name: &str,
    cpu_time_ms: u64,
    memory_bytes: u64,
    io_bytes: u64,
) -> RawProcess {
    RawProcess {
        pid,
        ppid,
        name: name.to_string(),
        cpu_time_ms,
        memory_bytes,
        io_bytes,
    }
}

/// A `CounterSource` that replays scripted readings in order.
///
/// Once a script runs out, its last value is repeated.
pub struct ScriptedSource {
    cpu: VecDeque<CpuTimes>,
    memory: MemoryStatus,
    processes: VecDeque<Vec<RawProcess>>,
    fail_system_times: bool,
    fail_processes: bool,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            cpu: VecDeque::new(),
            memory: MemoryStatus {
                total_bytes: 1000,
                available_bytes: 500,
            },
            processes: VecDeque::new(),
            fail_system_times: false,
            fail_processes: false,
        }
    }

    pub fn with_cpu(mut self, readings: Vec<CpuTimes>) -> Self {
        self.cpu = readings.into();
        self
    }

    pub fn with_memory(mut self, memory: MemoryStatus) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_processes(mut self, readings: Vec<Vec<RawProcess>>) -> Self {
        self.processes = readings.into();
        self
    }

    pub fn failing_system_times(mut self) -> Self {
        self.fail_system_times = true;
        self
    }

    pub fn failing_processes(mut self) -> Self {
        self.fail_processes = true;
        self
    }

    fn next<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl Default for ScriptedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterSource for ScriptedSource {
    fn system_times(&mut self) -> Result<CpuTimes, SampleError> {
        if self.fail_system_times {
            return Err(SampleError::Query("scripted failure".to_string()));
        }
        Ok(Self::next(&mut self.cpu).unwrap_or_default())
    }

    fn memory_status(&mut self) -> Result<MemoryStatus, SampleError> {
        Ok(self.memory)
    }

    fn processes(&mut self) -> Result<Vec<RawProcess>, SampleError> {
        if self.fail_processes {
            return Err(SampleError::Query("scripted enumeration failure".to_string()));
        }
        Ok(Self::next(&mut self.processes).unwrap_or_default())
    }
}
