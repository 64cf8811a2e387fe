#![allow(dead_code)]
pub mod mock_transport;
pub mod recording_sink;

use procwatch::core::{CpuTimes, RawProcess};
use procwatch::sampling::test_utils::{raw_process, ScriptedSource};

/// CPU readings that yield the given busy percentage on each cycle.
///
/// A cycle takes two reads, and every cycle adds 100 ticks between its two
/// reads. Once the script is exhausted the counters stop moving, so later
/// cycles read 0%.
pub fn cpu_script(busy_per_cycle: &[u64]) -> Vec<CpuTimes> {
    let mut current = CpuTimes::default();
    let mut readings = Vec::with_capacity(busy_per_cycle.len() * 2);
    for busy in busy_per_cycle {
        readings.push(current);
        let idle = 100 - (*busy).min(100);
        current = CpuTimes::new(current.idle + idle, current.kernel + 50, current.user + 50);
        readings.push(current);
    }
    readings
}

/// A source replaying `cpu_script(busy_per_cycle)` over a fixed process list.
pub fn scripted_source(busy_per_cycle: &[u64], processes: Vec<RawProcess>) -> ScriptedSource {
    ScriptedSource::new()
        .with_cpu(cpu_script(busy_per_cycle))
        .with_processes(vec![processes])
}

/// Two process trees whose common parent is not running: a shell with two
/// children, and a lone daemon.
pub fn sample_tree() -> Vec<RawProcess> {
    vec![
        raw_process(100, 1, "bash", 0, 100, 0),
        raw_process(101, 100, "make", 0, 200, 0),
        raw_process(102, 100, "cc", 0, 300, 0),
        raw_process(200, 1, "sshd", 0, 50, 0),
    ]
}
