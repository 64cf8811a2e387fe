//! # Operating System Counter Source
//!
//! `SystemCounterSource` reads the raw cumulative counters the sampler needs.
//! Process enumeration and memory status come from the `sysinfo` crate; the
//! host-wide idle/kernel/user CPU counters come from the kernel statistics in
//! `/proc/stat` on Linux. Other platforms report system CPU times as
//! unsupported and the sampler treats that reading as zero.

use crate::core::{CounterSource, CpuTimes, MemoryStatus, RawProcess};
use crate::sampling::SampleError;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

/// Reads counters from the running host.
pub struct SystemCounterSource {
    system: System,
}

impl SystemCounterSource {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SystemCounterSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterSource for SystemCounterSource {
    fn system_times(&mut self) -> Result<CpuTimes, SampleError> {
        read_kernel_times()
    }

    fn memory_status(&mut self) -> Result<MemoryStatus, SampleError> {
        self.system.refresh_memory();
        let total_bytes = self.system.total_memory();
        if total_bytes == 0 {
            return Err(SampleError::Query(
                "total physical memory reported as zero".to_string(),
            ));
        }
        Ok(MemoryStatus {
            total_bytes,
            available_bytes: self.system.available_memory(),
        })
    }

    fn processes(&mut self) -> Result<Vec<RawProcess>, SampleError> {
        // Dead processes are dropped from the table so a vanished pid is
        // simply absent from this read.
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing()
                .with_cpu()
                .with_memory()
                .with_disk_usage(),
        );

        let processes: Vec<RawProcess> = self
            .system
            .processes()
            .values()
            .map(|process| {
                let disk = process.disk_usage();
                RawProcess {
                    pid: process.pid().as_u32(),
                    ppid: process.parent().map(|p| p.as_u32()).unwrap_or(0),
                    name: process.name().to_string_lossy().into_owned(),
                    cpu_time_ms: process.accumulated_cpu_time(),
                    memory_bytes: process.memory(),
                    io_bytes: disk
                        .total_read_bytes
                        .saturating_add(disk.total_written_bytes),
                }
            })
            .collect();

        if processes.is_empty() {
            return Err(SampleError::Query(
                "process enumeration returned no processes".to_string(),
            ));
        }
        Ok(processes)
    }
}

/// Reads cumulative CPU ticks from `/proc/stat`.
///
/// Linux reports idle separately from system time, so idle and iowait are
/// folded into `kernel` to keep `kernel + user` the total.
#[cfg(target_os = "linux")]
fn read_kernel_times() -> Result<CpuTimes, SampleError> {
    use procfs::{CurrentSI, KernelStats};

    let stats = KernelStats::current()
        .map_err(|e| SampleError::Query(format!("reading /proc/stat: {}", e)))?;
    let cpu = stats.total;

    let idle = cpu.idle + cpu.iowait.unwrap_or(0);
    let system = cpu.system
        + cpu.irq.unwrap_or(0)
        + cpu.softirq.unwrap_or(0)
        + cpu.steal.unwrap_or(0);
    let user = cpu.user + cpu.nice;

    Ok(CpuTimes::new(idle, system + idle, user))
}

#[cfg(not(target_os = "linux"))]
fn read_kernel_times() -> Result<CpuTimes, SampleError> {
    Err(SampleError::Unsupported("cumulative system CPU times"))
}
