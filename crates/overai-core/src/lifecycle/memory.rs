//! Resident memory monitoring

use std::time::Duration;

use serde::Serialize;
use sysinfo::{Pid, ProcessesToUpdate, System};

pub const MEMORY_SAMPLE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MemoryPressure {
    Warning,
    Critical,
}

/// Turns periodic resident-size samples into pressure levels.
#[derive(Debug, Clone)]
pub struct MemoryMonitor {
    pub warning_mb: f64,
    pub critical_mb: f64,
    /// Growth between two samples that counts as pressure on its own.
    pub growth_mb: f64,
    last_mb: Option<f64>,
}

impl Default for MemoryMonitor {
    fn default() -> Self {
        Self {
            warning_mb: 200.0,
            critical_mb: 400.0,
            growth_mb: 50.0,
            last_mb: None,
        }
    }
}

impl MemoryMonitor {
    pub fn evaluate(&mut self, rss_mb: f64) -> Option<MemoryPressure> {
        let grew = self
            .last_mb
            .is_some_and(|last| rss_mb - last > self.growth_mb);
        self.last_mb = Some(rss_mb);

        if rss_mb >= self.critical_mb {
            Some(MemoryPressure::Critical)
        } else if rss_mb >= self.warning_mb || grew {
            Some(MemoryPressure::Warning)
        } else {
            None
        }
    }

    pub fn last_sample(&self) -> Option<f64> {
        self.last_mb
    }
}

/// Reads this process's resident size.
pub struct MemorySampler {
    system: System,
    pid: Option<Pid>,
}

impl MemorySampler {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    /// Resident memory in megabytes, `None` when the process cannot be read.
    pub fn sample_mb(&mut self) -> Option<f64> {
        let pid = self.pid?;
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        self.system
            .process(pid)
            .map(|process| process.memory() as f64 / (1024.0 * 1024.0))
    }
}

impl Default for MemorySampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_map_to_levels() {
        let mut monitor = MemoryMonitor::default();
        assert_eq!(monitor.evaluate(120.0), None);
        assert_eq!(monitor.evaluate(210.0), Some(MemoryPressure::Warning));
        assert_eq!(monitor.evaluate(450.0), Some(MemoryPressure::Critical));
    }

    #[test]
    fn sudden_growth_is_a_warning() {
        let mut monitor = MemoryMonitor::default();
        assert_eq!(monitor.evaluate(60.0), None);
        assert_eq!(monitor.evaluate(120.0), Some(MemoryPressure::Warning));
        assert_eq!(monitor.evaluate(125.0), None);
        assert_eq!(monitor.last_sample(), Some(125.0));
    }

    #[test]
    fn sampler_reads_own_process() {
        let mut sampler = MemorySampler::new();
        let mb = sampler.sample_mb().unwrap();
        assert!(mb > 0.0);
    }
}
