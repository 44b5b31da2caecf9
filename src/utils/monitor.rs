//! Per-layer process resource sampling.
//!
//! Only compiled with sysinfo under the `cli` feature; the Lambda build gets a
//! no-op sampler with the same surface.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceSample {
    pub cpu_percent: f32,
    pub resident_mb: u64,
    pub peak_resident_mb: u64,
    pub since_start: Duration,
}

#[cfg(feature = "cli")]
mod imp {
    use super::ResourceSample;
    use std::sync::Mutex;
    use std::time::Instant;
    use sysinfo::{Pid, ProcessesToUpdate, System};

    pub(super) struct Sampler {
        state: Mutex<(System, u64)>,
        pid: Option<Pid>,
    }

    impl Sampler {
        pub(super) fn new() -> Self {
            Self {
                state: Mutex::new((System::new(), 0)),
                pid: sysinfo::get_current_pid().ok(),
            }
        }

        pub(super) fn sample(&self, started: Instant) -> Option<ResourceSample> {
            let pid = self.pid?;
            let mut guard = self.state.lock().ok()?;
            let (system, peak) = &mut *guard;
            system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
            let process = system.process(pid)?;

            let resident_mb = process.memory() / (1024 * 1024);
            *peak = (*peak).max(resident_mb);
            Some(ResourceSample {
                cpu_percent: process.cpu_usage(),
                resident_mb,
                peak_resident_mb: *peak,
                since_start: started.elapsed(),
            })
        }
    }
}

#[cfg(not(feature = "cli"))]
mod imp {
    use super::ResourceSample;
    use std::time::Instant;

    pub(super) struct Sampler;

    impl Sampler {
        pub(super) fn new() -> Self {
            Self
        }

        pub(super) fn sample(&self, _started: Instant) -> Option<ResourceSample> {
            None
        }
    }
}

/// 停用時不建立 sysinfo 狀態，所有方法都是 no-op
pub struct ResourceMonitor {
    sampler: Option<imp::Sampler>,
    started: Instant,
}

impl ResourceMonitor {
    pub fn new(enabled: bool) -> Self {
        Self {
            sampler: enabled.then(imp::Sampler::new),
            started: Instant::now(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sampler.is_some()
    }

    pub fn sample(&self) -> Option<ResourceSample> {
        self.sampler.as_ref()?.sample(self.started)
    }

    pub fn log_layer(&self, layer: &str) {
        if let Some(s) = self.sample() {
            tracing::info!(
                layer,
                cpu = s.cpu_percent,
                resident_mb = s.resident_mb,
                "📊 {} - CPU: {:.1}%, Memory: {}MB, Peak: {}MB, Elapsed: {:?}",
                layer,
                s.cpu_percent,
                s.resident_mb,
                s.peak_resident_mb,
                s.since_start
            );
        }
    }

    pub fn log_summary(&self) {
        if let Some(s) = self.sample() {
            tracing::info!(
                "📊 Batch total {:?}, peak memory {}MB",
                s.since_start,
                s.peak_resident_mb
            );
        }
    }
}
