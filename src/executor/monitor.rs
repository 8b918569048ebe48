//! Resource sampling for running spec processes

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::task::JoinHandle;

/// Default sampling period
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(250);

/// Accumulated footprint of one process
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ResourceUsage {
    pub cpu_seconds: f64,
    pub peak_memory_bytes: u64,
}

/// Background sampler for one pid; sampling stops when the process is gone
/// or the monitor is finished or dropped.
pub struct ResourceMonitor {
    usage: Arc<Mutex<ResourceUsage>>,
    task: JoinHandle<()>,
}

impl ResourceMonitor {
    pub fn spawn(pid: u32, interval: Duration) -> Self {
        let usage = Arc::new(Mutex::new(ResourceUsage::default()));
        let shared = usage.clone();

        let task = tokio::spawn(async move {
            let pid = Pid::from_u32(pid);
            let mut sys = System::new();
            let mut ticker = tokio::time::interval(interval);
            let mut last_sample = Instant::now();

            loop {
                ticker.tick().await;
                sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                let Some(process) = sys.process(pid) else {
                    break;
                };

                let now = Instant::now();
                let elapsed = now.duration_since(last_sample).as_secs_f64();
                last_sample = now;

                let mut usage = shared.lock();
                usage.cpu_seconds += f64::from(process.cpu_usage()) / 100.0 * elapsed;
                usage.peak_memory_bytes = usage.peak_memory_bytes.max(process.memory());
            }
        });

        Self { usage, task }
    }

    /// Stop sampling and return what was gathered
    pub fn finish(self) -> ResourceUsage {
        self.task.abort();
        let usage = *self.usage.lock();
        usage
    }
}

impl Drop for ResourceMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}
