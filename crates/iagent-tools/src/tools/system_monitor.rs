//! `system_monitor` - host resource snapshot

use async_trait::async_trait;
use serde::Serialize;
use sysinfo::{Disks, System};
use tracing::debug;

use super::common::{create_schema, tool_config};
use iagent_core::{IagentError, IagentResult, Tool, ToolConfig, ToolInput, ToolResult};

const DEFAULT_TOP_N: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct SystemSnapshot {
    pub host_name: Option<String>,
    pub uptime_secs: u64,
    pub cpu: CpuInfo,
    pub memory: MemoryInfo,
    pub load_average: LoadInfo,
    pub disks: Vec<DiskInfo>,
    pub top_processes: Vec<ProcessInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CpuInfo {
    pub cores: usize,
    pub usage_percent: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryInfo {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub usage_percent: f32,
    pub swap_total_bytes: u64,
    pub swap_used_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadInfo {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiskInfo {
    pub mount_point: String,
    pub total_bytes: u64,
    pub available_bytes: u64,
    pub usage_percent: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f32,
    pub memory_bytes: u64,
}

fn percent(used: u64, total: u64) -> f32 {
    if total == 0 {
        0.0
    } else {
        (used as f64 / total as f64 * 100.0) as f32
    }
}

/// Take a snapshot; blocks for the CPU sampling interval
pub fn collect_snapshot(top_n: usize) -> SystemSnapshot {
    let mut system = System::new_all();
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    system.refresh_all();

    let total_memory = system.total_memory();
    let used_memory = system.used_memory();
    let load = System::load_average();

    let disks = Disks::new_with_refreshed_list()
        .list()
        .iter()
        .map(|disk| {
            let total = disk.total_space();
            let available = disk.available_space();
            DiskInfo {
                mount_point: disk.mount_point().to_string_lossy().to_string(),
                total_bytes: total,
                available_bytes: available,
                usage_percent: percent(total.saturating_sub(available), total),
            }
        })
        .collect();

    let mut processes: Vec<ProcessInfo> = system
        .processes()
        .values()
        .map(|process| ProcessInfo {
            pid: process.pid().as_u32(),
            name: process.name().to_string_lossy().to_string(),
            cpu_percent: process.cpu_usage(),
            memory_bytes: process.memory(),
        })
        .collect();
    processes.sort_by(|a, b| {
        b.cpu_percent
            .partial_cmp(&a.cpu_percent)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.memory_bytes.cmp(&a.memory_bytes))
    });
    processes.truncate(top_n);

    SystemSnapshot {
        host_name: System::host_name(),
        uptime_secs: System::uptime(),
        cpu: CpuInfo {
            cores: system.cpus().len(),
            usage_percent: system.global_cpu_usage(),
        },
        memory: MemoryInfo {
            total_bytes: total_memory,
            used_bytes: used_memory,
            usage_percent: percent(used_memory, total_memory),
            swap_total_bytes: system.total_swap(),
            swap_used_bytes: system.used_swap(),
        },
        load_average: LoadInfo {
            one: load.one,
            five: load.five,
            fifteen: load.fifteen,
        },
        disks,
        top_processes: processes,
    }
}

pub struct SystemMonitorTool {
    config: ToolConfig,
}

impl SystemMonitorTool {
    pub fn new() -> Self {
        let parameters = create_schema(
            serde_json::json!({
                "top_n": {
                    "type": "integer",
                    "description": "Number of top CPU-consuming processes to include",
                    "default": DEFAULT_TOP_N
                }
            }),
            vec![],
        );

        Self {
            config: tool_config(
                "system_monitor",
                "Report current host health: CPU, memory, swap, disk usage, load average and \
                 the top processes by CPU.",
                parameters,
            ),
        }
    }
}

impl Default for SystemMonitorTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for SystemMonitorTool {
    async fn execute(&self, input: ToolInput) -> IagentResult<ToolResult> {
        let top_n: usize = input.get_opt("top_n")?.unwrap_or(DEFAULT_TOP_N);
        debug!(top_n, "Collecting system snapshot");

        let snapshot = tokio::task::spawn_blocking(move || collect_snapshot(top_n))
            .await
            .map_err(|e| IagentError::tool(format!("System snapshot task failed: {}", e)))?;

        Ok(ToolResult::success(serde_json::to_value(snapshot)?))
    }

    fn config(&self) -> &ToolConfig {
        &self.config
    }
}
