// System telemetry: CPU, memory, storage, network. Grounded in the
// original's `SystemCollector` (psutil-based); `sysinfo` stands in for
// psutil here the way the teacher's Cargo.toml already depends on it.
//
// The original derives per-disk health from psutil's read/write error
// counters, which have no portable equivalent in `sysinfo`. Per-disk
// status here is therefore always `normal` when disks are enumerable,
// falling back to the placeholder list the original also falls back to
// when it can't read I/O counters at all.

use std::time::Instant;

use sysinfo::{Disks, Networks, System};

use crate::config::Config;
use crate::document::{Cpu, Disk, DiskStatus, Memory, Network, Storage};

const MEMORY_SENSOR_KEYWORDS: [&str; 3] = ["dimm", "memory", "ram"];

pub struct SystemProbe {
    system: System,
    last_network: Option<(u64, u64, Instant)>,
}

impl SystemProbe {
    #[must_use]
    pub fn new() -> Self {
        Self {
            system: System::new_all(),
            last_network: None,
        }
    }

    #[must_use]
    pub fn hostname(config: &Config) -> String {
        if config.server.hostname != "auto" {
            return config.server.hostname.clone();
        }
        System::host_name().unwrap_or_else(|| "unknown".to_string())
    }

    #[must_use]
    pub fn ip_address(config: &Config) -> String {
        if config.server.ip != "auto" {
            return config.server.ip.clone();
        }
        local_ip_via_udp_connect().unwrap_or_else(|| "127.0.0.1".to_string())
    }

    pub fn cpu(&mut self) -> Cpu {
        self.system.refresh_cpu_usage();
        let usage = round1(f64::from(self.system.global_cpu_usage()));
        let temperature = cpu_temperature();
        Cpu { usage, temperature }
    }

    pub fn memory(&mut self) -> Memory {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        let used = self.system.used_memory();
        #[allow(clippy::cast_precision_loss)]
        let usage = if total == 0 { 0.0 } else { round1(used as f64 / total as f64 * 100.0) };
        Memory { usage, total, used, temperature: memory_temperature() }
    }

    #[must_use]
    pub fn storage(&self) -> Storage {
        let disks = Disks::new_with_refreshed_list();
        let mut capacity = 0u64;
        let mut used = 0u64;
        let mut entries = Vec::new();
        for disk in disks.list() {
            capacity += disk.total_space();
            used += disk.total_space().saturating_sub(disk.available_space());
            entries.push(Disk {
                id: disk.name().to_string_lossy().to_string(),
                status: DiskStatus::Normal,
            });
        }
        if entries.is_empty() {
            entries = (1..=6).map(|n| Disk { id: format!("hdd{n}"), status: DiskStatus::Normal }).collect();
        }
        Storage { capacity, used, disks: entries }
    }

    pub fn network(&mut self) -> Network {
        let networks = Networks::new_with_refreshed_list();
        let (sent, received): (u64, u64) = networks
            .iter()
            .fold((0, 0), |(s, r), (_name, data)| (s + data.total_transmitted(), r + data.total_received()));

        let now = Instant::now();
        let Some((last_sent, last_received, last_time)) = self.last_network else {
            self.last_network = Some((sent, received, now));
            return Network { upload: 0, download: 0 };
        };

        let elapsed = now.duration_since(last_time).as_secs_f64();
        self.last_network = Some((sent, received, now));
        if elapsed <= 0.0 {
            return Network { upload: 0, download: 0 };
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let upload = ((sent.saturating_sub(last_sent)) as f64 / elapsed).max(0.0) as u64;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let download = ((received.saturating_sub(last_received)) as f64 / elapsed).max(0.0) as u64;
        Network { upload, download }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

fn cpu_temperature() -> Option<f64> {
    let components = sysinfo::Components::new_with_refreshed_list();
    let preferred = ["coretemp", "k10temp"];
    for name in preferred {
        if let Some(reading) = components
            .iter()
            .find(|c| c.label().to_lowercase().contains(name))
            .and_then(sysinfo::Component::temperature)
        {
            return Some(round1(f64::from(reading)));
        }
    }
    components
        .iter()
        .find_map(sysinfo::Component::temperature)
        .map(|t| round1(f64::from(t)))
}

fn memory_temperature() -> Option<f64> {
    let components = sysinfo::Components::new_with_refreshed_list();
    components
        .iter()
        .find(|c| {
            let label = c.label().to_lowercase();
            MEMORY_SENSOR_KEYWORDS.iter().any(|kw| label.contains(kw))
        })
        .and_then(sysinfo::Component::temperature)
        .map(|t| round1(f64::from(t)))
}

fn local_ip_via_udp_connect() -> Option<String> {
    use std::net::UdpSocket;
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip().to_string())
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_network_sample_reports_zero() {
        let mut probe = SystemProbe::new();
        let network = probe.network();
        assert_eq!(network.upload, 0);
        assert_eq!(network.download, 0);
    }

    #[test]
    fn round1_matches_one_decimal_place() {
        assert_eq!(round1(12.34), 12.3);
        assert_eq!(round1(12.36), 12.4);
    }
}
