pub mod system;
pub mod transform;
pub mod user;

use std::collections::BTreeMap;

use chrono::Local;

use crate::config::Config;
use crate::document::MetricDocument;
use system::SystemProbe;

/// Owns the system probe's inter-tick state (last network counters) and
/// assembles one full document per call.
pub struct ProbeSet {
    system: SystemProbe,
}

impl ProbeSet {
    #[must_use]
    pub fn new() -> Self {
        Self { system: SystemProbe::new() }
    }

    pub async fn collect(&mut self, config: &Config) -> MetricDocument {
        let hostname = SystemProbe::hostname(config);
        let ip = SystemProbe::ip_address(config);
        let timestamp = Local::now().format("%Y-%m-%dT%H:%M:%S%.f").to_string();

        let cpu = self.system.cpu();
        let memory = self.system.memory();
        let storage = self.system.storage();
        let network = self.system.network();

        let mut custom = BTreeMap::new();
        for collector in &config.custom_collectors {
            custom.insert(collector.name.clone(), user::collect(collector).await);
        }

        MetricDocument { hostname, ip, timestamp, cpu, memory, storage, network, custom }
    }
}

impl Default for ProbeSet {
    fn default() -> Self {
        Self::new()
    }
}
