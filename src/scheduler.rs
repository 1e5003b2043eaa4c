// Fixed-interval collect-then-publish ticker, grounded in the original's
// `DataCollector._collection_loop`: timestamp, collect, publish, sleep for
// the remainder of the interval, warn and proceed immediately on overrun.

use std::time::{Duration, Instant};

use tokio::sync::mpsc::Sender;

use crate::commands::SchedulerToBrokerCmd;
use crate::config::Config;
use crate::probes::ProbeSet;

pub struct Scheduler {
    config: Config,
    probes: ProbeSet,
}

impl Scheduler {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config, probes: ProbeSet::new() }
    }

    /// Run ticks forever, sending each document to the broker core. Returns
    /// when `broker_tx` is dropped (broker shutting down).
    pub async fn run(&mut self, broker_tx: Sender<SchedulerToBrokerCmd>) {
        let interval = Duration::from_secs_f64(self.config.collection.interval);
        loop {
            let start = Instant::now();
            let document = self.probes.collect(&self.config).await;

            let cmd = SchedulerToBrokerCmd { topic: self.config.mqtt.topic.clone(), document };
            if broker_tx.send(cmd).await.is_err() {
                log::info!("scheduler stopping: broker channel closed");
                return;
            }

            let elapsed = start.elapsed();
            if elapsed >= interval {
                log::warn!("collection cycle took {:.3}s, longer than the {:.3}s interval", elapsed.as_secs_f64(), interval.as_secs_f64());
                continue;
            }
            tokio::time::sleep(interval - elapsed).await;
        }
    }

    /// One-shot collection for `--test`, bypassing the broker entirely.
    pub async fn collect_once(&mut self) -> crate::document::MetricDocument {
        self.probes.collect(&self.config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn collect_once_produces_a_document() {
        let mut scheduler = Scheduler::new(Config::default());
        let document = scheduler.collect_once().await;
        assert!(!document.hostname.is_empty());
    }
}
