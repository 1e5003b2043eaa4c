use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One tick's worth of collected telemetry, serialized to compact JSON
/// and delivered to the broker core as a retained PUBLISH.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricDocument {
    pub hostname: String,
    pub ip: String,
    /// ISO-8601 local time.
    pub timestamp: String,
    pub cpu: Cpu,
    pub memory: Memory,
    pub storage: Storage,
    pub network: Network,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub custom: BTreeMap<String, CustomValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cpu {
    pub usage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub usage: f64,
    pub total: u64,
    pub used: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Storage {
    pub capacity: u64,
    pub used: u64,
    pub disks: Vec<Disk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Disk {
    pub id: String,
    pub status: DiskStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskStatus {
    Normal,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub upload: u64,
    pub download: u64,
}

/// A user-defined probe's result: either a value or, on failure, the
/// reason it couldn't be produced. Never prevents the rest of the
/// document from being assembled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CustomValue {
    Ok {
        value: CustomScalar,
        #[serde(skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
        #[serde(rename = "type")]
        kind: String,
    },
    Err {
        error: String,
        #[serde(rename = "type")]
        kind: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CustomScalar {
    Integer(i64),
    Float(f64),
    Text(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_without_custom_or_optional_fields() {
        let doc = MetricDocument {
            hostname: "nas01".to_string(),
            ip: "192.168.1.10".to_string(),
            timestamp: "2026-08-01T09:00:00".to_string(),
            cpu: Cpu { usage: 12.3, temperature: None },
            memory: Memory { usage: 40.0, total: 16_000_000_000, used: 6_400_000_000, temperature: None },
            storage: Storage { capacity: 1_000_000_000_000, used: 500_000_000_000, disks: vec![Disk { id: "hdd1".to_string(), status: DiskStatus::Normal }] },
            network: Network { upload: 0, download: 0 },
            custom: BTreeMap::new(),
        };
        let json = serde_json::to_string(&doc).unwrap();
        assert!(!json.contains("temperature"));
        assert!(!json.contains("custom"));
    }

    #[test]
    fn custom_failure_round_trips() {
        let mut custom = BTreeMap::new();
        custom.insert(
            "disk_temp".to_string(),
            CustomValue::Err { error: "file not found".to_string(), kind: "float".to_string() },
        );
        let json = serde_json::to_string(&custom).unwrap();
        let parsed: BTreeMap<String, CustomValue> = serde_json::from_str(&json).unwrap();
        match &parsed["disk_temp"] {
            CustomValue::Err { error, .. } => assert_eq!(error, "file not found"),
            CustomValue::Ok { .. } => panic!("expected error variant"),
        }
    }
}
