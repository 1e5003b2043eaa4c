use std::env;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind};

/// Top level config document, loaded from YAML and overridable by
/// `NAS_PANEL_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "Server::default")]
    pub server: Server,

    #[serde(default = "Mqtt::default")]
    pub mqtt: Mqtt,

    #[serde(default = "Collection::default")]
    pub collection: Collection,

    #[serde(default = "Config::default_custom_collectors")]
    pub custom_collectors: Vec<CustomCollector>,
}

impl Config {
    fn default_custom_collectors() -> Vec<CustomCollector> {
        Vec::new()
    }

    /// Parse a YAML document into a config, applying field-level defaults
    /// for anything the document omits.
    pub fn from_yaml(text: &str) -> Result<Self, Error> {
        let config: Self = serde_yaml::from_str(text)?;
        Ok(config)
    }

    /// Apply `NAS_PANEL_*` overrides on top of a loaded config. Unparsable
    /// values are logged and ignored, leaving the file/default value intact.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("NAS_PANEL_HOSTNAME") {
            self.server.hostname = v;
        }
        if let Ok(v) = env::var("NAS_PANEL_IP") {
            self.server.ip = v;
        }
        if let Ok(v) = env::var("NAS_PANEL_MQTT_HOST") {
            self.mqtt.host = v;
        }
        Self::apply_parsed_override("NAS_PANEL_MQTT_PORT", &mut self.mqtt.port);
        if let Ok(v) = env::var("NAS_PANEL_MQTT_TOPIC") {
            self.mqtt.topic = v;
        }
        Self::apply_parsed_override("NAS_PANEL_MQTT_QOS", &mut self.mqtt.qos);
        Self::apply_parsed_override("NAS_PANEL_INTERVAL", &mut self.collection.interval);
    }

    fn apply_parsed_override<T>(var: &str, field: &mut T)
    where
        T: std::str::FromStr,
    {
        if let Ok(raw) = env::var(var) {
            match raw.parse() {
                Ok(parsed) => *field = parsed,
                Err(_) => log::warn!("ignoring unparsable {var}={raw}"),
            }
        }
    }

    /// Enforce the rules of the configuration file contract. Run on load
    /// and by `--test`.
    pub fn validate(&self) -> Result<(), Error> {
        if !(1..=65535).contains(&self.mqtt.port) {
            return Err(Error::new(
                ErrorKind::Fatal,
                "mqtt.port must be in 1..=65535",
            ));
        }
        if self.mqtt.qos > 2 {
            return Err(Error::new(ErrorKind::Fatal, "mqtt.qos must be 0, 1, or 2"));
        }
        if self.collection.interval <= 0.0 {
            return Err(Error::new(
                ErrorKind::Fatal,
                "collection.interval must be positive",
            ));
        }
        for collector in &self.custom_collectors {
            match collector.kind.as_str() {
                "file" | "command" | "env" => {}
                other => {
                    return Err(Error::from_string(
                        ErrorKind::Fatal,
                        format!("custom_collectors[].type must be file|command|env, got {other}"),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: Server::default(),
            mqtt: Mqtt::default(),
            collection: Collection::default(),
            custom_collectors: Self::default_custom_collectors(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    /// `"auto"` resolves to the OS hostname at startup; anything else is
    /// used literally.
    #[serde(default = "Server::default_hostname")]
    pub hostname: String,

    /// `"auto"` resolves to the address used to reach a public address,
    /// falling back to `127.0.0.1` if that cannot be determined.
    #[serde(default = "Server::default_ip")]
    pub ip: String,
}

impl Server {
    fn default_hostname() -> String {
        "auto".to_string()
    }

    fn default_ip() -> String {
        "auto".to_string()
    }
}

impl Default for Server {
    fn default() -> Self {
        Self {
            hostname: Self::default_hostname(),
            ip: Self::default_ip(),
        }
    }
}

/// Which broker mode to run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MqttType {
    Builtin,
    External,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mqtt {
    #[serde(default = "Mqtt::default_type")]
    #[serde(rename = "type")]
    pub kind: MqttType,

    #[serde(default = "Mqtt::default_host")]
    pub host: String,

    #[serde(default = "Mqtt::default_port")]
    pub port: u32,

    #[serde(default = "Mqtt::default_topic")]
    pub topic: String,

    #[serde(default = "Mqtt::default_qos")]
    pub qos: u8,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub keep_alive: Option<u16>,
}

impl Mqtt {
    const fn default_type() -> MqttType {
        MqttType::Builtin
    }

    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    const fn default_port() -> u32 {
        1883
    }

    fn default_topic() -> String {
        "nas/panel/data".to_string()
    }

    const fn default_qos() -> u8 {
        1
    }
}

impl Default for Mqtt {
    fn default() -> Self {
        Self {
            kind: Self::default_type(),
            host: Self::default_host(),
            port: Self::default_port(),
            topic: Self::default_topic(),
            qos: Self::default_qos(),
            username: None,
            password: None,
            client_id: None,
            keep_alive: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    /// Seconds between scheduler ticks.
    #[serde(default = "Collection::default_interval")]
    pub interval: f64,
}

impl Collection {
    const fn default_interval() -> f64 {
        5.0
    }
}

impl Default for Collection {
    fn default() -> Self {
        Self {
            interval: Self::default_interval(),
        }
    }
}

/// One user-defined probe: `file`, `command`, or `env`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomCollector {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: String,

    /// Source path for `file`, shell command for `command`, variable name
    /// for `env`.
    pub source: String,

    #[serde(default)]
    pub default: Option<String>,

    #[serde(default)]
    pub unit: Option<String>,

    #[serde(default)]
    pub transform: Option<String>,
}
