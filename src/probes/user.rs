// User-defined probes: file/command/env, each producing a raw string that
// is optionally numeric-coerced and optionally run through a transform.
// Grounded in the original's file/command/env collectors, with the
// eval-based transform replaced by `transform::parse`.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;

use crate::config::CustomCollector;
use crate::document::{CustomScalar, CustomValue};
use crate::error::{Error, ErrorKind};
use crate::probes::transform;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn collect(collector: &CustomCollector) -> CustomValue {
    match run(collector).await {
        Ok(value) => CustomValue::Ok {
            value,
            unit: collector.unit.clone(),
            kind: collector.kind.clone(),
        },
        Err(err) => CustomValue::Err {
            error: err.to_string(),
            kind: collector.kind.clone(),
        },
    }
}

async fn run(collector: &CustomCollector) -> Result<CustomScalar, Error> {
    let raw = match collector.kind.as_str() {
        "file" => read_file(&collector.source)?,
        "command" => run_command(&collector.source).await?,
        "env" => read_env(&collector.source, collector.default.as_deref())?,
        other => {
            return Err(Error::from_string(
                ErrorKind::ProbeFailure,
                format!("unknown probe type '{other}'"),
            ))
        }
    };

    if let Some(source) = &collector.transform {
        let transform = transform::parse(source)?;
        return Ok(scalar_from_value(transform.apply(&raw)?));
    }

    Ok(coerce_numeric(&raw))
}

fn read_file(path: &str) -> Result<String, Error> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|err| Error::from_string(ErrorKind::ProbeFailure, format!("reading {path}: {err}")))
}

async fn run_command(command: &str) -> Result<String, Error> {
    let child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output();

    let output = timeout(COMMAND_TIMEOUT, child)
        .await
        .map_err(|_| Error::new(ErrorKind::ProbeFailure, "command timed out"))?
        .map_err(|err| Error::from_string(ErrorKind::ProbeFailure, format!("spawning command: {err}")))?;

    if !output.status.success() {
        return Err(Error::from_string(
            ErrorKind::ProbeFailure,
            format!("command failed with status {}", output.status),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn read_env(name: &str, default: Option<&str>) -> Result<String, Error> {
    match std::env::var(name) {
        Ok(value) => Ok(value),
        Err(_) => default.map(str::to_string).ok_or_else(|| {
            Error::from_string(ErrorKind::ProbeFailure, format!("environment variable {name} not set"))
        }),
    }
}

fn coerce_numeric(raw: &str) -> CustomScalar {
    if raw.contains('.') {
        if let Ok(f) = raw.parse::<f64>() {
            return CustomScalar::Float(f);
        }
    } else if let Ok(i) = raw.parse::<i64>() {
        return CustomScalar::Integer(i);
    }
    CustomScalar::Text(raw.to_string())
}

fn scalar_from_value(value: transform::Value) -> CustomScalar {
    match value {
        transform::Value::Integer(n) => CustomScalar::Integer(n),
        transform::Value::Float(f) => CustomScalar::Float(f),
        transform::Value::Text(s) => CustomScalar::Text(s),
    }
}
