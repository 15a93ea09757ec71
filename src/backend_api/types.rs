//! Wire types of the backend contract.

use serde::{Deserialize, Deserializer, Serialize};

/// Normalized job payload sent to a backend's processing endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PacketJob {
    pub packet_id: String,
    pub cpu_intensity: u32,
    pub ram_intensity: u32,
    pub processing_time_ms: u64,
    pub payload: Option<String>,
}

/// Structured reply of the processing endpoint. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PacketReply {
    pub status: Option<String>,
    #[serde(deserialize_with = "lenient_u64")]
    pub processing_time_ms: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    pub cpu_cycles: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    pub memory_used_bytes: Option<u64>,
    pub result: Option<serde_json::Value>,
}

impl PacketReply {
    /// `result` as text. Non-string JSON values are rendered compactly.
    pub fn result_text(&self) -> Option<String> {
        match &self.result {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

/// Reply of the operational-status endpoint.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct OperationalStatus {
    pub open: bool,
}

/// Reply of the metrics endpoint queried by the control plane.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendHealthMetrics {
    pub cpu_usage_percent: f64,
    pub memory_usage_percent: f64,
    pub avg_processing_time_sec: f64,
    #[serde(deserialize_with = "lenient_i64")]
    pub curr_connections: i64,
    pub is_open: bool,
}

/// Accepts integers, floats (truncated) or null.
fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Option::<serde_json::Number>::deserialize(deserializer)?;
    Ok(number.and_then(|n| {
        n.as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
    }))
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Option::<serde_json::Number>::deserialize(deserializer)?;
    Ok(number
        .and_then(|n| n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)))
        .unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_serializes_camel_case() {
        let job = PacketJob {
            packet_id: "p1".into(),
            cpu_intensity: 5,
            ram_intensity: 5,
            processing_time_ms: 1000,
            payload: None,
        };
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["packetId"], "p1");
        assert_eq!(json["cpuIntensity"], 5);
        assert_eq!(json["processingTimeMs"], 1000);
        assert!(json["payload"].is_null());
    }

    #[test]
    fn reply_accepts_floats_and_missing_fields() {
        let reply: PacketReply = serde_json::from_str(
            r#"{"status":"SUCCESS","processingTimeMs":12.7,"cpuCycles":400,"result":"ok"}"#,
        )
        .unwrap();
        assert_eq!(reply.status.as_deref(), Some("SUCCESS"));
        assert_eq!(reply.processing_time_ms, Some(12));
        assert_eq!(reply.cpu_cycles, Some(400));
        assert_eq!(reply.memory_used_bytes, None);
        assert_eq!(reply.result_text().as_deref(), Some("ok"));

        let empty: PacketReply = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, PacketReply::default());
    }

    #[test]
    fn structured_result_is_rendered_as_text() {
        let reply: PacketReply = serde_json::from_str(r#"{"result":{"n":1}}"#).unwrap();
        assert_eq!(reply.result_text().as_deref(), Some(r#"{"n":1}"#));
    }

    #[test]
    fn metrics_parse_with_integer_or_float_connections() {
        let m: BackendHealthMetrics = serde_json::from_str(
            r#"{"cpuUsagePercent":40.5,"memoryUsagePercent":20,"avgProcessingTimeSec":0.3,"currConnections":3.0,"isOpen":true}"#,
        )
        .unwrap();
        assert_eq!(m.cpu_usage_percent, 40.5);
        assert_eq!(m.memory_usage_percent, 20.0);
        assert_eq!(m.curr_connections, 3);
        assert!(m.is_open);
    }
}
