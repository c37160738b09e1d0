use serde::Serialize;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::macros::datetime;
use time::OffsetDateTime;

use crate::storage::Record;

/// Horodatage d'un point sans "timestamp" lisible : 0001-01-01T00:00:00Z
pub const ZERO_TIME: OffsetDateTime = datetime!(0001-01-01 0:00 UTC);

/// Point de mesure d'un cluster, extrait du tableau "data" d'un record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterMetric {
    pub cluster: String,
    pub value: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(skip_serializing_if = "is_false")]
    pub is_dummy: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeStatus {
    pub alive: Vec<String>,
    pub down: Vec<String>,
    pub total: usize,
    pub has_data: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentMetrics {
    pub load_average: Vec<ClusterMetric>,
    pub pbs_usage: Vec<ClusterMetric>,
    pub cpu_usage: Vec<ClusterMetric>,
    /// secondes Unix
    pub timestamp: i64,
    pub has_data: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl ClusterMetric {
    /// Champs absents ou mal typés => valeurs par défaut ; None si ce n'est pas un objet
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            cluster: obj
                .get("cluster")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            value: obj.get("value").and_then(Value::as_f64).unwrap_or(0.0),
            timestamp: obj
                .get("timestamp")
                .and_then(Value::as_str)
                .and_then(|ts| OffsetDateTime::parse(ts, &Rfc3339).ok())
                .unwrap_or(ZERO_TIME),
            is_dummy: obj.get("is_dummy").and_then(Value::as_bool).unwrap_or(false),
        })
    }

    /// Parse le tableau "data" d'un record, en ignorant les entrées invalides
    pub fn list_from_record(record: &Record) -> Vec<Self> {
        record
            .get("data")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Self::from_value).collect())
            .unwrap_or_default()
    }
}

/// Noms de nœuds contenus dans le tableau "data" (les non-strings sont ignorés)
pub fn string_list_from_record(record: &Record) -> Vec<String> {
    record
        .get("data")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_parse_metric_list() {
        let rec = record(json!({
            "data": [
                {"cluster": "asuka", "value": 12.5, "timestamp": "2024-05-01T10:00:00Z"},
                {"cluster": "rei", "value": 3, "is_dummy": true},
                "garbage",
                42,
                {"value": "not a number"}
            ]
        }));

        let metrics = ClusterMetric::list_from_record(&rec);
        assert_eq!(metrics.len(), 3);

        assert_eq!(metrics[0].cluster, "asuka");
        assert_eq!(metrics[0].value, 12.5);
        assert_eq!(metrics[0].timestamp, datetime!(2024-05-01 10:00:00 UTC));
        assert!(!metrics[0].is_dummy);

        assert_eq!(metrics[1].value, 3.0);
        assert_eq!(metrics[1].timestamp, ZERO_TIME);
        assert!(metrics[1].is_dummy);

        assert_eq!(metrics[2].cluster, "");
        assert_eq!(metrics[2].value, 0.0);
    }

    #[test]
    fn test_missing_data_array() {
        assert!(ClusterMetric::list_from_record(&record(json!({"foo": 1}))).is_empty());
        assert!(ClusterMetric::list_from_record(&record(json!({"data": {"a": 1}}))).is_empty());
    }

    #[test]
    fn test_metric_serialization_omits_false_dummy_flag() {
        let metric = ClusterMetric {
            cluster: "asuka".into(),
            value: 1.0,
            timestamp: datetime!(2024-05-01 10:00:00 UTC),
            is_dummy: false,
        };
        let out = serde_json::to_value(&metric).unwrap();
        assert_eq!(out["timestamp"], "2024-05-01T10:00:00Z");
        assert!(out.get("is_dummy").is_none());
    }

    #[test]
    fn test_missing_timestamp_serializes_as_zero_time() {
        let metric = ClusterMetric::from_value(&json!({"cluster": "rei", "timestamp": 1714557600}))
            .unwrap();
        let out = serde_json::to_value(&metric).unwrap();
        assert_eq!(out["timestamp"], "0001-01-01T00:00:00Z");
    }

    #[test]
    fn test_string_list() {
        let rec = record(json!({"data": ["node1", 2, "node3", null]}));
        assert_eq!(string_list_from_record(&rec), vec!["node1", "node3"]);
        assert!(string_list_from_record(&record(json!({}))).is_empty());
    }
}
