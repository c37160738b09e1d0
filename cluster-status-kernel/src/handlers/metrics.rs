//! GET /api/metrics?type=current|load|pbs|cpu|nodes|all

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::{ApiError, ApiResult, QueryParams};
use crate::models::{string_list_from_record, ClusterMetric, CurrentMetrics, NodeStatus};
use crate::state::AppState;
use crate::storage::{Record, Storage};

pub const LOAD_AVERAGE_KEY: &str = "load_average";
pub const PBS_USAGE_KEY: &str = "pbs_usage";
pub const CPU_USAGE_KEY: &str = "cpu_usage";
pub const NODES_ALIVE_KEY: &str = "nodes_alive";
pub const NODES_DOWN_KEY: &str = "nodes_down";
pub const METADATA_KEY: &str = "metadata";

const DUMMY_CLUSTERS: [&str; 3] = ["cluster1", "cluster2", "cluster3"];
const DUMMY_ALIVE: [&str; 3] = ["node1 (dummy)", "node2 (dummy)", "node3 (dummy)"];
const DUMMY_DOWN: [&str; 1] = ["node4 (dummy)"];
const NODES_NO_DATA_MESSAGE: &str = "データが取得できていません。ダミー値を表示しています。";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricsView {
    Current,
    Load,
    Pbs,
    Cpu,
    Nodes,
    All,
}

impl MetricsView {
    /// Absent => `Current` ; valeur inconnue => None
    pub fn parse(kind: Option<&str>) -> Option<Self> {
        match kind.unwrap_or("current") {
            "current" => Some(Self::Current),
            "load" => Some(Self::Load),
            "pbs" => Some(Self::Pbs),
            "cpu" => Some(Self::Cpu),
            "nodes" => Some(Self::Nodes),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

pub async fn get_metrics(
    State(app): State<AppState>,
    params: QueryParams,
) -> ApiResult<Response> {
    let view = MetricsView::parse(params.first("type"))
        .ok_or(ApiError::BadRequest("Invalid metric type"))?;
    let storage = app.storage.as_ref();

    let response = match view {
        MetricsView::Current => Json(current_metrics(storage).await).into_response(),
        MetricsView::Load => Json(facet_or_dummy(storage, LOAD_AVERAGE_KEY).await?).into_response(),
        MetricsView::Pbs => Json(facet_or_dummy(storage, PBS_USAGE_KEY).await?).into_response(),
        MetricsView::Cpu => Json(facet_or_dummy(storage, CPU_USAGE_KEY).await?).into_response(),
        MetricsView::Nodes => Json(node_status(storage).await).into_response(),
        MetricsView::All => Json(all_records(storage).await?).into_response(),
    };
    Ok(response)
}

/// Lecture d'une facette parmi plusieurs : une erreur vaut "pas de données"
async fn read_facet(storage: &dyn Storage, key: &str) -> Option<Record> {
    match storage.get_optional(key).await {
        Ok(record) => record,
        Err(e) => {
            tracing::debug!(key, error = %e, "facet read failed, ignoring");
            None
        }
    }
}

async fn metric_series(storage: &dyn Storage, key: &str) -> Vec<ClusterMetric> {
    read_facet(storage, key)
        .await
        .map(|record| ClusterMetric::list_from_record(&record))
        .unwrap_or_default()
}

pub async fn current_metrics(storage: &dyn Storage) -> CurrentMetrics {
    let timestamp = read_facet(storage, METADATA_KEY)
        .await
        .and_then(|meta| meta.get("timestamp").and_then(Value::as_f64))
        .map(|ts| ts as i64)
        .unwrap_or_else(|| OffsetDateTime::now_utc().unix_timestamp());

    let load_average = metric_series(storage, LOAD_AVERAGE_KEY).await;
    let pbs_usage = metric_series(storage, PBS_USAGE_KEY).await;
    let cpu_usage = metric_series(storage, CPU_USAGE_KEY).await;
    let has_data = !load_average.is_empty();

    CurrentMetrics {
        load_average,
        pbs_usage,
        cpu_usage,
        timestamp,
        has_data,
    }
}

/// Record brut, ou charge utile "Data not found" + données factices.
/// Seule une vraie panne du backend remonte en erreur.
pub async fn facet_or_dummy(storage: &dyn Storage, key: &str) -> ApiResult<Value> {
    match storage.get_optional(key).await? {
        Some(record) if !record.is_empty() => Ok(Value::Object(record)),
        _ => Ok(json!({
            "error": "Data not found",
            "message": format!("No data available for key: {}", key),
            "dummy_data": dummy_metrics(key, OffsetDateTime::now_utc()),
        })),
    }
}

/// Trois clusters fictifs avec des valeurs fixes par facette
pub fn dummy_metrics(key: &str, now: OffsetDateTime) -> Vec<Value> {
    let timestamp = now.format(&Rfc3339).unwrap_or_default();
    DUMMY_CLUSTERS
        .iter()
        .map(|cluster| {
            let value = match key {
                LOAD_AVERAGE_KEY => json!(50.0 + (cluster.len() * 10) as f64),
                PBS_USAGE_KEY => json!(30.0 + (cluster.len() * 5) as f64),
                CPU_USAGE_KEY => json!("32/64"),
                _ => json!(0),
            };
            json!({
                "cluster": cluster,
                "value": value,
                "timestamp": timestamp,
                "is_dummy": true,
            })
        })
        .collect()
}

pub async fn node_status(storage: &dyn Storage) -> NodeStatus {
    let mut alive = read_facet(storage, NODES_ALIVE_KEY)
        .await
        .map(|r| string_list_from_record(&r))
        .unwrap_or_default();
    let mut down = read_facet(storage, NODES_DOWN_KEY)
        .await
        .map(|r| string_list_from_record(&r))
        .unwrap_or_default();

    let has_data = !alive.is_empty() || !down.is_empty();
    let message = if has_data {
        "OK".to_string()
    } else {
        alive = DUMMY_ALIVE.iter().map(|s| s.to_string()).collect();
        down = DUMMY_DOWN.iter().map(|s| s.to_string()).collect();
        NODES_NO_DATA_MESSAGE.to_string()
    };

    NodeStatus {
        total: alive.len() + down.len(),
        alive,
        down,
        has_data,
        message,
    }
}

/// Vue admin : toutes les clés, valeurs brutes
pub async fn all_records(storage: &dyn Storage) -> ApiResult<Record> {
    let mut out = Record::new();
    for key in storage.list().await? {
        // une clé supprimée entre list() et get() est simplement omise
        if let Ok(record) = storage.get(&key).await {
            out.insert(key, Value::Object(record));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::JsonStorage;
    use tempfile::TempDir;
    use time::macros::datetime;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn setup() -> (TempDir, JsonStorage) {
        let dir = TempDir::new().unwrap();
        let storage = JsonStorage::new(dir.path()).unwrap();
        (dir, storage)
    }

    #[test]
    fn test_parse_view() {
        assert_eq!(MetricsView::parse(None), Some(MetricsView::Current));
        assert_eq!(MetricsView::parse(Some("load")), Some(MetricsView::Load));
        assert_eq!(MetricsView::parse(Some("all")), Some(MetricsView::All));
        assert_eq!(MetricsView::parse(Some("bogus")), None);
        assert_eq!(MetricsView::parse(Some("LOAD")), None);
    }

    #[test]
    fn test_dummy_metrics_values() {
        let now = datetime!(2024-05-01 10:00:00 UTC);

        let load = dummy_metrics(LOAD_AVERAGE_KEY, now);
        assert_eq!(load.len(), 3);
        assert_eq!(load[0]["cluster"], "cluster1");
        assert_eq!(load[0]["value"], 130.0);
        assert_eq!(load[2]["timestamp"], "2024-05-01T10:00:00Z");
        assert!(load.iter().all(|m| m["is_dummy"] == true));

        assert_eq!(dummy_metrics(PBS_USAGE_KEY, now)[1]["value"], 70.0);
        assert_eq!(dummy_metrics(CPU_USAGE_KEY, now)[0]["value"], "32/64");
        assert_eq!(dummy_metrics("other", now)[0]["value"], 0);
    }

    #[tokio::test]
    async fn test_current_metrics_without_data() {
        let (_dir, storage) = setup();
        let before = OffsetDateTime::now_utc().unix_timestamp();

        let current = current_metrics(&storage).await;
        assert!(!current.has_data);
        assert!(current.load_average.is_empty());
        assert!(current.timestamp >= before);
    }

    #[tokio::test]
    async fn test_current_metrics_with_data() {
        let (_dir, storage) = setup();
        storage
            .set(METADATA_KEY, &record(json!({"timestamp": 1714557600})))
            .await
            .unwrap();
        storage
            .set(
                LOAD_AVERAGE_KEY,
                &record(json!({"data": [{"cluster": "asuka", "value": 4.2}, "junk"]})),
            )
            .await
            .unwrap();
        storage
            .set(CPU_USAGE_KEY, &record(json!({"data": "not an array"})))
            .await
            .unwrap();

        let current = current_metrics(&storage).await;
        assert!(current.has_data);
        assert_eq!(current.timestamp, 1714557600);
        assert_eq!(current.load_average.len(), 1);
        assert_eq!(current.load_average[0].cluster, "asuka");
        assert!(current.pbs_usage.is_empty());
        assert!(current.cpu_usage.is_empty());
    }

    #[tokio::test]
    async fn test_facet_or_dummy() {
        let (_dir, storage) = setup();

        let missing = facet_or_dummy(&storage, PBS_USAGE_KEY).await.unwrap();
        assert_eq!(missing["error"], "Data not found");
        assert_eq!(missing["message"], "No data available for key: pbs_usage");
        assert_eq!(missing["dummy_data"].as_array().unwrap().len(), 3);

        storage.set(PBS_USAGE_KEY, &Record::new()).await.unwrap();
        let empty = facet_or_dummy(&storage, PBS_USAGE_KEY).await.unwrap();
        assert!(empty.get("dummy_data").is_some());

        let stored = record(json!({"data": [{"cluster": "asuka", "value": 10}]}));
        storage.set(PBS_USAGE_KEY, &stored).await.unwrap();
        let found = facet_or_dummy(&storage, PBS_USAGE_KEY).await.unwrap();
        assert_eq!(found, Value::Object(stored));
    }

    #[tokio::test]
    async fn test_node_status_fallback_and_real() {
        let (_dir, storage) = setup();

        let dummy = node_status(&storage).await;
        assert!(!dummy.has_data);
        assert_eq!(dummy.alive, vec!["node1 (dummy)", "node2 (dummy)", "node3 (dummy)"]);
        assert_eq!(dummy.down, vec!["node4 (dummy)"]);
        assert_eq!(dummy.total, 4);
        assert_eq!(dummy.message, NODES_NO_DATA_MESSAGE);

        storage
            .set(NODES_DOWN_KEY, &record(json!({"data": ["asuka-n12"]})))
            .await
            .unwrap();
        let real = node_status(&storage).await;
        assert!(real.has_data);
        assert!(real.alive.is_empty());
        assert_eq!(real.down, vec!["asuka-n12"]);
        assert_eq!(real.total, 1);
        assert_eq!(real.message, "OK");
    }

    #[tokio::test]
    async fn test_all_records() {
        let (_dir, storage) = setup();
        assert!(all_records(&storage).await.unwrap().is_empty());

        storage.set("a", &record(json!({"x": 1}))).await.unwrap();
        storage.set("b", &record(json!({"y": [1, 2]}))).await.unwrap();

        let all = all_records(&storage).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["a"], json!({"x": 1}));
        assert_eq!(all["b"], json!({"y": [1, 2]}));
    }
}
