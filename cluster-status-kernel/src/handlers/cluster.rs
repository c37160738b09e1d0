//! GET /api/cluster?name=<cluster>&type=users|disk|history|summary
//!
//! Chaque facette vit sous la clé `cluster_<nom>_<facette>`.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use super::{ApiError, ApiResult, QueryParams};
use crate::state::AppState;
use crate::storage::{Record, Storage};

const SUMMARY_NO_DATA_MESSAGE: &str = "データが取得できていません";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterView {
    Users,
    Disk,
    History,
    Summary,
}

impl ClusterView {
    /// Toute valeur inconnue retombe sur le résumé
    pub fn parse(kind: Option<&str>) -> Self {
        match kind {
            Some("users") => Self::Users,
            Some("disk") => Self::Disk,
            Some("history") => Self::History,
            _ => Self::Summary,
        }
    }
}

/// Facette à source unique : nom du champ de réponse, valeur vide, message
struct Facet {
    suffix: &'static str,
    empty: fn() -> Value,
    no_data_message: &'static str,
}

const USERS: Facet = Facet {
    suffix: "users",
    empty: || json!([]),
    no_data_message: "ユーザーデータが取得できていません",
};

const DISK: Facet = Facet {
    suffix: "disk",
    empty: || json!({}),
    no_data_message: "ディスクデータが取得できていません",
};

const HISTORY: Facet = Facet {
    suffix: "history",
    empty: || json!([]),
    no_data_message: "履歴データが取得できていません",
};

pub fn cluster_key(cluster: &str, facet: &str) -> String {
    format!("cluster_{}_{}", cluster, facet)
}

pub async fn get_cluster_info(
    State(app): State<AppState>,
    params: QueryParams,
) -> ApiResult<Json<Value>> {
    let name = params
        .first("name")
        .ok_or(ApiError::BadRequest("Cluster name is required"))?;
    let storage = app.storage.as_ref();

    let body = match ClusterView::parse(params.first("type")) {
        ClusterView::Users => facet(storage, name, &USERS).await?,
        ClusterView::Disk => facet(storage, name, &DISK).await?,
        ClusterView::History => facet(storage, name, &HISTORY).await?,
        ClusterView::Summary => summary(storage, name).await,
    };
    Ok(Json(body))
}

async fn facet(storage: &dyn Storage, cluster: &str, facet: &Facet) -> ApiResult<Value> {
    let key = cluster_key(cluster, facet.suffix);
    let mut body = json!({ "cluster": cluster });

    match storage.get_optional(&key).await? {
        Some(record) if !record.is_empty() => {
            body[facet.suffix] = Value::Object(record);
        }
        _ => {
            body[facet.suffix] = (facet.empty)();
            body["message"] = json!(facet.no_data_message);
        }
    }
    Ok(body)
}

/// Agrège load/pbs/cpu du cluster ; une facette illisible est traitée comme absente
pub async fn summary(storage: &dyn Storage, cluster: &str) -> Value {
    let load = summary_facet(storage, cluster, "load").await;
    let pbs = summary_facet(storage, cluster, "pbs").await;
    let cpu = summary_facet(storage, cluster, "cpu").await;

    let has_data = [&load, &pbs, &cpu]
        .into_iter()
        .any(|facet| matches!(facet, Some(record) if !record.is_empty()));

    let mut body = json!({
        "cluster": cluster,
        "load_average": load,
        "pbs_usage": pbs,
        "cpu_usage": cpu,
        "has_data": has_data,
    });
    if !has_data {
        body["message"] = json!(SUMMARY_NO_DATA_MESSAGE);
    }
    body
}

async fn summary_facet(storage: &dyn Storage, cluster: &str, suffix: &str) -> Option<Record> {
    let key = cluster_key(cluster, suffix);
    match storage.get_optional(&key).await {
        Ok(record) => record,
        Err(e) => {
            tracing::debug!(key = %key, error = %e, "summary facet read failed, ignoring");
            None
        }
    }
}
