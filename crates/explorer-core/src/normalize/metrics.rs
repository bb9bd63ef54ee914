use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::fields::{array, field, number, text, value_to_number};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub timestamp: f64,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSeries {
    pub metric: String,
    pub points: Vec<MetricPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub series: Vec<MetricsSeries>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
}

const POINT_KEYS: &[&str] = &["points", "values", "data"];

/// Normalizes a metrics payload.
///
/// Accepted shapes, tried in order:
/// - an array of series
/// - `{ series: [...], from, to, step }`
/// - a single series carrying `points`, `values` or `data`
/// - a map of metric name to array of values, spaced one second apart and
///   ending at `now_ms`
///
/// Points missing a timestamp are stamped with `now_ms`.
#[must_use]
pub fn normalize_metrics(raw: &Value, now_ms: f64) -> MetricsResponse {
    if let Some(list) = raw.as_array() {
        return MetricsResponse {
            series: list.iter().map(|s| series(s, now_ms)).collect(),
            ..MetricsResponse::default()
        };
    }

    if let Some(list) = raw.get("series").and_then(Value::as_array) {
        return MetricsResponse {
            series: list.iter().map(|s| series(s, now_ms)).collect(),
            from: number(raw, &["from"]),
            to: number(raw, &["to"]),
            step: number(raw, &["step"]),
        };
    }

    if field(raw, POINT_KEYS).is_some() {
        return MetricsResponse { series: vec![series(raw, now_ms)], ..MetricsResponse::default() };
    }

    let series = raw
        .as_object()
        .into_iter()
        .flatten()
        .filter_map(|(name, values)| {
            let values = values.as_array()?;
            let last = values.len().saturating_sub(1);
            let points = values
                .iter()
                .enumerate()
                .map(|(i, v)| MetricPoint {
                    timestamp: now_ms - (last - i) as f64 * 1000.0,
                    value: value_to_number(v).or_else(|| number(v, &["value"])).unwrap_or(0.0),
                })
                .collect();
            Some(MetricsSeries { metric: name.clone(), points, unit: None })
        })
        .collect();

    MetricsResponse { series, ..MetricsResponse::default() }
}

fn series(raw: &Value, now_ms: f64) -> MetricsSeries {
    MetricsSeries {
        metric: text(raw, &["metric", "name", "label"]).unwrap_or_else(|| "unknown".to_string()),
        points: array(raw, POINT_KEYS).iter().map(|p| point(p, now_ms)).collect(),
        unit: text(raw, &["unit"]),
    }
}

fn point(raw: &Value, now_ms: f64) -> MetricPoint {
    match raw {
        Value::Array(pair) => MetricPoint {
            timestamp: pair.first().and_then(value_to_number).unwrap_or(now_ms),
            value: pair.get(1).and_then(value_to_number).unwrap_or(0.0),
        },
        Value::Object(_) => MetricPoint {
            timestamp: number(raw, &["timestamp", "time", "t"]).unwrap_or(now_ms),
            value: number(raw, &["value", "v"]).unwrap_or(0.0),
        },
        other => MetricPoint { timestamp: now_ms, value: value_to_number(other).unwrap_or(0.0) },
    }
}
