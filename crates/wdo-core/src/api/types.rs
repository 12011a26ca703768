//! JSON payloads of the order-delivery API.

use serde::{Deserialize, Serialize};

/// Response of `GET /orders?detail=MINIMAL`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderList {
    #[serde(default)]
    pub orders: Vec<OrderSummary>,
}

/// One active order as listed for the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub order_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub model_id: String,
    /// Run labels this order is entitled to (e.g. `["00", "12"]`).
    #[serde(default)]
    pub required_latest_runs: Vec<String>,
}

impl OrderSummary {
    /// True if `run` is in the order's allow-list.
    pub fn wants_run(&self, run: &str) -> bool {
        self.required_latest_runs.iter().any(|r| r == run)
    }
}

impl OrderList {
    pub fn find(&self, order_id: &str) -> Option<&OrderSummary> {
        self.orders
            .iter()
            .find(|o| o.order_id.eq_ignore_ascii_case(order_id))
    }

    /// Distinct model ids of the given orders, in first-seen order. Orders not in
    /// the list contribute nothing.
    pub fn models_for(&self, order_ids: &[String]) -> Vec<String> {
        let mut models: Vec<String> = Vec::new();
        for id in order_ids {
            if let Some(order) = self.find(id) {
                if !models.contains(&order.model_id) {
                    models.push(order.model_id.clone());
                }
            }
        }
        models
    }
}

/// Response of `GET /orders/{order}/latest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    pub order_details: OrderManifest,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderManifest {
    #[serde(default)]
    pub files: Vec<OrderFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFile {
    pub file_id: String,
    #[serde(default)]
    pub run_date_time: Option<String>,
}

impl OrderDetails {
    /// File ids in manifest order.
    pub fn file_ids(&self) -> Vec<&str> {
        self.order_details
            .files
            .iter()
            .map(|f| f.file_id.as_str())
            .collect()
    }
}

/// Response of `GET /runs/{model}?sort=RUNDATETIME`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunList {
    #[serde(default)]
    pub model_id: Option<String>,
    /// Most recent first.
    #[serde(default)]
    pub complete_runs: Vec<CompleteRun>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRun {
    pub run: String,
    pub run_date_time: String,
}

/// Most recent complete run of one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRun {
    pub model_id: String,
    /// Two-digit hour label, e.g. `"06"`.
    pub run: String,
    /// ISO timestamp as sent by the API, e.g. `"2024-03-28T06:00:00Z"`.
    pub run_date_time: String,
}

impl ModelRun {
    /// Marker stamp `YYYY-MM-DD:HH`; orders lexicographically by run time.
    pub fn stamp(&self) -> String {
        let date = self.run_date_time.get(..10).unwrap_or(&self.run_date_time);
        format!("{}:{}", date, self.run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_order_list() {
        let json = r#"{"orders":[
            {"orderId":"o205748","name":"UK surface","modelId":"mo-uk","requiredLatestRuns":["00","12"],"format":"GRIB2"},
            {"orderId":"o205749","modelId":"mo-global"}
        ]}"#;
        let list: OrderList = serde_json::from_str(json).unwrap();
        assert_eq!(list.orders.len(), 2);
        let o = list.find("O205748").unwrap();
        assert!(o.wants_run("12"));
        assert!(!o.wants_run("06"));
        assert!(list.find("o205749").unwrap().required_latest_runs.is_empty());
    }

    #[test]
    fn models_for_is_distinct_and_skips_unknown() {
        let json = r#"{"orders":[
            {"orderId":"a","modelId":"mo-uk"},
            {"orderId":"b","modelId":"mo-uk"},
            {"orderId":"c","modelId":"mo-global"}
        ]}"#;
        let list: OrderList = serde_json::from_str(json).unwrap();
        let ids: Vec<String> = ["c", "a", "zzz", "b"].iter().map(|s| s.to_string()).collect();
        assert_eq!(list.models_for(&ids), vec!["mo-global", "mo-uk"]);
    }

    #[test]
    fn decode_order_details_in_manifest_order() {
        let json = r#"{"orderDetails":{"order":{"orderId":"o1"},"files":[
            {"fileId":"agl_temperature_+00","runDateTime":"2024-03-28T00:00:00Z"},
            {"fileId":"agl_temperature_+12"}
        ]}}"#;
        let details: OrderDetails = serde_json::from_str(json).unwrap();
        assert_eq!(
            details.file_ids(),
            vec!["agl_temperature_+00", "agl_temperature_+12"]
        );
    }

    #[test]
    fn model_run_stamp() {
        let run = ModelRun {
            model_id: "mo-uk".into(),
            run: "06".into(),
            run_date_time: "2024-03-28T06:00:00Z".into(),
        };
        assert_eq!(run.stamp(), "2024-03-28:06");
        let later = ModelRun {
            run: "12".into(),
            run_date_time: "2024-03-28T12:00:00Z".into(),
            ..run.clone()
        };
        assert!(later.stamp() > run.stamp());
    }
}
