use serde::Deserialize;
use serde_json::Value;

/// Body of a member snapshot response. Missing arrays decode as empty.
#[derive(Deserialize, Debug, Default)]
pub struct SnapshotResponse {
    #[serde(default)]
    pub elements: Option<Vec<SnapshotElement>>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotElement {
    #[serde(default)]
    pub snapshot_domain: Option<String>,
    #[serde(default)]
    pub snapshot_data: Option<Vec<Value>>,
}

impl SnapshotResponse {
    /// Raw activity records across all elements, in response order.
    pub fn into_records(self) -> Vec<Value> {
        self.elements
            .unwrap_or_default()
            .into_iter()
            .filter_map(|e| e.snapshot_data)
            .flatten()
            .collect()
    }
}
