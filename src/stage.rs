//! Left-to-right flow stage guessed from a node's id, label and type.

use crate::icons::normalize_text;

pub const BADGE_STAGE: f32 = -1.0;

/// Checked top to bottom; the first group with a matching keyword decides.
/// Consumers and compute come before transforms so that `stream_dashboard`
/// reads as a dashboard, and sources come last because `kafka` also appears
/// in connector names.
const STAGE_KEYWORDS: &[(f32, &[&str])] = &[
    (0.5, &["connector", "kafka_connect", "openflow"]),
    (1.0, &["snowpipe", "ingest", "firehose", "copy_into", "loader"]),
    (
        5.0,
        &[
            "dashboard", "streamlit", "report", "api", "app", "consumer", "bi", "analyst",
        ],
    ),
    (4.0, &["warehouse", "cortex", "compute", "ml", "notebook", "function"]),
    (
        2.0,
        &[
            "dynamic",
            "stream",
            "task",
            "transform",
            "dbt",
            "stored_procedure",
            "merge",
        ],
    ),
    (3.0, &["table", "stage", "storage", "bucket", "s3", "iceberg", "database"]),
    (
        0.0,
        &[
            "kafka", "kinesis", "source", "producer", "device", "iot", "sensor", "pubsub",
        ],
    ),
];

pub fn flow_stage_order(id: &str, label: &str, component_type: &str) -> Option<f32> {
    if id.starts_with("lane_label_") || id.starts_with("section_label_") {
        return Some(BADGE_STAGE);
    }
    let texts: Vec<String> = [component_type, label, id]
        .into_iter()
        .map(normalize_text)
        .filter(|text| !text.is_empty())
        .collect();
    if texts.is_empty() {
        return None;
    }

    STAGE_KEYWORDS.iter().find_map(|(stage, keywords)| {
        keywords
            .iter()
            .any(|keyword| texts.iter().any(|text| mentions(text, keyword)))
            .then_some(*stage)
    })
}

/// Word-prefix match. Keywords that span words (`copy_into`) match anywhere.
fn mentions(text: &str, keyword: &str) -> bool {
    if keyword.contains('_') {
        return text.contains(keyword);
    }
    text.split('_').any(|word| word.starts_with(keyword))
}
