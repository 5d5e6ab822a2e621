//! Icon lookup for node enrichment.
//!
//! Resolution runs four tiers in order and stops at the first hit: exact
//! catalog lookup, keyword scoring, flow-stage bucket, then a generic icon.
//! Within the first two tiers the componentType is tried before the label.

use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use serde::Serialize;

pub const GENERIC_ICON: &str = "generic";

/// Prefixes diagram generators put in front of component names.
const GENERATOR_PREFIXES: [&str; 8] = [
    "sf_",
    "snowflake_",
    "ext_",
    "external_",
    "aws_",
    "azure_",
    "gcp_",
    "comp_",
];

/// Icon names with their aliases, in registration order.
const CATALOG: &[(&str, &[&str])] = &[
    ("snowflake", &["snowflake_account", "account_boundary_snowflake"]),
    ("snowpipe", &["snowpipe_streaming", "pipe"]),
    ("dynamic_table", &["dynamic_tables", "dt"]),
    ("stream", &["streams", "change_stream"]),
    ("task", &["tasks", "scheduled_task"]),
    ("table", &["tables", "iceberg_table"]),
    ("warehouse", &["virtual_warehouse", "compute_warehouse"]),
    ("stage", &["internal_stage", "external_stage"]),
    ("cortex", &["cortex_ai", "cortex_analyst"]),
    ("streamlit", &["streamlit_app"]),
    ("notebook", &["notebooks", "jupyter"]),
    ("kafka", &["apache_kafka", "confluent", "msk"]),
    ("kinesis", &["amazon_kinesis", "kinesis_firehose", "firehose"]),
    ("s3", &["amazon_s3", "s3_bucket"]),
    ("lambda", &["lambda_function"]),
    ("database", &["postgres", "postgresql", "mysql", "rdbms"]),
    ("api", &["rest_api", "api_gateway", "endpoint"]),
    ("dashboard", &["bi", "tableau", "power_bi", "looker"]),
    ("user", &["users", "analyst"]),
    ("connector", &["connectors", "kafka_connector"]),
    ("function", &["udf", "stored_procedure"]),
    ("service", &["microservice"]),
    ("source", &[]),
    ("ingest", &[]),
    ("transform", &[]),
    ("storage", &[]),
    ("compute", &[]),
    ("consume", &[]),
    ("label", &["badge"]),
];

/// Keyword → icon. Earlier entries win ties, so specific words come before
/// the words they contain.
const KEYWORDS: &[(&str, &str)] = &[
    ("snowpipe", "snowpipe"),
    ("streamlit", "streamlit"),
    ("dynamic", "dynamic_table"),
    ("stream", "stream"),
    ("task", "task"),
    ("table", "table"),
    ("warehouse", "warehouse"),
    ("stage", "stage"),
    ("cortex", "cortex"),
    ("notebook", "notebook"),
    ("kafka", "kafka"),
    ("topic", "kafka"),
    ("kinesis", "kinesis"),
    ("firehose", "kinesis"),
    ("bucket", "s3"),
    ("s3", "s3"),
    ("lambda", "lambda"),
    ("postgres", "database"),
    ("mysql", "database"),
    ("database", "database"),
    ("db", "database"),
    ("api", "api"),
    ("gateway", "api"),
    ("dashboard", "dashboard"),
    ("report", "dashboard"),
    ("user", "user"),
    ("analyst", "user"),
    ("connector", "connector"),
    ("function", "function"),
    ("udf", "function"),
    ("service", "service"),
    ("snowflake", "snowflake"),
];

static EXACT: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for (name, aliases) in CATALOG {
        map.entry(*name).or_insert(*name);
        for alias in *aliases {
            map.entry(*alias).or_insert(*name);
        }
    }
    map
});

static STAGE_ICONS: Lazy<BTreeMap<i32, &'static str>> = Lazy::new(|| {
    BTreeMap::from([
        (-1, "label"),
        (0, "source"),
        (1, "ingest"),
        (2, "transform"),
        (3, "storage"),
        (4, "compute"),
        (5, "consume"),
    ])
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IconTier {
    Exact,
    Keyword,
    Stage,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IconMatch {
    pub icon: &'static str,
    pub tier: IconTier,
}

pub fn resolve_icon(
    component_type: Option<&str>,
    label: Option<&str>,
    flow_stage_order: Option<f32>,
) -> IconMatch {
    let texts: Vec<String> = [component_type, label]
        .into_iter()
        .flatten()
        .map(normalize_text)
        .filter(|text| !text.is_empty())
        .collect();

    if let Some(icon) = texts.iter().find_map(|text| exact_match(text)) {
        return IconMatch {
            icon,
            tier: IconTier::Exact,
        };
    }
    if let Some(icon) = texts.iter().find_map(|text| keyword_match(text)) {
        return IconMatch {
            icon,
            tier: IconTier::Keyword,
        };
    }
    if let Some(icon) = flow_stage_order.and_then(stage_match) {
        return IconMatch {
            icon,
            tier: IconTier::Stage,
        };
    }
    IconMatch {
        icon: GENERIC_ICON,
        tier: IconTier::Generic,
    }
}

/// Lower-case; runs of anything but letters and digits become one `_`.
pub fn normalize_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

fn strip_generator_prefixes(text: &str) -> &str {
    let mut current = text;
    while let Some(rest) = GENERATOR_PREFIXES
        .iter()
        .find_map(|prefix| current.strip_prefix(*prefix))
        .filter(|rest| !rest.is_empty())
    {
        current = rest;
    }
    current
}

fn exact_match(text: &str) -> Option<&'static str> {
    EXACT
        .get(text)
        .or_else(|| EXACT.get(strip_generator_prefixes(text)))
        .copied()
}

fn keyword_match(text: &str) -> Option<&'static str> {
    let words: Vec<&str> = text.split('_').filter(|w| !w.is_empty()).collect();
    // icon -> (score, first keyword position)
    let mut scores: HashMap<&'static str, (u32, usize)> = HashMap::new();
    for (position, (keyword, icon)) in KEYWORDS.iter().enumerate() {
        let score = if words.iter().any(|word| word.starts_with(*keyword)) {
            2
        } else if text.contains(*keyword) {
            1
        } else {
            continue;
        };
        let entry = scores.entry(*icon).or_insert((0, position));
        entry.0 += score;
    }
    scores
        .into_iter()
        .max_by(|(_, (score_a, pos_a)), (_, (score_b, pos_b))| {
            score_a.cmp(score_b).then(pos_b.cmp(pos_a))
        })
        .map(|(icon, _)| icon)
}

fn stage_match(order: f32) -> Option<&'static str> {
    if !order.is_finite() {
        return None;
    }
    let bucket = order.floor() as i32;
    STAGE_ICONS
        .range(..=bucket)
        .next_back()
        .map(|(_, icon)| *icon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_strips_generator_prefixes() {
        let hit = resolve_icon(Some("sf_snowpipe"), None, None);
        assert_eq!(hit, IconMatch { icon: "snowpipe", tier: IconTier::Exact });
        let hit = resolve_icon(Some("EXT-Amazon S3"), None, None);
        assert_eq!(hit.icon, "s3");
        let hit = resolve_icon(None, Some("Apache Kafka"), None);
        assert_eq!(hit.icon, "kafka");
        assert_eq!(hit.tier, IconTier::Exact);
    }

    #[test]
    fn component_type_is_tried_before_label() {
        let hit = resolve_icon(Some("database"), Some("Kafka"), None);
        assert_eq!(hit.icon, "database");
        // A keyword hit on the type still loses to an exact hit on the label.
        let hit = resolve_icon(Some("kafka_topic_x"), Some("Snowpipe"), None);
        assert_eq!(hit, IconMatch { icon: "snowpipe", tier: IconTier::Exact });
    }

    #[test]
    fn keyword_scores_accumulate() {
        let hit = resolve_icon(None, Some("orders topic stream kafka"), None);
        assert_eq!(hit, IconMatch { icon: "kafka", tier: IconTier::Keyword });
    }

    #[test]
    fn prefix_beats_substring() {
        // `table` is a word prefix, `stream` only a substring of `upstream`.
        let hit = resolve_icon(None, Some("upstream tables"), None);
        assert_eq!(hit.icon, "table");
    }

    #[test]
    fn ties_go_to_earlier_registration() {
        let hit = resolve_icon(None, Some("lambda api"), None);
        assert_eq!(hit.icon, "lambda");
        let hit = resolve_icon(None, Some("api lambda"), None);
        assert_eq!(hit.icon, "lambda");
        // `streamlit`, `stream` and `report` each score one word prefix.
        let hit = resolve_icon(None, Some("Streamlit Reports Portal"), None);
        assert_eq!(hit, IconMatch { icon: "streamlit", tier: IconTier::Keyword });
        let hit = resolve_icon(None, Some("reports api"), None);
        assert_eq!(hit, IconMatch { icon: "api", tier: IconTier::Keyword });
    }

    #[test]
    fn stage_buckets_floor_to_nearest_defined() {
        let hit = resolve_icon(Some("component"), Some("Thing"), Some(0.5));
        assert_eq!(hit, IconMatch { icon: "source", tier: IconTier::Stage });
        assert_eq!(resolve_icon(None, None, Some(3.9)).icon, "storage");
        assert_eq!(resolve_icon(None, None, Some(42.0)).icon, "consume");
        assert_eq!(resolve_icon(None, None, Some(-1.0)).icon, "label");
    }

    #[test]
    fn falls_back_to_generic() {
        let hit = resolve_icon(Some("component"), Some("Mystery Box"), Some(-7.0));
        assert_eq!(hit, IconMatch { icon: GENERIC_ICON, tier: IconTier::Generic });
        assert_eq!(resolve_icon(None, None, None).tier, IconTier::Generic);
        assert_eq!(resolve_icon(None, None, Some(f32::NAN)).tier, IconTier::Generic);
    }
}
