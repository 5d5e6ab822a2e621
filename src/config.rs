use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::normalize::BoundaryEdgePolicy;

/// Ordering sweeps per cell never exceed this, whatever a diagram asks for.
pub const MAX_ORDER_PASSES: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Gap between nodes sharing a rank inside a cell.
    pub node_spacing: f32,
    /// Gap between consecutive ranks inside a cell.
    pub rank_spacing: f32,
    pub node_padding_x: f32,
    pub node_padding_y: f32,
    pub font_size: f32,
    pub label_line_height: f32,
    pub max_label_width_chars: usize,
    pub min_node_width: f32,
    pub max_node_width: f32,
    pub min_node_height: f32,
    pub order_passes: usize,
    pub grid: GridConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_spacing: 30.0,
            rank_spacing: 50.0,
            node_padding_x: 24.0,
            node_padding_y: 14.0,
            font_size: 14.0,
            label_line_height: 1.5,
            max_label_width_chars: 22,
            min_node_width: 120.0,
            max_node_width: 260.0,
            min_node_height: 48.0,
            order_passes: 4,
            grid: GridConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    pub cell_padding: f32,
    pub row_gap: f32,
    pub column_gap: f32,
    pub min_cell_width: f32,
    pub min_cell_height: f32,
    pub boundary_padding: f32,
    pub badge_width: f32,
    pub badge_height: f32,
    /// Distance between the badge strip and the grid.
    pub badge_gap: f32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_padding: 20.0,
            row_gap: 24.0,
            column_gap: 24.0,
            min_cell_width: 160.0,
            min_cell_height: 96.0,
            boundary_padding: 16.0,
            badge_width: 48.0,
            badge_height: 32.0,
            badge_gap: 24.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizeConfig {
    pub boundary_edge_policy: BoundaryEdgePolicy,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub layout: LayoutConfig,
    pub normalize: NormalizeConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct FlowchartConfig {
    node_spacing: Option<f32>,
    rank_spacing: Option<f32>,
    order_passes: Option<usize>,
    node_padding_x: Option<f32>,
    node_padding_y: Option<f32>,
    font_size: Option<f32>,
    max_label_width_chars: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GridConfigFile {
    cell_padding: Option<f32>,
    row_gap: Option<f32>,
    column_gap: Option<f32>,
    min_cell_width: Option<f32>,
    min_cell_height: Option<f32>,
    boundary_padding: Option<f32>,
    badge_width: Option<f32>,
    badge_height: Option<f32>,
    badge_gap: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct NormalizeConfigFile {
    boundary_edge_policy: Option<BoundaryEdgePolicy>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    flowchart: Option<FlowchartConfig>,
    grid: Option<GridConfigFile>,
    normalize: Option<NormalizeConfigFile>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)?;
    let parsed: ConfigFile = serde_json::from_str(&contents)?;

    if let Some(flow) = parsed.flowchart {
        apply_flowchart(&mut config.layout, flow);
    }

    if let Some(grid) = parsed.grid {
        let target = &mut config.layout.grid;
        let fields = [
            ("cellPadding", grid.cell_padding, &mut target.cell_padding),
            ("rowGap", grid.row_gap, &mut target.row_gap),
            ("columnGap", grid.column_gap, &mut target.column_gap),
            ("minCellWidth", grid.min_cell_width, &mut target.min_cell_width),
            ("minCellHeight", grid.min_cell_height, &mut target.min_cell_height),
            ("boundaryPadding", grid.boundary_padding, &mut target.boundary_padding),
            ("badgeWidth", grid.badge_width, &mut target.badge_width),
            ("badgeHeight", grid.badge_height, &mut target.badge_height),
            ("badgeGap", grid.badge_gap, &mut target.badge_gap),
        ];
        for (key, value, slot) in fields {
            set_length(slot, key, value);
        }
    }

    if let Some(normalize) = parsed.normalize
        && let Some(policy) = normalize.boundary_edge_policy
    {
        config.normalize.boundary_edge_policy = policy;
    }

    Ok(config)
}

fn apply_flowchart(layout: &mut LayoutConfig, flow: FlowchartConfig) {
    set_length(&mut layout.node_spacing, "nodeSpacing", flow.node_spacing);
    set_length(&mut layout.rank_spacing, "rankSpacing", flow.rank_spacing);
    set_length(&mut layout.node_padding_x, "nodePaddingX", flow.node_padding_x);
    set_length(&mut layout.node_padding_y, "nodePaddingY", flow.node_padding_y);
    set_length(&mut layout.font_size, "fontSize", flow.font_size);
    if let Some(v) = flow.order_passes {
        if v > MAX_ORDER_PASSES {
            tracing::warn!(requested = v, max = MAX_ORDER_PASSES, "capping orderPasses");
        }
        layout.order_passes = v.min(MAX_ORDER_PASSES);
    }
    if let Some(v) = flow.max_label_width_chars {
        layout.max_label_width_chars = v;
    }
}

/// Lengths must be finite and non-negative; anything else keeps the current
/// value.
fn set_length(slot: &mut f32, key: &str, value: Option<f32>) {
    let Some(v) = value else {
        return;
    };
    if v.is_finite() && v >= 0.0 {
        *slot = v;
    } else {
        tracing::warn!(key, value = v, "ignoring invalid layout length");
    }
}

/// Applies the `flowchart` block of a `%%{init}%%` directive. Unknown or
/// mistyped keys are ignored.
pub fn merge_init_config(mut config: LayoutConfig, init: &serde_json::Value) -> LayoutConfig {
    let Some(flow) = init.get("flowchart") else {
        return config;
    };
    match FlowchartConfig::deserialize(flow) {
        Ok(parsed) => apply_flowchart(&mut config, parsed),
        Err(err) => tracing::warn!(%err, "ignoring malformed flowchart init settings"),
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_config_without_path_returns_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.layout.node_spacing, LayoutConfig::default().node_spacing);
        assert_eq!(
            config.normalize.boundary_edge_policy,
            BoundaryEdgePolicy::Drop
        );
    }

    #[test]
    fn load_config_reads_camel_case_file() {
        let path = std::env::temp_dir().join(format!(
            "lanegraph-config-{}.json",
            std::process::id()
        ));
        std::fs::write(
            &path,
            r#"{
                "flowchart": {"nodeSpacing": 11, "rankSpacing": 22},
                "grid": {"rowGap": 5, "badgeWidth": 60},
                "normalize": {"boundaryEdgePolicy": "remap"}
            }"#,
        )
        .unwrap();
        let config = load_config(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.layout.node_spacing, 11.0);
        assert_eq!(config.layout.rank_spacing, 22.0);
        assert_eq!(config.layout.grid.row_gap, 5.0);
        assert_eq!(config.layout.grid.badge_width, 60.0);
        assert_eq!(config.layout.grid.column_gap, GridConfig::default().column_gap);
        assert_eq!(
            config.normalize.boundary_edge_policy,
            BoundaryEdgePolicy::Remap
        );
    }

    #[test]
    fn load_config_rejects_missing_file() {
        let path = std::env::temp_dir().join("lanegraph-config-does-not-exist.json");
        assert!(load_config(Some(&path)).is_err());
    }

    #[test]
    fn init_directive_overrides_spacing() {
        let init = serde_json::json!({"flowchart": {"nodeSpacing": 7, "rankSpacing": 9}});
        let merged = merge_init_config(LayoutConfig::default(), &init);
        assert_eq!(merged.node_spacing, 7.0);
        assert_eq!(merged.rank_spacing, 9.0);

        let bad = serde_json::json!({"flowchart": {"nodeSpacing": "wide"}});
        let merged = merge_init_config(LayoutConfig::default(), &bad);
        assert_eq!(merged.node_spacing, LayoutConfig::default().node_spacing);
    }

    #[test]
    fn init_directive_order_passes_are_capped() {
        let init = serde_json::json!({"flowchart": {"orderPasses": 4_000_000_000u64}});
        let merged = merge_init_config(LayoutConfig::default(), &init);
        assert_eq!(merged.order_passes, MAX_ORDER_PASSES);

        let init = serde_json::json!({"flowchart": {"orderPasses": 6}});
        assert_eq!(merge_init_config(LayoutConfig::default(), &init).order_passes, 6);
    }

    #[test]
    fn negative_spacing_is_ignored() {
        let defaults = LayoutConfig::default();
        let init = serde_json::json!({
            "flowchart": {"nodeSpacing": -49, "rankSpacing": -1, "fontSize": 16}
        });
        let merged = merge_init_config(LayoutConfig::default(), &init);
        assert_eq!(merged.node_spacing, defaults.node_spacing);
        assert_eq!(merged.rank_spacing, defaults.rank_spacing);
        assert_eq!(merged.font_size, 16.0);

        let zero = serde_json::json!({"flowchart": {"nodeSpacing": 0}});
        assert_eq!(merge_init_config(LayoutConfig::default(), &zero).node_spacing, 0.0);
    }

    #[test]
    fn config_file_limits_match_init_directive() {
        let path = std::env::temp_dir().join(format!(
            "lanegraph-config-limits-{}.json",
            std::process::id()
        ));
        std::fs::write(
            &path,
            r#"{
                "flowchart": {"nodeSpacing": -5, "orderPasses": 1000},
                "grid": {"rowGap": -3, "columnGap": 8}
            }"#,
        )
        .unwrap();
        let config = load_config(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.layout.node_spacing, LayoutConfig::default().node_spacing);
        assert_eq!(config.layout.order_passes, MAX_ORDER_PASSES);
        assert_eq!(config.layout.grid.row_gap, GridConfig::default().row_gap);
        assert_eq!(config.layout.grid.column_gap, 8.0);
    }
}
