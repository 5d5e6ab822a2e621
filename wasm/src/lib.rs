use lanegraph::{BoundaryEdgePolicy, Config, layout_json, merge_init_config};
use serde::Deserialize;
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutOptions {
    node_spacing: Option<f32>,
    rank_spacing: Option<f32>,
    font_size: Option<f32>,
    boundary_edge_policy: Option<BoundaryEdgePolicy>,
    pretty: Option<bool>,
}

fn build_config(options: &LayoutOptions) -> Config {
    let mut config = Config::default();
    // Same validation as a `%%{init}%%` flowchart block.
    let flowchart = serde_json::json!({
        "flowchart": {
            "nodeSpacing": options.node_spacing,
            "rankSpacing": options.rank_spacing,
            "fontSize": options.font_size,
        }
    });
    config.layout = merge_init_config(config.layout, &flowchart);
    if let Some(policy) = options.boundary_edge_policy {
        config.normalize.boundary_edge_policy = policy;
    }
    config
}

#[wasm_bindgen]
pub fn layout_flowchart_json(code: &str, options_json: Option<String>) -> Result<String, JsValue> {
    let options = if let Some(raw_options) = options_json {
        serde_json::from_str::<LayoutOptions>(&raw_options)
            .map_err(|error| JsValue::from_str(&error.to_string()))?
    } else {
        LayoutOptions::default()
    };

    let config = build_config(&options);
    layout_json(code, &config, options.pretty.unwrap_or(false))
        .map_err(|error| JsValue::from_str(&error.to_string()))
}
