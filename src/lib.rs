//! Lane and section layout for grouped Mermaid flowcharts.
//!
//! [`run_pipeline`] parses flowchart text, classifies its subgraphs as lanes,
//! sections or boundaries, places every node on the resulting grid, then
//! normalizes the node and edge lists and attaches icon names.

pub mod classify;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod icons;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod normalize;
pub mod parser;
pub mod pipeline;
pub mod stage;

#[cfg(feature = "cli")]
pub use cli::run;
pub use classify::{Classification, LayoutInfo, LayoutRole, classify_groups};
pub use config::{Config, LayoutConfig, NormalizeConfig, load_config, merge_init_config};
pub use error::{PipelineError, Stage, SyntaxError, SyntaxErrorKind};
pub use icons::{IconMatch, IconTier, resolve_icon};
pub use layout::{LaneLayout, LayoutEdge, LayoutNode, LayoutWarning, compute_lane_layout};
pub use layout_dump::LayoutDump;
pub use normalize::{BoundaryEdgePolicy, DropCounts, NormalizedGraph, normalize_graph};
pub use parser::{ParseOutput, parse_flowchart};
pub use pipeline::{Diagnostics, Outcome, PositionedDiagram, run_pipeline};

/// Runs the pipeline and serializes the result as layout JSON.
pub fn layout_json(input: &str, config: &Config, pretty: bool) -> anyhow::Result<String> {
    let cancel = std::sync::atomic::AtomicBool::new(false);
    let outcome = run_pipeline(input, config, &cancel)?;
    Ok(LayoutDump::from_outcome(&outcome).to_json(pretty)?)
}
