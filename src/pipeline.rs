use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::classify::{LayoutInfo, classify_groups};
use crate::config::{Config, merge_init_config};
use crate::error::{PipelineError, Stage};
use crate::icons::resolve_icon;
use crate::ir::{Direction, Graph};
use crate::layout::{LayoutEdge, LayoutNode, LayoutWarning, compute_lane_layout, diagram_extent};
use crate::normalize::{DropCounts, normalize_graph};
use crate::parser::parse_flowchart;
use crate::stage::flow_stage_order;

/// A lane or section as it appears in the final diagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Band {
    pub id: String,
    pub label: String,
    pub index: usize,
    pub badge_label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub warnings: Vec<LayoutWarning>,
    pub drops: DropCounts,
}

impl Diagnostics {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.drops.total() == 0
    }
}

#[derive(Debug, Clone)]
pub struct PositionedDiagram {
    pub direction: Direction,
    pub nodes: Vec<LayoutNode>,
    pub edges: Vec<LayoutEdge>,
    pub width: f32,
    pub height: f32,
    pub lanes: Vec<Band>,
    pub sections: Vec<Band>,
    pub diagnostics: Diagnostics,
}

impl PositionedDiagram {
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn node(&self, id: &str) -> Option<&LayoutNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn badges(&self) -> impl Iterator<Item = &LayoutNode> {
        self.nodes.iter().filter(|node| node.is_badge())
    }
}

#[derive(Debug, Clone)]
pub enum Outcome {
    /// No group classified as a lane, section or boundary. The parsed graph
    /// is handed back for the caller's own layout.
    NoLaneMetadata(Graph),
    Positioned(PositionedDiagram),
}

impl Outcome {
    pub fn positioned(&self) -> Option<&PositionedDiagram> {
        match self {
            Outcome::Positioned(diagram) => Some(diagram),
            Outcome::NoLaneMetadata(_) => None,
        }
    }

    pub fn into_positioned(self) -> Option<PositionedDiagram> {
        match self {
            Outcome::Positioned(diagram) => Some(diagram),
            Outcome::NoLaneMetadata(_) => None,
        }
    }
}

pub fn run_pipeline(
    input: &str,
    config: &Config,
    cancel: &AtomicBool,
) -> Result<Outcome, PipelineError> {
    run_stages(input, config, cancel, |stage| {
        tracing::trace!(%stage, "reached checkpoint");
    })
}

/// `at_checkpoint` runs just before the cancel flag is read for each stage.
fn run_stages(
    input: &str,
    config: &Config,
    cancel: &AtomicBool,
    mut at_checkpoint: impl FnMut(Stage),
) -> Result<Outcome, PipelineError> {
    let parsed = parse_flowchart(input)?;
    at_checkpoint(Stage::Classify);
    checkpoint(cancel, Stage::Classify)?;

    let layout_config = match &parsed.init_config {
        Some(init) => merge_init_config(config.layout.clone(), init),
        None => config.layout.clone(),
    };
    let graph = parsed.graph;
    let classes = classify_groups(&graph);
    if !classes.has_lane_metadata() {
        tracing::debug!(
            groups = graph.groups.len(),
            "no lane metadata; skipping lane layout"
        );
        return Ok(Outcome::NoLaneMetadata(graph));
    }

    let layout = compute_lane_layout(&graph, &classes, &layout_config);
    at_checkpoint(Stage::Commit);
    checkpoint(cancel, Stage::Commit)?;

    let normalized = normalize_graph(
        &layout.nodes,
        &layout.edges,
        config.normalize.boundary_edge_policy,
    );
    let nodes: Vec<LayoutNode> = normalized.nodes.into_iter().map(with_icon).collect();
    // Collapsed boundaries change the drawn extent.
    let (width, height) = diagram_extent(&nodes, layout.grid_width, layout.grid_height);

    Ok(Outcome::Positioned(PositionedDiagram {
        direction: layout.direction,
        nodes,
        edges: normalized.edges,
        width,
        height,
        lanes: bands(&graph, &classes.lanes()),
        sections: bands(&graph, &classes.sections()),
        diagnostics: Diagnostics {
            warnings: layout.warnings,
            drops: normalized.drops,
        },
    }))
}

fn checkpoint(cancel: &AtomicBool, stage: Stage) -> Result<(), PipelineError> {
    if cancel.load(Ordering::Relaxed) {
        tracing::debug!(%stage, "pipeline cancelled");
        return Err(PipelineError::Cancelled(stage));
    }
    Ok(())
}

fn with_icon(mut node: LayoutNode) -> LayoutNode {
    let stage = flow_stage_order(&node.id, &node.data.label, &node.data.component_type);
    let hit = resolve_icon(
        Some(&node.data.component_type),
        Some(&node.data.label),
        stage,
    );
    node.data.icon = Some(hit.icon.to_string());
    node
}

fn bands(graph: &Graph, infos: &[(&str, &LayoutInfo)]) -> Vec<Band> {
    infos
        .iter()
        .map(|(id, info)| Band {
            id: (*id).to_string(),
            label: graph
                .group(id)
                .map(|group| group.label.clone())
                .unwrap_or_default(),
            index: info.index,
            badge_label: info.badge_label.clone(),
        })
        .collect()
}
