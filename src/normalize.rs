use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::ir::DEFAULT_COMPONENT_TYPE;
use crate::layout::{LayoutEdge, LayoutNode};

const BOUNDARY_PREFIX: &str = "account_boundary";

/// What happens to edges that touch a boundary removed as a duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryEdgePolicy {
    #[default]
    Drop,
    /// Point the edge at the surviving boundary instead.
    Remap,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DropCounts {
    pub duplicate_nodes: usize,
    pub duplicate_boundaries: usize,
    pub boundary_edges: usize,
    pub dangling_edges: usize,
    pub self_loops: usize,
    pub duplicate_edges: usize,
}

impl DropCounts {
    pub fn total(&self) -> usize {
        self.duplicate_nodes
            + self.duplicate_boundaries
            + self.boundary_edges
            + self.dangling_edges
            + self.self_loops
            + self.duplicate_edges
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedGraph {
    pub nodes: Vec<LayoutNode>,
    pub edges: Vec<LayoutEdge>,
    pub drops: DropCounts,
}

static CANONICAL_TYPES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let aliases: [(&str, &[&str]); 9] = [
        (
            "account_boundary_aws",
            &[
                "aws_account",
                "aws_boundary",
                "amazon_boundary",
                "amazon_account",
                "aws_cloud",
            ],
        ),
        (
            "account_boundary_snowflake",
            &["snowflake_boundary", "snowflake_account", "sf_account"],
        ),
        (
            "account_boundary_azure",
            &["azure_boundary", "azure_account", "azure_subscription"],
        ),
        (
            "account_boundary_gcp",
            &[
                "gcp_boundary",
                "gcp_project",
                "google_cloud_boundary",
                "google_cloud_project",
            ],
        ),
        (BOUNDARY_PREFIX, &["account", "cloud_account"]),
        ("database", &["db", "rdbms", "datastore"]),
        ("service", &["svc", "microservice"]),
        ("function", &["fn", "func", "udf"]),
        ("endpoint", &["api_endpoint", "http_endpoint"]),
    ];
    let mut map = HashMap::new();
    for (canonical, raws) in aliases {
        map.insert(canonical, canonical);
        for raw in raws {
            map.insert(*raw, canonical);
        }
    }
    map
});

/// Maps a raw componentType tag to its canonical token. Unknown tags are
/// lower-cased with runs of other characters folded to `_`.
pub fn canonical_component_type(raw: &str) -> String {
    let folded = fold_type(raw);
    if folded.is_empty() {
        return DEFAULT_COMPONENT_TYPE.to_string();
    }
    match CANONICAL_TYPES.get(folded.as_str()) {
        Some(canonical) => (*canonical).to_string(),
        None => folded,
    }
}

fn fold_type(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.trim().chars() {
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

pub fn is_account_boundary(canonical: &str) -> bool {
    canonical.starts_with(BOUNDARY_PREFIX)
}

/// Builds a structurally valid copy of `nodes`/`edges`. Running it on its
/// own output changes nothing.
pub fn normalize_graph(
    nodes: &[LayoutNode],
    edges: &[LayoutEdge],
    policy: BoundaryEdgePolicy,
) -> NormalizedGraph {
    let mut drops = DropCounts::default();
    let mut kept: Vec<LayoutNode> = Vec::with_capacity(nodes.len());
    let mut kept_ids: HashSet<String> = HashSet::new();
    // Canonical boundary type -> index of its survivor in `kept`.
    let mut survivors: HashMap<String, usize> = HashMap::new();
    // Removed duplicate boundary id -> surviving id.
    let mut replaced: HashMap<String, String> = HashMap::new();

    for node in nodes {
        if kept_ids.contains(&node.id) {
            drops.duplicate_nodes += 1;
            continue;
        }
        let canonical = canonical_component_type(&node.data.component_type);
        if is_account_boundary(&canonical) {
            if let Some(&index) = survivors.get(&canonical) {
                let survivor = &mut kept[index];
                tracing::debug!(
                    removed = %node.id,
                    survivor = %survivor.id,
                    component_type = %canonical,
                    "collapsing duplicate boundary"
                );
                absorb_bounds(survivor, node);
                replaced.insert(node.id.clone(), survivor.id.clone());
                drops.duplicate_boundaries += 1;
                continue;
            }
            survivors.insert(canonical.clone(), kept.len());
        }
        let mut node = node.clone();
        node.data.component_type = canonical;
        kept_ids.insert(node.id.clone());
        kept.push(node);
    }

    let mut kept_edges: Vec<LayoutEdge> = Vec::with_capacity(edges.len());
    let mut seen_pairs: HashSet<(String, String)> = HashSet::new();
    let mut edge_ids: HashSet<String> = HashSet::new();
    for edge in edges {
        let mut source = edge.source.clone();
        let mut target = edge.target.clone();
        if replaced.contains_key(&source) || replaced.contains_key(&target) {
            match policy {
                BoundaryEdgePolicy::Drop => {
                    drops.boundary_edges += 1;
                    continue;
                }
                BoundaryEdgePolicy::Remap => {
                    if let Some(survivor) = replaced.get(&source) {
                        source = survivor.clone();
                    }
                    if let Some(survivor) = replaced.get(&target) {
                        target = survivor.clone();
                    }
                }
            }
        }
        if !kept_ids.contains(&source) || !kept_ids.contains(&target) {
            drops.dangling_edges += 1;
            continue;
        }
        if source == target {
            drops.self_loops += 1;
            continue;
        }
        if !seen_pairs.insert((source.clone(), target.clone())) {
            drops.duplicate_edges += 1;
            continue;
        }
        let id = unique_edge_id(&mut edge_ids, &edge.id);
        kept_edges.push(LayoutEdge {
            id,
            source,
            target,
            label: edge.label.clone(),
        });
    }

    if drops.total() > 0 {
        tracing::debug!(?drops, "normalization dropped items");
    }

    NormalizedGraph {
        nodes: kept,
        edges: kept_edges,
        drops,
    }
}

/// Grows `survivor` to the union of both rectangles so it still encloses the
/// members of the boundary it replaces.
fn absorb_bounds(survivor: &mut LayoutNode, removed: &LayoutNode) {
    let right = survivor.right().max(removed.right());
    let bottom = survivor.bottom().max(removed.bottom());
    survivor.x = survivor.x.min(removed.x);
    survivor.y = survivor.y.min(removed.y);
    survivor.width = right - survivor.x;
    survivor.height = bottom - survivor.y;
}

fn unique_edge_id(used: &mut HashSet<String>, base: &str) -> String {
    let mut candidate = base.to_string();
    let mut suffix = 2usize;
    while !used.insert(candidate.clone()) {
        candidate = format!("{base}_{suffix}");
        suffix += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{LayoutType, NodeData};

    fn node(id: &str, component_type: &str) -> LayoutNode {
        LayoutNode {
            id: id.to_string(),
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
            data: NodeData {
                label: id.to_string(),
                component_type: component_type.to_string(),
                layout_type: None,
                lane: None,
                section: None,
                badge_label: None,
                icon: None,
            },
        }
    }

    fn boundary(id: &str, component_type: &str) -> LayoutNode {
        let mut n = node(id, component_type);
        n.data.layout_type = Some(LayoutType::Boundary);
        n
    }

    fn edge(id: &str, source: &str, target: &str) -> LayoutEdge {
        LayoutEdge {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            label: None,
        }
    }

    #[test]
    fn provider_variants_collapse() {
        for raw in ["aws_account", "Amazon Boundary", "AWS-boundary", "account_boundary_aws"] {
            assert_eq!(canonical_component_type(raw), "account_boundary_aws", "{raw}");
        }
        assert_eq!(canonical_component_type("DB"), "database");
        assert_eq!(canonical_component_type("Kafka Topic!"), "kafka_topic");
        assert_eq!(canonical_component_type("  "), DEFAULT_COMPONENT_TYPE);
    }

    #[test]
    fn canonicalization_is_idempotent() {
        for raw in ["aws_account", "Snowflake Boundary", "x--y", "svc", "ÜberQueue"] {
            let once = canonical_component_type(raw);
            assert_eq!(canonical_component_type(&once), once);
        }
    }

    #[test]
    fn duplicate_boundary_edges_are_dropped() {
        let nodes = vec![
            boundary("aws_prod", "aws_boundary"),
            boundary("amazon_dev", "amazon_boundary"),
            node("lambda", "function"),
        ];
        let edges = vec![
            edge("e0", "lambda", "aws_prod"),
            edge("e1", "lambda", "amazon_dev"),
        ];
        let out = normalize_graph(&nodes, &edges, BoundaryEdgePolicy::Drop);
        let ids: Vec<&str> = out.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["aws_prod", "lambda"]);
        assert_eq!(out.nodes[0].data.component_type, "account_boundary_aws");
        assert_eq!(out.edges, vec![edge("e0", "lambda", "aws_prod")]);
        assert_eq!(out.drops.duplicate_boundaries, 1);
        assert_eq!(out.drops.boundary_edges, 1);
    }

    #[test]
    fn surviving_boundary_covers_the_removed_one() {
        let mut first = boundary("sf_main", "snowflake_account");
        first.x = 10.0;
        first.y = 10.0;
        first.width = 100.0;
        first.height = 50.0;
        let mut second = boundary("sf_copy", "snowflake_boundary");
        second.x = 10.0;
        second.y = 80.0;
        second.width = 140.0;
        second.height = 40.0;

        let out = normalize_graph(&[first, second], &[], BoundaryEdgePolicy::Drop);
        assert_eq!(out.nodes.len(), 1);
        let survivor = &out.nodes[0];
        assert_eq!(survivor.id, "sf_main");
        assert_eq!((survivor.x, survivor.y), (10.0, 10.0));
        assert_eq!(survivor.right(), 150.0);
        assert_eq!(survivor.bottom(), 120.0);
    }

    #[test]
    fn remap_policy_retargets_then_prunes() {
        let nodes = vec![
            boundary("sf_a", "snowflake_boundary"),
            boundary("sf_b", "snowflake_account"),
            node("app", "service"),
        ];
        let edges = vec![
            edge("e0", "app", "sf_b"),
            edge("e1", "sf_a", "sf_b"),
            edge("e2", "app", "sf_a"),
        ];
        let out = normalize_graph(&nodes, &edges, BoundaryEdgePolicy::Remap);
        assert_eq!(out.edges, vec![edge("e0", "app", "sf_a")]);
        assert_eq!(out.drops.self_loops, 1);
        assert_eq!(out.drops.duplicate_edges, 1);
        assert_eq!(out.drops.boundary_edges, 0);
    }

    #[test]
    fn prunes_dangling_self_and_duplicate_edges() {
        let nodes = vec![node("a", "component"), node("b", "component"), node("a", "database")];
        let edges = vec![
            edge("e0", "a", "b"),
            edge("e0", "b", "a"),
            edge("e2", "a", "b"),
            edge("e3", "a", "a"),
            edge("e4", "a", "ghost"),
        ];
        let out = normalize_graph(&nodes, &edges, BoundaryEdgePolicy::Drop);
        assert_eq!(out.nodes.len(), 2);
        assert_eq!(out.nodes[0].data.component_type, "component");
        assert_eq!(out.drops.duplicate_nodes, 1);
        let pairs: Vec<(&str, &str, &str)> = out
            .edges
            .iter()
            .map(|e| (e.id.as_str(), e.source.as_str(), e.target.as_str()))
            .collect();
        assert_eq!(pairs, vec![("e0", "a", "b"), ("e0_2", "b", "a")]);
        assert_eq!(out.drops.duplicate_edges, 1);
        assert_eq!(out.drops.self_loops, 1);
        assert_eq!(out.drops.dangling_edges, 1);
        assert_eq!(out.drops.total(), 4);
    }

    #[test]
    fn normalizing_twice_changes_nothing() {
        let nodes = vec![
            boundary("one", "AWS Account"),
            boundary("two", "aws_boundary"),
            node("x", "Kafka Topic"),
            node("x", "dup"),
            node("y", "svc"),
        ];
        let edges = vec![
            edge("e0", "x", "y"),
            edge("e0", "y", "two"),
            edge("e1", "x", "y"),
            edge("e2", "y", "y"),
        ];
        for policy in [BoundaryEdgePolicy::Drop, BoundaryEdgePolicy::Remap] {
            let once = normalize_graph(&nodes, &edges, policy);
            let twice = normalize_graph(&once.nodes, &once.edges, policy);
            assert_eq!(twice.nodes, once.nodes);
            assert_eq!(twice.edges, once.edges);
            assert_eq!(twice.drops.total(), 0);
        }
    }
}
