use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::AtomicBool;

use lanegraph::layout::LayoutType;
use lanegraph::{
    BoundaryEdgePolicy, Config, LayoutDump, LayoutNode, LayoutWarning, Outcome,
    PositionedDiagram, normalize_graph, run_pipeline,
};

fn fixture(rel: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(rel);
    std::fs::read_to_string(&path).unwrap_or_else(|err| panic!("fixture {rel}: {err}"))
}

fn run_fixture(rel: &str, config: &Config) -> Outcome {
    run_pipeline(&fixture(rel), config, &AtomicBool::new(false))
        .unwrap_or_else(|err| panic!("{rel}: {err}"))
}

fn positioned(rel: &str) -> PositionedDiagram {
    run_fixture(rel, &Config::default())
        .into_positioned()
        .unwrap_or_else(|| panic!("{rel}: expected lane metadata"))
}

fn node<'a>(diagram: &'a PositionedDiagram, id: &str) -> &'a LayoutNode {
    diagram
        .node(id)
        .unwrap_or_else(|| panic!("node `{id}` missing"))
}

fn assert_invariants(diagram: &PositionedDiagram, rel: &str) {
    let ids: HashSet<&str> = diagram.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids.len(), diagram.nodes.len(), "{rel}: duplicate node ids");

    let mut pairs = HashSet::new();
    for edge in &diagram.edges {
        assert!(ids.contains(edge.source.as_str()), "{rel}: dangling {}", edge.id);
        assert!(ids.contains(edge.target.as_str()), "{rel}: dangling {}", edge.id);
        assert_ne!(edge.source, edge.target, "{rel}: self-loop {}", edge.id);
        assert!(
            pairs.insert((edge.source.as_str(), edge.target.as_str())),
            "{rel}: duplicate edge {}",
            edge.id
        );
    }

    assert_eq!(
        diagram.badges().count(),
        diagram.lane_count() + diagram.section_count(),
        "{rel}: one badge per lane and section"
    );

    let mut positions = HashSet::new();
    for member in diagram.nodes.iter().filter(|n| !n.is_synthetic()) {
        assert!(
            positions.insert((member.x.to_bits(), member.y.to_bits())),
            "{rel}: `{}` shares a position",
            member.id
        );
    }

    let again = normalize_graph(&diagram.nodes, &diagram.edges, BoundaryEdgePolicy::Drop);
    assert_eq!(again.nodes, diagram.nodes, "{rel}: normalize is not idempotent");
    assert_eq!(again.edges, diagram.edges, "{rel}: normalize is not idempotent");
    assert_eq!(again.drops.total(), 0, "{rel}: second pass dropped items");
}

#[test]
fn positioned_fixtures_hold_invariants() {
    // Keep this list explicit so new fixtures must be added intentionally.
    let candidates = [
        "lane_and_section.mmd",
        "duplicate_boundaries.mmd",
        "undeclared_endpoint.mmd",
        "streaming_template.mmd",
        "unclassified_group.mmd",
    ];
    for rel in candidates {
        let diagram = positioned(rel);
        assert_invariants(&diagram, rel);
        let json = LayoutDump::from_diagram(&diagram).to_json(true).unwrap();
        assert!(json.contains("\"laneMetadata\": true"), "{rel}: dump");
    }
}

#[test]
fn lane_and_section_fixture() {
    let diagram = positioned("lane_and_section.mmd");
    assert_eq!(diagram.lane_count(), 1);
    assert_eq!(diagram.section_count(), 1);
    assert_eq!(diagram.badges().count(), 2);
    assert_eq!(diagram.edges.len(), 1);
    // Lane badges sit left of every member, section badges above.
    let lane_badge = node(&diagram, "lane_label_0");
    let section_badge = node(&diagram, "section_label_0");
    for id in ["k", "c", "s"] {
        let member = node(&diagram, id);
        assert!(lane_badge.right() <= member.x, "{id}");
        assert!(section_badge.bottom() <= member.y, "{id}");
    }
}

#[test]
fn plain_flowchart_reports_no_lane_metadata() {
    let outcome = run_fixture("no_groups.mmd", &Config::default());
    let Outcome::NoLaneMetadata(graph) = &outcome else {
        panic!("expected no lane metadata");
    };
    assert_eq!(graph.nodes.len(), 3);
    let dump = LayoutDump::from_outcome(&outcome);
    assert!(!dump.lane_metadata);
    assert!(dump.nodes.iter().all(|n| n.geometry.is_none()));
}

#[test]
fn duplicate_boundaries_collapse_and_drop_edges() {
    let diagram = positioned("duplicate_boundaries.mmd");
    let boundaries: Vec<&LayoutNode> = diagram
        .nodes
        .iter()
        .filter(|n| n.data.layout_type == Some(LayoutType::Boundary))
        .collect();
    assert_eq!(boundaries.len(), 1);
    assert_eq!(boundaries[0].data.component_type, "account_boundary_snowflake");
    assert!(diagram.node("sf_copy").is_none());
    assert!(diagram.edges.iter().all(|e| e.target != "sf_copy"));
    assert_eq!(diagram.diagnostics.drops.boundary_edges, 1);
    // Members of the removed boundary stay, inside the surviving one.
    let survivor = boundaries[0];
    let curated = node(&diagram, "curated");
    assert!(survivor.x <= curated.x && curated.right() <= survivor.right());
    assert!(survivor.y <= curated.y && curated.bottom() <= survivor.bottom());
    assert!(diagram.width >= survivor.right() && diagram.height >= survivor.bottom());
}

#[test]
fn unclassified_group_is_a_warning() {
    let diagram = positioned("unclassified_group.mmd");
    assert_eq!(
        diagram.diagnostics.warnings,
        vec![LayoutWarning::UnclassifiedGroup {
            group_id: "streaming_svcs".to_string()
        }]
    );
    assert!(!diagram.diagnostics.is_clean());
    for id in ["producer", "kafka", "kinesis", "connector"] {
        assert_eq!(node(&diagram, id).data.lane.as_deref(), Some("lane_1a"), "{id}");
    }
    let json = LayoutDump::from_diagram(&diagram).to_json(false).unwrap();
    assert!(json.contains(r#"{"kind":"unclassifiedGroup","groupId":"streaming_svcs"}"#));
}

#[test]
fn remap_policy_keeps_boundary_edges() {
    let mut config = Config::default();
    config.normalize.boundary_edge_policy = BoundaryEdgePolicy::Remap;
    let diagram = run_fixture("duplicate_boundaries.mmd", &config)
        .into_positioned()
        .unwrap();
    assert!(
        diagram
            .edges
            .iter()
            .any(|e| e.source == "raw" && e.target == "sf_main")
    );
    assert_invariants(&diagram, "duplicate_boundaries.mmd (remap)");
}

#[test]
fn undeclared_endpoint_becomes_default_node() {
    let diagram = positioned("undeclared_endpoint.mmd");
    let hub = node(&diagram, "hub");
    assert_eq!(hub.data.component_type, "component");
    assert_eq!(hub.data.lane, None);
    assert_eq!(diagram.diagnostics.drops.self_loops, 1);
    assert_eq!(diagram.edges.len(), 2);
}

#[test]
fn streaming_template_layout() {
    let diagram = positioned("streaming_template.mmd");
    assert_eq!(diagram.lane_count(), 1);
    assert_eq!(diagram.section_count(), 3);
    assert!(diagram.diagnostics.warnings.is_empty());

    let boundary_types: HashSet<&str> = diagram
        .nodes
        .iter()
        .filter(|n| n.data.layout_type == Some(LayoutType::Boundary))
        .map(|n| n.data.component_type.as_str())
        .collect();
    assert_eq!(
        boundary_types,
        HashSet::from(["account_boundary_aws", "account_boundary_snowflake"])
    );

    // Sections run left to right in order of appearance.
    let columns: Vec<f32> = ["kafka", "pipe", "dt", "app"]
        .iter()
        .map(|id| node(&diagram, id).x)
        .collect();
    assert!(columns.windows(2).all(|w| w[0] < w[1]), "{columns:?}");
    assert!(node(&diagram, "section_label_0").x < node(&diagram, "section_label_1").x);
    assert!(node(&diagram, "section_label_1").x < node(&diagram, "section_label_2").x);

    let sf = node(&diagram, "sf");
    for id in ["pipe", "dt", "app"] {
        let member = node(&diagram, id);
        assert!(sf.x <= member.x && member.right() <= sf.right(), "{id}");
        assert!(sf.y <= member.y && member.bottom() <= sf.bottom(), "{id}");
        assert_eq!(member.data.section.as_deref().map(|s| s.starts_with("section_")), Some(true));
    }
    assert_eq!(node(&diagram, "prod").data.lane.as_deref(), Some("path_1a"));

    assert_eq!(node(&diagram, "pipe").data.icon.as_deref(), Some("snowpipe"));
    assert_eq!(node(&diagram, "app").data.icon.as_deref(), Some("streamlit"));
    assert_eq!(node(&diagram, "sf").data.icon.as_deref(), Some("snowflake"));
    let labelled = diagram
        .edges
        .iter()
        .find(|e| e.source == "kafka" && e.target == "pipe")
        .unwrap();
    assert_eq!(labelled.label.as_deref(), Some("rows"));
}

#[test]
fn cancelled_run_returns_early() {
    let err = run_pipeline(
        &fixture("streaming_template.mmd"),
        &Config::default(),
        &AtomicBool::new(true),
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "pipeline cancelled before classify");
}
