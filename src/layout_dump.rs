use crate::ir::Graph;
use crate::layout::{LayoutEdge, LayoutNode, NodeData};
use crate::pipeline::{Band, Diagnostics, Outcome, PositionedDiagram};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDump {
    pub direction: String,
    pub width: f32,
    pub height: f32,
    pub lane_metadata: bool,
    pub lanes: Vec<Band>,
    pub sections: Vec<Band>,
    pub nodes: Vec<NodeDump>,
    pub edges: Vec<LayoutEdge>,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Serialize)]
pub struct NodeDump {
    pub id: String,
    #[serde(flatten)]
    pub geometry: Option<Geometry>,
    pub data: NodeData,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Geometry {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl NodeDump {
    fn from_layout(node: &LayoutNode) -> Self {
        NodeDump {
            id: node.id.clone(),
            geometry: Some(Geometry {
                x: node.x,
                y: node.y,
                width: node.width,
                height: node.height,
            }),
            data: node.data.clone(),
        }
    }
}

impl LayoutDump {
    pub fn from_outcome(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Positioned(diagram) => Self::from_diagram(diagram),
            Outcome::NoLaneMetadata(graph) => Self::from_graph(graph),
        }
    }

    pub fn from_diagram(diagram: &PositionedDiagram) -> Self {
        LayoutDump {
            direction: diagram.direction.as_token().to_string(),
            width: diagram.width,
            height: diagram.height,
            lane_metadata: true,
            lanes: diagram.lanes.clone(),
            sections: diagram.sections.clone(),
            nodes: diagram.nodes.iter().map(NodeDump::from_layout).collect(),
            edges: diagram.edges.clone(),
            diagnostics: diagram.diagnostics.clone(),
        }
    }

    /// Unpositioned dump for graphs without lane metadata.
    pub fn from_graph(graph: &Graph) -> Self {
        let nodes = graph
            .nodes
            .iter()
            .map(|node| NodeDump {
                id: node.id.clone(),
                geometry: None,
                data: NodeData {
                    label: node.label.clone(),
                    component_type: node.component_type.clone(),
                    layout_type: None,
                    lane: None,
                    section: None,
                    badge_label: None,
                    icon: None,
                },
            })
            .collect();
        let edges = graph
            .edges
            .iter()
            .map(|edge| LayoutEdge {
                id: edge.id.clone(),
                source: edge.source.clone(),
                target: edge.target.clone(),
                label: edge.label.clone(),
            })
            .collect();

        LayoutDump {
            direction: graph.direction.as_token().to_string(),
            width: 0.0,
            height: 0.0,
            lane_metadata: false,
            lanes: Vec::new(),
            sections: Vec::new(),
            nodes,
            edges,
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

pub fn write_layout_dump(path: &Path, outcome: &Outcome, pretty: bool) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let dump = LayoutDump::from_outcome(outcome);
    if pretty {
        serde_json::to_writer_pretty(&mut writer, &dump)?;
    } else {
        serde_json::to_writer(&mut writer, &dump)?;
    }
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::pipeline::run_pipeline;
    use std::sync::atomic::AtomicBool;

    fn dump(input: &str) -> serde_json::Value {
        let outcome = run_pipeline(input, &Config::default(), &AtomicBool::new(false)).unwrap();
        let json = LayoutDump::from_outcome(&outcome).to_json(false).unwrap();
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn positioned_dump_has_camel_case_fields() {
        let value = dump(
            "flowchart LR\nsubgraph lane_1a[\"1a - Kafka\"]\nk[Kafka] --> c[Connector]\nend",
        );
        assert_eq!(value["direction"], "LR");
        assert_eq!(value["laneMetadata"], true);
        assert_eq!(value["lanes"][0]["badgeLabel"], "1a");
        let badge = value["nodes"]
            .as_array()
            .unwrap()
            .iter()
            .find(|node| node["id"] == "lane_label_0")
            .unwrap();
        assert_eq!(badge["data"]["layoutType"], "lane_badge");
        assert!(badge["x"].is_number());
        assert_eq!(value["diagnostics"]["drops"]["danglingEdges"], 0);
        assert_eq!(value["edges"][0]["source"], "k");
    }

    #[test]
    fn plain_graph_dump_has_no_geometry() {
        let value = dump("flowchart TD\nA --> B");
        assert_eq!(value["laneMetadata"], false);
        assert_eq!(value["direction"], "TD");
        let first = &value["nodes"][0];
        assert_eq!(first["id"], "A");
        assert!(first.get("x").is_none());
        assert_eq!(first["data"]["componentType"], "component");
    }
}
