use std::fmt;

use serde::Serialize;

use crate::ir::Direction;

/// Measured extent of a wrapped label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextBlock {
    pub width: f32,
    pub height: f32,
}

/// Marks nodes the layout engine synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutType {
    LaneBadge,
    SectionBadge,
    Boundary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    pub label: String,
    pub component_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout_type: Option<LayoutType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lane: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutNode {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub data: NodeData,
}

impl LayoutNode {
    pub fn is_synthetic(&self) -> bool {
        self.data.layout_type.is_some()
    }

    pub fn is_badge(&self) -> bool {
        matches!(
            self.data.layout_type,
            Some(LayoutType::LaneBadge | LayoutType::SectionBadge)
        )
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LayoutWarning {
    /// A node names a group that does not exist; it lands in the default cell.
    #[serde(rename_all = "camelCase")]
    UnknownGroup { node_id: String, group_id: String },
    /// A lane inside a lane, or a section inside a section.
    #[serde(rename_all = "camelCase")]
    NestedRole { group_id: String, outer_id: String },
    #[serde(rename_all = "camelCase")]
    EmptyBoundary { group_id: String },
    /// A group holding nodes matched no lane, section or boundary rule.
    #[serde(rename_all = "camelCase")]
    UnclassifiedGroup { group_id: String },
}

impl fmt::Display for LayoutWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownGroup { node_id, group_id } => {
                write!(f, "node `{node_id}` refers to unknown group `{group_id}`")
            }
            Self::NestedRole { group_id, outer_id } => {
                write!(f, "group `{group_id}` repeats the role of enclosing `{outer_id}`")
            }
            Self::EmptyBoundary { group_id } => {
                write!(f, "boundary `{group_id}` contains no nodes")
            }
            Self::UnclassifiedGroup { group_id } => {
                write!(f, "group `{group_id}` has no layout role")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct LaneLayout {
    pub direction: Direction,
    /// Draw order: boundaries, members, badges.
    pub nodes: Vec<LayoutNode>,
    pub edges: Vec<LayoutEdge>,
    pub width: f32,
    pub height: f32,
    /// Bottom-right corner of the lane × section grid itself.
    pub grid_width: f32,
    pub grid_height: f32,
    pub lane_count: usize,
    pub section_count: usize,
    pub warnings: Vec<LayoutWarning>,
}

impl LaneLayout {
    pub fn badge_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_badge()).count()
    }
}
