use std::collections::HashMap;

pub const DEFAULT_COMPONENT_TYPE: &str = "component";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    TopDown,
    BottomTop,
    LeftRight,
    RightLeft,
}

impl Direction {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "TD" | "TB" => Some(Self::TopDown),
            "BT" => Some(Self::BottomTop),
            "LR" => Some(Self::LeftRight),
            "RL" => Some(Self::RightLeft),
            _ => None,
        }
    }

    pub fn as_token(self) -> &'static str {
        match self {
            Self::TopDown => "TD",
            Self::BottomTop => "BT",
            Self::LeftRight => "LR",
            Self::RightLeft => "RL",
        }
    }

    /// Whether ranks advance along the x axis.
    pub fn is_horizontal(self) -> bool {
        matches!(self, Self::LeftRight | Self::RightLeft)
    }

    pub fn is_reversed(self) -> bool {
        matches!(self, Self::BottomTop | Self::RightLeft)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeShape {
    Rectangle,
    RoundRect,
    Stadium,
    Subroutine,
    Cylinder,
    Circle,
    Diamond,
    Hexagon,
    Parallelogram,
    ParallelogramAlt,
    Trapezoid,
    TrapezoidAlt,
    Asymmetric,
}

impl NodeShape {
    /// componentType implied by the bracket style of a declaration.
    pub fn component_hint(self) -> &'static str {
        match self {
            Self::Rectangle => DEFAULT_COMPONENT_TYPE,
            Self::RoundRect | Self::Stadium => "service",
            Self::Subroutine => "function",
            Self::Cylinder => "database",
            Self::Circle => "endpoint",
            Self::Diamond => "decision",
            Self::Hexagon => "process",
            Self::Parallelogram
            | Self::ParallelogramAlt
            | Self::Trapezoid
            | Self::TrapezoidAlt => "io",
            Self::Asymmetric => "signal",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub label: String,
    pub component_type: String,
    pub shape: Option<NodeShape>,
    pub group_id: Option<String>,
    pub order: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupChild {
    Node(String),
    Group(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub id: String,
    pub label: String,
    pub parent_id: Option<String>,
    pub children: Vec<GroupChild>,
    pub order: usize,
    pub depth: usize,
}

impl Group {
    pub fn child_group_ids(&self) -> impl Iterator<Item = &str> {
        self.children.iter().filter_map(|child| match child {
            GroupChild::Group(id) => Some(id.as_str()),
            GroupChild::Node(_) => None,
        })
    }
}

/// One parse snapshot. Nodes, edges and groups are kept in source order.
#[derive(Debug, Clone)]
pub struct Graph {
    pub direction: Direction,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub groups: Vec<Group>,
    node_index: HashMap<String, usize>,
    group_index: HashMap<String, usize>,
}

impl Graph {
    pub fn new() -> Self {
        Self {
            direction: Direction::TopDown,
            nodes: Vec::new(),
            edges: Vec::new(),
            groups: Vec::new(),
            node_index: HashMap::new(),
            group_index: HashMap::new(),
        }
    }

    /// Builds a graph from already-ordered parts (used by consumers that
    /// assemble graphs without going through the parser).
    pub fn from_parts(
        direction: Direction,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        groups: Vec<Group>,
    ) -> Self {
        let mut graph = Self {
            direction,
            nodes,
            edges,
            groups,
            node_index: HashMap::new(),
            group_index: HashMap::new(),
        };
        graph.reindex();
        graph
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.node_index.get(id).map(|idx| &self.nodes[*idx])
    }

    pub fn group(&self, id: &str) -> Option<&Group> {
        self.group_index.get(id).map(|idx| &self.groups[*idx])
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    pub fn contains_group(&self, id: &str) -> bool {
        self.group_index.contains_key(id)
    }

    pub fn top_level_groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter().filter(|group| group.parent_id.is_none())
    }

    pub(crate) fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        let idx = *self.node_index.get(id)?;
        self.nodes.get_mut(idx)
    }

    pub(crate) fn group_mut(&mut self, id: &str) -> Option<&mut Group> {
        let idx = *self.group_index.get(id)?;
        self.groups.get_mut(idx)
    }

    pub(crate) fn push_node(&mut self, node: Node) {
        self.node_index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
    }

    pub(crate) fn push_group(&mut self, group: Group) {
        self.group_index.insert(group.id.clone(), self.groups.len());
        self.groups.push(group);
    }

    pub(crate) fn retain_nodes(&mut self, mut keep: impl FnMut(&Node) -> bool) {
        self.nodes.retain(|node| keep(node));
        self.reindex();
    }

    fn reindex(&mut self) {
        self.node_index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (node.id.clone(), idx))
            .collect();
        self.group_index = self
            .groups
            .iter()
            .enumerate()
            .map(|(idx, group)| (group.id.clone(), idx))
            .collect();
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_tokens_are_case_insensitive() {
        assert_eq!(Direction::from_token("lr"), Some(Direction::LeftRight));
        assert_eq!(Direction::from_token("TB"), Some(Direction::TopDown));
        assert_eq!(Direction::from_token("XY"), None);
        assert!(Direction::RightLeft.is_horizontal());
        assert!(Direction::BottomTop.is_reversed());
    }

    #[test]
    fn from_parts_indexes_nodes_and_groups() {
        let node = Node {
            id: "a".to_string(),
            label: "A".to_string(),
            component_type: DEFAULT_COMPONENT_TYPE.to_string(),
            shape: None,
            group_id: Some("g".to_string()),
            order: 0,
        };
        let group = Group {
            id: "g".to_string(),
            label: "G".to_string(),
            parent_id: None,
            children: vec![GroupChild::Node("a".to_string())],
            order: 0,
            depth: 0,
        };
        let graph = Graph::from_parts(Direction::LeftRight, vec![node], Vec::new(), vec![group]);
        assert!(graph.contains_node("a"));
        assert_eq!(graph.group("g").map(|g| g.label.as_str()), Some("G"));
        assert_eq!(graph.top_level_groups().count(), 1);
    }
}
