mod ranking;
mod text;
pub(crate) mod types;
pub use types::*;
use ranking::*;
use text::*;

use crate::classify::{Classification, LayoutRole};
use crate::config::LayoutConfig;
use crate::ir::{Direction, Edge, Graph, GroupChild};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

const BADGE_COMPONENT_TYPE: &str = "badge";
const BADGE_TEXT_PAD: f32 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Row {
    Lane(usize),
    /// Nodes outside every lane; drawn last.
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Column {
    /// Nodes outside every section; drawn first.
    Default,
    Section(usize),
}

type CellKey = (Row, Column);

/// Nearest enclosing lane and section while walking the group tree.
#[derive(Debug, Clone, Copy, Default)]
struct Context<'a> {
    lane: Option<&'a str>,
    section: Option<&'a str>,
}

#[derive(Debug, Clone)]
struct CellAssignment {
    node_id: String,
    lane: Option<String>,
    section: Option<String>,
}

/// Accumulated by [`assign_cells`]; `placed` holds every node that already
/// has a cell.
#[derive(Debug, Default)]
struct Placement {
    placed: BTreeSet<String>,
    assignments: Vec<CellAssignment>,
    warnings: Vec<LayoutWarning>,
    unclassified: BTreeSet<String>,
}

impl Placement {
    fn note_unclassified(&mut self, group_id: &str) {
        if self.unclassified.insert(group_id.to_string()) {
            self.warnings.push(LayoutWarning::UnclassifiedGroup {
                group_id: group_id.to_string(),
            });
        }
    }
}

#[derive(Debug, Default)]
struct CellLayout {
    width: f32,
    height: f32,
    /// Member positions relative to the cell's content origin.
    positions: Vec<(String, f32, f32)>,
}

pub fn compute_lane_layout(
    graph: &Graph,
    classes: &Classification,
    config: &LayoutConfig,
) -> LaneLayout {
    let lanes = classes.lanes();
    let sections = classes.sections();
    let lane_row: HashMap<&str, usize> = lanes
        .iter()
        .enumerate()
        .map(|(row, (id, _))| (*id, row))
        .collect();
    let section_col: HashMap<&str, usize> = sections
        .iter()
        .enumerate()
        .map(|(col, (id, _))| (*id, col))
        .collect();

    let mut placement = Placement::default();
    for group in graph.top_level_groups() {
        placement = assign_cells(graph, classes, &group.id, Context::default(), placement);
    }
    placement = place_remaining(graph, classes, placement);
    let Placement {
        assignments,
        mut warnings,
        ..
    } = placement;

    let node_order: HashMap<String, usize> = graph
        .nodes
        .iter()
        .map(|node| (node.id.clone(), node.order))
        .collect();
    let all_ids: Vec<String> = graph.nodes.iter().map(|node| node.id.clone()).collect();
    let flow_index: HashMap<String, usize> = topological_order(&all_ids, &graph.edges, &node_order)
        .into_iter()
        .enumerate()
        .map(|(idx, id)| (id, idx))
        .collect();

    let mut cells: BTreeMap<CellKey, Vec<String>> = BTreeMap::new();
    let mut membership: HashMap<&str, (Option<&str>, Option<&str>)> = HashMap::new();
    for assignment in &assignments {
        let row = assignment
            .lane
            .as_deref()
            .and_then(|lane| lane_row.get(lane))
            .map_or(Row::Default, |row| Row::Lane(*row));
        let col = assignment
            .section
            .as_deref()
            .and_then(|section| section_col.get(section))
            .map_or(Column::Default, |col| Column::Section(*col));
        cells
            .entry((row, col))
            .or_default()
            .push(assignment.node_id.clone());
        membership.insert(
            assignment.node_id.as_str(),
            (assignment.lane.as_deref(), assignment.section.as_deref()),
        );
    }

    for ((_, col), members) in cells.iter_mut() {
        match col {
            Column::Default => {
                members.sort_by_key(|id| flow_index.get(id).copied().unwrap_or(usize::MAX))
            }
            Column::Section(_) => {
                members.sort_by_key(|id| node_order.get(id).copied().unwrap_or(usize::MAX))
            }
        }
    }

    let sizes: HashMap<&str, (f32, f32)> = graph
        .nodes
        .iter()
        .map(|node| (node.id.as_str(), node_size(&node.label, config)))
        .collect();
    let cell_layouts: BTreeMap<CellKey, CellLayout> = cells
        .iter()
        .map(|(key, members)| {
            (
                *key,
                layout_cell(members, &graph.edges, &sizes, graph.direction, config),
            )
        })
        .collect();

    let grid = &config.grid;
    let has_default_row = cells.keys().any(|(row, _)| *row == Row::Default);
    let has_default_col = cells.keys().any(|(_, col)| *col == Column::Default);
    let rows: Vec<Row> = (0..lanes.len())
        .map(Row::Lane)
        .chain(has_default_row.then_some(Row::Default))
        .collect();
    let cols: Vec<Column> = has_default_col
        .then_some(Column::Default)
        .into_iter()
        .chain((0..sections.len()).map(Column::Section))
        .collect();

    let row_heights: Vec<f32> = rows
        .iter()
        .map(|row| {
            cell_layouts
                .iter()
                .filter(|((r, _), _)| r == row)
                .map(|(_, cell)| cell.height + grid.cell_padding * 2.0)
                .fold(grid.min_cell_height, f32::max)
        })
        .collect();
    let col_widths: Vec<f32> = cols
        .iter()
        .map(|col| {
            cell_layouts
                .iter()
                .filter(|((_, c), _)| c == col)
                .map(|(_, cell)| cell.width + grid.cell_padding * 2.0)
                .fold(grid.min_cell_width, f32::max)
        })
        .collect();

    let lane_badge_sizes: Vec<(f32, f32)> = lanes
        .iter()
        .map(|(_, info)| badge_size(&info.badge_label, config))
        .collect();
    let section_badge_sizes: Vec<(f32, f32)> = sections
        .iter()
        .map(|(_, info)| badge_size(&info.badge_label, config))
        .collect();
    let origin_x = lane_badge_sizes
        .iter()
        .map(|(w, _)| *w + grid.badge_gap)
        .fold(0.0, f32::max);
    let origin_y = section_badge_sizes
        .iter()
        .map(|(_, h)| *h + grid.badge_gap)
        .fold(0.0, f32::max);

    let row_y = cumulative_offsets(origin_y, &row_heights, grid.row_gap);
    let col_x = cumulative_offsets(origin_x, &col_widths, grid.column_gap);
    let row_pos: HashMap<Row, usize> = rows.iter().enumerate().map(|(i, r)| (*r, i)).collect();
    let col_pos: HashMap<Column, usize> = cols.iter().enumerate().map(|(i, c)| (*c, i)).collect();

    let mut members: Vec<LayoutNode> = Vec::with_capacity(graph.nodes.len());
    for ((row, col), cell) in &cell_layouts {
        let (Some(ri), Some(ci)) = (row_pos.get(row).copied(), col_pos.get(col).copied()) else {
            continue;
        };
        let offset_x = col_x[ci] + (col_widths[ci] - cell.width) / 2.0;
        let offset_y = row_y[ri] + (row_heights[ri] - cell.height) / 2.0;
        for (node_id, local_x, local_y) in &cell.positions {
            let Some(node) = graph.node(node_id) else {
                continue;
            };
            let (width, height) = sizes.get(node_id.as_str()).copied().unwrap_or_default();
            let (lane, section) = membership
                .get(node_id.as_str())
                .copied()
                .unwrap_or((None, None));
            members.push(LayoutNode {
                id: node.id.clone(),
                x: offset_x + local_x,
                y: offset_y + local_y,
                width,
                height,
                data: NodeData {
                    label: node.label.clone(),
                    component_type: node.component_type.clone(),
                    layout_type: None,
                    lane: lane.map(str::to_string),
                    section: section.map(str::to_string),
                    badge_label: None,
                    icon: None,
                },
            });
        }
    }

    let mut used_ids: HashSet<String> = graph.nodes.iter().map(|node| node.id.clone()).collect();
    let boundaries = boundary_nodes(
        graph,
        classes,
        &members,
        config,
        &mut used_ids,
        &mut warnings,
    );

    let mut badges = Vec::with_capacity(lanes.len() + sections.len());
    for (row, ((group_id, info), (width, height))) in
        lanes.iter().zip(lane_badge_sizes.iter()).enumerate()
    {
        let (row_top, row_height) = (row_y[row], row_heights[row]);
        badges.push(LayoutNode {
            id: reserve_id(&mut used_ids, &format!("lane_label_{}", info.index)),
            x: 0.0,
            y: row_top + (row_height - height) / 2.0,
            width: *width,
            height: *height,
            data: NodeData {
                label: info.badge_label.clone(),
                component_type: BADGE_COMPONENT_TYPE.to_string(),
                layout_type: Some(LayoutType::LaneBadge),
                lane: Some(group_id.to_string()),
                section: None,
                badge_label: Some(info.badge_label.clone()),
                icon: None,
            },
        });
    }
    let section_offset = usize::from(has_default_col);
    for (col, ((group_id, info), (width, height))) in
        sections.iter().zip(section_badge_sizes.iter()).enumerate()
    {
        let ci = col + section_offset;
        badges.push(LayoutNode {
            id: reserve_id(&mut used_ids, &format!("section_label_{}", info.index)),
            x: col_x[ci] + (col_widths[ci] - width) / 2.0,
            y: 0.0,
            width: *width,
            height: *height,
            data: NodeData {
                label: info.badge_label.clone(),
                component_type: BADGE_COMPONENT_TYPE.to_string(),
                layout_type: Some(LayoutType::SectionBadge),
                lane: None,
                section: Some(group_id.to_string()),
                badge_label: Some(info.badge_label.clone()),
                icon: None,
            },
        });
    }

    let grid_right = col_x
        .last()
        .zip(col_widths.last())
        .map_or(origin_x, |(x, w)| x + w);
    let grid_bottom = row_y
        .last()
        .zip(row_heights.last())
        .map_or(origin_y, |(y, h)| y + h);

    let mut nodes = boundaries;
    nodes.extend(members);
    nodes.extend(badges);
    let (width, height) = diagram_extent(&nodes, grid_right, grid_bottom);

    for warning in &warnings {
        tracing::warn!(%warning, "lane layout degraded");
    }
    tracing::debug!(
        lanes = lanes.len(),
        sections = sections.len(),
        nodes = nodes.len(),
        width,
        height,
        "computed lane layout"
    );

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

    LaneLayout {
        direction: graph.direction,
        nodes,
        edges,
        width,
        height,
        grid_width: grid_right,
        grid_height: grid_bottom,
        lane_count: lanes.len(),
        section_count: sections.len(),
        warnings,
    }
}

/// Overall size: the grid extent, widened by any node that reaches past it.
pub fn diagram_extent(nodes: &[LayoutNode], grid_width: f32, grid_height: f32) -> (f32, f32) {
    let width = nodes.iter().map(LayoutNode::right).fold(grid_width, f32::max);
    let height = nodes.iter().map(LayoutNode::bottom).fold(grid_height, f32::max);
    (width, height)
}

/// Walks one group subtree in document order. A node takes the cell of the
/// first group that lists it; later claims are ignored.
fn assign_cells<'a>(
    graph: &'a Graph,
    classes: &Classification,
    group_id: &'a str,
    ctx: Context<'a>,
    mut acc: Placement,
) -> Placement {
    let Some(group) = graph.group(group_id) else {
        return acc;
    };
    let ctx = enter_group(classes, group_id, ctx, Some(&mut acc.warnings));
    let holds_nodes = group
        .children
        .iter()
        .any(|child| matches!(child, GroupChild::Node(id) if graph.contains_node(id)));
    if holds_nodes && classes.get(group_id).is_none() {
        acc.note_unclassified(group_id);
    }

    for child in &group.children {
        match child {
            GroupChild::Node(id) => {
                if graph.contains_node(id) && acc.placed.insert(id.clone()) {
                    acc.assignments.push(CellAssignment {
                        node_id: id.clone(),
                        lane: ctx.lane.map(str::to_string),
                        section: ctx.section.map(str::to_string),
                    });
                }
            }
            GroupChild::Group(child_id) => {
                acc = assign_cells(graph, classes, child_id, ctx, acc);
            }
        }
    }
    acc
}

fn enter_group<'a>(
    classes: &Classification,
    group_id: &'a str,
    mut ctx: Context<'a>,
    warnings: Option<&mut Vec<LayoutWarning>>,
) -> Context<'a> {
    let outer = match classes.get(group_id).map(|info| info.role) {
        Some(LayoutRole::Lane) => ctx.lane.replace(group_id),
        Some(LayoutRole::Section) => ctx.section.replace(group_id),
        Some(LayoutRole::Boundary) | None => None,
    };
    if let (Some(outer), Some(warnings)) = (outer, warnings) {
        warnings.push(LayoutWarning::NestedRole {
            group_id: group_id.to_string(),
            outer_id: outer.to_string(),
        });
    }
    ctx
}

/// Nodes the tree walk did not reach: either their group lists no children
/// (graphs assembled by hand) or they sit outside every group.
fn place_remaining(graph: &Graph, classes: &Classification, mut acc: Placement) -> Placement {
    for node in &graph.nodes {
        if acc.placed.contains(&node.id) {
            continue;
        }
        let mut ctx = Context::default();
        if let Some(group_id) = node.group_id.as_deref() {
            if graph.contains_group(group_id) {
                if classes.get(group_id).is_none() {
                    acc.note_unclassified(group_id);
                }
                for ancestor in ancestors(graph, Some(group_id)).into_iter().rev() {
                    ctx = enter_group(classes, ancestor, ctx, None);
                }
            } else {
                acc.warnings.push(LayoutWarning::UnknownGroup {
                    node_id: node.id.clone(),
                    group_id: group_id.to_string(),
                });
            }
        }
        acc.placed.insert(node.id.clone());
        acc.assignments.push(CellAssignment {
            node_id: node.id.clone(),
            lane: ctx.lane.map(str::to_string),
            section: ctx.section.map(str::to_string),
        });
    }
    acc
}

/// `start` and its ancestors, innermost first.
fn ancestors<'a>(graph: &'a Graph, start: Option<&'a str>) -> Vec<&'a str> {
    let mut chain = Vec::new();
    let mut current = start;
    while let Some(id) = current {
        if chain.len() > graph.groups.len() || chain.contains(&id) {
            break;
        }
        let Some(group) = graph.group(id) else {
            break;
        };
        chain.push(group.id.as_str());
        current = group.parent_id.as_deref();
    }
    chain
}

/// Layered placement of one cell. Ranks follow the edges internal to the
/// cell; nodes sharing a rank are stacked across the flow.
fn layout_cell(
    members: &[String],
    edges: &[Edge],
    sizes: &HashMap<&str, (f32, f32)>,
    direction: Direction,
    config: &LayoutConfig,
) -> CellLayout {
    if members.is_empty() {
        return CellLayout::default();
    }
    let member_set: HashSet<&str> = members.iter().map(String::as_str).collect();
    let internal: Vec<Edge> = edges
        .iter()
        .filter(|edge| {
            member_set.contains(edge.source.as_str()) && member_set.contains(edge.target.as_str())
        })
        .cloned()
        .collect();
    let member_order: HashMap<String, usize> = members
        .iter()
        .enumerate()
        .map(|(idx, id)| (id.clone(), idx))
        .collect();

    let ranks = compute_ranks_subset(members, &internal, &member_order);
    let max_rank = ranks.values().copied().max().unwrap_or(0);
    let mut buckets: Vec<Vec<String>> = vec![Vec::new(); max_rank + 1];
    for id in members {
        let rank = ranks.get(id).copied().unwrap_or(0);
        buckets[rank].push(id.clone());
    }
    order_rank_nodes(&mut buckets, &internal, &member_order, config.order_passes);

    let horizontal = direction.is_horizontal();
    // (main, cross) extents: main runs along the flow.
    let extent = |id: &str| -> (f32, f32) {
        let (w, h) = sizes.get(id).copied().unwrap_or_default();
        if horizontal { (w, h) } else { (h, w) }
    };

    let rank_main: Vec<f32> = buckets
        .iter()
        .map(|bucket| bucket.iter().map(|id| extent(id).0).fold(0.0, f32::max))
        .collect();
    let rank_cross: Vec<f32> = buckets
        .iter()
        .map(|bucket| {
            let sum: f32 = bucket.iter().map(|id| extent(id).1).sum();
            sum + config.node_spacing * bucket.len().saturating_sub(1) as f32
        })
        .collect();
    let total_main =
        rank_main.iter().sum::<f32>() + config.rank_spacing * buckets.len().saturating_sub(1) as f32;
    let total_cross = rank_cross.iter().copied().fold(0.0, f32::max);

    let mut positions = Vec::with_capacity(members.len());
    let mut main_cursor = 0.0;
    for (rank, bucket) in buckets.iter().enumerate() {
        let mut cross_cursor = (total_cross - rank_cross[rank]) / 2.0;
        for id in bucket {
            let (node_main, node_cross) = extent(id);
            let mut main = main_cursor + (rank_main[rank] - node_main) / 2.0;
            if direction.is_reversed() {
                main = total_main - main - node_main;
            }
            let (x, y) = if horizontal {
                (main, cross_cursor)
            } else {
                (cross_cursor, main)
            };
            positions.push((id.clone(), x, y));
            cross_cursor += node_cross + config.node_spacing;
        }
        main_cursor += rank_main[rank] + config.rank_spacing;
    }

    let (width, height) = if horizontal {
        (total_main, total_cross)
    } else {
        (total_cross, total_main)
    };
    CellLayout {
        width,
        height,
        positions,
    }
}

fn cumulative_offsets(origin: f32, sizes: &[f32], gap: f32) -> Vec<f32> {
    let mut offsets = Vec::with_capacity(sizes.len());
    let mut cursor = origin;
    for size in sizes {
        offsets.push(cursor);
        cursor += size + gap;
    }
    offsets
}

fn badge_size(label: &str, config: &LayoutConfig) -> (f32, f32) {
    let text = text_width(label, config.font_size) + BADGE_TEXT_PAD * 2.0;
    (text.max(config.grid.badge_width), config.grid.badge_height)
}

fn reserve_id(used: &mut HashSet<String>, base: &str) -> String {
    let mut candidate = base.to_string();
    let mut suffix = 2usize;
    while used.contains(&candidate) {
        candidate = format!("{base}_{suffix}");
        suffix += 1;
    }
    used.insert(candidate.clone());
    candidate
}

/// `(min_x, min_y, max_x, max_y)`
type Rect = (f32, f32, f32, f32);

fn grow_rect<'a>(rects: &mut HashMap<&'a str, Rect>, id: &'a str, r: Rect) {
    let entry = rects.entry(id).or_insert(r);
    *entry = (
        entry.0.min(r.0),
        entry.1.min(r.1),
        entry.2.max(r.2),
        entry.3.max(r.3),
    );
}

/// One background node per boundary group, outermost first. Rectangles
/// cover all member nodes below the group, plus nested boundaries.
fn boundary_nodes(
    graph: &Graph,
    classes: &Classification,
    members: &[LayoutNode],
    config: &LayoutConfig,
    used_ids: &mut HashSet<String>,
    warnings: &mut Vec<LayoutWarning>,
) -> Vec<LayoutNode> {
    let boundaries = classes.boundaries();
    if boundaries.is_empty() {
        return Vec::new();
    }
    let boundary_ids: HashSet<&str> = boundaries.iter().map(|(id, _)| *id).collect();

    let mut rects: HashMap<&str, Rect> = HashMap::new();
    for member in members {
        let Some(node) = graph.node(&member.id) else {
            continue;
        };
        let rect = (member.x, member.y, member.right(), member.bottom());
        for ancestor in ancestors(graph, node.group_id.as_deref()) {
            if boundary_ids.contains(ancestor) {
                grow_rect(&mut rects, ancestor, rect);
            }
        }
    }

    let pad = config.grid.boundary_padding;
    let mut by_depth: Vec<(&str, usize)> = boundaries
        .iter()
        .map(|(id, _)| (*id, graph.group(id).map_or(0, |group| group.depth)))
        .collect();
    by_depth.sort_by(|a, b| b.1.cmp(&a.1));
    let mut padded: HashMap<&str, Rect> = HashMap::new();
    for (id, _) in by_depth {
        let Some(rect) = rects.get(id).copied() else {
            continue;
        };
        let rect = (rect.0 - pad, rect.1 - pad, rect.2 + pad, rect.3 + pad);
        padded.insert(id, rect);
        let parent = graph.group(id).and_then(|group| group.parent_id.as_deref());
        for ancestor in ancestors(graph, parent) {
            if boundary_ids.contains(ancestor) {
                grow_rect(&mut rects, ancestor, rect);
            }
        }
    }

    let mut nodes = Vec::new();
    for (group_id, info) in boundaries {
        let Some((min_x, min_y, max_x, max_y)) = padded.get(group_id).copied() else {
            warnings.push(LayoutWarning::EmptyBoundary {
                group_id: group_id.to_string(),
            });
            continue;
        };
        let label = graph
            .group(group_id)
            .map(|group| group.label.clone())
            .unwrap_or_else(|| group_id.to_string());
        let component_type = info
            .provider
            .map_or_else(|| "boundary".to_string(), |p| format!("{p}_boundary"));
        nodes.push(LayoutNode {
            id: reserve_id(used_ids, group_id),
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
            data: NodeData {
                label,
                component_type,
                layout_type: Some(LayoutType::Boundary),
                lane: None,
                section: None,
                badge_label: Some(info.badge_label.clone()),
                icon: None,
            },
        });
    }
    nodes
}
