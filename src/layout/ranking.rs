use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::ir::Edge;

/// Kahn's algorithm over the edges whose endpoints are both in `node_ids`.
/// Ready nodes leave in declaration order; a cycle is broken by taking the
/// earliest remaining node.
pub(super) fn topological_order(
    node_ids: &[String],
    edges: &[Edge],
    node_order: &HashMap<String, usize>,
) -> Vec<String> {
    let set: HashSet<&str> = node_ids.iter().map(String::as_str).collect();
    let mut adj: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut indeg: HashMap<&str, usize> = set.iter().map(|id| (*id, 0)).collect();

    for edge in edges {
        let (from, to) = (edge.source.as_str(), edge.target.as_str());
        if set.contains(from) && set.contains(to) {
            adj.entry(from).or_default().push(to);
            if let Some(deg) = indeg.get_mut(to) {
                *deg += 1;
            }
        }
    }

    let fallback_order: HashMap<&str, usize> = node_ids
        .iter()
        .enumerate()
        .map(|(idx, id)| (id.as_str(), idx))
        .collect();
    let order_key = |id: &str| -> usize {
        node_order
            .get(id)
            .copied()
            .unwrap_or_else(|| fallback_order.get(id).copied().unwrap_or(usize::MAX))
    };

    let mut ready: BinaryHeap<Reverse<(usize, &str)>> = BinaryHeap::new();
    for (id, deg) in &indeg {
        if *deg == 0 {
            ready.push(Reverse((order_key(id), *id)));
        }
    }

    let mut order = Vec::with_capacity(set.len());
    let mut processed: HashSet<&str> = HashSet::new();
    loop {
        while let Some(Reverse((_key, id))) = ready.pop() {
            if !processed.insert(id) {
                continue;
            }
            order.push(id.to_string());
            for next in adj.get(id).into_iter().flatten() {
                if processed.contains(next) {
                    continue;
                }
                if let Some(deg) = indeg.get_mut(next) {
                    *deg = deg.saturating_sub(1);
                    if *deg == 0 {
                        ready.push(Reverse((order_key(next), *next)));
                    }
                }
            }
        }

        if processed.len() >= set.len() {
            break;
        }

        // Cycle: the earliest remaining node becomes the next source.
        let best = set
            .iter()
            .filter(|id| !processed.contains(*id))
            .min_by_key(|id| (order_key(id), **id));
        match best {
            Some(id) => ready.push(Reverse((order_key(id), *id))),
            None => break,
        }
    }

    order
}

/// Longest-path layering on top of [`topological_order`]. Edges that point
/// backwards in the order are ignored.
pub(super) fn compute_ranks_subset(
    node_ids: &[String],
    edges: &[Edge],
    node_order: &HashMap<String, usize>,
) -> HashMap<String, usize> {
    let order = topological_order(node_ids, edges, node_order);
    let set: HashSet<&str> = node_ids.iter().map(String::as_str).collect();
    let order_index: HashMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(idx, id)| (id.as_str(), idx))
        .collect();

    let mut adj: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in edges {
        let (from, to) = (edge.source.as_str(), edge.target.as_str());
        if set.contains(from) && set.contains(to) {
            adj.entry(from).or_default().push(to);
        }
    }

    let mut ranks: HashMap<String, usize> = HashMap::new();
    for node in &order {
        let rank = *ranks.entry(node.clone()).or_insert(0);
        let from_idx = order_index.get(node.as_str()).copied().unwrap_or(0);
        for next in adj.get(node.as_str()).into_iter().flatten() {
            let to_idx = order_index.get(next).copied().unwrap_or(from_idx);
            if to_idx <= from_idx {
                continue;
            }
            let entry = ranks.entry((*next).to_string()).or_insert(0);
            *entry = (*entry).max(rank + 1);
        }
    }

    ranks
}

/// Median heuristic: alternating down and up sweeps reorder each rank by
/// the median position of its neighbours in the adjacent rank.
pub(super) fn order_rank_nodes(
    rank_nodes: &mut [Vec<String>],
    edges: &[Edge],
    node_order: &HashMap<String, usize>,
    passes: usize,
) {
    if rank_nodes.len() <= 1 {
        return;
    }
    let mut incoming: HashMap<String, Vec<String>> = HashMap::new();
    let mut outgoing: HashMap<String, Vec<String>> = HashMap::new();

    for edge in edges {
        outgoing
            .entry(edge.source.clone())
            .or_default()
            .push(edge.target.clone());
        incoming
            .entry(edge.target.clone())
            .or_default()
            .push(edge.source.clone());
    }

    let mut positions: HashMap<String, usize> = HashMap::new();
    let update_positions = |rank_nodes: &mut [Vec<String>],
                            positions: &mut HashMap<String, usize>| {
        positions.clear();
        for bucket in rank_nodes.iter() {
            for (idx, node_id) in bucket.iter().enumerate() {
                positions.insert(node_id.clone(), idx);
            }
        }
    };

    update_positions(rank_nodes, &mut positions);

    let sort_bucket = |bucket: &mut Vec<String>,
                       neighbors: &HashMap<String, Vec<String>>,
                       positions: &HashMap<String, usize>| {
        let current_positions: HashMap<String, usize> = bucket
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.clone(), idx))
            .collect();
        bucket.sort_by(|a, b| {
            let a_score = median_position(a, neighbors, positions, &current_positions);
            let b_score = median_position(b, neighbors, positions, &current_positions);
            match a_score.partial_cmp(&b_score) {
                Some(std::cmp::Ordering::Equal) | None => {
                    let a_pos = current_positions.get(a).copied().unwrap_or(0);
                    let b_pos = current_positions.get(b).copied().unwrap_or(0);
                    a_pos.cmp(&b_pos).then_with(|| {
                        node_order
                            .get(a)
                            .copied()
                            .unwrap_or(usize::MAX)
                            .cmp(&node_order.get(b).copied().unwrap_or(usize::MAX))
                    })
                }
                Some(ordering) => ordering,
            }
        });
    };

    for _ in 0..passes.max(1) {
        for rank in 1..rank_nodes.len() {
            if rank_nodes[rank].len() <= 1 {
                continue;
            }
            sort_bucket(&mut rank_nodes[rank], &incoming, &positions);
            update_positions(rank_nodes, &mut positions);
        }
        for rank in (0..rank_nodes.len() - 1).rev() {
            if rank_nodes[rank].len() <= 1 {
                continue;
            }
            sort_bucket(&mut rank_nodes[rank], &outgoing, &positions);
            update_positions(rank_nodes, &mut positions);
        }
    }
}

pub(super) fn median_position(
    node_id: &str,
    neighbors: &HashMap<String, Vec<String>>,
    positions: &HashMap<String, usize>,
    current_positions: &HashMap<String, usize>,
) -> f32 {
    let own = || *current_positions.get(node_id).unwrap_or(&0) as f32;
    let Some(list) = neighbors.get(node_id) else {
        return own();
    };
    let mut values: Vec<f32> = list
        .iter()
        .filter_map(|neighbor| positions.get(neighbor))
        .map(|pos| *pos as f32)
        .collect();
    if values.is_empty() {
        return own();
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) * 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(source: &str, target: &str) -> Edge {
        Edge {
            id: format!("{source}-{target}"),
            source: source.to_string(),
            target: target.to_string(),
            label: None,
        }
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|id| id.to_string()).collect()
    }

    fn order_of(list: &[&str]) -> HashMap<String, usize> {
        list.iter()
            .enumerate()
            .map(|(idx, id)| (id.to_string(), idx))
            .collect()
    }

    #[test]
    fn topological_order_puts_sources_first() {
        let nodes = ids(&["c", "b", "a"]);
        let edges = vec![edge("a", "b"), edge("b", "c")];
        let order = topological_order(&nodes, &edges, &order_of(&["c", "b", "a"]));
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn topological_order_breaks_cycles_by_declaration() {
        let nodes = ids(&["x", "y", "z"]);
        let edges = vec![edge("x", "y"), edge("y", "x"), edge("y", "z")];
        let order = topological_order(&nodes, &edges, &order_of(&["x", "y", "z"]));
        assert_eq!(order, vec!["x", "y", "z"]);
    }

    #[test]
    fn ranks_follow_longest_path() {
        let nodes = ids(&["a", "b", "c", "d"]);
        let edges = vec![edge("a", "b"), edge("b", "c"), edge("a", "c"), edge("d", "z")];
        let ranks = compute_ranks_subset(&nodes, &edges, &order_of(&["a", "b", "c", "d"]));
        assert_eq!(ranks["a"], 0);
        assert_eq!(ranks["b"], 1);
        assert_eq!(ranks["c"], 2);
        assert_eq!(ranks["d"], 0);
    }

    #[test]
    fn median_ordering_untangles_crossing() {
        let mut ranks = vec![ids(&["a", "b"]), ids(&["y", "x"])];
        let edges = vec![edge("a", "x"), edge("b", "y")];
        order_rank_nodes(&mut ranks, &edges, &order_of(&["a", "b", "x", "y"]), 2);
        assert_eq!(ranks[1], ids(&["x", "y"]));
    }
}
