//! Split the restricted distance computation into independent sub-problems.

use std::sync::Arc;
use std::time::Instant;

use hashbrown::{HashMap, HashSet};
use tracing::{debug, info};

use super::overlap::{overlapping_pairs, pairwise_overlap};
use super::{Decomposition, Network, Scope, SubProblem};
use crate::distance::shortest_path::edge_weight;
use crate::distance::SparseAdjacency;
use crate::model::{NodeId, Partition, StreetGraph};
use crate::{Error, Result};

/// Which group a global node index belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Group {
    Part(usize),
    Unpartitioned,
}

/// Enumerate the `C(k,2) + k + 1` sub-problems of the restricted matrix.
///
/// Local node order inside every sub-problem is the global order of its
/// groups, concatenated: start partition, goal partition, unpartitioned.
/// Sub-problems share the resolved network; none of them holds its own
/// adjacency until it is solved.
///
/// # Errors
///
/// - `Overlap` if `check_overlap` is set and two partitions share a node.
/// - `InvalidInput` if a partition node is missing from `node_order`, the
///   order lists a node twice, or an edge weight is invalid.
pub fn decompose(
    graph: &StreetGraph,
    partitions: &[Partition],
    node_order: &[NodeId],
    weight: Option<&str>,
    check_overlap: bool,
) -> Result<Decomposition> {
    let start = Instant::now();

    if check_overlap && !partitions.is_empty() {
        let sets: Vec<HashSet<NodeId>> = partitions.iter().map(|p| p.nodes.clone()).collect();
        let pairs = overlapping_pairs(&pairwise_overlap(&sets)?);
        if !pairs.is_empty() {
            let names: Vec<String> = pairs
                .iter()
                .map(|&(i, j)| format!("{} & {}", partitions[i].name, partitions[j].name))
                .collect();
            return Err(Error::Overlap(format!(
                "partitions are not node-disjoint: {}", names.join(", "),
            )));
        }
    }

    // Global index and group of every ordered node.
    let mut global: HashMap<NodeId, usize> = HashMap::with_capacity(node_order.len());
    for (i, &id) in node_order.iter().enumerate() {
        if global.insert(id, i).is_some() {
            return Err(Error::InvalidInput(format!("node {id} appears twice in the node order")));
        }
    }
    let mut group = vec![Group::Unpartitioned; node_order.len()];
    let mut members: Vec<Vec<usize>> = Vec::with_capacity(partitions.len());
    for (p, part) in partitions.iter().enumerate() {
        let mut idx = Vec::with_capacity(part.len());
        for id in &part.nodes {
            let &i = global.get(id).ok_or_else(|| {
                Error::InvalidInput(format!("node {id} of partition {} is not in the node order", part.name))
            })?;
            group[i] = Group::Part(p);
            idx.push(i);
        }
        idx.sort_unstable();
        members.push(idx);
    }
    let unpartitioned: Vec<usize> = (0..node_order.len())
        .filter(|&i| group[i] == Group::Unpartitioned)
        .collect();

    // Weighted edges between ordered nodes, resolved once and shared.
    let mut edges: Vec<(usize, usize, f64)> = Vec::with_capacity(graph.relationship_count());
    for rel in graph.relationships() {
        let (Some(&u), Some(&v)) = (global.get(&rel.src), global.get(&rel.dst)) else {
            continue;
        };
        edges.push((u, v, edge_weight(rel, weight)?));
    }
    let network = Arc::new(Network {
        graph: SparseAdjacency::from_local_edges(node_order.to_vec(), edges),
        members,
        unpartitioned: unpartitioned.clone(),
    });

    let k = partitions.len();
    let mut sub_problems = Vec::with_capacity(k * k.saturating_sub(1) / 2 + k + 1);
    let mut push = |label: String, scope: Scope| {
        sub_problems.push(SubProblem::new(label, scope, Arc::clone(&network)));
    };

    // Trips between two partitions: start and goal cells plus connective tissue.
    for i in 0..k {
        for j in (i + 1)..k {
            push(format!("{}<>{}", partitions[i].name, partitions[j].name), Scope::Pair(i, j));
        }
    }
    // Trips within a partition and between it and the unpartitioned nodes.
    for (i, part) in partitions.iter().enumerate() {
        push(format!("{}+Sparsified", part.name), Scope::Sparsified(i));
    }
    // Trips between unpartitioned nodes stay on unpartitioned streets.
    push("unp".to_string(), Scope::Unpartitioned);
    drop(network);

    info!(
        partitions = k,
        unpartitioned = unpartitioned.len(),
        sub_problems = sub_problems.len(),
        "decomposed restricted distance matrix"
    );
    debug!(elapsed = ?start.elapsed(), "decomposition finished");

    Ok(Decomposition { size: node_order.len(), unpartitioned, sub_problems })
}
