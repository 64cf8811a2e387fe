//! Process-tree roll-up.
//!
//! Sums every process's usage into its nearest ancestor that is a root of the
//! current snapshot, so a parent that fans work out to helper processes is
//! reported with the cost of the whole subtree.

use crate::core::ProcessMetrics;
use std::collections::{HashMap, HashSet};

/// Recursion bound for malformed parent chains.
pub const MAX_TREE_DEPTH: usize = 100;

#[derive(Debug, Default, Clone, Copy)]
struct Totals {
    cpu_percent: f64,
    ram_percent: f64,
    disk_percent: f64,
    disk_io_bytes: u64,
}

impl Totals {
    fn add(&mut self, node: &ProcessMetrics) {
        self.cpu_percent += node.cpu_percent;
        self.ram_percent += node.ram_percent;
        self.disk_percent += node.disk_percent;
        self.disk_io_bytes = self.disk_io_bytes.saturating_add(node.disk_io_bytes);
    }
}

/// Returns one entry per root with the totals of its subtree.
///
/// A root is a process whose parent pid is not in `flat` (including ppid 0).
/// Roots keep the order they have in `flat`; the input is not modified.
pub fn aggregate(flat: &[ProcessMetrics]) -> Vec<ProcessMetrics> {
    let pids: HashSet<u32> = flat.iter().map(|p| p.pid).collect();

    let mut children: HashMap<u32, Vec<usize>> = HashMap::new();
    for (index, node) in flat.iter().enumerate() {
        children.entry(node.ppid).or_default().push(index);
    }

    flat.iter()
        .enumerate()
        .filter(|(_, node)| !pids.contains(&node.ppid))
        .map(|(index, root)| {
            let mut totals = Totals::default();
            let mut visited = HashSet::new();
            accumulate(flat, &children, index, 0, &mut visited, &mut totals);

            ProcessMetrics {
                cpu_percent: totals.cpu_percent,
                ram_percent: totals.ram_percent,
                disk_percent: totals.disk_percent,
                disk_io_bytes: totals.disk_io_bytes,
                ..root.clone()
            }
        })
        .collect()
}

fn accumulate(
    flat: &[ProcessMetrics],
    children: &HashMap<u32, Vec<usize>>,
    index: usize,
    depth: usize,
    visited: &mut HashSet<usize>,
    totals: &mut Totals,
) {
    if depth > MAX_TREE_DEPTH || !visited.insert(index) {
        return;
    }
    let node = &flat[index];
    totals.add(node);

    if let Some(kids) = children.get(&node.pid) {
        for &child in kids {
            // A process listing itself as its parent is not its own child.
            if child != index {
                accumulate(flat, children, child, depth + 1, visited, totals);
            }
        }
    }
}
