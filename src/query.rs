//! Graph queries over decoded pipeline entities.
//!
//! Every function here is pure: it only reads the slices it is given.
//! Lookups return a uid, with [`NOT_FOUND`] when nothing matches. Graphs
//! reported by a device may contain cycles, so traversals keep a visited set.
//!
//! ```
//! use matchlib_nl::query::{find_action_by_name, NOT_FOUND};
//! use matchlib_nl::types::Action;
//!
//! let actions = vec![Action { uid: 7, name: "drop".to_string(), args: vec![] }];
//! assert_eq!(find_action_by_name("drop", &actions), 7);
//! assert_eq!(find_action_by_name("Drop", &actions), NOT_FOUND);
//! ```

use std::collections::{HashSet, VecDeque};

use crate::types::{Action, Header, HeaderGraphNode, Jump, Table, TableGraphNode};

/// Returned by lookups that match nothing. Uid 0 is reserved.
pub const NOT_FOUND: u32 = 0;

/// Uid of the first header with the same layout as `needle`.
///
/// Headers match when their names are equal and their fields have the same
/// names, widths and offsets in the same order. Uids are ignored, so the
/// needle may come from another device.
pub fn find_header(haystack: &[Header], needle: &Header) -> u32 {
    haystack
        .iter()
        .filter(|h| h.uid != NOT_FOUND)
        .find(|h| same_layout(h, needle))
        .map_or(NOT_FOUND, |h| h.uid)
}

fn same_layout(a: &Header, b: &Header) -> bool {
    a.name == b.name
        && a.fields.len() == b.fields.len()
        && a.fields.iter().zip(&b.fields).all(|(x, y)| {
            x.name == y.name && x.bitwidth == y.bitwidth && x.offset == y.offset
        })
}

/// Uid of the first action named exactly `name`.
pub fn find_action_by_name(name: &str, actions: &[Action]) -> u32 {
    actions
        .iter()
        .find(|a| a.uid != NOT_FOUND && a.name == name)
        .map_or(NOT_FOUND, |a| a.uid)
}

/// `uid` if the header instance `uid` jumps to `next`.
pub fn find_instance(graph: &[HeaderGraphNode], uid: u32, next: u32) -> u32 {
    if uid == NOT_FOUND || next == NOT_FOUND {
        return NOT_FOUND;
    }
    graph
        .iter()
        .find(|n| n.uid == uid && jumps_to(&n.jumps, next))
        .map_or(NOT_FOUND, |n| n.uid)
}

/// Uid of the first table that may use `action` and may be followed by `next`.
///
/// Successors of a table are read from its node in the table graph; a table
/// without a node has none.
pub fn find_table_with_action(
    tables: &[Table],
    graph: &[TableGraphNode],
    action: u32,
    next: u32,
) -> u32 {
    if action == NOT_FOUND || next == NOT_FOUND {
        return NOT_FOUND;
    }
    tables
        .iter()
        .filter(|t| t.uid != NOT_FOUND && t.invokes(action))
        .find(|t| {
            graph
                .iter()
                .any(|n| n.uid == t.uid && jumps_to(&n.jumps, next))
        })
        .map_or(NOT_FOUND, |t| t.uid)
}

fn jumps_to(jumps: &[Jump], next: u32) -> bool {
    jumps.iter().any(|j| j.node == next)
}

fn successors(jumps: &[Jump]) -> Vec<u32> {
    let mut seen = HashSet::new();
    jumps
        .iter()
        .map(|j| j.node)
        .filter(|&n| n != NOT_FOUND && seen.insert(n))
        .collect()
}

/// Distinct non-zero jump targets of header instance `uid`, in jump order.
pub fn header_successors(graph: &[HeaderGraphNode], uid: u32) -> Vec<u32> {
    graph
        .iter()
        .find(|n| n.uid == uid)
        .map(|n| successors(&n.jumps))
        .unwrap_or_default()
}

/// Distinct non-zero jump targets of table `uid`, in jump order.
pub fn table_successors(graph: &[TableGraphNode], uid: u32) -> Vec<u32> {
    graph
        .iter()
        .find(|n| n.uid == uid)
        .map(|n| successors(&n.jumps))
        .unwrap_or_default()
}

/// Breadth-first walk from `start`, visiting each node once.
fn walk<F>(start: u32, mut next: F) -> Vec<u32>
where
    F: FnMut(u32) -> Option<Vec<u32>>,
{
    let mut order = Vec::new();
    if start == NOT_FOUND {
        return order;
    }
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from([start]);
    visited.insert(start);
    while let Some(uid) = queue.pop_front() {
        // Targets without a node are dead ends and are not reported.
        let Some(succ) = next(uid) else { continue };
        order.push(uid);
        for s in succ {
            if visited.insert(s) {
                queue.push_back(s);
            }
        }
    }
    order
}

/// Header instances reachable from `start`, `start` first.
pub fn reachable_headers(graph: &[HeaderGraphNode], start: u32) -> Vec<u32> {
    walk(start, |uid| {
        graph
            .iter()
            .find(|n| n.uid == uid)
            .map(|n| successors(&n.jumps))
    })
}

/// Tables reachable from `start`, `start` first.
pub fn reachable_tables(graph: &[TableGraphNode], start: u32) -> Vec<u32> {
    walk(start, |uid| {
        graph
            .iter()
            .find(|n| n.uid == uid)
            .map(|n| successors(&n.jumps))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Field, FieldRef, ValueType};

    fn field(uid: u32, name: &str, bitwidth: u32, offset: u32) -> Field {
        Field {
            uid,
            name: name.to_string(),
            bitwidth,
            offset,
        }
    }

    fn vlan(uid: u32) -> Header {
        Header {
            uid,
            name: "vlan".to_string(),
            fields: vec![field(1, "pcp", 3, 0), field(2, "cfi", 1, 3), field(3, "vid", 12, 4)],
        }
    }

    fn table(uid: u32, actions: Vec<u32>) -> Table {
        Table {
            uid,
            name: format!("t{}", uid),
            source: 0,
            apply_action: 0,
            size: 16,
            matches: vec![],
            actions,
        }
    }

    fn tnode(uid: u32, next: &[u32]) -> TableGraphNode {
        TableGraphNode {
            uid,
            flags: 0,
            jumps: next.iter().map(|&n| Jump::to(n)).collect(),
        }
    }

    fn hnode(uid: u32, next: &[u32]) -> HeaderGraphNode {
        HeaderGraphNode {
            uid,
            name: format!("h{}", uid),
            headers: vec![uid],
            jumps: next
                .iter()
                .map(|&n| Jump::when(FieldRef::exact(uid, uid, 1, ValueType::U16, u64::from(n)), n))
                .collect(),
        }
    }

    #[test]
    fn test_find_header_ignores_uids() {
        let haystack = vec![vlan(4)];
        let mut needle = vlan(99);
        needle.fields[0].uid = 42;
        assert_eq!(find_header(&haystack, &needle), 4);
    }

    #[test]
    fn test_find_header_layout_mismatch() {
        let haystack = vec![vlan(4)];
        let mut needle = vlan(4);
        needle.fields[2].bitwidth = 11;
        assert_eq!(find_header(&haystack, &needle), NOT_FOUND);

        let mut shorter = vlan(4);
        shorter.fields.pop();
        assert_eq!(find_header(&haystack, &shorter), NOT_FOUND);
    }

    #[test]
    fn test_find_header_first_match() {
        let haystack = vec![vlan(0), vlan(5), vlan(6)];
        assert_eq!(find_header(&haystack, &vlan(1)), 5);
        assert_eq!(find_header(&[], &vlan(1)), NOT_FOUND);
    }

    #[test]
    fn test_find_action_by_name() {
        let actions = vec![
            Action {
                uid: 1,
                name: "drop".to_string(),
                args: vec![],
            },
            Action {
                uid: 2,
                name: "forward".to_string(),
                args: vec![],
            },
        ];
        assert_eq!(find_action_by_name("forward", &actions), 2);
        assert_eq!(find_action_by_name("FORWARD", &actions), NOT_FOUND);
        assert_eq!(find_action_by_name("", &actions), NOT_FOUND);
    }

    #[test]
    fn test_find_instance() {
        let graph = vec![hnode(1, &[2, 3]), hnode(2, &[4])];
        assert_eq!(find_instance(&graph, 1, 3), 1);
        assert_eq!(find_instance(&graph, 2, 3), NOT_FOUND);
        assert_eq!(find_instance(&graph, 7, 3), NOT_FOUND);
        assert_eq!(find_instance(&graph, 0, 3), NOT_FOUND);
        assert_eq!(find_instance(&graph, 1, 0), NOT_FOUND);
    }

    #[test]
    fn test_find_table_with_action() {
        let tables = vec![table(10, vec![1]), table(11, vec![1, 2]), table(12, vec![2])];
        let graph = vec![tnode(10, &[20]), tnode(11, &[30]), tnode(12, &[30])];
        assert_eq!(find_table_with_action(&tables, &graph, 2, 30), 11);
        assert_eq!(find_table_with_action(&tables, &graph, 1, 20), 10);
        assert_eq!(find_table_with_action(&tables, &graph, 1, 40), NOT_FOUND);
        assert_eq!(find_table_with_action(&tables, &graph, 0, 30), NOT_FOUND);
    }

    #[test]
    fn test_table_without_graph_node() {
        let tables = vec![table(10, vec![1])];
        assert_eq!(find_table_with_action(&tables, &[], 1, 20), NOT_FOUND);
    }

    #[test]
    fn test_successors_are_distinct() {
        let graph = vec![tnode(1, &[2, 0, 3, 2])];
        assert_eq!(table_successors(&graph, 1), vec![2, 3]);
        assert!(table_successors(&graph, 9).is_empty());
    }

    #[test]
    fn test_reachable_with_cycle() {
        let graph = vec![hnode(1, &[2]), hnode(2, &[3, 1]), hnode(3, &[1, 2])];
        assert_eq!(reachable_headers(&graph, 1), vec![1, 2, 3]);
        assert_eq!(header_successors(&graph, 3), vec![1, 2]);
    }

    #[test]
    fn test_reachable_tables_breadth_first() {
        let graph = vec![
            tnode(1, &[2, 3]),
            tnode(2, &[4]),
            tnode(3, &[4]),
            tnode(4, &[]),
            tnode(5, &[1]),
        ];
        assert_eq!(reachable_tables(&graph, 1), vec![1, 2, 3, 4]);
        assert!(reachable_tables(&graph, 0).is_empty());
        assert!(reachable_tables(&graph, 6).is_empty());
    }

    #[test]
    fn test_self_loop() {
        let graph = vec![tnode(1, &[1])];
        assert_eq!(reachable_tables(&graph, 1), vec![1]);
    }
}
