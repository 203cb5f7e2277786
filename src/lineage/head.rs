//! Lineage head resolution.
//!
//! The head of a lineage chain is the unique node that receives an edge but
//! never emits one (to-set minus from-set). An empty graph has no head; zero
//! or several candidates (cycles, forks) leave it unresolved.

use crate::catalog::Edge;
use crate::{LineageError, Result};
use std::collections::BTreeSet;

/// Sink candidates of an edge set, sorted.
pub fn sink_candidates(edges: &[Edge]) -> Vec<String> {
    let from: BTreeSet<&str> = edges.iter().map(|e| e.from_id.as_str()).collect();
    let to: BTreeSet<&str> = edges.iter().map(|e| e.to_id.as_str()).collect();
    to.difference(&from).map(|s| s.to_string()).collect()
}

/// Single sink of the graph, or `None` when it is empty or not unique.
pub fn resolve_head(edges: &[Edge]) -> Option<String> {
    let mut sinks = sink_candidates(edges);
    if sinks.len() == 1 { sinks.pop() } else { None }
}

/// Like [`resolve_head`], but a non-empty graph without a unique sink is an error.
pub fn resolve_head_strict(edges: &[Edge]) -> Result<Option<String>> {
    if edges.is_empty() {
        return Ok(None);
    }
    let mut sinks = sink_candidates(edges);
    if sinks.len() != 1 {
        return Err(LineageError::AmbiguousGraph { candidates: sinks });
    }
    Ok(sinks.pop())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn edges(pairs: &[(&str, &str)]) -> Vec<Edge> {
        pairs.iter().map(|(a, b)| Edge::new(*a, *b)).collect()
    }

    #[test]
    fn simple_chain_ends_at_last_node() {
        let g = edges(&[("A", "B"), ("B", "C")]);
        assert_eq!(resolve_head(&g), Some("C".to_string()));
        assert_eq!(resolve_head_strict(&g).unwrap(), Some("C".to_string()));
    }

    #[test]
    fn edge_order_does_not_matter() {
        let g = edges(&[("B", "C"), ("p", "B"), ("A", "p")]);
        assert_eq!(resolve_head(&g), Some("C".to_string()));
    }

    #[test]
    fn no_edges_no_head() {
        assert_eq!(resolve_head(&[]), None);
        assert_eq!(resolve_head_strict(&[]).unwrap(), None);
    }

    #[test]
    fn fork_is_ambiguous() {
        let g = edges(&[("A", "B"), ("A", "C")]);
        assert_eq!(resolve_head(&g), None);
        match resolve_head_strict(&g) {
            Err(LineageError::AmbiguousGraph { candidates }) => {
                assert_eq!(candidates, vec!["B".to_string(), "C".to_string()])
            }
            other => panic!("expected ambiguous graph, got {:?}", other),
        }
    }

    #[test]
    fn cycle_has_no_head() {
        let g = edges(&[("A", "B"), ("B", "A")]);
        assert_eq!(resolve_head(&g), None);
        assert!(resolve_head_strict(&g).is_err());
    }

    #[test]
    fn merge_into_one_sink_resolves() {
        let g = edges(&[("A", "C"), ("B", "C")]);
        assert_eq!(resolve_head(&g), Some("C".to_string()));
    }
}
