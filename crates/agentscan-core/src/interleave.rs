use std::collections::HashSet;

use crate::{AgentId, AgentSummary};

/// Round-robin merge of per-source lists, taking one item from each source in
/// turn. Each list keeps its own order; sources are visited in the order given.
pub fn interleave(sources: Vec<Vec<AgentSummary>>) -> Vec<AgentSummary> {
    let capacity = sources.iter().map(Vec::len).sum();
    let mut cursors = sources
        .into_iter()
        .map(Vec::into_iter)
        .collect::<Vec<_>>();
    let mut merged = Vec::with_capacity(capacity);

    loop {
        let before = merged.len();
        for cursor in &mut cursors {
            if let Some(item) = cursor.next() {
                merged.push(item);
            }
        }
        if merged.len() == before {
            break;
        }
    }

    merged
}

/// Drops every item whose identity was already seen, keeping first occurrences.
pub fn dedupe_by_identity(items: Vec<AgentSummary>) -> Vec<AgentSummary> {
    let mut seen: HashSet<AgentId> = HashSet::with_capacity(items.len());
    let mut output = Vec::with_capacity(items.len());

    for item in items {
        if seen.insert(item.id.clone()) {
            output.push(item);
        }
    }

    output
}

/// Interleave, then dedupe.
pub fn merge_sources(sources: Vec<Vec<AgentSummary>>) -> Vec<AgentSummary> {
    dedupe_by_identity(interleave(sources))
}
