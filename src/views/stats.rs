//! Per-creator tree counts.

use std::collections::HashMap;

use crate::core::TreeView;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatorTally {
    /// `createdBy` as stored; empty for trees without one.
    pub creator: String,
    pub trees: usize,
}

/// Trees registered per creator, in order of each creator's first tree.
pub fn creator_tallies(trees: &[TreeView]) -> Vec<CreatorTally> {
    let mut tallies: Vec<CreatorTally> = Vec::new();
    let mut slots: HashMap<&str, usize> = HashMap::new();
    for tree in trees {
        let creator = tree.tree.created_by.as_deref().unwrap_or_default();
        match slots.get(creator) {
            Some(&slot) => tallies[slot].trees += 1,
            None => {
                slots.insert(creator, tallies.len());
                tallies.push(CreatorTally {
                    creator: creator.to_string(),
                    trees: 1,
                });
            }
        }
    }
    tallies
}
