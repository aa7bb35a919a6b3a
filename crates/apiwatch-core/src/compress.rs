//! # Structural-Hash Compression
//!
//! Test-suite clients exercise the same library surface over and over;
//! every iteration mints fresh call ids, so the tree fills with sibling
//! `call` subtrees that differ only in those ids. Compression collapses
//! sibling calls whose subtrees hash identically, keeping one
//! representative (and that representative's argument paths).
//!
//! Two hashes per node:
//! - `h_full` covers every child group;
//! - `h_noArgs` leaves the `arg` group out, recursively, so calls that
//!   produced the same outcome collapse even when their nested calls
//!   observed different argument sets.
//!
//! A subtree that contains a ρ endpoint is never touched: a path whose
//! value feeds back into the library must survive verbatim for replay.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::path::{CallId, RhoRelation};
use crate::tree::{NodeId, PathTree};

/// How aggressively sibling calls are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionPolicy {
    /// Collapse on `h_noArgs` alone. Sibling calls with identical
    /// outcomes merge even when their argument shapes differed.
    #[default]
    Standard,
    /// Collapse only when `h_full` also agrees, preserving argument
    /// evidence that distinguishes call sites.
    Strict,
}

/// Compress the tree in place. Returns the number of call subtrees
/// removed.
pub fn compress(tree: &mut PathTree, rho: &[RhoRelation], policy: CompressionPolicy) -> usize {
    for relation in rho {
        tree.mark_rho(&relation.source);
        tree.mark_rho(&relation.sink);
    }
    compute_hashes(tree);

    let mut removed = 0;
    let mut worklist = vec![tree.root()];
    while let Some(node) = worklist.pop() {
        removed += collapse_call_children(tree, node, policy);
        worklist.extend(tree.children(node).iter_all());
    }
    removed
}

/// Group the node's `call` children by hash and drop duplicates. The
/// earliest-observed eligible sibling survives as the representative;
/// ρ-touching siblings are left alone entirely.
fn collapse_call_children(tree: &mut PathTree, node: NodeId, policy: CompressionPolicy) -> usize {
    type GroupKey = (u128, Option<u128>);
    let mut groups: BTreeMap<GroupKey, Vec<(CallId, NodeId)>> = BTreeMap::new();
    for (call_id, &child) in &tree.children(node).call {
        if !eligible(tree, node, call_id, child) {
            continue;
        }
        let child_node = tree.node(child);
        let key = (
            child_node.h_no_args.unwrap_or_default(),
            match policy {
                CompressionPolicy::Standard => None,
                // Strict also compares the full result shape and the
                // shape of this call's own argument paths, which live in
                // the parent's arg group.
                CompressionPolicy::Strict => Some(strict_key(tree, node, call_id, child)),
            },
        );
        groups.entry(key).or_default().push((call_id.clone(), child));
    }

    let mut removed = 0;
    for mut members in groups.into_values() {
        if members.len() < 2 {
            continue;
        }
        members.sort_by_key(|(_, id)| tree.node(*id).order);
        for (call_id, child) in members.into_iter().skip(1) {
            remove_call(tree, node, &call_id, child);
            removed += 1;
        }
    }
    removed
}

/// Strict-policy grouping key: the call child's full subtree hash plus
/// the shape of the arguments recorded for the same call id.
fn strict_key(tree: &PathTree, parent: NodeId, call_id: &CallId, child: NodeId) -> u128 {
    let mut hasher = Sha256::new();
    hasher.update(child_hash(tree, child, true).to_le_bytes());
    if let Some(group) = tree.children(parent).arg.get(call_id) {
        for (arg_id, &arg_node) in group {
            hasher.update((*arg_id as u64).to_le_bytes());
            hasher.update(child_hash(tree, arg_node, true).to_le_bytes());
        }
    }
    finish(hasher)
}

/// A call child can be collapsed only when neither its result subtree
/// nor any of its argument subtrees participates in a ρ-relation.
fn eligible(tree: &PathTree, parent: NodeId, call_id: &CallId, child: NodeId) -> bool {
    if tree.node(child).prefix_touches_rho {
        return false;
    }
    if let Some(args) = tree.children(parent).arg.get(call_id) {
        if args
            .values()
            .any(|&arg_node| tree.node(arg_node).prefix_touches_rho)
        {
            return false;
        }
    }
    true
}

/// Remove a call child together with the argument paths of the same
/// call, then walk the parent chain recomputing cached hashes.
fn remove_call(tree: &mut PathTree, parent: NodeId, call_id: &CallId, child: NodeId) {
    tree.remove_subtree(child);
    let arg_nodes: Vec<NodeId> = tree
        .children(parent)
        .arg
        .get(call_id)
        .map(|group| group.values().copied().collect())
        .unwrap_or_default();
    for arg_node in arg_nodes {
        tree.remove_subtree(arg_node);
    }
    invalidate_upward(tree, parent);
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

/// Fill `h_full` / `h_noArgs` for every live node, children first.
pub fn compute_hashes(tree: &mut PathTree) {
    let mut stack = vec![(tree.root(), false)];
    while let Some((id, expanded)) = stack.pop() {
        if expanded {
            let (full, no_args) = node_hashes(tree, id);
            let node = tree.node_mut(id);
            node.h_full = Some(full);
            node.h_no_args = Some(no_args);
        } else {
            stack.push((id, true));
            for child in tree.children(id).iter_all() {
                stack.push((child, false));
            }
        }
    }
}

fn invalidate_upward(tree: &mut PathTree, from: NodeId) {
    let mut current = Some(from);
    while let Some(id) = current {
        let (full, no_args) = node_hashes(tree, id);
        let node = tree.node_mut(id);
        node.h_full = Some(full);
        node.h_no_args = Some(no_args);
        current = node.parent;
    }
}

/// Content hash over the canonical child encoding. The child maps are
/// `BTreeMap`s, so iteration order is stable across runs and across a
/// serialize/parse round trip.
fn node_hashes(tree: &PathTree, id: NodeId) -> (u128, u128) {
    let mut full = Sha256::new();
    let mut no_args = Sha256::new();
    let children = tree.children(id);

    for (name, &child) in &children.require {
        feed_both(&mut full, &mut no_args, tree, b"req", name.as_bytes(), child);
    }
    for (name, &child) in &children.access_prop {
        feed_both(&mut full, &mut no_args, tree, b"acc", name.as_bytes(), child);
    }
    for (name, &child) in &children.write_prop {
        feed_both(&mut full, &mut no_args, tree, b"wrt", name.as_bytes(), child);
    }
    for (call_id, &child) in &children.call {
        feed_both(
            &mut full,
            &mut no_args,
            tree,
            b"cal",
            call_id.as_str().as_bytes(),
            child,
        );
    }
    for (call_id, &child) in &children.construct {
        feed_both(
            &mut full,
            &mut no_args,
            tree,
            b"new",
            call_id.as_str().as_bytes(),
            child,
        );
    }
    // The arg group participates in h_full only.
    for (call_id, group) in &children.arg {
        for (arg_id, &child) in group {
            full.update(b"arg");
            feed_key(&mut full, call_id.as_str().as_bytes());
            full.update((*arg_id as u64).to_le_bytes());
            full.update(child_hash(tree, child, true).to_le_bytes());
        }
    }

    (finish(full), finish(no_args))
}

fn feed_both(
    full: &mut Sha256,
    no_args: &mut Sha256,
    tree: &PathTree,
    marker: &[u8],
    key: &[u8],
    child: NodeId,
) {
    full.update(marker);
    feed_key(full, key);
    full.update(child_hash(tree, child, true).to_le_bytes());
    no_args.update(marker);
    feed_key(no_args, key);
    no_args.update(child_hash(tree, child, false).to_le_bytes());
}

fn feed_key(hasher: &mut Sha256, key: &[u8]) {
    hasher.update((key.len() as u32).to_le_bytes());
    hasher.update(key);
}

fn child_hash(tree: &PathTree, child: NodeId, full: bool) -> u128 {
    let node = tree.node(child);
    let hash = if full { node.h_full } else { node.h_no_args };
    hash.unwrap_or_default()
}

fn finish(hasher: Sha256) -> u128 {
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    u128::from_le_bytes(bytes)
}
