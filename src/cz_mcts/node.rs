// Copyright 2019 Karl Sundequist Blomdahl <karl.sundequist.blomdahl@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! An arena-allocated search tree. Nodes are addressed by index into a
//! single `Vec` rather than through pointers, so the tree survives
//! growing without any `unsafe`: the hot paths (selection and backup)
//! only ever mutate a node's visit counters through atomics and take the
//! arena's lock in shared mode, while the rare structural changes
//! (expanding a leaf, promoting a child to the new root) take it
//! exclusively.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU8, Ordering};
use std::sync::RwLock;

use cz_position::{Move, Position, Terminal};

/// `w` is stored as a fixed-point integer scaled by this factor so that
/// it can live in an `AtomicI64` -- there is no stable atomic `f64`.
const FIXED_SCALE: f64 = 1_000_000.0;

/// `proven` encoding for the `AtomicU8` -- 0 means "not yet proven",
/// matching `Node::leaf`'s zero-initialized default.
fn encode_proven(terminal: Terminal) -> u8 {
    match terminal {
        Terminal::Win => 1,
        Terminal::Draw => 2,
        Terminal::Loss => 3
    }
}

fn decode_proven(bits: u8) -> Option<Terminal> {
    match bits {
        1 => Some(Terminal::Win),
        2 => Some(Terminal::Draw),
        3 => Some(Terminal::Loss),
        _ => None
    }
}

pub struct Node {
    parent: Option<usize>,
    move_from_parent: Option<Move>,
    position: Position,
    /// Children, in ascending move-index order. Fixed once `expand` has
    /// run; empty for an unexpanded leaf.
    children: Vec<usize>,
    /// This node's prior probability, from its parent's policy output.
    /// Meaningless (1.0) for the root.
    prior: f32,
    terminal: Option<Terminal>,
    /// Real visit count.
    n: AtomicU32,
    /// In-flight visit count (virtual loss); always returns to zero once
    /// every worker has finished touching the tree.
    nif: AtomicU32,
    /// Accumulated value, from this node's own side-to-move perspective.
    w_fixed: AtomicI64,
    /// The game-theoretic value of this node once it is known for certain
    /// (as opposed to `w/n`, which is only ever a network-guided
    /// estimate) -- set directly at construction for a terminal position,
    /// or derived from fully-known children once every legal move from
    /// this node has itself been proven. Monotonic: never reset once set.
    proven: AtomicU8
}

impl Node {
    fn leaf(parent: Option<usize>, move_from_parent: Option<Move>, position: Position, prior: f32) -> Self {
        let terminal = position.terminal();
        let proven = terminal.map(encode_proven).unwrap_or(0);

        Self {
            parent,
            move_from_parent,
            position,
            children: Vec::new(),
            prior,
            terminal,
            n: AtomicU32::new(0),
            nif: AtomicU32::new(0),
            w_fixed: AtomicI64::new(0),
            proven: AtomicU8::new(proven)
        }
    }

    /// This node's proven game-theoretic value, from its own side-to-move
    /// perspective, once known -- either because the position itself is
    /// terminal, or because every legal move from here has itself been
    /// proven (see `NodeTree::expand`'s proof propagation).
    pub fn proven(&self) -> Option<Terminal> {
        decode_proven(self.proven.load(Ordering::Acquire))
    }

    /// Establishes `value` as this node's proven outcome if it was not
    /// already known. Returns `true` the first time (the caller should
    /// keep walking up to the parent), `false` if the node was already
    /// proven (the value it holds is by construction the same one a
    /// correct recomputation would derive again, so the cascade can
    /// stop).
    fn try_prove(&self, value: Terminal) -> bool {
        self.proven.compare_exchange(0, encode_proven(value), Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn move_from_parent(&self) -> Option<Move> {
        self.move_from_parent
    }

    pub fn children(&self) -> &[usize] {
        &self.children
    }

    pub fn prior(&self) -> f32 {
        self.prior
    }

    pub fn terminal(&self) -> Option<Terminal> {
        self.terminal
    }

    pub fn is_expanded(&self) -> bool {
        !self.children.is_empty() || self.terminal.is_some()
    }

    pub fn n(&self) -> u32 {
        self.n.load(Ordering::Acquire)
    }

    pub fn nif(&self) -> u32 {
        self.nif.load(Ordering::Acquire)
    }

    /// Real visits plus in-flight visits -- the count PUCT selection uses
    /// so that concurrent workers spread out across siblings instead of
    /// all diving into the same promising-looking child.
    pub fn effective_n(&self) -> u32 {
        self.n() + self.nif()
    }

    pub fn w(&self) -> f64 {
        self.w_fixed.load(Ordering::Acquire) as f64 / FIXED_SCALE
    }

    /// This node's own average value, from its own side-to-move
    /// perspective. Used as the FPU baseline for its unvisited children.
    pub fn own_q(&self) -> f64 {
        let n = self.n();

        if n == 0 {
            0.0
        } else {
            self.w() / n as f64
        }
    }

    /// The value a parent sees when considering this node as a move,
    /// i.e. `own_q` negated (the side to move flips at every ply) and
    /// pessimized by any virtual loss currently in flight.
    fn effective_q(&self) -> f64 {
        let en = self.effective_n();

        if en == 0 {
            0.0
        } else {
            let ew = self.w() - self.nif() as f64;

            -(ew / en as f64)
        }
    }

    fn add_virtual_loss(&self) {
        self.nif.fetch_add(1, Ordering::AcqRel);
    }

    /// Records one completed playout through this node: `value` is from
    /// this node's own side-to-move perspective.
    fn backup(&self, value: f64) {
        self.n.fetch_add(1, Ordering::AcqRel);
        self.nif.fetch_sub(1, Ordering::AcqRel);
        self.w_fixed.fetch_add((value * FIXED_SCALE).round() as i64, Ordering::AcqRel);
    }
}

struct Inner {
    nodes: Vec<Node>,
    root: usize,
    /// Positions played before the current root, oldest first. The arena
    /// only ever keeps the current root's subtree, so this is the sole
    /// record of game history once `promote_to_root` severs the old
    /// root's parent link -- without it, feature-plane history would
    /// reset to a single ply every time the tree advances.
    history_prefix: Vec<Position>
}

/// The shared search tree. Cheap to `select_leaf` from many threads at
/// once (a read-lock plus a handful of atomic ops); expensive operations
/// that change its shape (`expand`, `promote_to_root`) take the lock
/// exclusively.
pub struct NodeTree {
    inner: RwLock<Inner>
}

/// What `select_leaf` landed on.
pub enum Leaf {
    /// A position with no further play. `path` already has virtual loss
    /// applied and `backup_path` must still be called to remove it.
    Terminal { path: Vec<usize>, value: f64 },
    /// A position that has never been evaluated by the network.
    Unexpanded { path: Vec<usize>, node: usize }
}

impl NodeTree {
    pub fn new_root(position: Position) -> Self {
        let root = Node::leaf(None, None, position, 1.0);

        Self { inner: RwLock::new(Inner { nodes: vec![root], root: 0, history_prefix: Vec::new() }) }
    }

    pub fn root(&self) -> usize {
        self.inner.read().expect("node tree lock was poisoned").root
    }

    pub fn root_position(&self) -> Position {
        let inner = self.inner.read().expect("node tree lock was poisoned");

        *inner.nodes[inner.root].position()
    }

    pub fn with_node<R>(&self, index: usize, f: impl FnOnce(&Node) -> R) -> R {
        let inner = self.inner.read().expect("node tree lock was poisoned");

        f(&inner.nodes[index])
    }

    /// History of positions from the start of the game down to `index`,
    /// oldest first, suitable for `cz_position::features::search_planes`.
    /// Includes positions played before the current root
    /// (`history_prefix`), so feature history survives `promote_to_root`.
    pub fn history(&self, index: usize) -> Vec<Position> {
        let inner = self.inner.read().expect("node tree lock was poisoned");
        let mut path = Vec::new();
        let mut current = Some(index);

        while let Some(i) = current {
            path.push(*inner.nodes[i].position());
            current = inner.nodes[i].parent();
        }

        path.reverse();

        let mut out = inner.history_prefix.clone();
        out.extend(path);
        out
    }

    /// Descends from the root by PUCT selection, applying virtual loss
    /// to every node along the way. Stops at the first terminal or
    /// unexpanded node.
    pub fn select_leaf(&self, cpuct: f32, fpu_reduction: f32) -> Leaf {
        let inner = self.inner.read().expect("node tree lock was poisoned");
        let mut current = inner.root;
        let mut path = vec![current];

        inner.nodes[current].add_virtual_loss();

        loop {
            let node = &inner.nodes[current];

            if let Some(terminal) = node.terminal {
                return Leaf::Terminal { path, value: terminal.value() as f64 };
            }

            if node.children.is_empty() {
                return Leaf::Unexpanded { path, node: current };
            }

            let parent_n = node.n();
            let sum_prior_visited: f64 = node.children.iter()
                .map(|&c| &inner.nodes[c])
                .filter(|child| child.n() > 0)
                .map(|child| child.prior as f64)
                .sum();
            let fpu = node.own_q() - fpu_reduction as f64 * sum_prior_visited.sqrt();

            let best = *node.children.iter()
                .max_by(|&&a, &&b| {
                    let ua = puct_value(&inner.nodes[a], parent_n, cpuct, fpu);
                    let ub = puct_value(&inner.nodes[b], parent_n, cpuct, fpu);

                    ua.partial_cmp(&ub).expect("PUCT value must never be NaN")
                })
                .expect("an expanded node always has at least one child");

            inner.nodes[best].add_virtual_loss();
            current = best;
            path.push(current);
        }
    }

    /// Removes the virtual loss placed on `path` by `select_leaf` without
    /// recording a real visit -- used when a leaf turned out to already
    /// be cached or to abandon a speculative prefetch.
    pub fn undo_virtual_loss(&self, path: &[usize]) {
        let inner = self.inner.read().expect("node tree lock was poisoned");

        for &index in path {
            inner.nodes[index].nif.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Propagates `value` (from the leaf's own perspective) back up
    /// `path`, flipping sign at every step, and clears the virtual loss
    /// placed on the way down.
    pub fn backup_path(&self, path: &[usize], value: f64) {
        let inner = self.inner.read().expect("node tree lock was poisoned");
        let mut v = value;

        for &index in path.iter().rev() {
            inner.nodes[index].backup(v);
            v = -v;
        }
    }

    /// Creates one child per `(mv, prior)` pair, reachable by playing
    /// `mv` from `leaf`'s position. A no-op if `leaf` already has
    /// children (two workers can race to expand the same leaf; the
    /// second one's network call is simply wasted).
    pub fn expand(&self, leaf: usize, priors: &[(Move, f32)]) {
        let mut inner = self.inner.write().expect("node tree lock was poisoned");

        if inner.nodes[leaf].is_expanded() {
            return;
        }

        let base_position = *inner.nodes[leaf].position();
        let mut children = Vec::with_capacity(priors.len());

        for &(mv, prior) in priors {
            let played = base_position.make_move(mv);
            let repetitions = count_repetitions(&inner, leaf, &played);
            let child_position = played.with_repetitions(repetitions);
            let child = Node::leaf(Some(leaf), Some(mv), child_position, prior);

            inner.nodes.push(child);
            children.push(inner.nodes.len() - 1);
        }

        inner.nodes[leaf].children = children;

        // one or more of the freshly created children may themselves be
        // terminal positions, which can be enough to prove `leaf` (and,
        // cascading, its ancestors) outright -- spec.md §4.5's fourth
        // termination condition ("a proven forced win/loss at root").
        propagate_proof(&inner, leaf);
    }

    /// Replaces the root with the child reached by playing `mv`,
    /// dropping every other line of play. If the move was never
    /// explored (e.g. the opponent played something this search never
    /// visited) a fresh, unexpanded root is created instead -- the next
    /// search simply starts from scratch for that subtree. Every sibling
    /// subtree (and the old root itself) is dropped from the arena here,
    /// not merely unlinked -- the arena only ever holds the current
    /// root's subtree, so a long game never grows it without bound.
    ///
    /// Must not be called while a `Search` has workers in flight against
    /// this tree: it renumbers every surviving node, invalidating any
    /// `Leaf::path` a worker is still holding. Callers always `join`/
    /// `abort_and_wait` their search first.
    pub fn promote_to_root(&self, mv: Move) {
        let mut inner = self.inner.write().expect("node tree lock was poisoned");
        let root = inner.root;
        let existing = inner.nodes[root].children.iter()
            .copied()
            .find(|&c| inner.nodes[c].move_from_parent == Some(mv));

        let new_root = match existing {
            Some(child) => child,
            None => {
                let played = inner.nodes[root].position().make_move(mv);
                let repetitions = count_repetitions(&inner, root, &played);
                let next_position = played.with_repetitions(repetitions);

                inner.nodes.push(Node::leaf(None, None, next_position, 1.0));
                inner.nodes.len() - 1
            }
        };

        let outgoing_root_position = *inner.nodes[root].position();

        // pre-order walk of the surviving subtree, old index -> new index.
        let mut reachable = Vec::new();
        let mut remap: HashMap<usize, usize> = HashMap::new();
        let mut stack = vec![new_root];

        while let Some(old_index) = stack.pop() {
            remap.insert(old_index, reachable.len());
            reachable.push(old_index);
            stack.extend(inner.nodes[old_index].children().iter().copied());
        }

        let mut slots: Vec<Option<Node>> = std::mem::take(&mut inner.nodes).into_iter().map(Some).collect();
        let mut compacted: Vec<Node> = Vec::with_capacity(reachable.len());

        for &old_index in &reachable {
            let mut node = slots[old_index].take().expect("every reachable node is visited exactly once");

            // the new root's own parent pointer (the old root, outside the
            // surviving subtree) is cleared explicitly below instead.
            node.parent = node.parent.and_then(|p| remap.get(&p).copied());
            node.children = node.children.iter().map(|c| remap[c]).collect();
            compacted.push(node);
        }

        // everything left behind in `slots` (the old root and every
        // detached sibling subtree) drops here along with `slots` itself.

        compacted[0].parent = None;
        compacted[0].move_from_parent = None;

        inner.nodes = compacted;
        inner.root = 0;
        inner.history_prefix.push(outgoing_root_position);
    }

    /// The root's children sorted by descending visit count, for move
    /// selection and `OnThinkingInfo` reporting.
    pub fn root_children_by_visits(&self) -> Vec<(Move, u32, f64)> {
        let inner = self.inner.read().expect("node tree lock was poisoned");
        let root = &inner.nodes[inner.root];
        let mut out: Vec<(Move, u32, f64)> = root.children.iter()
            .map(|&c| {
                let child = &inner.nodes[c];

                (child.move_from_parent.expect("every root child has a move"), child.n(), -child.own_q())
            })
            .collect();

        out.sort_by(|a, b| b.1.cmp(&a.1));
        out
    }

    /// The line of play with the most visits at every step, starting at
    /// the root, for `OnThinkingInfo`'s principal variation.
    pub fn principal_variation(&self, max_len: usize) -> Vec<Move> {
        let inner = self.inner.read().expect("node tree lock was poisoned");
        let mut out = Vec::with_capacity(max_len);
        let mut current = inner.root;

        while out.len() < max_len {
            let node = &inner.nodes[current];
            let best = node.children.iter()
                .copied()
                .max_by_key(|&c| inner.nodes[c].n());

            match best {
                Some(child) if inner.nodes[child].n() > 0 => {
                    out.push(inner.nodes[child].move_from_parent.expect("every child has a move"));
                    current = child;
                },
                _ => break
            }
        }

        out
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("node tree lock was poisoned").nodes.len()
    }
}

/// How many times `played` has already occurred among the game history
/// leading up to (and including) `ancestor`, counting `history_prefix`
/// plus the ancestor chain. Clamped at 2 -- `Terminal` only distinguishes
/// "not yet a draw" from "third occurrence or more".
fn count_repetitions(inner: &Inner, ancestor: usize, played: &Position) -> u8 {
    let mut count = 0u8;
    let mut current = Some(ancestor);

    while let Some(i) = current {
        if inner.nodes[i].position().same_for_repetition(played) {
            count = count.saturating_add(1);
        }

        current = inner.nodes[i].parent();
    }

    for prior in &inner.history_prefix {
        if prior.same_for_repetition(played) {
            count = count.saturating_add(1);
        }
    }

    count.min(2)
}

fn puct_value(child: &Node, parent_n: u32, cpuct: f32, fpu: f64) -> f64 {
    let en = child.effective_n();
    let q = if en == 0 { fpu } else { child.effective_q() };

    q + cpuct as f64 * child.prior as f64 * (parent_n as f64).sqrt() / (1.0 + en as f64)
}

/// `node`'s proven outcome derivable purely from its children's own proven
/// outcomes (never from visit counts or accumulated value): `None` if
/// `node` is unexpanded or any child remains unproven and no child proves
/// an immediate win. A child's `Terminal::Loss` (the mover at that child
/// is lost) is, by itself, enough to prove `node` a `Terminal::Win` --
/// `node`'s mover simply plays that move -- regardless of what any other,
/// still-unexplored sibling might turn out to be.
fn recompute_proven(inner: &Inner, index: usize) -> Option<Terminal> {
    let node = &inner.nodes[index];

    if let Some(terminal) = node.terminal {
        return Some(terminal);
    }

    if node.children.is_empty() {
        return None;
    }

    let mut all_win = true;
    let mut any_draw = false;

    for &child in &node.children {
        match inner.nodes[child].proven() {
            Some(Terminal::Loss) => return Some(Terminal::Win),
            Some(Terminal::Win) => {},
            Some(Terminal::Draw) => { all_win = false; any_draw = true; },
            None => return None
        }
    }

    if all_win {
        Some(Terminal::Loss)
    } else if any_draw {
        Some(Terminal::Draw)
    } else {
        None
    }
}

/// Walks from `start` up to the root, recomputing and establishing each
/// ancestor's proven outcome in turn, stopping as soon as an ancestor is
/// already proven (its value can only have been derived the same way, so
/// nothing further up can change either).
fn propagate_proof(inner: &Inner, start: usize) {
    let mut current = Some(start);

    while let Some(index) = current {
        let value = match recompute_proven(inner, index) {
            Some(value) => value,
            None => break
        };

        if !inner.nodes[index].try_prove(value) {
            break;
        }

        current = inner.nodes[index].parent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cz_position::Position;

    #[test]
    fn fresh_root_is_unexpanded() {
        let tree = NodeTree::new_root(Position::startpos());

        match tree.select_leaf(2.5, 0.2) {
            Leaf::Unexpanded { node, .. } => assert_eq!(node, tree.root()),
            Leaf::Terminal { .. } => panic!("startpos is not terminal")
        }
    }

    #[test]
    fn expand_then_backup_updates_visit_counts() {
        let tree = NodeTree::new_root(Position::startpos());
        let legal = tree.with_node(tree.root(), |n| n.position().legal_moves());
        let priors: Vec<(Move, f32)> = legal.iter().map(|&mv| (mv, 1.0 / legal.len() as f32)).collect();

        let path = match tree.select_leaf(2.5, 0.2) {
            Leaf::Unexpanded { path, node } => {
                tree.expand(node, &priors);
                path
            },
            Leaf::Terminal { .. } => panic!("startpos is not terminal")
        };

        tree.backup_path(&path, 0.1);

        tree.with_node(tree.root(), |root| {
            assert_eq!(root.n(), 1);
            assert_eq!(root.nif(), 0);
            assert!((root.w() - 0.1).abs() < 1e-9);
        });
    }

    #[test]
    fn second_visit_descends_into_a_child() {
        let tree = NodeTree::new_root(Position::startpos());
        let legal = tree.with_node(tree.root(), |n| n.position().legal_moves());
        let priors: Vec<(Move, f32)> = legal.iter().map(|&mv| (mv, 1.0 / legal.len() as f32)).collect();

        if let Leaf::Unexpanded { path, node } = tree.select_leaf(2.5, 0.2) {
            tree.expand(node, &priors);
            tree.backup_path(&path, 0.1);
        }

        match tree.select_leaf(2.5, 0.2) {
            Leaf::Unexpanded { node, path } => {
                assert_ne!(node, tree.root());
                assert_eq!(path.len(), 2);
            },
            Leaf::Terminal { .. } => panic!("startpos's children are not terminal")
        }
    }

    #[test]
    fn promote_to_root_reparents_an_existing_child() {
        let tree = NodeTree::new_root(Position::startpos());
        let legal = tree.with_node(tree.root(), |n| n.position().legal_moves());
        let priors: Vec<(Move, f32)> = legal.iter().map(|&mv| (mv, 1.0 / legal.len() as f32)).collect();

        if let Leaf::Unexpanded { path, node } = tree.select_leaf(2.5, 0.2) {
            tree.expand(node, &priors);
            tree.backup_path(&path, 0.1);
        }

        let mv = legal[0];

        tree.promote_to_root(mv);

        let expected = Position::startpos().make_move(mv);
        assert_eq!(tree.root_position().side_to_move(), expected.side_to_move());
    }

    #[test]
    fn promote_to_root_recycles_sibling_subtrees() {
        let tree = NodeTree::new_root(Position::startpos());
        let legal = tree.with_node(tree.root(), |n| n.position().legal_moves());
        let priors: Vec<(Move, f32)> = legal.iter().map(|&mv| (mv, 1.0 / legal.len() as f32)).collect();

        if let Leaf::Unexpanded { path, node } = tree.select_leaf(2.5, 0.2) {
            tree.expand(node, &priors);
            tree.backup_path(&path, 0.1);
        }

        // every legal move from startpos got a root child; only one
        // survives the promotion.
        assert_eq!(tree.len(), 1 + legal.len());

        tree.promote_to_root(legal[0]);

        assert_eq!(tree.len(), 1);
        assert_eq!(tree.root(), 0);
    }

    #[test]
    fn promote_to_root_handles_an_unvisited_move() {
        let tree = NodeTree::new_root(Position::startpos());
        let legal = tree.with_node(tree.root(), |n| n.position().legal_moves());

        tree.promote_to_root(legal[0]);

        assert_eq!(tree.with_node(tree.root(), |n| n.n()), 0);
    }

    #[test]
    fn history_survives_repeated_promotion() {
        let tree = NodeTree::new_root(Position::startpos());
        let mv1 = tree.with_node(tree.root(), |n| n.position().legal_moves())[0];

        tree.promote_to_root(mv1);

        let mv2 = tree.with_node(tree.root(), |n| n.position().legal_moves())[0];

        tree.promote_to_root(mv2);

        // the startpos, the position after mv1, and the current root.
        assert_eq!(tree.history(tree.root()).len(), 3);
    }

    #[test]
    fn repeating_a_position_three_times_is_a_draw() {
        // shuffle a knight out and back, twice each side: the starting
        // position recurs after ply 4 and again after ply 8, its third
        // occurrence overall (including ply 0).
        let tree = NodeTree::new_root(Position::startpos());
        let moves = ["g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1", "f6g8"];

        for mv_str in moves {
            let mv = tree.root_position().parse_move(mv_str).expect("shuffling moves are always legal");
            tree.promote_to_root(mv);
        }

        assert_eq!(tree.root_position().terminal(), Some(Terminal::Draw));
    }

    #[test]
    fn expanding_into_a_mating_move_proves_the_root_a_win() {
        // white to move, mate in one via h1h8.
        let pos = Position::from_fen("4k3/8/4K3/8/8/8/8/7R w - - 0 1").unwrap();
        let tree = NodeTree::new_root(pos);
        let legal = tree.with_node(tree.root(), |n| n.position().legal_moves());
        let priors: Vec<(Move, f32)> = legal.iter().map(|&mv| (mv, 1.0 / legal.len() as f32)).collect();

        assert_eq!(tree.with_node(tree.root(), |n| n.proven()), None);

        if let Leaf::Unexpanded { node, .. } = tree.select_leaf(2.5, 0.2) {
            tree.expand(node, &priors);
        }

        assert_eq!(tree.with_node(tree.root(), |n| n.proven()), Some(Terminal::Win));
    }
}
