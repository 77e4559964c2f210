//! Dependency graph over a card collection.
//!
//! An edge `a -> b` means "card `a` depends on card `b`" (`b.id` appears in
//! `a.dependencies`). Ids that resolve to no card contribute no edge; they
//! are reported separately as missing references.
//!
//! Two cycle queries exist:
//! * [`DependencyIndex::reaches_cycle`] runs a fresh depth-first traversal
//!   from one card, keeping a visited set and a recursion-stack set. Each
//!   node is expanded at most once, so one call is O(V + E).
//! * [`DependencyIndex::cycle_scan`] answers the same question for every
//!   card with a single three-colour traversal of the whole graph, memoising
//!   "reaches a cycle" per node. Use it when validating a collection to avoid
//!   repeating the per-card traversal V times.
//!
//! Every call allocates its own traversal state; nothing is shared between
//! calls or collections.

use core_model::{Card, CardCollection};
use std::collections::{HashMap, HashSet, VecDeque};

/// Resolved adjacency for one collection, both directions.
#[derive(Debug)]
pub struct DependencyIndex<'a> {
    cards: &'a CardCollection,
    positions: HashMap<&'a str, usize>,
    /// `dependents[i]` = indices of cards whose `dependencies` resolve to card `i`.
    dependents: Vec<Vec<usize>>,
}

/// Derived per-card numbers shown next to a card.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardMetrics {
    pub lines_of_code: u32,
    pub dependencies: usize,
    pub dependents: usize,
    pub complexity: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Colour {
    White,
    Grey,
    Black,
}

struct Frame<'r> {
    id: &'r str,
    deps: &'r [String],
    next: usize,
}

impl<'a> DependencyIndex<'a> {
    pub fn new(cards: &'a CardCollection) -> Self {
        let positions: HashMap<&str, usize> = cards
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.as_str(), i))
            .collect();
        let mut dependents = vec![Vec::new(); cards.len()];
        for (i, card) in cards.iter().enumerate() {
            let mut seen = HashSet::new();
            for dep in &card.dependencies {
                if let Some(&target) = positions.get(dep.as_str())
                    && seen.insert(target)
                {
                    dependents[target].push(i);
                }
            }
        }
        Self {
            cards,
            positions,
            dependents,
        }
    }

    pub fn cards(&self) -> &'a CardCollection {
        self.cards
    }

    pub fn card(&self, id: &str) -> Option<&'a Card> {
        self.positions
            .get(id)
            .map(|&i| &self.cards.as_slice()[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Dependencies of `card` that resolve, in declaration order.
    pub fn resolved_dependencies<'c>(
        &'c self,
        card: &'c Card,
    ) -> impl Iterator<Item = &'a Card> + 'c {
        card.dependencies.iter().filter_map(|d| self.card(d))
    }

    /// Dependency ids of `card` that do not resolve, in declaration order.
    pub fn missing_dependencies<'c>(
        &'c self,
        card: &'c Card,
    ) -> impl Iterator<Item = &'c str> + 'c {
        card.dependencies
            .iter()
            .map(String::as_str)
            .filter(|d| !self.contains(d))
    }

    /// Cards that actually depend on `id`, derived from `dependencies` edges
    /// (independent of whatever the stored `dependents` field claims).
    pub fn dependents_of(&self, id: &str) -> Vec<&'a Card> {
        let slice = self.cards.as_slice();
        self.positions
            .get(id)
            .map(|&i| self.dependents[i].iter().map(|&j| &slice[j]).collect())
            .unwrap_or_default()
    }

    pub fn metrics(&self, id: &str) -> Option<CardMetrics> {
        let card = self.card(id)?;
        Some(CardMetrics {
            lines_of_code: card.lines_of_code(),
            dependencies: card.dependencies.len(),
            dependents: self.dependents_of(id).len(),
            complexity: card.complexity,
        })
    }

    /// Depth-first search from `root` (which need not belong to the
    /// collection; its own `dependencies` are used for the first hop).
    /// Returns true once the traversal re-enters a node that is still on the
    /// recursion stack.
    pub fn reaches_cycle<'r>(&'r self, root: &'r Card) -> bool {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut on_stack: HashSet<&str> = HashSet::new();
        let mut stack = vec![Frame {
            id: root.id.as_str(),
            deps: &root.dependencies,
            next: 0,
        }];
        visited.insert(root.id.as_str());
        on_stack.insert(root.id.as_str());

        while let Some(frame) = stack.last_mut() {
            let deps = frame.deps;
            let Some(dep) = deps.get(frame.next) else {
                let done = frame.id;
                stack.pop();
                on_stack.remove(done);
                continue;
            };
            frame.next += 1;
            let dep = dep.as_str();
            if on_stack.contains(dep) {
                return true;
            }
            if !visited.insert(dep) {
                continue;
            }
            if let Some(card) = self.card(dep) {
                on_stack.insert(dep);
                stack.push(Frame {
                    id: dep,
                    deps: &card.dependencies,
                    next: 0,
                });
            }
        }
        false
    }

    /// For every card (by collection index): does a traversal starting at it
    /// reach a cycle? One pass over the whole graph.
    pub fn cycle_scan(&self) -> Vec<bool> {
        let slice = self.cards.as_slice();
        let n = slice.len();
        let mut colour = vec![Colour::White; n];
        let mut reaches = vec![false; n];
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for start in 0..n {
            if colour[start] != Colour::White {
                continue;
            }
            colour[start] = Colour::Grey;
            stack.push((start, 0));
            while let Some(frame) = stack.last_mut() {
                let (node, next) = *frame;
                let deps = &slice[node].dependencies;
                if next < deps.len() {
                    frame.1 += 1;
                    let Some(&child) = self.positions.get(deps[next].as_str()) else {
                        continue;
                    };
                    match colour[child] {
                        Colour::Grey => reaches[node] = true,
                        Colour::Black => reaches[node] |= reaches[child],
                        Colour::White => {
                            colour[child] = Colour::Grey;
                            stack.push((child, 0));
                        }
                    }
                } else {
                    colour[node] = Colour::Black;
                    stack.pop();
                    if let Some(&(parent, _)) = stack.last() {
                        reaches[parent] |= reaches[node];
                    }
                }
            }
        }
        reaches
    }

    /// Dependency-first ordering (every card after the cards it depends on),
    /// ties broken by collection order. When cycles prevent a full ordering
    /// the ids of the cards that could not be placed are returned instead.
    pub fn topological_order(&self) -> Result<Vec<&'a Card>, Vec<&'a str>> {
        let slice = self.cards.as_slice();
        // Number of distinct resolved dependencies not yet placed.
        let mut pending: Vec<usize> = slice
            .iter()
            .map(|card| {
                card.dependencies
                    .iter()
                    .filter_map(|d| self.positions.get(d.as_str()).copied())
                    .collect::<HashSet<usize>>()
                    .len()
            })
            .collect();

        let mut ready: VecDeque<usize> = (0..slice.len()).filter(|&i| pending[i] == 0).collect();
        let mut placed = vec![false; slice.len()];
        let mut order = Vec::with_capacity(slice.len());
        while let Some(i) = ready.pop_front() {
            placed[i] = true;
            order.push(&slice[i]);
            for &user in &self.dependents[i] {
                pending[user] -= 1;
                if pending[user] == 0 {
                    ready.push_back(user);
                }
            }
        }
        if order.len() == slice.len() {
            Ok(order)
        } else {
            Err(slice
                .iter()
                .enumerate()
                .filter(|(i, _)| !placed[*i])
                .map(|(_, c)| c.id.as_str())
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_model::CardType;

    fn card(id: &str, deps: &[&str]) -> Card {
        Card::new(id, CardType::Function, id).with_dependencies(deps.iter().copied())
    }

    fn collection(cards: Vec<Card>) -> CardCollection {
        CardCollection::new(cards).unwrap()
    }

    #[test]
    fn three_cycle_detected_from_every_member() {
        let cards = collection(vec![card("A", &["B"]), card("B", &["C"]), card("C", &["A"])]);
        let index = DependencyIndex::new(&cards);
        for c in cards.iter() {
            assert!(index.reaches_cycle(c), "{}", c.id);
        }
        assert_eq!(index.cycle_scan(), vec![true, true, true]);
    }

    #[test]
    fn chain_without_back_edge_is_acyclic() {
        let cards = collection(vec![card("A", &["B"]), card("B", &["C"]), card("C", &[])]);
        let index = DependencyIndex::new(&cards);
        for c in cards.iter() {
            assert!(!index.reaches_cycle(c));
        }
        assert_eq!(index.cycle_scan(), vec![false, false, false]);
    }

    #[test]
    fn card_leading_into_cycle_reaches_it() {
        let cards = collection(vec![
            card("X", &["A"]),
            card("A", &["B"]),
            card("B", &["A"]),
            card("Y", &[]),
        ]);
        let index = DependencyIndex::new(&cards);
        assert!(index.reaches_cycle(&cards.as_slice()[0]));
        assert!(!index.reaches_cycle(&cards.as_slice()[3]));
        assert_eq!(index.cycle_scan(), vec![true, true, true, false]);
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let cards = collection(vec![card("A", &["A"])]);
        let index = DependencyIndex::new(&cards);
        assert!(index.reaches_cycle(&cards.as_slice()[0]));
        assert_eq!(index.cycle_scan(), vec![true]);
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let cards = collection(vec![
            card("top", &["left", "right"]),
            card("left", &["bottom"]),
            card("right", &["bottom"]),
            card("bottom", &[]),
        ]);
        let index = DependencyIndex::new(&cards);
        assert!(!index.reaches_cycle(&cards.as_slice()[0]));
        assert_eq!(index.cycle_scan(), vec![false; 4]);
    }

    #[test]
    fn scan_visits_late_starts_after_cycle_finished() {
        // B's cycle is explored from A first; C then reaches B through a black node.
        let cards = collection(vec![
            card("A", &["B"]),
            card("B", &["D"]),
            card("D", &["B"]),
            card("C", &["B"]),
        ]);
        let index = DependencyIndex::new(&cards);
        let scan = index.cycle_scan();
        for (i, c) in cards.iter().enumerate() {
            assert_eq!(scan[i], index.reaches_cycle(c), "{}", c.id);
        }
    }

    #[test]
    fn missing_ids_are_not_edges() {
        let cards = collection(vec![card("loadUser", &["setUser", "api"]), card("api", &[])]);
        let index = DependencyIndex::new(&cards);
        let load = &cards.as_slice()[0];
        assert_eq!(index.missing_dependencies(load).collect::<Vec<_>>(), vec!["setUser"]);
        assert_eq!(
            index.resolved_dependencies(load).map(|c| c.id.as_str()).collect::<Vec<_>>(),
            vec!["api"]
        );
        assert!(!index.reaches_cycle(load));
    }

    #[test]
    fn candidate_outside_collection_uses_its_own_edges() {
        let cards = collection(vec![card("A", &["new"])]);
        let index = DependencyIndex::new(&cards);
        let candidate = card("new", &["A", "ghost"]);
        assert!(index.reaches_cycle(&candidate));
        let missing: Vec<&str> = index.missing_dependencies(&candidate).collect();
        assert_eq!(missing, vec!["ghost"]);
    }

    #[test]
    fn derived_dependents_and_metrics() {
        let cards = collection(vec![
            card("a", &["c"]),
            card("b", &["c", "c"]),
            card("c", &[]).with_lines(3, 10),
        ]);
        let index = DependencyIndex::new(&cards);
        let users: Vec<&str> = index.dependents_of("c").iter().map(|c| c.id.as_str()).collect();
        assert_eq!(users, vec!["a", "b"]);
        let m = index.metrics("c").unwrap();
        assert_eq!(m.lines_of_code, 8);
        assert_eq!(m.dependents, 2);
        assert_eq!(m.dependencies, 0);
        assert!(index.metrics("zzz").is_none());
    }

    #[test]
    fn topological_order_puts_dependencies_first() {
        let cards = collection(vec![
            card("app", &["hook", "util"]),
            card("hook", &["util"]),
            card("util", &[]),
        ]);
        let index = DependencyIndex::new(&cards);
        let order: Vec<&str> = index
            .topological_order()
            .unwrap()
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(order, vec!["util", "hook", "app"]);
    }

    #[test]
    fn topological_order_reports_blocked_cards() {
        let cards = collection(vec![
            card("free", &[]),
            card("A", &["B"]),
            card("B", &["A"]),
            card("C", &["A"]),
        ]);
        let index = DependencyIndex::new(&cards);
        assert_eq!(index.topological_order().unwrap_err(), vec!["A", "B", "C"]);
    }
}
