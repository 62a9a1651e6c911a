//! Transitive closure over entity identifiers.
//!
//! A disjoint-set forest keyed by interned entity strings. Path compression
//! uses iterative path-halving; union-by-rank keeps trees shallow, and on
//! equal ranks the entity interned first becomes the root so that the group
//! representative does not depend on the order of `add` calls for a fixed
//! insertion sequence.
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Groups entities connected by `add` calls.
#[derive(Debug, Clone, Default)]
pub struct EntityClosure {
    ordinals: HashMap<String, usize>,
    names: Vec<String>,
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl EntityClosure {
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, entity: &str) -> usize {
        if let Some(&ordinal) = self.ordinals.get(entity) {
            return ordinal;
        }
        let ordinal = self.names.len();
        self.ordinals.insert(entity.to_owned(), ordinal);
        self.names.push(entity.to_owned());
        self.parent.push(ordinal);
        self.rank.push(0);
        ordinal
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            let grandparent = self.parent[self.parent[x]];
            self.parent[x] = grandparent;
            x = grandparent;
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
                self.parent[child] = root;
                self.rank[root] = self.rank[root].saturating_add(1);
            }
        }
    }

    /// Records that `a` and `b` belong to the same group.
    pub fn add(&mut self, a: &str, b: &str) {
        let a = self.intern(a);
        let b = self.intern(b);
        self.union(a, b);
    }

    /// `true` when both entities are known and share a group.
    pub fn same_group(&mut self, a: &str, b: &str) -> bool {
        let (Some(a), Some(b)) = (self.ordinals.get(a).copied(), self.ordinals.get(b).copied())
        else {
            return false;
        };
        self.find(a) == self.find(b)
    }

    /// All groups, each sorted, ordered by their smallest member.
    pub fn groups(&mut self) -> Vec<BTreeSet<String>> {
        let mut by_root: BTreeMap<usize, BTreeSet<String>> = BTreeMap::new();
        for ordinal in 0..self.names.len() {
            let root = self.find(ordinal);
            by_root
                .entry(root)
                .or_default()
                .insert(self.names[ordinal].clone());
        }
        let mut groups: Vec<BTreeSet<String>> = by_root.into_values().collect();
        groups.sort();
        groups
    }

    /// Number of distinct entities seen.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
