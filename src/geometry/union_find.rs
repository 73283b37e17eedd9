//! Disjoint-set forest with union by rank.

pub(crate) struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u32>,
}

impl UnionFind {
    pub(crate) fn new(count: usize) -> Self {
        Self {
            parent: (0..count).collect(),
            rank: vec![0; count],
        }
    }

    pub(crate) fn find(&self, mut id: usize) -> usize {
        while self.parent[id] != id {
            id = self.parent[id];
        }
        id
    }

    /// Union the sets holding `i1` and `i2`. On equal ranks the root of the
    /// first argument becomes the root of the union.
    pub(crate) fn merge(&mut self, i1: usize, i2: usize) {
        let n1 = self.find(i1);
        let n2 = self.find(i2);
        if n1 == n2 {
            return;
        }
        match self.rank[n1].cmp(&self.rank[n2]) {
            std::cmp::Ordering::Less => self.parent[n1] = n2,
            std::cmp::Ordering::Greater => self.parent[n2] = n1,
            std::cmp::Ordering::Equal => {
                self.parent[n2] = n1;
                self.rank[n1] += 1;
            }
        }
    }
}
