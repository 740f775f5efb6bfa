//! Links between a left record and a right record of a two-input operator.

use crate::arena::Arena;

use super::Side;

pub(crate) struct Pair<P> {
    pub left: usize,
    pub right: usize,
    pub payload: P,
    left_pos: usize,
    right_pos: usize,
}

/// Every pair is listed under both of its records, so all pairs of a record
/// are found without a search and one pair is unlinked in O(1).
pub(crate) struct PairTable<P> {
    pairs: Arena<Pair<P>>,
    links: [Vec<Vec<usize>>; 2],
}

fn side_index(side: Side) -> usize {
    match side {
        Side::Left => 0,
        Side::Right => 1,
    }
}

impl<P> PairTable<P> {
    pub fn new() -> Self {
        Self {
            pairs: Arena::new(),
            links: [Vec::new(), Vec::new()],
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    fn list_mut(&mut self, side: Side, record: usize) -> &mut Vec<usize> {
        let lists = &mut self.links[side_index(side)];
        if lists.len() <= record {
            lists.resize_with(record + 1, Vec::new);
        }
        &mut lists[record]
    }

    pub fn add(&mut self, left: usize, right: usize, payload: P) -> usize {
        let left_pos = self.list_mut(Side::Left, left).len();
        let right_pos = self.list_mut(Side::Right, right).len();
        let id = self.pairs.insert(Pair {
            left,
            right,
            payload,
            left_pos,
            right_pos,
        });
        self.list_mut(Side::Left, left).push(id);
        self.list_mut(Side::Right, right).push(id);
        id
    }

    pub fn get(&self, pair: usize) -> Option<&Pair<P>> {
        self.pairs.get(pair)
    }

    /// Pair ids of `record` on `side`.
    pub fn links(&self, side: Side, record: usize) -> &[usize] {
        self.links[side_index(side)]
            .get(record)
            .map_or(&[][..], Vec::as_slice)
    }

    pub fn remove(&mut self, pair: usize) -> Option<Pair<P>> {
        let removed = self.pairs.remove(pair)?;
        self.unlink(Side::Left, removed.left, removed.left_pos);
        self.unlink(Side::Right, removed.right, removed.right_pos);
        Some(removed)
    }

    /// Removes every pair of `record`, returning them.
    pub fn remove_all(&mut self, side: Side, record: usize) -> Vec<Pair<P>> {
        let ids = std::mem::take(self.list_mut(side, record));
        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(pair) = self.pairs.remove(id) {
                match side {
                    Side::Left => self.unlink(Side::Right, pair.right, pair.right_pos),
                    Side::Right => self.unlink(Side::Left, pair.left, pair.left_pos),
                }
                removed.push(pair);
            }
        }
        removed
    }

    fn unlink(&mut self, side: Side, record: usize, pos: usize) {
        let list = self.list_mut(side, record);
        if pos >= list.len() {
            return;
        }
        list.swap_remove(pos);
        let Some(&moved) = list.get(pos) else {
            return;
        };
        if let Some(pair) = self.pairs.get_mut(moved) {
            match side {
                Side::Left => pair.left_pos = pos,
                Side::Right => pair.right_pos = pos,
            }
        }
    }
}
