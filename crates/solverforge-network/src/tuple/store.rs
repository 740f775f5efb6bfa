//! Build-time slot reservation.

use crate::node::NodeIndex;

/// Store length per tuple owner, grown while the network is assembled and
/// frozen when the tuple arena is created.
#[derive(Debug, Default)]
pub(crate) struct StoreLayout {
    sizes: Vec<usize>,
}

impl StoreLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new owner whose first `own_slots` slots are its own.
    pub fn add_owner(&mut self, owner: NodeIndex, own_slots: usize) {
        if self.sizes.len() <= owner {
            self.sizes.resize(owner + 1, 0);
        }
        self.sizes[owner] = own_slots;
    }

    /// Reserves the next slot on tuples owned by `owner`.
    pub fn reserve(&mut self, owner: NodeIndex) -> usize {
        if self.sizes.len() <= owner {
            self.sizes.resize(owner + 1, 0);
        }
        let index = self.sizes[owner];
        self.sizes[owner] += 1;
        index
    }

    pub fn into_sizes(self, owners: usize) -> Vec<usize> {
        let mut sizes = self.sizes;
        sizes.resize(owners.max(sizes.len()), 0);
        sizes
    }
}
