use rustc_hash::FxHashMap;

use crate::visibility::{GroupMask, VisibilityGroup};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Flat `(node, group)` table. A node is stored once, so it can never be in
/// two groups at the same time; reassigning moves it.
#[derive(Debug, Default)]
pub struct PartitionRegistry {
    entries: Vec<(NodeId, VisibilityGroup)>,
    index: FxHashMap<NodeId, usize>,
    next_id: u32,
}

impl PartitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fresh node already assigned to `group`.
    pub fn register(&mut self, group: VisibilityGroup) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.assign(id, group);
        id
    }

    pub fn assign(&mut self, node: NodeId, group: VisibilityGroup) {
        if let Some(&slot) = self.index.get(&node) {
            self.entries[slot].1 = group;
            return;
        }
        self.index.insert(node, self.entries.len());
        self.entries.push((node, group));
        self.next_id = self.next_id.max(node.0.saturating_add(1));
    }

    pub fn group_of(&self, node: NodeId) -> Option<VisibilityGroup> {
        self.index.get(&node).map(|&slot| self.entries[slot].1)
    }

    pub fn nodes_in(&self, mask: GroupMask) -> impl Iterator<Item = NodeId> + '_ {
        self.entries
            .iter()
            .filter(move |(_, group)| mask.is_enabled(*group))
            .map(|(node, _)| *node)
    }

    pub fn count_in(&self, group: VisibilityGroup) -> usize {
        self.entries.iter().filter(|(_, g)| *g == group).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{NodeId, PartitionRegistry};
    use crate::visibility::{GroupMask, VisibilityGroup};

    #[test]
    fn every_node_lives_in_exactly_one_group() {
        let mut registry = PartitionRegistry::new();
        let ids: Vec<NodeId> = [
            VisibilityGroup::Outside,
            VisibilityGroup::Outside,
            VisibilityGroup::Inside,
            VisibilityGroup::PortalSurface,
        ]
        .into_iter()
        .map(|group| registry.register(group))
        .collect();
        assert_eq!(registry.len(), 4);

        let total: usize = VisibilityGroup::ALL
            .iter()
            .map(|&group| registry.count_in(group))
            .sum();
        assert_eq!(total, registry.len());

        registry.assign(ids[0], VisibilityGroup::Inside);
        assert_eq!(registry.group_of(ids[0]), Some(VisibilityGroup::Inside));
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.count_in(VisibilityGroup::Inside), 2);
        assert_eq!(registry.count_in(VisibilityGroup::Outside), 1);
    }

    #[test]
    fn nodes_in_filters_by_mask() {
        let mut registry = PartitionRegistry::new();
        let inside = registry.register(VisibilityGroup::Inside);
        let outside = registry.register(VisibilityGroup::Outside);
        let portal = registry.register(VisibilityGroup::PortalSurface);

        let drawn: Vec<NodeId> = registry
            .nodes_in(GroupMask::INSIDE | GroupMask::PORTAL_SURFACE)
            .collect();
        assert_eq!(drawn, vec![inside, portal]);
        assert_eq!(registry.nodes_in(GroupMask::OUTSIDE).collect::<Vec<_>>(), vec![outside]);
        assert_eq!(registry.nodes_in(GroupMask::empty()).count(), 0);
    }

    #[test]
    fn reassigned_node_moves_between_masks_in_registration_order() {
        let mut registry = PartitionRegistry::new();
        let first = registry.register(VisibilityGroup::Outside);
        let second = registry.register(VisibilityGroup::Inside);
        let third = registry.register(VisibilityGroup::Outside);

        registry.assign(second, VisibilityGroup::Outside);
        assert_eq!(
            registry.nodes_in(GroupMask::OUTSIDE).collect::<Vec<_>>(),
            vec![first, second, third]
        );
        assert_eq!(registry.nodes_in(GroupMask::INSIDE).count(), 0);
    }

    #[test]
    fn explicit_assign_does_not_collide_with_later_registration() {
        let mut registry = PartitionRegistry::new();
        registry.assign(NodeId(7), VisibilityGroup::Outside);
        let next = registry.register(VisibilityGroup::Inside);
        assert_eq!(next, NodeId(8));
        assert_eq!(registry.group_of(NodeId(3)), None);
    }
}
