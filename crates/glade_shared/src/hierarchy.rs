use std::collections::VecDeque;

use glam::Mat4;

/// Node tree of one loaded asset bundle, stored as an arena so it can be
/// built on a worker thread and handed to the render loop by value.
#[derive(Debug, Clone, Default)]
pub struct SceneHierarchy {
    nodes: Vec<HierarchyNode>,
    roots: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct HierarchyNode {
    pub name: Option<String>,
    pub local_transform: Mat4,
    pub mesh: Option<usize>,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// One entry of a flattened hierarchy with its transform resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatNode {
    pub index: usize,
    pub depth: u32,
    pub world_transform: Mat4,
}

impl SceneHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(
        &mut self,
        parent: Option<usize>,
        name: Option<String>,
        local_transform: Mat4,
        mesh: Option<usize>,
    ) -> usize {
        let index = self.nodes.len();
        self.nodes.push(HierarchyNode {
            name,
            local_transform,
            mesh,
            parent,
            children: Vec::new(),
        });
        match parent.and_then(|p| self.nodes.get_mut(p)) {
            Some(parent_node) => parent_node.children.push(index),
            None => self.roots.push(index),
        }
        index
    }

    pub fn node(&self, index: usize) -> Option<&HierarchyNode> {
        self.nodes.get(index)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Finds the first node carrying `name`, nearest to the roots first.
    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.flatten_breadth_first()
            .into_iter()
            .map(|flat| flat.index)
            .find(|&index| self.nodes[index].name.as_deref() == Some(name))
    }

    /// Indices of `root` and every descendant, in breadth-first order.
    pub fn descendants(&self, root: usize) -> Vec<usize> {
        if root >= self.nodes.len() {
            return Vec::new();
        }
        let mut out = Vec::new();
        let mut queue = VecDeque::from([root]);
        while let Some(index) = queue.pop_front() {
            out.push(index);
            queue.extend(self.nodes[index].children.iter().copied());
        }
        out
    }

    /// Walks the whole tree once, composing transforms from the roots down.
    pub fn flatten_breadth_first(&self) -> Vec<FlatNode> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut queue: VecDeque<(usize, u32, Mat4)> = self
            .roots
            .iter()
            .map(|&root| (root, 0, Mat4::IDENTITY))
            .collect();

        while let Some((index, depth, parent_transform)) = queue.pop_front() {
            let node = &self.nodes[index];
            let world_transform = parent_transform * node.local_transform;
            out.push(FlatNode {
                index,
                depth,
                world_transform,
            });
            for &child in &node.children {
                queue.push_back((child, depth + 1, world_transform));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec3};

    use super::SceneHierarchy;

    fn sample_tree() -> SceneHierarchy {
        let mut tree = SceneHierarchy::new();
        let root = tree.add_node(
            None,
            Some("scene".into()),
            Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)),
            None,
        );
        let a = tree.add_node(
            Some(root),
            Some("a".into()),
            Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0)),
            Some(0),
        );
        tree.add_node(Some(root), Some("b".into()), Mat4::IDENTITY, Some(1));
        tree.add_node(
            Some(a),
            Some("a_child".into()),
            Mat4::from_translation(Vec3::new(0.0, 0.0, 3.0)),
            Some(2),
        );
        tree
    }

    #[test]
    fn flatten_visits_breadth_first_and_composes_transforms() {
        let tree = sample_tree();
        let flat = tree.flatten_breadth_first();
        let order: Vec<usize> = flat.iter().map(|node| node.index).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
        assert_eq!(flat[3].depth, 2);

        let leaf_origin = flat[3].world_transform.transform_point3(Vec3::ZERO);
        assert!((leaf_origin - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-6);
    }

    #[test]
    fn descendants_include_root_and_all_children() {
        let tree = sample_tree();
        assert_eq!(tree.descendants(1), vec![1, 3]);
        assert_eq!(tree.descendants(0).len(), 4);
        assert!(tree.descendants(42).is_empty());
    }

    #[test]
    fn find_by_name_returns_none_for_missing_nodes() {
        let tree = sample_tree();
        assert_eq!(tree.find_by_name("a_child"), Some(3));
        assert_eq!(tree.node(3).and_then(|node| node.parent), Some(1));
        assert_eq!(tree.find_by_name("poleLightC"), None);
    }
}
