//! Quadtree over one cube face.
//!
//! Nodes live in an arena rebuilt on every camera update. Children are
//! always pushed after their parent, so walking the arena in index order
//! visits parents first; [`QuadtreeFace::populate_neighbors`] relies on it.

use glam::DVec3;
use lithos_cubesphere::{ChunkAddress, CubeFace, FaceDirection};

use crate::node::{NodeId, NodeRef, QuadNode, quadrant};
use crate::settings::{LodSettings, ProxySource};

/// A leaf lying on one edge of its face, with its span along that edge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeEntry {
    /// The boundary leaf.
    pub node: NodeId,
    /// Start of the leaf's span along the edge, face-local.
    pub min: f64,
    /// End of the span.
    pub max: f64,
}

/// Quadtree of one cube face, rebuilt for each camera position.
pub struct QuadtreeFace {
    face: CubeFace,
    half_extent: f64,
    nodes: Vec<QuadNode>,
    /// Boundary leaves per [`FaceDirection`] slot, sorted by `min`.
    edges: [Vec<EdgeEntry>; 4],
}

impl QuadtreeFace {
    /// A tree holding only the root of `face`.
    pub fn new(face: CubeFace, half_extent: f64, proxies: &impl ProxySource) -> Self {
        let root = ChunkAddress::root(face);
        let proxy = proxies.proxy_position(face, &root.bounds(half_extent));
        Self {
            face,
            half_extent,
            nodes: vec![QuadNode::new(root, half_extent, None, proxy, DVec3::ZERO)],
            edges: Default::default(),
        }
    }

    /// The cube face this tree covers.
    pub fn face(&self) -> CubeFace {
        self.face
    }

    /// Half edge length of the face.
    pub fn half_extent(&self) -> f64 {
        self.half_extent
    }

    /// Level-0 node covering the whole face.
    pub fn root(&self) -> &QuadNode {
        &self.nodes[NodeId::ROOT.index()]
    }

    /// # Panics
    ///
    /// Panics if `id` does not belong to the current tree.
    pub fn node(&self, id: NodeId) -> &QuadNode {
        &self.nodes[id.index()]
    }

    /// Node by id, `None` if out of range.
    pub fn get(&self, id: NodeId) -> Option<&QuadNode> {
        self.nodes.get(id.index())
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut QuadNode {
        &mut self.nodes[id.index()]
    }

    /// Nodes in the tree, leaves and interior.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Never true once constructed; the root always exists.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every node, parents before children.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &QuadNode)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }

    /// Nodes without children.
    pub fn leaves(&self) -> impl Iterator<Item = (NodeId, &QuadNode)> + '_ {
        self.nodes().filter(|(_, n)| n.is_leaf())
    }

    /// Boundary leaves on edge `dir`, filled by [`Self::populate_edges`].
    pub fn edges(&self, dir: FaceDirection) -> &[EdgeEntry] {
        &self.edges[dir.index()]
    }

    /// Rebuild the tree for `camera`: split pass, optional balance pass,
    /// then same-face neighbour links. Edge tables are cleared until
    /// [`Self::populate_edges`] runs.
    pub fn set_camera_position(
        &mut self,
        camera: DVec3,
        settings: &LodSettings,
        proxies: &impl ProxySource,
    ) {
        self.nodes.truncate(1);
        let root = &mut self.nodes[0];
        root.children = None;
        root.neighbors = [None; 4];
        root.distance = camera.distance(root.proxy);

        let mut stack = vec![NodeId::ROOT];
        while let Some(id) = stack.pop() {
            let node = self.node(id);
            if settings.should_split(node.size(), node.level(), node.distance)
                && let Some(children) = self.split(id, camera, proxies)
            {
                stack.extend(children);
            }
        }

        self.populate_neighbors();
        if settings.balance {
            self.balance(camera, proxies);
        }
        for edge in &mut self.edges {
            edge.clear();
        }

        tracing::trace!(
            face = ?self.face,
            nodes = self.nodes.len(),
            leaves = self.leaves().count(),
            "Face subdivided"
        );
    }

    fn split(
        &mut self,
        id: NodeId,
        camera: DVec3,
        proxies: &impl ProxySource,
    ) -> Option<[NodeId; 4]> {
        let node = self.node(id);
        if node.children.is_some() {
            return node.children;
        }
        let addresses = node.address.children()?;
        let base = self.nodes.len() as u32;
        for address in addresses {
            let proxy = proxies.proxy_position(self.face, &address.bounds(self.half_extent));
            self.nodes
                .push(QuadNode::new(address, self.half_extent, Some(id), proxy, camera));
        }
        let ids = [NodeId(base), NodeId(base + 1), NodeId(base + 2), NodeId(base + 3)];
        self.node_mut(id).children = Some(ids);
        Some(ids)
    }

    /// The neighbour a child inherits through its parent's neighbour `n`:
    /// that neighbour's child in `slot` if it is split at the parent's level,
    /// otherwise the neighbour itself.
    fn descend(&self, n: Option<NodeRef>, parent_level: u8, slot: usize) -> Option<NodeRef> {
        let r = n?;
        let node = self.node(r.node);
        match node.children {
            Some(children) if node.level() == parent_level => Some(NodeRef {
                face: self.face,
                node: children[slot],
            }),
            _ => Some(r),
        }
    }

    /// Link every node to its same-face neighbours, top down.
    pub fn populate_neighbors(&mut self) {
        use quadrant::{NE, NW, SE, SW};

        for i in 0..self.nodes.len() {
            let Some(children) = self.nodes[i].children else {
                continue;
            };
            let level = self.nodes[i].level();
            let [pn, ps, pe, pw] = self.nodes[i].neighbors;
            let sib = |slot: usize| {
                Some(NodeRef {
                    face: self.face,
                    node: children[slot],
                })
            };

            // [north, south, east, west] per child.
            let links = [
                [sib(NW), self.descend(ps, level, NW), sib(SE), self.descend(pw, level, SE)],
                [sib(NE), self.descend(ps, level, NE), self.descend(pe, level, SW), sib(SW)],
                [self.descend(pn, level, SW), sib(SW), sib(NE), self.descend(pw, level, NE)],
                [self.descend(pn, level, SE), sib(SE), self.descend(pe, level, NW), sib(NW)],
            ];
            for (child, neighbors) in children.into_iter().zip(links) {
                self.node_mut(child).neighbors = neighbors;
            }
        }
    }

    /// Split leaves until no leaf borders a same-face leaf more than one
    /// level finer.
    fn balance(&mut self, camera: DVec3, proxies: &impl ProxySource) {
        loop {
            let mut coarse: Vec<NodeId> = Vec::new();
            for (_, node) in self.leaves() {
                for n in node.neighbors.iter().flatten() {
                    let other = self.node(n.node);
                    if other.is_leaf() && node.level() > other.level() + 1 {
                        coarse.push(n.node);
                    }
                }
            }
            if coarse.is_empty() {
                break;
            }
            coarse.sort_unstable();
            coarse.dedup();
            tracing::trace!(face = ?self.face, splits = coarse.len(), "Balancing face");
            for id in coarse {
                self.split(id, camera, proxies);
            }
            self.populate_neighbors();
        }
    }

    /// Collect the leaves touching each face edge with their span along it.
    pub fn populate_edges(&mut self) {
        for edge in &mut self.edges {
            edge.clear();
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if !node.is_leaf() {
                continue;
            }
            let last = ChunkAddress::grid_size(node.level()) - 1;
            let a = node.address;
            for dir in FaceDirection::ALL {
                let on_edge = match dir {
                    FaceDirection::North => a.y == last,
                    FaceDirection::South => a.y == 0,
                    FaceDirection::East => a.x == last,
                    FaceDirection::West => a.x == 0,
                };
                if on_edge {
                    let (min, max) = node.edge_range(dir);
                    self.edges[dir.index()].push(EdgeEntry {
                        node: NodeId(i as u32),
                        min,
                        max,
                    });
                }
            }
        }
        for edge in &mut self.edges {
            edge.sort_by(|a, b| a.min.total_cmp(&b.min));
        }
    }

    /// The boundary leaf on `dir` whose span contains edge coordinate `t`.
    pub fn find_edge_entry(&self, dir: FaceDirection, t: f64) -> Option<&EdgeEntry> {
        let entries = self.edges(dir);
        let eps = 1e-9 * self.half_extent;
        let idx = entries.partition_point(|e| e.min <= t + eps);
        let entry = entries.get(idx.checked_sub(1)?)?;
        (t <= entry.max + eps).then_some(entry)
    }
}
