//! Arena nodes of a face quadtree.

use glam::{DVec2, DVec3};
use lithos_cubesphere::{ChunkAddress, CubeFace, FaceBounds, FaceDirection};

/// Index of a node in its face's arena. Only valid until the face's next
/// `set_camera_position`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// The root is always the first node.
    pub const ROOT: NodeId = NodeId(0);

    /// Position in the face's arena.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A node on any face.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeRef {
    /// Face whose arena holds the node.
    pub face: CubeFace,
    /// Index in that arena.
    pub node: NodeId,
}

/// Child slots in SW, SE, NW, NE order, matching [`ChunkAddress::children`].
pub mod quadrant {
    /// South-west child.
    pub const SW: usize = 0;
    /// South-east child.
    pub const SE: usize = 1;
    /// North-west child.
    pub const NW: usize = 2;
    /// North-east child.
    pub const NE: usize = 3;
}

/// One node of a face quadtree.
#[derive(Clone, Debug)]
pub struct QuadNode {
    /// Face, level and grid coordinates.
    pub address: ChunkAddress,
    /// Face-local footprint.
    pub bounds: FaceBounds,
    /// `None` for the root.
    pub parent: Option<NodeId>,
    /// Either no children or all four.
    pub children: Option<[NodeId; 4]>,
    /// Neighbour per [`FaceDirection`] slot. The neighbour is at the same
    /// level or coarser; `None` on a face boundary until cross-face
    /// resolution runs.
    pub neighbors: [Option<NodeRef>; 4],
    /// Conservative surface point used for distance tests.
    pub proxy: DVec3,
    /// Distance from the last camera position to `proxy`.
    pub distance: f64,
}

impl QuadNode {
    pub(crate) fn new(
        address: ChunkAddress,
        half_extent: f64,
        parent: Option<NodeId>,
        proxy: DVec3,
        camera: DVec3,
    ) -> Self {
        Self {
            address,
            bounds: address.bounds(half_extent),
            parent,
            children: None,
            neighbors: [None; 4],
            proxy,
            distance: camera.distance(proxy),
        }
    }

    /// No children.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Face of the node's address.
    #[inline]
    pub fn face(&self) -> CubeFace {
        self.address.face
    }

    /// Depth below the root.
    #[inline]
    pub fn level(&self) -> u8 {
        self.address.level
    }

    /// Face-local centre.
    #[inline]
    pub fn center(&self) -> DVec2 {
        self.bounds.center()
    }

    /// Face-local edge length.
    #[inline]
    pub fn size(&self) -> f64 {
        self.bounds.size()
    }

    /// Neighbour across edge `dir`.
    #[inline]
    pub fn neighbor(&self, dir: FaceDirection) -> Option<NodeRef> {
        self.neighbors[dir.index()]
    }

    /// Span of this node along the axis of `edge`.
    pub fn edge_range(&self, edge: FaceDirection) -> (f64, f64) {
        if edge.runs_along_x() {
            (self.bounds.min.x, self.bounds.max.x)
        } else {
            (self.bounds.min.y, self.bounds.max.y)
        }
    }
}
