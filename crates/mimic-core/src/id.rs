//! Identity types for MIMIC
//!
//! Scene nodes are addressed by generational arena indices so that an id
//! held after its node was detached can never alias a newer node.

use std::fmt;

/// Scene node identity - arena slot plus generation
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        NodeId { index, generation }
    }

    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }

    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Asset identity - one per successful load within a session
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AssetId(pub u64);

impl AssetId {
    pub const ZERO: AssetId = AssetId(0);

    #[inline]
    pub fn new(id: u64) -> Self {
        AssetId(id)
    }

    /// The id handed out after this one
    #[inline]
    pub fn next(self) -> Self {
        AssetId(self.0.wrapping_add(1))
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Asset({})", self.0)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "asset-{}", self.0)
    }
}

/// Utterance identity - one per `speak` request
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UtteranceId(pub u64);

impl UtteranceId {
    #[inline]
    pub fn new(id: u64) -> Self {
        UtteranceId(id)
    }
}

impl fmt::Debug for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Utterance({})", self.0)
    }
}
