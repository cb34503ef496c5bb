//! Local aggregation of many hashes into one signing request.
//!
//! The block signer builds a Merkle tree over the added hashes, submits only
//! the root, and hands every leaf its own signature: the leaf's path to the
//! local root followed by the chains the aggregator returned.

use std::mem;
use std::sync::Arc;

use ksi_core::{
    combine, shape_of, AggregationHashChain, ChainLink, CoreError, DataHash, Direction,
    HashAlgorithm, IdentityMetadata, KsiSignature,
};
use ksi_service::AggregationService;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{KsiError, Result};

/// Position of an added hash; indexes the output of [`BlockSigner::sign`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeafHandle(usize);

impl LeafHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug)]
struct Leaf {
    hash: DataHash,
    metadata: Option<IdentityMetadata>,
}

#[derive(Debug)]
enum State {
    Open(Vec<Leaf>),
    Closed,
}

/// How a tree node was made.
#[derive(Debug)]
enum NodeKind {
    Leaf,
    /// A leaf hashed together with its identity record.
    Metadata { child: usize, metadata: IdentityMetadata },
    Pair { left: usize, right: usize },
}

#[derive(Debug)]
struct Node {
    hash: DataHash,
    level: u8,
    parent: Option<usize>,
    kind: NodeKind,
}

/// The local aggregation tree, stored as an arena.
struct Tree {
    algorithm: HashAlgorithm,
    nodes: Vec<Node>,
}

impl Tree {
    fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            nodes: Vec::new(),
        }
    }

    fn push(&mut self, hash: DataHash, level: u8, kind: NodeKind) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(Node {
            hash,
            level,
            parent: None,
            kind,
        });
        idx
    }

    /// Add a leaf, wrapped in a metadata node if it carries an identity.
    /// Returns the leaf node and the node that joins the tree above it.
    fn add_leaf(&mut self, leaf: &Leaf) -> Result<(usize, usize)> {
        let leaf_idx = self.push(leaf.hash.clone(), 0, NodeKind::Leaf);
        let Some(metadata) = &leaf.metadata else {
            return Ok((leaf_idx, leaf_idx));
        };

        let hash = combine(
            self.algorithm,
            &leaf.hash,
            &metadata.to_bytes()?,
            Direction::Left,
            1,
        )?;
        let top = self.push(
            hash,
            1,
            NodeKind::Metadata {
                child: leaf_idx,
                metadata: metadata.clone(),
            },
        );
        self.nodes[leaf_idx].parent = Some(top);
        Ok((leaf_idx, top))
    }

    fn join(&mut self, left: usize, right: usize) -> Result<usize> {
        let level = self.nodes[left]
            .level
            .max(self.nodes[right].level)
            .checked_add(1)
            .ok_or_else(|| CoreError::ChainInconsistent("local tree taller than 255 levels".into()))?;
        let hash = combine(
            self.algorithm,
            &self.nodes[left].hash,
            &self.nodes[right].hash.imprint(),
            Direction::Left,
            level,
        )?;
        let parent = self.push(hash, level, NodeKind::Pair { left, right });
        self.nodes[left].parent = Some(parent);
        self.nodes[right].parent = Some(parent);
        Ok(parent)
    }

    /// Links from `node` up to the root, bottom first.
    fn path(&self, mut node: usize) -> Vec<ChainLink> {
        let mut links = Vec::new();
        while let Some(parent) = self.nodes[node].parent {
            let p = &self.nodes[parent];
            let correction = p.level - self.nodes[node].level - 1;
            let link = match &p.kind {
                NodeKind::Metadata { metadata, .. } => {
                    ChainLink::metadata(Direction::Left, metadata.clone())
                }
                NodeKind::Pair { left, right } if *left == node => {
                    ChainLink::left(self.nodes[*right].hash.clone())
                }
                NodeKind::Pair { left, .. } => ChainLink::right(self.nodes[*left].hash.clone()),
                NodeKind::Leaf => break,
            };
            links.push(link.with_level_correction(correction));
            node = parent;
        }
        links
    }
}

/// Signs a batch of hashes with a single aggregation request.
///
/// Single use: hashes may be added from many threads until [`sign`](Self::sign)
/// is called once; after that the signer rejects further calls.
pub struct BlockSigner {
    service: Arc<dyn AggregationService>,
    algorithm: HashAlgorithm,
    state: Mutex<State>,
}

impl BlockSigner {
    /// A signer hashing its local tree with `algorithm`.
    pub fn new(service: Arc<dyn AggregationService>, algorithm: HashAlgorithm) -> Self {
        Self {
            service,
            algorithm,
            state: Mutex::new(State::Open(Vec::new())),
        }
    }

    /// Add a hash, optionally tagged with the identity of whoever submitted it.
    pub fn add(&self, hash: DataHash, metadata: Option<IdentityMetadata>) -> Result<LeafHandle> {
        let mut state = self.state.lock();
        match &mut *state {
            State::Open(leaves) => {
                leaves.push(Leaf { hash, metadata });
                Ok(LeafHandle(leaves.len() - 1))
            }
            State::Closed => Err(KsiError::InvalidState(
                "cannot add to a block signer after sign".into(),
            )),
        }
    }

    /// Number of hashes added so far (zero once closed).
    pub fn len(&self) -> usize {
        match &*self.state.lock() {
            State::Open(leaves) => leaves.len(),
            State::Closed => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build the tree, submit its root and return one signature per added
    /// hash, in the order they were added.
    ///
    /// Either every leaf gets a signature or the call fails; the signer is
    /// closed in both cases.
    pub fn sign(&self) -> Result<Vec<KsiSignature>> {
        let leaves = match mem::replace(&mut *self.state.lock(), State::Closed) {
            State::Open(leaves) => leaves,
            State::Closed => return Err(KsiError::AlreadyClosed),
        };
        if leaves.is_empty() {
            return Ok(Vec::new());
        }

        let mut tree = Tree::new(self.algorithm);
        let mut leaf_nodes = Vec::with_capacity(leaves.len());
        // Perfect subtrees of strictly decreasing size, as (node, rank).
        let mut stack: Vec<(usize, u32)> = Vec::new();

        for leaf in &leaves {
            let (leaf_idx, top) = tree.add_leaf(leaf)?;
            leaf_nodes.push(leaf_idx);

            let (mut node, mut rank) = (top, 0);
            while let Some(&(prev, prev_rank)) = stack.last() {
                if prev_rank != rank {
                    break;
                }
                stack.pop();
                node = tree.join(prev, node)?;
                rank += 1;
            }
            stack.push((node, rank));
        }

        let (mut root, _) = stack.pop().ok_or_else(|| {
            KsiError::InvalidState("local aggregation tree is empty".into())
        })?;
        while let Some((prev, _)) = stack.pop() {
            root = tree.join(prev, root)?;
        }

        let root_hash = tree.nodes[root].hash.clone();
        let root_level = tree.nodes[root].level;
        info!(leaves = leaves.len(), root_level, "submitting block signer root");

        let response = match self.service.sign(&root_hash, root_level) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, leaves = leaves.len(), "block signing failed");
                return Err(e.into());
            }
        };

        let server_chains = response.aggregation_chains;
        let first = server_chains.first().ok_or_else(|| {
            CoreError::MalformedInput("aggregator returned no aggregation chains".into())
        })?;
        if first.input_hash != root_hash {
            return Err(CoreError::ChainInconsistent(
                "aggregator response does not start at the submitted root".into(),
            )
            .into());
        }

        let mut signatures = Vec::with_capacity(leaves.len());
        for (leaf, &leaf_idx) in leaves.iter().zip(&leaf_nodes) {
            let links = tree.path(leaf_idx);
            let mut builder = KsiSignature::builder();

            if !links.is_empty() {
                let shape = shape_of(&links).ok_or_else(|| {
                    CoreError::ChainInconsistent("local chain too long for a chain index".into())
                })?;
                let mut chain_index = first.chain_index.clone();
                chain_index.push(shape);
                builder = builder.aggregation_chain(AggregationHashChain {
                    aggregation_time: first.aggregation_time,
                    chain_index,
                    input_hash: leaf.hash.clone(),
                    aggregation_algorithm: self.algorithm,
                    links,
                });
            }

            builder = builder.aggregation_chains(server_chains.iter().cloned());
            if let Some(chain) = &response.calendar_hash_chain {
                builder = builder.calendar_chain(chain.clone());
            }
            if let Some(record) = &response.calendar_authentication_record {
                builder = builder.calendar_authentication_record(record.clone());
            }
            signatures.push(builder.build()?);
        }

        debug!(signatures = signatures.len(), "block signed");
        Ok(signatures)
    }
}

impl std::fmt::Debug for BlockSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockSigner")
            .field("algorithm", &self.algorithm)
            .field("state", &*self.state.lock())
            .finish()
    }
}
