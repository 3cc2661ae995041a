//! In-memory graph snapshot produced by one ingestion run.
//!
//! The assembler builds the base graph (files, symbols, DEFINES, IMPORTS,
//! CALLS, EXTENDS, IMPLEMENTS); community detection and process extraction
//! add their overlays; the store persists the whole snapshot at once.

mod assembler;
mod resolve;

pub use assembler::{AssemblyStats, GraphAssembler, SourceUnit};
pub use resolve::{dir_of, path_distance, ImportResolver};

use serde::{Deserialize, Serialize};

use crate::knowledge::ontology::{
    CodeRelation, CommunityNode, FileNode, NodeRef, ProcessNode, RelationType, SymbolNode,
};

/// Nodes and relations of one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub files: Vec<FileNode>,
    pub symbols: Vec<SymbolNode>,
    /// Index of the declaring file of each symbol.
    pub symbol_files: Vec<usize>,
    pub communities: Vec<CommunityNode>,
    pub processes: Vec<ProcessNode>,
    /// Relations in creation order.
    pub relations: Vec<CodeRelation>,
}

impl GraphSnapshot {
    /// Persisted id of a node.
    pub fn node_id(&self, node: NodeRef) -> Option<&str> {
        match node {
            NodeRef::File(i) => self.files.get(i).map(|n| n.id.as_str()),
            NodeRef::Symbol(i) => self.symbols.get(i).map(|n| n.id.as_str()),
            NodeRef::Community(i) => self.communities.get(i).map(|n| n.id.as_str()),
            NodeRef::Process(i) => self.processes.get(i).map(|n| n.id.as_str()),
        }
    }

    /// Relations of one type, in creation order.
    pub fn relations_of(&self, kind: RelationType) -> impl Iterator<Item = &CodeRelation> {
        self.relations.iter().filter(move |r| r.kind == kind)
    }

    /// CALLS between two symbols as `(caller, callee)` pairs, in creation order.
    pub fn symbol_calls(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.relations_of(RelationType::Calls)
            .filter_map(|r| Some((r.source.symbol()?, r.target.symbol()?)))
    }

    pub fn node_count(&self) -> usize {
        self.files.len() + self.symbols.len() + self.communities.len() + self.processes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.relations.len()
    }
}
