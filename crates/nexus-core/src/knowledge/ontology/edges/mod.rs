//! Edge types (relationships) for the knowledge graph.
//!
//! Every edge is a `CodeRelation` tagged with its `RelationType`:
//!
//! - **Structural**: DEFINES, IMPORTS
//! - **Behavioral**: CALLS
//! - **Type System**: EXTENDS, IMPLEMENTS
//! - **Overlay**: MEMBER_OF, STEP_IN_PROCESS

use serde::{Deserialize, Serialize};

use super::NodeRef;

/// Kind of a relation between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    /// File A defines symbol B
    Defines,
    /// File A imports file B
    Imports,
    /// Symbol A calls symbol B
    Calls,
    /// Type A extends type B
    Extends,
    /// Type A implements interface B
    Implements,
    /// Symbol A belongs to community B
    MemberOf,
    /// Symbol A is a step of process B
    StepInProcess,
}

impl RelationType {
    pub const ALL: [RelationType; 7] = [
        Self::Defines,
        Self::Imports,
        Self::Calls,
        Self::Extends,
        Self::Implements,
        Self::MemberOf,
        Self::StepInProcess,
    ];

    /// Get the relationship name for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Defines => "DEFINES",
            Self::Imports => "IMPORTS",
            Self::Calls => "CALLS",
            Self::Extends => "EXTENDS",
            Self::Implements => "IMPLEMENTS",
            Self::MemberOf => "MEMBER_OF",
            Self::StepInProcess => "STEP_IN_PROCESS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == s)
    }

    /// Relations that link two symbols and carry weight for clustering.
    pub fn is_symbol_link(&self) -> bool {
        matches!(self, Self::Calls | Self::Extends | Self::Implements)
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed, directed relation between two nodes of one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeRelation {
    pub kind: RelationType,
    pub source: NodeRef,
    pub target: NodeRef,
    /// Position within the process, only set on STEP_IN_PROCESS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<u32>,
}

impl CodeRelation {
    pub fn new(kind: RelationType, source: NodeRef, target: NodeRef) -> Self {
        Self { kind, source, target, step: None }
    }

    pub fn step(symbol: usize, process: usize, step: u32) -> Self {
        Self {
            kind: RelationType::StepInProcess,
            source: NodeRef::Symbol(symbol),
            target: NodeRef::Process(process),
            step: Some(step),
        }
    }
}
