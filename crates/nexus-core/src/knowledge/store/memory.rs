//! In-process graph store.
//!
//! Keeps the latest snapshot behind a lock and answers keyword queries with
//! a small BM25 index per keyword index definition. Loading builds the new
//! state first and swaps it in under the write lock.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    id_number, CommunityMember, EntityTable, GraphStore, ProcessStep, ScoredPath, StoreStats,
};
use crate::knowledge::error::KnowledgeError;
use crate::knowledge::graph::GraphSnapshot;
use crate::knowledge::ontology::{CommunityNode, NodeRef, ProcessNode, RelationType};
use crate::knowledge::tokenize::split_words;

const BM25_K1: f64 = 1.2;
const BM25_B: f64 = 0.75;

#[derive(Default)]
struct MemoryState {
    snapshot: Arc<GraphSnapshot>,
    indexes: HashMap<String, Arc<KeywordIndex>>,
}

/// Graph store living in process memory.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn snapshot(&self) -> Arc<GraphSnapshot> {
        Arc::clone(&self.state.read().await.snapshot)
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn load(&self, snapshot: &GraphSnapshot) -> Result<(), KnowledgeError> {
        let snapshot = Arc::new(snapshot.clone());
        let definitions: Vec<(String, EntityTable, Vec<String>)> = {
            let state = self.state.read().await;
            state
                .indexes
                .iter()
                .map(|(name, index)| (name.clone(), index.table, index.fields.clone()))
                .collect()
        };

        let mut indexes = HashMap::new();
        for (name, table, fields) in definitions {
            let index = KeywordIndex::build(&snapshot, table, fields);
            indexes.insert(name, Arc::new(index));
        }

        let mut state = self.state.write().await;
        *state = MemoryState { snapshot, indexes };
        Ok(())
    }

    async fn query(&self, _statement: &str) -> Result<Vec<serde_json::Value>, KnowledgeError> {
        Err(KnowledgeError::Unsupported(
            "raw queries need a database-backed store".to_string(),
        ))
    }

    async fn create_keyword_index(
        &self,
        table: EntityTable,
        index: &str,
        fields: &[&str],
    ) -> Result<(), KnowledgeError> {
        for field in fields {
            if !searchable_fields(table).contains(field) {
                return Err(KnowledgeError::IndexQuery {
                    index: index.to_string(),
                    message: format!("{} has no text field '{}'", table, field),
                });
            }
        }

        let snapshot = self.snapshot().await;
        let fields = fields.iter().map(|f| f.to_string()).collect();
        let built = Arc::new(KeywordIndex::build(&snapshot, table, fields));

        let mut state = self.state.write().await;
        // Only keep the index if no load replaced the snapshot meanwhile.
        if Arc::ptr_eq(&state.snapshot, &snapshot) {
            state.indexes.insert(index.to_string(), built);
        } else {
            let rebuilt = KeywordIndex::build(&state.snapshot, table, built.fields.clone());
            state.indexes.insert(index.to_string(), Arc::new(rebuilt));
        }
        Ok(())
    }

    async fn query_keyword_index(
        &self,
        table: EntityTable,
        index: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScoredPath>, KnowledgeError> {
        let keyword_index = {
            let state = self.state.read().await;
            state.indexes.get(index).cloned()
        };
        let keyword_index = keyword_index.ok_or_else(|| KnowledgeError::IndexQuery {
            index: index.to_string(),
            message: "index does not exist".to_string(),
        })?;
        if keyword_index.table != table {
            return Err(KnowledgeError::IndexQuery {
                index: index.to_string(),
                message: format!("index belongs to table {}", keyword_index.table),
            });
        }

        Ok(keyword_index.search(query, limit))
    }

    async fn find_community(&self, name: &str) -> Result<Option<CommunityNode>, KnowledgeError> {
        let snapshot = self.snapshot().await;
        Ok(find_by_name(&snapshot.communities, name, |c| (&c.id, &c.label)).cloned())
    }

    async fn community_members(
        &self,
        community_id: &str,
    ) -> Result<Vec<CommunityMember>, KnowledgeError> {
        let snapshot = self.snapshot().await;
        let Some(index) = snapshot.communities.iter().position(|c| c.id == community_id) else {
            return Ok(Vec::new());
        };

        let mut symbols: Vec<usize> = snapshot
            .relations_of(RelationType::MemberOf)
            .filter(|r| r.target == NodeRef::Community(index))
            .filter_map(|r| r.source.symbol())
            .collect();
        symbols.sort_unstable();

        Ok(symbols
            .into_iter()
            .map(|s| {
                let symbol = &snapshot.symbols[s];
                CommunityMember {
                    name: symbol.name.clone(),
                    kind: symbol.kind,
                    file_path: symbol.file_path.clone(),
                }
            })
            .collect())
    }

    async fn find_process(&self, name: &str) -> Result<Option<ProcessNode>, KnowledgeError> {
        let snapshot = self.snapshot().await;
        Ok(find_by_name(&snapshot.processes, name, |p| (&p.id, &p.label)).cloned())
    }

    async fn process_steps(&self, process_id: &str) -> Result<Vec<ProcessStep>, KnowledgeError> {
        let snapshot = self.snapshot().await;
        let Some(index) = snapshot.processes.iter().position(|p| p.id == process_id) else {
            return Ok(Vec::new());
        };

        let mut steps: Vec<ProcessStep> = snapshot
            .relations_of(RelationType::StepInProcess)
            .filter(|r| r.target == NodeRef::Process(index))
            .filter_map(|r| {
                let symbol = &snapshot.symbols[r.source.symbol()?];
                Some(ProcessStep {
                    step: r.step?,
                    name: symbol.name.clone(),
                    file_path: symbol.file_path.clone(),
                })
            })
            .collect();
        steps.sort_by_key(|s| s.step);
        Ok(steps)
    }

    async fn list_communities(&self, limit: usize) -> Result<Vec<CommunityNode>, KnowledgeError> {
        let snapshot = self.snapshot().await;
        let mut communities = snapshot.communities.clone();
        communities.sort_by(|a, b| {
            b.symbol_count
                .cmp(&a.symbol_count)
                .then_with(|| id_number(&a.id).cmp(&id_number(&b.id)))
        });
        communities.truncate(limit);
        Ok(communities)
    }

    async fn list_processes(&self, limit: usize) -> Result<Vec<ProcessNode>, KnowledgeError> {
        let snapshot = self.snapshot().await;
        let mut processes = snapshot.processes.clone();
        processes.sort_by(|a, b| {
            b.step_count
                .cmp(&a.step_count)
                .then_with(|| id_number(&a.id).cmp(&id_number(&b.id)))
        });
        processes.truncate(limit);
        Ok(processes)
    }

    async fn stats(&self) -> Result<StoreStats, KnowledgeError> {
        let snapshot = self.snapshot().await;
        Ok(StoreStats {
            files: snapshot.files.len(),
            symbols: snapshot.symbols.len(),
            communities: snapshot.communities.len(),
            processes: snapshot.processes.len(),
            relations: snapshot.relations.len(),
        })
    }
}

/// Exact id or label match first, then a case-insensitive label match.
fn find_by_name<'a, T>(
    items: &'a [T],
    name: &str,
    keys: impl Fn(&T) -> (&String, &String),
) -> Option<&'a T> {
    items
        .iter()
        .find(|item| {
            let (id, label) = keys(item);
            id == name || label == name
        })
        .or_else(|| items.iter().find(|item| keys(item).1.eq_ignore_ascii_case(name)))
}

fn searchable_fields(table: EntityTable) -> &'static [&'static str] {
    match table {
        EntityTable::File => &["path", "name", "content"],
        _ => &["name", "snippet", "file_path"],
    }
}

/// One indexed row.
struct IndexedDoc {
    file_path: String,
    terms: HashMap<String, usize>,
    len: usize,
}

/// BM25 index over selected text fields of one table.
struct KeywordIndex {
    table: EntityTable,
    fields: Vec<String>,
    docs: Vec<IndexedDoc>,
    doc_freq: HashMap<String, usize>,
    avg_len: f64,
}

impl KeywordIndex {
    fn build(snapshot: &GraphSnapshot, table: EntityTable, fields: Vec<String>) -> Self {
        let mut rows: Vec<(String, Vec<&str>)> = Vec::new();
        match table.symbol_kind() {
            None => {
                for file in &snapshot.files {
                    let texts = fields
                        .iter()
                        .filter_map(|f| match f.as_str() {
                            "path" => Some(file.path.as_str()),
                            "name" => Some(file.name.as_str()),
                            "content" => Some(file.content.as_str()),
                            _ => None,
                        })
                        .collect();
                    rows.push((file.path.clone(), texts));
                }
            }
            Some(kind) => {
                for symbol in snapshot.symbols.iter().filter(|s| s.kind == kind) {
                    let texts = fields
                        .iter()
                        .filter_map(|f| match f.as_str() {
                            "name" => Some(symbol.name.as_str()),
                            "snippet" => Some(symbol.snippet.as_str()),
                            "file_path" => Some(symbol.file_path.as_str()),
                            _ => None,
                        })
                        .collect();
                    rows.push((symbol.file_path.clone(), texts));
                }
            }
        }

        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let docs: Vec<IndexedDoc> = rows
            .into_iter()
            .map(|(file_path, texts)| {
                let mut terms: HashMap<String, usize> = HashMap::new();
                let mut len = 0;
                for text in texts {
                    for word in split_words(text) {
                        *terms.entry(word).or_default() += 1;
                        len += 1;
                    }
                }
                for term in terms.keys() {
                    *doc_freq.entry(term.clone()).or_default() += 1;
                }
                IndexedDoc { file_path, terms, len }
            })
            .collect();

        let total: usize = docs.iter().map(|d| d.len).sum();
        let avg_len = if docs.is_empty() { 0.0 } else { total as f64 / docs.len() as f64 };

        Self { table, fields, docs, doc_freq, avg_len }
    }

    fn search(&self, query: &str, limit: usize) -> Vec<ScoredPath> {
        let terms: HashSet<String> = split_words(query).into_iter().collect();
        let n = self.docs.len() as f64;

        let mut hits: Vec<ScoredPath> = self
            .docs
            .iter()
            .filter_map(|doc| {
                let mut score = 0.0;
                for term in &terms {
                    let Some(&tf) = doc.terms.get(term) else {
                        continue;
                    };
                    let df = self.doc_freq.get(term).copied().unwrap_or(0) as f64;
                    let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
                    let tf = tf as f64;
                    let norm = 1.0 - BM25_B + BM25_B * doc.len as f64 / self.avg_len.max(1.0);
                    score += idf * tf * (BM25_K1 + 1.0) / (tf + BM25_K1 * norm);
                }
                (score > 0.0).then(|| ScoredPath::new(doc.file_path.clone(), score))
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.file_path.cmp(&b.file_path))
        });
        hits.truncate(limit);
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CommunityConfig, ProcessConfig};
    use crate::knowledge::community::CommunityDetector;
    use crate::knowledge::graph::{GraphAssembler, SourceUnit};
    use crate::knowledge::ontology::{FileNode, Language};
    use crate::knowledge::parser::ExtractorRegistry;
    use crate::knowledge::process::ProcessExtractor;

    fn snapshot() -> GraphSnapshot {
        let registry = ExtractorRegistry::new();
        let sources = [
            (
                "app/billing.py",
                "def charge_invoice():\n    compute_tax()\n\ndef compute_tax():\n    return 1\n",
            ),
            ("app/mail.py", "def send_mail():\n    return 2\n"),
        ];
        let units = sources
            .iter()
            .map(|(path, content)| SourceUnit {
                file: FileNode::new(*path, Language::Python, *content),
                extraction: registry.extract(path, content).unwrap(),
            })
            .collect();
        let (mut snapshot, _) = GraphAssembler::assemble(units);

        let communities = CommunityDetector::new(&CommunityConfig::default()).detect(&snapshot);
        let mut processes = ProcessExtractor::new(&ProcessConfig::default()).extract(&snapshot);
        processes.count_communities(&communities);
        snapshot.relations.extend(communities.relations());
        snapshot.relations.extend(processes.steps.iter().copied());
        snapshot.communities = communities.communities;
        snapshot.processes = processes.processes;
        snapshot
    }

    async fn loaded() -> MemoryStore {
        let store = MemoryStore::new();
        store.load(&snapshot()).await.unwrap();
        for table in EntityTable::SEARCHABLE {
            store
                .create_keyword_index(table, table.keyword_index(), table.keyword_fields())
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_keyword_index_ranks_matching_files() {
        let store = loaded().await;
        let hits = store
            .query_keyword_index(EntityTable::Function, "function_fts", "tax", 10)
            .await
            .unwrap();
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|h| h.file_path == "app/billing.py"));

        let hits = store
            .query_keyword_index(EntityTable::File, "file_fts", "mail", 10)
            .await
            .unwrap();
        assert_eq!(hits[0].file_path, "app/mail.py");
    }

    #[tokio::test]
    async fn test_missing_index_is_an_error() {
        let store = MemoryStore::new();
        let result = store
            .query_keyword_index(EntityTable::Class, "class_fts", "anything", 5)
            .await;
        assert!(matches!(result, Err(KnowledgeError::IndexQuery { .. })));
    }

    #[tokio::test]
    async fn test_unknown_field_is_rejected() {
        let store = MemoryStore::new();
        let result = store
            .create_keyword_index(EntityTable::Method, "method_fts", &["body"])
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_reload_replaces_graph_and_keeps_indexes() {
        let store = loaded().await;
        store.load(&GraphSnapshot::default()).await.unwrap();

        assert_eq!(store.stats().await.unwrap(), StoreStats::default());
        let hits = store
            .query_keyword_index(EntityTable::File, "file_fts", "mail", 10)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_process_steps_are_ordered() {
        let store = loaded().await;
        let process = store.find_process("charge_invoice → compute_tax").await.unwrap().unwrap();
        let steps = store.process_steps(&process.id).await.unwrap();
        let order: Vec<(u32, &str)> = steps.iter().map(|s| (s.step, s.name.as_str())).collect();
        assert_eq!(order, vec![(1, "charge_invoice"), (2, "compute_tax")]);
    }

    #[tokio::test]
    async fn test_community_lookup_by_id_and_members() {
        let store = loaded().await;
        let community = store.find_community("community:0").await.unwrap().unwrap();
        let members = store.community_members(&community.id).await.unwrap();
        let names: Vec<&str> = members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["charge_invoice", "compute_tax"]);

        let largest = store.list_communities(1).await.unwrap();
        assert_eq!(largest[0].symbol_count, 2);
        assert!(store.query("SELECT * FROM file").await.is_err());
    }
}
