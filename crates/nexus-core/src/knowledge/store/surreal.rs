//! SurrealDB embedded store for the knowledge graph.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use surrealdb::engine::local::{Db, RocksDb};
use surrealdb::Surreal;
use tracing::{debug, info};

use super::{
    CommunityMember, EntityTable, GraphStore, ProcessStep, ScoredPath, StoreStats,
};
use crate::knowledge::error::KnowledgeError;
use crate::knowledge::graph::GraphSnapshot;
use crate::knowledge::ontology::{
    CommunityNode, ProcessNode, ProcessType, RelationType, SymbolKind,
};

/// Dimension of the stored embeddings (BGE-Small).
pub const EMBEDDING_DIMENSION: usize = 384;

const ANALYZER: &str = "code_analyzer";

/// Chunks fetched per requested file; one file usually owns several chunks.
const CHUNKS_PER_FILE: usize = 4;

/// Database connection for the knowledge graph.
pub struct SurrealStore {
    db: Surreal<Db>,
}

impl SurrealStore {
    /// Open or create a database at the given path.
    pub async fn open(path: &Path) -> Result<Self, KnowledgeError> {
        let db = Surreal::new::<RocksDb>(path).await?;
        db.use_ns("nexus").use_db("graph").await?;

        let store = Self { db };
        store.initialize_schema().await?;
        Ok(store)
    }

    /// Define tables and indexes. Safe to run on every open.
    async fn initialize_schema(&self) -> Result<(), KnowledgeError> {
        // ===========================================================================
        // NODE TABLES
        // ===========================================================================

        let mut schema = String::from(
            r#"
            DEFINE TABLE IF NOT EXISTS `file` SCHEMALESS;
            DEFINE INDEX IF NOT EXISTS file_uid ON `file` FIELDS uid UNIQUE;
            DEFINE INDEX IF NOT EXISTS file_path ON `file` FIELDS path;
            "#,
        );
        for kind in SymbolKind::ALL {
            let table = kind.as_str();
            schema.push_str(&format!(
                r#"
            DEFINE TABLE IF NOT EXISTS `{table}` SCHEMALESS;
            DEFINE INDEX IF NOT EXISTS {table}_uid ON `{table}` FIELDS uid UNIQUE;
            DEFINE INDEX IF NOT EXISTS {table}_name ON `{table}` FIELDS name;
            DEFINE INDEX IF NOT EXISTS {table}_file ON `{table}` FIELDS file_path;
            "#
            ));
        }
        self.db.query(schema).await?.check()?;

        self.db
            .query(
                r#"
                DEFINE TABLE IF NOT EXISTS community SCHEMALESS;
                DEFINE INDEX IF NOT EXISTS community_uid ON community FIELDS uid UNIQUE;
                DEFINE INDEX IF NOT EXISTS community_label ON community FIELDS label;

                DEFINE TABLE IF NOT EXISTS process SCHEMALESS;
                DEFINE INDEX IF NOT EXISTS process_uid ON process FIELDS uid UNIQUE;
                DEFINE INDEX IF NOT EXISTS process_label ON process FIELDS label;
                "#,
            )
            .await?
            .check()?;

        // ===========================================================================
        // RELATIONS - one regular table, endpoints stored by uid
        // ===========================================================================

        self.db
            .query(
                r#"
                DEFINE TABLE IF NOT EXISTS code_relation SCHEMALESS;
                DEFINE INDEX IF NOT EXISTS relation_kind ON code_relation FIELDS kind;
                DEFINE INDEX IF NOT EXISTS relation_source ON code_relation FIELDS source;
                DEFINE INDEX IF NOT EXISTS relation_target ON code_relation FIELDS target;
                "#,
            )
            .await?
            .check()?;

        // ===========================================================================
        // SEARCH - analyzer, keyword index registry, embedding chunks
        // ===========================================================================

        self.db
            .query(format!(
                r#"
                DEFINE ANALYZER IF NOT EXISTS {ANALYZER} TOKENIZERS blank,class,camel,punct FILTERS lowercase,ascii;

                DEFINE TABLE IF NOT EXISTS keyword_index SCHEMALESS;
                DEFINE INDEX IF NOT EXISTS keyword_index_name ON keyword_index FIELDS name UNIQUE;

                DEFINE TABLE IF NOT EXISTS chunk SCHEMALESS;
                DEFINE INDEX IF NOT EXISTS chunk_embedding ON chunk FIELDS embedding HNSW DIMENSION {EMBEDDING_DIMENSION} DIST COSINE;
                DEFINE INDEX IF NOT EXISTS chunk_file ON chunk FIELDS file_path;
                "#
            ))
            .await?
            .check()?;

        Ok(())
    }

    /// Replace all embedding chunks.
    pub async fn store_embeddings(&self, chunks: Vec<ChunkRecord>) -> Result<(), KnowledgeError> {
        let count = chunks.len();
        self.db
            .query("BEGIN TRANSACTION; DELETE chunk; INSERT INTO chunk $chunks; COMMIT TRANSACTION;")
            .bind(("chunks", chunks))
            .await?
            .check()?;
        debug!(count, "stored embedding chunks");
        Ok(())
    }

    /// Files nearest to `embedding`, as `(file_path, similarity)`.
    ///
    /// A file scores as its best chunk, so at most `limit` distinct files
    /// come back, best first.
    pub async fn search_by_embedding(
        &self,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPath>, KnowledgeError> {
        // K must be a literal in the KNN operator.
        let query = format!(
            r#"
            SELECT
                file_path,
                vector::similarity::cosine(embedding, $embedding) AS score
            FROM chunk
            WHERE embedding <|{},COSINE|> $embedding
            ORDER BY score DESC
            "#,
            limit.saturating_mul(CHUNKS_PER_FILE).max(1)
        );

        let rows: Vec<ScoreRow> = self
            .db
            .query(query)
            .bind(("embedding", embedding.to_vec()))
            .await?
            .take(0)?;

        Ok(best_per_file(rows, limit))
    }

    async fn count_table(&self, table: &str) -> Result<usize, KnowledgeError> {
        #[derive(Deserialize)]
        struct CountResult {
            count: i64,
        }

        let result: Option<CountResult> = self
            .db
            .query(format!("SELECT count() FROM `{}` GROUP ALL", table))
            .await?
            .take(0)?;
        Ok(result.map(|r| r.count as usize).unwrap_or(0))
    }

    /// Name and path of symbols by uid, across all symbol tables.
    async fn symbols_by_uid(
        &self,
        uids: Vec<String>,
    ) -> Result<HashMap<String, (SymbolRow, SymbolKind)>, KnowledgeError> {
        let mut statement = String::new();
        for kind in SymbolKind::ALL {
            statement.push_str(&format!(
                "SELECT uid, name, file_path, ordinal FROM `{}` WHERE uid IN $uids;",
                kind.as_str()
            ));
        }

        let mut response = self.db.query(statement).bind(("uids", uids)).await?;
        let mut symbols = HashMap::new();
        for (i, kind) in SymbolKind::ALL.into_iter().enumerate() {
            let rows: Vec<SymbolRow> = response.take(i)?;
            for row in rows {
                symbols.insert(row.uid.clone(), (row, kind));
            }
        }
        Ok(symbols)
    }

    /// Relations of one kind pointing at `target`.
    async fn relations_to(
        &self,
        kind: RelationType,
        target: &str,
    ) -> Result<Vec<RelationRecord>, KnowledgeError> {
        let rows: Vec<RelationRecord> = self
            .db
            .query("SELECT kind, source, target, step FROM code_relation WHERE kind = $kind AND target = $target")
            .bind(("kind", kind.as_str()))
            .bind(("target", target.to_string()))
            .await?
            .take(0)?;
        Ok(rows)
    }
}

#[async_trait]
impl GraphStore for SurrealStore {
    async fn load(&self, snapshot: &GraphSnapshot) -> Result<(), KnowledgeError> {
        let files: Vec<FileRecord> = snapshot.files.iter().map(FileRecord::from).collect();

        let mut symbols: HashMap<SymbolKind, Vec<SymbolRecord>> = HashMap::new();
        for (ordinal, symbol) in snapshot.symbols.iter().enumerate() {
            symbols.entry(symbol.kind).or_default().push(SymbolRecord {
                uid: symbol.id.clone(),
                ordinal,
                name: symbol.name.clone(),
                file_path: symbol.file_path.clone(),
                start_line: symbol.range.start_line,
                end_line: symbol.range.end_line,
                enclosing: symbol.enclosing.clone(),
                snippet: symbol.snippet.clone(),
            });
        }

        let communities: Vec<CommunityRecord> = snapshot
            .communities
            .iter()
            .enumerate()
            .map(|(n, c)| CommunityRecord {
                uid: c.id.clone(),
                n,
                label: c.label.clone(),
                symbol_count: c.symbol_count,
                cohesion: c.cohesion,
            })
            .collect();

        let processes: Vec<ProcessRecord> = snapshot
            .processes
            .iter()
            .enumerate()
            .map(|(n, p)| ProcessRecord {
                uid: p.id.clone(),
                n,
                label: p.label.clone(),
                process_type: p.process_type.as_str().to_string(),
                step_count: p.step_count,
                entry_id: p.entry_id.clone(),
                terminal_id: p.terminal_id.clone(),
                community_count: p.community_count,
            })
            .collect();

        let relations: Vec<RelationRecord> = snapshot
            .relations
            .iter()
            .filter_map(|r| {
                Some(RelationRecord {
                    kind: r.kind.as_str().to_string(),
                    source: snapshot.node_id(r.source)?.to_string(),
                    target: snapshot.node_id(r.target)?.to_string(),
                    step: r.step,
                })
            })
            .collect();

        // One transaction: readers see the old graph or the new one.
        let mut statement = String::from("BEGIN TRANSACTION;\nDELETE `file`;\n");
        for kind in SymbolKind::ALL {
            statement.push_str(&format!("DELETE `{}`;\n", kind.as_str()));
        }
        statement.push_str("DELETE community;\nDELETE process;\nDELETE code_relation;\nDELETE chunk;\n");
        statement.push_str("INSERT INTO `file` $files;\n");
        for kind in SymbolKind::ALL {
            statement.push_str(&format!("INSERT INTO `{0}` ${0}_rows;\n", kind.as_str()));
        }
        statement.push_str(
            "INSERT INTO community $communities;\nINSERT INTO process $processes;\nINSERT INTO code_relation $relations;\nCOMMIT TRANSACTION;",
        );

        let mut query = self
            .db
            .query(statement)
            .bind(("files", files))
            .bind(("communities", communities))
            .bind(("processes", processes))
            .bind(("relations", relations));
        for kind in SymbolKind::ALL {
            let rows = symbols.remove(&kind).unwrap_or_default();
            query = query.bind((format!("{}_rows", kind.as_str()), rows));
        }
        query.await?.check()?;

        info!(
            nodes = snapshot.node_count(),
            edges = snapshot.edge_count(),
            "graph stored"
        );
        Ok(())
    }

    async fn query(&self, statement: &str) -> Result<Vec<serde_json::Value>, KnowledgeError> {
        let rows: Vec<serde_json::Value> = self.db.query(statement.to_string()).await?.take(0)?;
        Ok(rows)
    }

    async fn create_keyword_index(
        &self,
        table: EntityTable,
        index: &str,
        fields: &[&str],
    ) -> Result<(), KnowledgeError> {
        let mut statement = String::new();
        for field in fields {
            statement.push_str(&format!(
                "DEFINE INDEX IF NOT EXISTS {index}_{field} ON `{table}` FIELDS {field} SEARCH ANALYZER {ANALYZER} BM25;\n",
                table = table.table(),
            ));
        }
        statement.push_str(
            "DELETE keyword_index WHERE name = $name;\nCREATE keyword_index SET name = $name, entity = $entity, fields = $fields;",
        );

        self.db
            .query(statement)
            .bind(("name", index.to_string()))
            .bind(("entity", table.table()))
            .bind(("fields", fields.iter().map(|f| f.to_string()).collect::<Vec<_>>()))
            .await?
            .check()?;
        Ok(())
    }

    async fn query_keyword_index(
        &self,
        table: EntityTable,
        index: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScoredPath>, KnowledgeError> {
        #[derive(Deserialize)]
        struct IndexRow {
            entity: String,
            fields: Vec<String>,
        }

        let definition: Option<IndexRow> = self
            .db
            .query("SELECT entity, fields FROM keyword_index WHERE name = $name LIMIT 1")
            .bind(("name", index.to_string()))
            .await?
            .take(0)?;
        let definition = definition
            .filter(|d| d.entity == table.table() && !d.fields.is_empty())
            .ok_or_else(|| KnowledgeError::IndexQuery {
                index: index.to_string(),
                message: format!("no keyword index on {}", table),
            })?;

        let path_field = match table {
            EntityTable::File => "path",
            _ => "file_path",
        };
        let score = definition
            .fields
            .iter()
            .enumerate()
            .map(|(i, _)| format!("(search::score({}) ?? 0)", i))
            .collect::<Vec<_>>()
            .join(" + ");
        let condition = definition
            .fields
            .iter()
            .enumerate()
            .map(|(i, field)| format!("{} @{}@ $query", field, i))
            .collect::<Vec<_>>()
            .join(" OR ");
        let statement = format!(
            "SELECT {path_field} AS file_path, {score} AS score FROM `{table}` WHERE {condition} ORDER BY score DESC LIMIT {limit}",
            table = table.table(),
        );

        let rows: Vec<ScoreRow> = self
            .db
            .query(statement)
            .bind(("query", query.to_string()))
            .await
            .and_then(|mut r| r.take(0))
            .map_err(|e| KnowledgeError::IndexQuery {
                index: index.to_string(),
                message: e.to_string(),
            })?;

        Ok(rows.into_iter().map(|r| ScoredPath::new(r.file_path, r.score)).collect())
    }

    async fn find_community(&self, name: &str) -> Result<Option<CommunityNode>, KnowledgeError> {
        let rows: Vec<CommunityRecord> = self
            .db
            .query(
                "SELECT uid, n, label, symbol_count, cohesion FROM community \
                 WHERE uid = $name OR label = $name ORDER BY n ASC LIMIT 1;\
                 SELECT uid, n, label, symbol_count, cohesion FROM community \
                 WHERE string::lowercase(label) = string::lowercase($name) ORDER BY n ASC LIMIT 1;",
            )
            .bind(("name", name.to_string()))
            .await
            .and_then(|mut r| {
                let mut exact: Vec<CommunityRecord> = r.take(0)?;
                let folded: Vec<CommunityRecord> = r.take(1)?;
                exact.extend(folded);
                Ok(exact)
            })?;
        Ok(rows.into_iter().next().map(CommunityNode::from))
    }

    async fn community_members(
        &self,
        community_id: &str,
    ) -> Result<Vec<CommunityMember>, KnowledgeError> {
        let relations = self.relations_to(RelationType::MemberOf, community_id).await?;
        let symbols = self
            .symbols_by_uid(relations.into_iter().map(|r| r.source).collect())
            .await?;

        let mut members: Vec<(usize, CommunityMember)> = symbols
            .into_values()
            .map(|(row, kind)| {
                (
                    row.ordinal,
                    CommunityMember {
                        name: row.name,
                        kind,
                        file_path: row.file_path,
                    },
                )
            })
            .collect();
        members.sort_by_key(|(ordinal, _)| *ordinal);
        Ok(members.into_iter().map(|(_, m)| m).collect())
    }

    async fn find_process(&self, name: &str) -> Result<Option<ProcessNode>, KnowledgeError> {
        const COLUMNS: &str =
            "uid, n, label, process_type, step_count, entry_id, terminal_id, community_count";
        let rows: Vec<ProcessRecord> = self
            .db
            .query(format!(
                "SELECT {COLUMNS} FROM process WHERE uid = $name OR label = $name ORDER BY n ASC LIMIT 1;\
                 SELECT {COLUMNS} FROM process WHERE string::lowercase(label) = string::lowercase($name) ORDER BY n ASC LIMIT 1;"
            ))
            .bind(("name", name.to_string()))
            .await
            .and_then(|mut r| {
                let mut exact: Vec<ProcessRecord> = r.take(0)?;
                let folded: Vec<ProcessRecord> = r.take(1)?;
                exact.extend(folded);
                Ok(exact)
            })?;
        Ok(rows.into_iter().next().map(ProcessNode::from))
    }

    async fn process_steps(&self, process_id: &str) -> Result<Vec<ProcessStep>, KnowledgeError> {
        let relations = self.relations_to(RelationType::StepInProcess, process_id).await?;
        let symbols = self
            .symbols_by_uid(relations.iter().map(|r| r.source.clone()).collect())
            .await?;

        let mut steps: Vec<ProcessStep> = relations
            .into_iter()
            .filter_map(|r| {
                let (row, _) = symbols.get(&r.source)?;
                Some(ProcessStep {
                    step: r.step?,
                    name: row.name.clone(),
                    file_path: row.file_path.clone(),
                })
            })
            .collect();
        steps.sort_by_key(|s| s.step);
        Ok(steps)
    }

    async fn list_communities(&self, limit: usize) -> Result<Vec<CommunityNode>, KnowledgeError> {
        let query = format!(
            "SELECT uid, n, label, symbol_count, cohesion FROM community ORDER BY symbol_count DESC, n ASC LIMIT {}",
            limit
        );
        let rows: Vec<CommunityRecord> = self.db.query(query).await?.take(0)?;
        Ok(rows.into_iter().map(CommunityNode::from).collect())
    }

    async fn list_processes(&self, limit: usize) -> Result<Vec<ProcessNode>, KnowledgeError> {
        let query = format!(
            "SELECT uid, n, label, process_type, step_count, entry_id, terminal_id, community_count \
             FROM process ORDER BY step_count DESC, n ASC LIMIT {}",
            limit
        );
        let rows: Vec<ProcessRecord> = self.db.query(query).await?.take(0)?;
        Ok(rows.into_iter().map(ProcessNode::from).collect())
    }

    async fn stats(&self) -> Result<StoreStats, KnowledgeError> {
        let mut symbols = 0;
        for kind in SymbolKind::ALL {
            symbols += self.count_table(kind.as_str()).await?;
        }

        Ok(StoreStats {
            files: self.count_table("file").await?,
            symbols,
            communities: self.count_table("community").await?,
            processes: self.count_table("process").await?,
            relations: self.count_table("code_relation").await?,
        })
    }
}

// =============================================================================
// RECORDS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileRecord {
    uid: String,
    path: String,
    name: String,
    language: String,
    content: String,
    size: u64,
    hash: String,
}

impl From<&crate::knowledge::ontology::FileNode> for FileRecord {
    fn from(file: &crate::knowledge::ontology::FileNode) -> Self {
        Self {
            uid: file.id.clone(),
            path: file.path.clone(),
            name: file.name.clone(),
            language: file.language.as_str().to_string(),
            content: file.content.clone(),
            size: file.size,
            hash: file.hash.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SymbolRecord {
    uid: String,
    /// Position in the snapshot, used to return symbols in creation order.
    ordinal: usize,
    name: String,
    file_path: String,
    start_line: u32,
    end_line: u32,
    enclosing: Option<String>,
    snippet: String,
}

#[derive(Debug, Clone, Deserialize)]
struct SymbolRow {
    uid: String,
    name: String,
    file_path: String,
    ordinal: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CommunityRecord {
    uid: String,
    n: usize,
    label: String,
    symbol_count: usize,
    cohesion: f64,
}

impl From<CommunityRecord> for CommunityNode {
    fn from(r: CommunityRecord) -> Self {
        Self {
            id: r.uid,
            label: r.label,
            symbol_count: r.symbol_count,
            cohesion: r.cohesion,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProcessRecord {
    uid: String,
    n: usize,
    label: String,
    process_type: String,
    step_count: usize,
    entry_id: String,
    terminal_id: String,
    community_count: usize,
}

impl From<ProcessRecord> for ProcessNode {
    fn from(r: ProcessRecord) -> Self {
        Self {
            id: r.uid,
            label: r.label,
            process_type: ProcessType::parse(&r.process_type),
            step_count: r.step_count,
            entry_id: r.entry_id,
            terminal_id: r.terminal_id,
            community_count: r.community_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RelationRecord {
    kind: String,
    source: String,
    target: String,
    step: Option<u32>,
}

/// A symbol snippet with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub entity_id: String,
    pub file_path: String,
    pub content: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Deserialize)]
struct ScoreRow {
    file_path: String,
    score: f64,
}

/// Highest score per file, sorted by score then path, truncated to `limit`.
fn best_per_file(rows: Vec<ScoreRow>, limit: usize) -> Vec<ScoredPath> {
    let mut best: HashMap<String, f64> = HashMap::new();
    for row in rows {
        let score = best.entry(row.file_path).or_insert(row.score);
        if row.score > *score {
            *score = row.score;
        }
    }

    let mut files: Vec<ScoredPath> = best
        .into_iter()
        .map(|(path, score)| ScoredPath::new(path, score))
        .collect();
    files.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.file_path.cmp(&b.file_path))
    });
    files.truncate(limit);
    files
}
