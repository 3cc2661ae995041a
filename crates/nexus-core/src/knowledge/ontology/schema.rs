//! Static description of the graph schema.
//!
//! Agents writing ad-hoc queries read this to learn table names, id formats
//! and which relations connect which node types.

use serde::Serialize;

use super::{NodeCategory, RelationType, SymbolKind};

/// A field stored on a node table.
#[derive(Debug, Clone, Serialize)]
pub struct FieldSchema {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub field_type: &'static str,
}

/// One node type and the table it is stored in.
#[derive(Debug, Clone, Serialize)]
pub struct NodeSchema {
    pub name: &'static str,
    pub table: &'static str,
    pub category: NodeCategory,
    pub id_format: &'static str,
    pub fields: Vec<FieldSchema>,
}

/// One relation type with its endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct RelationSchema {
    pub name: &'static str,
    pub from: Vec<&'static str>,
    pub to: Vec<&'static str>,
    pub description: &'static str,
}

/// The complete schema.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaDescription {
    pub nodes: Vec<NodeSchema>,
    pub relation_table: &'static str,
    pub relations: Vec<RelationSchema>,
    pub keyword_indexes: Vec<&'static str>,
}

fn field(name: &'static str, field_type: &'static str) -> FieldSchema {
    FieldSchema { name, field_type }
}

fn symbol_fields() -> Vec<FieldSchema> {
    vec![
        field("uid", "string"),
        field("name", "string"),
        field("file_path", "string"),
        field("start_line", "int"),
        field("end_line", "int"),
        field("enclosing", "option<string>"),
        field("snippet", "string"),
    ]
}

/// Describe every node and relation type of the graph.
pub fn describe() -> SchemaDescription {
    let mut nodes = vec![NodeSchema {
        name: "File",
        table: "file",
        category: NodeCategory::Structure,
        id_format: "file:<path>",
        fields: vec![
            field("uid", "string"),
            field("path", "string"),
            field("name", "string"),
            field("language", "string"),
            field("content", "string"),
            field("size", "int"),
            field("hash", "string"),
        ],
    }];

    for kind in SymbolKind::ALL {
        nodes.push(NodeSchema {
            name: kind.label(),
            table: kind.as_str(),
            category: NodeCategory::Code,
            id_format: "<kind>:<path>:<name>:<startByte>",
            fields: symbol_fields(),
        });
    }

    nodes.push(NodeSchema {
        name: "Community",
        table: "community",
        category: NodeCategory::Overlay,
        id_format: "community:<n>",
        fields: vec![
            field("uid", "string"),
            field("label", "string"),
            field("symbol_count", "int"),
            field("cohesion", "float"),
        ],
    });
    nodes.push(NodeSchema {
        name: "Process",
        table: "process",
        category: NodeCategory::Overlay,
        id_format: "process:<n>",
        fields: vec![
            field("uid", "string"),
            field("label", "string"),
            field("process_type", "string"),
            field("step_count", "int"),
            field("entry_id", "string"),
            field("terminal_id", "string"),
            field("community_count", "int"),
        ],
    });

    let symbols = vec!["Function", "Class", "Interface", "Method"];
    let relations = RelationType::ALL
        .into_iter()
        .map(|kind| {
            let (from, to, description) = match kind {
                RelationType::Defines => (vec!["File"], symbols.clone(), "file declares the symbol"),
                RelationType::Imports => (vec!["File"], vec!["File"], "resolved import between files"),
                RelationType::Calls => (
                    vec!["File", "Function", "Method", "Class", "Interface"],
                    vec!["Function", "Method", "Class"],
                    "name-resolved call; a File source is a top-level call, a Class target a constructor call",
                ),
                RelationType::Extends => (vec!["Class", "Interface"], vec!["Class", "Interface"], "inheritance"),
                RelationType::Implements => (vec!["Class"], vec!["Interface", "Class"], "interface implementation"),
                RelationType::MemberOf => (symbols.clone(), vec!["Community"], "cluster membership"),
                RelationType::StepInProcess => (
                    symbols.clone(),
                    vec!["Process"],
                    "ordered step of an execution flow; carries `step`",
                ),
            };
            RelationSchema { name: kind.as_str(), from, to, description }
        })
        .collect();

    SchemaDescription {
        nodes,
        relation_table: "code_relation",
        relations,
        keyword_indexes: vec!["file_fts", "function_fts", "class_fts", "method_fts"],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_covers_all_types() {
        let schema = describe();
        assert_eq!(schema.nodes.len(), 7);
        assert_eq!(schema.relations.len(), RelationType::ALL.len());
        assert!(schema.relations.iter().any(|r| r.name == "STEP_IN_PROCESS"));
    }

    #[test]
    fn test_describe_renders_as_yaml() {
        let yaml = serde_yaml::to_string(&describe()).unwrap();
        assert!(yaml.contains("community:<n>"));
        assert!(yaml.contains("MEMBER_OF"));
    }
}
