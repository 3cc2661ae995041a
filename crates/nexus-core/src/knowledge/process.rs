//! Execution flow extraction.
//!
//! A process is the ordered list of symbols reached by a depth-first walk
//! along CALLS from an entry point. Entry points are symbols nobody else
//! calls that call something themselves, plus the members of closed
//! recursive groups (which would otherwise never be reached).

use std::collections::HashSet;

use once_cell::sync::Lazy;
use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;
use regex::Regex;
use tracing::debug;

use super::community::CommunityOverlay;
use crate::config::ProcessConfig;
use crate::knowledge::graph::GraphSnapshot;
use crate::knowledge::ontology::{CodeRelation, NodeRef, ProcessNode, ProcessType};

static TEST_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(test|Test|should|it_)|(_test|Test|Spec)$").unwrap());
static TEST_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(^|/)(tests?|__tests__|spec)/|\.(test|spec)\.[a-z]+$|_test\.(go|py|rs)$|(^|/)test_[^/]+\.py$")
        .unwrap()
});
static LISTENER_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^on[A-Z_]|(?i)(listener|subscriber|observer|event)").unwrap());
static HTTP_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(handler|controller|endpoint|route)s?$").unwrap());
static HTTP_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(^|/)(routes?|controllers?|handlers?|api|endpoints?)/").unwrap());
static CLI_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(main|cmd|cli|command)|(command|cmd)$").unwrap());
static CLI_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(^|/)(cli|cmd|commands|bin)/|(^|/)(main|cli)\.[a-z]+$").unwrap());

/// Classify an entry point by its name and file path.
pub fn classify(name: &str, path: &str) -> ProcessType {
    if TEST_NAME.is_match(name) || TEST_PATH.is_match(path) {
        ProcessType::Test
    } else if LISTENER_NAME.is_match(name) {
        ProcessType::EventListener
    } else if HTTP_NAME.is_match(name) || HTTP_PATH.is_match(path) {
        ProcessType::HttpHandler
    } else if CLI_NAME.is_match(name) || CLI_PATH.is_match(path) {
        ProcessType::CliCommand
    } else {
        ProcessType::Unknown
    }
}

/// Processes of one run with their STEP_IN_PROCESS relations.
#[derive(Debug, Clone, Default)]
pub struct ProcessOverlay {
    pub processes: Vec<ProcessNode>,
    /// Steps in process order, numbered from 1 within each process.
    pub steps: Vec<CodeRelation>,
}

impl ProcessOverlay {
    /// Count the distinct communities each process passes through.
    pub fn count_communities(&mut self, communities: &CommunityOverlay) {
        let mut seen: Vec<HashSet<usize>> = vec![HashSet::new(); self.processes.len()];
        for step in &self.steps {
            if let (Some(symbol), NodeRef::Process(p)) =
                (step.source.symbol(), step.target)
            {
                if let Some(c) = communities.community_of(symbol) {
                    seen[p].insert(c);
                }
            }
        }
        for (process, communities) in self.processes.iter_mut().zip(seen) {
            process.community_count = communities.len();
        }
    }
}

/// Walks the call graph from entry points.
pub struct ProcessExtractor<'a> {
    config: &'a ProcessConfig,
}

impl<'a> ProcessExtractor<'a> {
    pub fn new(config: &'a ProcessConfig) -> Self {
        Self { config }
    }

    pub fn extract(&self, snapshot: &GraphSnapshot) -> ProcessOverlay {
        let n = snapshot.symbols.len();
        let mut callees: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut callers: Vec<Vec<usize>> = vec![Vec::new(); n];
        // Incoming CALLS count only from symbols. A call made at file top
        // level, like a `__main__` guard invoking `main()`, leaves its callee
        // an entry point; self calls are ignored too.
        for (caller, callee) in snapshot.symbol_calls() {
            if caller != callee && !callees[caller].contains(&callee) {
                callees[caller].push(callee);
                callers[callee].push(caller);
            }
        }

        let entries = entry_points(&callees, &callers);
        let mut overlay = ProcessOverlay::default();

        for entry in entries {
            if overlay.processes.len() >= self.config.max_processes {
                break;
            }

            let steps = self.walk(entry, &callees);
            if steps.len() < self.config.min_steps.max(1) {
                continue;
            }

            let index = overlay.processes.len();
            let entry_symbol = &snapshot.symbols[entry];
            let terminal_symbol = &snapshot.symbols[steps[steps.len() - 1]];
            let label = if steps.len() == 1 {
                entry_symbol.name.clone()
            } else {
                format!("{} → {}", entry_symbol.name, terminal_symbol.name)
            };

            overlay.processes.push(ProcessNode {
                id: ProcessNode::id_for(index),
                label,
                process_type: classify(&entry_symbol.name, &entry_symbol.file_path),
                step_count: steps.len(),
                entry_id: entry_symbol.id.clone(),
                terminal_id: terminal_symbol.id.clone(),
                community_count: 0,
            });
            overlay.steps.extend(
                steps
                    .iter()
                    .enumerate()
                    .map(|(i, &symbol)| CodeRelation::step(symbol, index, i as u32 + 1)),
            );
        }

        debug!(
            processes = overlay.processes.len(),
            steps = overlay.steps.len(),
            "process extraction finished"
        );

        overlay
    }

    /// Depth-first visit order from `entry`, bounded by depth and step count.
    fn walk(&self, entry: usize, callees: &[Vec<usize>]) -> Vec<usize> {
        let mut visited: HashSet<usize> = HashSet::new();
        let mut steps = Vec::new();
        let mut stack = vec![(entry, 0usize)];

        while let Some((symbol, depth)) = stack.pop() {
            if steps.len() >= self.config.max_steps {
                break;
            }
            if !visited.insert(symbol) {
                continue;
            }
            steps.push(symbol);

            if depth < self.config.max_depth {
                // Reversed so the first callee is visited first.
                for &callee in callees[symbol].iter().rev() {
                    if !visited.contains(&callee) {
                        stack.push((callee, depth + 1));
                    }
                }
            }
        }

        steps
    }
}

/// Entry points in symbol order.
fn entry_points(callees: &[Vec<usize>], callers: &[Vec<usize>]) -> Vec<usize> {
    let mut entries: Vec<usize> = (0..callees.len())
        .filter(|&s| callers[s].is_empty() && !callees[s].is_empty())
        .collect();

    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let nodes: Vec<_> = (0..callees.len()).map(|s| graph.add_node(s)).collect();
    for (caller, targets) in callees.iter().enumerate() {
        for &callee in targets {
            graph.add_edge(nodes[caller], nodes[callee], ());
        }
    }

    for component in tarjan_scc(&graph) {
        if component.len() < 2 {
            continue;
        }
        let members: HashSet<usize> = component.iter().map(|&ix| graph[ix]).collect();
        let closed = members
            .iter()
            .all(|&m| callers[m].iter().all(|caller| members.contains(caller)));
        if closed {
            entries.extend(members);
        }
    }

    entries.sort_unstable();
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::ontology::{
        FileNode, Language, RelationType, SourceRange, SymbolKind, SymbolNode,
    };

    fn snapshot(path: &str, names: &[&str], calls: &[(usize, usize)]) -> GraphSnapshot {
        let mut snapshot = GraphSnapshot::default();
        snapshot.files.push(FileNode::new(path, Language::Python, ""));
        for (offset, name) in names.iter().enumerate() {
            snapshot.symbols.push(SymbolNode {
                id: SymbolNode::id_for(SymbolKind::Function, path, name, offset),
                name: name.to_string(),
                kind: SymbolKind::Function,
                file_path: path.to_string(),
                range: SourceRange::default(),
                enclosing: None,
                snippet: String::new(),
            });
            snapshot.symbol_files.push(0);
        }
        for &(a, b) in calls {
            snapshot.relations.push(CodeRelation::new(
                RelationType::Calls,
                NodeRef::Symbol(a),
                NodeRef::Symbol(b),
            ));
        }
        snapshot
    }

    fn steps_of(overlay: &ProcessOverlay, process: usize) -> Vec<(usize, u32)> {
        overlay
            .steps
            .iter()
            .filter(|r| r.target == NodeRef::Process(process))
            .map(|r| (r.source.symbol().unwrap(), r.step.unwrap()))
            .collect()
    }

    #[test]
    fn test_linear_flow() {
        let snapshot = snapshot(
            "app/service.py",
            &["run_import", "parse", "validate", "unused"],
            &[(0, 1), (1, 2)],
        );
        let config = ProcessConfig::default();
        let overlay = ProcessExtractor::new(&config).extract(&snapshot);

        assert_eq!(overlay.processes.len(), 1);
        let process = &overlay.processes[0];
        assert_eq!(process.label, "run_import → validate");
        assert_eq!(process.step_count, 3);
        assert_eq!(steps_of(&overlay, 0), vec![(0, 1), (1, 2), (2, 3)]);
    }

    #[test]
    fn test_depth_first_order_follows_call_order() {
        // a -> b -> d, a -> c
        let snapshot = snapshot("m.py", &["a", "b", "c", "d"], &[(0, 1), (0, 2), (1, 3)]);
        let config = ProcessConfig::default();
        let overlay = ProcessExtractor::new(&config).extract(&snapshot);
        let order: Vec<usize> = steps_of(&overlay, 0).into_iter().map(|(s, _)| s).collect();
        assert_eq!(order, vec![0, 1, 3, 2]);
        assert_eq!(overlay.processes[0].label, "a → c");
    }

    #[test]
    fn test_cycle_terminates() {
        // entry -> a -> b -> a
        let snapshot = snapshot("m.py", &["entry", "a", "b"], &[(0, 1), (1, 2), (2, 1)]);
        let config = ProcessConfig::default();
        let overlay = ProcessExtractor::new(&config).extract(&snapshot);
        assert_eq!(overlay.processes.len(), 1);
        let steps: Vec<u32> = steps_of(&overlay, 0).into_iter().map(|(_, s)| s).collect();
        assert_eq!(steps, vec![1, 2, 3]);
    }

    #[test]
    fn test_closed_recursion_yields_entry_points() {
        let snapshot = snapshot("m.py", &["ping", "pong"], &[(0, 1), (1, 0)]);
        let config = ProcessConfig::default();
        let overlay = ProcessExtractor::new(&config).extract(&snapshot);
        assert_eq!(overlay.processes.len(), 2);
        assert_eq!(overlay.processes[0].label, "ping → pong");
        assert_eq!(overlay.processes[1].label, "pong → ping");
    }

    #[test]
    fn test_top_level_calls_keep_entry_points() {
        let mut snapshot = snapshot("cli.py", &["main", "parse_args"], &[(0, 1)]);
        snapshot.relations.push(CodeRelation::new(
            RelationType::Calls,
            NodeRef::File(0),
            NodeRef::Symbol(0),
        ));

        let config = ProcessConfig::default();
        let overlay = ProcessExtractor::new(&config).extract(&snapshot);
        assert_eq!(overlay.processes.len(), 1);
        assert_eq!(steps_of(&overlay, 0), vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn test_self_calls_are_ignored() {
        let snapshot = snapshot("m.py", &["recurse"], &[(0, 0)]);
        let config = ProcessConfig::default();
        let overlay = ProcessExtractor::new(&config).extract(&snapshot);
        assert!(overlay.processes.is_empty());
    }

    #[test]
    fn test_step_and_depth_limits() {
        let names = ["s0", "s1", "s2", "s3", "s4", "s5"];
        let chain: Vec<(usize, usize)> = (0..5).map(|i| (i, i + 1)).collect();
        let snapshot = snapshot("m.py", &names, &chain);

        let config = ProcessConfig { max_steps: 3, ..ProcessConfig::default() };
        let overlay = ProcessExtractor::new(&config).extract(&snapshot);
        assert_eq!(overlay.processes[0].step_count, 3);

        let config = ProcessConfig { max_depth: 1, ..ProcessConfig::default() };
        let overlay = ProcessExtractor::new(&config).extract(&snapshot);
        assert_eq!(overlay.processes[0].step_count, 2);
    }

    #[test]
    fn test_min_steps_and_max_processes() {
        let snapshot = snapshot(
            "m.py",
            &["a", "b", "c", "d", "e"],
            &[(0, 1), (2, 3), (3, 4)],
        );

        let config = ProcessConfig { min_steps: 3, ..ProcessConfig::default() };
        let overlay = ProcessExtractor::new(&config).extract(&snapshot);
        assert_eq!(overlay.processes.len(), 1);
        assert_eq!(overlay.processes[0].id, "process:0");
        assert_eq!(overlay.processes[0].label, "c → e");

        let config = ProcessConfig { max_processes: 1, ..ProcessConfig::default() };
        let overlay = ProcessExtractor::new(&config).extract(&snapshot);
        assert_eq!(overlay.processes.len(), 1);
        assert_eq!(overlay.processes[0].label, "a → b");
    }

    #[test]
    fn test_community_count() {
        let snapshot = snapshot("m.py", &["a", "b", "c"], &[(0, 1), (1, 2)]);
        let config = ProcessConfig::default();
        let mut overlay = ProcessExtractor::new(&config).extract(&snapshot);
        let communities = CommunityOverlay {
            communities: Vec::new(),
            memberships: vec![(0, 0), (1, 0), (2, 1)],
        };
        overlay.count_communities(&communities);
        assert_eq!(overlay.processes[0].community_count, 2);
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("test_login", "app/auth.py"), ProcessType::Test);
        assert_eq!(classify("helper", "src/auth.test.ts"), ProcessType::Test);
        assert_eq!(classify("onClick", "src/button.ts"), ProcessType::EventListener);
        assert_eq!(classify("userController", "src/user.ts"), ProcessType::HttpHandler);
        assert_eq!(classify("listUsers", "src/routes/users.ts"), ProcessType::HttpHandler);
        assert_eq!(classify("main", "src/app.go"), ProcessType::CliCommand);
        assert_eq!(classify("compute", "src/math.ts"), ProcessType::Unknown);
    }
}
