//! Community detection over the symbol graph.
//!
//! Symbols are clustered with a deterministic Louvain:
//!
//! 1. **Local moving**: every node starts alone and moves to the neighbouring
//!    community with the best modularity gain, visited in creation order
//! 2. **Aggregation**: communities collapse into super-nodes and local moving
//!    repeats on the coarse graph
//!
//! ## Modularity gain
//!
//! ΔQ(i → C) = k_i,in(C) − γ · Σtot(C) · k_i / 2m
//!
//! Where:
//! - k_i,in(C) = weight between node i and community C
//! - Σtot(C) = summed degree of C without i
//! - k_i = degree of i, m = total edge weight, γ = resolution
//!
//! There is no randomness: ties go to the lowest community id, so the same
//! graph always yields the same partition.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use crate::config::CommunityConfig;
use crate::knowledge::graph::GraphSnapshot;
use crate::knowledge::ontology::{CodeRelation, CommunityNode, NodeRef, RelationType};
use crate::knowledge::tokenize::split_words;

/// Gains below this are treated as float noise.
const GAIN_EPSILON: f64 = 1e-12;

/// Tokens too generic to name a cluster.
const STOPWORDS: &[&str] = &[
    "get", "set", "new", "init", "create", "make", "build", "handle", "handler", "run", "main",
    "impl", "default", "from", "into", "with", "for", "the", "and", "this", "self", "util", "utils",
    "helper", "helpers", "data", "value", "values", "test", "tests", "item", "items", "index",
    "to", "of", "is", "has", "on", "do",
];

/// Communities of one run plus the membership of each symbol.
#[derive(Debug, Clone, Default)]
pub struct CommunityOverlay {
    pub communities: Vec<CommunityNode>,
    /// `(symbol, community)` pairs in symbol order.
    pub memberships: Vec<(usize, usize)>,
}

impl CommunityOverlay {
    /// Community index of a symbol, if it has one.
    pub fn community_of(&self, symbol: usize) -> Option<usize> {
        self.memberships
            .binary_search_by_key(&symbol, |(s, _)| *s)
            .ok()
            .map(|pos| self.memberships[pos].1)
    }

    /// One MEMBER_OF relation per member.
    pub fn relations(&self) -> impl Iterator<Item = CodeRelation> + '_ {
        self.memberships.iter().map(|&(symbol, community)| {
            CodeRelation::new(
                RelationType::MemberOf,
                NodeRef::Symbol(symbol),
                NodeRef::Community(community),
            )
        })
    }
}

/// Partitions symbols into functional clusters.
pub struct CommunityDetector<'a> {
    config: &'a CommunityConfig,
}

impl<'a> CommunityDetector<'a> {
    pub fn new(config: &'a CommunityConfig) -> Self {
        Self { config }
    }

    /// Cluster the symbols of a snapshot.
    pub fn detect(&self, snapshot: &GraphSnapshot) -> CommunityOverlay {
        let links = symbol_links(snapshot);

        // Only symbols with at least one relation take part in Louvain.
        let mut local: Vec<Option<usize>> = vec![None; snapshot.symbols.len()];
        for &(a, b) in links.keys() {
            local[a] = Some(0);
            local[b] = Some(0);
        }
        let mut nodes = Vec::new();
        for (symbol, slot) in local.iter_mut().enumerate() {
            if slot.is_some() {
                *slot = Some(nodes.len());
                nodes.push(symbol);
            }
        }

        let graph = self.build_graph(snapshot, &links, &local, &nodes);
        let partition = self.louvain(graph);

        // Number communities by their first member in symbol order.
        let mut numbering: HashMap<usize, usize> = HashMap::new();
        let mut members: Vec<Vec<usize>> = Vec::new();
        let mut assigned: Vec<Option<usize>> = vec![None; snapshot.symbols.len()];
        for symbol in 0..snapshot.symbols.len() {
            let community = match local[symbol] {
                Some(node) => *numbering.entry(partition[node]).or_insert_with(|| {
                    members.push(Vec::new());
                    members.len() - 1
                }),
                None if self.config.include_singletons => {
                    members.push(Vec::new());
                    members.len() - 1
                }
                None => continue,
            };
            members[community].push(symbol);
            assigned[symbol] = Some(community);
        }

        let mut intra = vec![0.0; members.len()];
        let mut incident = vec![0.0; members.len()];
        for (&(a, b), &weight) in &links {
            if let (Some(ca), Some(cb)) = (assigned[a], assigned[b]) {
                incident[ca] += weight;
                if ca == cb {
                    intra[ca] += weight;
                } else {
                    incident[cb] += weight;
                }
            }
        }

        let communities = members
            .iter()
            .enumerate()
            .map(|(n, symbols)| CommunityNode {
                id: CommunityNode::id_for(n),
                label: label_for(snapshot, symbols),
                symbol_count: symbols.len(),
                cohesion: if incident[n] > 0.0 { intra[n] / incident[n] } else { 0.0 },
            })
            .collect::<Vec<_>>();

        let memberships = assigned
            .iter()
            .enumerate()
            .filter_map(|(symbol, c)| c.map(|c| (symbol, c)))
            .collect();

        debug!(
            clustered = nodes.len(),
            communities = communities.len(),
            "community detection finished"
        );

        CommunityOverlay { communities, memberships }
    }

    /// Relation weights plus same-file affinity, over Louvain node indexes.
    fn build_graph(
        &self,
        snapshot: &GraphSnapshot,
        links: &BTreeMap<(usize, usize), f64>,
        local: &[Option<usize>],
        nodes: &[usize],
    ) -> WeightedGraph {
        let mut maps: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); nodes.len()];
        let mut add = |a: usize, b: usize, w: f64| {
            *maps[a].entry(b).or_default() += w;
            *maps[b].entry(a).or_default() += w;
        };

        for (&(a, b), &weight) in links {
            if let (Some(la), Some(lb)) = (local[a], local[b]) {
                add(la, lb, weight);
            }
        }

        let affinity = self.config.same_file_affinity;
        if affinity > 0.0 {
            let mut by_file: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
            for (node, &symbol) in nodes.iter().enumerate() {
                by_file.entry(snapshot.symbol_files[symbol]).or_default().push(node);
            }
            for group in by_file.values().filter(|g| g.len() > 1) {
                let share = affinity / (group.len() - 1) as f64;
                for (i, &a) in group.iter().enumerate() {
                    for &b in &group[i + 1..] {
                        add(a, b, share);
                    }
                }
            }
        }

        WeightedGraph::from_maps(maps, vec![0.0; nodes.len()])
    }

    /// Final community of every node of `graph`.
    fn louvain(&self, mut graph: WeightedGraph) -> Vec<usize> {
        let mut assignment: Vec<usize> = (0..graph.len()).collect();
        if graph.total_weight() <= 0.0 {
            return assignment;
        }

        let resolution = self.config.resolution;
        let mut modularity = graph.modularity(&assignment, resolution);

        for level in 0..self.config.max_levels {
            let (partition, moved) = self.local_moving(&graph);
            if !moved {
                break;
            }

            let (partition, count) = renumber(&partition);
            let next = graph.modularity(&partition, resolution);
            for slot in assignment.iter_mut() {
                *slot = partition[*slot];
            }
            graph = graph.aggregate(&partition, count);

            debug!(level, communities = count, modularity = next, "louvain level");

            if next - modularity < self.config.min_modularity_gain {
                break;
            }
            modularity = next;
        }

        assignment
    }

    /// One local-moving phase. Returns the partition and whether any node moved.
    fn local_moving(&self, graph: &WeightedGraph) -> (Vec<usize>, bool) {
        let n = graph.len();
        let degrees: Vec<f64> = (0..n).map(|i| graph.degree(i)).collect();
        let two_m: f64 = degrees.iter().sum();
        let resolution = self.config.resolution;

        let mut community: Vec<usize> = (0..n).collect();
        let mut totals = degrees.clone();
        let mut moved_any = false;

        for _ in 0..self.config.max_passes {
            let mut moved = false;

            for node in 0..n {
                let current = community[node];
                let k = degrees[node];

                let mut neighbours: BTreeMap<usize, f64> = BTreeMap::new();
                for &(other, weight) in &graph.adjacency[node] {
                    *neighbours.entry(community[other]).or_default() += weight;
                }

                totals[current] -= k;
                let gain = |c: usize, k_in: f64| k_in - resolution * totals[c] * k / two_m;

                let mut best = current;
                let mut best_gain = gain(current, neighbours.get(&current).copied().unwrap_or(0.0));
                for (&candidate, &k_in) in &neighbours {
                    if candidate == current {
                        continue;
                    }
                    let g = gain(candidate, k_in);
                    if g > best_gain + GAIN_EPSILON {
                        best = candidate;
                        best_gain = g;
                    }
                }

                totals[best] += k;
                if best != current {
                    community[node] = best;
                    moved = true;
                }
            }

            if !moved {
                break;
            }
            moved_any = true;
        }

        (community, moved_any)
    }
}

/// Relation count per unordered symbol pair.
///
/// Every directed CALLS, EXTENDS or IMPLEMENTS relation between two symbols
/// counts once, so mutual calls weigh 2. A file IMPORTS relation counts once
/// more for each linked symbol pair whose files it connects.
fn symbol_links(snapshot: &GraphSnapshot) -> BTreeMap<(usize, usize), f64> {
    let mut seen: HashSet<(RelationType, usize, usize)> = HashSet::new();
    let mut links: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for rel in snapshot.relations.iter().filter(|r| r.kind.is_symbol_link()) {
        let (Some(a), Some(b)) = (rel.source.symbol(), rel.target.symbol()) else {
            continue;
        };
        if a != b && seen.insert((rel.kind, a, b)) {
            *links.entry((a.min(b), a.max(b))).or_default() += 1.0;
        }
    }

    let imports: HashSet<(usize, usize)> = snapshot
        .relations_of(RelationType::Imports)
        .filter_map(|r| Some((r.source.file()?, r.target.file()?)))
        .collect();
    if !imports.is_empty() {
        for (&(a, b), weight) in links.iter_mut() {
            let (fa, fb) = (snapshot.symbol_files[a], snapshot.symbol_files[b]);
            if fa == fb {
                continue;
            }
            *weight += [(fa, fb), (fb, fa)]
                .iter()
                .filter(|pair| imports.contains(pair))
                .count() as f64;
        }
    }
    links
}

/// Relabel communities `0..count` by first occurrence.
fn renumber(partition: &[usize]) -> (Vec<usize>, usize) {
    let mut ids: HashMap<usize, usize> = HashMap::new();
    let relabeled = partition
        .iter()
        .map(|c| {
            let next = ids.len();
            *ids.entry(*c).or_insert(next)
        })
        .collect();
    (relabeled, ids.len())
}

/// Undirected weighted graph for Louvain.
#[derive(Debug, Clone)]
struct WeightedGraph {
    /// Neighbours with edge weight, sorted by neighbour, without self entries.
    adjacency: Vec<Vec<(usize, f64)>>,
    /// Weight folded into the node by aggregation.
    self_weight: Vec<f64>,
}

impl WeightedGraph {
    fn from_maps(maps: Vec<BTreeMap<usize, f64>>, self_weight: Vec<f64>) -> Self {
        Self {
            adjacency: maps.into_iter().map(|m| m.into_iter().collect()).collect(),
            self_weight,
        }
    }

    fn len(&self) -> usize {
        self.adjacency.len()
    }

    fn degree(&self, node: usize) -> f64 {
        self.adjacency[node].iter().map(|(_, w)| w).sum::<f64>() + 2.0 * self.self_weight[node]
    }

    /// Total edge weight `m`.
    fn total_weight(&self) -> f64 {
        (0..self.len()).map(|i| self.degree(i)).sum::<f64>() / 2.0
    }

    fn modularity(&self, partition: &[usize], resolution: f64) -> f64 {
        let m = self.total_weight();
        if m <= 0.0 {
            return 0.0;
        }

        let mut internal: HashMap<usize, f64> = HashMap::new();
        let mut totals: HashMap<usize, f64> = HashMap::new();
        for node in 0..self.len() {
            let c = partition[node];
            *totals.entry(c).or_default() += self.degree(node);
            *internal.entry(c).or_default() += self.self_weight[node];
            for &(other, weight) in &self.adjacency[node] {
                if other > node && partition[other] == c {
                    *internal.entry(c).or_default() += weight;
                }
            }
        }

        totals
            .iter()
            .map(|(c, total)| {
                let inside = internal.get(c).copied().unwrap_or(0.0);
                inside / m - resolution * (total / (2.0 * m)).powi(2)
            })
            .sum()
    }

    /// Collapse each community of `partition` into one node.
    fn aggregate(&self, partition: &[usize], count: usize) -> Self {
        let mut maps: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); count];
        let mut self_weight = vec![0.0; count];

        for node in 0..self.len() {
            let c = partition[node];
            self_weight[c] += self.self_weight[node];
            for &(other, weight) in &self.adjacency[node] {
                if other < node {
                    continue;
                }
                let d = partition[other];
                if c == d {
                    self_weight[c] += weight;
                } else {
                    *maps[c].entry(d).or_default() += weight;
                    *maps[d].entry(c).or_default() += weight;
                }
            }
        }

        Self::from_maps(maps, self_weight)
    }
}

/// Most frequent meaningful name token, else the stem of the dominant file.
fn label_for(snapshot: &GraphSnapshot, members: &[usize]) -> String {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for &symbol in members {
        for token in name_tokens(&snapshot.symbols[symbol].name) {
            *counts.entry(token).or_default() += 1;
        }
    }

    // BTreeMap order breaks count ties alphabetically.
    let mut best: Option<(&String, usize)> = None;
    for (token, &count) in &counts {
        if count >= 2 && best.map_or(true, |(_, c)| count > c) {
            best = Some((token, count));
        }
    }
    if let Some((token, _)) = best {
        return title_case(token);
    }

    let mut per_file: BTreeMap<usize, usize> = BTreeMap::new();
    for &symbol in members {
        *per_file.entry(snapshot.symbol_files[symbol]).or_default() += 1;
    }
    let mut dominant: Option<(usize, usize)> = None;
    for (&file, &count) in &per_file {
        if dominant.map_or(true, |(_, c)| count > c) {
            dominant = Some((file, count));
        }
    }

    dominant
        .and_then(|(file, _)| snapshot.files.get(file))
        .map(|f| f.stem().to_string())
        .unwrap_or_default()
}

/// Meaningful lower-case tokens of a symbol name: stopwords and tokens
/// shorter than three characters are dropped.
pub fn name_tokens(name: &str) -> Vec<String> {
    split_words(name)
        .into_iter()
        .filter(|t| t.chars().count() >= 3 && !STOPWORDS.contains(&t.as_str()))
        .collect()
}

fn title_case(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::ontology::{FileNode, Language, SourceRange, SymbolKind, SymbolNode};

    /// Snapshot with the given `(path, symbol names)` files and symbol CALLS.
    fn snapshot(files: &[(&str, &[&str])], calls: &[(usize, usize)]) -> GraphSnapshot {
        let mut snapshot = GraphSnapshot::default();
        for (file_idx, (path, names)) in files.iter().enumerate() {
            snapshot.files.push(FileNode::new(*path, Language::TypeScript, ""));
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
                snapshot.symbol_files.push(file_idx);
            }
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

    fn two_triangles() -> GraphSnapshot {
        snapshot(
            &[
                ("src/config.ts", &["parseConfig", "loadConfig", "validateConfig"]),
                ("src/server.ts", &["startServer", "listen", "serveRequest"]),
            ],
            &[(0, 1), (1, 2), (0, 2), (3, 4), (4, 5), (3, 5), (2, 3)],
        )
    }

    #[test]
    fn test_two_dense_groups_split() {
        let config = CommunityConfig::default();
        let overlay = CommunityDetector::new(&config).detect(&two_triangles());

        assert_eq!(overlay.communities.len(), 2);
        let first = overlay.community_of(0);
        assert_eq!(first, Some(0));
        assert_eq!(overlay.community_of(1), first);
        assert_eq!(overlay.community_of(2), first);
        let second = overlay.community_of(3);
        assert_eq!(second, Some(1));
        assert_eq!(overlay.community_of(4), second);
        assert_eq!(overlay.community_of(5), second);
    }

    #[test]
    fn test_cohesion_counts_relation_weight_only() {
        let config = CommunityConfig::default();
        let overlay = CommunityDetector::new(&config).detect(&two_triangles());

        // Three internal calls, one bridge call.
        assert!((overlay.communities[0].cohesion - 0.75).abs() < 1e-9);
        assert!((overlay.communities[1].cohesion - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_detection_is_deterministic() {
        let config = CommunityConfig::default();
        let snapshot = two_triangles();
        let a = CommunityDetector::new(&config).detect(&snapshot);
        let b = CommunityDetector::new(&config).detect(&snapshot);
        assert_eq!(a.memberships, b.memberships);
        assert_eq!(a.communities, b.communities);
    }

    #[test]
    fn test_each_symbol_has_at_most_one_membership() {
        let config = CommunityConfig::default();
        let overlay = CommunityDetector::new(&config).detect(&two_triangles());
        let mut seen = std::collections::HashSet::new();
        for rel in overlay.relations() {
            assert_eq!(rel.kind, RelationType::MemberOf);
            assert!(seen.insert(rel.source));
        }
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn test_isolated_symbols_become_singletons() {
        let snapshot = snapshot(&[("src/a.ts", &["alpha", "beta", "lonely"])], &[(0, 1)]);

        let config = CommunityConfig::default();
        let overlay = CommunityDetector::new(&config).detect(&snapshot);
        let lonely = overlay.community_of(2).unwrap();
        assert_ne!(Some(lonely), overlay.community_of(0));
        assert_eq!(overlay.communities[lonely].symbol_count, 1);
        assert_eq!(overlay.communities[lonely].cohesion, 0.0);

        let config = CommunityConfig {
            include_singletons: false,
            ..CommunityConfig::default()
        };
        let overlay = CommunityDetector::new(&config).detect(&snapshot);
        assert_eq!(overlay.community_of(2), None);
        assert_eq!(overlay.communities.len(), 1);
    }

    #[test]
    fn test_label_uses_recurring_token() {
        let config = CommunityConfig::default();
        let overlay = CommunityDetector::new(&config).detect(&two_triangles());
        assert_eq!(overlay.communities[0].label, "Config");
    }

    #[test]
    fn test_label_falls_back_to_file_stem() {
        let snapshot = snapshot(&[("src/billing.ts", &["charge", "refund"])], &[(0, 1)]);
        let config = CommunityConfig::default();
        let overlay = CommunityDetector::new(&config).detect(&snapshot);
        assert_eq!(overlay.communities[0].label, "billing");
    }

    #[test]
    fn test_self_calls_carry_no_weight() {
        let snapshot = snapshot(&[("src/a.ts", &["recurse"])], &[(0, 0)]);
        let config = CommunityConfig::default();
        let overlay = CommunityDetector::new(&config).detect(&snapshot);
        assert_eq!(overlay.communities.len(), 1);
        assert_eq!(overlay.communities[0].cohesion, 0.0);
    }

    #[test]
    fn test_each_directed_relation_counts() {
        let snapshot = snapshot(&[("src/net.ts", &["ping", "pong"])], &[(0, 1), (1, 0)]);
        let links = symbol_links(&snapshot);
        assert_eq!(links.get(&(0, 1)), Some(&2.0));
    }

    #[test]
    fn test_imports_weigh_on_linked_pairs() {
        let mut snapshot = snapshot(
            &[("src/app.ts", &["login", "logout"]), ("src/crypto.ts", &["hash", "salt"])],
            &[(0, 2)],
        );
        snapshot.relations.push(CodeRelation::new(
            RelationType::Imports,
            NodeRef::File(0),
            NodeRef::File(1),
        ));

        let links = symbol_links(&snapshot);
        assert_eq!(links.get(&(0, 2)), Some(&2.0));
        // An import alone links no symbols.
        assert_eq!(links.len(), 1);
    }

    /// Ten triangles joined in a ring by single calls.
    fn triangle_ring() -> GraphSnapshot {
        let names: Vec<Vec<String>> = (0..10)
            .map(|t| (0..3).map(|i| format!("step{}x{}", t, i)).collect())
            .collect();
        let paths: Vec<String> = (0..10).map(|t| format!("src/ring{}.ts", t)).collect();
        let name_refs: Vec<Vec<&str>> =
            names.iter().map(|n| n.iter().map(String::as_str).collect()).collect();
        let files: Vec<(&str, &[&str])> = paths
            .iter()
            .zip(&name_refs)
            .map(|(p, n)| (p.as_str(), n.as_slice()))
            .collect();

        let mut calls = Vec::new();
        for t in 0..10 {
            let b = 3 * t;
            calls.extend([(b, b + 1), (b + 1, b + 2), (b, b + 2), (b + 2, (b + 3) % 30)]);
        }
        snapshot(&files, &calls)
    }

    #[test]
    fn test_aggregation_merges_communities_across_levels() {
        let config = CommunityConfig {
            same_file_affinity: 0.0,
            ..CommunityConfig::default()
        };
        let detector = CommunityDetector::new(&config);
        let snapshot = triangle_ring();

        // Local moving alone stops at the ten triangles.
        let links = symbol_links(&snapshot);
        let local: Vec<Option<usize>> = (0..30).map(Some).collect();
        let nodes: Vec<usize> = (0..30).collect();
        let graph = detector.build_graph(&snapshot, &links, &local, &nodes);
        let (first_level, moved) = detector.local_moving(&graph);
        assert!(moved);
        assert_eq!(renumber(&first_level).1, 10);

        // The coarse level pairs neighbouring triangles.
        let overlay = detector.detect(&snapshot);
        assert_eq!(overlay.communities.len(), 5);
        for symbol in 0..30 {
            assert_eq!(overlay.community_of(symbol), Some(symbol / 6));
        }
    }

    #[test]
    fn test_name_tokens() {
        assert_eq!(name_tokens("parseUserConfig"), vec!["parse", "user", "config"]);
        assert_eq!(name_tokens("load_user_profile"), vec!["load", "user", "profile"]);
        assert_eq!(name_tokens("HTTPServer"), vec!["http", "server"]);
        assert_eq!(name_tokens("getId"), Vec::<String>::new());
    }
}
