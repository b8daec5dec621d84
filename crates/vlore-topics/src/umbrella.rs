//! Umbrella clustering: a similarity graph over an account's canonical
//! topics, community detection, coverage-based labelling.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use vlore_models::{AccountTagAggregate, UmbrellaCluster, UmbrellaFile};

use crate::config::{ClusteringMethod, TopicConfig};
use crate::similarity::cosine_similarity;

/// Weighted undirected graph over canonical topics. Edges exist only at
/// or above the similarity threshold.
pub struct SimilarityGraph {
    node_count: usize,
    adjacency: Vec<Vec<(usize, f32)>>,
    /// Sum of edge weights, each edge counted once
    total_weight: f32,
}

impl SimilarityGraph {
    /// Build the graph from per-topic embeddings.
    pub fn build(embeddings: &[Vec<f32>], threshold: f32) -> Self {
        let n = embeddings.len();
        let mut adjacency = vec![Vec::new(); n];
        let mut total_weight = 0.0f32;
        for i in 0..n {
            for j in (i + 1)..n {
                let weight = cosine_similarity(&embeddings[i], &embeddings[j]);
                if weight >= threshold {
                    adjacency[i].push((j, weight));
                    adjacency[j].push((i, weight));
                    total_weight += weight;
                }
            }
        }
        Self {
            node_count: n,
            adjacency,
            total_weight,
        }
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn neighbors(&self, node: usize) -> &[(usize, f32)] {
        &self.adjacency[node]
    }

    /// Weighted degree of a node.
    fn degree(&self, node: usize) -> f32 {
        self.adjacency[node].iter().map(|(_, w)| w).sum()
    }
}

/// A community id per node, renumbered by first appearance.
pub type Partition = Vec<usize>;

/// Community detection over a similarity graph. Implementations must be
/// deterministic for a fixed node ordering, and every returned
/// community must be connected in the graph.
pub trait Clusterer: Send + Sync {
    fn cluster(&self, graph: &SimilarityGraph) -> Partition;
    fn name(&self) -> &'static str;
}

/// Greedy modularity maximisation: repeated local-move passes in node
/// order until no move improves modularity. Ties break toward the
/// smallest community id, keeping the result stable.
///
/// A local move can strand the community it leaves behind (a bridge
/// node defecting leaves its old neighbours with no path between
/// them), so the converged partition is split into per-community
/// connected components before it is returned.
pub struct ModularityClusterer;

impl Clusterer for ModularityClusterer {
    fn cluster(&self, graph: &SimilarityGraph) -> Partition {
        let n = graph.node_count();
        let mut community: Vec<usize> = (0..n).collect();
        if n == 0 || graph.total_weight == 0.0 {
            return normalise(community);
        }

        let two_m = 2.0 * graph.total_weight;
        let degrees: Vec<f32> = (0..n).map(|i| graph.degree(i)).collect();
        let mut community_total: Vec<f32> = degrees.clone();

        const MAX_PASSES: usize = 16;
        for _ in 0..MAX_PASSES {
            let mut moved = false;
            for node in 0..n {
                let home = community[node];
                community_total[home] -= degrees[node];

                // Weight from node into each adjacent community
                let mut weight_to: BTreeMap<usize, f32> = BTreeMap::new();
                weight_to.insert(home, 0.0);
                for &(neighbor, weight) in graph.neighbors(node) {
                    *weight_to.entry(community[neighbor]).or_insert(0.0) += weight;
                }

                // BTreeMap iteration makes the smallest community id win ties
                let mut best = (home, f32::NEG_INFINITY);
                for (&candidate, &k_in) in &weight_to {
                    let gain = k_in - community_total[candidate] * degrees[node] / two_m;
                    if gain > best.1 {
                        best = (candidate, gain);
                    }
                }

                community_total[best.0] += degrees[node];
                if best.0 != home {
                    community[node] = best.0;
                    moved = true;
                }
            }
            if !moved {
                break;
            }
        }
        split_disconnected(graph, &community)
    }

    fn name(&self) -> &'static str {
        "modularity"
    }
}

/// Threshold connected components over the same graph; the fallback
/// when modularity clustering is not wanted.
pub struct ComponentsClusterer;

impl Clusterer for ComponentsClusterer {
    fn cluster(&self, graph: &SimilarityGraph) -> Partition {
        let n = graph.node_count();
        let mut parent: Vec<usize> = (0..n).collect();

        for node in 0..n {
            for &(neighbor, _) in graph.neighbors(node) {
                union(&mut parent, node, neighbor);
            }
        }

        let community: Vec<usize> = (0..n).map(|i| find(&mut parent, i)).collect();
        normalise(community)
    }

    fn name(&self) -> &'static str {
        "components"
    }
}

fn find(parent: &mut Vec<usize>, x: usize) -> usize {
    let up = parent[x];
    if up != x {
        let root = find(parent, up);
        parent[x] = root;
    }
    parent[x]
}

fn union(parent: &mut Vec<usize>, a: usize, b: usize) {
    let a = find(parent, a);
    let b = find(parent, b);
    if a != b {
        parent[a.max(b)] = a.min(b);
    }
}

/// Split every community of `partition` into its connected components,
/// so the connectivity invariant holds for whatever a clusterer
/// converged to.
fn split_disconnected(graph: &SimilarityGraph, partition: &[usize]) -> Partition {
    let n = graph.node_count();
    let mut parent: Vec<usize> = (0..n).collect();
    for node in 0..n {
        for &(neighbor, _) in graph.neighbors(node) {
            if partition[node] == partition[neighbor] {
                union(&mut parent, node, neighbor);
            }
        }
    }
    normalise((0..n).map(|i| find(&mut parent, i)).collect())
}

fn normalise(community: Vec<usize>) -> Partition {
    let mut renumber: HashMap<usize, usize> = HashMap::new();
    community
        .into_iter()
        .map(|c| {
            let next = renumber.len();
            *renumber.entry(c).or_insert(next)
        })
        .collect()
}

const LABEL_STOPWORDS: &[&str] = &[
    "a", "an", "and", "for", "from", "how", "in", "into", "my", "of", "on", "or", "per", "the",
    "to", "with", "your",
];

/// Words too generic to label an umbrella.
const LABEL_META_WORDS: &[&str] = &[
    "video", "videos", "thank", "thanks", "watching", "subscribe", "follow", "like", "channel",
    "content", "today", "really", "thing", "things", "stuff",
];

/// Generate a 1-2 word Title Case label from cluster members.
///
/// Words are scored by `3 * coverage + 0.5 * frequency`; a word covering
/// at least 30% of the cluster stands alone, otherwise it is paired
/// with the best non-overlapping runner-up.
fn generate_label(members: &[&str]) -> String {
    let cluster_size = members.len().max(1);

    // word -> set of member indices containing it, plus occurrence count
    let mut containing: BTreeMap<String, HashSet<usize>> = BTreeMap::new();
    let mut occurrences: BTreeMap<String, usize> = BTreeMap::new();
    for (idx, member) in members.iter().enumerate() {
        for word in member.split_whitespace() {
            let word = word.to_lowercase();
            if word.len() < 3
                || LABEL_STOPWORDS.contains(&word.as_str())
                || LABEL_META_WORDS.contains(&word.as_str())
            {
                continue;
            }
            containing.entry(word.clone()).or_default().insert(idx);
            *occurrences.entry(word).or_insert(0) += 1;
        }
    }
    if containing.is_empty() {
        return members.first().map(|m| title_case(m)).unwrap_or_default();
    }

    let mut scored: Vec<(String, f32, f32)> = containing
        .iter()
        .map(|(word, topic_set)| {
            let coverage = topic_set.len() as f32 / cluster_size as f32;
            let score = 3.0 * coverage + 0.5 * occurrences[word] as f32;
            (word.clone(), score, coverage)
        })
        .collect();
    // BTreeMap origin keeps equal scores in alphabetical order
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    let (first_word, _, first_coverage) = &scored[0];
    if *first_coverage >= 0.30 {
        return title_case(first_word);
    }

    let first_set = &containing[first_word];
    let second = scored[1..].iter().find(|(word, _, _)| {
        let set = &containing[word];
        let intersection = first_set.intersection(set).count() as f32;
        let union = first_set.union(set).count() as f32;
        intersection / union < 0.5
    });

    match second {
        Some((second_word, _, _)) => {
            format!("{} {}", title_case(first_word), title_case(second_word))
        }
        None => title_case(first_word),
    }
}

fn title_case(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builds the umbrella artifact for one account.
pub struct UmbrellaBuilder {
    config: Arc<TopicConfig>,
}

impl UmbrellaBuilder {
    pub fn new(config: Arc<TopicConfig>) -> Self {
        Self { config }
    }

    fn clusterer(&self) -> Box<dyn Clusterer> {
        match self.config.clustering {
            ClusteringMethod::Modularity => Box::new(ModularityClusterer),
            ClusteringMethod::Components => Box::new(ComponentsClusterer),
        }
    }

    /// Cluster the account's canonical topics. `embeddings` is parallel
    /// to `aggregates`. Empty input yields zero umbrellas.
    pub fn build(
        &self,
        aggregates: &[AccountTagAggregate],
        embeddings: &[Vec<f32>],
    ) -> UmbrellaFile {
        debug_assert_eq!(aggregates.len(), embeddings.len());
        let clusterer = self.clusterer();
        let graph = SimilarityGraph::build(embeddings, self.config.umbrella_threshold);
        let partition = clusterer.cluster(&graph);

        let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (node, &community) in partition.iter().enumerate() {
            groups.entry(community).or_default().push(node);
        }

        let mut clusters: Vec<Vec<usize>> = groups
            .into_values()
            .filter(|nodes| nodes.len() >= self.config.min_cluster_size)
            .collect();
        // Largest first; ties by total frequency, then first node
        clusters.sort_by(|a, b| {
            let freq = |nodes: &[usize]| -> usize {
                nodes.iter().map(|&n| aggregates[n].frequency).sum()
            };
            b.len()
                .cmp(&a.len())
                .then_with(|| freq(b).cmp(&freq(a)))
                .then_with(|| a[0].cmp(&b[0]))
        });
        clusters.truncate(self.config.max_umbrellas);

        let umbrellas = clusters
            .into_iter()
            .enumerate()
            .map(|(id, nodes)| {
                let members: Vec<&str> =
                    nodes.iter().map(|&n| aggregates[n].canonical.as_str()).collect();
                let avg_coherence = mean_pairwise_similarity(&nodes, embeddings);
                let total_frequency = nodes.iter().map(|&n| aggregates[n].frequency).sum();
                let mut video_ids: Vec<String> = nodes
                    .iter()
                    .flat_map(|&n| aggregates[n].video_ids.iter().cloned())
                    .collect();
                video_ids.sort();
                video_ids.dedup();

                UmbrellaCluster {
                    id,
                    label: generate_label(&members),
                    member_count: members.len(),
                    members: members.into_iter().map(String::from).collect(),
                    total_frequency,
                    avg_coherence,
                    video_ids,
                }
            })
            .collect();

        debug!(method = clusterer.name(), "umbrella clustering complete");
        UmbrellaFile {
            umbrellas,
            threshold: self.config.umbrella_threshold,
            method: clusterer.name().to_string(),
        }
    }
}

fn mean_pairwise_similarity(nodes: &[usize], embeddings: &[Vec<f32>]) -> f32 {
    let mut sum = 0.0f32;
    let mut count = 0usize;
    for (pos, &i) in nodes.iter().enumerate() {
        for &j in &nodes[pos + 1..] {
            sum += cosine_similarity(&embeddings[i], &embeddings[j]);
            count += 1;
        }
    }
    if count == 0 {
        1.0
    } else {
        sum / count as f32
    }
}
