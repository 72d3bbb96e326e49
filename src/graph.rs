//! Road graph of highway paths and the points they reference
//!
//! The graph is built in two passes over an extract. The first pass keeps every path tagged
//! `highway` as an [`Edge`] together with its tags. The second pass collects the coordinates of
//! the points those edges reference as [`Vertex`]es. Points that no highway references and
//! relations are skipped.

use crate::config::RunConfig;
use crate::dispatch::run;
use crate::error::Result;
use crate::handler::{Handler, HandlerResult};
use crate::primitive::{Path, Point, Tag};
use log::{debug, info};
use std::collections::{BTreeSet, HashMap};

/// Tag key that marks a path as part of the road network.
pub static HIGHWAY_KEY: &str = "highway";

/// A graph vertex at the position of a point, in degrees (WGS 84).
#[derive(Clone, Debug, PartialEq)]
pub struct Vertex {
    pub id: u64,
    pub lat: f64,
    pub lon: f64,
}

/// A graph edge following a highway path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edge {
    /// Id of the path
    pub id: u64,
    /// Ids of the vertices in path order
    pub vertices: Vec<u64>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Graph {
    pub vertices: HashMap<u64, Vertex>,
    pub edges: Vec<Edge>,
    /// Tags of every edge, keyed by path id
    pub metadata: HashMap<u64, Vec<Tag>>,
}

impl Graph {
    pub fn new() -> Graph {
        Graph::default()
    }

    /// Returns the vertex ids referenced by edges that the extract does not contain.
    pub fn missing_vertices(&self) -> BTreeSet<u64> {
        self.edges
            .iter()
            .flat_map(|edge| edge.vertices.iter())
            .filter(|id| !self.vertices.contains_key(id))
            .copied()
            .collect()
    }
}

/// Returns `true` if `path` carries a `highway` tag with any value.
pub fn is_highway(path: &Path) -> bool {
    path.tags.iter().any(|tag| tag.key == HIGHWAY_KEY)
}

/// First pass: collects the highway paths as edges.
#[derive(Debug, Default)]
pub struct EdgeHandler {
    graph: Graph,
}

impl EdgeHandler {
    pub fn new() -> EdgeHandler {
        EdgeHandler::default()
    }
}

impl Handler for EdgeHandler {
    type Output = Graph;

    fn on_path(&mut self, path: &Path) -> HandlerResult {
        if is_highway(path) {
            self.graph.edges.push(Edge {
                id: path.id,
                vertices: path.refs.clone(),
            });
            self.graph.metadata.insert(path.id, path.tags.clone());
        }
        Ok(())
    }

    fn finish(self) -> Graph {
        self.graph
    }
}

/// Second pass: adds a vertex for every point the edges of `graph` reference.
#[derive(Debug)]
pub struct VertexHandler {
    graph: Graph,
    wanted: BTreeSet<u64>,
}

impl VertexHandler {
    pub fn new(graph: Graph) -> VertexHandler {
        let wanted = graph
            .edges
            .iter()
            .flat_map(|edge| edge.vertices.iter().copied())
            .collect();
        VertexHandler { graph, wanted }
    }
}

impl Handler for VertexHandler {
    type Output = Graph;

    fn on_point(&mut self, point: &Point) -> HandlerResult {
        if self.wanted.contains(&point.id) {
            self.graph.vertices.insert(
                point.id,
                Vertex {
                    id: point.id,
                    lat: point.lat(),
                    lon: point.lon(),
                },
            );
        }
        Ok(())
    }

    fn finish(self) -> Graph {
        self.graph
    }
}

/// Builds the road graph of the extract named by `config`. The extract is read twice.
///
/// # Example
/// ```no_run
/// use phaeton::*;
///
/// let config = RunConfig::new("extract.osm.pbf", None).unwrap();
/// let graph = build_graph(&config)?;
/// println!("{} edges, {} vertices", graph.edges.len(), graph.vertices.len());
/// # Ok::<(), phaeton::Error>(())
/// ```
pub fn build_graph(config: &RunConfig) -> Result<Graph> {
    let edges = run(config, EdgeHandler::new())?;
    debug!("found {} highway paths", edges.edges.len());

    let graph = run(config, VertexHandler::new(edges))?;
    let missing = graph.missing_vertices();
    if !missing.is_empty() {
        debug!("{} referenced points are not in the extract", missing.len());
    }

    info!(
        "graph has {} edges and {} vertices",
        graph.edges.len(),
        graph.vertices.len()
    );
    Ok(graph)
}
