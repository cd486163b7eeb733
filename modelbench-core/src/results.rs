//! Persisted confrontation results.
//!
//! A [`ResultSet`] is a named, appendable collection of labeled scalar and
//! array entries, each carrying its unit and NaN-aware min/max metadata.
//! Entries may live at the top level or inside named groups; groups hold
//! the relationship-analysis bundles. One result set exists per
//! (confrontation, model) pair, plus one shared set per confrontation for
//! the benchmark itself.
//!
//! The set carries display name/color metadata so a report layer can label
//! and color its curves without consulting the model again.

use crate::variable::Variable;
use ndarray::{Array1, Array2};
use petgraph::graph::{Graph, NodeIndex};
use serde::{Deserialize, Serialize};

/// Payload of one result entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResultData {
    Scalar(f64),
    Series(Array1<f64>),
    Map(Array2<f64>),
}

impl ResultData {
    fn min(&self) -> f64 {
        self.iter_values()
            .filter(|v| !v.is_nan())
            .fold(f64::NAN, f64::min)
    }

    fn max(&self) -> f64 {
        self.iter_values()
            .filter(|v| !v.is_nan())
            .fold(f64::NAN, f64::max)
    }

    fn iter_values(&self) -> Box<dyn Iterator<Item = f64> + '_> {
        match self {
            ResultData::Scalar(v) => Box::new(std::iter::once(*v)),
            ResultData::Series(a) => Box::new(a.iter().copied()),
            ResultData::Map(a) => Box::new(a.iter().copied()),
        }
    }
}

/// A labeled scalar or array result with unit and range metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub name: String,
    pub data: ResultData,
    pub unit: String,
    pub vmin: f64,
    pub vmax: f64,
}

impl ResultEntry {
    pub fn new(name: &str, data: ResultData, unit: &str) -> Self {
        let vmin = data.min();
        let vmax = data.max();
        Self {
            name: name.to_string(),
            data,
            unit: unit.to_string(),
            vmin,
            vmax,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Group(String),
    Entry(ResultEntry),
}

impl Node {
    fn name(&self) -> &str {
        match self {
            Node::Group(name) => name,
            Node::Entry(entry) => &entry.name,
        }
    }
}

/// A named, appendable collection of result entries with nested groups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSet {
    name: String,
    color: String,
    node_indexes: Vec<NodeIndex>,
    graph: Graph<Node, ()>,
}

impl ResultSet {
    pub fn new(name: &str, color: &str) -> Self {
        Self {
            name: name.to_string(),
            color: color.to_string(),
            node_indexes: Vec::new(),
            graph: Graph::default(),
        }
    }

    /// Display name of the result set's owner (model or benchmark).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display color of the result set's owner.
    pub fn color(&self) -> &str {
        &self.color
    }

    fn find_top_level(&self, name: &str) -> Option<NodeIndex> {
        self.node_indexes
            .iter()
            .copied()
            .find(|&idx| self.graph[idx].name() == name)
    }

    fn insert_node(&mut self, node: Node) -> NodeIndex {
        if let Some(idx) = self.find_top_level(node.name()) {
            self.graph[idx] = node;
            idx
        } else {
            let idx = self.graph.add_node(node);
            self.node_indexes.push(idx);
            idx
        }
    }

    /// Insert a prebuilt entry at the top level, overwriting any entry
    /// with the same name. Used when the caller wants metadata other than
    /// the data's own range (e.g. a symmetric range for difference maps).
    pub fn insert(&mut self, entry: ResultEntry) {
        self.insert_node(Node::Entry(entry));
    }

    /// Insert a scalar entry, overwriting any entry with the same name.
    pub fn insert_scalar(&mut self, name: &str, value: f64, unit: &str) {
        self.insert_node(Node::Entry(ResultEntry::new(
            name,
            ResultData::Scalar(value),
            unit,
        )));
    }

    /// Insert a 1-D array entry, overwriting any entry with the same name.
    pub fn insert_series(&mut self, name: &str, values: Array1<f64>, unit: &str) {
        self.insert_node(Node::Entry(ResultEntry::new(
            name,
            ResultData::Series(values),
            unit,
        )));
    }

    /// Insert a 2-D array entry, overwriting any entry with the same name.
    pub fn insert_map(&mut self, name: &str, values: Array2<f64>, unit: &str) {
        self.insert_node(Node::Entry(ResultEntry::new(
            name,
            ResultData::Map(values),
            unit,
        )));
    }

    /// Insert a variable as an entry named `name`, choosing the payload
    /// shape from the variable's data.
    pub fn insert_variable(&mut self, name: &str, variable: &Variable) {
        let data = match variable.data().ndim() {
            0 | 1 => ResultData::Series(
                Array1::from_iter(variable.data().iter().copied()),
            ),
            2 => ResultData::Map(
                variable
                    .data()
                    .view()
                    .into_dimensionality::<ndarray::Ix2>()
                    .expect("2-D data")
                    .to_owned(),
            ),
            _ => ResultData::Series(Array1::from_iter(variable.data().iter().copied())),
        };
        self.insert_node(Node::Entry(ResultEntry::new(name, data, variable.unit())));
    }

    /// Create (or fetch) a nested named group.
    pub fn insert_group(&mut self, name: &str) {
        if self.find_top_level(name).is_none() {
            self.insert_node(Node::Group(name.to_string()));
        }
    }

    /// Insert an entry inside a named group, creating the group on demand.
    pub fn insert_in_group(&mut self, group: &str, entry: ResultEntry) {
        self.insert_group(group);
        let parent = self.find_top_level(group).expect("group just created");
        // overwrite within the group as well
        let existing = self
            .graph
            .neighbors(parent)
            .find(|&idx| self.graph[idx].name() == entry.name);
        match existing {
            Some(idx) => self.graph[idx] = Node::Entry(entry),
            None => {
                let child = self.graph.add_node(Node::Entry(entry));
                self.graph.add_edge(parent, child, ());
            }
        }
    }

    /// Fetch a top-level entry by name.
    pub fn get(&self, name: &str) -> Option<&ResultEntry> {
        self.find_top_level(name).and_then(|idx| match &self.graph[idx] {
            Node::Entry(entry) => Some(entry),
            Node::Group(_) => None,
        })
    }

    /// Fetch a top-level scalar by name.
    pub fn get_scalar(&self, name: &str) -> Option<f64> {
        match self.get(name) {
            Some(ResultEntry {
                data: ResultData::Scalar(v),
                ..
            }) => Some(*v),
            _ => None,
        }
    }

    /// Fetch an entry inside a group.
    pub fn get_in_group(&self, group: &str, name: &str) -> Option<&ResultEntry> {
        let parent = self.find_top_level(group)?;
        self.graph
            .neighbors(parent)
            .find(|&idx| self.graph[idx].name() == name)
            .and_then(|idx| match &self.graph[idx] {
                Node::Entry(entry) => Some(entry),
                Node::Group(_) => None,
            })
    }

    /// Iterate the top-level entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ResultEntry> {
        self.node_indexes
            .iter()
            .filter_map(move |&idx| match &self.graph[idx] {
                Node::Entry(entry) => Some(entry),
                Node::Group(_) => None,
            })
    }

    /// Iterate the top-level group names in insertion order.
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.node_indexes
            .iter()
            .filter_map(move |&idx| match &self.graph[idx] {
                Node::Group(name) => Some(name.as_str()),
                Node::Entry(_) => None,
            })
    }

    /// Iterate `(name, value)` over all top-level scalar entries.
    pub fn scalars(&self) -> impl Iterator<Item = (&str, f64)> {
        self.iter().filter_map(|entry| match entry.data {
            ResultData::Scalar(v) => Some((entry.name.as_str(), v)),
            _ => None,
        })
    }
}
