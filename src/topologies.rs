//! Built-in topologies, and a loader for topologies stored as JSON.

use std::{fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};

use crate::{algorithms::Topology, Error};

/// The Internet2 OS3E backbone: 34 nodes and 42 links, all with unit weight.
pub fn os3e() -> Topology {
    let mut t = Topology::new();
    t.add_path(&["Vancouver", "Seattle"]);
    t.add_path(&["Seattle", "Missoula", "Minneapolis", "Chicago"]);
    t.add_path(&["Seattle", "Salt Lake City"]);
    t.add_path(&["Seattle", "Portland", "Sunnyvale, CA"]);
    t.add_path(&["Sunnyvale, CA", "Salt Lake City"]);
    t.add_path(&["Sunnyvale, CA", "Los Angeles"]);
    t.add_path(&["Los Angeles", "Salt Lake City"]);
    t.add_path(&["Los Angeles", "Tucson", "El Paso, TX"]);
    t.add_path(&["Salt Lake City", "Denver"]);
    t.add_path(&["Denver", "Albuquerque", "El Paso, TX"]);
    t.add_path(&["Denver", "Kansas City, MO", "Chicago"]);
    t.add_path(&["Kansas City, MO", "Dallas", "Houston"]);
    t.add_path(&["El Paso, TX", "Houston"]);
    t.add_path(&["Houston", "Jackson, MS", "Memphis", "Nashville"]);
    t.add_path(&["Houston", "Baton Rouge", "Jacksonville"]);
    t.add_path(&["Chicago", "Indianapolis", "Louisville", "Nashville"]);
    t.add_path(&["Nashville", "Atlanta"]);
    t.add_path(&["Atlanta", "Jacksonville"]);
    t.add_path(&["Jacksonville", "Miami"]);
    t.add_path(&["Chicago", "Cleveland"]);
    t.add_path(&[
        "Cleveland",
        "Buffalo",
        "Boston",
        "New York",
        "Philadelphia",
        "Washington DC",
    ]);
    t.add_path(&["Cleveland", "Pittsburgh", "Ashburn, VA", "Washington DC"]);
    t.add_path(&["Washington DC", "Raleigh, NC", "Atlanta"]);
    t
}

/// A topology as stored on disk.
///
/// ```json
/// { "links": [["a", "b"], ["b", "c", 2.5]] }
/// ```
///
/// Links without a weight have weight 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyFile {
    /// All links of the topology.
    pub links: Vec<LinkSpec>,
}

/// A single link in a [`TopologyFile`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinkSpec {
    /// `[src, dst, weight]`
    Weighted(String, String, f64),
    /// `[src, dst]`
    Unit(String, String),
}

impl TopologyFile {
    /// Build the topology. Fails on invalid weights, self-loops or duplicate links.
    pub fn build(self) -> Result<Topology, Error> {
        let mut t = Topology::new();
        for link in self.links {
            let (a, b, w) = match link {
                LinkSpec::Weighted(a, b, w) => (a, b, w),
                LinkSpec::Unit(a, b) => (a, b, 1.0),
            };
            t.add_link(a, b, w)?;
        }
        Ok(t)
    }
}

impl From<&Topology> for TopologyFile {
    fn from(topo: &Topology) -> Self {
        let links = topo
            .graph
            .edge_indices()
            .filter_map(|e| {
                let (a, b) = topo.graph.edge_endpoints(e)?;
                let (a, b) = (topo.name(a).to_string(), topo.name(b).to_string());
                let w = topo.weight(e);
                Some(if w == 1.0 {
                    LinkSpec::Unit(a, b)
                } else {
                    LinkSpec::Weighted(a, b, w)
                })
            })
            .collect();
        Self { links }
    }
}

/// Parse a topology from a JSON string.
pub fn from_json(s: &str) -> Result<Topology, Error> {
    serde_json::from_str::<TopologyFile>(s)?.build()
}

/// Read a topology from a JSON file.
pub fn load(path: impl AsRef<Path>) -> Result<Topology, Error> {
    let reader = BufReader::new(File::open(path)?);
    serde_json::from_reader::<_, TopologyFile>(reader)?.build()
}

/// Get a built-in topology by name (currently only `os3e`), or read it from a file otherwise.
pub fn by_name(name: &str) -> Result<Topology, Error> {
    match name.to_lowercase().as_str() {
        "os3e" => Ok(os3e()),
        _ => load(name),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn os3e_shape() {
        let t = os3e();
        assert_eq!(t.num_nodes(), 34);
        assert_eq!(t.num_links(), 42);
        assert!(t.is_connected());
        assert!(t.links().all(|e| t.weight(e) == 1.0));
    }

    #[test]
    fn json_topology() {
        let t = from_json(r#"{ "links": [["a", "b"], ["b", "c", 2.5]] }"#).unwrap();
        assert_eq!(t.num_nodes(), 3);
        assert_eq!(t.num_links(), 2);
        let (a, b, c) = (t.node_id("a").unwrap(), t.node_id("b").unwrap(), t.node_id("c").unwrap());
        assert_eq!(t.weight(t.find_edge(a, b).unwrap()), 1.0);
        assert_eq!(t.weight(t.find_edge(c, b).unwrap()), 2.5);
    }

    #[test]
    fn json_topology_errors() {
        assert!(matches!(from_json(r#"{ "links": [["a", "a"]] }"#), Err(Error::InvalidLink { .. })));
        assert!(matches!(
            from_json(r#"{ "links": [["a", "b", -1.0]] }"#),
            Err(Error::InvalidLink { .. })
        ));
        assert!(matches!(from_json(r#"{ "links": [["a"]] }"#), Err(Error::Json(_))));
    }

    #[test]
    fn json_roundtrip_os3e() {
        let t = os3e();
        let s = serde_json::to_string(&TopologyFile::from(&t)).unwrap();
        let back = from_json(&s).unwrap();
        assert_eq!(back.num_nodes(), 34);
        assert_eq!(back.num_links(), 42);
    }
}
