//! Binary snapshots of a routing graph
//!
//! Layout: 8-byte magic, little-endian `u32` format version, then the
//! bincode-encoded [`RoutingGraph`].

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::info;
use wayroute_common::{Error, Result};

use crate::builder::RoutingGraph;

const MAGIC: &[u8; 8] = b"WAYROUTE";
const FORMAT_VERSION: u32 = 1;

impl RoutingGraph {
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        info!(
            path = %path.as_ref().display(),
            vertices = self.graph.vertex_count(),
            arcs = self.graph.arc_count(),
            "graph saved"
        );
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let graph = Self::read_from(BufReader::new(file))?;
        info!(
            path = %path.as_ref().display(),
            vertices = graph.graph.vertex_count(),
            arcs = graph.graph.arc_count(),
            contracted = graph.is_contracted(),
            "graph loaded"
        );
        Ok(graph)
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
        bincode::serialize_into(writer, self)
            .map_err(|e| Error::Serialization(format!("failed to encode graph: {e}")))
    }

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(Error::Serialization(
                "not a wayroute graph snapshot".to_string(),
            ));
        }
        let mut version = [0u8; 4];
        reader.read_exact(&mut version)?;
        let version = u32::from_le_bytes(version);
        if version != FORMAT_VERSION {
            return Err(Error::Serialization(format!(
                "unsupported snapshot version {version} (expected {FORMAT_VERSION})"
            )));
        }

        let mut graph: RoutingGraph = bincode::deserialize_from(reader)
            .map_err(|e| Error::Serialization(format!("failed to decode graph: {e}")))?;
        graph.tags.reindex();
        graph.graph.check_structure()?;
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DynamicGraph, EdgeData};
    use crate::profile::Metric;
    use crate::tags::{TagSet, TagsIndex};
    use wayroute_common::Coordinate;

    fn sample() -> RoutingGraph {
        let mut tags = TagsIndex::new();
        let id = tags.add(TagSet::new().with("highway", "primary"));
        let mut graph = DynamicGraph::new();
        graph.add_vertex(Coordinate::new(1.0, 2.0));
        graph.add_vertex(Coordinate::new(1.0, 2.001));
        graph.add_arc(0, 1, EdgeData::original(3.0, 111.0, id)).unwrap();
        RoutingGraph {
            graph,
            tags,
            profile: "car".to_string(),
            metric: Metric::Shortest,
        }
    }

    #[test]
    fn test_round_trip_in_memory() {
        let original = sample();
        let mut buffer = Vec::new();
        original.write_to(&mut buffer).unwrap();
        assert_eq!(&buffer[..8], MAGIC);

        let mut restored = RoutingGraph::read_from(buffer.as_slice()).unwrap();
        assert_eq!(restored.profile, "car");
        assert_eq!(restored.metric, Metric::Shortest);
        assert_eq!(restored.graph.arc_count(), 1);
        // lookup table rebuilt: same tags intern to the same id
        let id = restored.tags.add(TagSet::new().with("highway", "primary"));
        assert_eq!(restored.tags.len(), 1);
        assert_eq!(restored.graph.find_arc(0, 1).unwrap().unwrap().1.data.tags, Some(id));
    }

    #[test]
    fn test_rejects_foreign_data() {
        assert!(matches!(
            RoutingGraph::read_from(&b"NOTAGRAPH-AT-ALL"[..]),
            Err(Error::Serialization(_))
        ));

        let mut buffer = Vec::new();
        sample().write_to(&mut buffer).unwrap();
        buffer[8] = 99;
        assert!(matches!(
            RoutingGraph::read_from(buffer.as_slice()),
            Err(Error::Serialization(_))
        ));
    }
}
