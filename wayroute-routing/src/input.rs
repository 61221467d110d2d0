//! Tagged node/way stream consumed by the graph builder
//!
//! The on-disk form is JSON lines, one object per line:
//!
//! ```text
//! {"type":"node","id":1,"lat":50.85,"lon":4.35}
//! {"type":"way","id":10,"nodes":[1,2,3],"tags":{"highway":"residential"}}
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use wayroute_common::{Coordinate, Error, Result};

use crate::tags::TagSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OsmNode {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl OsmNode {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::from_degrees(self.lat, self.lon)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OsmWay {
    pub id: i64,
    pub nodes: Vec<i64>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl OsmWay {
    /// Tags in key order
    pub fn tag_set(&self) -> TagSet {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OsmObject {
    Node(OsmNode),
    Way(OsmWay),
}

/// Iterate objects from JSON lines; blank lines and `#` comments are skipped
pub fn read_objects<R: BufRead>(reader: R) -> impl Iterator<Item = Result<OsmObject>> {
    reader
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let line = match line {
                Ok(line) => line,
                Err(e) => return Some(Err(Error::Io(e))),
            };
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                return None;
            }
            Some(serde_json::from_str(trimmed).map_err(|e| {
                Error::InvalidInput(format!("line {}: {e}", index + 1))
            }))
        })
}

pub fn read_objects_from_path(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<OsmObject>>> {
    let file = File::open(path)?;
    Ok(read_objects(BufReader::new(file)))
}
