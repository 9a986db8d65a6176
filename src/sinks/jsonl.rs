//! One JSON object per line.

use super::ObjectSink;
use crate::model::{Kind, OsmObject};
use anyhow::Result;
use serde_json::{json, Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct JsonlSink {
    writer: BufWriter<Box<dyn Write + Send>>,
}

impl JsonlSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(Box::new(file)),
        })
    }

    pub fn stdout() -> Self {
        Self {
            writer: BufWriter::new(Box::new(std::io::stdout())),
        }
    }
}

impl ObjectSink for JsonlSink {
    fn write(&mut self, object: &OsmObject) -> Result<()> {
        let value = object_to_json(object);
        serde_json::to_writer(&mut self.writer, &value)?;
        writeln!(self.writer)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

fn object_to_json(object: &OsmObject) -> Value {
    let mut map = Map::new();
    map.insert("type".to_string(), Value::from(object.kind.name()));
    map.insert("id".to_string(), Value::from(object.id));
    map.insert("version".to_string(), Value::from(object.version));
    map.insert("changeset".to_string(), Value::from(object.changeset));
    map.insert("uid".to_string(), Value::from(object.uid));
    map.insert("user".to_string(), Value::from(object.user.as_str()));
    map.insert("visible".to_string(), Value::from(object.visible));
    if let Some(timestamp) = &object.timestamp {
        map.insert("timestamp".to_string(), Value::from(timestamp.as_str()));
    }
    if let Some((lon, lat)) = object.location {
        map.insert("lon".to_string(), Value::from(lon));
        map.insert("lat".to_string(), Value::from(lat));
    }

    let tags: Map<String, Value> = object
        .tags
        .iter()
        .map(|tag| (tag.key.clone(), Value::from(tag.value.as_str())))
        .collect();
    map.insert("tags".to_string(), Value::Object(tags));

    match object.kind {
        Kind::Way => {
            let refs: Vec<Value> = object.nodes.iter().map(|n| Value::from(n.id)).collect();
            map.insert("nodes".to_string(), Value::Array(refs));
        }
        Kind::Relation => {
            let members: Vec<Value> = object
                .members
                .iter()
                .map(|member| {
                    json!({
                        "type": member.kind.name(),
                        "ref": member.id,
                        "role": member.role,
                    })
                })
                .collect();
            map.insert("members".to_string(), Value::Array(members));
        }
        Kind::Node => {}
    }

    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Member, NodeRef, Tag};

    #[test]
    fn node_shape() {
        let mut node = OsmObject::new(Kind::Node, 42);
        node.version = 3;
        node.user = "tester".to_string();
        node.location = Some((1.5, 2.5));
        node.tags = vec![Tag {
            key: "amenity".to_string(),
            value: "cafe".to_string(),
        }];
        let value = object_to_json(&node);
        assert_eq!(value["type"], "node");
        assert_eq!(value["id"], 42);
        assert_eq!(value["version"], 3);
        assert_eq!(value["user"], "tester");
        assert_eq!(value["lon"], 1.5);
        assert_eq!(value["lat"], 2.5);
        assert_eq!(value["tags"]["amenity"], "cafe");
        assert!(value.get("nodes").is_none());
        assert!(value.get("members").is_none());
        assert!(value.get("timestamp").is_none());
    }

    #[test]
    fn way_and_relation_payloads() {
        let mut way = OsmObject::new(Kind::Way, 1);
        way.nodes = vec![NodeRef { id: 10 }, NodeRef { id: 11 }];
        let value = object_to_json(&way);
        assert_eq!(value["nodes"], serde_json::json!([10, 11]));

        let mut relation = OsmObject::new(Kind::Relation, 2);
        relation.members = vec![Member {
            kind: Kind::Way,
            id: 1,
            role: "outer".to_string(),
        }];
        let value = object_to_json(&relation);
        assert_eq!(
            value["members"],
            serde_json::json!([{"type": "way", "ref": 1, "role": "outer"}])
        );
    }
}
