//! Sequential streaming of OSM objects from a PBF file or stdin.

use std::fs::File;
use std::io::{self, BufReader, Read};

use anyhow::{Context, Result};
use osmpbf::{
    BlobDecode, BlobReader, DenseNode, Element, Info, Node, PrimitiveBlock, RelMemberType,
    Relation, Way,
};

use crate::model::{EntitySet, Kind, Member, NodeRef, OsmObject, Tag};
use crate::utils::format_timestamp_millis;

/// Stream objects from `input` ('-' reads stdin), skipping kinds outside
/// `entities`, and hand each one to the callback in file order.
pub fn read_objects<F>(input: &str, entities: EntitySet, mut handle: F) -> Result<()>
where
    F: FnMut(OsmObject) -> Result<()>,
{
    let reader: BlobReader<Box<dyn Read + Send>> = if input == "-" {
        BlobReader::new(Box::new(BufReader::new(io::stdin())))
    } else {
        let file =
            File::open(input).with_context(|| format!("failed to open input file '{input}'"))?;
        BlobReader::new(Box::new(BufReader::new(file)))
    };

    for blob in reader {
        let blob = blob?;
        match blob.decode() {
            Ok(BlobDecode::OsmHeader(_)) => {}
            Ok(BlobDecode::OsmData(block)) => process_block(&block, entities, &mut handle)?,
            Ok(BlobDecode::Unknown(unknown)) => eprintln!("Unknown blob: {unknown}"),
            Err(error) => return Err(error.into()),
        }
    }

    Ok(())
}

fn process_block<F>(block: &PrimitiveBlock, entities: EntitySet, handle: &mut F) -> Result<()>
where
    F: FnMut(OsmObject) -> Result<()>,
{
    for element in block.elements() {
        match element {
            Element::Node(node) if entities.contains(Kind::Node) => handle(from_node(&node))?,
            Element::DenseNode(node) if entities.contains(Kind::Node) => {
                handle(from_dense_node(&node))?
            }
            Element::Way(way) if entities.contains(Kind::Way) => handle(from_way(&way))?,
            Element::Relation(relation) if entities.contains(Kind::Relation) => {
                handle(from_relation(&relation))?
            }
            _ => {}
        }
    }
    Ok(())
}

fn collect_tags<'a, I>(tags: I) -> Vec<Tag>
where
    I: Iterator<Item = (&'a str, &'a str)>,
{
    tags.map(|(key, value)| Tag {
        key: key.to_string(),
        value: value.to_string(),
    })
    .collect()
}

fn apply_info(object: &mut OsmObject, info: &Info) {
    object.visible = info.visible();
    object.version = info.version().map(i64::from).unwrap_or(0);
    object.changeset = info.changeset().unwrap_or(0);
    object.uid = info.uid().map(i64::from).unwrap_or(0);
    object.user = info
        .user()
        .and_then(|user| user.ok())
        .map(|s| s.to_string())
        .unwrap_or_default();
    object.timestamp = info.milli_timestamp().and_then(format_timestamp_millis);
}

fn from_node(node: &Node) -> OsmObject {
    let mut object = OsmObject::new(Kind::Node, node.id());
    apply_info(&mut object, &node.info());
    object.location = Some((node.lon(), node.lat()));
    object.tags = collect_tags(node.tags());
    object
}

fn from_dense_node(node: &DenseNode) -> OsmObject {
    let mut object = OsmObject::new(Kind::Node, node.id());
    if let Some(info) = node.info() {
        object.visible = info.visible();
        object.version = i64::from(info.version());
        object.changeset = info.changeset();
        object.uid = i64::from(info.uid());
        object.user = info.user().ok().map(|s| s.to_string()).unwrap_or_default();
        object.timestamp = format_timestamp_millis(info.milli_timestamp());
    }
    object.location = Some((node.lon(), node.lat()));
    object.tags = collect_tags(node.tags());
    object
}

fn from_way(way: &Way) -> OsmObject {
    let mut object = OsmObject::new(Kind::Way, way.id());
    apply_info(&mut object, &way.info());
    object.tags = collect_tags(way.tags());
    object.nodes = way.refs().map(|id| NodeRef { id }).collect();
    object
}

fn from_relation(relation: &Relation) -> OsmObject {
    let mut object = OsmObject::new(Kind::Relation, relation.id());
    apply_info(&mut object, &relation.info());
    object.tags = collect_tags(relation.tags());
    object.members = relation
        .members()
        .map(|member| Member {
            kind: match member.member_type {
                RelMemberType::Node => Kind::Node,
                RelMemberType::Way => Kind::Way,
                RelMemberType::Relation => Kind::Relation,
            },
            id: member.member_id,
            role: member.role().unwrap_or("").to_string(),
        })
        .collect();
    object
}
