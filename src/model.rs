//! In-memory model of OSM objects as seen by the filter.

use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

/// The three OSM object kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Node,
    Way,
    Relation,
}

impl Kind {
    pub fn name(self) -> &'static str {
        match self {
            Kind::Node => "node",
            Kind::Way => "way",
            Kind::Relation => "relation",
        }
    }

    /// Index into per-kind arrays (node, way, relation).
    pub fn index(self) -> usize {
        match self {
            Kind::Node => 0,
            Kind::Way => 1,
            Kind::Relation => 2,
        }
    }

    /// Single-letter OPL prefix.
    pub fn letter(self) -> char {
        match self {
            Kind::Node => 'n',
            Kind::Way => 'w',
            Kind::Relation => 'r',
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of object kinds, used as the entity mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitySet(u8);

impl EntitySet {
    pub const NOTHING: EntitySet = EntitySet(0);
    pub const NODE: EntitySet = EntitySet(1);
    pub const WAY: EntitySet = EntitySet(2);
    pub const RELATION: EntitySet = EntitySet(4);
    pub const ALL: EntitySet = EntitySet(7);

    pub fn of(kind: Kind) -> EntitySet {
        match kind {
            Kind::Node => EntitySet::NODE,
            Kind::Way => EntitySet::WAY,
            Kind::Relation => EntitySet::RELATION,
        }
    }

    pub fn contains(self, kind: Kind) -> bool {
        self.0 & EntitySet::of(kind).0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn kinds(self) -> impl Iterator<Item = Kind> {
        [Kind::Node, Kind::Way, Kind::Relation]
            .into_iter()
            .filter(move |k| self.contains(*k))
    }
}

impl BitOr for EntitySet {
    type Output = EntitySet;

    fn bitor(self, rhs: EntitySet) -> EntitySet {
        EntitySet(self.0 | rhs.0)
    }
}

impl BitAnd for EntitySet {
    type Output = EntitySet;

    fn bitand(self, rhs: EntitySet) -> EntitySet {
        EntitySet(self.0 & rhs.0)
    }
}

impl Not for EntitySet {
    type Output = EntitySet;

    fn not(self) -> EntitySet {
        EntitySet(!self.0 & EntitySet::ALL.0)
    }
}

/// A key/value tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// A reference to a node from a way.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeRef {
    pub id: i64,
}

/// A relation member: a typed reference with a role.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub kind: Kind,
    pub id: i64,
    pub role: String,
}

/// One OSM object with its metadata and sub-elements.
///
/// `nodes` is populated for ways only, `members` for relations only.
/// `location` is populated for nodes only and carried just for output.
#[derive(Debug, Clone, PartialEq)]
pub struct OsmObject {
    pub kind: Kind,
    pub id: i64,
    pub version: i64,
    pub changeset: i64,
    pub uid: i64,
    pub visible: bool,
    pub user: String,
    pub timestamp: Option<String>,
    pub location: Option<(f64, f64)>,
    pub tags: Vec<Tag>,
    pub nodes: Vec<NodeRef>,
    pub members: Vec<Member>,
}

impl OsmObject {
    pub fn new(kind: Kind, id: i64) -> OsmObject {
        OsmObject {
            kind,
            id,
            version: 0,
            changeset: 0,
            uid: 0,
            visible: true,
            user: String::new(),
            timestamp: None,
            location: None,
            tags: Vec::new(),
            nodes: Vec::new(),
            members: Vec::new(),
        }
    }

    /// Value of the tag with the given key, if present.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }

    /// A way whose first and last node refs are equal. Ways with zero or
    /// one node count as closed.
    pub fn is_closed_way(&self) -> bool {
        if self.kind != Kind::Way {
            return false;
        }
        match (self.nodes.first(), self.nodes.last()) {
            (Some(first), Some(last)) => first.id == last.id,
            _ => true,
        }
    }
}
