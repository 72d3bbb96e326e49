//! Points, paths and relations

use std::fmt;

/// The kind of a [`Primitive`], without its payload.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PrimitiveKind {
    Point,
    Path,
    Relation,
}

impl PrimitiveKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Path => "path",
            Self::Relation => "relation",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A key/value pair attached to a primitive (See [OSM wiki](https://wiki.openstreetmap.org/wiki/Tags)).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new<K: Into<String>, V: Into<String>>(key: K, value: V) -> Tag {
        Tag {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One decoded record of an extract.
///
/// Primitives are owned values. Once the decoder emits one, nothing mutates it.
#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    /// An OSM node, from either the plain or the dense encoding.
    Point(Point),
    /// An OSM way.
    Path(Path),
    /// An OSM relation.
    Relation(Relation),
}

impl Primitive {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Primitive::Point(_) => PrimitiveKind::Point,
            Primitive::Path(_) => PrimitiveKind::Path,
            Primitive::Relation(_) => PrimitiveKind::Relation,
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            Primitive::Point(point) => point.id,
            Primitive::Path(path) => path.id,
            Primitive::Relation(relation) => relation.id,
        }
    }

    pub fn tags(&self) -> &[Tag] {
        match self {
            Primitive::Point(point) => &point.tags,
            Primitive::Path(path) => &path.tags,
            Primitive::Relation(relation) => &relation.tags,
        }
    }
}

/// A geographic point (See [OSM wiki](https://wiki.openstreetmap.org/wiki/Node)).
#[derive(Clone, Debug, PartialEq)]
pub struct Point {
    pub id: u64,
    /// Latitude in nanodegrees.
    pub nano_lat: i64,
    /// Longitude in nanodegrees.
    pub nano_lon: i64,
    pub tags: Vec<Tag>,
}

impl Point {
    /// Returns the latitude coordinate in degrees.
    pub fn lat(&self) -> f64 {
        1e-9 * self.nano_lat as f64
    }

    /// Returns the longitude coordinate in degrees.
    pub fn lon(&self) -> f64 {
        1e-9 * self.nano_lon as f64
    }
}

/// An ordered list of point references (See [OSM wiki](https://wiki.openstreetmap.org/wiki/Way)).
#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    pub id: u64,
    /// Identifiers of the points along the path, already delta-decoded.
    pub refs: Vec<u64>,
    pub tags: Vec<Tag>,
}

impl Path {
    /// A path is closed if it has at least two references and ends where it starts.
    pub fn is_closed(&self) -> bool {
        self.refs.len() > 1 && self.refs.first() == self.refs.last()
    }
}

/// A composite of other primitives (See [OSM wiki](https://wiki.openstreetmap.org/wiki/Relation)).
#[derive(Clone, Debug, PartialEq)]
pub struct Relation {
    pub id: u64,
    pub members: Vec<Member>,
    pub tags: Vec<Tag>,
}

/// A member of a relation.
///
/// Each member references a primitive of kind `kind` by its identifier.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Member {
    pub kind: PrimitiveKind,
    pub id: u64,
    pub role: String,
}
