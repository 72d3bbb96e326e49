//! `HeaderBlock`, `PrimitiveBlock` and `PrimitiveGroup`s

use crate::dense::DenseNodeIter;
use crate::elements::{decode_node, decode_relation, decode_way};
use crate::error::{new_malformed_error, MalformedInput, Result};
use crate::primitive::{Path, Point, Primitive, Relation};
use crate::proto::osmformat;
use std::collections::VecDeque;

/// A `HeaderBlock`. It contains metadata about the following `PrimitiveBlock`s.
#[derive(Clone, Debug)]
pub struct HeaderBlock {
    header: osmformat::HeaderBlock,
}

impl HeaderBlock {
    pub(crate) fn new(header: osmformat::HeaderBlock) -> HeaderBlock {
        HeaderBlock { header }
    }

    /// Returns a list of required features that a parser needs to implement to parse the
    /// following `PrimitiveBlock`s.
    pub fn required_features(&self) -> &[String] {
        &self.header.required_features
    }

    /// Returns a list of optional features that a parser can choose to ignore.
    pub fn optional_features(&self) -> &[String] {
        &self.header.optional_features
    }

    /// Returns the program that wrote the extract, if it says so.
    pub fn writing_program(&self) -> Option<&str> {
        self.header
            .has_writingprogram()
            .then(|| self.header.writingprogram())
    }

    pub fn source(&self) -> Option<&str> {
        self.header.has_source().then(|| self.header.source())
    }

    /// Returns the bounding box of the extract in nanodegrees.
    pub fn bbox(&self) -> Option<BoundingBox> {
        self.header.bbox.as_ref().map(|bbox| BoundingBox {
            left: bbox.left(),
            right: bbox.right(),
            top: bbox.top(),
            bottom: bbox.bottom(),
        })
    }
}

/// A bounding box with coordinates in nanodegrees.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BoundingBox {
    pub left: i64,
    pub right: i64,
    pub top: i64,
    pub bottom: i64,
}

/// A `PrimitiveBlock`. It contains a sequence of groups.
#[derive(Clone, Debug)]
pub struct PrimitiveBlock {
    block: osmformat::PrimitiveBlock,
}

impl PrimitiveBlock {
    pub(crate) fn new(block: osmformat::PrimitiveBlock) -> PrimitiveBlock {
        PrimitiveBlock { block }
    }

    /// Returns an iterator over the groups in this `PrimitiveBlock`.
    pub fn groups(&self) -> GroupIter {
        GroupIter::new(&self.block)
    }

    /// Decodes every primitive of this block in file order and appends them to `out`.
    ///
    /// Inside a group, plain nodes come first, then dense nodes, ways and relations. On error,
    /// `out` may already hold primitives of this block.
    pub fn decode_into(&self, out: &mut VecDeque<Primitive>) -> Result<()> {
        for group in self.groups() {
            for point in group.points() {
                out.push_back(Primitive::Point(point?));
            }
            for point in group.dense_points() {
                out.push_back(Primitive::Point(point?));
            }
            for path in group.paths() {
                out.push_back(Primitive::Path(path?));
            }
            for relation in group.relations() {
                out.push_back(Primitive::Relation(relation?));
            }
        }
        Ok(())
    }
}

/// A `PrimitiveGroup` contains a sequence of elements of one type.
pub struct PrimitiveGroup<'a> {
    block: &'a osmformat::PrimitiveBlock,
    group: &'a osmformat::PrimitiveGroup,
}

impl<'a> PrimitiveGroup<'a> {
    /// Returns an iterator over the plain (non-dense) nodes in this group.
    pub fn points(&self) -> impl Iterator<Item = Result<Point>> + 'a {
        let block = self.block;
        self.group.nodes.iter().map(move |n| decode_node(block, n))
    }

    /// Returns an iterator over the dense nodes in this group.
    pub fn dense_points(&self) -> DenseNodeIter<'a> {
        DenseNodeIter::new(self.block, &self.group.dense)
    }

    pub fn paths(&self) -> impl Iterator<Item = Result<Path>> + 'a {
        let block = self.block;
        self.group.ways.iter().map(move |w| decode_way(block, w))
    }

    pub fn relations(&self) -> impl Iterator<Item = Result<Relation>> + 'a {
        let block = self.block;
        self.group.relations.iter().map(move |r| decode_relation(block, r))
    }
}

/// An iterator over the groups in a `PrimitiveBlock`.
pub struct GroupIter<'a> {
    block: &'a osmformat::PrimitiveBlock,
    groups: std::slice::Iter<'a, osmformat::PrimitiveGroup>,
}

impl<'a> GroupIter<'a> {
    fn new(block: &'a osmformat::PrimitiveBlock) -> GroupIter<'a> {
        GroupIter {
            block,
            groups: block.primitivegroup.iter(),
        }
    }
}

impl<'a> Iterator for GroupIter<'a> {
    type Item = PrimitiveGroup<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.groups.next().map(|group| PrimitiveGroup {
            block: self.block,
            group,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.groups.size_hint()
    }
}

impl<'a> ExactSizeIterator for GroupIter<'a> {}

pub(crate) fn str_from_stringtable(
    block: &osmformat::PrimitiveBlock,
    index: usize,
) -> Result<&str> {
    if let Some(vec) = block.stringtable.s.get(index) {
        std::str::from_utf8(vec).map_err(|e| new_malformed_error(MalformedInput::Utf8(e)))
    } else {
        Err(new_malformed_error(
            MalformedInput::StringtableIndexOutOfBounds { index },
        ))
    }
}
