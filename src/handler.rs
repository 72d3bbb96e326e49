//! Consumers of decoded primitives

use crate::error::HandlerError;
use crate::primitive::{Path, Point, Relation};
use std::fmt;
use std::ops::{Add, AddAssign};

/// The result of a single handler invocation.
pub type HandlerResult = Result<(), HandlerError>;

/// A consumer of primitives with one capability per primitive kind.
///
/// All capabilities default to doing nothing, so a handler only implements the kinds it cares
/// about. A failing capability aborts the dispatch run.
///
/// # Example
/// ```
/// use phaeton::*;
///
/// #[derive(Default)]
/// struct MaxPointId(u64);
///
/// impl Handler for MaxPointId {
///     type Output = u64;
///
///     fn on_point(&mut self, point: &Point) -> HandlerResult {
///         self.0 = self.0.max(point.id);
///         Ok(())
///     }
///
///     fn finish(self) -> u64 {
///         self.0
///     }
/// }
/// ```
pub trait Handler {
    /// The state handed back when the sequence is exhausted.
    type Output;

    fn on_point(&mut self, _point: &Point) -> HandlerResult {
        Ok(())
    }

    fn on_path(&mut self, _path: &Path) -> HandlerResult {
        Ok(())
    }

    fn on_relation(&mut self, _relation: &Relation) -> HandlerResult {
        Ok(())
    }

    /// Consumes the handler after the last primitive.
    fn finish(self) -> Self::Output;
}

/// Number of primitives per kind.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Counts {
    pub points: u64,
    pub paths: u64,
    pub relations: u64,
}

impl Counts {
    pub fn total(&self) -> u64 {
        self.points + self.paths + self.relations
    }
}

impl AddAssign for Counts {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.points += other.points;
        self.paths += other.paths;
        self.relations += other.relations;
    }
}

impl Add for Counts {
    type Output = Counts;

    fn add(mut self, other: Self) -> Counts {
        self += other;
        self
    }
}

impl fmt::Display for Counts {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "points:    {}\npaths:     {}\nrelations: {}",
            self.points, self.paths, self.relations
        )
    }
}

/// Counts every primitive by kind. Never fails.
#[derive(Debug, Default)]
pub struct CountingHandler {
    counts: Counts,
}

impl CountingHandler {
    pub fn new() -> CountingHandler {
        CountingHandler::default()
    }
}

impl Handler for CountingHandler {
    type Output = Counts;

    fn on_point(&mut self, _point: &Point) -> HandlerResult {
        self.counts.points += 1;
        Ok(())
    }

    fn on_path(&mut self, _path: &Path) -> HandlerResult {
        self.counts.paths += 1;
        Ok(())
    }

    fn on_relation(&mut self, _relation: &Relation) -> HandlerResult {
        self.counts.relations += 1;
        Ok(())
    }

    fn finish(self) -> Counts {
        self.counts
    }
}
