//! Iterate over the dense nodes in a `PrimitiveGroup`

use crate::elements::{apply_delta, nano_lat, nano_lon, tag_from_indices, to_id};
use crate::error::{new_malformed_error, MalformedInput, Result};
use crate::primitive::{Point, Tag};
use crate::proto::osmformat;
use std::iter::FusedIterator;

/// An iterator over dense nodes. It decodes the delta encoded values into [`Point`]s.
pub struct DenseNodeIter<'a> {
    block: &'a osmformat::PrimitiveBlock,
    dids: std::slice::Iter<'a, i64>, // deltas
    cid: i64,                        // current id
    dlats: std::slice::Iter<'a, i64>, // deltas
    clat: i64,
    dlons: std::slice::Iter<'a, i64>, // deltas
    clon: i64,
    keys_vals: &'a [i32],
    keys_vals_index: usize,
    inconsistent: bool,
    failed: bool,
}

impl<'a> DenseNodeIter<'a> {
    pub(crate) fn new(
        block: &'a osmformat::PrimitiveBlock,
        osmdense: &'a osmformat::DenseNodes,
    ) -> DenseNodeIter<'a> {
        let consistent =
            osmdense.id.len() == osmdense.lat.len() && osmdense.id.len() == osmdense.lon.len();

        DenseNodeIter {
            block,
            dids: osmdense.id.iter(),
            cid: 0,
            dlats: osmdense.lat.iter(),
            clat: 0,
            dlons: osmdense.lon.iter(),
            clon: 0,
            keys_vals: &osmdense.keys_vals,
            keys_vals_index: 0,
            inconsistent: !consistent,
            failed: false,
        }
    }

    /// Consumes the `key, value, ..., 0` run of the next node. An empty `keys_vals` array means
    /// that no node in the group has tags.
    fn next_tags(&mut self) -> Result<Vec<Tag>> {
        let mut tags = Vec::new();
        while let Some(&key) = self.keys_vals.get(self.keys_vals_index) {
            if key == 0 {
                self.keys_vals_index += 1;
                break;
            }
            let val = self
                .keys_vals
                .get(self.keys_vals_index + 1)
                .copied()
                .ok_or_else(|| new_malformed_error(MalformedInput::InconsistentDenseNodes))?;
            self.keys_vals_index += 2;
            tags.push(tag_from_indices(self.block, key as usize, val as usize)?);
        }
        Ok(tags)
    }

    fn decode_next(&mut self, did: i64, dlat: i64, dlon: i64) -> Result<Point> {
        self.cid = apply_delta(self.cid, did, "dense ids")?;
        self.clat = apply_delta(self.clat, dlat, "dense latitudes")?;
        self.clon = apply_delta(self.clon, dlon, "dense longitudes")?;

        Ok(Point {
            id: to_id(self.cid)?,
            nano_lat: nano_lat(self.block, self.clat)?,
            nano_lon: nano_lon(self.block, self.clon)?,
            tags: self.next_tags()?,
        })
    }
}

impl<'a> Iterator for DenseNodeIter<'a> {
    type Item = Result<Point>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if self.inconsistent {
            self.failed = true;
            return Some(Err(new_malformed_error(
                MalformedInput::InconsistentDenseNodes,
            )));
        }

        match (self.dids.next(), self.dlats.next(), self.dlons.next()) {
            (Some(&did), Some(&dlat), Some(&dlon)) => {
                let res = self.decode_next(did, dlat, dlon);
                if res.is_err() {
                    self.failed = true;
                }
                Some(res)
            }
            _ => None,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.dids.size_hint()
    }
}

impl<'a> FusedIterator for DenseNodeIter<'a> {}
