//! Lazy sequence of primitives decoded from an extract

use crate::blob::{BlobDecode, BlobReader};
use crate::block::HeaderBlock;
use crate::error::{
    new_malformed_error, new_unsupported_error, MalformedInput, Result, UnsupportedFormat,
};
use crate::primitive::Primitive;
use log::{debug, trace};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, Read};
use std::iter::FusedIterator;
use std::path::Path;

/// Required header features this decoder implements.
pub static SUPPORTED_FEATURES: &[&str] =
    &["OsmSchema-V0.6", "DenseNodes", "HistoricalInformation"];

/// A forward-only, single-pass sequence of the [`Primitive`]s in an extract.
///
/// Blobs are decoded one at a time, so at most one primitive block is held in memory. The
/// underlying reader is dropped as soon as the sequence ends or fails; after that every call to
/// `next` returns `None`.
pub struct PrimitiveDecoder<R: Read> {
    blobs: Option<BlobReader<R>>,
    header: HeaderBlock,
    pending: VecDeque<Primitive>,
    blocks: u64,
}

impl<R: Read> PrimitiveDecoder<R> {
    /// Creates a decoder over `reader` and validates the header block of the extract.
    ///
    /// # Errors
    /// Fails if the first blob is missing or is not a supported `OSMHeader` blob.
    ///
    /// # Example
    /// ```
    /// use phaeton::*;
    ///
    /// let err = PrimitiveDecoder::new(std::io::Cursor::new(Vec::new())).err().unwrap();
    /// assert!(err.is_malformed());
    /// ```
    pub fn new(reader: R) -> Result<PrimitiveDecoder<R>> {
        PrimitiveDecoder::from_blobs(BlobReader::new(reader))
    }

    fn from_blobs(mut blobs: BlobReader<R>) -> Result<PrimitiveDecoder<R>> {
        let first = match blobs.next() {
            Some(blob) => blob?,
            None => return Err(new_malformed_error(MalformedInput::MissingHeaderBlock)),
        };
        let header = match first.decode()? {
            BlobDecode::OsmHeader(header) => *header,
            BlobDecode::OsmData(_) => {
                return Err(new_malformed_error(MalformedInput::MissingHeaderBlock))
            }
            BlobDecode::Unknown(name) => {
                return Err(new_malformed_error(MalformedInput::UnknownBlobType(
                    name.to_string(),
                )))
            }
        };

        if let Some(feature) = header
            .required_features()
            .iter()
            .find(|f| !SUPPORTED_FEATURES.contains(&f.as_str()))
        {
            return Err(new_unsupported_error(UnsupportedFormat::RequiredFeature(
                feature.clone(),
            )));
        }

        debug!(
            "header: required {:?}, optional {:?}, written by {}",
            header.required_features(),
            header.optional_features(),
            header.writing_program().unwrap_or("unknown program")
        );

        Ok(PrimitiveDecoder {
            blobs: Some(blobs),
            header,
            pending: VecDeque::new(),
            blocks: 0,
        })
    }

    /// Returns the header block of the extract.
    pub fn header(&self) -> &HeaderBlock {
        &self.header
    }

    /// Returns `true` while the underlying reader is still held.
    pub fn is_open(&self) -> bool {
        self.blobs.is_some()
    }

    /// Number of primitive blocks decoded so far.
    pub fn blocks_decoded(&self) -> u64 {
        self.blocks
    }

    fn close(&mut self) {
        if self.blobs.take().is_some() {
            debug!("closed extract after {} blocks", self.blocks);
        }
    }

    /// Refills `pending` from the next data blob. Returns `Ok(false)` at the end of the extract.
    fn fill(&mut self) -> Result<bool> {
        let blobs = match self.blobs.as_mut() {
            Some(blobs) => blobs,
            None => return Ok(false),
        };

        while self.pending.is_empty() {
            let blob = match blobs.next() {
                Some(blob) => blob?,
                None => return Ok(false),
            };
            match blob.decode()? {
                BlobDecode::OsmData(block) => {
                    block.decode_into(&mut self.pending)?;
                    self.blocks += 1;
                    trace!(
                        "decoded block {} at offset {} ({} primitives)",
                        self.blocks,
                        blob.offset().0,
                        self.pending.len()
                    );
                }
                BlobDecode::OsmHeader(_) => {
                    return Err(new_malformed_error(MalformedInput::UnexpectedHeaderBlock))
                }
                BlobDecode::Unknown(name) => {
                    return Err(new_malformed_error(MalformedInput::UnknownBlobType(
                        name.to_string(),
                    )))
                }
            }
        }
        Ok(true)
    }
}

impl PrimitiveDecoder<BufReader<File>> {
    /// Opens the extract at `path` and validates its header block.
    ///
    /// # Errors
    /// Returns [`ErrorKind::NotFound`](crate::ErrorKind::NotFound) if the path does not resolve
    /// to a readable file, and the errors of [`PrimitiveDecoder::new`] otherwise.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        debug!("opening {}", path.as_ref().display());
        PrimitiveDecoder::from_blobs(BlobReader::from_path(path)?)
    }
}

impl<R: Read> Iterator for PrimitiveDecoder<R> {
    type Item = Result<Primitive>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(primitive) = self.pending.pop_front() {
            return Some(Ok(primitive));
        }

        match self.fill() {
            Ok(true) => self.pending.pop_front().map(Ok),
            Ok(false) => {
                self.close();
                None
            }
            Err(err) => {
                // Nothing of a failed block is handed out.
                self.pending.clear();
                self.close();
                Some(Err(err))
            }
        }
    }
}

impl<R: Read> FusedIterator for PrimitiveDecoder<R> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::primitive::PrimitiveKind;
    use crate::proto::fileformat;
    use crate::writer::{BlobEncoding, BlobWriter, BlockBuilder};
    use protobuf::Message;
    use std::io::Cursor;

    fn with_header() -> BlobWriter<Vec<u8>> {
        let mut writer = BlobWriter::new(Vec::new());
        writer
            .write_header_block(&["OsmSchema-V0.6", "DenseNodes"], BlobEncoding::Raw)
            .unwrap();
        writer
    }

    #[test]
    fn yields_blocks_in_order() {
        let mut block = BlockBuilder::new(with_header());
        block.add_point(1, 0, 0, &[]).add_path(2, &[1], &[]);
        let mut block = BlockBuilder::new(block.finish(BlobEncoding::Raw).unwrap());
        block.add_point(3, 0, 0, &[]);
        let data = block
            .finish(BlobEncoding::Zlib { level: 1 })
            .unwrap()
            .into_inner();

        let mut decoder = PrimitiveDecoder::new(Cursor::new(data)).unwrap();
        assert!(decoder
            .header()
            .writing_program()
            .unwrap()
            .starts_with("phaeton"));
        assert_eq!(decoder.blocks_decoded(), 0);

        let first = decoder.next().unwrap().unwrap();
        assert_eq!((first.kind(), first.id()), (PrimitiveKind::Point, 1));
        assert_eq!(decoder.blocks_decoded(), 1);

        let rest = decoder
            .by_ref()
            .map(|p| p.map(|p| p.id()))
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(rest, [2, 3]);
        assert_eq!(decoder.blocks_decoded(), 2);
        assert!(!decoder.is_open());
    }

    #[test]
    fn lzma_blob_is_unsupported() {
        let mut writer = with_header();

        let mut blob = fileformat::Blob::new();
        blob.set_raw_size(3);
        blob.set_lzma_data(vec![1, 2, 3]);
        let mut header = fileformat::BlobHeader::new();
        header.set_type("OSMData".to_string());
        header.set_datasize(blob.compute_size() as i32);
        writer.write_blob_raw(header, blob).unwrap();

        let mut decoder = PrimitiveDecoder::new(Cursor::new(writer.into_inner())).unwrap();
        let err = decoder.next().unwrap().unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::Unsupported(UnsupportedFormat::Compression("lzma"))
        ));
        assert!(decoder.next().is_none());
    }

    #[test]
    fn header_block_with_unknown_type_first() {
        let mut writer = BlobWriter::new(Vec::new());
        writer.write_custom_blob("OSMIndex", Vec::new()).unwrap();

        let err = PrimitiveDecoder::new(Cursor::new(writer.into_inner()))
            .err()
            .unwrap();
        assert!(matches!(
            err.kind(),
            ErrorKind::Malformed(MalformedInput::UnknownBlobType(_))
        ));
    }

    #[test]
    fn historical_extracts_are_supported() {
        let mut writer = BlobWriter::new(Vec::new());
        writer
            .write_header_block(
                &["OsmSchema-V0.6", "HistoricalInformation"],
                BlobEncoding::Zlib { level: 6 },
            )
            .unwrap();

        let mut decoder = PrimitiveDecoder::new(Cursor::new(writer.into_inner())).unwrap();
        assert!(decoder.next().is_none());
    }
}
