//! Encode and write blobs and blocks

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::Write;

use byteorder::WriteBytesExt;
use flate2::{write::ZlibEncoder, Compression};
use protobuf::{EnumOrUnknown, Message};

use crate::blob::{BlobType, MAX_BLOB_HEADER_SIZE, MAX_BLOB_MESSAGE_SIZE};
use crate::error::{new_malformed_error, new_protobuf_error, MalformedInput, Result};
use crate::primitive::{Member, PrimitiveKind, Tag};
use crate::proto::{fileformat, osmformat};

/// Granularity of coordinates written by [`BlockBuilder`], in nanodegrees.
pub const GRANULARITY: i32 = 100;

/// How block data is stored in a blob.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BlobEncoding {
    /// Block is stored uncompressed in blob
    Raw,
    /// Block data is stored zlib-compressed with the specified compression level (0-9):
    ///
    /// * 0 - no compression (might actually increase size -> use `Raw` instead)
    /// * 1 - fast
    /// * 6 - A common default value
    /// * 9 - best compression, but slower
    Zlib { level: u32 },
}

/// A writer for extracts that allows writing blobs.
#[derive(Clone, Debug)]
pub struct BlobWriter<W: Write> {
    writer: W,
}

impl<W: Write> BlobWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    pub(crate) fn write_blob_raw(
        &mut self,
        header: fileformat::BlobHeader,
        blob: fileformat::Blob,
    ) -> Result<()> {
        let header_size = header.compute_size();

        if header_size >= MAX_BLOB_HEADER_SIZE {
            return Err(new_malformed_error(MalformedInput::HeaderTooBig {
                size: header_size,
            }));
        }

        let header_bytes = header
            .write_to_bytes()
            .map_err(|e| new_protobuf_error(e, "writing blob header"))?;
        let blob_bytes = blob
            .write_to_bytes()
            .map_err(|e| new_protobuf_error(e, "writing blob"))?;

        self.writer
            .write_u32::<byteorder::BigEndian>(header_bytes.len() as u32)?;
        self.writer.write_all(&header_bytes)?;
        self.writer.write_all(&blob_bytes)?;

        Ok(())
    }

    /// Create Blob from raw (uncompressed) encoded block data
    fn encode_block_data(block_data: Vec<u8>, encoding: BlobEncoding) -> Result<fileformat::Blob> {
        if block_data.len() as u64 >= MAX_BLOB_MESSAGE_SIZE {
            return Err(new_malformed_error(MalformedInput::MessageTooBig {
                size: block_data.len() as u64,
            }));
        }

        let mut blob = fileformat::Blob::new();

        match encoding {
            BlobEncoding::Raw => {
                blob.set_raw(block_data);
            }
            BlobEncoding::Zlib { level } => {
                blob.set_raw_size(block_data.len() as i32);
                let mut encoder = ZlibEncoder::new(vec![], Compression::new(level.min(9)));
                encoder.write_all(&block_data)?;
                blob.set_zlib_data(encoder.finish()?);
            }
        }

        Ok(blob)
    }

    fn write_blob_data(&mut self, blob_type: &str, blob: fileformat::Blob) -> Result<()> {
        let mut header = fileformat::BlobHeader::new();
        header.set_datasize(blob.compute_size() as i32);
        header.set_type(blob_type.to_string());

        self.write_blob_raw(header, blob)
    }

    fn write_block_message<M: Message>(
        &mut self,
        block: &M,
        blob_type: BlobType,
        encoding: BlobEncoding,
        error_string: &'static str,
    ) -> Result<()> {
        let block_data = block
            .write_to_bytes()
            .map_err(|e| new_protobuf_error(e, error_string))?;
        let blob = Self::encode_block_data(block_data, encoding)?;
        self.write_blob_data(blob_type.as_str(), blob)
    }

    /// Write a header blob that lists the given required features.
    ///
    /// The first blob of a `*.osm.pbf` file has to be a header block.
    pub fn write_header_block(
        &mut self,
        required_features: &[&str],
        encoding: BlobEncoding,
    ) -> Result<()> {
        let mut header = osmformat::HeaderBlock::new();
        header.required_features = required_features.iter().map(|f| f.to_string()).collect();
        header.set_writingprogram(format!("phaeton {}", env!("CARGO_PKG_VERSION")));

        self.write_block_message(
            &header,
            BlobType::OsmHeader,
            encoding,
            "writing header block",
        )
    }

    /// Write a blob of an arbitrary type whose raw content is `data`.
    pub fn write_custom_blob(&mut self, blob_type: &str, data: Vec<u8>) -> Result<()> {
        let blob = Self::encode_block_data(data, BlobEncoding::Raw)?;
        self.write_blob_data(blob_type, blob)
    }
}

/// The kind of primitives held by the group that is currently filled.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum OpenGroup {
    Dense,
    Ways,
    Relations,
}

/// A builder for primitive blocks.
///
/// Consecutive primitives of the same kind share a group; a change of kind starts a new group, so
/// the file order of primitives is the order in which they were added. Points are stored as dense
/// nodes.
pub struct BlockBuilder<W: Write> {
    blob_writer: BlobWriter<W>,
    block: osmformat::PrimitiveBlock,
    string_map: HashMap<String, usize>,
    open: Option<OpenGroup>,
    // last dense node values, for delta encoding
    last_id: i64,
    last_lat: i64,
    last_lon: i64,
}

impl<W: Write> BlockBuilder<W> {
    pub fn new(blob_writer: BlobWriter<W>) -> Self {
        let mut block = osmformat::PrimitiveBlock::new();
        // first element should be blank
        block.stringtable.mut_or_insert_default().s = vec![vec![]];
        block.set_granularity(GRANULARITY);
        Self {
            blob_writer,
            block,
            string_map: HashMap::new(),
            open: None,
            last_id: 0,
            last_lat: 0,
            last_lon: 0,
        }
    }

    /// Given a string return its index from the string table.
    /// If the string is not yet included, it will be inserted.
    pub(crate) fn add_string_table_entry(&mut self, entry: &str) -> usize {
        match self.string_map.entry(entry.to_string()) {
            Entry::Occupied(occ) => *occ.get(),
            Entry::Vacant(vac) => {
                let st = &mut self.block.stringtable.mut_or_insert_default().s;
                st.push(entry.as_bytes().to_vec());
                *vac.insert(st.len() - 1)
            }
        }
    }

    fn tag_indices(&mut self, tags: &[Tag]) -> (Vec<u32>, Vec<u32>) {
        tags.iter()
            .map(|tag| {
                (
                    self.add_string_table_entry(&tag.key) as u32,
                    self.add_string_table_entry(&tag.value) as u32,
                )
            })
            .unzip()
    }

    fn group(&mut self, kind: OpenGroup) -> &mut osmformat::PrimitiveGroup {
        if self.open != Some(kind) {
            self.open = Some(kind);
            self.last_id = 0;
            self.last_lat = 0;
            self.last_lon = 0;
            self.block
                .primitivegroup
                .push(osmformat::PrimitiveGroup::new());
        }
        let groups = &mut self.block.primitivegroup;
        let last = groups.len() - 1;
        &mut groups[last]
    }

    /// Adds a point. Coordinates are in nanodegrees and are truncated to [`GRANULARITY`].
    pub fn add_point(&mut self, id: u64, nano_lat: i64, nano_lon: i64, tags: &[Tag]) -> &mut Self {
        let (keys, vals) = self.tag_indices(tags);
        let lat = nano_lat / i64::from(GRANULARITY);
        let lon = nano_lon / i64::from(GRANULARITY);
        let id = id as i64;

        // The group is opened first because it resets the delta state.
        self.group(OpenGroup::Dense);
        let (did, dlat, dlon) = (id - self.last_id, lat - self.last_lat, lon - self.last_lon);
        self.last_id = id;
        self.last_lat = lat;
        self.last_lon = lon;

        let dense = self.group(OpenGroup::Dense).dense.mut_or_insert_default();
        dense.id.push(did);
        dense.lat.push(dlat);
        dense.lon.push(dlon);
        for (k, v) in keys.into_iter().zip(vals) {
            dense.keys_vals.push(k as i32);
            dense.keys_vals.push(v as i32);
        }
        dense.keys_vals.push(0);
        self
    }

    /// Adds a path that references the given point ids in order.
    pub fn add_path(&mut self, id: u64, refs: &[u64], tags: &[Tag]) -> &mut Self {
        let (keys, vals) = self.tag_indices(tags);

        let mut way = osmformat::Way::new();
        way.set_id(id as i64);
        way.keys = keys;
        way.vals = vals;
        let mut last = 0_i64;
        way.refs = refs
            .iter()
            .map(|&r| {
                let delta = r as i64 - last;
                last = r as i64;
                delta
            })
            .collect();

        self.group(OpenGroup::Ways).ways.push(way);
        self
    }

    pub fn add_relation(&mut self, id: u64, members: &[Member], tags: &[Tag]) -> &mut Self {
        use osmformat::relation::MemberType;

        let (keys, vals) = self.tag_indices(tags);

        let mut rel = osmformat::Relation::new();
        rel.set_id(id as i64);
        rel.keys = keys;
        rel.vals = vals;
        let mut last = 0_i64;
        for member in members {
            rel.roles_sid
                .push(self.add_string_table_entry(&member.role) as i32);
            rel.memids.push(member.id as i64 - last);
            last = member.id as i64;
            rel.types.push(EnumOrUnknown::new(match member.kind {
                PrimitiveKind::Point => MemberType::NODE,
                PrimitiveKind::Path => MemberType::WAY,
                PrimitiveKind::Relation => MemberType::RELATION,
            }));
        }

        self.group(OpenGroup::Relations).relations.push(rel);
        self
    }

    /// Writes the block as one blob and returns the blob writer for further blocks.
    pub fn finish(mut self, encoding: BlobEncoding) -> Result<BlobWriter<W>> {
        self.blob_writer.write_block_message(
            &self.block,
            BlobType::OsmData,
            encoding,
            "writing primitive block",
        )?;
        Ok(self.blob_writer)
    }
}
