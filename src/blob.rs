//! Read and decode blobs

use crate::block::{HeaderBlock, PrimitiveBlock};
use crate::error::{
    new_error, new_malformed_error, new_protobuf_error, new_unsupported_error, ErrorKind,
    MalformedInput, Result, UnsupportedFormat,
};
use crate::proto::fileformat;
use byteorder::{BigEndian, ByteOrder};
use flate2::read::ZlibDecoder;
use log::trace;
use protobuf::Message;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Maximum allowed [`BlobHeader`](fileformat::BlobHeader) size in bytes.
pub static MAX_BLOB_HEADER_SIZE: u64 = 64 * 1024;

/// Maximum allowed uncompressed [`Blob`] content size in bytes.
pub static MAX_BLOB_MESSAGE_SIZE: u64 = 32 * 1024 * 1024;

/// The content type of a blob.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BlobType<'a> {
    /// Blob contains a [`HeaderBlock`].
    OsmHeader,
    /// Blob contains a [`PrimitiveBlock`].
    OsmData,
    /// A blob type with the given string identifier that this reader does not know.
    Unknown(&'a str),
}

impl<'a> BlobType<'a> {
    pub const fn as_str(&self) -> &'a str {
        match self {
            Self::OsmHeader => "OSMHeader",
            Self::OsmData => "OSMData",
            Self::Unknown(x) => x,
        }
    }
}

/// The decoded content of a blob (analogous to [`BlobType`]).
#[derive(Clone, Debug)]
pub enum BlobDecode<'a> {
    OsmHeader(Box<HeaderBlock>),
    OsmData(PrimitiveBlock),
    Unknown(&'a str),
}

/// The offset of a blob in bytes from stream start.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ByteOffset(pub u64);

/// A blob.
///
/// An extract consists of a sequence of blobs. The content of a blob is only decompressed and
/// parsed on [`Blob::decode`].
#[derive(Clone, Debug)]
pub struct Blob {
    header: fileformat::BlobHeader,
    blob: fileformat::Blob,
    offset: ByteOffset,
}

impl Blob {
    /// Decodes the Blob and tries to obtain the inner content. This operation might involve an
    /// expensive decompression step.
    pub fn decode(&self) -> Result<BlobDecode> {
        match self.get_type() {
            BlobType::OsmHeader => {
                let block = Box::new(self.to_headerblock()?);
                Ok(BlobDecode::OsmHeader(block))
            }
            BlobType::OsmData => {
                let block = self.to_primitiveblock()?;
                Ok(BlobDecode::OsmData(block))
            }
            BlobType::Unknown(x) => Ok(BlobDecode::Unknown(x)),
        }
    }

    /// Returns the type of a blob without decoding its content.
    pub fn get_type(&self) -> BlobType {
        match self.header.type_() {
            x if x == BlobType::OsmHeader.as_str() => BlobType::OsmHeader,
            x if x == BlobType::OsmData.as_str() => BlobType::OsmData,
            x => BlobType::Unknown(x),
        }
    }

    /// Returns the byte offset of the blob (including its length prefix) from the start of the
    /// stream.
    pub fn offset(&self) -> ByteOffset {
        self.offset
    }

    pub fn to_headerblock(&self) -> Result<HeaderBlock> {
        decode_blob(&self.blob).map(HeaderBlock::new)
    }

    pub fn to_primitiveblock(&self) -> Result<PrimitiveBlock> {
        decode_blob(&self.blob).map(PrimitiveBlock::new)
    }
}

/// A reader that splits a stream into [`Blob`]s.
///
/// Every blob is read completely before it is parsed, so a stream that ends in the middle of a
/// blob is reported as [`MalformedInput::Truncated`] instead of being silently cut short.
#[derive(Debug)]
pub struct BlobReader<R: Read> {
    reader: R,
    /// Current reader offset in bytes from the start of the stream.
    offset: u64,
    last_blob_ok: bool,
}

impl<R: Read> BlobReader<R> {
    /// Creates a new `BlobReader`.
    ///
    /// # Example
    /// ```
    /// use phaeton::*;
    ///
    /// let reader = BlobReader::new(std::io::Cursor::new(Vec::new()));
    /// assert_eq!(reader.count(), 0);
    /// ```
    pub fn new(reader: R) -> BlobReader<R> {
        BlobReader {
            reader,
            offset: 0,
            last_blob_ok: true,
        }
    }

    /// Reads the 4-byte length prefix. Returns `Ok(None)` on a clean end of stream.
    fn read_header_size(&mut self) -> Result<Option<u64>> {
        let mut buf = [0u8; 4];
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        match filled {
            0 => Ok(None),
            4 => {
                self.offset += 4;
                Ok(Some(u64::from(BigEndian::read_u32(&buf))))
            }
            _ => Err(new_malformed_error(MalformedInput::InvalidHeaderSize)),
        }
    }

    /// Reads exactly `len` bytes that are announced by the previous length field.
    fn read_announced(&mut self, len: u64) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len as usize];
        match self.reader.read_exact(&mut buf) {
            Ok(()) => {
                self.offset += len;
                Ok(buf)
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(new_malformed_error(MalformedInput::Truncated {
                    expected: len,
                    offset: self.offset,
                }))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn read_blob(&mut self) -> Result<Option<Blob>> {
        let offset = ByteOffset(self.offset);

        let header_size = match self.read_header_size()? {
            Some(size) => size,
            None => return Ok(None),
        };

        if header_size >= MAX_BLOB_HEADER_SIZE {
            return Err(new_malformed_error(MalformedInput::HeaderTooBig {
                size: header_size,
            }));
        }

        let header_bytes = self.read_announced(header_size)?;
        let header = fileformat::BlobHeader::parse_from_bytes(&header_bytes)
            .map_err(|e| new_protobuf_error(e, "blob header"))?;

        let datasize = u64::try_from(header.datasize()).map_err(|_| {
            new_malformed_error(MalformedInput::InvalidBlobSize {
                size: header.datasize(),
            })
        })?;
        if datasize >= MAX_BLOB_MESSAGE_SIZE {
            return Err(new_malformed_error(MalformedInput::MessageTooBig {
                size: datasize,
            }));
        }

        let blob_bytes = self.read_announced(datasize)?;
        let blob = fileformat::Blob::parse_from_bytes(&blob_bytes)
            .map_err(|e| new_protobuf_error(e, "blob content"))?;

        trace!(
            "read {} blob at offset {} ({} bytes)",
            header.type_(),
            offset.0,
            datasize
        );

        Ok(Some(Blob {
            header,
            blob,
            offset,
        }))
    }
}

impl BlobReader<BufReader<File>> {
    /// Tries to open the file at the given path and constructs a `BlobReader` from this.
    ///
    /// # Errors
    /// Returns [`ErrorKind::NotFound`] if the path cannot be opened or is not a regular file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let not_found = |err: io::Error| {
            new_error(ErrorKind::NotFound {
                path: path.to_path_buf(),
                err,
            })
        };

        let f = File::open(path).map_err(not_found)?;
        if !f.metadata().map_err(not_found)?.is_file() {
            return Err(not_found(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a regular file",
            )));
        }

        Ok(BlobReader::new(BufReader::new(f)))
    }
}

impl<R: Read> Iterator for BlobReader<R> {
    type Item = Result<Blob>;

    fn next(&mut self) -> Option<Self::Item> {
        // Stop iteration if there was an error.
        if !self.last_blob_ok {
            return None;
        }

        match self.read_blob() {
            Ok(Some(blob)) => Some(Ok(blob)),
            Ok(None) => {
                self.last_blob_ok = false;
                None
            }
            Err(err) => {
                self.last_blob_ok = false;
                Some(Err(err))
            }
        }
    }
}

impl<R: Read> std::iter::FusedIterator for BlobReader<R> {}

pub(crate) fn decode_blob<T: Message>(blob: &fileformat::Blob) -> Result<T> {
    let data = if blob.has_raw() {
        let size = blob.raw().len() as u64;
        if size >= MAX_BLOB_MESSAGE_SIZE {
            return Err(new_malformed_error(MalformedInput::MessageTooBig { size }));
        }
        blob.raw().to_vec()
    } else if blob.has_zlib_data() {
        let mut data = Vec::new();
        ZlibDecoder::new(blob.zlib_data())
            .take(MAX_BLOB_MESSAGE_SIZE)
            .read_to_end(&mut data)
            .map_err(|e| new_malformed_error(MalformedInput::Decompression(e)))?;
        if data.len() as u64 >= MAX_BLOB_MESSAGE_SIZE {
            return Err(new_malformed_error(MalformedInput::MessageTooBig {
                size: data.len() as u64,
            }));
        }
        data
    } else if blob.has_lzma_data() {
        return Err(new_unsupported_error(UnsupportedFormat::Compression("lzma")));
    } else if blob.has_lz4_data() {
        return Err(new_unsupported_error(UnsupportedFormat::Compression("lz4")));
    } else if blob.has_zstd_data() {
        return Err(new_unsupported_error(UnsupportedFormat::Compression("zstd")));
    } else if blob.data.is_some() {
        return Err(new_unsupported_error(UnsupportedFormat::Compression("bzip2")));
    } else {
        return Err(new_malformed_error(MalformedInput::EmptyBlob));
    };

    if blob.has_raw_size() {
        let expected = blob.raw_size() as u64;
        let actual = data.len() as u64;
        if expected != actual {
            return Err(new_malformed_error(MalformedInput::RawSizeMismatch {
                expected,
                actual,
            }));
        }
    }

    T::parse_from_bytes(&data).map_err(|e| new_protobuf_error(e, "blob data"))
}
