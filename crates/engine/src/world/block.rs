//! Map block codec.
//!
//! A serialized block is a version byte followed by one of two framings:
//! versions below 29 carry zlib-compressed node data and metadata inline with
//! uncompressed headers, while later versions compress everything after the
//! version byte as a single zstd stream. Both decode into the same
//! structure-of-arrays node buffer plus an id→name table.

use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::sync::Arc;

use flate2::bufread::ZlibDecoder;

/// Nodes per block (16³).
pub const NODE_COUNT: usize = 4096;
/// Size of the decoded node buffer: u16 ids, then param1, then param2.
pub const NODE_DATA_SIZE: usize = NODE_COUNT * 4;

const PARAM1_OFFSET: usize = NODE_COUNT * 2;
const PARAM2_OFFSET: usize = NODE_COUNT * 3;

/// Oldest format with 16-bit content ids in structure-of-arrays layout.
const MIN_SUPPORTED_VERSION: u8 = 22;
/// Adds the 2-byte `lighting_complete` header field.
const LIGHTING_COMPLETE_VERSION: u8 = 27;
/// Writes one unused byte before the static objects.
const PADDED_VERSION: u8 = 23;
/// Writes the node timer list before the static objects instead of after
/// the mapping table.
const INLINE_TIMERS_VERSION: u8 = 24;
/// Switches to a single zstd stream.
const ZSTD_VERSION: u8 = 29;

// ── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    Truncated { needed: usize, available: usize },
    Compression(String),
    UnsupportedVersion(u8),
    NodeDataSize(usize),
    InvalidName,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Truncated { needed, available } => {
                write!(f, "truncated block: needed {} bytes, {} available", needed, available)
            }
            DecodeError::Compression(msg) => write!(f, "corrupt compressed data: {}", msg),
            DecodeError::UnsupportedVersion(v) => write!(f, "unsupported block version {}", v),
            DecodeError::NodeDataSize(len) => {
                write!(f, "node data is {} bytes, expected {}", len, NODE_DATA_SIZE)
            }
            DecodeError::InvalidName => write!(f, "node name is not valid UTF-8"),
        }
    }
}

impl std::error::Error for DecodeError {}

// ── Decoded block ───────────────────────────────────────────────────────────

/// A single decoded node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Node {
    pub id: u16,
    pub param1: u8,
    pub param2: u8,
}

/// A decoded 16³ block: node buffer plus the id→name table it was saved with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapBlock {
    mappings: HashMap<u16, Arc<str>>,
    node_data: Vec<u8>,
}

impl MapBlock {
    /// A block whose nodes are all content id 0 with zeroed params.
    pub fn new<I, S>(mappings: I) -> Self
    where
        I: IntoIterator<Item = (u16, S)>,
        S: AsRef<str>,
    {
        Self {
            mappings: mappings
                .into_iter()
                .map(|(id, name)| (id, Arc::from(name.as_ref())))
                .collect(),
            node_data: vec![0; NODE_DATA_SIZE],
        }
    }

    #[inline]
    const fn index(x: usize, y: usize, z: usize) -> usize {
        z * 256 + y * 16 + x
    }

    #[inline]
    pub fn get_node(&self, x: usize, y: usize, z: usize) -> Node {
        let i = Self::index(x, y, z);
        Node {
            id: u16::from_be_bytes([self.node_data[2 * i], self.node_data[2 * i + 1]]),
            param1: self.node_data[PARAM1_OFFSET + i],
            param2: self.node_data[PARAM2_OFFSET + i],
        }
    }

    #[inline]
    pub fn get_param1(&self, x: usize, y: usize, z: usize) -> u8 {
        self.node_data[PARAM1_OFFSET + Self::index(x, y, z)]
    }

    pub fn set_node(&mut self, x: usize, y: usize, z: usize, node: Node) {
        let i = Self::index(x, y, z);
        self.node_data[2 * i..2 * i + 2].copy_from_slice(&node.id.to_be_bytes());
        self.node_data[PARAM1_OFFSET + i] = node.param1;
        self.node_data[PARAM2_OFFSET + i] = node.param2;
    }

    pub fn resolve_name(&self, id: u16) -> Option<&Arc<str>> {
        self.mappings.get(&id)
    }

    pub fn mapping_count(&self) -> usize {
        self.mappings.len()
    }
}

// ── Byte cursor ─────────────────────────────────────────────────────────────

struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let available = self.data.len() - self.pos;
        if n > available {
            return Err(DecodeError::Truncated { needed: n, available });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn skip(&mut self, n: usize) -> Result<(), DecodeError> {
        self.take(n).map(|_| ())
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16, DecodeError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    /// Inflate one zlib stream and advance past exactly the bytes it occupied.
    fn inflate(&mut self) -> Result<Vec<u8>, DecodeError> {
        let input = self.remaining();
        let mut decoder = ZlibDecoder::new(input);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| DecodeError::Compression(e.to_string()))?;
        let left = decoder.into_inner().len();
        self.pos += input.len() - left;
        Ok(out)
    }
}

// ── Decoding ────────────────────────────────────────────────────────────────

/// Decode a serialized block. Fails on any truncation, corruption or
/// unsupported version; never returns a partial block.
pub fn decode_block(data: &[u8]) -> Result<MapBlock, DecodeError> {
    let mut reader = ByteReader::new(data);
    let version = reader.read_u8()?;

    if version < MIN_SUPPORTED_VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }

    if version < ZSTD_VERSION {
        decode_legacy(version, reader)
    } else {
        decode_zstd(reader)
    }
}

fn decode_legacy(version: u8, mut reader: ByteReader<'_>) -> Result<MapBlock, DecodeError> {
    // flags
    reader.skip(1)?;
    if version >= LIGHTING_COMPLETE_VERSION {
        reader.skip(2)?;
    }
    // content width, params width
    reader.skip(2)?;

    let node_data = reader.inflate()?;
    if node_data.len() != NODE_DATA_SIZE {
        return Err(DecodeError::NodeDataSize(node_data.len()));
    }

    // Node metadata is not needed for rendering.
    reader.inflate()?;

    if version == PADDED_VERSION {
        reader.skip(1)?;
    }
    if version == INLINE_TIMERS_VERSION {
        // Timer list version 0 means no timers follow.
        if reader.read_u8()? != 0 {
            let timer_count = reader.read_u16()? as usize;
            reader.skip(timer_count * 10)?;
        }
    }

    // Static objects: version, count, then (type, x, y, z, u16-prefixed data) each.
    reader.skip(1)?;
    let object_count = reader.read_u16()?;
    for _ in 0..object_count {
        reader.skip(1 + 4 + 4 + 4)?;
        let size = reader.read_u16()? as usize;
        reader.skip(size)?;
    }

    // timestamp, name-id mapping version
    reader.skip(4 + 1)?;

    let mappings = read_mappings(&mut reader)?;
    Ok(MapBlock { mappings, node_data })
}

fn decode_zstd(reader: ByteReader<'_>) -> Result<MapBlock, DecodeError> {
    let payload =
        zstd::decode_all(reader.remaining()).map_err(|e| DecodeError::Compression(e.to_string()))?;
    let mut reader = ByteReader::new(&payload);

    // flags, lighting_complete, timestamp, mapping version
    reader.skip(1 + 2 + 4 + 1)?;
    let mappings = read_mappings(&mut reader)?;
    // content width, params width
    reader.skip(2)?;
    let node_data = reader.take(NODE_DATA_SIZE)?.to_vec();

    Ok(MapBlock { mappings, node_data })
}

fn read_mappings(reader: &mut ByteReader<'_>) -> Result<HashMap<u16, Arc<str>>, DecodeError> {
    let count = reader.read_u16()? as usize;
    let mut mappings = HashMap::with_capacity(count);
    for _ in 0..count {
        let id = reader.read_u16()?;
        let len = reader.read_u16()? as usize;
        let name = std::str::from_utf8(reader.take(len)?).map_err(|_| DecodeError::InvalidName)?;
        mappings.insert(id, Arc::from(name));
    }
    Ok(mappings)
}

// ── Encoding ────────────────────────────────────────────────────────────────

/// Serialize a block in the current (zstd) format. Used to seed test worlds
/// and in-memory backends; the on-disk trailer sections are written empty.
pub fn encode_block(block: &MapBlock) -> std::io::Result<Vec<u8>> {
    let mut payload = Vec::with_capacity(NODE_DATA_SIZE + 256);
    payload.push(0); // flags
    payload.extend_from_slice(&0xFFFFu16.to_be_bytes()); // lighting_complete
    payload.extend_from_slice(&0u32.to_be_bytes()); // timestamp
    payload.push(0); // mapping version
    write_mappings(&mut payload, &block.mappings);
    payload.extend_from_slice(&[2, 2]); // content width, params width
    payload.extend_from_slice(&block.node_data);
    payload.push(0); // metadata version
    payload.extend_from_slice(&[0, 0, 0]); // static objects: version, count
    payload.extend_from_slice(&[10, 0, 0]); // node timers: data length, count

    let mut out = vec![ZSTD_VERSION];
    out.extend(zstd::encode_all(&payload[..], 0)?);
    Ok(out)
}

fn write_mappings(out: &mut Vec<u8>, mappings: &HashMap<u16, Arc<str>>) {
    let mut entries: Vec<_> = mappings.iter().collect();
    entries.sort_by_key(|(id, _)| **id);
    out.extend_from_slice(&(entries.len() as u16).to_be_bytes());
    for (id, name) in entries {
        out.extend_from_slice(&id.to_be_bytes());
        out.extend_from_slice(&(name.len() as u16).to_be_bytes());
        out.extend_from_slice(name.as_bytes());
    }
}
