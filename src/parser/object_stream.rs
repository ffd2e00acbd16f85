//! Compressed Object Streams
//!
//! Containers holding several direct objects in one stream payload
//! (ISO 32000-1 Section 7.5.7). The payload starts with `N` pairs of
//! `(object number, relative offset)`, and the objects follow from the
//! /First byte onwards.

use std::collections::HashMap;
use std::io::Cursor;
use std::rc::Rc;

use super::objects::PdfStream;
use super::syntax::SyntaxReader;
use super::{ParseError, ParseResult};

/// A loaded container: decoded payload plus its parsed inner index.
///
/// Readers share the accessor through reference-counted handles; the cache
/// is the only writer, so a handed-out accessor is an immutable snapshot.
#[derive(Debug)]
pub struct ObjectStreamAccessor {
    data: Vec<u8>,
    first: u64,
    /// Header pairs in payload order
    pairs: Vec<(u32, u32)>,
    /// Inner object number -> relative offset; this mapping is
    /// authoritative, the index hint in the location record is not
    offsets: HashMap<u32, u32>,
}

impl ObjectStreamAccessor {
    /// Decode a container stream and parse its header pairs
    pub fn load(stream: &PdfStream) -> ParseResult<Self> {
        let n = stream.dict.get_direct_int("N");
        let first = stream.dict.get_direct_int("First");
        if n < 0 || first < 0 {
            return Err(ParseError::syntax(0, "Invalid object stream header"));
        }

        let data = stream.decode()?;

        let mut pairs = Vec::with_capacity(n as usize);
        let mut offsets = HashMap::with_capacity(n as usize);
        {
            let mut reader = SyntaxReader::new(Cursor::new(data.as_slice()), 0)?;
            for _ in 0..n {
                let objnum = reader.direct_num();
                let offset = reader.direct_num();
                pairs.push((objnum, offset));
                offsets.insert(objnum, offset);
            }
        }

        Ok(Self {
            data,
            first: first as u64,
            pairs,
            offsets,
        })
    }

    /// Decoded payload bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Offset of the first object within the payload (/First)
    pub fn first(&self) -> u64 {
        self.first
    }

    /// Number of objects the header declares
    pub fn count(&self) -> usize {
        self.pairs.len()
    }

    /// Relative offset of an inner object
    pub fn offset_of(&self, objnum: u32) -> Option<u32> {
        self.offsets.get(&objnum).copied()
    }

    /// Whether the container holds `objnum`
    pub fn contains(&self, objnum: u32) -> bool {
        self.offsets.contains_key(&objnum)
    }

    /// Byte range of an inner object within the payload, bounded by the
    /// next header pair or the payload end
    pub fn span_of(&self, objnum: u32) -> Option<(usize, usize)> {
        let position = self.pairs.iter().position(|&(num, _)| num == objnum)?;
        let start = self.first as usize + self.pairs[position].1 as usize;
        let end = match self.pairs.get(position + 1) {
            Some(&(_, next_offset)) => self.first as usize + next_offset as usize,
            None => self.data.len(),
        };
        if start > end || end > self.data.len() {
            return None;
        }
        Some((start, end))
    }
}

/// Cache of loaded containers, keyed by container object number.
///
/// Lives for the life of the parser; reloading the main xref of a
/// linearized file clears it so containers re-materialize lazily.
#[derive(Debug, Default)]
pub struct ObjectStreamCache {
    streams: HashMap<u32, Rc<ObjectStreamAccessor>>,
}

impl ObjectStreamCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, objnum: u32) -> Option<Rc<ObjectStreamAccessor>> {
        self.streams.get(&objnum).cloned()
    }

    pub fn insert(&mut self, objnum: u32, accessor: ObjectStreamAccessor) -> Rc<ObjectStreamAccessor> {
        let accessor = Rc::new(accessor);
        self.streams.insert(objnum, Rc::clone(&accessor));
        accessor
    }

    pub fn clear(&mut self) {
        self.streams.clear();
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}
