//! Cross-Reference Index
//!
//! The in-memory object index, the ordered offset set used to bound object
//! sizes, the trailer history, and the loader for classical textual xref
//! sections (ISO 32000-1 Section 7.5.4).

use std::collections::HashSet;
use std::io::{Read, Seek};

use super::objects::{PdfDictionary, PdfObject};
use super::reader::PdfParser;
use super::syntax::parse_int;

/// Object numbers at or above this value are rejected outright
pub(crate) const MAX_OBJECT_NUMBER: u32 = 0x0100_0000;

/// Upper bound applied to a trailer /Size before shrinking the index.
/// Theoretical limits are higher, but this is large enough in practice.
pub(crate) const MAX_XREF_SIZE: i64 = 1_048_576;

/// Fixed width of a textual xref record
const RECORD_SIZE: usize = 20;

/// Records read per block
const RECORDS_PER_BLOCK: usize = 1024;

/// How an object number maps onto the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// Released entry, or never populated
    Free,
    /// Plain indirect object at a byte offset
    Direct,
    /// Object packed inside an object-stream container
    Compressed,
    /// Container of compressed objects; its bytes are not indexed directly
    Null,
}

/// One object location record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectLocation {
    pub kind: ObjectKind,
    /// Direct/Null: byte position of the object header. Compressed: object
    /// number of the enclosing container stream.
    pub offset: u64,
    /// Direct/Free: generation number. Compressed: index hint within the
    /// container; the container's own header is authoritative.
    pub gen: u16,
    /// For a Compressed entry, the container object number it points at
    pub archive_obj_num: u32,
}

impl ObjectLocation {
    /// A released entry
    pub fn free() -> Self {
        Self {
            kind: ObjectKind::Free,
            offset: 0,
            gen: 0,
            archive_obj_num: 0,
        }
    }

    /// A plain indirect object at `offset`
    pub fn direct(offset: u64, gen: u16) -> Self {
        Self {
            kind: ObjectKind::Direct,
            offset,
            gen,
            archive_obj_num: 0,
        }
    }
}

/// Mapping from object number to location record, ordered by object number
#[derive(Debug, Default)]
pub struct ObjectIndex {
    entries: std::collections::BTreeMap<u32, ObjectLocation>,
}

impl ObjectIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Largest known object number, or 0
    pub fn last_obj_num(&self) -> u32 {
        self.entries.keys().next_back().copied().unwrap_or(0)
    }

    pub fn get(&self, objnum: u32) -> Option<&ObjectLocation> {
        self.entries.get(&objnum)
    }

    pub fn get_mut(&mut self, objnum: u32) -> Option<&mut ObjectLocation> {
        self.entries.get_mut(&objnum)
    }

    /// Record for `objnum`, inserting a Free placeholder when absent
    pub fn entry_mut(&mut self, objnum: u32) -> &mut ObjectLocation {
        self.entries.entry(objnum).or_insert_with(ObjectLocation::free)
    }

    pub fn insert(&mut self, objnum: u32, location: ObjectLocation) {
        self.entries.insert(objnum, location);
    }

    /// Kind for `objnum`; absent entries read as Free
    pub fn kind(&self, objnum: u32) -> ObjectKind {
        self.entries.get(&objnum).map(|e| e.kind).unwrap_or(ObjectKind::Free)
    }

    /// Offset for `objnum`, or 0
    pub fn offset_or_zero(&self, objnum: u32) -> u64 {
        self.entries.get(&objnum).map(|e| e.offset).unwrap_or(0)
    }

    /// Erase all entries with object number >= `size`. A Free placeholder
    /// at `size - 1` keeps the largest key stable afterwards.
    pub fn shrink_to(&mut self, size: u32) {
        if size == 0 {
            self.entries.clear();
            return;
        }
        self.entries.split_off(&size);
        self.entries.entry(size - 1).or_insert_with(ObjectLocation::free);
    }

    /// Re-tag every entry as Free, keeping offsets in place
    pub fn mark_all_free(&mut self) {
        for location in self.entries.values_mut() {
            location.kind = ObjectKind::Free;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u32, &ObjectLocation)> {
        self.entries.iter()
    }
}

/// Ordered set of meaningful byte offsets: object headers, xref keywords,
/// xref-stream headers, trailers. Its one job is bounding the object that
/// starts at a given offset.
#[derive(Debug, Default)]
pub struct OffsetSet {
    offsets: std::collections::BTreeSet<u64>,
}

impl OffsetSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.offsets.clear();
    }

    pub fn insert(&mut self, offset: u64) {
        self.offsets.insert(offset);
    }

    pub fn contains(&self, offset: u64) -> bool {
        self.offsets.contains(&offset)
    }

    /// Smallest member strictly greater than `offset`
    pub fn next_after(&self, offset: u64) -> Option<u64> {
        use std::ops::Bound::{Excluded, Unbounded};
        self.offsets.range((Excluded(offset), Unbounded)).next().copied()
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Trailer history across incremental updates, newest last
#[derive(Debug, Default)]
pub struct TrailerStack {
    trailers: Vec<PdfDictionary>,
}

impl TrailerStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.trailers.clear();
    }

    pub fn len(&self) -> usize {
        self.trailers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trailers.is_empty()
    }

    /// Record the trailer of the newest revision seen so far
    pub fn push_newest(&mut self, trailer: PdfDictionary) {
        self.trailers.push(trailer);
    }

    /// Record the trailer of an older revision discovered while chasing
    /// /Prev
    pub fn push_older(&mut self, trailer: PdfDictionary) {
        self.trailers.insert(0, trailer);
    }

    /// The current trailer: the newest one
    pub fn current(&self) -> Option<&PdfDictionary> {
        self.trailers.last()
    }

    pub fn current_mut(&mut self) -> Option<&mut PdfDictionary> {
        self.trailers.last_mut()
    }

    /// Walk trailers newest first
    pub fn iter_newest_first(&self) -> impl Iterator<Item = &PdfDictionary> {
        self.trailers.iter().rev()
    }
}

impl<R: Read + Seek> PdfParser<R> {
    /// Load the full chain of textual xref sections starting at `xrefpos`.
    ///
    /// The chain is assembled newest-first while chasing /Prev, then
    /// replayed oldest to newest so that later revisions overwrite earlier
    /// ones.
    pub(crate) fn load_all_cross_ref_v4(&mut self, xrefpos: u64) -> bool {
        if !self.load_cross_ref_v4(xrefpos, 0, true) {
            return false;
        }
        let trailer = match self.load_trailer_v4() {
            Some(trailer) => trailer,
            None => return false,
        };
        self.trailers.push_newest(trailer);

        let xrefsize = self
            .trailers
            .current()
            .map(|t| t.get_direct_int("Size"))
            .unwrap_or(0);
        if xrefsize > 0 && xrefsize <= MAX_XREF_SIZE {
            self.shrink_object_map(xrefsize as u32);
        }

        let mut cross_ref_list = vec![xrefpos];
        let mut xref_stream_list = vec![self
            .trailers
            .current()
            .map(|t| t.get_direct_int("XRefStm").max(0) as u64)
            .unwrap_or(0)];
        let mut seen_xrefpos = HashSet::new();
        seen_xrefpos.insert(xrefpos);

        let mut prev = self
            .trailers
            .current()
            .map(|t| t.get_direct_int("Prev"))
            .unwrap_or(0);
        while prev > 0 {
            let prev_pos = prev as u64;
            if seen_xrefpos.contains(&prev_pos) {
                return false;
            }
            seen_xrefpos.insert(prev_pos);

            cross_ref_list.insert(0, prev_pos);
            self.load_cross_ref_v4(prev_pos, 0, true);

            let dict = match self.load_trailer_v4() {
                Some(dict) => dict,
                None => return false,
            };
            prev = dict.get_direct_int("Prev");
            xref_stream_list.insert(0, dict.get_direct_int("XRefStm").max(0) as u64);
            self.trailers.push_older(dict);
        }

        for i in 0..cross_ref_list.len() {
            if !self.load_cross_ref_v4(cross_ref_list[i], xref_stream_list[i], false) {
                return false;
            }
            if i == 0 && !self.verify_cross_ref_v4() {
                return false;
            }
        }

        // /Size is an upper bound on object numbers; entries the replay
        // brought back above it are dropped again
        if xrefsize > 0 && xrefsize <= MAX_XREF_SIZE {
            self.shrink_object_map(xrefsize as u32);
        }
        true
    }

    /// Like [`Self::load_all_cross_ref_v4`], but the newest section was
    /// already consumed during the linearized first-page load; it is read
    /// headerless with a remembered record count.
    pub(crate) fn load_linearized_all_cross_ref_v4(
        &mut self,
        xrefpos: u64,
        obj_count: u32,
    ) -> bool {
        if !self.load_linearized_cross_ref_v4(xrefpos, obj_count) {
            return false;
        }
        let trailer = match self.load_trailer_v4() {
            Some(trailer) => trailer,
            None => return false,
        };
        self.trailers.push_newest(trailer);

        let xrefsize = self
            .trailers
            .current()
            .map(|t| t.get_direct_int("Size"))
            .unwrap_or(0);
        if xrefsize == 0 {
            return false;
        }

        let mut cross_ref_list = vec![xrefpos];
        let mut xref_stream_list = vec![self
            .trailers
            .current()
            .map(|t| t.get_direct_int("XRefStm").max(0) as u64)
            .unwrap_or(0)];
        let mut seen_xrefpos = HashSet::new();
        seen_xrefpos.insert(xrefpos);

        let mut prev = self
            .trailers
            .current()
            .map(|t| t.get_direct_int("Prev"))
            .unwrap_or(0);
        while prev > 0 {
            let prev_pos = prev as u64;
            if seen_xrefpos.contains(&prev_pos) {
                return false;
            }
            seen_xrefpos.insert(prev_pos);

            cross_ref_list.insert(0, prev_pos);
            self.load_cross_ref_v4(prev_pos, 0, true);

            let dict = match self.load_trailer_v4() {
                Some(dict) => dict,
                None => return false,
            };
            prev = dict.get_direct_int("Prev");
            xref_stream_list.insert(0, dict.get_direct_int("XRefStm").max(0) as u64);
            self.trailers.push_older(dict);
        }

        for i in 1..cross_ref_list.len() {
            if !self.load_cross_ref_v4(cross_ref_list[i], xref_stream_list[i], false) {
                return false;
            }
        }
        true
    }

    /// Read `obj_count` fixed-width records at `pos` without a section
    /// header, numbering objects from zero.
    fn load_linearized_cross_ref_v4(&mut self, pos: u64, obj_count: u32) -> bool {
        self.syntax.seek(pos);
        self.offsets.insert(pos);
        let records_start = self.syntax.pos();

        let count = obj_count as usize;
        let mut buf = vec![0u8; RECORDS_PER_BLOCK * RECORD_SIZE];
        let blocks = count / RECORDS_PER_BLOCK + 1;
        for block in 0..blocks {
            let block_size = if block == blocks - 1 {
                count % RECORDS_PER_BLOCK
            } else {
                RECORDS_PER_BLOCK
            };
            if block_size == 0 {
                continue;
            }
            let read_len = block_size * RECORD_SIZE;
            if self.syntax.read_block(&mut buf[..read_len]).is_err() {
                return false;
            }
            for i in 0..block_size {
                let objnum = (block * RECORDS_PER_BLOCK + i) as u32;
                if !self.apply_v4_record(objnum, &buf[i * RECORD_SIZE..(i + 1) * RECORD_SIZE]) {
                    return false;
                }
            }
        }
        self.syntax
            .seek(records_start + (count * RECORD_SIZE) as u64);
        true
    }

    /// Load one textual xref section at `pos`. With `skip` the records are
    /// stepped over without populating the index (chain-assembly pass).
    /// A nonzero `streampos` names a hybrid-file xref stream whose entries
    /// supplement, but never override, the textual ones.
    pub(crate) fn load_cross_ref_v4(&mut self, pos: u64, streampos: u64, skip: bool) -> bool {
        self.syntax.seek(pos);
        if self.syntax.next_keyword() != b"xref" {
            return false;
        }
        self.offsets.insert(pos);
        if streampos != 0 {
            self.offsets.insert(streampos);
        }

        loop {
            let saved = self.syntax.pos();
            let (word, is_number) = self.syntax.next_word();
            if word.is_empty() {
                return false;
            }
            if !is_number {
                self.syntax.seek(saved);
                break;
            }

            let start_objnum = parse_int(&word);
            if start_objnum < 0 || start_objnum >= MAX_OBJECT_NUMBER as i64 {
                return false;
            }
            let start_objnum = start_objnum as u32;

            let count = self.syntax.direct_num() as usize;
            self.syntax.skip_whitespace();
            let records_start = self.syntax.pos();

            let section_len = match (count as u64).checked_mul(RECORD_SIZE as u64) {
                Some(len) => len,
                None => return false,
            };

            self.xref_start_obj_num = start_objnum;
            if !skip {
                let mut buf = vec![0u8; RECORDS_PER_BLOCK * RECORD_SIZE];
                let blocks = count / RECORDS_PER_BLOCK + 1;
                for block in 0..blocks {
                    let block_size = if block == blocks - 1 {
                        count % RECORDS_PER_BLOCK
                    } else {
                        RECORDS_PER_BLOCK
                    };
                    if block_size == 0 {
                        continue;
                    }
                    let read_len = block_size * RECORD_SIZE;
                    if self.syntax.read_block(&mut buf[..read_len]).is_err() {
                        return false;
                    }
                    for i in 0..block_size {
                        let objnum = start_objnum + (block * RECORDS_PER_BLOCK + i) as u32;
                        if !self
                            .apply_v4_record(objnum, &buf[i * RECORD_SIZE..(i + 1) * RECORD_SIZE])
                        {
                            return false;
                        }
                    }
                }
            }
            match records_start.checked_add(section_len) {
                Some(next) => self.syntax.seek(next),
                None => return false,
            }
        }

        if streampos == 0 {
            return true;
        }
        let mut spos = streampos;
        self.load_cross_ref_v5(&mut spos, false)
    }

    /// Decode one 20-byte record into the index
    fn apply_v4_record(&mut self, objnum: u32, entry: &[u8]) -> bool {
        if entry[17] == b'f' {
            self.index.insert(objnum, ObjectLocation::free());
            return true;
        }

        let offset = parse_int(&entry[..10]);
        if offset == 0 {
            // A zero offset is tolerated only when the field is well-formed
            for &byte in &entry[..10] {
                if !byte.is_ascii_digit() {
                    return false;
                }
            }
        }

        let gen = parse_int(&entry[11..16]).clamp(0, u16::MAX as i64) as u16;
        if gen >= 1 {
            self.version_updated = true;
        }

        let offset = offset.max(0) as u64;
        if offset < self.syntax.file_len() {
            self.offsets.insert(offset);
        }
        self.index.insert(objnum, ObjectLocation::direct(offset, gen));
        true
    }

    /// Parse the trailer dictionary following the last subsection
    pub(crate) fn load_trailer_v4(&mut self) -> Option<PdfDictionary> {
        if self.syntax.next_keyword() != b"trailer" {
            return None;
        }
        match self.syntax.parse_object(0, 0) {
            Ok(PdfObject::Dictionary(dict)) => Some(dict),
            _ => None,
        }
    }

    /// Probe the first indexed object against the bytes it claims to live
    /// at. Tables whose object numbers are shifted (a known corruption
    /// pattern) fail this check and push the orchestrator into rebuild.
    pub(crate) fn verify_cross_ref_v4(&mut self) -> bool {
        for (objnum, location) in self.index.iter() {
            if location.offset == 0 || location.kind != ObjectKind::Direct {
                continue;
            }
            let saved = self.syntax.pos();
            self.syntax.seek(location.offset);
            let (word, is_number) = self.syntax.next_word();
            self.syntax.seek(saved);
            return is_number && !word.is_empty() && parse_int(&word) == *objnum as i64;
        }
        true
    }

    /// Drop every index entry with object number >= `size`
    pub fn shrink_object_map(&mut self, size: u32) {
        self.index.shrink_to(size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::objects::PdfObject;

    #[test]
    fn test_object_index_last_obj_num() {
        let mut index = ObjectIndex::new();
        assert_eq!(index.last_obj_num(), 0);

        index.insert(3, ObjectLocation::direct(100, 0));
        index.insert(7, ObjectLocation::direct(200, 0));
        index.insert(5, ObjectLocation::free());
        assert_eq!(index.last_obj_num(), 7);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_object_index_kind_defaults_to_free() {
        let index = ObjectIndex::new();
        assert_eq!(index.kind(42), ObjectKind::Free);
        assert_eq!(index.offset_or_zero(42), 0);
    }

    #[test]
    fn test_shrink_keeps_placeholder() {
        let mut index = ObjectIndex::new();
        for i in 1..10 {
            index.insert(i, ObjectLocation::direct(i as u64 * 10, 0));
        }
        index.shrink_to(5);

        assert_eq!(index.last_obj_num(), 4);
        assert!(index.get(5).is_none());
        assert!(index.get(9).is_none());
        // Existing entry at size-1 is left alone
        assert_eq!(index.kind(4), ObjectKind::Direct);

        // When size-1 was absent, a Free placeholder appears
        let mut index = ObjectIndex::new();
        index.insert(1, ObjectLocation::direct(10, 0));
        index.shrink_to(8);
        assert_eq!(index.last_obj_num(), 7);
        assert_eq!(index.kind(7), ObjectKind::Free);
    }

    #[test]
    fn test_shrink_to_zero_clears() {
        let mut index = ObjectIndex::new();
        index.insert(1, ObjectLocation::direct(10, 0));
        index.shrink_to(0);
        assert!(index.is_empty());
    }

    #[test]
    fn test_mark_all_free_keeps_offsets() {
        let mut index = ObjectIndex::new();
        index.insert(1, ObjectLocation::direct(10, 2));
        index.mark_all_free();
        let location = index.get(1).unwrap();
        assert_eq!(location.kind, ObjectKind::Free);
        assert_eq!(location.offset, 10);
    }

    #[test]
    fn test_offset_set_next_after() {
        let mut offsets = OffsetSet::new();
        offsets.insert(10);
        offsets.insert(50);
        offsets.insert(30);

        assert_eq!(offsets.next_after(10), Some(30));
        assert_eq!(offsets.next_after(9), Some(10));
        assert_eq!(offsets.next_after(30), Some(50));
        assert_eq!(offsets.next_after(50), None);
    }

    #[test]
    fn test_trailer_stack_ordering() {
        let mut stack = TrailerStack::new();
        let mut newest = PdfDictionary::new();
        newest.insert("Size".to_string(), PdfObject::Integer(10));
        let mut older = PdfDictionary::new();
        older.insert("Size".to_string(), PdfObject::Integer(5));

        stack.push_newest(newest);
        stack.push_older(older);

        assert_eq!(stack.len(), 2);
        assert_eq!(stack.current().unwrap().get_direct_int("Size"), 10);

        let sizes: Vec<i64> = stack
            .iter_newest_first()
            .map(|t| t.get_direct_int("Size"))
            .collect();
        assert_eq!(sizes, vec![10, 5]);
    }
}
