//! Top-Level Parser
//!
//! Drives a full parse: header detection, cross-reference chain loading
//! (textual or stream form) with rebuild fallback, encryption setup, and
//! random access to indirect objects afterwards.

use std::collections::HashSet;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use std::rc::Rc;

use crate::encryption::{CryptoHandler, StandardSecurityHandler};

use super::document::DocumentStore;
use super::header;
use super::linearized::LinearizedHeader;
use super::object_stream::{ObjectStreamAccessor, ObjectStreamCache};
use super::objects::{PdfArray, PdfDictionary, PdfObject};
use super::rebuild::RebuildStats;
use super::syntax::{is_whitespace, parse_int, SyntaxReader};
use super::xref::{ObjectIndex, ObjectKind, OffsetSet, TrailerStack};
use super::{ParseError, ParseResult};

/// How far back from the end of the file `startxref` may sit
const STARTXREF_SEARCH_LIMIT: u64 = 4096;

/// An indirect object together with the header it was parsed under
#[derive(Debug, Clone)]
pub struct IndirectObject {
    pub objnum: u32,
    pub gen: u16,
    pub object: PdfObject,
}

/// Cross-reference parser and indirect-object resolver
pub struct PdfParser<R> {
    pub(crate) syntax: SyntaxReader<R>,
    pub(crate) index: ObjectIndex,
    pub(crate) offsets: OffsetSet,
    pub(crate) trailers: TrailerStack,
    pub(crate) doc: DocumentStore,
    pub(crate) object_streams: ObjectStreamCache,
    security: Option<StandardSecurityHandler>,
    encrypt_dict: Option<PdfDictionary>,
    password: Vec<u8>,
    /// Object numbers currently being resolved; breaks reference cycles
    parsing: HashSet<u32>,
    file_version: u32,
    pub(crate) version_updated: bool,
    pub(crate) xref_stream: bool,
    /// Start object number of the last-read subsection; a linearized
    /// main-table reload reuses it as the record count
    pub(crate) xref_start_obj_num: u32,
    pub(crate) last_xref_offset: u64,
    pub(crate) rebuild_stats: RebuildStats,
    linearized: Option<LinearizedHeader>,
    has_parsed: bool,
    metadata_objnum: u32,
}

impl PdfParser<File> {
    /// Open a PDF file from a path
    pub fn open<P: AsRef<Path>>(path: P) -> ParseResult<Self> {
        let file = File::open(path)?;
        Self::new(file)
    }
}

impl<R: Read + Seek> PdfParser<R> {
    /// Create a parser over a seekable byte stream. The header is located
    /// immediately; everything else waits for [`Self::start_parse`].
    pub fn new(mut reader: R) -> ParseResult<Self> {
        let header = header::locate_header(&mut reader)?;
        let syntax = SyntaxReader::new(reader, header.offset)?;
        Ok(Self {
            syntax,
            index: ObjectIndex::new(),
            offsets: OffsetSet::new(),
            trailers: TrailerStack::new(),
            doc: DocumentStore::new(),
            object_streams: ObjectStreamCache::new(),
            security: None,
            encrypt_dict: None,
            password: Vec::new(),
            parsing: HashSet::new(),
            file_version: header.version,
            version_updated: false,
            xref_stream: false,
            xref_start_obj_num: 0,
            last_xref_offset: 0,
            rebuild_stats: RebuildStats::default(),
            linearized: None,
            has_parsed: false,
            metadata_objnum: 0,
        })
    }

    /// Supply the password used when the file turns out to be encrypted
    pub fn with_password(mut self, password: &str) -> Self {
        self.password = password.as_bytes().to_vec();
        self
    }

    /// Parse the file: discover the xref chain (falling back to a body
    /// scan when it is unusable), set up decryption, and load the
    /// document catalog.
    pub fn start_parse(&mut self) -> ParseResult<()> {
        if self.has_parsed {
            return Err(ParseError::InvalidStructure(
                "Parser has already run".to_string(),
            ));
        }
        self.has_parsed = true;
        self.xref_stream = false;
        self.last_xref_offset = 0;

        if self.syntax.file_len() < 9 {
            return Err(ParseError::InvalidStructure("File too short".to_string()));
        }
        self.syntax.seek(self.syntax.file_len() - 9);

        let mut rebuilt = false;
        if self
            .syntax
            .backwards_search_to_word(b"startxref", STARTXREF_SEARCH_LIMIT)?
        {
            self.offsets.insert(self.syntax.pos());
            self.syntax.next_keyword();

            let (word, is_number) = self.syntax.next_word();
            if !is_number {
                return Err(ParseError::InvalidXRef);
            }
            self.last_xref_offset = parse_int(&word).max(0) as u64;

            let last = self.last_xref_offset;
            if !self.load_all_cross_ref_v4(last) && !self.load_all_cross_ref_v5(last) {
                if !self.rebuild_cross_ref() {
                    return Err(ParseError::InvalidXRef);
                }
                rebuilt = true;
                self.last_xref_offset = 0;
            }
        } else {
            if !self.rebuild_cross_ref() {
                return Err(ParseError::InvalidXRef);
            }
            rebuilt = true;
        }

        self.set_encrypt_handler()?;
        self.load_doc();

        if self.doc.root().is_none() || self.doc.page_count() == 0 {
            if rebuilt {
                return Err(ParseError::InvalidStructure(
                    "No usable document catalog".to_string(),
                ));
            }
            self.release_encrypt_handler();
            if !self.rebuild_cross_ref() {
                return Err(ParseError::InvalidStructure(
                    "No usable document catalog".to_string(),
                ));
            }
            self.set_encrypt_handler()?;
            self.load_doc();
            if self.doc.root().is_none() {
                return Err(ParseError::InvalidStructure(
                    "No usable document catalog".to_string(),
                ));
            }
        }

        if self.root_obj_num() == 0 {
            self.release_encrypt_handler();
            if !self.rebuild_cross_ref() || self.root_obj_num() == 0 {
                return Err(ParseError::InvalidStructure(
                    "No usable document catalog".to_string(),
                ));
            }
            self.set_encrypt_handler()?;
            self.load_doc();
        }

        self.register_metadata_bypass();
        Ok(())
    }

    /// Parse a linearized file: the first-page xref is loaded up front,
    /// the main table later via
    /// [`Self::load_linearized_main_xref_table`]. Falls back to
    /// [`Self::start_parse`] when the file is not actually linearized.
    pub fn start_linearized_parse(&mut self) -> ParseResult<()> {
        if self.has_parsed {
            return Err(ParseError::InvalidStructure(
                "Parser has already run".to_string(),
            ));
        }
        if !self.is_linearized_file() {
            return self.start_parse();
        }
        self.has_parsed = true;
        self.xref_stream = false;

        let first_xref_offset = self.syntax.pos();
        let mut rebuilt = false;
        let loaded_v4 = self.load_cross_ref_v4(first_xref_offset, 0, false);
        if !loaded_v4 {
            let mut pos = first_xref_offset;
            if !self.load_cross_ref_v5(&mut pos, true) {
                if !self.rebuild_cross_ref() {
                    return Err(ParseError::InvalidXRef);
                }
                rebuilt = true;
                self.last_xref_offset = 0;
            }
        }

        if loaded_v4 {
            let trailer = match self.load_trailer_v4() {
                Some(trailer) => trailer,
                None => return Ok(()),
            };
            self.trailers.push_newest(trailer);

            let xrefsize = self
                .trailers
                .current()
                .map(|t| t.get_direct_int("Size"))
                .unwrap_or(0);
            if xrefsize > 0 {
                self.shrink_object_map(xrefsize.clamp(0, u32::MAX as i64) as u32);
            }
        }

        self.set_encrypt_handler()?;
        self.load_doc();

        if self.doc.root().is_none() || self.doc.page_count() == 0 {
            if rebuilt {
                return Err(ParseError::InvalidStructure(
                    "No usable document catalog".to_string(),
                ));
            }
            self.release_encrypt_handler();
            if !self.rebuild_cross_ref() {
                return Err(ParseError::InvalidStructure(
                    "No usable document catalog".to_string(),
                ));
            }
            self.set_encrypt_handler()?;
            self.load_doc();
            if self.doc.root().is_none() {
                return Err(ParseError::InvalidStructure(
                    "No usable document catalog".to_string(),
                ));
            }
        }

        if self.root_obj_num() == 0 {
            self.release_encrypt_handler();
            if !self.rebuild_cross_ref() || self.root_obj_num() == 0 {
                return Err(ParseError::InvalidStructure(
                    "No usable document catalog".to_string(),
                ));
            }
            self.set_encrypt_handler()?;
            self.load_doc();
        }

        self.register_metadata_bypass();
        Ok(())
    }

    /// Second phase of a linearized parse: load the main cross-reference
    /// table named by the linearization dictionary's /T entry.
    pub fn load_linearized_main_xref_table(&mut self) -> ParseResult<()> {
        if self.last_xref_offset == 0 {
            return Err(ParseError::InvalidXRef);
        }

        // The chain is re-read from raw bytes; suspend the metadata bypass
        let metadata_objnum = self.metadata_objnum;
        if metadata_objnum != 0 {
            self.syntax.remove_decrypt_bypass(metadata_objnum);
        }

        // /T may point at whitespace preceding the first record
        self.syntax.seek(self.last_xref_offset);
        let mut skipped = 0u64;
        loop {
            let pos = self.syntax.pos();
            match self.syntax.char_at(pos) {
                Ok(byte) if is_whitespace(byte) => {
                    self.syntax.seek(pos + 1);
                    skipped += 1;
                }
                _ => break,
            }
        }
        self.last_xref_offset += skipped;

        // Containers must re-materialize against the new index
        self.object_streams.clear();

        let offset = self.last_xref_offset;
        let obj_count = self.xref_start_obj_num;
        let loaded = self.load_linearized_all_cross_ref_v4(offset, obj_count)
            || self.load_linearized_all_cross_ref_v5(offset);

        if metadata_objnum != 0 {
            self.syntax.add_decrypt_bypass(metadata_objnum);
        }

        if !loaded {
            self.last_xref_offset = 0;
            return Err(ParseError::InvalidXRef);
        }
        Ok(())
    }

    /// Probe the first indirect object for a linearization dictionary
    fn is_linearized_file(&mut self) -> bool {
        self.syntax.seek(9);

        let (word, is_number) = self.syntax.next_word();
        if !is_number || word.is_empty() {
            return false;
        }
        let objnum = parse_int(&word).max(0) as u32;

        let (word, is_number) = self.syntax.next_word();
        if !is_number {
            return false;
        }
        let gen = parse_int(&word).clamp(0, u16::MAX as i64) as u16;

        if self.syntax.next_keyword() != b"obj" {
            return false;
        }
        let object = match self.syntax.parse_object(objnum, gen) {
            Ok(object) => object,
            Err(_) => return false,
        };
        let header = match LinearizedHeader::from_object(&object) {
            Some(header) => header,
            None => return false,
        };

        self.last_xref_offset = header.main_xref_offset();
        self.linearized = Some(header);

        // Step over endobj onto the first-page xref
        self.syntax.next_word();
        true
    }

    /// Install the security and crypto handlers named by the current
    /// trailer's /Encrypt entry, authenticating with the stored password.
    pub(crate) fn set_encrypt_handler(&mut self) -> ParseResult<()> {
        self.release_encrypt_handler();

        let trailer = match self.trailers.current() {
            Some(trailer) => trailer.clone(),
            None => return Err(ParseError::InvalidTrailer),
        };

        let encrypt_dict = match trailer.get("Encrypt") {
            None => None,
            Some(PdfObject::Dictionary(dict)) => Some(dict.clone()),
            Some(PdfObject::Reference(objnum, _)) => {
                // Bootstrap: the encryption dictionary's own bytes must be
                // read without decryption
                let objnum = *objnum;
                self.syntax.add_decrypt_bypass(objnum);
                self.get_or_parse_indirect_object(objnum)
                    .and_then(|object| object.as_dict().cloned())
            }
            Some(_) => None,
        };

        if let Some(dict) = encrypt_dict {
            let is_standard = dict
                .get("Filter")
                .and_then(|o| o.as_name())
                .map(|n| n.as_str() == "Standard")
                .unwrap_or(false);
            if !is_standard {
                return Err(ParseError::UnsupportedEncryption(
                    "Only the Standard security handler is supported".to_string(),
                ));
            }

            let file_id = self.id_first_bytes();
            let mut security = StandardSecurityHandler::from_dict(&dict, file_id)?;
            let password = self.password.clone();
            if !security.authenticate(&password) {
                return Err(ParseError::InvalidPassword);
            }

            let crypto = CryptoHandler::from_dict(&dict, &security)?;
            self.syntax.set_crypto(crypto);
            self.security = Some(security);
            self.encrypt_dict = Some(dict);
        }
        Ok(())
    }

    /// Drop decryption state, e.g. before a rebuild retry
    pub(crate) fn release_encrypt_handler(&mut self) {
        self.syntax.clear_crypto();
        self.security = None;
        self.encrypt_dict = None;
    }

    fn register_metadata_bypass(&mut self) {
        let metadata_encrypted = match &self.security {
            Some(security) => security.is_metadata_encrypted(),
            None => return,
        };
        if metadata_encrypted {
            return;
        }
        let metadata_objnum = match self.doc.root().and_then(|root| root.get("Metadata")) {
            Some(PdfObject::Reference(objnum, _)) => *objnum,
            _ => return,
        };
        self.metadata_objnum = metadata_objnum;
        self.syntax.add_decrypt_bypass(metadata_objnum);
    }

    /// Resolve the catalog and page count after an index load
    pub(crate) fn load_doc(&mut self) {
        self.doc.reset();
        let root_num = self.root_obj_num();
        if root_num == 0 {
            return;
        }
        let root = match self.parse_indirect_object(root_num) {
            Ok(Some(object)) => match object.as_dict() {
                Some(dict) => dict.clone(),
                None => return,
            },
            _ => return,
        };
        self.doc.set_root(root_num, root);
        let count = self.count_pages();
        self.doc.set_page_count(count);
    }

    /// Page count from /Root -> /Pages -> /Count, resolving references
    fn count_pages(&mut self) -> u32 {
        let pages_obj = match self.doc.root().and_then(|root| root.get("Pages")) {
            Some(object) => object.clone(),
            None => return 0,
        };
        let pages = match pages_obj {
            PdfObject::Reference(objnum, _) => match self.parse_indirect_object(objnum) {
                Ok(Some(object)) => match object.as_dict() {
                    Some(dict) => dict.clone(),
                    None => return 0,
                },
                _ => return 0,
            },
            PdfObject::Dictionary(dict) => dict,
            _ => return 0,
        };
        match pages.get("Count").cloned() {
            Some(PdfObject::Integer(count)) => count.max(0) as u32,
            Some(PdfObject::Reference(objnum, _)) => match self.parse_indirect_object(objnum) {
                Ok(Some(object)) => object.as_integer().unwrap_or(0).max(0) as u32,
                _ => 0,
            },
            _ => 0,
        }
    }

    /// Fetch an indirect object on demand: directly from its byte offset,
    /// or out of its object-stream container. Returns `None` for free,
    /// unresolvable, or cyclically-referenced objects.
    pub fn parse_indirect_object(&mut self, objnum: u32) -> ParseResult<Option<PdfObject>> {
        if !self.is_valid_object_number(objnum) {
            return Ok(None);
        }
        if self.parsing.contains(&objnum) {
            return Ok(None);
        }
        self.parsing.insert(objnum);
        let result = self.parse_indirect_object_inner(objnum);
        self.parsing.remove(&objnum);
        result
    }

    fn parse_indirect_object_inner(&mut self, objnum: u32) -> ParseResult<Option<PdfObject>> {
        match self.index.kind(objnum) {
            ObjectKind::Direct | ObjectKind::Null => {
                let pos = self.index.offset_or_zero(objnum);
                if pos == 0 {
                    return Ok(None);
                }
                match self.parse_indirect_object_at(pos, objnum) {
                    Ok(indirect) => Ok(Some(indirect.object)),
                    Err(_) => Ok(None),
                }
            }
            ObjectKind::Compressed => {
                let container = self.index.offset_or_zero(objnum);
                if container > u32::MAX as u64 {
                    return Ok(None);
                }
                let accessor = match self.object_stream(container as u32) {
                    Some(accessor) => accessor,
                    None => return Ok(None),
                };
                let inner_offset = match accessor.offset_of(objnum) {
                    Some(offset) => offset,
                    None => return Ok(None),
                };
                let mut reader = SyntaxReader::new(Cursor::new(accessor.data()), 0)?;
                reader.seek(accessor.first() + inner_offset as u64);
                match reader.parse_object(0, 0) {
                    Ok(object) => Ok(Some(object)),
                    Err(_) => Ok(None),
                }
            }
            ObjectKind::Free => Ok(None),
        }
    }

    /// Fetch through the document cache, parsing on a miss
    pub(crate) fn get_or_parse_indirect_object(&mut self, objnum: u32) -> Option<PdfObject> {
        if let Some(cached) = self.doc.get_cached(objnum) {
            return Some(cached.clone());
        }
        let object = self.parse_indirect_object(objnum).ok().flatten()?;
        let gen = self.object_gen_num(objnum);
        self.doc.store(objnum, gen, object.clone());
        Some(object)
    }

    /// Container accessor for an object-stream, loaded through the cache.
    /// The container's own kind is Null, so resolving it reads raw bytes.
    pub(crate) fn object_stream(&mut self, objnum: u32) -> Option<Rc<ObjectStreamAccessor>> {
        if let Some(accessor) = self.object_streams.get(objnum) {
            return Some(accessor);
        }
        let object = self.get_or_parse_indirect_object(objnum)?;
        let stream = object.as_stream()?;
        let accessor = ObjectStreamAccessor::load(stream).ok()?;
        Some(self.object_streams.insert(objnum, accessor))
    }

    /// Parse the indirect object whose header sits at `pos`. A nonzero
    /// `objnum` must match the header. The reader position is preserved.
    pub(crate) fn parse_indirect_object_at(
        &mut self,
        pos: u64,
        objnum: u32,
    ) -> ParseResult<IndirectObject> {
        let saved = self.syntax.pos();
        let result = self.parse_indirect_object_at_inner(pos, objnum);
        self.syntax.seek(saved);
        result
    }

    fn parse_indirect_object_at_inner(
        &mut self,
        pos: u64,
        objnum: u32,
    ) -> ParseResult<IndirectObject> {
        self.syntax.seek(pos);

        let (word, is_number) = self.syntax.next_word();
        if !is_number || word.is_empty() {
            return Err(ParseError::syntax(pos, "Expected object number"));
        }
        let parser_objnum = parse_int(&word).max(0) as u32;
        if objnum != 0 && parser_objnum != objnum {
            return Err(ParseError::syntax(pos, "Object header number mismatch"));
        }

        let (word, is_number) = self.syntax.next_word();
        if !is_number || word.is_empty() {
            return Err(ParseError::syntax(pos, "Expected generation number"));
        }
        let gen = parse_int(&word).clamp(0, u16::MAX as i64) as u16;

        if self.syntax.next_keyword() != b"obj" {
            return Err(ParseError::syntax(pos, "Expected 'obj' keyword"));
        }

        let object = self.syntax.parse_object(parser_objnum, gen)?;

        // endobj is routinely missing in damaged files
        let after = self.syntax.pos();
        if self.syntax.next_keyword() != b"endobj" {
            self.syntax.seek(after);
        }

        Ok(IndirectObject {
            objnum: parser_objnum,
            gen,
            object,
        })
    }

    /// Strict variant for the rebuild scan: parse failure is tolerated and
    /// the position where parsing stopped is reported either way.
    pub(crate) fn parse_indirect_object_at_strict(
        &mut self,
        pos: u64,
        objnum: u32,
    ) -> (Option<PdfObject>, u64) {
        let saved = self.syntax.pos();
        self.syntax.seek(pos);

        let mut object = None;
        let mut end = pos;

        let (word, is_number) = self.syntax.next_word();
        let header_ok = is_number
            && !word.is_empty()
            && (objnum == 0 || parse_int(&word).max(0) as u32 == objnum);
        if header_ok {
            let parser_objnum = parse_int(&word).max(0) as u32;
            let (word, gen_ok) = self.syntax.next_word();
            if gen_ok && !word.is_empty() && self.syntax.next_keyword() == b"obj" {
                let gen = parse_int(&word).clamp(0, u16::MAX as i64) as u16;
                let attempt = self.syntax.parse_object_strict(parser_objnum, gen);
                end = self.syntax.pos();
                object = attempt.ok();
            }
        }

        self.syntax.seek(saved);
        (object, end)
    }

    /// Full `N G obj ... endobj` byte range of an object. For compressed
    /// objects, the slice of the container payload. Empty on failure.
    pub fn indirect_binary(&mut self, objnum: u32) -> Vec<u8> {
        if !self.is_valid_object_number(objnum) {
            return Vec::new();
        }

        if self.index.kind(objnum) == ObjectKind::Compressed {
            let container = self.index.offset_or_zero(objnum);
            if container > u32::MAX as u64 {
                return Vec::new();
            }
            let accessor = match self.object_stream(container as u32) {
                Some(accessor) => accessor,
                None => return Vec::new(),
            };
            return match accessor.span_of(objnum) {
                Some((start, end)) => accessor.data()[start..end].to_vec(),
                None => Vec::new(),
            };
        }

        if self.index.kind(objnum) != ObjectKind::Direct {
            return Vec::new();
        }
        let pos = self.index.offset_or_zero(objnum);
        if pos == 0 {
            return Vec::new();
        }

        let saved = self.syntax.pos();
        let result = self.direct_binary_at(pos, objnum);
        self.syntax.seek(saved);
        result.unwrap_or_default()
    }

    fn direct_binary_at(&mut self, pos: u64, objnum: u32) -> Option<Vec<u8>> {
        self.syntax.seek(pos);

        let (word, is_number) = self.syntax.next_word();
        if !is_number {
            return None;
        }
        let parsed = parse_int(&word).max(0) as u32;
        if parsed != 0 && parsed != objnum {
            return None;
        }

        let (_, is_number) = self.syntax.next_word();
        if !is_number {
            return None;
        }
        if self.syntax.next_keyword() != b"obj" {
            return None;
        }

        // The next known offset bounds the object, but only if something
        // plausible actually starts there
        let mut next_off = self.offsets.next_after(pos)?;
        let mut next_valid = false;
        self.syntax.seek(next_off);
        let (word, is_number) = self.syntax.next_word();
        if word == b"xref" {
            next_valid = true;
        } else if is_number {
            let (_, second_is_number) = self.syntax.next_word();
            if second_is_number && self.syntax.next_keyword() == b"obj" {
                next_valid = true;
            }
        }

        if !next_valid {
            self.syntax.seek(pos);
            loop {
                let keyword = self.syntax.next_keyword();
                if keyword == b"endobj" || keyword.is_empty() {
                    break;
                }
                if self.syntax.pos() >= self.syntax.file_len() {
                    break;
                }
            }
            next_off = self.syntax.pos();
        }

        let size = next_off.saturating_sub(pos) as usize;
        let mut buffer = vec![0u8; size];
        self.syntax.read_block_at(pos, &mut buffer).ok()?;
        Some(buffer)
    }

    // --- queries -----------------------------------------------------

    /// Largest known object number, or 0
    pub fn last_obj_num(&self) -> u32 {
        self.index.last_obj_num()
    }

    pub fn is_valid_object_number(&self, objnum: u32) -> bool {
        !self.index.is_empty() && objnum <= self.index.last_obj_num()
    }

    /// Location kind for an object number (absent entries read as Free)
    pub fn object_kind(&self, objnum: u32) -> ObjectKind {
        self.index.kind(objnum)
    }

    pub fn object_gen_num(&self, objnum: u32) -> u16 {
        self.index.get(objnum).map(|location| location.gen).unwrap_or(0)
    }

    pub fn is_object_free_or_null(&self, objnum: u32) -> bool {
        matches!(self.index.kind(objnum), ObjectKind::Free | ObjectKind::Null)
    }

    /// Byte offset of an object; a compressed object reports its
    /// container's offset
    pub fn object_offset(&self, objnum: u32) -> u64 {
        if !self.is_valid_object_number(objnum) {
            return 0;
        }
        match self.index.kind(objnum) {
            ObjectKind::Direct => self.index.offset_or_zero(objnum),
            ObjectKind::Compressed => {
                let container = self.index.offset_or_zero(objnum);
                if container > u32::MAX as u64 {
                    return 0;
                }
                self.index.offset_or_zero(container as u32)
            }
            _ => 0,
        }
    }

    /// Upper-bound byte size of an object, from the distance to the next
    /// known offset
    pub fn object_size(&self, objnum: u32) -> u64 {
        if !self.is_valid_object_number(objnum) {
            return 0;
        }
        let mut objnum = objnum;
        if self.index.kind(objnum) == ObjectKind::Compressed {
            let container = self.index.offset_or_zero(objnum);
            if container > u32::MAX as u64 {
                return 0;
            }
            objnum = container as u32;
        }
        let kind = self.index.kind(objnum);
        if kind != ObjectKind::Direct && kind != ObjectKind::Null {
            return 0;
        }
        let offset = self.index.offset_or_zero(objnum);
        if offset == 0 {
            return 0;
        }
        match self.offsets.next_after(offset) {
            Some(next) => next - offset,
            None => 0,
        }
    }

    /// Encoded file version from the header (e.g. 17 for PDF 1.7)
    pub fn file_version(&self) -> u32 {
        self.file_version
    }

    /// Whether any entry carried a generation >= 1
    pub fn version_updated(&self) -> bool {
        self.version_updated
    }

    /// Whether the newest xref section was a cross-reference stream
    pub fn is_xref_stream(&self) -> bool {
        self.xref_stream
    }

    /// Canonicalized permissions word; all-ones without encryption
    pub fn permissions(&self) -> u32 {
        let security = match &self.security {
            Some(security) => security,
            None => return 0xFFFF_FFFF,
        };
        let is_standard = self
            .encrypt_dict
            .as_ref()
            .and_then(|dict| dict.get("Filter"))
            .and_then(|o| o.as_name())
            .map(|n| n.as_str() == "Standard")
            .unwrap_or(false);
        let permissions = security.permissions();
        if is_standard {
            permissions.canonicalized().bits()
        } else {
            permissions.bits()
        }
    }

    /// Trailer /ID array, resolving an indirect reference once and
    /// writing the resolved array back into the trailer
    pub fn id_array(&mut self) -> Option<PdfArray> {
        let id_obj = self.trailers.current()?.get("ID")?.clone();
        match id_obj {
            PdfObject::Array(array) => Some(array),
            PdfObject::Reference(objnum, _) => {
                let resolved = self.parse_indirect_object(objnum).ok().flatten()?;
                if let Some(trailer) = self.trailers.current_mut() {
                    trailer.insert("ID".to_string(), resolved.clone());
                }
                match resolved {
                    PdfObject::Array(array) => Some(array),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn id_first_bytes(&mut self) -> Vec<u8> {
        self.id_array()
            .and_then(|array| {
                array
                    .get(0)
                    .and_then(|o| o.as_string())
                    .map(|s| s.as_bytes().to_vec())
            })
            .unwrap_or_default()
    }

    /// Object number of the document catalog, or 0
    pub fn root_obj_num(&self) -> u32 {
        match self.trailers.current().and_then(|t| t.get("Root")) {
            Some(PdfObject::Reference(objnum, _)) => *objnum,
            _ => 0,
        }
    }

    /// Object number of the /Info dictionary. Older revisions are
    /// searched newest-first when the current trailer lacks one.
    pub fn info_obj_num(&self) -> u32 {
        for trailer in self.trailers.iter_newest_first() {
            if let Some(PdfObject::Reference(objnum, _)) = trailer.get("Info") {
                return *objnum;
            }
        }
        0
    }

    /// First page number of a linearized file (0 otherwise)
    pub fn first_page_no(&self) -> u32 {
        self.linearized
            .map(|header| header.first_page_no())
            .unwrap_or(0)
    }

    /// Linearization parameters, when the file carried them
    pub fn linearized_header(&self) -> Option<&LinearizedHeader> {
        self.linearized.as_ref()
    }

    /// The current (newest) trailer dictionary
    pub fn trailer(&self) -> Option<&PdfDictionary> {
        self.trailers.current()
    }

    /// Number of trailers collected across revisions
    pub fn trailer_count(&self) -> usize {
        self.trailers.len()
    }

    /// Page count resolved during the document load
    pub fn page_count(&self) -> u32 {
        self.doc.page_count()
    }

    /// Offset parsed from the final startxref (0 after a rebuild)
    pub fn last_xref_offset(&self) -> u64 {
        self.last_xref_offset
    }

    /// Counters from the latest rebuild pass
    pub fn rebuild_stats(&self) -> RebuildStats {
        self.rebuild_stats
    }
}
