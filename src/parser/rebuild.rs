//! Cross-Reference Rebuild
//!
//! Last-resort recovery: a single forward pass over the whole file with a
//! small state machine that recognizes `N G obj` headers, `trailer`
//! dictionaries and `xref` keywords, reconstructing the object index when
//! the recorded cross-reference data is unusable.

use std::io::{Read, Seek};

use super::objects::{PdfDictionary, PdfObject};
use super::reader::PdfParser;
use super::syntax::{is_delimiter, is_whitespace, parse_int};
use super::xref::ObjectLocation;

/// Scan buffer size; scanner state carries across refills
const BUFFER_SIZE: usize = 4096;

/// Scanner states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Default,
    Whitespace,
    Comment,
    String,
    HexString,
    EscapedString,
    ObjNum,
    PostObjNum,
    GenNum,
    PostGenNum,
    BeginObj,
    EndObj,
    Xref,
    Trailer,
}

/// Counters from the latest rebuild pass
#[derive(Debug, Default, Clone, Copy)]
pub struct RebuildStats {
    /// Object headers discovered by the scan
    pub objects_found: usize,
    /// Trailer dictionaries pushed or merged
    pub trailers_found: usize,
}

impl<R: Read + Seek> PdfParser<R> {
    /// Reconstruct the object index by scanning the file body. Succeeds
    /// when the scan produced both a trailer and at least one object.
    pub(crate) fn rebuild_cross_ref(&mut self) -> bool {
        self.index.clear();
        self.offsets.clear();
        self.trailers.clear();
        self.rebuild_stats = RebuildStats::default();

        let file_len = self.syntax.file_len();
        let mut state = ScanState::Default;
        let mut inside_index = 0usize;
        let mut objnum: u32 = 0;
        let mut gennum: u32 = 0;
        let mut depth = 0u32;
        let mut buffer = vec![0u8; BUFFER_SIZE];

        let mut pos: u64 = 0;
        let mut start_pos: u64 = 0;
        let mut start_pos1: u64 = 0;
        let mut last_obj: Option<u64> = None;
        let mut last_xref: Option<u64> = None;
        let mut last_trailer: Option<u64> = None;

        while pos < file_len {
            let saved_pos = pos;
            let mut overflow_pos: Option<u64> = None;
            let size = (file_len - pos).min(BUFFER_SIZE as u64) as usize;
            if self.syntax.read_block_at(pos, &mut buffer[..size]).is_err() {
                break;
            }

            let mut i = 0usize;
            while i < size {
                let byte = buffer[i];
                // A transition may ask for the byte to be reprocessed
                let mut advance = true;

                match state {
                    ScanState::Default => {
                        if is_whitespace(byte) {
                            state = ScanState::Whitespace;
                        } else if byte.is_ascii_digit() {
                            advance = false;
                            state = ScanState::Whitespace;
                        } else if byte == b'%' {
                            inside_index = 0;
                            state = ScanState::Comment;
                        } else if byte == b'(' {
                            state = ScanState::String;
                            depth = 1;
                        } else if byte == b'<' {
                            inside_index = 1;
                            state = ScanState::HexString;
                        } else if byte == b'\\' {
                            state = ScanState::EscapedString;
                        } else if byte == b't' {
                            state = ScanState::Trailer;
                            inside_index = 1;
                        }
                    }

                    ScanState::Whitespace => {
                        if byte.is_ascii_digit() {
                            start_pos = pos + i as u64;
                            state = ScanState::ObjNum;
                            objnum = (byte - b'0') as u32;
                        } else if byte == b't' {
                            state = ScanState::Trailer;
                            inside_index = 1;
                        } else if byte == b'x' {
                            state = ScanState::Xref;
                            inside_index = 1;
                        } else if !is_whitespace(byte) {
                            advance = false;
                            state = ScanState::Default;
                        }
                    }

                    ScanState::ObjNum => {
                        if byte.is_ascii_digit() {
                            objnum =
                                objnum.saturating_mul(10).saturating_add((byte - b'0') as u32);
                        } else if is_whitespace(byte) {
                            state = ScanState::PostObjNum;
                        } else {
                            advance = false;
                            state = ScanState::EndObj;
                            inside_index = 0;
                        }
                    }

                    ScanState::PostObjNum => {
                        if byte.is_ascii_digit() {
                            start_pos1 = pos + i as u64;
                            state = ScanState::GenNum;
                            gennum = (byte - b'0') as u32;
                        } else if byte == b't' {
                            state = ScanState::Trailer;
                            inside_index = 1;
                        } else if !is_whitespace(byte) {
                            advance = false;
                            state = ScanState::Default;
                        }
                    }

                    ScanState::GenNum => {
                        if byte.is_ascii_digit() {
                            gennum =
                                gennum.saturating_mul(10).saturating_add((byte - b'0') as u32);
                        } else if is_whitespace(byte) {
                            state = ScanState::PostGenNum;
                        } else {
                            advance = false;
                            state = ScanState::Default;
                        }
                    }

                    ScanState::PostGenNum => {
                        if byte == b'o' {
                            state = ScanState::BeginObj;
                            inside_index = 1;
                        } else if byte.is_ascii_digit() {
                            // Patterns like "N G N G obj": slide the pair
                            // window one step
                            objnum = gennum;
                            gennum = (byte - b'0') as u32;
                            start_pos = start_pos1;
                            start_pos1 = pos + i as u64;
                            state = ScanState::GenNum;
                        } else if byte == b't' {
                            state = ScanState::Trailer;
                            inside_index = 1;
                        } else if !is_whitespace(byte) {
                            advance = false;
                            state = ScanState::Default;
                        }
                    }

                    ScanState::BeginObj => match inside_index {
                        1 => {
                            if byte == b'b' {
                                inside_index = 2;
                            } else {
                                advance = false;
                                state = ScanState::Default;
                            }
                        }
                        2 => {
                            if byte == b'j' {
                                inside_index = 3;
                            } else {
                                advance = false;
                                state = ScanState::Default;
                            }
                        }
                        _ => {
                            if is_whitespace(byte) || is_delimiter(byte) {
                                let obj_pos = start_pos;
                                self.offsets.insert(obj_pos);
                                last_obj = Some(obj_pos);

                                let (nlen, obj_end) =
                                    self.rebuild_discovered_object(obj_pos, objnum, gennum);
                                if nlen > (size - i) as u64 {
                                    overflow_pos = Some(obj_end);
                                } else {
                                    i += nlen as usize;
                                }
                            }
                            advance = false;
                            state = ScanState::Default;
                        }
                    },

                    ScanState::Trailer => {
                        if inside_index == 7 {
                            if is_whitespace(byte) || is_delimiter(byte) {
                                last_trailer = Some((pos + i as u64).saturating_sub(7));
                                self.rebuild_handle_trailer(pos + i as u64);
                            }
                            advance = false;
                            state = ScanState::Default;
                        } else if byte == b"trailer"[inside_index] {
                            inside_index += 1;
                        } else {
                            advance = false;
                            state = ScanState::Default;
                        }
                    }

                    ScanState::Xref => {
                        if inside_index == 4 {
                            last_xref = Some((pos + i as u64).saturating_sub(4));
                            state = ScanState::Whitespace;
                        } else if byte == b"xref"[inside_index] {
                            inside_index += 1;
                        } else {
                            advance = false;
                            state = ScanState::Default;
                        }
                    }

                    ScanState::Comment => {
                        if byte == b'\r' || byte == b'\n' {
                            state = ScanState::Default;
                        }
                    }

                    ScanState::String => {
                        if byte == b')' {
                            depth = depth.saturating_sub(1);
                        } else if byte == b'(' {
                            depth += 1;
                        }
                        if depth == 0 {
                            state = ScanState::Default;
                        }
                    }

                    ScanState::HexString => {
                        if byte == b'>' || (byte == b'<' && inside_index == 1) {
                            state = ScanState::Default;
                        }
                        inside_index = 0;
                    }

                    ScanState::EscapedString => {
                        if is_delimiter(byte) || is_whitespace(byte) {
                            advance = false;
                            state = ScanState::Default;
                        }
                    }

                    ScanState::EndObj => {
                        if is_whitespace(byte) {
                            state = ScanState::Default;
                        } else if byte == b'%'
                            || byte == b'('
                            || byte == b'<'
                            || byte == b'\\'
                        {
                            advance = false;
                            state = ScanState::Default;
                        } else if inside_index == 6 {
                            advance = false;
                            state = ScanState::Default;
                        } else if byte == b"endobj"[inside_index] {
                            inside_index += 1;
                        }
                    }
                }

                if overflow_pos.is_some() {
                    break;
                }
                if advance {
                    i += 1;
                }
            }

            match overflow_pos {
                Some(next) => pos = next,
                None => pos += size as u64,
            }

            // Bail out rather than loop forever on pathological input
            if pos <= saved_pos {
                break;
            }
        }

        let lx = last_xref.map(|v| v as i64).unwrap_or(-1);
        let lo = last_obj.map(|v| v as i64).unwrap_or(-1);
        let mut lt = last_trailer.map(|v| v as i64).unwrap_or(-1);
        if lx != -1 && lx > lo {
            lt = lx;
        } else if lt == -1 || lx < lo {
            lt = file_len as i64;
        }
        self.offsets.insert(lt.max(0) as u64);

        self.trailers.current().is_some() && !self.index.is_empty()
    }

    /// Discovery callback for one `N G obj` header found by the scan.
    /// Returns the body length to skip and the end position of the object.
    fn rebuild_discovered_object(
        &mut self,
        obj_pos: u64,
        objnum: u32,
        gennum: u32,
    ) -> (u64, u64) {
        let (object, obj_end) = self.parse_indirect_object_at_strict(obj_pos, objnum);

        // A cross-reference stream found mid-scan can serve as the trailer
        if let Some(PdfObject::Stream(stream)) = &object {
            let dict = stream.dict.clone();
            if dict.get_type() == Some("XRef")
                && dict.contains_key("Size")
                && self.rebuild_root_has_pages(&dict)
            {
                self.trailers.push_newest(dict);
                self.rebuild_stats.trailers_found += 1;
            }
        }

        self.syntax.seek(obj_pos);
        let header_len = match self.syntax.find_tag(b"obj") {
            Some(dist) => dist + 3,
            None => 0,
        };
        let nlen = obj_end.saturating_sub(obj_pos + header_len);

        let already_placed = self
            .index
            .get(objnum)
            .map(|location| location.offset != 0)
            .unwrap_or(false);
        if !self.index.is_empty() && self.is_valid_object_number(objnum) && already_placed {
            if object.is_some() {
                let old_gen = self.object_gen_num(objnum) as u32;
                let location = self.index.entry_mut(objnum);
                location.offset = obj_pos;
                location.gen = (gennum & 0xFFFF) as u16;
                if old_gen != gennum {
                    self.version_updated = true;
                }
            }
        } else {
            self.index
                .insert(objnum, ObjectLocation::direct(obj_pos, (gennum & 0xFFFF) as u16));
        }
        self.rebuild_stats.objects_found += 1;

        (nlen, obj_end)
    }

    /// Does a candidate trailer's /Root lead to a dictionary with /Pages?
    fn rebuild_root_has_pages(&mut self, dict: &PdfDictionary) -> bool {
        match dict.get("Root") {
            Some(PdfObject::Reference(objnum, _)) => {
                let objnum = *objnum;
                match self.parse_indirect_object(objnum) {
                    Ok(Some(object)) => object
                        .as_dict()
                        .map(|d| d.contains_key("Pages"))
                        .unwrap_or(false),
                    _ => false,
                }
            }
            Some(PdfObject::Dictionary(root)) => root.contains_key("Pages"),
            _ => false,
        }
    }

    /// Parse and integrate a `trailer` dictionary found at `at`.
    ///
    /// The first trailer becomes current. Later ones merge into it: keys
    /// whose values are references to valid, non-free objects are taken as
    /// references, everything else is cloned.
    fn rebuild_handle_trailer(&mut self, at: u64) {
        let saved = self.syntax.pos();
        self.syntax.seek(at);

        let object = match self.syntax.parse_object(0, 0) {
            Ok(object) => object,
            Err(_) => {
                self.syntax.seek(saved);
                return;
            }
        };
        let trailer_dict = match &object {
            PdfObject::Dictionary(dict) => dict.clone(),
            PdfObject::Stream(stream) => stream.dict.clone(),
            _ => {
                self.syntax.seek(saved);
                return;
            }
        };

        if self.trailers.current().is_some() {
            let root_ok = match trailer_dict.get("Root") {
                None => true,
                Some(PdfObject::Reference(objnum, _)) => {
                    self.is_valid_object_number(*objnum)
                        && self.index.offset_or_zero(*objnum) != 0
                }
                Some(_) => false,
            };
            if root_ok {
                if let Some(current) = self.trailers.current_mut() {
                    for (key, value) in trailer_dict.iter() {
                        current.insert(key.as_str().to_string(), value.clone());
                    }
                }
                self.rebuild_stats.trailers_found += 1;
            }
        } else {
            self.trailers.push_newest(trailer_dict);
            self.rebuild_stats.trailers_found += 1;

            // Remember a startxref that follows the trailer
            let after = self.syntax.pos();
            if self.syntax.next_keyword() == b"startxref" {
                let (word, is_number) = self.syntax.next_word();
                if is_number {
                    self.last_xref_offset = parse_int(&word).max(0) as u64;
                }
            }
            self.syntax.seek(after);
        }

        self.syntax.seek(saved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::xref::ObjectKind;
    use std::io::Cursor;

    fn parser_for(data: &[u8]) -> PdfParser<Cursor<Vec<u8>>> {
        PdfParser::new(Cursor::new(data.to_vec())).unwrap()
    }

    #[test]
    fn test_rebuild_minimal_file() {
        let data = b"%PDF-1.4\n\
1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
2 0 obj\n<< /Type /Pages /Kids [] /Count 1 >>\nendobj\n\
trailer\n<< /Size 3 /Root 1 0 R >>\n";
        let mut parser = parser_for(data);
        assert!(parser.rebuild_cross_ref());

        assert_eq!(parser.last_obj_num(), 2);
        assert_eq!(parser.object_kind(1), ObjectKind::Direct);
        assert_eq!(parser.object_kind(2), ObjectKind::Direct);
        assert_eq!(parser.root_obj_num(), 1);
        assert_eq!(parser.rebuild_stats().objects_found, 2);

        // Recorded offsets point at the object headers
        let catalog = parser.parse_indirect_object(1).unwrap().unwrap();
        assert_eq!(catalog.as_dict().unwrap().get_type(), Some("Catalog"));
    }

    #[test]
    fn test_rebuild_without_trailer_fails() {
        let data = b"%PDF-1.4\n1 0 obj\n<< /A 1 >>\nendobj\n";
        let mut parser = parser_for(data);
        assert!(!parser.rebuild_cross_ref());
    }

    #[test]
    fn test_rebuild_skips_junk_between_objects() {
        let data = b"%PDF-1.4\n\
random text (with a paren \\) inside) and % a comment\n\
3 0 obj\n<< /Type /Catalog /Pages 4 0 R >>\nendobj\n\
4 0 obj\n<< /Type /Pages /Count 1 >>\nendobj\n\
trailer << /Size 5 /Root 3 0 R >>\n";
        let mut parser = parser_for(data);
        assert!(parser.rebuild_cross_ref());
        assert_eq!(parser.object_kind(3), ObjectKind::Direct);
        assert_eq!(parser.object_kind(4), ObjectKind::Direct);
    }

    #[test]
    fn test_rebuild_sliding_pair_pattern() {
        // "7 7 5 0 obj" must resolve to object 5, generation 0
        let data = b"%PDF-1.4\n\
7 7 5 0 obj\n<< /Type /Catalog /Pages 6 0 R >>\nendobj\n\
trailer << /Size 8 /Root 5 0 R >>\n";
        let mut parser = parser_for(data);
        assert!(parser.rebuild_cross_ref());
        assert_eq!(parser.object_kind(5), ObjectKind::Direct);
        assert_eq!(parser.object_gen_num(5), 0);
    }

    #[test]
    fn test_rebuild_newer_trailer_merges() {
        let data = b"%PDF-1.4\n\
1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
trailer << /Size 3 /Root 1 0 R >>\n\
2 0 obj\n<< /Type /Pages /Count 1 >>\nendobj\n\
trailer << /Size 3 /Root 1 0 R /Info 2 0 R >>\n";
        let mut parser = parser_for(data);
        assert!(parser.rebuild_cross_ref());
        // The merged current trailer picked up /Info
        assert_eq!(parser.info_obj_num(), 2);
        assert_eq!(parser.root_obj_num(), 1);
    }

    #[test]
    fn test_rebuild_records_startxref_after_trailer() {
        let data = b"%PDF-1.4\n\
1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
trailer << /Size 3 /Root 1 0 R >>\nstartxref\n9\n%%EOF\n";
        let mut parser = parser_for(data);
        assert!(parser.rebuild_cross_ref());
        assert_eq!(parser.last_xref_offset(), 9);
    }
}
