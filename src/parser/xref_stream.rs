//! Cross-Reference Streams
//!
//! Loader for the compressed cross-reference form of PDF 1.5+
//! (ISO 32000-1 Section 7.5.8). A v5 section is itself an indirect stream
//! object; its dictionary doubles as the trailer.

use std::collections::HashSet;
use std::io::{Read, Seek};

use super::objects::PdfDictionary;
use super::reader::PdfParser;
use super::xref::ObjectKind;

/// Field widths and subsection index of a cross-reference stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XrefStreamLayout {
    /// Widths in bytes of the three entry fields (/W)
    pub widths: [usize; 3],
    /// Stride of one entry: the sum of every /W element
    pub total_width: usize,
    /// Subsections as (first object number, count) pairs (/Index)
    pub index: Vec<(u32, u32)>,
}

impl XrefStreamLayout {
    /// Read /W and /Index from a stream dictionary. `size` supplies the
    /// default subsection when /Index is absent.
    pub fn from_dict(dict: &PdfDictionary, size: i64) -> Option<Self> {
        let w_array = dict.get("W").and_then(|o| o.as_array())?;
        if w_array.len() < 3 {
            return None;
        }

        let mut all_widths = Vec::with_capacity(w_array.len());
        let mut total_width = 0usize;
        for item in &w_array.0 {
            let width = item.as_integer()?;
            if !(0..=8).contains(&width) {
                return None;
            }
            total_width = total_width.checked_add(width as usize)?;
            all_widths.push(width as usize);
        }
        if total_width == 0 {
            return None;
        }

        let mut index = Vec::new();
        if let Some(array) = dict.get("Index").and_then(|o| o.as_array()) {
            for chunk in array.0.chunks(2) {
                if chunk.len() != 2 {
                    break;
                }
                if let (Some(start), Some(count)) =
                    (chunk[0].as_integer(), chunk[1].as_integer())
                {
                    if start >= 0 && count > 0 && start <= u32::MAX as i64 && count <= u32::MAX as i64
                    {
                        index.push((start as u32, count as u32));
                    }
                }
            }
        }
        if index.is_empty() {
            index.push((0, size.clamp(0, u32::MAX as i64) as u32));
        }

        Some(Self {
            widths: [all_widths[0], all_widths[1], all_widths[2]],
            total_width,
            index,
        })
    }

    /// Split one entry into its three big-endian fields. A zero-width type
    /// field defaults to 1 (a plain in-use object).
    pub fn decode_entry(&self, entry: &[u8]) -> (u64, u64, u64) {
        let (w0, w1) = (self.widths[0], self.widths[1]);
        let entry_type = if w0 > 0 { read_field(&entry[..w0]) } else { 1 };
        let field1 = read_field(&entry[w0..w0 + w1]);
        let field2 = read_field(&entry[w0 + w1..w0 + w1 + self.widths[2]]);
        (entry_type, field1, field2)
    }
}

/// Read a big-endian unsigned field
fn read_field(bytes: &[u8]) -> u64 {
    let mut value = 0u64;
    for &byte in bytes {
        value = (value << 8) | (byte as u64);
    }
    value
}

impl<R: Read + Seek> PdfParser<R> {
    /// Load a cross-reference stream chain whose newest section sits at
    /// `xrefpos`.
    pub(crate) fn load_all_cross_ref_v5(&mut self, xrefpos: u64) -> bool {
        let mut pos = xrefpos;
        if !self.load_cross_ref_v5(&mut pos, true) {
            return false;
        }

        let mut seen_xrefpos = HashSet::new();
        while pos != 0 {
            seen_xrefpos.insert(pos);
            if !self.load_cross_ref_v5(&mut pos, false) {
                return false;
            }
            if seen_xrefpos.contains(&pos) {
                return false;
            }
        }
        self.object_streams.clear();
        self.xref_stream = true;
        true
    }

    /// Chain variant for the second phase of a linearized load: every
    /// section is treated as an update, never as the main table.
    pub(crate) fn load_linearized_all_cross_ref_v5(&mut self, xrefpos: u64) -> bool {
        let mut pos = xrefpos;
        if !self.load_cross_ref_v5(&mut pos, false) {
            return false;
        }

        let mut seen_xrefpos = HashSet::new();
        while pos != 0 {
            seen_xrefpos.insert(pos);
            if !self.load_cross_ref_v5(&mut pos, false) {
                return false;
            }
            if seen_xrefpos.contains(&pos) {
                return false;
            }
        }
        self.object_streams.clear();
        self.xref_stream = true;
        true
    }

    /// Load one cross-reference stream at `*pos`, leaving `*pos` at the
    /// /Prev offset (0 when the chain ends).
    ///
    /// On a main load the stream's dictionary becomes the current trailer
    /// and every already-present entry is re-tagged Free, so the chain
    /// replays with newest-wins precedence. On update loads, entries that
    /// are no longer Free are left alone, and Null container records only
    /// refresh their offset.
    pub(crate) fn load_cross_ref_v5(&mut self, pos: &mut u64, is_main: bool) -> bool {
        let indirect = match self.parse_indirect_object_at(*pos, 0) {
            Ok(indirect) => indirect,
            Err(_) => return false,
        };
        let objnum = indirect.objnum;
        if objnum == 0 {
            return false;
        }

        // The document catalog must not double as a cross-reference stream
        if let Some(root_num) = self.doc.root_objnum() {
            if root_num == objnum {
                return false;
            }
        }
        if !self
            .doc
            .replace_if_higher_generation(objnum, indirect.gen, indirect.object.clone())
        {
            return false;
        }

        let stream = match indirect.object.as_stream() {
            Some(stream) => stream,
            None => return false,
        };
        let dict = stream.dict.clone();

        *pos = dict.get_direct_int("Prev").max(0) as u64;
        let size = dict.get_direct_int("Size");
        if size < 0 {
            return false;
        }

        if is_main {
            self.trailers.push_newest(dict.clone());
            self.shrink_object_map(size.clamp(0, u32::MAX as i64) as u32);
            self.index.mark_all_free();
        } else {
            self.trailers.push_older(dict.clone());
        }

        let layout = match XrefStreamLayout::from_dict(&dict, size) {
            Some(layout) => layout,
            None => return false,
        };
        let data = match stream.decode() {
            Ok(data) => data,
            Err(_) => return false,
        };

        let mut segindex: u64 = 0;
        for &(startnum, count) in &layout.index {
            self.xref_start_obj_num = startnum;

            let needed = match (segindex + count as u64).checked_mul(layout.total_width as u64) {
                Some(needed) => needed,
                None => continue,
            };
            if needed > data.len() as u64 {
                continue;
            }

            let bound = if self.index.is_empty() {
                0
            } else {
                self.index.last_obj_num() as u64 + 1
            };
            if startnum as u64 + count as u64 > bound {
                continue;
            }

            let seg_start = segindex as usize * layout.total_width;
            for j in 0..count as usize {
                let offset = seg_start + j * layout.total_width;
                let entry = &data[offset..offset + layout.total_width];
                let (entry_type, field1, field2) = layout.decode_entry(entry);
                let objnum = startnum + j as u32;

                if self.index.kind(objnum) == ObjectKind::Null {
                    // Container classification wins; only refresh the offset
                    self.index.entry_mut(objnum).offset = field1;
                    self.offsets.insert(field1);
                    continue;
                }
                if self.index.kind(objnum) != ObjectKind::Free {
                    continue;
                }

                match entry_type {
                    0 => {
                        let location = self.index.entry_mut(objnum);
                        location.kind = ObjectKind::Free;
                        location.offset = 0;
                    }
                    1 => {
                        let location = self.index.entry_mut(objnum);
                        location.kind = ObjectKind::Direct;
                        location.offset = field1;
                        location.gen = (field2 & 0xFFFF) as u16;
                        self.offsets.insert(field1);
                    }
                    2 => {
                        if field1 > u32::MAX as u64 || !self.is_valid_object_number(field1 as u32)
                        {
                            return false;
                        }
                        let container = field1 as u32;
                        {
                            let location = self.index.entry_mut(objnum);
                            location.kind = ObjectKind::Compressed;
                            location.offset = field1;
                            location.gen = (field2 & 0xFFFF) as u16;
                            location.archive_obj_num = container;
                        }
                        self.index.entry_mut(container).kind = ObjectKind::Null;
                    }
                    _ => {
                        // Unknown record types read as absent objects
                        self.index.entry_mut(objnum).kind = ObjectKind::Null;
                    }
                }
            }
            segindex += count as u64;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::objects::{PdfArray, PdfObject};

    fn int_array(values: &[i64]) -> PdfObject {
        PdfObject::Array(PdfArray(
            values.iter().map(|&v| PdfObject::Integer(v)).collect(),
        ))
    }

    fn decode_entries(layout: &XrefStreamLayout, data: &[u8]) -> Vec<(u32, u64, u64, u64)> {
        let mut out = Vec::new();
        let mut offset = 0usize;
        for &(startnum, count) in &layout.index {
            for j in 0..count {
                if offset + layout.total_width > data.len() {
                    return out;
                }
                let (t, f1, f2) = layout.decode_entry(&data[offset..offset + layout.total_width]);
                out.push((startnum + j, t, f1, f2));
                offset += layout.total_width;
            }
        }
        out
    }

    #[test]
    fn test_read_field() {
        assert_eq!(read_field(&[0x00]), 0);
        assert_eq!(read_field(&[0xFF]), 255);
        assert_eq!(read_field(&[0x01, 0x23]), 0x0123);
        assert_eq!(read_field(&[0x12, 0x34, 0x56]), 0x123456);
        assert_eq!(read_field(&[]), 0);
    }

    #[test]
    fn test_layout_defaults_index_to_size() {
        let mut dict = PdfDictionary::new();
        dict.insert("W".to_string(), int_array(&[1, 2, 1]));
        let layout = XrefStreamLayout::from_dict(&dict, 7).unwrap();
        assert_eq!(layout.widths, [1, 2, 1]);
        assert_eq!(layout.total_width, 4);
        assert_eq!(layout.index, vec![(0, 7)]);
    }

    #[test]
    fn test_layout_reads_index_pairs() {
        let mut dict = PdfDictionary::new();
        dict.insert("W".to_string(), int_array(&[1, 4, 2]));
        dict.insert("Index".to_string(), int_array(&[3, 2, 10, 5]));
        let layout = XrefStreamLayout::from_dict(&dict, 100).unwrap();
        assert_eq!(layout.total_width, 7);
        assert_eq!(layout.index, vec![(3, 2), (10, 5)]);
    }

    #[test]
    fn test_layout_rejects_missing_or_short_w() {
        let dict = PdfDictionary::new();
        assert!(XrefStreamLayout::from_dict(&dict, 5).is_none());

        let mut dict = PdfDictionary::new();
        dict.insert("W".to_string(), int_array(&[1, 2]));
        assert!(XrefStreamLayout::from_dict(&dict, 5).is_none());
    }

    #[test]
    fn test_decode_entry_standard_widths() {
        let mut dict = PdfDictionary::new();
        dict.insert("W".to_string(), int_array(&[1, 2, 1]));
        let layout = XrefStreamLayout::from_dict(&dict, 1).unwrap();

        let (t, f1, f2) = layout.decode_entry(&[0x01, 0x00, 0x50, 0x00]);
        assert_eq!((t, f1, f2), (1, 0x50, 0));

        let (t, f1, f2) = layout.decode_entry(&[0x02, 0x00, 0x01, 0x03]);
        assert_eq!((t, f1, f2), (2, 1, 3));
    }

    #[test]
    fn test_decode_entry_zero_type_width_defaults_to_in_use() {
        let mut dict = PdfDictionary::new();
        dict.insert("W".to_string(), int_array(&[0, 4, 1]));
        let layout = XrefStreamLayout::from_dict(&dict, 1).unwrap();
        assert_eq!(layout.total_width, 5);

        let (t, f1, f2) = layout.decode_entry(&[0x00, 0x00, 0x12, 0x34, 0x05]);
        assert_eq!((t, f1, f2), (1, 0x1234, 5));
    }

    #[test]
    fn test_decode_entries_spec_example() {
        // Entries {00,0000,00; 01,000F,00; 02,0034,01; 01,0050,00} with
        // widths [1,2,1]: object 3 direct at 0x50, object 2 compressed in
        // container 0x34... container field is field1 for type 2
        let mut dict = PdfDictionary::new();
        dict.insert("W".to_string(), int_array(&[1, 2, 1]));
        dict.insert("Index".to_string(), int_array(&[0, 4]));
        let layout = XrefStreamLayout::from_dict(&dict, 4).unwrap();

        let data = [
            0x00, 0x00, 0x00, 0x00, // obj 0: free
            0x01, 0x00, 0x0F, 0x00, // obj 1: direct at 0x0F
            0x02, 0x00, 0x01, 0x01, // obj 2: compressed, container 1 index 1
            0x01, 0x00, 0x50, 0x00, // obj 3: direct at 0x50
        ];
        let entries = decode_entries(&layout, &data);
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0], (0, 0, 0, 0));
        assert_eq!(entries[1], (1, 1, 0x0F, 0));
        assert_eq!(entries[2], (2, 2, 1, 1));
        assert_eq!(entries[3], (3, 1, 0x50, 0));
    }

    #[test]
    fn test_decode_entries_truncated_data_stops() {
        let mut dict = PdfDictionary::new();
        dict.insert("W".to_string(), int_array(&[1, 2, 1]));
        dict.insert("Index".to_string(), int_array(&[0, 3]));
        let layout = XrefStreamLayout::from_dict(&dict, 3).unwrap();

        let data = [0x01, 0x00, 0x0F, 0x00, 0x01]; // one full entry + scraps
        let entries = decode_entries(&layout, &data);
        assert_eq!(entries.len(), 1);
    }
}
