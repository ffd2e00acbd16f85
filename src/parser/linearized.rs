//! Linearization Dictionary
//!
//! First-object dictionary of a fast-web-view PDF (ISO 32000-1 Annex F).
//! Its /T entry points at the first entry of the main cross-reference
//! table, which is loaded in a second phase after the first page.

use super::objects::PdfObject;

/// Parsed linearization parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearizedHeader {
    /// /L: total file length the producer wrote
    file_length: u64,
    /// /O: object number of the first page
    first_page_obj_num: u32,
    /// /P: page number of the first page (default 0)
    first_page_no: u32,
    /// /N: page count
    page_count: u32,
    /// /T: offset of the first entry in the main xref table
    main_xref_offset: u64,
    /// /E: end offset of the first page
    first_page_end: u64,
}

impl LinearizedHeader {
    /// Validate a candidate first object. Only dictionaries carrying a
    /// /Linearized marker with plausible /L, /O, /N and /T entries qualify.
    pub fn from_object(object: &PdfObject) -> Option<Self> {
        let dict = object.as_dict()?;
        dict.get("Linearized")?;

        let file_length = dict.get_direct_int("L");
        let first_page_obj_num = dict.get_direct_int("O");
        let page_count = dict.get_direct_int("N");
        let main_xref_offset = dict.get_direct_int("T");
        let first_page_no = dict.get_direct_int("P");
        let first_page_end = dict.get_direct_int("E");

        if file_length <= 0 || first_page_obj_num <= 0 || page_count <= 0 || main_xref_offset <= 0
        {
            return None;
        }

        Some(Self {
            file_length: file_length as u64,
            first_page_obj_num: first_page_obj_num as u32,
            first_page_no: first_page_no.max(0) as u32,
            page_count: page_count as u32,
            main_xref_offset: main_xref_offset as u64,
            first_page_end: first_page_end.max(0) as u64,
        })
    }

    pub fn file_length(&self) -> u64 {
        self.file_length
    }

    pub fn first_page_obj_num(&self) -> u32 {
        self.first_page_obj_num
    }

    pub fn first_page_no(&self) -> u32 {
        self.first_page_no
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn main_xref_offset(&self) -> u64 {
        self.main_xref_offset
    }

    pub fn first_page_end(&self) -> u64 {
        self.first_page_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::objects::{PdfDictionary, PdfObject};

    fn linearized_dict() -> PdfDictionary {
        let mut dict = PdfDictionary::new();
        dict.insert("Linearized".to_string(), PdfObject::Integer(1));
        dict.insert("L".to_string(), PdfObject::Integer(5000));
        dict.insert("O".to_string(), PdfObject::Integer(3));
        dict.insert("N".to_string(), PdfObject::Integer(2));
        dict.insert("T".to_string(), PdfObject::Integer(4200));
        dict.insert("E".to_string(), PdfObject::Integer(1800));
        dict
    }

    #[test]
    fn test_valid_header() {
        let header =
            LinearizedHeader::from_object(&PdfObject::Dictionary(linearized_dict())).unwrap();
        assert_eq!(header.file_length(), 5000);
        assert_eq!(header.first_page_obj_num(), 3);
        assert_eq!(header.page_count(), 2);
        assert_eq!(header.main_xref_offset(), 4200);
        assert_eq!(header.first_page_end(), 1800);
        assert_eq!(header.first_page_no(), 0);
    }

    #[test]
    fn test_missing_marker_rejected() {
        let mut dict = linearized_dict();
        dict.0.remove(&crate::parser::objects::PdfName("Linearized".to_string()));
        assert!(LinearizedHeader::from_object(&PdfObject::Dictionary(dict)).is_none());
    }

    #[test]
    fn test_implausible_values_rejected() {
        let mut dict = linearized_dict();
        dict.insert("L".to_string(), PdfObject::Integer(0));
        assert!(LinearizedHeader::from_object(&PdfObject::Dictionary(dict)).is_none());

        let mut dict = linearized_dict();
        dict.insert("T".to_string(), PdfObject::Integer(-5));
        assert!(LinearizedHeader::from_object(&PdfObject::Dictionary(dict)).is_none());
    }

    #[test]
    fn test_non_dictionary_rejected() {
        assert!(LinearizedHeader::from_object(&PdfObject::Integer(1)).is_none());
    }
}
