//! Classical cross-reference table parsing, end to end

use std::io::Cursor;

use crosspdf::parser::syntax::SyntaxReader;
use crosspdf::{ObjectKind, PdfParser};

fn obj(buf: &mut Vec<u8>, objnum: u32, gen: u16, body: &str) -> u64 {
    let off = buf.len() as u64;
    buf.extend_from_slice(format!("{objnum} {gen} obj\n{body}\nendobj\n").as_bytes());
    off
}

fn xref_table(buf: &mut Vec<u8>, start: u32, entries: &[(u64, u16, char)]) -> u64 {
    let off = buf.len() as u64;
    buf.extend_from_slice(format!("xref\n{start} {}\n", entries.len()).as_bytes());
    for (offset, gen, flag) in entries {
        buf.extend_from_slice(format!("{offset:010} {gen:05} {flag} \n").as_bytes());
    }
    off
}

fn finish(buf: &mut Vec<u8>, trailer: &str, startxref: u64) {
    buf.extend_from_slice(
        format!("trailer\n{trailer}\nstartxref\n{startxref}\n%%EOF").as_bytes(),
    );
}

/// Header, catalog, page tree, one page, one xref section
fn simple_pdf() -> (Vec<u8>, [u64; 4]) {
    let mut buf = b"%PDF-1.4\n".to_vec();
    let off1 = obj(&mut buf, 1, 0, "<< /Type /Catalog /Pages 2 0 R >>");
    let off2 = obj(&mut buf, 2, 0, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>");
    let off3 = obj(&mut buf, 3, 0, "<< /Type /Page /Parent 2 0 R >>");
    let xref = xref_table(
        &mut buf,
        0,
        &[(0, 65535, 'f'), (off1, 0, 'n'), (off2, 0, 'n'), (off3, 0, 'n')],
    );
    finish(&mut buf, "<< /Size 4 /Root 1 0 R >>", xref);
    (buf, [off1, off2, off3, xref])
}

#[test]
fn test_trivial_pdf() {
    let (buf, [off1, off2, _, xref]) = simple_pdf();
    let mut parser = PdfParser::new(Cursor::new(buf)).unwrap();
    parser.start_parse().unwrap();

    assert_eq!(parser.file_version(), 14);
    assert_eq!(parser.root_obj_num(), 1);
    assert_eq!(parser.last_obj_num(), 3);
    assert_eq!(parser.page_count(), 1);
    assert_eq!(parser.trailer_count(), 1);
    assert_eq!(parser.last_xref_offset(), xref);
    assert!(!parser.version_updated());
    assert!(!parser.is_xref_stream());

    assert_eq!(parser.object_kind(0), ObjectKind::Free);
    assert_eq!(parser.object_kind(1), ObjectKind::Direct);
    assert_eq!(parser.object_offset(1), off1);
    assert_eq!(parser.object_gen_num(1), 0);
    assert!(parser.is_object_free_or_null(0));
    assert!(!parser.is_object_free_or_null(1));

    assert!(parser.is_valid_object_number(3));
    assert!(!parser.is_valid_object_number(4));

    // The next known offset bounds each object
    assert_eq!(parser.object_size(1), off2 - off1);
    assert!(parser.object_size(2) > 0);

    // No encryption: every permission granted
    assert_eq!(parser.permissions(), 0xFFFF_FFFF);
    assert_eq!(parser.info_obj_num(), 0);
}

#[test]
fn test_resolve_matches_object_numbers() {
    let (buf, _) = simple_pdf();
    let mut parser = PdfParser::new(Cursor::new(buf)).unwrap();
    parser.start_parse().unwrap();

    let catalog = parser.parse_indirect_object(1).unwrap().unwrap();
    assert_eq!(catalog.as_dict().unwrap().get_type(), Some("Catalog"));

    let pages = parser.parse_indirect_object(2).unwrap().unwrap();
    assert_eq!(pages.as_dict().unwrap().get_type(), Some("Pages"));

    // Free and out-of-range object numbers resolve to nothing
    assert!(parser.parse_indirect_object(0).unwrap().is_none());
    assert!(parser.parse_indirect_object(99).unwrap().is_none());
}

#[test]
fn test_indirect_binary_reparses_to_same_object() {
    let (buf, _) = simple_pdf();
    let mut parser = PdfParser::new(Cursor::new(buf)).unwrap();
    parser.start_parse().unwrap();

    let binary = parser.indirect_binary(1);
    assert!(binary.starts_with(b"1 0 obj"));

    let mut reader = SyntaxReader::new(Cursor::new(binary), 0).unwrap();
    reader.next_word();
    reader.next_word();
    assert_eq!(reader.next_keyword(), b"obj".to_vec());
    let reparsed = reader.parse_object(1, 0).unwrap();

    let resolved = parser.parse_indirect_object(1).unwrap().unwrap();
    assert_eq!(reparsed, resolved);
}

#[test]
fn test_incremental_update_newest_wins() {
    let (mut buf, [_, _, _, xref1]) = simple_pdf();

    // Appended revision rewrites the catalog with generation 1
    let off1b = obj(
        &mut buf,
        1,
        1,
        "<< /Type /Catalog /Pages 2 0 R /PageMode /UseOutlines >>",
    );
    let xref2 = xref_table(&mut buf, 1, &[(off1b, 1, 'n')]);
    finish(
        &mut buf,
        &format!("<< /Size 4 /Root 1 0 R /Prev {xref1} >>"),
        xref2,
    );

    let mut parser = PdfParser::new(Cursor::new(buf)).unwrap();
    parser.start_parse().unwrap();

    assert_eq!(parser.trailer_count(), 2);
    assert!(parser.version_updated());
    assert_eq!(parser.object_offset(1), off1b);
    assert_eq!(parser.object_gen_num(1), 1);

    let catalog = parser.parse_indirect_object(1).unwrap().unwrap();
    assert!(catalog.as_dict().unwrap().contains_key("PageMode"));

    // Objects untouched by the update keep their original location
    assert_eq!(parser.object_kind(2), ObjectKind::Direct);
    assert_eq!(parser.page_count(), 1);
}

#[test]
fn test_size_shrinks_index() {
    let mut buf = b"%PDF-1.4\n".to_vec();
    let off1 = obj(&mut buf, 1, 0, "<< /Type /Catalog /Pages 2 0 R >>");
    let off2 = obj(&mut buf, 2, 0, "<< /Type /Pages /Kids [] /Count 1 >>");
    let off3 = obj(&mut buf, 3, 0, "<< /A 1 >>");
    let xref = xref_table(
        &mut buf,
        0,
        &[(0, 65535, 'f'), (off1, 0, 'n'), (off2, 0, 'n'), (off3, 0, 'n')],
    );
    // /Size 3 drops object 3
    finish(&mut buf, "<< /Size 3 /Root 1 0 R >>", xref);

    let mut parser = PdfParser::new(Cursor::new(buf)).unwrap();
    parser.start_parse().unwrap();

    assert_eq!(parser.last_obj_num(), 2);
    assert!(parser.parse_indirect_object(3).unwrap().is_none());
}

#[test]
fn test_size_larger_than_objects_tolerated() {
    let mut buf = b"%PDF-1.4\n".to_vec();
    let off1 = obj(&mut buf, 1, 0, "<< /Type /Catalog /Pages 2 0 R >>");
    let off2 = obj(&mut buf, 2, 0, "<< /Type /Pages /Kids [] /Count 1 >>");
    let xref = xref_table(&mut buf, 0, &[(0, 65535, 'f'), (off1, 0, 'n'), (off2, 0, 'n')]);
    finish(&mut buf, "<< /Size 10 /Root 1 0 R >>", xref);

    let mut parser = PdfParser::new(Cursor::new(buf)).unwrap();
    parser.start_parse().unwrap();

    assert_eq!(parser.last_obj_num(), 9);
    assert!(parser.is_object_free_or_null(9));
    assert_eq!(parser.root_obj_num(), 1);
}

#[test]
fn test_header_after_junk_prefix() {
    let (pdf, [off1, _, _, _]) = simple_pdf();
    let mut buf = b"<<<junk bytes before the header>>>".to_vec();
    buf.extend_from_slice(&pdf);

    let mut parser = PdfParser::new(Cursor::new(buf)).unwrap();
    parser.start_parse().unwrap();

    assert_eq!(parser.root_obj_num(), 1);
    // In-file offsets are relative to the header marker
    assert_eq!(parser.object_offset(1), off1);
    let catalog = parser.parse_indirect_object(1).unwrap().unwrap();
    assert_eq!(catalog.as_dict().unwrap().get_type(), Some("Catalog"));
}

#[test]
fn test_info_obj_num_found_in_older_trailer() {
    let mut buf = b"%PDF-1.4\n".to_vec();
    let off1 = obj(&mut buf, 1, 0, "<< /Type /Catalog /Pages 2 0 R >>");
    let off2 = obj(&mut buf, 2, 0, "<< /Type /Pages /Kids [] /Count 1 >>");
    let off4 = obj(&mut buf, 4, 0, "<< /Producer (test) >>");
    let xref1 = xref_table(
        &mut buf,
        0,
        &[(0, 65535, 'f'), (off1, 0, 'n'), (off2, 0, 'n'), (0, 0, 'f'), (off4, 0, 'n')],
    );
    finish(&mut buf, "<< /Size 5 /Root 1 0 R /Info 4 0 R >>", xref1);

    // Update whose trailer lacks /Info
    let off1b = obj(&mut buf, 1, 0, "<< /Type /Catalog /Pages 2 0 R >>");
    let xref2 = xref_table(&mut buf, 1, &[(off1b, 0, 'n')]);
    finish(
        &mut buf,
        &format!("<< /Size 5 /Root 1 0 R /Prev {xref1} >>"),
        xref2,
    );

    let mut parser = PdfParser::new(Cursor::new(buf)).unwrap();
    parser.start_parse().unwrap();
    assert_eq!(parser.info_obj_num(), 4);
}

#[test]
fn test_open_from_disk() {
    let (buf, _) = simple_pdf();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("simple.pdf");
    std::fs::write(&path, &buf).unwrap();

    let mut parser = PdfParser::open(&path).unwrap();
    parser.start_parse().unwrap();
    assert_eq!(parser.root_obj_num(), 1);
    assert_eq!(parser.page_count(), 1);
}

#[test]
fn test_parse_twice_is_rejected() {
    let (buf, _) = simple_pdf();
    let mut parser = PdfParser::new(Cursor::new(buf)).unwrap();
    parser.start_parse().unwrap();
    assert!(parser.start_parse().is_err());
}
