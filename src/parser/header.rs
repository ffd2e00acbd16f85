//! PDF Header Detection
//!
//! Locates the `%PDF-M.m` marker within the first kibibyte of the file,
//! tolerating leading junk bytes. All file offsets found inside the PDF are
//! interpreted relative to the marker position.

use std::io::{Read, Seek, SeekFrom};

use super::{ParseError, ParseResult};

/// How far into the file the `%PDF-` marker may appear.
const HEADER_SEARCH_LIMIT: usize = 1024;

/// Location and version information from the file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdfHeader {
    /// Number of junk bytes before `%PDF-`; added to every in-file offset
    pub offset: u64,
    /// Encoded version, `10 * major + minor` (e.g. 17 for PDF 1.7)
    pub version: u32,
}

/// Find the header marker in the first kibibyte of `reader`.
pub fn locate_header<R: Read + Seek>(reader: &mut R) -> ParseResult<PdfHeader> {
    reader.seek(SeekFrom::Start(0))?;
    let mut buf = vec![0u8; HEADER_SEARCH_LIMIT + 8];
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);

    let offset = buf
        .windows(5)
        .take(HEADER_SEARCH_LIMIT)
        .position(|w| w == b"%PDF-")
        .ok_or(ParseError::InvalidHeader)?;

    // Version digits sit at fixed positions after the marker: "%PDF-M.m"
    let mut version = 0;
    if let Some(&major) = buf.get(offset + 5) {
        if major.is_ascii_digit() {
            version = (major - b'0') as u32 * 10;
        }
    }
    if let Some(&minor) = buf.get(offset + 7) {
        if minor.is_ascii_digit() {
            version += (minor - b'0') as u32;
        }
    }

    Ok(PdfHeader {
        offset: offset as u64,
        version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_header_at_offset_zero() {
        let mut input = Cursor::new(b"%PDF-1.7\n".to_vec());
        let header = locate_header(&mut input).unwrap();
        assert_eq!(header.offset, 0);
        assert_eq!(header.version, 17);
    }

    #[test]
    fn test_header_after_junk() {
        let mut data = b"GARBAGE BYTES ".to_vec();
        data.extend_from_slice(b"%PDF-1.4\n1 0 obj\n");
        let mut input = Cursor::new(data);
        let header = locate_header(&mut input).unwrap();
        assert_eq!(header.offset, 14);
        assert_eq!(header.version, 14);
    }

    #[test]
    fn test_header_at_search_limit() {
        let mut data = vec![b'x'; 1023];
        data.extend_from_slice(b"%PDF-2.0\n");
        let mut input = Cursor::new(data);
        let header = locate_header(&mut input).unwrap();
        assert_eq!(header.offset, 1023);
        assert_eq!(header.version, 20);
    }

    #[test]
    fn test_header_beyond_search_limit() {
        let mut data = vec![b'x'; 1024];
        data.extend_from_slice(b"%PDF-1.5\n");
        let mut input = Cursor::new(data);
        assert!(matches!(
            locate_header(&mut input),
            Err(ParseError::InvalidHeader)
        ));
    }

    #[test]
    fn test_missing_header() {
        let mut input = Cursor::new(b"Not a PDF at all".to_vec());
        assert!(matches!(
            locate_header(&mut input),
            Err(ParseError::InvalidHeader)
        ));
    }

    #[test]
    fn test_malformed_version_digits() {
        // Non-digit version bytes leave the version at zero rather than failing
        let mut input = Cursor::new(b"%PDF-x.y\n".to_vec());
        let header = locate_header(&mut input).unwrap();
        assert_eq!(header.version, 0);
    }

    #[test]
    fn test_truncated_after_marker() {
        let mut input = Cursor::new(b"%PDF-".to_vec());
        let header = locate_header(&mut input).unwrap();
        assert_eq!(header.offset, 0);
        assert_eq!(header.version, 0);
    }
}
