//! PDF Stream Filters
//!
//! Handles decompression and decoding of PDF streams according to
//! ISO 32000-1 Section 7.4, including PNG/TIFF predictor post-processing
//! used by cross-reference streams.

use std::io::Read;

use flate2::read::{DeflateDecoder, ZlibDecoder};

use super::objects::{PdfDictionary, PdfObject};
use super::{ParseError, ParseResult};

/// Supported PDF filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// ASCII hex decode
    ASCIIHexDecode,

    /// ASCII 85 decode
    ASCII85Decode,

    /// Flate decode (zlib/deflate compression)
    FlateDecode,

    /// Run length decode
    RunLengthDecode,
}

impl Filter {
    /// Parse filter from name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ASCIIHexDecode" | "AHx" => Some(Filter::ASCIIHexDecode),
            "ASCII85Decode" | "A85" => Some(Filter::ASCII85Decode),
            "FlateDecode" | "Fl" => Some(Filter::FlateDecode),
            "RunLengthDecode" | "RL" => Some(Filter::RunLengthDecode),
            _ => None,
        }
    }
}

/// Predictor parameters from a /DecodeParms dictionary
#[derive(Debug, Clone, Copy)]
struct DecodeParams {
    predictor: i64,
    columns: usize,
    colors: usize,
    bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    fn from_dict(dict: &PdfDictionary) -> Self {
        Self {
            predictor: dict.get("Predictor").and_then(|o| o.as_integer()).unwrap_or(1),
            columns: dict.get("Columns").and_then(|o| o.as_integer()).unwrap_or(1).max(1) as usize,
            colors: dict.get("Colors").and_then(|o| o.as_integer()).unwrap_or(1).max(1) as usize,
            bits_per_component: dict
                .get("BitsPerComponent")
                .and_then(|o| o.as_integer())
                .unwrap_or(8)
                .max(1) as usize,
        }
    }
}

/// Decode stream data according to the filters named in its dictionary
pub fn decode_stream(data: &[u8], dict: &PdfDictionary) -> ParseResult<Vec<u8>> {
    let filters = match dict.get("Filter") {
        Some(PdfObject::Name(name)) => vec![name.as_str().to_string()],
        Some(PdfObject::Array(array)) => {
            let mut filter_names = Vec::new();
            for obj in &array.0 {
                if let PdfObject::Name(name) = obj {
                    filter_names.push(name.as_str().to_string());
                } else {
                    return Err(ParseError::syntax(0, "Invalid filter in array"));
                }
            }
            filter_names
        }
        None => return Ok(data.to_vec()),
        _ => return Err(ParseError::syntax(0, "Invalid Filter type")),
    };

    // DecodeParms may be a single dictionary or an array parallel to Filter
    let parms: Vec<Option<DecodeParams>> = match dict.get("DecodeParms").or_else(|| dict.get("DP"))
    {
        Some(PdfObject::Dictionary(d)) => vec![Some(DecodeParams::from_dict(d))],
        Some(PdfObject::Array(array)) => array
            .0
            .iter()
            .map(|obj| obj.as_dict().map(DecodeParams::from_dict))
            .collect(),
        _ => Vec::new(),
    };

    let mut result = data.to_vec();
    for (i, filter_name) in filters.iter().enumerate() {
        let filter = Filter::from_name(filter_name).ok_or_else(|| {
            ParseError::StreamDecodeError(format!("Unknown filter: {filter_name}"))
        })?;

        result = apply_filter(&result, filter)?;

        if let Some(Some(params)) = parms.get(i) {
            if params.predictor > 1 {
                result = apply_predictor(&result, *params)?;
            }
        }
    }

    Ok(result)
}

/// Apply a single filter to data
pub fn apply_filter(data: &[u8], filter: Filter) -> ParseResult<Vec<u8>> {
    match filter {
        Filter::FlateDecode => decode_flate(data),
        Filter::ASCIIHexDecode => decode_ascii_hex(data),
        Filter::ASCII85Decode => decode_ascii85(data),
        Filter::RunLengthDecode => decode_run_length(data),
    }
}

fn decode_flate(data: &[u8]) -> ParseResult<Vec<u8>> {
    let mut output = Vec::new();
    let mut decoder = ZlibDecoder::new(data);
    if decoder.read_to_end(&mut output).is_ok() {
        return Ok(output);
    }

    // Some producers emit raw deflate without the zlib header
    output.clear();
    let mut decoder = DeflateDecoder::new(data);
    decoder
        .read_to_end(&mut output)
        .map_err(|e| ParseError::StreamDecodeError(format!("Flate decode failed: {e}")))?;
    Ok(output)
}

fn decode_ascii_hex(data: &[u8]) -> ParseResult<Vec<u8>> {
    let mut output = Vec::new();
    let mut high: Option<u8> = None;

    for &byte in data {
        if byte == b'>' {
            break;
        }
        if byte.is_ascii_whitespace() {
            continue;
        }
        let nibble = match byte {
            b'0'..=b'9' => byte - b'0',
            b'a'..=b'f' => byte - b'a' + 10,
            b'A'..=b'F' => byte - b'A' + 10,
            _ => {
                return Err(ParseError::StreamDecodeError(format!(
                    "Invalid hex digit: {byte:#04x}"
                )))
            }
        };
        match high.take() {
            Some(h) => output.push((h << 4) | nibble),
            None => high = Some(nibble),
        }
    }

    // An odd final digit is padded with zero
    if let Some(h) = high {
        output.push(h << 4);
    }

    Ok(output)
}

fn decode_ascii85(data: &[u8]) -> ParseResult<Vec<u8>> {
    let mut output = Vec::new();
    let mut group = [0u8; 5];
    let mut count = 0;

    let mut iter = data.iter().peekable();
    while let Some(&byte) = iter.next() {
        if byte.is_ascii_whitespace() {
            continue;
        }
        if byte == b'~' {
            break;
        }
        if byte == b'z' && count == 0 {
            output.extend_from_slice(&[0, 0, 0, 0]);
            continue;
        }
        if !(b'!'..=b'u').contains(&byte) {
            return Err(ParseError::StreamDecodeError(format!(
                "Invalid base-85 digit: {byte:#04x}"
            )));
        }
        group[count] = byte - b'!';
        count += 1;
        if count == 5 {
            let mut value = 0u32;
            for &digit in &group {
                value = value
                    .checked_mul(85)
                    .and_then(|v| v.checked_add(digit as u32))
                    .ok_or_else(|| {
                        ParseError::StreamDecodeError("Base-85 group overflow".to_string())
                    })?;
            }
            output.extend_from_slice(&value.to_be_bytes());
            count = 0;
        }
    }

    // Partial final group: pad with 'u', emit count-1 bytes
    if count > 0 {
        if count == 1 {
            return Err(ParseError::StreamDecodeError(
                "Truncated base-85 group".to_string(),
            ));
        }
        for slot in group.iter_mut().skip(count) {
            *slot = 84;
        }
        let mut value = 0u32;
        for &digit in &group {
            value = value.wrapping_mul(85).wrapping_add(digit as u32);
        }
        let bytes = value.to_be_bytes();
        output.extend_from_slice(&bytes[..count - 1]);
    }

    Ok(output)
}

fn decode_run_length(data: &[u8]) -> ParseResult<Vec<u8>> {
    let mut output = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let length = data[i];
        i += 1;
        match length {
            0..=127 => {
                let count = length as usize + 1;
                if i + count > data.len() {
                    return Err(ParseError::StreamDecodeError(
                        "Run-length data truncated".to_string(),
                    ));
                }
                output.extend_from_slice(&data[i..i + count]);
                i += count;
            }
            129..=255 => {
                if i >= data.len() {
                    return Err(ParseError::StreamDecodeError(
                        "Run-length data truncated".to_string(),
                    ));
                }
                let count = 257 - length as usize;
                output.extend(std::iter::repeat(data[i]).take(count));
                i += 1;
            }
            128 => break, // EOD
        }
    }

    Ok(output)
}

/// Undo a TIFF (2) or PNG (10-15) predictor applied before compression
fn apply_predictor(data: &[u8], params: DecodeParams) -> ParseResult<Vec<u8>> {
    let bpp = (params.colors * params.bits_per_component).div_ceil(8).max(1);
    let row_len = (params.colors * params.bits_per_component * params.columns).div_ceil(8);
    if row_len == 0 {
        return Ok(data.to_vec());
    }

    match params.predictor {
        2 => {
            // TIFF horizontal differencing; only the 8-bit case is seen in
            // practice for xref streams
            if params.bits_per_component != 8 {
                return Ok(data.to_vec());
            }
            let mut output = data.to_vec();
            for row in output.chunks_mut(row_len) {
                for i in bpp..row.len() {
                    row[i] = row[i].wrapping_add(row[i - bpp]);
                }
            }
            Ok(output)
        }
        10..=15 => decode_png_predictor(data, row_len, bpp),
        _ => Err(ParseError::StreamDecodeError(format!(
            "Unsupported predictor: {}",
            params.predictor
        ))),
    }
}

fn decode_png_predictor(data: &[u8], row_len: usize, bpp: usize) -> ParseResult<Vec<u8>> {
    // Each row is prefixed by one filter-type byte
    let stride = row_len + 1;
    let mut output = Vec::with_capacity(data.len());
    let mut prev_row = vec![0u8; row_len];

    for chunk in data.chunks(stride) {
        if chunk.len() < 2 {
            break;
        }
        let filter_type = chunk[0];
        let mut row = chunk[1..].to_vec();

        match filter_type {
            0 => {}
            1 => {
                // Sub
                for i in bpp..row.len() {
                    row[i] = row[i].wrapping_add(row[i - bpp]);
                }
            }
            2 => {
                // Up
                for (i, byte) in row.iter_mut().enumerate() {
                    *byte = byte.wrapping_add(prev_row[i]);
                }
            }
            3 => {
                // Average
                for i in 0..row.len() {
                    let left = if i >= bpp { row[i - bpp] as u16 } else { 0 };
                    let up = prev_row[i] as u16;
                    row[i] = row[i].wrapping_add(((left + up) / 2) as u8);
                }
            }
            4 => {
                // Paeth
                for i in 0..row.len() {
                    let left = if i >= bpp { row[i - bpp] as i16 } else { 0 };
                    let up = prev_row[i] as i16;
                    let up_left = if i >= bpp { prev_row[i - bpp] as i16 } else { 0 };
                    row[i] = row[i].wrapping_add(paeth(left, up, up_left));
                }
            }
            _ => {
                return Err(ParseError::StreamDecodeError(format!(
                    "Invalid PNG filter type: {filter_type}"
                )))
            }
        }

        output.extend_from_slice(&row);
        prev_row.clear();
        prev_row.extend_from_slice(&row);
        prev_row.resize(row_len, 0);
    }

    Ok(output)
}

fn paeth(a: i16, b: i16, c: i16) -> u8 {
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();
    if pa <= pb && pa <= pc {
        a as u8
    } else if pb <= pc {
        b as u8
    } else {
        c as u8
    }
}
