//! Compressed `<diagram>` bodies: the model XML is percent-encoded, raw
//! deflated and then base64 encoded.

use crate::parse::ParseResult;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::{DeflateDecoder, DeflateEncoder};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use std::io::{self, Read};

/// Same unreserved set as JavaScript's `encodeURIComponent`.
const ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Decode a compressed payload back to model XML. Whitespace anywhere in the
/// payload is ignored.
pub fn decode_diagram(payload: &str) -> ParseResult<String> {
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let decoded = STANDARD.decode(compact)?;
    let mut decoder = DeflateDecoder::new(&decoded[..]);
    let mut inflated = Vec::new();
    decoder.read_to_end(&mut inflated)?;
    let inflated = std::str::from_utf8(&inflated)?;
    Ok(percent_decode_str(inflated).decode_utf8()?.into_owned())
}

pub fn encode_diagram(xml: &str) -> io::Result<String> {
    let encoded_xml = utf8_percent_encode(xml, ENCODE_SET).to_string();
    let mut encoder = DeflateEncoder::new(encoded_xml.as_bytes(), Compression::default());
    let mut compressed = Vec::new();
    encoder.read_to_end(&mut compressed)?;
    Ok(STANDARD.encode(compressed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::ParseError;

    #[test]
    fn encoded_payload_decodes_to_the_same_xml() {
        let xml = r#"<mxGraphModel><root><mxCell id="0" value="ä &amp; ü"/></root></mxGraphModel>"#;
        let payload = encode_diagram(xml).expect("encode");
        assert!(payload.chars().all(|c| c.is_ascii_alphanumeric() || "+/=".contains(c)));
        assert_eq!(decode_diagram(&payload).expect("decode"), xml);
    }

    #[test]
    fn wrapped_payload_lines_are_accepted() {
        let payload = encode_diagram("<mxGraphModel/>").expect("encode");
        let (head, tail) = payload.split_at(payload.len() / 2);
        let wrapped = format!("\n  {head}\n  {tail}\n");
        assert_eq!(decode_diagram(&wrapped).expect("decode"), "<mxGraphModel/>");
    }

    #[test]
    fn invalid_base64_is_reported() {
        assert!(matches!(decode_diagram("not base64!"), Err(ParseError::Base64(_))));
    }
}
