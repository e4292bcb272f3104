use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use engine_logging::engine_warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub encoding_label: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("the file could not be read as {encoding} text")]
    DecodeFailure { encoding: String },
}

/// Strictly decodes raw bytes (an exported CSV) into UTF-8.
///
/// Order: BOM -> Content-Type charset -> chardetng guess. The BOM is never
/// part of the returned text. Any malformed sequence is an error.
pub fn decode_bytes(bytes: &[u8], content_type: Option<&str>) -> Result<DecodedText, DecodeError> {
    let (enc, body) = select_encoding(bytes, content_type);
    let (text, had_errors) = enc.decode_without_bom_handling(body);
    if had_errors {
        return Err(DecodeError::DecodeFailure {
            encoding: enc.name().to_string(),
        });
    }
    Ok(DecodedText {
        text: text.into_owned(),
        encoding_label: enc.name().to_string(),
    })
}

/// Same encoding selection as [`decode_bytes`], but malformed sequences
/// become U+FFFD so the rest of a page survives.
pub fn decode_bytes_lossy(bytes: &[u8], content_type: Option<&str>) -> DecodedText {
    let (enc, body) = select_encoding(bytes, content_type);
    let (text, had_errors) = enc.decode_without_bom_handling(body);
    if had_errors {
        engine_warn!("malformed {} input replaced with U+FFFD", enc.name());
    }
    DecodedText {
        text: text.into_owned(),
        encoding_label: enc.name().to_string(),
    }
}

/// Picks the encoding and strips a BOM if one was found.
fn select_encoding<'a>(
    bytes: &'a [u8],
    content_type: Option<&str>,
) -> (&'static Encoding, &'a [u8]) {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return (encoding, &bytes[bom_len..]);
    }

    if let Some(label) = content_type.and_then(extract_charset) {
        if let Some(enc) = Encoding::for_label(label.as_bytes()) {
            return (enc, bytes);
        }
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    (detector.guess(None, true), bytes)
}

fn extract_charset(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|part| {
        let (key, value) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim_matches([' ', '"', '\''].as_ref()).to_string())
    })
}
