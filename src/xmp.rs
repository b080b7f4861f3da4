//! Minimal XMP packet handle
//!
//! Just enough XMP parsing to validate an extracted packet and look up simple
//! key/value pairs in it.
//!
//! XMP Structure:
//! - XMP packets are XML-based RDF metadata
//! - Properties can be attributes on rdf:Description or child elements
//! - Packets are often padded with whitespace (and sometimes NULs) to leave
//!   room for in-place edits

use crate::error::{Error, Result};
use quick_xml::{events::Event, name::QName, Reader};

const RDF_DESCRIPTION: &[u8] = b"rdf:Description";

/// A parsed XMP packet
///
/// # Example
///
/// ```
/// use image_meta_io::XmpPacket;
///
/// let xmp = XmpPacket::parse(br#"<rdf:Description dc:format="image/png" />"#).unwrap();
/// assert_eq!(xmp.property("dc:format").as_deref(), Some("image/png"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmpPacket {
    text: String,
}

impl XmpPacket {
    /// Validate and wrap raw XMP bytes
    ///
    /// The packet must be UTF-8 and a well-formed XML event stream. Trailing
    /// NUL padding is dropped.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let end = data.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        let text = std::str::from_utf8(&data[..end])
            .map_err(|e| Error::InvalidFormat(format!("XMP is not UTF-8: {}", e)))?;

        let mut reader = Reader::from_str(text);
        while !matches!(reader.read_event()?, Event::Eof) {}

        Ok(Self {
            text: text.to_string(),
        })
    }

    /// The packet as text
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Look up a property by its qualified name (e.g. `"dc:format"`)
    pub fn property(&self, key: &str) -> Option<String> {
        extract_key(&self.text, key)
    }
}

/// Extract a value from XMP using a key.
///
/// Searches for the key as an attribute on `rdf:Description` or as a child element.
fn extract_key(xmp: &str, key: &str) -> Option<String> {
    let mut reader = Reader::from_str(xmp);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if e.name() == QName(RDF_DESCRIPTION) {
                    // Search attributes
                    for attr in e.attributes().flatten() {
                        if attr.key == QName(key.as_bytes()) {
                            if let Ok(s) = String::from_utf8(attr.value.to_vec()) {
                                return Some(s);
                            }
                        }
                    }
                } else if e.name() == QName(key.as_bytes()) {
                    // Search as element
                    if let Ok(Event::Text(text)) = reader.read_event() {
                        if let Ok(s) = std::str::from_utf8(&text) {
                            return Some(s.to_string());
                        }
                    }
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TEST_XMP;

    #[test]
    fn test_property_lookup() {
        let xmp = XmpPacket::parse(TEST_XMP.as_bytes()).unwrap();
        assert_eq!(xmp.property("dc:format").as_deref(), Some("image/jpeg"));
        assert_eq!(xmp.property("xmp:Rating").as_deref(), Some("4"));
        assert_eq!(xmp.property("nonexistent"), None);
    }

    #[test]
    fn test_trailing_nul_padding_is_dropped() {
        let mut data = TEST_XMP.as_bytes().to_vec();
        data.extend_from_slice(&[0; 16]);
        let xmp = XmpPacket::parse(&data).unwrap();
        assert!(xmp.as_str().ends_with("<?xpacket end=\"w\"?>"));
    }

    #[test]
    fn test_rejects_invalid_packets() {
        assert!(matches!(
            XmpPacket::parse(&[0xC3, 0x28]),
            Err(Error::InvalidFormat(_))
        ));
        assert!(XmpPacket::parse(b"<a><b></a>").is_err());
    }
}
