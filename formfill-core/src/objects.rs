//! Small helpers over the lopdf object model

use crate::error::{FillError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};

/// Maximum number of reference hops followed before giving up.
const MAX_REFERENCE_DEPTH: usize = 32;

/// Follow indirect references until a direct object is reached.
pub(crate) fn resolve<'a>(doc: &'a Document, mut object: &'a Object) -> Result<&'a Object> {
    for _ in 0..MAX_REFERENCE_DEPTH {
        match object {
            Object::Reference(id) => object = doc.get_object(*id)?,
            direct => return Ok(direct),
        }
    }
    Err(FillError::InvalidStructure(
        "reference chain too deep".to_string(),
    ))
}

/// Look up `key` in `dict` and resolve it.
pub(crate) fn get<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().and_then(|o| resolve(doc, o).ok())
}

pub(crate) fn get_dict<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Dictionary> {
    get(doc, dict, key).and_then(|o| o.as_dict().ok())
}

pub(crate) fn get_name<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a [u8]> {
    get(doc, dict, key).and_then(|o| o.as_name().ok())
}

pub(crate) fn get_i64(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<i64> {
    get(doc, dict, key).and_then(|o| o.as_i64().ok())
}

pub(crate) fn get_text(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    match get(doc, dict, key)? {
        Object::String(bytes, _) => Some(decode_text(bytes)),
        _ => None,
    }
}

pub(crate) fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Read a numeric array of exactly `N` entries.
pub(crate) fn numbers<const N: usize>(doc: &Document, object: &Object) -> Option<[f32; N]> {
    let array = resolve(doc, object).ok()?.as_array().ok()?;
    if array.len() != N {
        return None;
    }
    let mut out = [0.0; N];
    for (slot, item) in out.iter_mut().zip(array) {
        *slot = number(resolve(doc, item).ok()?)?;
    }
    Some(out)
}

/// Axis-aligned rectangle in default user space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    /// Build from a PDF rectangle array, normalising corner order.
    pub(crate) fn from_object(doc: &Document, object: &Object) -> Option<Self> {
        let [a, b, c, d] = numbers::<4>(doc, object)?;
        Some(Self {
            x0: a.min(c),
            y0: b.min(d),
            x1: a.max(c),
            y1: b.max(d),
        })
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub(crate) fn to_object(self) -> Object {
        Object::Array(vec![
            Object::Real(self.x0),
            Object::Real(self.y0),
            Object::Real(self.x1),
            Object::Real(self.y1),
        ])
    }
}

/// Decode a PDF text string (UTF-16BE with BOM, otherwise single-byte).
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// Encode a text string, falling back to UTF-16BE for non-ASCII content.
pub fn encode_text(text: &str) -> Object {
    if text.is_ascii() {
        return Object::String(text.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Object id of the document catalog.
pub(crate) fn catalog_id(doc: &Document) -> Result<ObjectId> {
    doc.trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| FillError::InvalidStructure("trailer has no /Root reference".to_string()))
}

/// The interactive form dictionary, if the document has one.
pub(crate) fn acro_form(doc: &Document) -> Result<Option<&Dictionary>> {
    let catalog = doc.get_dictionary(catalog_id(doc)?)?;
    Ok(get_dict(doc, catalog, b"AcroForm"))
}
