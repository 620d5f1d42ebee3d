//! Writing values into form fields

use crate::appearance::{self, DefaultAppearance, Quadding, TextAppearance};
use crate::error::Result;
use crate::fields::{self, FieldIndex, FieldKind, FormField};
use crate::mapping::{FieldValues, CHECKED, UNCHECKED};
use crate::objects::{self, Rect};
use lopdf::{dictionary, Document, Object, ObjectId};

const MAX_PARENT_DEPTH: usize = 32;

/// Outcome of writing values into a document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillReport {
    /// Fields that received a value
    pub written: Vec<String>,
    /// Fields that exist but cannot hold a value (push buttons, signatures)
    pub unsupported: Vec<String>,
    /// Values whose field is not in the document
    pub not_found: Vec<String>,
}

/// Write `values` into the document's form fields and regenerate widget
/// appearances. The document stays editable.
///
/// Values are keyed by fully qualified field name or by partial name; the
/// report lists them under the key they were given with.
pub fn fill_document(doc: &mut Document, values: &FieldValues) -> Result<FillReport> {
    let index = FieldIndex::from_document(doc)?;
    let mut report = FillReport::default();

    for (name, value) in values.iter() {
        let Some(field) = index.find(name) else {
            tracing::debug!(field = name, "field not present in document");
            report.not_found.push(name.to_string());
            continue;
        };
        match field.kind {
            FieldKind::Text | FieldKind::Choice => fill_text(doc, field, value)?,
            FieldKind::Checkbox | FieldKind::Radio => fill_toggle(doc, field, value)?,
            kind => {
                tracing::warn!(field = name, %kind, "cannot write a value into this field type");
                report.unsupported.push(name.to_string());
                continue;
            }
        }
        tracing::trace!(field = name, value, "field written");
        report.written.push(name.to_string());
    }

    if !report.written.is_empty() {
        clear_need_appearances(doc)?;
    }
    Ok(report)
}

fn fill_text(doc: &mut Document, field: &FormField, value: &str) -> Result<()> {
    doc.get_dictionary_mut(field.id)?
        .set("V", objects::encode_text(value));

    for widget in &field.widgets {
        let Some(stream) = text_appearance(doc, *widget, field.flags, value)? else {
            tracing::debug!(field = %field.name, "widget has no usable rectangle");
            continue;
        };
        let stream_id = doc.add_object(stream);
        doc.get_dictionary_mut(*widget)?
            .set("AP", dictionary! { "N" => stream_id });
    }
    Ok(())
}

fn text_appearance(
    doc: &Document,
    widget: ObjectId,
    flags: i64,
    value: &str,
) -> Result<Option<lopdf::Stream>> {
    let dict = doc.get_dictionary(widget)?;
    let Some(rect) = dict.get(b"Rect").ok().and_then(|r| Rect::from_object(doc, r)) else {
        return Ok(None);
    };
    let form = objects::acro_form(doc)?;

    let da_text = inherited(doc, widget, b"DA")
        .or_else(|| form.and_then(|f| f.get(b"DA").ok()))
        .and_then(|o| match objects::resolve(doc, o).ok()? {
            Object::String(bytes, _) => Some(objects::decode_text(bytes)),
            _ => None,
        });
    let da = da_text
        .map(|s| DefaultAppearance::parse(&s))
        .unwrap_or_default();
    let quadding = inherited(doc, widget, b"Q")
        .or_else(|| form.and_then(|f| f.get(b"Q").ok()))
        .and_then(|o| objects::resolve(doc, o).ok()?.as_i64().ok())
        .map(Quadding::from_pdf)
        .unwrap_or_default();
    let max_len = inherited(doc, widget, b"MaxLen")
        .and_then(|o| objects::resolve(doc, o).ok()?.as_i64().ok());
    let font = form
        .and_then(|f| objects::get_dict(doc, f, b"DR"))
        .and_then(|dr| objects::get_dict(doc, dr, b"Font"))
        .and_then(|fonts| fonts.get(da.font.as_bytes()).ok())
        .cloned()
        .unwrap_or_else(|| Object::Dictionary(appearance::helvetica()));

    let rotation = objects::get_dict(doc, dict, b"MK")
        .and_then(|mk| objects::get_i64(doc, mk, b"R"))
        .unwrap_or(0)
        .rem_euclid(360);
    let (width, height) = match rotation {
        90 | 270 => (rect.height(), rect.width()),
        _ => (rect.width(), rect.height()),
    };

    let mut stream = TextAppearance {
        value,
        width,
        height,
        da,
        quadding,
        flags,
        max_len,
        font,
    }
    .to_stream()?;
    if let Some(matrix) = rotation_matrix(rotation, rect) {
        stream.dict.set("Matrix", matrix);
    }
    Ok(Some(stream))
}

/// Matrix mapping a rotated widget's appearance back onto its rectangle.
fn rotation_matrix(rotation: i64, rect: Rect) -> Option<Vec<Object>> {
    let (w, h) = (rect.width(), rect.height());
    let m: [f32; 6] = match rotation {
        90 => [0.0, 1.0, -1.0, 0.0, w, 0.0],
        180 => [-1.0, 0.0, 0.0, -1.0, w, h],
        270 => [0.0, -1.0, 1.0, 0.0, 0.0, h],
        _ => return None,
    };
    Some(m.into_iter().map(Object::Real).collect())
}

fn fill_toggle(doc: &mut Document, field: &FormField, value: &str) -> Result<()> {
    let state = toggle_state(field, value);
    doc.get_dictionary_mut(field.id)?
        .set("V", Object::Name(state.as_bytes().to_vec()));

    for widget in &field.widgets {
        let mut states = fields::widget_states(doc, *widget);
        if states.is_empty() {
            if let Some(on) = add_check_appearance(doc, *widget, &state)? {
                states.push(on);
            }
        }
        let widget_state = if states.iter().any(|s| *s == state) {
            state.as_str()
        } else {
            UNCHECKED
        };
        doc.get_dictionary_mut(*widget)?
            .set("AS", Object::Name(widget_state.as_bytes().to_vec()));
    }
    Ok(())
}

/// Map a value onto one of the field's appearance states. Truthy spellings
/// pick the first on-state when the form uses a different export name.
fn toggle_state(field: &FormField, value: &str) -> String {
    if value.is_empty() || value == UNCHECKED {
        return UNCHECKED.to_string();
    }
    if field.states.iter().any(|s| s == value) {
        return value.to_string();
    }
    let truthy = matches!(
        value.to_ascii_lowercase().as_str(),
        "yes" | "on" | "true" | "1" | "x" | "checked"
    );
    match field.states.first() {
        Some(first) if truthy => first.clone(),
        Some(_) => UNCHECKED.to_string(),
        None if truthy => CHECKED.to_string(),
        None => value.to_string(),
    }
}

/// Give a checkbox widget without appearances a check mark and an empty
/// `Off` state. Returns the on-state name.
fn add_check_appearance(doc: &mut Document, widget: ObjectId, state: &str) -> Result<Option<String>> {
    if state == UNCHECKED {
        return Ok(None);
    }
    let rect = {
        let dict = doc.get_dictionary(widget)?;
        dict.get(b"Rect").ok().and_then(|r| Rect::from_object(doc, r))
    };
    let Some(rect) = rect else {
        return Ok(None);
    };
    let on_id = doc.add_object(appearance::check_mark(rect.width(), rect.height())?);
    let off_id = doc.add_object(appearance::empty(rect.width(), rect.height()));
    let mut normal = lopdf::Dictionary::new();
    normal.set(state.as_bytes().to_vec(), on_id);
    normal.set(UNCHECKED, off_id);
    doc.get_dictionary_mut(widget)?
        .set("AP", dictionary! { "N" => normal });
    Ok(Some(state.to_string()))
}

/// Look up an inheritable attribute on a widget and its parent fields.
fn inherited<'a>(doc: &'a Document, start: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(start).ok()?;
    for _ in 0..MAX_PARENT_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(value);
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Appearances are regenerated, so viewers need not rebuild them. /AcroForm
/// may be an indirect object or inline in the catalog.
fn clear_need_appearances(doc: &mut Document) -> Result<()> {
    let catalog_id = objects::catalog_id(doc)?;
    let form_ref = doc
        .get_dictionary(catalog_id)?
        .get(b"AcroForm")
        .ok()
        .and_then(|o| o.as_reference().ok());
    let form = match form_ref {
        Some(form_id) => doc.get_dictionary_mut(form_id).ok(),
        None => doc
            .get_dictionary_mut(catalog_id)?
            .get_mut(b"AcroForm")
            .ok()
            .and_then(|o| o.as_dict_mut().ok()),
    };
    if let Some(form) = form {
        form.remove(b"NeedAppearances");
    }
    Ok(())
}
