//! Reading the interactive form field tree (ISO 32000-1 §12.7.3)

use crate::error::Result;
use crate::objects::{self, Rect};
use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Radio button flag (bit 16)
const FLAG_RADIO: i64 = 1 << 15;
/// Push button flag (bit 17)
const FLAG_PUSHBUTTON: i64 = 1 << 16;
/// Field tree depth beyond which kids are ignored.
const MAX_TREE_DEPTH: usize = 32;

/// Kind of a terminal form field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Checkbox,
    Radio,
    PushButton,
    Choice,
    Signature,
    Unknown,
}

impl FieldKind {
    fn classify(field_type: Option<&[u8]>, flags: i64) -> Self {
        match field_type {
            Some(b"Tx") => FieldKind::Text,
            Some(b"Btn") if flags & FLAG_PUSHBUTTON != 0 => FieldKind::PushButton,
            Some(b"Btn") if flags & FLAG_RADIO != 0 => FieldKind::Radio,
            Some(b"Btn") => FieldKind::Checkbox,
            Some(b"Ch") => FieldKind::Choice,
            Some(b"Sig") => FieldKind::Signature,
            _ => FieldKind::Unknown,
        }
    }

    /// Fields whose value is drawn as text
    pub fn is_textual(self) -> bool {
        matches!(self, FieldKind::Text | FieldKind::Choice)
    }

    pub fn is_toggle(self) -> bool {
        matches!(self, FieldKind::Checkbox | FieldKind::Radio)
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FieldKind::Text => "text",
            FieldKind::Checkbox => "checkbox",
            FieldKind::Radio => "radio",
            FieldKind::PushButton => "push button",
            FieldKind::Choice => "choice",
            FieldKind::Signature => "signature",
            FieldKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A terminal field of the document's form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormField {
    /// Fully qualified name
    pub name: String,
    /// The field's own `/T`, or the nearest ancestor's when it has none
    pub partial: String,
    #[serde(skip)]
    pub id: ObjectId,
    pub kind: FieldKind,
    /// Current value (`/V`), if any
    pub value: Option<String>,
    /// Field flags (`/Ff`), inherited when absent
    pub flags: i64,
    /// Widget annotations that display this field
    #[serde(skip)]
    pub widgets: Vec<ObjectId>,
    /// Appearance states other than `Off`, for buttons
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub states: Vec<String>,
    /// Rectangle of the first widget
    #[serde(skip)]
    pub rect: Option<Rect>,
}

#[derive(Clone, Default)]
struct Inherited {
    field_type: Option<Vec<u8>>,
    flags: Option<i64>,
    value: Option<Object>,
}

impl Inherited {
    fn merge(&self, doc: &Document, dict: &Dictionary) -> Self {
        Self {
            field_type: objects::get_name(doc, dict, b"FT")
                .map(<[u8]>::to_vec)
                .or_else(|| self.field_type.clone()),
            flags: objects::get_i64(doc, dict, b"Ff").or(self.flags),
            value: objects::get(doc, dict, b"V")
                .cloned()
                .or_else(|| self.value.clone()),
        }
    }
}

/// All terminal fields of the document, in field tree order. A document
/// without an interactive form has none.
pub fn form_fields(doc: &Document) -> Result<Vec<FormField>> {
    let Some(acro_form) = objects::acro_form(doc)? else {
        return Ok(Vec::new());
    };
    let roots = match objects::get(doc, acro_form, b"Fields") {
        Some(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    let mut fields = Vec::new();
    let mut visited = HashSet::new();
    for root in &roots {
        match root {
            Object::Reference(id) => collect(
                doc,
                *id,
                None,
                &Inherited::default(),
                &mut fields,
                &mut visited,
                0,
            )?,
            _ => tracing::warn!("skipping direct (non-indirect) form field object"),
        }
    }
    Ok(fields)
}

/// Names of all terminal fields.
pub fn field_names(doc: &Document) -> Result<HashSet<String>> {
    Ok(form_fields(doc)?.into_iter().map(|f| f.name).collect())
}

/// Looks fields up by identifier. A fully qualified name wins; otherwise
/// the identifier is matched against partial names, so `notes` finds
/// `office.notes`.
#[derive(Debug, Clone, Default)]
pub struct FieldIndex {
    fields: Vec<FormField>,
    qualified: HashMap<String, usize>,
    partial: HashMap<String, Vec<usize>>,
}

impl FieldIndex {
    pub fn new(fields: Vec<FormField>) -> Self {
        let mut qualified = HashMap::new();
        let mut partial: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, field) in fields.iter().enumerate() {
            qualified.entry(field.name.clone()).or_insert(i);
            partial.entry(field.partial.clone()).or_default().push(i);
        }
        Self {
            fields,
            qualified,
            partial,
        }
    }

    pub fn from_document(doc: &Document) -> Result<Self> {
        Ok(Self::new(form_fields(doc)?))
    }

    /// Whether `identifier` names a field, qualified or partial.
    pub fn contains(&self, identifier: &str) -> bool {
        self.qualified.contains_key(identifier) || self.partial.contains_key(identifier)
    }

    /// The field `identifier` refers to. An ambiguous partial name resolves
    /// to the first match in field tree order.
    pub fn find(&self, identifier: &str) -> Option<&FormField> {
        if let Some(&i) = self.qualified.get(identifier) {
            return Some(&self.fields[i]);
        }
        let candidates = self.partial.get(identifier)?;
        let first = &self.fields[*candidates.first()?];
        if candidates.len() > 1 {
            tracing::warn!(
                field = identifier,
                matches = candidates.len(),
                chosen = %first.name,
                "partial field name is ambiguous"
            );
        }
        Some(first)
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn collect(
    doc: &Document,
    id: ObjectId,
    parent: Option<(&str, &str)>,
    inherited: &Inherited,
    out: &mut Vec<FormField>,
    visited: &mut HashSet<ObjectId>,
    depth: usize,
) -> Result<()> {
    if depth > MAX_TREE_DEPTH || !visited.insert(id) {
        tracing::warn!(?id, "ignoring cyclic or overly deep form field");
        return Ok(());
    }
    let Ok(dict) = doc.get_dictionary(id) else {
        tracing::warn!(?id, "skipping form field that is not a dictionary");
        return Ok(());
    };
    // (qualified, partial)
    let names = match (parent, objects::get_text(doc, dict, b"T")) {
        (Some((qualified, _)), Some(own)) => Some((format!("{qualified}.{own}"), own)),
        (None, Some(own)) => Some((own.clone(), own)),
        (Some((qualified, partial)), None) => Some((qualified.to_string(), partial.to_string())),
        (None, None) => None,
    };
    let inherited = inherited.merge(doc, dict);

    let mut child_fields = Vec::new();
    let mut widgets = Vec::new();
    if let Some(Object::Array(kids)) = objects::get(doc, dict, b"Kids") {
        for kid in kids {
            let Object::Reference(kid_id) = kid else {
                continue;
            };
            let Ok(kid_dict) = doc.get_dictionary(*kid_id) else {
                tracing::warn!(kid = ?kid_id, parent = ?id, "skipping dangling form field kid");
                continue;
            };
            if kid_dict.has(b"T") {
                child_fields.push(*kid_id);
            } else {
                widgets.push(*kid_id);
            }
        }
    }

    if !child_fields.is_empty() {
        for kid in child_fields {
            let parent = names.as_ref().map(|(q, p)| (q.as_str(), p.as_str()));
            collect(doc, kid, parent, &inherited, out, visited, depth + 1)?;
        }
        return Ok(());
    }

    let Some((name, partial)) = names else {
        tracing::debug!(?id, "form field without a name");
        return Ok(());
    };
    if widgets.is_empty() && objects::get_name(doc, dict, b"Subtype") == Some(&b"Widget"[..]) {
        widgets.push(id);
    }

    let flags = inherited.flags.unwrap_or(0);
    let kind = FieldKind::classify(inherited.field_type.as_deref(), flags);
    let value = inherited.value.as_ref().and_then(|v| match v {
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        Object::String(bytes, _) => Some(objects::decode_text(bytes)),
        _ => None,
    });
    let states = if kind.is_toggle() {
        on_states(doc, &widgets)
    } else {
        Vec::new()
    };
    let rect = widgets.first().and_then(|w| {
        let widget = doc.get_dictionary(*w).ok()?;
        Rect::from_object(doc, widget.get(b"Rect").ok()?)
    });

    out.push(FormField {
        name,
        partial,
        id,
        kind,
        value,
        flags,
        widgets,
        states,
        rect,
    });
    Ok(())
}

/// Appearance state names other than `Off` across the given widgets.
fn on_states(doc: &Document, widgets: &[ObjectId]) -> Vec<String> {
    let mut states = Vec::new();
    for widget in widgets {
        for state in widget_states(doc, *widget) {
            if !states.contains(&state) {
                states.push(state);
            }
        }
    }
    states
}

/// Appearance state names of one widget's normal appearance, excluding `Off`.
pub(crate) fn widget_states(doc: &Document, widget: ObjectId) -> Vec<String> {
    let Ok(dict) = doc.get_dictionary(widget) else {
        return Vec::new();
    };
    objects::get_dict(doc, dict, b"AP")
        .and_then(|ap| objects::get_dict(doc, ap, b"N"))
        .map(|normal| {
            normal
                .iter()
                .map(|(key, _)| String::from_utf8_lossy(key).into_owned())
                .filter(|state| state != "Off")
                .collect()
        })
        .unwrap_or_default()
}
