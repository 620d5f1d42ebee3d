//! Flattening: painting widget appearances into page content and removing
//! the interactive form

use crate::error::{FillError, Result};
use crate::objects::{self, Rect};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

/// Annotation flag: hidden
const ANNOT_HIDDEN: i64 = 1 << 1;
/// Annotation flag: no view
const ANNOT_NO_VIEW: i64 = 1 << 5;
const MAX_PARENT_DEPTH: usize = 32;

/// Outcome of a flatten pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlattenReport {
    /// Widget appearances painted into page content
    pub painted: usize,
    /// Widgets removed without painting (hidden or without appearance)
    pub dropped: usize,
}

/// Paint every widget annotation into its page and remove the form.
pub fn flatten_document(doc: &mut Document) -> Result<FlattenReport> {
    let mut report = FlattenReport::default();
    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();

    for page_id in pages {
        flatten_page(doc, page_id, &mut report)?;
    }

    let catalog_id = objects::catalog_id(doc)?;
    doc.get_dictionary_mut(catalog_id)?.remove(b"AcroForm");
    doc.prune_objects();

    tracing::debug!(
        painted = report.painted,
        dropped = report.dropped,
        "form flattened"
    );
    Ok(report)
}

/// A widget appearance placed on the page
struct Placement {
    stream: ObjectId,
    matrix: [f32; 6],
}

fn flatten_page(doc: &mut Document, page_id: ObjectId, report: &mut FlattenReport) -> Result<()> {
    let annots = {
        let page = doc.get_dictionary(page_id)?;
        match objects::get(doc, page, b"Annots") {
            Some(Object::Array(items)) => items.clone(),
            _ => return Ok(()),
        }
    };

    let total = annots.len();
    let mut kept = Vec::with_capacity(total);
    let mut placements = Vec::new();
    for annot in annots {
        let widget = match objects::resolve(doc, &annot) {
            Ok(Object::Dictionary(dict))
                if objects::get_name(doc, dict, b"Subtype") == Some(&b"Widget"[..]) =>
            {
                Some(placement(doc, dict))
            }
            _ => None,
        };
        match widget {
            Some(Some(p)) => {
                placements.push(p);
                report.painted += 1;
            }
            Some(None) => report.dropped += 1,
            None => kept.push(annot),
        }
    }

    if kept.len() == total {
        return Ok(());
    }

    if !placements.is_empty() {
        paint(doc, page_id, &placements)?;
    }

    let page = doc.get_dictionary_mut(page_id)?;
    if kept.is_empty() {
        page.remove(b"Annots");
    } else {
        page.set("Annots", Object::Array(kept));
    }
    Ok(())
}

/// Work out which appearance stream to draw and where, following
/// ISO 32000-1 §12.5.5 (Algorithm: appearance streams).
fn placement(doc: &Document, widget: &Dictionary) -> Option<Placement> {
    let flags = objects::get_i64(doc, widget, b"F").unwrap_or(0);
    if flags & (ANNOT_HIDDEN | ANNOT_NO_VIEW) != 0 {
        return None;
    }
    let rect = Rect::from_object(doc, widget.get(b"Rect").ok()?)?;

    let normal = objects::get_dict(doc, widget, b"AP")?.get(b"N").ok()?;
    let stream_id = match normal {
        Object::Reference(id) => match doc.get_object(*id).ok()? {
            Object::Stream(_) => *id,
            Object::Dictionary(states) => state_stream(doc, widget, states)?,
            _ => return None,
        },
        Object::Dictionary(states) => state_stream(doc, widget, states)?,
        _ => return None,
    };
    let stream = doc.get_object(stream_id).ok()?.as_stream().ok()?;

    let bbox = Rect::from_object(doc, stream.dict.get(b"BBox").ok()?)?;
    let matrix = stream
        .dict
        .get(b"Matrix")
        .ok()
        .and_then(|m| objects::numbers::<6>(doc, m))
        .unwrap_or([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
    let bounds = transform_rect(&matrix, bbox);
    if bounds.width() <= f32::EPSILON || bounds.height() <= f32::EPSILON {
        return None;
    }

    let sx = rect.width() / bounds.width();
    let sy = rect.height() / bounds.height();
    Some(Placement {
        stream: stream_id,
        matrix: [
            sx,
            0.0,
            0.0,
            sy,
            rect.x0 - bounds.x0 * sx,
            rect.y0 - bounds.y0 * sy,
        ],
    })
}

/// Pick the stream for the widget's current appearance state.
fn state_stream(doc: &Document, widget: &Dictionary, states: &Dictionary) -> Option<ObjectId> {
    let state = objects::get_name(doc, widget, b"AS").or_else(|| {
        (states.len() == 1)
            .then(|| states.iter().next().map(|(k, _)| k.as_slice()))
            .flatten()
    })?;
    states.get(state).ok()?.as_reference().ok()
}

/// Bounding box of `rect` after transformation by `m`.
fn transform_rect(m: &[f32; 6], rect: Rect) -> Rect {
    let corners = [
        (rect.x0, rect.y0),
        (rect.x1, rect.y0),
        (rect.x0, rect.y1),
        (rect.x1, rect.y1),
    ];
    let mut out = Rect {
        x0: f32::MAX,
        y0: f32::MAX,
        x1: f32::MIN,
        y1: f32::MIN,
    };
    for (x, y) in corners {
        let tx = m[0] * x + m[2] * y + m[4];
        let ty = m[1] * x + m[3] * y + m[5];
        out.x0 = out.x0.min(tx);
        out.y0 = out.y0.min(ty);
        out.x1 = out.x1.max(tx);
        out.y1 = out.y1.max(ty);
    }
    out
}

fn paint(doc: &mut Document, page_id: ObjectId, placements: &[Placement]) -> Result<()> {
    for placement in placements {
        if let Ok(Object::Stream(stream)) = doc.get_object_mut(placement.stream) {
            mark_form_xobject(stream);
        }
    }

    let mut resources = page_resources(doc, page_id)?;
    let mut xobjects = match objects::get(doc, &resources, b"XObject") {
        Some(Object::Dictionary(d)) => d.clone(),
        _ => Dictionary::new(),
    };

    let mut operations = vec![Operation::new("Q", vec![])];
    let mut counter = 0usize;
    for placement in placements {
        let name = loop {
            counter += 1;
            let candidate = format!("FlatFm{counter}");
            if !xobjects.has(candidate.as_bytes()) {
                break candidate;
            }
        };
        xobjects.set(name.as_bytes().to_vec(), placement.stream);
        operations.push(Operation::new("q", vec![]));
        operations.push(Operation::new(
            "cm",
            placement.matrix.iter().map(|v| Object::Real(*v)).collect(),
        ));
        operations.push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
        operations.push(Operation::new("Q", vec![]));
    }
    resources.set("XObject", Object::Dictionary(xobjects));

    // streams are concatenated by readers; keep tokens apart at the seams
    let open = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let mut close_content = b"\n".to_vec();
    close_content.extend(Content { operations }.encode()?);
    let close = doc.add_object(Stream::new(Dictionary::new(), close_content));

    let mut contents = vec![Object::Reference(open)];
    contents.extend(page_contents(doc, page_id)?);
    contents.push(Object::Reference(close));

    let page = doc.get_dictionary_mut(page_id)?;
    page.set("Resources", Object::Dictionary(resources));
    page.set("Contents", Object::Array(contents));
    Ok(())
}

fn mark_form_xobject(stream: &mut Stream) {
    if !stream.dict.has(b"Type") {
        stream.dict.set("Type", "XObject");
    }
    if !stream.dict.has(b"Subtype") {
        stream.dict.set("Subtype", "Form");
    }
}

/// The page's resource dictionary, resolving inheritance from the page tree.
fn page_resources(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    let mut current = doc.get_dictionary(page_id)?;
    for _ in 0..MAX_PARENT_DEPTH {
        if let Some(resources) = objects::get_dict(doc, current, b"Resources") {
            return Ok(resources.clone());
        }
        match current.get(b"Parent").and_then(Object::as_reference) {
            Ok(parent) => current = doc.get_dictionary(parent)?,
            Err(_) => break,
        }
    }
    Ok(Dictionary::new())
}

/// Existing content stream references of a page.
fn page_contents(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>> {
    let page = doc.get_dictionary(page_id)?;
    let Ok(contents) = page.get(b"Contents") else {
        return Ok(Vec::new());
    };
    match contents {
        Object::Reference(id) => match doc.get_object(*id)? {
            Object::Array(items) => Ok(items.clone()),
            Object::Stream(_) => Ok(vec![Object::Reference(*id)]),
            _ => Err(FillError::InvalidStructure(format!(
                "page contents {} {} R is neither a stream nor an array",
                id.0, id.1
            ))),
        },
        Object::Array(items) => Ok(items.clone()),
        _ => Err(FillError::InvalidStructure(
            "page contents must be a stream reference or an array".to_string(),
        )),
    }
}
