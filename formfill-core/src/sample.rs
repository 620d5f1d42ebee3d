//! Generated sample documents
//!
//! [`quote_agreement_pdf`] lays out one fillable field per rule of the
//! default template, which makes it possible to try the fill pipeline
//! without the real agreement form.

use crate::appearance;
use crate::error::Result;
use crate::mapping::{FormTemplate, ValueSource, CHECKED};
use crate::objects::{encode_text, Rect};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const ROW_HEIGHT: f32 = 25.0;
const LABEL_X: f32 = 40.0;
const FIELD_X: f32 = 290.0;
const FIELD_WIDTH: f32 = 280.0;
const FIELD_HEIGHT: f32 = 18.0;
const CHECKBOX_SIZE: f32 = 14.0;

/// Fillable form matching the default template's field identifiers.
pub fn quote_agreement_pdf() -> Result<Vec<u8>> {
    form_for_template(&FormTemplate::quote_agreement())
}

/// One-page fillable form with a field for every rule of `template`, plus
/// an unmapped `office.notes` field.
pub fn form_for_template(template: &FormTemplate) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let page_id = doc.new_object_id();
    let helv = doc.add_object(appearance::helvetica());
    let zadb = doc.add_object(appearance::zapf_dingbats());

    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["Helv".into(), 16.into()]),
        Operation::new("Td", vec![LABEL_X.into(), (PAGE_HEIGHT - 50.0).into()]),
        Operation::new("Tj", vec![Object::string_literal(template.name.as_str())]),
        Operation::new("ET", vec![]),
    ];
    let mut fields = Vec::new();
    let mut annots = Vec::new();
    let mut y = PAGE_HEIGHT - 90.0;

    for rule in &template.rules {
        operations.extend(label(&rule.field, y));
        let is_checkbox = match &rule.source {
            ValueSource::Checkbox { .. } => true,
            ValueSource::Literal { value } => value == CHECKED,
            ValueSource::Input { .. } => false,
        };
        let widget = if is_checkbox {
            checkbox(&mut doc, &rule.field, page_id, y)?
        } else {
            doc.add_object(text_field(&rule.field, page_id, y))
        };
        fields.push(Object::Reference(widget));
        annots.push(Object::Reference(widget));
        y -= ROW_HEIGHT;
    }

    // a non-terminal field with one kid, named office.notes
    operations.extend(label("office.notes", y));
    let office = doc.new_object_id();
    let mut notes = text_field("notes", page_id, y);
    notes.set("Parent", office);
    notes.remove(b"FT");
    let notes = doc.add_object(notes);
    doc.objects.insert(
        office,
        Object::Dictionary(dictionary! {
            "T" => encode_text("office"),
            "FT" => "Tx",
            "Kids" => vec![Object::Reference(notes)],
        }),
    );
    fields.push(Object::Reference(office));
    annots.push(Object::Reference(notes));

    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
    doc.objects.insert(
        page_id,
        Object::Dictionary(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Annots" => annots,
            "Resources" => dictionary! { "Font" => dictionary! { "Helv" => helv } },
        }),
    );
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );
    let acro_form = doc.add_object(dictionary! {
        "Fields" => fields,
        "DA" => Object::string_literal("/Helv 0 Tf 0 g"),
        "DR" => dictionary! { "Font" => dictionary! { "Helv" => helv, "ZaDb" => zadb } },
    });
    let catalog = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
        "AcroForm" => acro_form,
    });
    doc.trailer.set("Root", catalog);

    save(doc)
}

/// One empty page and no form.
pub fn blank_pdf() -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal("No form here")]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
    let font = doc.add_object(appearance::helvetica());
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! { "Font" => dictionary! { "F1" => font } },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );
    let catalog = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog);

    save(doc)
}

fn save(mut doc: Document) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

fn label(text: &str, y: f32) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["Helv".into(), 8.into()]),
        Operation::new("Td", vec![LABEL_X.into(), (y + 5.0).into()]),
        Operation::new("Tj", vec![Object::String(appearance::win_ansi(text), lopdf::StringFormat::Literal)]),
        Operation::new("ET", vec![]),
    ]
}

fn text_field(name: &str, page: ObjectId, y: f32) -> lopdf::Dictionary {
    let rect = Rect {
        x0: FIELD_X,
        y0: y,
        x1: FIELD_X + FIELD_WIDTH,
        y1: y + FIELD_HEIGHT,
    };
    dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Tx",
        "T" => encode_text(name),
        "Rect" => rect.to_object(),
        "P" => page,
        "F" => 4,
        "DA" => Object::string_literal("/Helv 0 Tf 0 g"),
        "MK" => dictionary! { "BC" => vec![0.into(), 0.into(), 0.into()] },
    }
}

fn checkbox(doc: &mut Document, name: &str, page: ObjectId, y: f32) -> Result<ObjectId> {
    let on = doc.add_object(appearance::check_mark(CHECKBOX_SIZE, CHECKBOX_SIZE)?);
    let off = doc.add_object(appearance::empty(CHECKBOX_SIZE, CHECKBOX_SIZE));
    let rect = Rect {
        x0: FIELD_X,
        y0: y + 2.0,
        x1: FIELD_X + CHECKBOX_SIZE,
        y1: y + 2.0 + CHECKBOX_SIZE,
    };
    Ok(doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Btn",
        "T" => encode_text(name),
        "Rect" => rect.to_object(),
        "P" => page,
        "F" => 4,
        "V" => "Off",
        "AS" => "Off",
        "DA" => Object::string_literal("/ZaDb 0 Tf 0 g"),
        "MK" => dictionary! { "CA" => Object::string_literal("4") },
        "AP" => dictionary! { "N" => dictionary! { CHECKED => on, "Off" => off } },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{form_fields, FieldKind};

    #[test]
    fn test_sample_has_a_field_per_rule() {
        let bytes = quote_agreement_pdf().unwrap();
        assert!(bytes.starts_with(b"%PDF-1.7"));

        let doc = Document::load_mem(&bytes).unwrap();
        let fields = form_fields(&doc).unwrap();
        let template = FormTemplate::quote_agreement();
        assert_eq!(fields.len(), template.rules.len() + 1);
        for rule in &template.rules {
            assert!(
                fields.iter().any(|f| f.name == rule.field),
                "missing field {}",
                rule.field
            );
        }
    }

    #[test]
    fn test_sample_checkboxes() {
        let doc = Document::load_mem(&quote_agreement_pdf().unwrap()).unwrap();
        let checkboxes: Vec<_> = form_fields(&doc)
            .unwrap()
            .into_iter()
            .filter(|f| f.kind == FieldKind::Checkbox)
            .map(|f| f.name)
            .collect();
        assert_eq!(
            checkboxes,
            vec!["//ContractStartDate/MonthName", "//bool1", "//bool2"]
        );
    }

    #[test]
    fn test_blank_pdf_has_one_page() {
        let doc = Document::load_mem(&blank_pdf().unwrap()).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }
}
