//! # formfill
//!
//! Fill the interactive form of a PDF from a JSON record and flatten it into
//! static, non-editable page content.
//!
//! ## Features
//!
//! - **Templates as data**: field identifiers, required keys and the download
//!   name live in a [`FormTemplate`] that can be loaded from JSON
//! - **Validation**: malformed JSON and missing required keys are rejected
//!   before any document work starts
//! - **Permissive mapping**: mapped fields the document does not contain are
//!   skipped, extra input keys are ignored
//! - **Appearance generation**: text, choice and checkbox widgets get fresh
//!   appearance streams
//! - **Flattening**: widget appearances are painted into the page and the
//!   AcroForm is removed
//! - **Scoped temporaries**: each run works in its own temporary directory,
//!   removed on success and on failure
//!
//! ## Quick Start
//!
//! ```rust
//! use formfill::{sample, FormFiller, Result};
//!
//! # fn main() -> Result<()> {
//! let filler = FormFiller::default();
//! let pdf = sample::quote_agreement_pdf()?;
//!
//! let filled = filler.fill_json(
//!     &pdf,
//!     r#"{"CustomerName":"Acme","ServiceAddress":"1 Rd","City":"X","State":"Y",
//!         "ZipCode":"00000","PhoneNumber":"555","Email":"a@b.c"}"#,
//! )?;
//! assert!(filled.bytes.starts_with(b"%PDF"));
//! # Ok(())
//! # }
//! ```

pub mod appearance;
pub mod error;
pub mod fields;
pub mod fill;
pub mod flatten;
pub mod input;
pub mod mapping;
pub mod objects;
pub mod pipeline;
pub mod sample;

pub use error::{FillError, Result, Stage};
pub use fields::{field_names, form_fields, FieldIndex, FieldKind, FormField};
pub use fill::{fill_document, FillReport};
pub use flatten::{flatten_document, FlattenReport};
pub use input::FormInput;
pub use mapping::{FieldRule, FieldValues, FormTemplate, ValueSource};
pub use pipeline::{FillOptions, FilledDocument, FormFiller};

pub use lopdf;

/// Current version of formfill
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
