//! # formfill-api
//!
//! HTTP service that fills an uploaded PDF form with uploaded JSON data and
//! returns the flattened document.
//!

mod api;
pub use api::{
    app, app_with, fill_form, health_check, index, list_fields, sample_form, template, AppError,
    AppState, ErrorResponse, FieldsResponse, DEFAULT_MAX_UPLOAD,
};
