//! The fill pipeline: validate, map, fill, flatten, emit
//!
//! Every run stages its files in a private temporary directory that is
//! removed when the run ends, whether it succeeded or not.

use crate::error::{FillError, Result, Stage};
use crate::fields::FieldIndex;
use crate::fill::fill_document;
use crate::flatten::flatten_document;
use crate::input::FormInput;
use crate::mapping::FormTemplate;
use lopdf::Document;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Options for a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillOptions {
    /// Flatten the filled form into static content
    pub flatten: bool,
}

impl Default for FillOptions {
    fn default() -> Self {
        Self { flatten: true }
    }
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct FilledDocument {
    pub bytes: Vec<u8>,
    /// Download name from the template
    pub file_name: String,
    /// Fields that received a value
    pub written: Vec<String>,
    /// Mapped fields that the document does not have
    pub ignored: Vec<String>,
    pub flattened: bool,
}

/// Per-run scratch directory
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn create(root: Option<&Path>) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("formfill-");
        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        Ok(Self { dir })
    }

    fn source(&self) -> PathBuf {
        self.dir.path().join("source.pdf")
    }

    fn filled(&self) -> PathBuf {
        self.dir.path().join("filled.pdf")
    }

    fn flattened(&self) -> PathBuf {
        self.dir.path().join("flattened.pdf")
    }

    fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove workspace");
        }
    }
}

/// Fills documents according to one [`FormTemplate`]
#[derive(Debug, Clone)]
pub struct FormFiller {
    template: FormTemplate,
    temp_root: Option<PathBuf>,
}

impl FormFiller {
    pub fn new(template: FormTemplate) -> Self {
        Self {
            template,
            temp_root: None,
        }
    }

    /// Create run directories under `root` instead of the system temp dir.
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    pub fn template(&self) -> &FormTemplate {
        &self.template
    }

    /// Parse and validate JSON form data against the template's required keys.
    pub fn prepare(&self, json: &str) -> Result<FormInput> {
        let input = FormInput::parse(json)?;
        input.validate(&self.template.required_keys)?;
        Ok(input)
    }

    /// Validate `json` and, if it passes, fill and flatten `pdf`.
    pub fn fill_json(&self, pdf: &[u8], json: &str) -> Result<FilledDocument> {
        let input = self.prepare(json)?;
        self.fill(pdf, &input, FillOptions::default())
    }

    /// Fill `pdf` with values mapped from `input`. The input is assumed to
    /// be validated already.
    pub fn fill(&self, pdf: &[u8], input: &FormInput, options: FillOptions) -> Result<FilledDocument> {
        let workspace =
            Workspace::create(self.temp_root.as_deref()).map_err(|e| FillError::at(Stage::Staging)(e.into()))?;
        tracing::debug!(workspace = %workspace.dir.path().display(), "staging upload");

        let result = self.run(&workspace, pdf, input, options);
        workspace.close();
        result
    }

    fn run(
        &self,
        workspace: &Workspace,
        pdf: &[u8],
        input: &FormInput,
        options: FillOptions,
    ) -> Result<FilledDocument> {
        std::fs::write(workspace.source(), pdf).map_err(|e| FillError::at(Stage::Staging)(e.into()))?;

        let mut doc = load(&workspace.source()).map_err(FillError::at(Stage::Loading))?;
        let present = FieldIndex::from_document(&doc).map_err(FillError::at(Stage::Loading))?;
        if present.is_empty() {
            tracing::warn!("document has no fillable fields");
        }

        let mut values = self.template.map(input);
        let ignored = values.retain_present(|field| present.contains(field));
        for field in &ignored {
            tracing::debug!(field = %field, "field not in document, skipped");
        }

        let report = fill_document(&mut doc, &values).map_err(FillError::at(Stage::Filling))?;
        doc.save(workspace.filled())
            .map_err(|e| FillError::at(Stage::Filling)(e.into()))?;
        tracing::info!(
            written = report.written.len(),
            ignored = ignored.len(),
            "form fields written"
        );

        let output = if options.flatten {
            let mut doc = load(&workspace.filled()).map_err(FillError::at(Stage::Flattening))?;
            let flat = flatten_document(&mut doc).map_err(FillError::at(Stage::Flattening))?;
            doc.save(workspace.flattened())
                .map_err(|e| FillError::at(Stage::Flattening)(e.into()))?;
            tracing::info!(painted = flat.painted, "form flattened");
            workspace.flattened()
        } else {
            workspace.filled()
        };

        let bytes = std::fs::read(&output).map_err(|e| FillError::at(Stage::Reading)(e.into()))?;
        Ok(FilledDocument {
            bytes,
            file_name: self.template.output_file_name.clone(),
            written: report.written,
            ignored,
            flattened: options.flatten,
        })
    }
}

impl Default for FormFiller {
    fn default() -> Self {
        Self::new(FormTemplate::default())
    }
}

fn load(path: &Path) -> Result<Document> {
    let doc = Document::load(path)?;
    if doc.is_encrypted() {
        return Err(FillError::Encrypted);
    }
    Ok(doc)
}
