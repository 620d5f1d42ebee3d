use thiserror::Error;

#[derive(Error, Debug)]
pub enum FillError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON format: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Form data must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("Missing or empty required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Invalid form template: {0}")]
    InvalidTemplate(String),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Invalid PDF structure: {0}")]
    InvalidStructure(String),

    #[error("PDF is encrypted")]
    Encrypted,

    #[error("PDF form filling failed while {stage}: {source}")]
    Pipeline {
        stage: Stage,
        #[source]
        source: Box<FillError>,
    },
}

impl FillError {
    /// Whether the error was caused by the caller's input rather than by
    /// the fill pipeline itself.
    pub fn is_input_error(&self) -> bool {
        match self {
            FillError::InvalidJson(_)
            | FillError::NotAnObject(_)
            | FillError::MissingFields(_)
            | FillError::Encrypted => true,
            FillError::Pipeline { stage, source } => {
                *stage == Stage::Loading || source.is_input_error()
            }
            _ => false,
        }
    }

    /// The required keys that were missing, if this is a validation error.
    pub fn missing_fields(&self) -> Option<&[String]> {
        match self {
            FillError::MissingFields(keys) => Some(keys),
            _ => None,
        }
    }

    pub(crate) fn at(stage: Stage) -> impl FnOnce(FillError) -> FillError {
        move |source| FillError::Pipeline {
            stage,
            source: Box::new(source),
        }
    }
}

/// Step of the fill pipeline, used to label wrapped failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Staging,
    Loading,
    Filling,
    Flattening,
    Reading,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Staging => "staging the upload",
            Stage::Loading => "loading the document",
            Stage::Filling => "writing form fields",
            Stage::Flattening => "flattening the form",
            Stage::Reading => "reading the output",
        };
        f.write_str(s)
    }
}

pub type Result<T> = std::result::Result<T, FillError>;
