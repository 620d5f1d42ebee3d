use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use formfill::{form_fields, sample, FillOptions, FormFiller, FormTemplate};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "formfill",
    about = "Fill PDF forms from JSON data",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill a PDF form with JSON data and flatten it
    Fill {
        /// Fillable PDF
        input: PathBuf,

        /// JSON file with the form data
        #[arg(short, long)]
        data: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Form template (JSON); defaults to the built-in quote agreement
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Keep the form editable instead of flattening it
        #[arg(long)]
        no_flatten: bool,
    },

    /// List the form fields of a PDF
    Fields {
        /// Input PDF file
        input: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the built-in form template as JSON
    Template {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate a sample fillable form
    Demo {
        /// Output file path
        #[arg(short, long, default_value = "sample_form.pdf")]
        output: PathBuf,

        /// Lay the form out for this template instead of the built-in one
        #[arg(short, long)]
        template: Option<PathBuf>,
    },
}

fn load_template(path: Option<&Path>) -> Result<FormTemplate> {
    match path {
        Some(path) => FormTemplate::load(path)
            .with_context(|| format!("Failed to load template {}", path.display())),
        None => Ok(FormTemplate::default()),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "formfill=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fill {
            input,
            data,
            output,
            template,
            no_flatten,
        } => {
            let filler = FormFiller::new(load_template(template.as_deref())?);
            tracing::debug!(template = %filler.template().name, input = %input.display(), "filling form");
            let pdf = std::fs::read(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let json = std::fs::read_to_string(&data)
                .with_context(|| format!("Failed to read {}", data.display()))?;

            let form_input = filler.prepare(&json)?;
            let filled = filler.fill(
                &pdf,
                &form_input,
                FillOptions {
                    flatten: !no_flatten,
                },
            )?;
            std::fs::write(&output, &filled.bytes)
                .with_context(|| format!("Failed to write {}", output.display()))?;

            for field in &filled.ignored {
                eprintln!("Skipped (not in document): {}", field);
            }
            println!(
                "✓ Filled {} fields into {}",
                filled.written.len(),
                output.display()
            );
        }

        Commands::Fields { input, json } => {
            let doc = formfill::lopdf::Document::load(&input)
                .with_context(|| format!("Failed to parse PDF {}", input.display()))?;
            let fields = form_fields(&doc)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&fields)?);
            } else if fields.is_empty() {
                println!("No form fields found in {}", input.display());
            } else {
                println!("Form fields in {}", input.display());
                println!("==========================================");
                for field in &fields {
                    let value = field.value.as_deref().unwrap_or("");
                    if field.states.is_empty() {
                        println!("{} [{}] = {:?}", field.name, field.kind, value);
                    } else {
                        println!(
                            "{} [{}: {}] = {:?}",
                            field.name,
                            field.kind,
                            field.states.join("|"),
                            value
                        );
                    }
                }
                println!("\n{} fields", fields.len());
            }
        }

        Commands::Template { output } => {
            let text = FormTemplate::default().to_json_pretty()?;
            if let Some(output_path) = output {
                std::fs::write(&output_path, text)
                    .with_context(|| format!("Failed to write {}", output_path.display()))?;
                println!("✓ Template written to: {}", output_path.display());
            } else {
                println!("{}", text);
            }
        }

        Commands::Demo { output, template } => {
            let template = load_template(template.as_deref())?;
            let bytes = sample::form_for_template(&template)?;
            std::fs::write(&output, bytes)
                .with_context(|| format!("Failed to write {}", output.display()))?;

            println!("Sample form created successfully!");
        }
    }

    Ok(())
}
