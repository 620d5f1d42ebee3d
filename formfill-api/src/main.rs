use anyhow::{Context, Result};
use clap::Parser;
use formfill::{FormFiller, FormTemplate};
use formfill_api::app_with;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "formfill-api", about = "PDF form filling service", version)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:3000")]
    bind: SocketAddr,

    /// Form template (JSON); defaults to the built-in quote agreement
    #[arg(long)]
    template: Option<PathBuf>,

    /// Largest accepted upload in megabytes
    #[arg(long, default_value_t = 25)]
    max_upload_mb: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "formfill_api=debug,formfill=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let template = match &args.template {
        Some(path) => FormTemplate::load(path)
            .with_context(|| format!("Failed to load template {}", path.display()))?,
        None => FormTemplate::default(),
    };
    info!(
        template = %template.name,
        rules = template.rules.len(),
        "template loaded"
    );

    let app = app_with(FormFiller::new(template), args.max_upload_mb * 1024 * 1024);

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;

    info!("formfill API listening on http://{}", args.bind);

    axum::serve(listener, app).await?;
    Ok(())
}
