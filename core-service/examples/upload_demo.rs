//! Upload files to a Studio API and follow them until their content arrives.
//!
//! Run with:
//! ```bash
//! STUDIO_TOKEN=... cargo run -p core-service --example upload_demo -- \
//!     https://studio.example.com/api clip-1.mp4 clip-2.mov
//! ```

use anyhow::{bail, Context};
use bridge_traits::logging::LogLevel;
use bridge_traits::{JobConfig, LocalFile};
use core_runtime::config::CoreConfig;
use core_runtime::events::{ContentEvent, CoreEvent, UploadEvent};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_service::UploadService;
use std::env;
use std::path::Path;
use tokio::sync::broadcast::error::RecvError;

fn mime_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mp3") => "audio/mpeg",
        _ => "video/mp4",
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_level(LogLevel::Info),
    )?;

    let mut args = env::args().skip(1);
    let Some(api_base_url) = args.next() else {
        bail!("usage: upload_demo <api-base-url> <file>...");
    };

    let mut files = Vec::new();
    for arg in args {
        let path = Path::new(&arg);
        let data = std::fs::read(path).with_context(|| format!("reading {}", arg))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(arg.as_str())
            .to_string();
        files.push(LocalFile::new(name, mime_for(path), data.into()));
    }
    if files.is_empty() {
        bail!("no files given");
    }

    let mut builder = CoreConfig::builder().api_base_url(api_base_url);
    if let Ok(token) = env::var("STUDIO_TOKEN") {
        builder = builder.api_token(token);
    }
    let service = UploadService::bootstrap(builder.build()?)?;
    let mut events = service.subscribe();

    service.queue().enqueue(files)?;
    let outcome = service.queue().start_upload(&JobConfig::default()).await?;
    println!(
        "uploaded {} of {} ({} failed)",
        outcome.submitted, outcome.started, outcome.failed
    );

    while service.queue().processing_count() > 0 {
        match events.recv().await {
            Ok(CoreEvent::Upload(UploadEvent::Progress { item_id, stage, percent })) => {
                println!("{item_id}: {stage:?} {percent}%");
            }
            Ok(CoreEvent::Upload(UploadEvent::Failed { item_id, message, .. })) => {
                println!("{item_id}: failed: {message}");
            }
            Ok(CoreEvent::Content(ContentEvent::Added { content_id, title })) => {
                println!("new content {content_id}: {title}");
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => println!("missed {skipped} events"),
            Err(e) => bail!("event stream closed: {e}"),
        }
    }

    service.shutdown();
    Ok(())
}
