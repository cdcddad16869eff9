/// Single-shot light bulb detection from a camera or an image file
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bulb_sentinel::{detect, gen_time_string, renderer, Acquirer, Frame, ThresholdConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Detect light bulbs once and print the result as JSON")]
struct Args {
    #[command(subcommand)]
    source: Source,

    /// Threshold config (JSON); defaults when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write the annotated frame here (png/jpg); `auto` picks a timestamped name
    #[arg(short, long, global = true)]
    annotate: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Source {
    /// Capture one frame from a camera
    Device {
        /// index, /dev/videoN, or synthetic[:on|:off|:ambient|:cycle]
        id: String,
    },
    /// Read a JPEG or PNG file
    Image { path: PathBuf },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bulb_sentinel=info,bulb_detect=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ThresholdConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ThresholdConfig::default(),
    };

    let frame = match &args.source {
        Source::Device { id } => Acquirer::system()
            .with_session(id, |session| session.capture())
            .with_context(|| format!("capturing from {}", id))?,
        Source::Image { path } => {
            let bytes =
                std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            Frame::decode(&bytes).with_context(|| format!("decoding {}", path.display()))?
        }
    };

    let result = detect(&frame, &config);
    println!("{}", serde_json::to_string_pretty(&result)?);

    if let Some(out) = &args.annotate {
        let out = if out.as_os_str() == "auto" {
            PathBuf::from(format!("bulbs_{}.png", gen_time_string("-")))
        } else {
            out.clone()
        };
        renderer::annotate(&frame, &result)
            .save(&out)
            .with_context(|| format!("writing {}", out.display()))?;
        tracing::info!(path = %out.display(), "🖼️ Annotated frame saved");
    }

    Ok(())
}
