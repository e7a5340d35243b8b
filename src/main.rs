//! # Etiqueta CLI
//!
//! Command-line interface for label printing.
//!
//! ## Usage
//!
//! ```bash
//! # Print a PDF on continuous media
//! etiqueta print invoice.pdf --device 00:11:62:AA:BB:CC
//!
//! # Print a directory of PNGs on gapped labels
//! etiqueta print labels/ --device 00:11:62:AA:BB:CC --gap
//!
//! # Write the ZPL stream to a file instead of printing
//! etiqueta encode invoice.pdf --out invoice.zpl
//!
//! # Check that the printer answers
//! etiqueta check --device 00:11:62:AA:BB:CC
//! ```
//!
//! Set `RUST_LOG=debug` for page-level logs.

use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;
use tracing_subscriber::EnvFilter;

use etiqueta::{
    EtiquetaError, PrinterConfig, PrinterSession, SessionConfig,
    job::encode_document,
    protocol::{encoder::Encoder, zpl::Zpl},
    raster::{DocumentRasterizer, dither::Dither},
};

/// Etiqueta - Label printer utility
#[derive(Parser, Debug)]
#[command(name = "etiqueta")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a document (PDF, image, or directory of images)
    Print {
        /// Document to print
        document: PathBuf,

        /// Printer Bluetooth address
        #[arg(long, value_name = "MAC")]
        device: String,

        /// Print on gapped labels instead of continuous media
        #[arg(long)]
        gap: bool,

        /// Session config file (JSON)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Connect timeout in seconds (overrides the config file)
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Grayscale conversion (overrides the config file)
        #[arg(long, value_enum)]
        dither: Option<DitherArg>,
    },

    /// Write the command stream for a document without printing
    Encode {
        /// Document to encode
        document: PathBuf,

        /// Encode for gapped labels
        #[arg(long)]
        gap: bool,

        /// Output file (defaults to stdout)
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,

        /// Grayscale conversion
        #[arg(long, value_enum, default_value = "threshold")]
        dither: DitherArg,
    },

    /// Connect to a printer, report, and disconnect
    Check {
        /// Printer Bluetooth address
        #[arg(long, value_name = "MAC")]
        device: String,

        /// Session config file (JSON)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Connect timeout in seconds (overrides the config file)
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DitherArg {
    Threshold,
    Bayer,
}

impl From<DitherArg> for Dither {
    fn from(arg: DitherArg) -> Self {
        match arg {
            DitherArg::Threshold => Dither::Threshold,
            DitherArg::Bayer => Dither::Bayer,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), EtiquetaError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Print {
            document,
            device,
            gap,
            config,
            timeout,
            dither,
        } => {
            let mut config = load_config(config.as_deref(), timeout)?;
            if let Some(dither) = dither {
                config.dither = dither.into();
            }

            let session = PrinterSession::rfcomm(config);
            let printer = session.connect_device(&device).await?;
            println!("Connected to {}", printer);

            let result = session.print_document(&document, gap).await;
            session.disconnect();

            let summary = result?;
            println!(
                "Printed {} page{} ({} bytes)",
                summary.pages,
                if summary.pages == 1 { "" } else { "s" },
                summary.bytes_sent
            );
        }

        Commands::Encode {
            document,
            gap,
            out,
            dither,
        } => {
            let encoder = Encoder::new(Zpl, PrinterConfig::LABEL_80MM).with_dither(dither.into());
            let grammar = encoder.grammar_name();
            let rasterizer = DocumentRasterizer::default();

            let buffers = tokio::task::spawn_blocking(move || {
                encode_document(&rasterizer, &encoder, &document, gap)
            })
            .await
            .map_err(|e| EtiquetaError::Io(std::io::Error::other(e)))??;

            write_output(out.as_deref(), &buffers)?;
            info!(pages = buffers.len(), grammar, "encoded document");
        }

        Commands::Check {
            device,
            config,
            timeout,
        } => {
            let config = load_config(config.as_deref(), timeout)?;
            let session = PrinterSession::rfcomm(config);

            let result = session.connect_device(&device).await;
            println!("State: {}", session.state());
            let printer = result?;
            println!("Printer {} is reachable", printer);
            session.disconnect();
        }
    }

    Ok(())
}

/// Load the session config, then apply flag overrides.
fn load_config(path: Option<&Path>, timeout: Option<u64>) -> Result<SessionConfig, EtiquetaError> {
    let mut config = match path {
        Some(path) => SessionConfig::from_file(path)?,
        None => SessionConfig::default(),
    };
    if let Some(secs) = timeout {
        config.connect_timeout_secs = secs;
    }
    Ok(config)
}

/// Write command buffers to a file, or stdout when no file is given.
fn write_output(path: Option<&Path>, buffers: &[Vec<u8>]) -> Result<(), EtiquetaError> {
    match path {
        Some(path) => {
            let mut file = std::fs::File::create(path)?;
            for buffer in buffers {
                file.write_all(buffer)?;
            }
            println!("Saved to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            for buffer in buffers {
                stdout.write_all(buffer)?;
            }
            stdout.write_all(b"\n")?;
            stdout.flush()?;
        }
    }
    Ok(())
}
