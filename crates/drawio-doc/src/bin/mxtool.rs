//! Command-line companion to the `drawio_doc` library.

use std::{fs, process, str::FromStr};

use clap::{Parser, Subcommand};
use log::{LevelFilter, debug, error, info};

use drawio_doc::{
    ConfigError, Document, EditorConfig, Entry, ParseError, Wrapper, parse_document, to_mxfile_xml,
    validate,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect and normalize draw.io documents", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report structural problems; exits with 1 when there are any
    Validate { input: String },

    /// List layers in stacking order
    Layers { input: String },

    /// Re-serialize in canonical form
    Normalize {
        input: String,

        /// Write here instead of stdout
        #[arg(short, long)]
        output: Option<String>,

        /// Wrap the model in an <mxfile> page
        #[arg(long)]
        mxfile: bool,

        /// With --mxfile, write the page as a compressed payload
        #[arg(long, requires = "mxfile")]
        compressed: bool,
    },

    /// Print the parsed document as JSON
    Dump { input: String },

    /// Decode the action link of one entry
    Actions { input: String, id: String },
}

#[derive(Debug, thiserror::Error)]
enum ToolError {
    #[error("{path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to write output: {0}")]
    Write(#[from] std::io::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no entry with id {0:?}")]
    NotFound(String),

    #[error("{0:?} has no action link")]
    NoActions(String),

    #[error("{0} validation problem(s)")]
    Invalid(usize),
}

fn load(path: &str) -> Result<Document, ToolError> {
    let xml = fs::read_to_string(path).map_err(|source| ToolError::Read {
        path: path.to_string(),
        source,
    })?;
    let parsed = parse_document(&xml)?;
    if !parsed.skipped.is_empty() {
        info!(path = path, skipped = parsed.skipped.len(); "Some elements were skipped");
    }
    Ok(parsed.document)
}

fn run(args: &Args) -> Result<(), ToolError> {
    let config = EditorConfig::load_or_default(args.config.as_deref())?;
    debug!(config:?; "Configuration loaded");

    match &args.command {
        Command::Validate { input } => {
            let doc = load(input)?;
            let errors = validate(&doc);
            for err in &errors {
                println!("{err}");
            }
            if !errors.is_empty() {
                return Err(ToolError::Invalid(errors.len()));
            }
            info!(entries = doc.len(); "Document is valid");
        }
        Command::Layers { input } => {
            let doc = load(input)?;
            for layer in doc.list_layers() {
                println!(
                    "{}\t{}",
                    layer.id().unwrap_or_default(),
                    layer.label().unwrap_or_default()
                );
            }
        }
        Command::Normalize {
            input,
            output,
            mxfile,
            compressed,
        } => {
            let doc = load(input)?;
            let xml = if *mxfile {
                to_mxfile_xml(&doc, "Page-1", *compressed)?
            } else {
                doc.to_xml()
            };
            match output {
                Some(path) => fs::write(path, xml)?,
                None => println!("{xml}"),
            }
        }
        Command::Dump { input } => {
            let doc = load(input)?;
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        Command::Actions { input, id } => {
            let doc = load(input)?;
            let entry = doc
                .get(id)
                .ok_or_else(|| ToolError::NotFound(id.clone()))?;
            let decoded = entry
                .wrapper()
                .and_then(Wrapper::actions)
                .ok_or_else(|| ToolError::NoActions(id.clone()))?;
            if let Some(err) = &decoded.error {
                eprintln!("warning: {err}");
            }
            println!("{}", serde_json::to_string_pretty(&decoded.link)?);
            debug!(id = id.as_str(), kind = entry_kind(entry); "Decoded actions");
        }
    }
    Ok(())
}

fn entry_kind(entry: &Entry) -> &'static str {
    match entry {
        Entry::Cell(_) => "mxCell",
        Entry::UserObject(_) => "UserObject",
        Entry::Object(_) => "object",
    }
}

fn main() {
    let args = Args::parse();

    let log_level = LevelFilter::from_str(&args.log_level).unwrap_or_else(|_| {
        eprintln!(
            "Invalid log level: {}. Using 'warn' instead.",
            args.log_level
        );
        LevelFilter::Warn
    });
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(log_level)
        .init();

    debug!(args:?; "Parsed arguments");

    if let Err(err) = run(&args) {
        error!("{err}");
        process::exit(1);
    }
}
