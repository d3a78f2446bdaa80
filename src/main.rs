// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Command-line interface for chatmd2pdf.
//!
//! This binary provides the `chatmd2pdf` command for turning Markdown files
//! into the rasterizer-ready HTML page, the parsed block tree as JSON, or the
//! page plan for a rendered bitmap of known size.

use chatmd2pdf::naming::{self, UniqueNames};
use chatmd2pdf::paginate::{DocumentGeometry, GeometryError, PageSize, PageSlice};
use chatmd2pdf::{parser, renderer};
use chrono::Utc;
use lexopt::prelude::*;
use serde::Serialize;
use snafu::{ensure, prelude::*};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Where to write the rendered output.
#[derive(Clone)]
enum OutputTarget {
    /// Write each file to the specified directory.
    Directory(PathBuf),
    /// Write to stdout.
    Stdout,
}

/// What to produce for each input.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Emit {
    /// The standalone HTML page handed to a rasterizer.
    Html,
    /// The parsed block tree.
    Json,
    /// The page slices for a bitmap of `--bitmap-width` x `--bitmap-height`.
    Pages,
}

impl Emit {
    const fn extension(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Json => "json",
            Self::Pages => "pages.json",
        }
    }
}

struct Cli {
    input: Vec<PathBuf>,
    output: OutputTarget,
    emit: Emit,
    page: PageSize,
    font: String,
    width: u32,
    bitmap_width: u32,
    bitmap_height: Option<u32>,
    prefix: String,
    quiet: bool,
    dry_run: bool,
    force: bool,
}

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to parse arguments: {source}"))]
    ParseArgs { source: lexopt::Error },

    #[snafu(display("no Markdown input files found"))]
    NoInputFiles,

    #[snafu(display("cannot output multiple files to stdout"))]
    MultipleFilesToStdout,

    #[snafu(display("--emit pages requires --bitmap-height"))]
    MissingBitmapHeight,

    #[snafu(display("invalid page geometry: {source}"))]
    Geometry { source: GeometryError },

    #[snafu(display("failed to create output directory: {source}"))]
    CreateOutputDir { source: std::io::Error },

    #[snafu(display("failed to read {}: {source}", path.display()))]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to serialize {}: {source}", path.display()))]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("failed to write {}: {source}", path.display()))]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The page plan written by `--emit pages`.
#[derive(Serialize)]
struct PagePlan {
    geometry: DocumentGeometry,
    bitmap_height: u32,
    slices: Vec<PageSlice>,
}

fn print_help() {
    println!(
        "\
{name} {version}
Render chat-export Markdown for paginated export

Usage: {name} [OPTIONS] -o <OUTPUT> <INPUT>...

Arguments:
  <INPUT>...  Markdown files or directories containing them

Options:
  -o, --output <OUTPUT>     Output directory (or - for stdout)
      --emit <KIND>         html, json or pages (default: html)
      --prefix <NAME>       File name prefix (default: chat)

Rendering:
      --font <FAMILY>       Body font family (default: SimHei)
      --width <PX>          Content width in CSS pixels (default: 960)

Pagination (--emit pages):
      --paper <NAME>        a4, letter or legal (default: a4)
      --bitmap-width <PX>   Width of the rendered bitmap (default: 1920)
      --bitmap-height <PX>  Height of the rendered bitmap (required)

Other options:
  -q, --quiet               Suppress progress messages
  -n, --dry-run             Show what would be processed without writing
  -f, --force               Overwrite existing output files
  -h, --help                Print help
  -V, --version             Print version

Set RUST_LOG=debug for parser and pagination diagnostics.",
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
    );
}

fn parse_args() -> Result<Cli, lexopt::Error> {
    // Show help if no arguments provided
    if std::env::args().len() == 1 {
        print_help();
        std::process::exit(0);
    }

    let defaults = renderer::RenderOptions::default();
    let mut input = Vec::new();
    let mut output: Option<OutputTarget> = None;
    let mut emit = Emit::Html;
    let mut page = PageSize::A4;
    let mut font = defaults.font_family;
    let mut width = defaults.content_width;
    let mut bitmap_width: u32 = 1920;
    let mut bitmap_height: Option<u32> = None;
    let mut prefix = String::from("chat");
    let mut quiet = false;
    let mut dry_run = false;
    let mut force = false;

    let mut parser = lexopt::Parser::from_env();
    while let Some(arg) = parser.next()? {
        match arg {
            Short('o') | Long("output") => {
                let val: PathBuf = parser.value()?.parse()?;
                output = Some(if val == Path::new("-") {
                    OutputTarget::Stdout
                } else {
                    OutputTarget::Directory(val)
                });
            }
            Long("emit") => {
                let val = parser.value()?.string()?;
                emit = match val.as_str() {
                    "html" => Emit::Html,
                    "json" => Emit::Json,
                    "pages" => Emit::Pages,
                    _ => return Err("emit must be html, json or pages".into()),
                };
            }
            Long("paper") => {
                let val = parser.value()?.string()?;
                page = PageSize::from_name(&val).ok_or("paper must be a4, letter or legal")?;
            }
            Long("font") => font = parser.value()?.string()?,
            Long("width") => width = parser.value()?.parse()?,
            Long("bitmap-width") => bitmap_width = parser.value()?.parse()?,
            Long("bitmap-height") => bitmap_height = Some(parser.value()?.parse()?),
            Long("prefix") => prefix = parser.value()?.string()?,
            Short('q') | Long("quiet") => quiet = true,
            Short('n') | Long("dry-run") => dry_run = true,
            Short('f') | Long("force") => force = true,
            Short('h') | Long("help") => {
                print_help();
                std::process::exit(0);
            }
            Short('V') | Long("version") => {
                println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            Value(val) => input.push(val.parse()?),
            _ => return Err(arg.unexpected()),
        }
    }

    Ok(Cli {
        input,
        output: output.ok_or("missing required option: --output")?,
        emit,
        page,
        font,
        width,
        bitmap_width,
        bitmap_height,
        prefix,
        quiet,
        dry_run,
        force,
    })
}

fn main() -> Result<(), Error> {
    env_logger::init();

    let cli = parse_args().context(ParseArgsSnafu)?;

    ensure!(!cli.input.is_empty(), NoInputFilesSnafu);

    // Reject bad geometry before any file is touched
    let geometry = if cli.emit == Emit::Pages {
        ensure!(cli.bitmap_height.is_some(), MissingBitmapHeightSnafu);
        Some(DocumentGeometry::new(cli.page, cli.bitmap_width).context(GeometrySnafu)?)
    } else {
        None
    };

    let files = collect_input_files(&cli.input);
    ensure!(!files.is_empty(), NoInputFilesSnafu);

    match &cli.output {
        OutputTarget::Stdout => {
            ensure!(files.len() == 1, MultipleFilesToStdoutSnafu);
            process_to_stdout(&files[0], geometry.as_ref(), &cli)?;
        }
        OutputTarget::Directory(dir) => {
            if !cli.dry_run {
                std::fs::create_dir_all(dir).context(CreateOutputDirSnafu)?;
            }
            let mut names = UniqueNames::default();
            for file in &files {
                process_file(file, dir, &mut names, geometry.as_ref(), &cli)?;
            }
        }
    }

    Ok(())
}

/// Collects all Markdown files from the given inputs (files and directories).
fn collect_input_files(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input)
                .sort_by_file_name()
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| {
                    e.path()
                        .extension()
                        .is_some_and(|ext| ext == "md" || ext == "markdown")
                })
            {
                files.push(entry.path().to_path_buf());
            }
        } else {
            files.push(input.clone());
        }
    }
    files
}

/// Creates render options from CLI arguments.
fn make_render_options(cli: &Cli) -> renderer::RenderOptions {
    renderer::RenderOptions {
        font_family: cli.font.clone(),
        content_width: cli.width,
    }
}

/// A converted input, ready to be written.
struct Converted {
    file_name: String,
    contents: String,
}

/// Reads and converts one input.
///
/// Returns `None` when there is nothing to export.
fn convert(
    input: &Path,
    geometry: Option<&DocumentGeometry>,
    cli: &Cli,
) -> Result<Option<Converted>, Error> {
    let markdown = std::fs::read_to_string(input).context(ReadFileSnafu { path: input })?;
    let blocks = parser::parse(&markdown);
    if blocks.is_empty() {
        log::warn!("no blocks parsed from {}", input.display());
        return Ok(None);
    }

    let contents = match (cli.emit, geometry, cli.bitmap_height) {
        (Emit::Pages, Some(geometry), Some(bitmap_height)) => {
            let slices = geometry.slices(bitmap_height);
            if slices.is_empty() {
                return Ok(None);
            }
            let plan = PagePlan {
                geometry: *geometry,
                bitmap_height,
                slices,
            };
            serde_json::to_string_pretty(&plan).context(SerializeSnafu { path: input })?
        }
        (Emit::Json, ..) => {
            serde_json::to_string_pretty(&blocks).context(SerializeSnafu { path: input })?
        }
        _ => renderer::render_document(&blocks, &make_render_options(cli)),
    };

    let file_name = naming::file_name(
        &markdown,
        &cli.prefix,
        Utc::now().date_naive(),
        cli.emit.extension(),
    );

    Ok(Some(Converted {
        file_name,
        contents,
    }))
}

/// Processes a single file and outputs to stdout.
fn process_to_stdout(
    input: &Path,
    geometry: Option<&DocumentGeometry>,
    cli: &Cli,
) -> Result<(), Error> {
    if cli.dry_run {
        eprintln!("Would output {}", input.display());
        return Ok(());
    }

    match convert(input, geometry, cli)? {
        Some(converted) => println!("{}", converted.contents),
        None => eprintln!("Nothing to export in {}", input.display()),
    }
    Ok(())
}

/// Processes a single file and writes to the output directory.
fn process_file(
    input: &Path,
    out_dir: &Path,
    names: &mut UniqueNames,
    geometry: Option<&DocumentGeometry>,
    cli: &Cli,
) -> Result<(), Error> {
    let Some(converted) = convert(input, geometry, cli)? else {
        if !cli.quiet {
            eprintln!("Skipping {} (nothing to export)", input.display());
        }
        return Ok(());
    };
    let out_path = out_dir.join(names.claim(&converted.file_name, cli.emit.extension()));

    // Handle dry-run mode
    if cli.dry_run {
        eprintln!("Would write {}", out_path.display());
        return Ok(());
    }

    // Check if output exists and handle overwrite
    if out_path.exists() && !cli.force {
        eprintln!(
            "Skipping {} (already exists, use --force to overwrite)",
            out_path.display()
        );
        return Ok(());
    }

    std::fs::write(&out_path, &converted.contents).context(WriteFileSnafu { path: &out_path })?;

    if !cli.quiet {
        eprintln!("Wrote {}", out_path.display());
    }
    Ok(())
}
