mod commands;
mod output;

use clap::{Parser, Subcommand};
use pagebox_core::config::{load_config, ExtractionConfig};
use pagebox_core::error::PageboxError;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use commands::{parse_page, parse_quad, parse_size};

#[derive(Parser)]
#[command(
    name = "pagebox",
    version,
    about = "Map boxes on PDF pages to data columns and extract their text"
)]
struct Cli {
    /// Extraction settings (JSON)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Only use vector text, never OCR
    #[arg(long, global = true)]
    no_ocr: bool,

    /// Seconds before a single OCR call is abandoned
    #[arg(long, global = true, value_name = "SECS")]
    ocr_timeout: Option<u64>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty project file
    Init { project: PathBuf },
    /// Add PDF files (or refresh ones already in the project)
    Import {
        project: PathBuf,

        /// PDF files to add
        paths: Vec<PathBuf>,

        /// Also add every PDF below this folder
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
    },
    /// Manage data columns
    Column {
        #[command(subcommand)]
        action: ColumnAction,
    },
    /// Place, draw or remove boxes
    #[command(name = "box")]
    Boxes {
        #[command(subcommand)]
        action: BoxAction,
    },
    /// Edit cell values by hand
    Cell {
        #[command(subcommand)]
        action: CellAction,
    },
    /// Capture and apply box layouts
    Template {
        #[command(subcommand)]
        action: TemplateAction,
    },
    /// Re-extract text for every box (overwrites manual edits)
    Recognize {
        project: PathBuf,

        /// Only pages of this file
        #[arg(long)]
        file: Option<PathBuf>,

        /// Only this page (1-based, requires --file)
        #[arg(long, value_parser = parse_page, requires = "file")]
        page: Option<usize>,
    },
    /// Render a page to PNG at the configured render_dpi
    Render {
        project: PathBuf,
        #[arg(long)]
        file: PathBuf,
        /// 1-based page number
        #[arg(long, value_parser = parse_page)]
        page: usize,
        /// PNG file to write
        #[arg(long, value_name = "PNG")]
        out: PathBuf,
        /// Override render_dpi
        #[arg(long)]
        dpi: Option<f32>,
    },
    /// Print the project's pages and values
    Show {
        project: PathBuf,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Write the file and page reports
    Export {
        project: PathBuf,

        /// Output prefix; csv writes PREFIX-files.csv and PREFIX-pages.csv
        #[arg(long, value_name = "PREFIX")]
        out: PathBuf,

        /// csv (default) or json
        #[arg(short, long, default_value = "csv")]
        format: String,
    },
    /// Report whether OCR is available
    OcrStatus,
}

#[derive(Subcommand)]
enum ColumnAction {
    Add { project: PathBuf, name: String },
    Remove { project: PathBuf, name: String },
    Rename { project: PathBuf, old: String, new: String },
    /// Leave a column out of `show`
    Hide { project: PathBuf, name: String },
    Show { project: PathBuf, name: String },
    List { project: PathBuf },
}

#[derive(Subcommand)]
enum BoxAction {
    /// Set a box from relative coordinates
    Set {
        project: PathBuf,
        #[arg(long)]
        file: PathBuf,
        /// 1-based page number
        #[arg(long, value_parser = parse_page)]
        page: usize,
        #[arg(long)]
        column: String,
        /// x,y,w,h as fractions of the page
        #[arg(long, value_parser = parse_quad, allow_hyphen_values = true)]
        rect: [f64; 4],
    },
    /// Release a drag drawn in pixels on a displayed page
    Draw {
        project: PathBuf,
        #[arg(long)]
        file: PathBuf,
        #[arg(long, value_parser = parse_page)]
        page: usize,
        /// Column a new box is drawn for
        #[arg(long)]
        column: String,
        /// x,y,w,h in pixels (w/h may be negative)
        #[arg(long, value_parser = parse_quad, allow_hyphen_values = true)]
        pixels: [f64; 4],
        /// Displayed page size, WIDTHxHEIGHT or WIDTH,HEIGHT in pixels
        #[arg(long, value_parser = parse_size)]
        page_size: (f64, f64),
    },
    Remove {
        project: PathBuf,
        #[arg(long)]
        file: PathBuf,
        #[arg(long, value_parser = parse_page)]
        page: usize,
        #[arg(long)]
        column: String,
    },
}

#[derive(Subcommand)]
enum CellAction {
    Set {
        project: PathBuf,
        #[arg(long)]
        file: PathBuf,
        #[arg(long, value_parser = parse_page)]
        page: usize,
        #[arg(long)]
        column: String,
        #[arg(long, allow_hyphen_values = true)]
        value: String,
    },
}

#[derive(Subcommand)]
enum TemplateAction {
    /// Save a page's boxes as a template
    Capture {
        project: PathBuf,
        name: String,
        #[arg(long)]
        file: PathBuf,
        #[arg(long, value_parser = parse_page)]
        page: usize,
        #[arg(long, default_value = "")]
        remark: String,
    },
    /// Apply a template to pages
    Apply {
        project: PathBuf,
        name: String,
        /// Target file (default: every file)
        #[arg(long)]
        file: Option<PathBuf>,
        /// Target pages, 1-based (default: every page of --file)
        #[arg(long = "page", value_parser = parse_page, requires = "file")]
        pages: Vec<usize>,
        /// Remove every existing box on the target pages first
        #[arg(long)]
        clear_page: bool,
    },
    Delete { project: PathBuf, name: String },
    List { project: PathBuf },
    Remark { project: PathBuf, name: String, remark: String },
    Rename { project: PathBuf, old: String, new: String },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "pagebox=debug,pagebox_core=debug"
    } else {
        "pagebox=info,pagebox_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn extraction_config(cli: &Cli) -> Result<ExtractionConfig, PageboxError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ExtractionConfig::default(),
    };
    if cli.no_ocr {
        config.ocr_enabled = false;
    }
    if let Some(secs) = cli.ocr_timeout {
        config.ocr_timeout_secs = secs.max(1);
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<(), PageboxError> {
    let config = extraction_config(&cli)?;

    match cli.command {
        Commands::Init { project } => commands::project::init(&project),
        Commands::Import {
            project,
            paths,
            dir,
        } => commands::import::run(&project, paths, dir),
        Commands::Column { action } => match action {
            ColumnAction::Add { project, name } => commands::column::add(&project, &name),
            ColumnAction::Remove { project, name } => commands::column::remove(&project, &name),
            ColumnAction::Rename { project, old, new } => {
                commands::column::rename(&project, &old, &new)
            }
            ColumnAction::Hide { project, name } => {
                commands::column::set_visible(&project, &name, false)
            }
            ColumnAction::Show { project, name } => {
                commands::column::set_visible(&project, &name, true)
            }
            ColumnAction::List { project } => commands::column::list(&project),
        },
        Commands::Boxes { action } => match action {
            BoxAction::Set {
                project,
                file,
                page,
                column,
                rect,
            } => commands::boxes::set(&project, &file, page, &column, rect),
            BoxAction::Draw {
                project,
                file,
                page,
                column,
                pixels,
                page_size,
            } => commands::boxes::draw(&project, &file, page, &column, pixels, page_size),
            BoxAction::Remove {
                project,
                file,
                page,
                column,
            } => commands::boxes::remove(&project, &file, page, &column),
        },
        Commands::Cell { action } => match action {
            CellAction::Set {
                project,
                file,
                page,
                column,
                value,
            } => commands::boxes::set_cell(&project, &file, page, &column, &value),
        },
        Commands::Template { action } => match action {
            TemplateAction::Capture {
                project,
                name,
                file,
                page,
                remark,
            } => commands::template::capture(&project, &name, &file, page, &remark),
            TemplateAction::Apply {
                project,
                name,
                file,
                pages,
                clear_page,
            } => commands::template::apply(&project, &name, file, pages, clear_page),
            TemplateAction::Delete { project, name } => {
                commands::template::delete(&project, &name)
            }
            TemplateAction::List { project } => commands::template::list(&project),
            TemplateAction::Remark {
                project,
                name,
                remark,
            } => commands::template::remark(&project, &name, &remark),
            TemplateAction::Rename { project, old, new } => {
                commands::template::rename(&project, &old, &new)
            }
        },
        Commands::Recognize {
            project,
            file,
            page,
        } => commands::recognize::run(&project, file, page, &config),
        Commands::Render {
            project,
            file,
            page,
            out,
            dpi,
        } => {
            let config = ExtractionConfig {
                render_dpi: dpi
                    .filter(|d| d.is_finite() && *d > 0.0)
                    .unwrap_or(config.render_dpi),
                ..config
            };
            commands::render::run(&project, &file, page, &out, &config)
        }
        Commands::Show { project, output } => commands::project::show(&project, &output),
        Commands::Export {
            project,
            out,
            format,
        } => commands::project::export(&project, &out, &format),
        Commands::OcrStatus => commands::recognize::ocr_status(&config),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
