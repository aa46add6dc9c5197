//! jarvis CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use jarvis::{
    cad::mech::{mech_convert, mech_info, mech_read, mech_validate, read_table},
    cad::viewer::{cad_info, cad_tree, cad_view, print_cad_info, print_tree, Background, Projection, ViewOptions},
    calculix::{clean_mesh, extract_nsets, print_clean_stats, print_nset_stats},
    commands::{
        cmd_classify, cmd_docx_create, cmd_docx_read, cmd_fetch, cmd_health_dashboard,
        cmd_health_processing, cmd_ingest, cmd_list, cmd_parse, cmd_pmo_sync, cmd_pptx_create,
        cmd_pptx_read, cmd_reprocess, cmd_sheet_export, cmd_sheet_import, cmd_xlsx_create,
        cmd_xlsx_read, print_classify_stats, print_docx_info, print_edits, print_export_result,
        print_fetch_report, print_import_stats, print_ingest_report, print_list_report,
        print_parse_stats, print_pptx_info, print_sync_stats, print_xlsx_info, CreateInput,
        InfoFormat, ReadFormat, TableFormat,
    },
    config::Config,
    error::{Error, Result},
    office::{docx, pptx, xlsx},
    progress::LogWriterFactory,
    server,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "jarvis")]
#[command(version, about = "JARVIS workspace tools: health, email, PMO, office and CAD files", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble node health reports from collected fragments
    Health {
        #[command(subcommand)]
        node: HealthNode,
    },

    /// Inspect, outline and render 3D models
    Cad {
        #[command(subcommand)]
        action: CadAction,
    },

    /// Mechanical drawing and model files (DXF, DWG, STEP, IGES, STL, glTF, SVG, PDF)
    Mech {
        #[command(subcommand)]
        action: MechAction,
    },

    /// Word documents
    Docx {
        #[command(subcommand)]
        action: DocxAction,
    },

    /// PowerPoint presentations
    Pptx {
        #[command(subcommand)]
        action: PptxAction,
    },

    /// Excel workbooks
    Xlsx {
        #[command(subcommand)]
        action: XlsxAction,
    },

    /// Email organizer
    Email {
        #[command(subcommand)]
        action: EmailAction,
    },

    /// PMO backend
    Pmo {
        #[command(subcommand)]
        action: PmoAction,
    },

    /// CalculiX input deck helpers for GMSH meshes
    Calculix {
        #[command(subcommand)]
        action: CalculixAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum HealthNode {
    /// Processing node: docker, postgres, redis, PLC monitor, endpoints
    Processing {
        /// Fragment directory (defaults to TMPD)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Dashboard node: docker, postgres, endpoints
    Dashboard {
        /// Fragment directory (defaults to TMPD)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum CadAction {
    /// Geometry summary: bounds, volume, area, per-body breakdown
    Info { file: PathBuf },

    /// Assembly / part hierarchy
    Tree { file: PathBuf },

    /// Render the model to SVG
    View {
        file: PathBuf,

        /// Output file (defaults to the input with .svg)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "iso")]
        projection: Projection,

        /// Body to leave out (repeatable)
        #[arg(long)]
        hide: Vec<String>,

        /// Draw only these bodies (repeatable)
        #[arg(long)]
        only: Vec<String>,

        #[arg(long, value_enum, default_value = "dark")]
        background: Background,

        /// Fill opacity (0-1)
        #[arg(long, default_value = "1.0")]
        opacity: f64,

        /// Stroke triangle edges
        #[arg(long)]
        edges: bool,
    },
}

#[derive(Subcommand)]
enum MechAction {
    /// File metadata as JSON
    Info { file: PathBuf },

    /// File contents
    Read {
        file: PathBuf,

        #[arg(short, long, value_enum, default_value = "json")]
        format: TableFormat,
    },

    /// Structural checks; exits 1 when the file is invalid
    Validate { file: PathBuf },

    /// Convert between formats
    Convert {
        file: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Subcommand)]
enum DocxAction {
    Read {
        file: PathBuf,

        #[arg(short, long, value_enum, default_value = "text")]
        format: ReadFormat,

        /// Include run formatting and alignment in JSON output
        #[arg(long)]
        with_styles: bool,

        /// Block slice, 0-based `start:end`
        #[arg(long)]
        range: Option<String>,
    },

    Create {
        file: PathBuf,

        /// Markdown or JSON source (stdin when omitted)
        #[arg(short, long)]
        source: Option<PathBuf>,

        #[arg(long, value_enum)]
        input: Option<CreateInput>,

        /// Take styles from this document
        #[arg(long)]
        template: Option<PathBuf>,
    },

    Edit {
        file: PathBuf,

        /// Replace the first occurrence
        #[arg(long, num_args = 2, value_names = ["OLD", "NEW"])]
        replace: Option<Vec<String>>,

        #[arg(long, num_args = 2, value_names = ["OLD", "NEW"])]
        replace_all: Option<Vec<String>>,

        /// Append a paragraph
        #[arg(long)]
        append: Option<String>,

        /// Insert a paragraph before block IDX
        #[arg(long, num_args = 2, value_names = ["IDX", "TEXT"])]
        insert: Option<Vec<String>>,

        /// Delete block IDX
        #[arg(long)]
        delete: Option<usize>,

        #[arg(long, num_args = 2, value_names = ["KEY", "VALUE"])]
        set_metadata: Option<Vec<String>>,
    },

    Info {
        file: PathBuf,

        #[arg(short, long, value_enum, default_value = "text")]
        format: InfoFormat,
    },
}

#[derive(Subcommand)]
enum PptxAction {
    Read {
        file: PathBuf,

        #[arg(short, long, value_enum, default_value = "text")]
        format: ReadFormat,

        #[arg(long)]
        with_styles: bool,

        /// Slide range, 1-based `start:end`
        #[arg(long)]
        range: Option<String>,
    },

    Create {
        file: PathBuf,

        /// Markdown or JSON source (stdin when omitted)
        #[arg(short, long)]
        source: Option<PathBuf>,

        #[arg(long, value_enum)]
        input: Option<CreateInput>,

        /// Start from this presentation's masters and layouts
        #[arg(long)]
        template: Option<PathBuf>,
    },

    Edit {
        file: PathBuf,

        #[arg(long, num_args = 2, value_names = ["OLD", "NEW"])]
        replace: Option<Vec<String>>,

        #[arg(long, num_args = 2, value_names = ["OLD", "NEW"])]
        replace_all: Option<Vec<String>>,

        /// Layout name or index for a new slide
        #[arg(long)]
        add_slide: Option<String>,

        #[arg(long, requires = "add_slide")]
        title: Option<String>,

        #[arg(long, requires = "add_slide")]
        body: Option<String>,

        #[arg(long)]
        delete_slide: Option<usize>,

        #[arg(long, num_args = 2, value_names = ["N", "TEXT"])]
        set_notes: Option<Vec<String>>,

        #[arg(long, num_args = 2, value_names = ["KEY", "VALUE"])]
        set_metadata: Option<Vec<String>>,
    },

    Info {
        file: PathBuf,

        #[arg(short, long, value_enum, default_value = "text")]
        format: InfoFormat,
    },
}

#[derive(Subcommand)]
enum XlsxAction {
    Read {
        file: PathBuf,

        #[arg(long)]
        sheet: Option<String>,

        /// Cell range such as A1:D10
        #[arg(long)]
        range: Option<String>,

        #[arg(short, long, value_enum, default_value = "json")]
        format: TableFormat,

        #[arg(long)]
        with_styles: bool,
    },

    Create {
        file: PathBuf,

        /// JSON source (stdin when omitted)
        #[arg(short, long)]
        source: Option<PathBuf>,

        #[arg(long)]
        sheet: Option<String>,
    },

    Edit {
        file: PathBuf,

        #[arg(long)]
        sheet: Option<String>,

        /// `A1=VALUE` (repeatable)
        #[arg(long)]
        set: Vec<String>,

        /// Insert an empty row at N (1-based)
        #[arg(long)]
        insert_row: Option<u32>,

        /// Delete row N (1-based)
        #[arg(long)]
        delete_row: Option<u32>,

        /// Rename the sheet
        #[arg(long)]
        rename: Option<String>,
    },

    Info { file: PathBuf },
}

#[derive(Subcommand)]
enum EmailAction {
    /// Fetch new messages over IMAP into staging
    Fetch {
        /// Leave fetched messages in staging
        #[arg(long)]
        no_classify: bool,
    },

    /// Route staged messages to project mailboxes
    Classify {
        /// Directory of .eml files (defaults to staging)
        #[arg(long)]
        source: Option<PathBuf>,
    },

    /// Parse a project's raw messages into records
    Parse {
        project: String,

        /// Re-parse messages already in the index
        #[arg(long)]
        force: bool,
    },

    /// Fetch, classify and parse every project
    Ingest,

    /// Recent index entries
    List {
        #[arg(long)]
        project: Option<String>,
    },

    /// Re-parse every message of a project
    Reprocess { project: String },
}

#[derive(Subcommand)]
enum PmoAction {
    /// Start the REST backend
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,
    },

    /// Sync suppliers and schedules from the PMO tree into the database
    Sync,

    /// Export the database to the Google Sheet
    SheetExport,

    /// Import rows from the Google Sheet
    SheetImport,
}

#[derive(Subcommand)]
enum CalculixAction {
    /// Drop surface elements and their element sets
    CleanMesh { input: PathBuf, output: PathBuf },

    /// Write node sets for each surface element set
    ExtractNsets { input: PathBuf, output: PathBuf },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory::default()))
        .with(filter)
        .init();

    // File tools never need configuration
    let config = match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "jarvis", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Cad { action } => return handle_cad(action, cli.json),
        Commands::Mech { action } => return handle_mech(action, cli.json),
        Commands::Docx { action } => return handle_docx(action, cli.json),
        Commands::Pptx { action } => return handle_pptx(action, cli.json),
        Commands::Xlsx { action } => return handle_xlsx(action, cli.json),
        Commands::Calculix { action } => return handle_calculix(action, cli.json),
        _ => Config::load_or_default(cli.config.as_deref())?,
    };

    match cli.command {
        Commands::Health { node } => {
            let report = match node {
                HealthNode::Processing { dir } => {
                    serde_json::to_value(cmd_health_processing(&config, dir.as_deref())?)?
                }
                HealthNode::Dashboard { dir } => {
                    serde_json::to_value(cmd_health_dashboard(&config, dir.as_deref())?)?
                }
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Email { action } => handle_email(&config, action, cli.json).await?,

        Commands::Pmo { action } => handle_pmo(config, action, cli.json).await?,

        _ => {}
    }

    Ok(())
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `--flag A B` pairs; clap guarantees two values
fn pair(values: Option<Vec<String>>) -> Option<(String, String)> {
    values.and_then(|v| match <[String; 2]>::try_from(v) {
        Ok([a, b]) => Some((a, b)),
        Err(_) => None,
    })
}

fn index_pair(values: Option<Vec<String>>, what: &str) -> Result<Option<(usize, String)>> {
    pair(values)
        .map(|(idx, text)| {
            idx.parse::<usize>()
                .map(|idx| (idx, text))
                .map_err(|_| Error::Invalid(format!("{} must be a number, got '{}'", what, idx)))
        })
        .transpose()
}

fn handle_cad(action: CadAction, json: bool) -> Result<()> {
    match action {
        CadAction::Info { file } => {
            let info = cad_info(&file)?;
            if json {
                print_json(&info)?;
            } else {
                print_cad_info(&info);
            }
        }
        CadAction::Tree { file } => {
            let tree = cad_tree(&file)?;
            if json {
                print_json(&tree)?;
            } else {
                print_tree(&tree);
            }
        }
        CadAction::View {
            file,
            output,
            projection,
            hide,
            only,
            background,
            opacity,
            edges,
        } => {
            let options = ViewOptions {
                projection,
                hide,
                only,
                background,
                opacity: opacity.clamp(0.0, 1.0),
                edges,
            };
            let report = cad_view(&file, output.as_deref(), &options)?;
            if json {
                print_json(&report)?;
            } else {
                println!("✓ Wrote {}", report.output.display());
                println!("  Bodies drawn: {}", report.bodies_drawn.join(", "));
                if !report.bodies_hidden.is_empty() {
                    println!("  Bodies hidden: {}", report.bodies_hidden.join(", "));
                }
            }
        }
    }
    Ok(())
}

fn handle_mech(action: MechAction, json: bool) -> Result<()> {
    match action {
        MechAction::Info { file } => print_json(&mech_info(&file)?)?,
        MechAction::Read { file, format } => {
            let contents = mech_read(&file)?;
            match format {
                TableFormat::Table if !json => print!("{}", read_table(&contents)),
                _ => print_json(&contents)?,
            }
        }
        MechAction::Validate { file } => {
            let result = mech_validate(&file)?;
            if json {
                print_json(&result)?;
            } else if result.valid {
                println!("✓ {} is valid", file.display());
            } else {
                if let Some(error) = &result.error {
                    println!("  ! {}", error);
                }
                for issue in &result.issues {
                    println!("  ! {}", issue);
                }
            }
            if !result.valid {
                return Err(Error::Invalid(format!("{} failed validation", file.display())));
            }
        }
        MechAction::Convert { file, output } => {
            let report = mech_convert(&file, &output)?;
            if json {
                print_json(&report)?;
            } else {
                println!(
                    "✓ Converted {} ({}) → {} ({})",
                    report.source.display(),
                    report.from,
                    report.output.display(),
                    report.to
                );
                if let Some(triangles) = report.triangles {
                    println!("  Triangles: {}", triangles);
                }
            }
        }
    }
    Ok(())
}

fn handle_docx(action: DocxAction, json: bool) -> Result<()> {
    match action {
        DocxAction::Read {
            file,
            format,
            with_styles,
            range,
        } => {
            let format = if json { ReadFormat::Json } else { format };
            println!("{}", cmd_docx_read(&file, format, with_styles, range.as_deref())?);
        }
        DocxAction::Create {
            file,
            source,
            input,
            template,
        } => {
            cmd_docx_create(&file, source.as_deref(), input, template.as_deref())?;
            println!("✓ Created {}", file.display());
        }
        DocxAction::Edit {
            file,
            replace,
            replace_all,
            append,
            insert,
            delete,
            set_metadata,
        } => {
            let edits = docx::DocxEdit {
                replace: pair(replace),
                replace_all: pair(replace_all),
                append,
                insert: index_pair(insert, "--insert index")?,
                delete,
                set_metadata: pair(set_metadata),
            };
            print_edits(&file, &docx::edit(&file, &edits)?);
        }
        DocxAction::Info { file, format } => {
            let info = docx::info(&file)?;
            if json || format == InfoFormat::Json {
                print_json(&info)?;
            } else {
                print_docx_info(&info);
            }
        }
    }
    Ok(())
}

fn handle_pptx(action: PptxAction, json: bool) -> Result<()> {
    match action {
        PptxAction::Read {
            file,
            format,
            with_styles,
            range,
        } => {
            let format = if json { ReadFormat::Json } else { format };
            println!("{}", cmd_pptx_read(&file, format, with_styles, range.as_deref())?);
        }
        PptxAction::Create {
            file,
            source,
            input,
            template,
        } => {
            let slides = cmd_pptx_create(&file, source.as_deref(), input, template.as_deref())?;
            println!("✓ Created {} with {} slide(s)", file.display(), slides);
        }
        PptxAction::Edit {
            file,
            replace,
            replace_all,
            add_slide,
            title,
            body,
            delete_slide,
            set_notes,
            set_metadata,
        } => {
            let edits = pptx::PptxEdit {
                replace: pair(replace),
                replace_all: pair(replace_all),
                add_slide,
                title,
                body,
                delete_slide,
                set_notes: index_pair(set_notes, "--set-notes slide")?,
                set_metadata: pair(set_metadata),
            };
            print_edits(&file, &pptx::edit(&file, &edits)?);
        }
        PptxAction::Info { file, format } => {
            let info = pptx::info(&file)?;
            if json || format == InfoFormat::Json {
                print_json(&info)?;
            } else {
                print_pptx_info(&info);
            }
        }
    }
    Ok(())
}

fn handle_xlsx(action: XlsxAction, json: bool) -> Result<()> {
    match action {
        XlsxAction::Read {
            file,
            sheet,
            range,
            format,
            with_styles,
        } => {
            let format = if json { TableFormat::Json } else { format };
            println!(
                "{}",
                cmd_xlsx_read(&file, sheet.as_deref(), range.as_deref(), format, with_styles)?
            );
        }
        XlsxAction::Create {
            file,
            source,
            sheet,
        } => {
            let rows = cmd_xlsx_create(&file, source.as_deref(), sheet.as_deref())?;
            println!("✓ Created {} with {} row(s)", file.display(), rows);
        }
        XlsxAction::Edit {
            file,
            sheet,
            set,
            insert_row,
            delete_row,
            rename,
        } => {
            let edits = xlsx::XlsxEdit {
                set,
                insert_row,
                delete_row,
                rename,
            };
            print_edits(&file, &xlsx::edit(&file, sheet.as_deref(), &edits)?);
        }
        XlsxAction::Info { file } => {
            let info = xlsx::info(&file)?;
            if json {
                print_json(&info)?;
            } else {
                print_xlsx_info(&info);
            }
        }
    }
    Ok(())
}

fn handle_calculix(action: CalculixAction, json: bool) -> Result<()> {
    match action {
        CalculixAction::CleanMesh { input, output } => {
            let stats = clean_mesh(&input, &output)?;
            if json {
                print_json(&stats)?;
            } else {
                print_clean_stats(&stats);
            }
        }
        CalculixAction::ExtractNsets { input, output } => {
            let stats = extract_nsets(&input, &output)?;
            if json {
                print_json(&stats)?;
            } else {
                print_nset_stats(&stats);
            }
        }
    }
    Ok(())
}

async fn handle_email(config: &Config, action: EmailAction, json: bool) -> Result<()> {
    match action {
        EmailAction::Fetch { no_classify } => {
            let report = cmd_fetch(config, !no_classify).await?;
            if json {
                print_json(&report)?;
            } else {
                print_fetch_report(&report);
            }
        }
        EmailAction::Classify { source } => {
            let stats = cmd_classify(config, source.as_deref())?;
            if json {
                print_json(&stats)?;
            } else {
                print_classify_stats(&stats);
            }
        }
        EmailAction::Parse { project, force } => {
            let stats = cmd_parse(config, &project, force)?;
            if json {
                print_json(&stats)?;
            } else {
                print_parse_stats(&stats);
            }
        }
        EmailAction::Ingest => {
            let report = cmd_ingest(config).await?;
            if json {
                print_json(&report)?;
            } else {
                print_ingest_report(&report);
            }
        }
        EmailAction::List { project } => {
            let report = cmd_list(config, project.as_deref())?;
            if json {
                print_json(&report)?;
            } else {
                print_list_report(&report);
            }
        }
        EmailAction::Reprocess { project } => {
            let stats = cmd_reprocess(config, &project)?;
            if json {
                print_json(&stats)?;
            } else {
                print_parse_stats(&stats);
            }
        }
    }
    Ok(())
}

async fn handle_pmo(mut config: Config, action: PmoAction, json: bool) -> Result<()> {
    match action {
        PmoAction::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            config.validate()?;
            server::serve(config).await?;
        }
        PmoAction::Sync => {
            let stats = cmd_pmo_sync(&config).await?;
            if json {
                print_json(&stats)?;
            } else {
                print_sync_stats(&stats);
            }
        }
        PmoAction::SheetExport => {
            let result = cmd_sheet_export(&config).await?;
            if json {
                print_json(&result)?;
            } else {
                print_export_result(&result);
            }
        }
        PmoAction::SheetImport => {
            let stats = cmd_sheet_import(&config).await?;
            if json {
                print_json(&stats)?;
            } else {
                print_import_stats(&stats);
            }
        }
    }
    Ok(())
}
