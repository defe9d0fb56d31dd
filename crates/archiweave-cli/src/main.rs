use archiweave::export::{ExportOptions, LayoutOptions, export_views};
use archiweave::{IngestWarning, PageStatus, Session, extract};
use futures::executor::block_on;
use serde::Serialize;
use std::io::Read;

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Extract(archiweave::Error),
    Export(archiweave::export::ExportError),
    Json(serde_json::Error),
    NothingExported,
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Extract(err) => write!(f, "{err}"),
            CliError::Export(err) => write!(f, "{err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
            CliError::NothingExported => write!(f, "No page yielded any model data"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<archiweave::Error> for CliError {
    fn from(value: archiweave::Error) -> Self {
        Self::Extract(value)
    }
}

impl From<archiweave::export::ExportError> for CliError {
    fn from(value: archiweave::export::ExportError) -> Self {
        Self::Export(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Clone, Copy, Default)]
enum Command {
    #[default]
    Extract,
    Report,
    Export,
}

#[derive(Debug)]
struct Args {
    command: Command,
    inputs: Vec<String>,
    pretty: bool,
    out: Option<String>,
    views: Vec<String>,
    model_name: Option<String>,
    layout: LayoutOptions,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            command: Command::Extract,
            inputs: Vec::new(),
            pretty: false,
            out: None,
            views: Vec::new(),
            model_name: None,
            layout: LayoutOptions::default(),
        }
    }
}

#[derive(Serialize)]
struct ReportOut {
    pages: Vec<PageStatus>,
    warnings: Vec<IngestWarning>,
}

fn usage() -> &'static str {
    "archiweave-cli\n\
\n\
USAGE:\n\
  archiweave-cli extract [--pretty] [<page.html>|-]\n\
  archiweave-cli report [--pretty] <pages...>\n\
  archiweave-cli export [--out <model.xml>] [--view <id>]... [--model-name <name>] [--cell-width <n>] [--cell-height <n>] [--cell-padding <n>] [--max-row-width <n>] <pages...>\n\
\n\
NOTES:\n\
  - If no page is given (or '-'), input is read from stdin.\n\
  - extract prints one page's decoded payload as JSON.\n\
  - report ingests every page and prints per-page ingest statuses as JSON.\n\
  - export writes the exchange document to stdout by default; use --out for a file.\n\
  - Pages that fail to extract are reported on stderr; the remaining pages are\n\
    still exported. The command fails only when nothing could be exported.\n\
  - --view selects views to export (repeatable); default is every ingested view.\n\
"
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args::default();

    let mut it = argv.iter().skip(1).peekable();
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "extract" => args.command = Command::Extract,
            "report" => args.command = Command::Report,
            "export" => args.command = Command::Export,
            "--pretty" => args.pretty = true,
            "--out" => {
                let Some(out) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.out = Some(out.clone());
            }
            "--view" => {
                let Some(view) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.views.push(view.clone());
            }
            "--model-name" => {
                let Some(name) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.model_name = Some(name.clone());
            }
            "--cell-width" => args.layout.cell_width = parse_dim(it.next())?,
            "--cell-height" => args.layout.cell_height = parse_dim(it.next())?,
            "--cell-padding" => args.layout.padding = parse_dim(it.next())?,
            "--max-row-width" => args.layout.max_row_width = parse_dim(it.next())?,
            "--" => {
                for rest in it.by_ref() {
                    args.inputs.push(rest.clone());
                }
            }
            other if other.starts_with('-') && other != "-" => {
                return Err(CliError::Usage(usage()));
            }
            path => args.inputs.push(path.to_string()),
        }
    }

    if matches!(args.command, Command::Extract) && args.inputs.len() > 1 {
        return Err(CliError::Usage(usage()));
    }

    Ok(args)
}

fn parse_dim(raw: Option<&String>) -> Result<i32, CliError> {
    let Some(raw) = raw else {
        return Err(CliError::Usage(usage()));
    };
    let value = raw.parse::<i32>().map_err(|_| CliError::Usage(usage()))?;
    if value <= 0 {
        return Err(CliError::Usage(usage()));
    }
    Ok(value)
}

fn read_input(input: Option<&str>) -> Result<String, CliError> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        Some(path) => Ok(std::fs::read_to_string(path)?),
    }
}

fn write_json(value: &impl Serialize, pretty: bool) -> Result<(), CliError> {
    if pretty {
        serde_json::to_writer_pretty(std::io::stdout().lock(), value)?;
    } else {
        serde_json::to_writer(std::io::stdout().lock(), value)?;
    }
    println!();
    Ok(())
}

fn write_text(text: &str, out: Option<&str>) -> Result<(), CliError> {
    match out {
        None => {
            print!("{text}");
            Ok(())
        }
        Some(path) => {
            std::fs::write(path, text)?;
            Ok(())
        }
    }
}

/// Ingests every input page, folding unreadable files into per-page statuses so
/// one bad page never takes the batch down.
fn ingest_inputs(session: &mut Session, inputs: &[String]) -> Result<Vec<PageStatus>, CliError> {
    let inputs: Vec<&str> = if inputs.is_empty() {
        vec!["-"]
    } else {
        inputs.iter().map(String::as_str).collect()
    };

    let mut statuses = Vec::with_capacity(inputs.len());
    for path in inputs {
        let text = match read_input(Some(path)) {
            Ok(text) => text,
            Err(CliError::Io(err)) => {
                statuses.push(PageStatus {
                    page: path.to_string(),
                    report: None,
                    error: Some(format!("I/O error: {err}")),
                });
                continue;
            }
            Err(err) => return Err(err),
        };
        match block_on(session.ingest_page(&text)) {
            Ok(report) => statuses.push(PageStatus {
                page: path.to_string(),
                report: Some(report),
                error: None,
            }),
            Err(err) => statuses.push(PageStatus {
                page: path.to_string(),
                report: None,
                error: Some(err.to_string()),
            }),
        }
    }
    Ok(statuses)
}

fn run(args: Args) -> Result<(), CliError> {
    match args.command {
        Command::Extract => {
            let text = read_input(args.inputs.first().map(String::as_str))?;
            let payload = extract(&text)?;
            write_json(&payload, args.pretty)
        }
        Command::Report => {
            let mut session = Session::new();
            let pages = ingest_inputs(&mut session, &args.inputs)?;
            let warnings = session.finish();
            write_json(&ReportOut { pages, warnings }, args.pretty)
        }
        Command::Export => {
            let mut session = Session::new();
            let pages = ingest_inputs(&mut session, &args.inputs)?;
            for status in &pages {
                if let Some(error) = &status.error {
                    eprintln!("{}: {error}", status.page);
                }
            }
            for warning in session.finish() {
                eprintln!("warning: {warning:?}");
            }

            let mut graph = session.into_graph();
            if graph.is_empty() {
                return Err(CliError::NothingExported);
            }

            let export_options = ExportOptions {
                model_name: args.model_name.clone(),
            };
            let document = export_views(&mut graph, &args.views, &args.layout, &export_options)?;
            write_text(&document, args.out.as_deref())
        }
    }
}

fn main() {
    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    match run(args) {
        Ok(()) => {}
        Err(CliError::NothingExported) => {
            eprintln!("{}", CliError::NothingExported);
            std::process::exit(3);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
