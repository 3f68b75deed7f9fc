use anyhow::Context;
use clap::{Parser, Subcommand};
use mathscan_core::MathProcessor;
use mathscan_core::config::Config;
use mathscan_core::document::Tree;
use mathscan_core::pipeline::BatchReport;
use mathscan_core::render::MathMlRenderer;
use mathscan_syntax::{ScanOptions, Segment, scan_with};
use notify::{EventKind, RecursiveMode, Watcher};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

const SCANNED_EXTENSIONS: [&str; 3] = ["md", "txt", "tex"];
const DEBOUNCE: Duration = Duration::from_millis(200);

#[derive(Parser)]
#[command(name = "mathscan")]
#[command(about = "Find and render math in text files", long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/mathscan/config.json)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Never treat bare [...] or (...) as math
    #[arg(long, global = true)]
    no_brackets: bool,

    /// Render expressions exactly as written
    #[arg(long, global = true)]
    no_normalize: bool,

    /// Log every scanned segment
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a file, or every .md/.txt/.tex file under a directory, into segments and emit JSON
    Scan {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Render the math in a file and emit HTML
    Render {
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Write the HTML here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Render a file, then render it again on every change
    Watch {
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Write the HTML here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
struct ScannedFile {
    file: PathBuf,
    segments: Vec<Segment>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = load_config(&cli);
    log::debug!("Using {:?}", config);

    match &cli.command {
        Commands::Scan { path } => {
            let files = scan_path(path, &config.scan_options())?;
            println!("{}", serde_json::to_string_pretty(&files)?);
        }
        Commands::Render { path, output } => {
            let (html, report) = render_file(path, &config)?;
            log::info!("Rendered {} expressions ({} fallbacks)", report.math, report.fallbacks);
            write_output(&html, output.as_deref())?;
        }
        Commands::Watch { path, output } => watch(path, output.as_deref(), &config)?,
    }
    Ok(())
}

/// Loads the config file and applies command-line overrides.
fn load_config(cli: &Cli) -> Config {
    let mut config = Config::load_or_default(cli.config.as_deref());
    if cli.no_brackets {
        config.heuristic_brackets = false;
    }
    if cli.no_normalize {
        config.normalize = false;
    }
    if cli.debug {
        config.debug = true;
    }
    config
}

fn is_scanned_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SCANNED_EXTENSIONS.contains(&ext))
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

fn scan_path(path: &Path, options: &ScanOptions) -> anyhow::Result<Vec<ScannedFile>> {
    if !path.is_dir() {
        return Ok(vec![scan_file(path, options)?]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = entry.with_context(|| format!("walking {}", path.display()))?;
        if entry.file_type().is_file() && is_scanned_file(entry.path()) {
            files.push(scan_file(entry.path(), options)?);
        }
    }
    Ok(files)
}

fn scan_file(path: &Path, options: &ScanOptions) -> anyhow::Result<ScannedFile> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(ScannedFile {
        file: path.to_path_buf(),
        segments: scan_with(&content, options),
    })
}

fn render_file(path: &Path, config: &Config) -> anyhow::Result<(String, BatchReport)> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(render_text(&content, config))
}

fn render_text(content: &str, config: &Config) -> (String, BatchReport) {
    let mut processor = MathProcessor::new(Tree::from_text(content), MathMlRenderer, config);
    let report = processor.reprocess();
    (processor.document().to_html(), report)
}

fn write_output(html: &str, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => fs::write(path, html).with_context(|| format!("writing {}", path.display())),
        None => {
            print!("{}", html);
            Ok(())
        }
    }
}

fn watch(path: &Path, output: Option<&Path>, config: &Config) -> anyhow::Result<()> {
    let target = path
        .canonicalize()
        .with_context(|| format!("resolving {}", path.display()))?;
    let dir = target
        .parent()
        .context("watched file has no parent directory")?
        .to_path_buf();

    let (tx, rx) = crossbeam_channel::unbounded();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let _ = tx.send(res);
    })?;
    // Editors often replace the file, so watch its directory.
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    eprintln!("Watching {}", target.display());

    rerender(&target, output, config);
    loop {
        let event = match rx.recv() {
            Ok(Ok(event)) => event,
            Ok(Err(e)) => {
                log::error!("watch error: {:?}", e);
                continue;
            }
            Err(_) => break,
        };
        if !touches(&event, &target) {
            continue;
        }
        // Let a burst of writes settle before rendering.
        while rx.recv_timeout(DEBOUNCE).is_ok() {}
        rerender(&target, output, config);
    }
    Ok(())
}

fn touches(event: &notify::Event, target: &Path) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event.paths.iter().any(|p| p == target)
}

fn rerender(path: &Path, output: Option<&Path>, config: &Config) {
    let result = render_file(path, config).and_then(|(html, report)| {
        write_output(&html, output)?;
        Ok(report)
    });
    match result {
        Ok(report) => eprintln!(
            "Rendered {}: {} expressions, {} shown as written",
            path.display(),
            report.math,
            report.fallbacks
        ),
        Err(e) => log::error!("{:#}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_override_config() {
        let cli = Cli::parse_from([
            "mathscan",
            "render",
            "notes.md",
            "--no-brackets",
            "--no-normalize",
            "--config",
            "/nonexistent/mathscan.json",
        ]);
        let config = load_config(&cli);
        assert!(!config.heuristic_brackets);
        assert!(!config.normalize);
        assert!(!config.debug);
        assert!(matches!(
            cli.command,
            Commands::Render { ref path, output: None } if path == Path::new("notes.md")
        ));
    }

    #[test]
    fn test_scan_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "Let $x$ be").unwrap();
        fs::write(dir.path().join("b.txt"), "nothing").unwrap();
        fs::write(dir.path().join("c.rs"), "$ignored$").unwrap();
        fs::create_dir(dir.path().join(".hidden")).unwrap();
        fs::write(dir.path().join(".hidden").join("d.md"), "$y$").unwrap();

        let files = scan_path(dir.path(), &ScanOptions::default()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.file.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.md", "b.txt"]);
        assert_eq!(files[0].segments.len(), 3);

        let json = serde_json::to_value(&files[0]).unwrap();
        assert_eq!(json["segments"][1]["type"], "math");
        assert_eq!(json["segments"][1]["data"]["kind"], "inline_dollars");
    }

    #[test]
    fn test_scan_missing_file() {
        let err =
            scan_path(Path::new("/nonexistent/notes.md"), &ScanOptions::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("reading /nonexistent/notes.md"));
    }

    #[test]
    fn test_render_text() {
        let (html, report) = render_text("Area $\\pi r^2$\n\n`$code$`", &Config::default());
        assert_eq!(report.math, 1);
        assert!(html.starts_with("<p>Area <span class=\"math-container math-processed\">"));
        assert!(html.contains("<code>$code$</code>"));
    }

    #[test]
    fn test_render_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.md");
        let output = dir.path().join("out.html");
        fs::write(&input, "$$x$$").unwrap();

        let (html, _) = render_file(&input, &Config::default()).unwrap();
        write_output(&html, Some(&output)).unwrap();
        assert!(fs::read_to_string(&output).unwrap().contains(r#"data-display="block""#));
    }
}
