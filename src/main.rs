use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use docformula::config::{FormulaConfig, RecognizerConfig};
use docformula::core::init_tracing;
use docformula::pipeline::{build_document, export_document, load_document, scan_document, PipelineConfig};

#[derive(Parser, Debug)]
#[command(name = "docformula")]
#[command(version, about = "Replace raw formula text in PDF layouts with recognized markup", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Recognize formula regions and write the rebuilt layout
    Fix {
        /// Layout JSON (pages, blocks and formula regions)
        layout: PathBuf,

        /// Source PDF the layout was extracted from
        #[arg(long)]
        pdf: PathBuf,

        /// Output JSON path (default: ./<layout_name>_fixed.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Rendering DPI for formula regions
        #[arg(long)]
        dpi: Option<u32>,

        /// Settings JSON (thresholds, markers, patterns, `recognizer` section)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Recognition bridge script
        #[arg(long)]
        script: Option<PathBuf>,

        /// Process pages in parallel
        #[arg(long)]
        parallel: bool,

        /// Suppress progress output
        #[arg(short, long)]
        quiet: bool,
    },

    /// List the formula groups found in a layout without recognizing them
    Scan {
        /// Layout JSON (pages, blocks and formula regions)
        layout: PathBuf,

        /// Formula settings JSON
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Fix {
            layout,
            pdf,
            output,
            dpi,
            config,
            script,
            parallel,
            quiet,
        } => fix(layout, pdf, output, dpi, config, script, parallel, quiet),
        Commands::Scan { layout, config } => scan(layout, config),
    }
}

fn load_formula_config(path: Option<&PathBuf>) -> Result<FormulaConfig> {
    match path {
        Some(path) => FormulaConfig::from_path(path)
            .with_context(|| format!("Failed to load config: {}", path.display())),
        None => Ok(FormulaConfig::default()),
    }
}

fn load_recognizer_config(path: Option<&PathBuf>) -> Result<RecognizerConfig> {
    match path {
        Some(path) => RecognizerConfig::from_path(path)
            .with_context(|| format!("Failed to load recognizer settings: {}", path.display())),
        None => Ok(RecognizerConfig::default()),
    }
}

#[allow(clippy::too_many_arguments)]
fn fix(
    layout: PathBuf,
    pdf: PathBuf,
    output: Option<PathBuf>,
    dpi: Option<u32>,
    config: Option<PathBuf>,
    script: Option<PathBuf>,
    parallel: bool,
    quiet: bool,
) -> Result<()> {
    if !layout.is_file() {
        anyhow::bail!("Layout file does not exist: {}", layout.display());
    }
    if !pdf.is_file() {
        anyhow::bail!("PDF file does not exist: {}", pdf.display());
    }

    let output = output.unwrap_or_else(|| {
        let stem = layout
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "layout".to_string());
        PathBuf::from(format!("{stem}_fixed.json"))
    });

    let mut formula = load_formula_config(config.as_ref())?;
    if let Some(dpi) = dpi {
        formula = formula.with_dpi(dpi);
    }
    let mut recognizer = load_recognizer_config(config.as_ref())?;
    if let Some(script) = script {
        recognizer.script_path = script;
    }

    if !quiet {
        println!("[*] Layout: {}", layout.display());
        println!("[*] PDF: {}", pdf.display());
        println!("[*] DPI: {}", formula.dpi);
    }

    let mut pipeline = PipelineConfig::new(layout.clone(), pdf, output.clone());
    pipeline.formula = formula;
    pipeline.recognizer = recognizer;
    pipeline.parallel = parallel;

    let (document, stats) = build_document(&pipeline)
        .with_context(|| format!("Failed to process layout: {}", layout.display()))?;

    export_document(&document, &output)
        .with_context(|| format!("Failed to write: {}", output.display()))?;

    if !quiet {
        println!(
            "[+] Formula groups: {} ({} replaced, {} rejected, {} skipped, {} failed)",
            stats.groups, stats.accepted, stats.rejected, stats.skipped, stats.failed
        );
        println!("[✓] Done! Result saved to: {}", output.display());
    }

    Ok(())
}

fn scan(layout: PathBuf, config: Option<PathBuf>) -> Result<()> {
    let document = load_document(&layout)?;
    let config = load_formula_config(config.as_ref())?;

    for (pnum, groups) in scan_document(&document, &config)? {
        println!("Page {}: {} formula group(s)", pnum + 1, groups.len());
        for group in groups {
            println!(
                "  blocks {}..{}  [{:.0}, {:.0}, {:.0}, {:.0}]  {} chars",
                group.range.start,
                group.range.end,
                group.bbox.x0,
                group.bbox.y0,
                group.bbox.x1,
                group.bbox.y1,
                group.char_len()
            );
        }
    }

    Ok(())
}
