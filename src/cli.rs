use crate::config::{Config, load_config};
use crate::layout_dump::{LayoutDump, write_layout_dump};
use crate::pipeline::{Outcome, run_pipeline};
use anyhow::Result;
use clap::Parser;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

#[derive(Parser, Debug)]
#[command(
    name = "lanegraph",
    version,
    about = "Lane and section layout for Mermaid flowcharts"
)]
pub struct Args {
    /// Input file (.mmd or .md) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output JSON file. Defaults to stdout for a single diagram.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Config JSON file (flowchart spacing, grid, normalize policy)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long = "pretty")]
    pub pretty: bool,

    /// Debug-level logs on stderr
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);
    let config = load_config(args.config.as_deref())?;

    let (input, is_markdown) = read_input(args.input.as_deref())?;
    let diagrams = if is_markdown {
        extract_mermaid_blocks(&input)
    } else {
        vec![input]
    };

    if diagrams.is_empty() {
        return Err(anyhow::anyhow!("No Mermaid diagrams found in input"));
    }

    if diagrams.len() == 1 {
        let outcome = layout_diagram(&diagrams[0], &config)?;
        match args.output.as_deref() {
            Some(path) => write_layout_dump(path, &outcome, args.pretty)?,
            None => {
                let json = LayoutDump::from_outcome(&outcome).to_json(args.pretty)?;
                let mut stdout = io::stdout().lock();
                writeln!(stdout, "{json}")?;
            }
        }
        return Ok(());
    }

    // Multiple diagrams (Markdown input)
    let outputs = resolve_multi_outputs(args.output.as_deref(), diagrams.len())?;
    for (diagram, output) in diagrams.iter().zip(&outputs) {
        let outcome = layout_diagram(diagram, &config)?;
        write_layout_dump(output, &outcome, args.pretty)?;
        tracing::info!(output = %output.display(), "wrote layout");
    }

    Ok(())
}

fn layout_diagram(diagram: &str, config: &Config) -> Result<Outcome> {
    let cancel = AtomicBool::new(false);
    let outcome = run_pipeline(diagram, config, &cancel)?;
    if let Outcome::Positioned(positioned) = &outcome {
        tracing::debug!(
            lanes = positioned.lane_count(),
            sections = positioned.section_count(),
            nodes = positioned.nodes.len(),
            dropped = positioned.diagnostics.drops.total(),
            "diagram laid out"
        );
    }
    Ok(outcome)
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn read_input(path: Option<&Path>) -> Result<(String, bool)> {
    if let Some(path) = path {
        if path == Path::new("-") {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            return Ok((buf, false));
        }
        let content = std::fs::read_to_string(path)?;
        let is_md = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| matches!(ext, "md" | "markdown"))
            .unwrap_or(false);
        return Ok((content, is_md));
    }

    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok((buf, false))
}

fn extract_mermaid_blocks(input: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();
    let mut fence: Option<&str> = None;

    for line in input.lines() {
        let trimmed = line.trim();
        match fence {
            None => fence = detect_mermaid_fence(trimmed),
            Some(open) if is_fence_end(trimmed, open) => {
                fence = None;
                blocks.push(current.join("\n"));
                current.clear();
            }
            Some(_) => current.push(line),
        }
    }

    blocks
}

fn detect_mermaid_fence(line: &str) -> Option<&'static str> {
    ["```", "~~~", ":::"].into_iter().find(|fence| {
        line.strip_prefix(*fence).is_some_and(|rest| {
            let marker = fence.chars().next().unwrap_or('`');
            rest.trim_start_matches(marker).trim().starts_with("mermaid")
        })
    })
}

fn is_fence_end(line: &str, fence: &str) -> bool {
    line.strip_prefix(fence)
        .is_some_and(|rest| rest.trim().is_empty())
}

fn resolve_multi_outputs(output: Option<&Path>, count: usize) -> Result<Vec<PathBuf>> {
    let base = output.ok_or_else(|| anyhow::anyhow!("Output path required for markdown input"))?;
    if base.is_dir() {
        return Ok((1..=count)
            .map(|idx| base.join(format!("diagram-{idx}.json")))
            .collect());
    }
    let stem = base.file_stem().and_then(|s| s.to_str()).unwrap_or("diagram");
    let parent = base.parent().unwrap_or_else(|| Path::new("."));
    Ok((1..=count)
        .map(|idx| parent.join(format!("{stem}-{idx}.json")))
        .collect())
}
