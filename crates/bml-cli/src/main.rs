use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use bml_compiler::{CompileOptions, compile, parse_str, tokenize};

mod logging;

use logging::{LoggingConfig, init_logging};

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(name = "bmlc", about = "Compile .bml markup to JavaScript", version)]
struct Cli {
    /// Source file, or `-` for stdin
    input: PathBuf,

    /// Write output here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Name of the generated factory function
    #[arg(long, conflicts_with = "module_from_file")]
    module: Option<String>,

    /// Derive the factory name from the input file name
    #[arg(long)]
    module_from_file: bool,

    /// Print the object tree to stderr before generating code
    #[arg(long)]
    dump: bool,

    /// What to write
    #[arg(long, value_enum, default_value_t = Emit::Js)]
    emit: Emit,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log filter in env_logger syntax; overrides RUST_LOG and -v
    #[arg(long)]
    log: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// Generated JavaScript
    Js,
    /// Token stream as JSON
    Tokens,
    /// Object tree as JSON
    Tree,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(LoggingConfig {
        env_filter: cli.log.clone(),
        ..LoggingConfig::default().with_verbosity(cli.verbose)
    });

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let src = read_source(&cli.input)?;
    let label = cli.input.display().to_string();
    log::info!("compiling {label} ({} bytes)", src.len());

    let text = match cli.emit {
        Emit::Tokens => serde_json::to_string_pretty(&tokenize(&src))?,
        Emit::Tree => {
            let tree = parse_str(&src).map_err(|e| anyhow::anyhow!("{label}:{}", e.report()))?;
            serde_json::to_string_pretty(&tree)?
        }
        Emit::Js => {
            let module = if cli.module_from_file {
                Some(module_name(&cli.input))
            } else {
                cli.module.clone()
            };
            let options = CompileOptions { module, dump: cli.dump };
            let out = compile(&src, &options)
                .map_err(|e| anyhow::anyhow!("{label}:{}", e.report()))?;
            if let Some(dump) = &out.dump {
                eprint!("{dump}");
            }
            out.code
        }
    };

    write_output(cli.output.as_deref(), &text)
}

fn read_source(input: &Path) -> Result<String> {
    if input == Path::new("-") {
        let mut src = String::new();
        io::stdin()
            .read_to_string(&mut src)
            .context("failed to read stdin")?;
        Ok(src)
    } else {
        fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))
    }
}

fn write_output(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
            log::info!("wrote {}", path.display());
            Ok(())
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            if !text.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
            Ok(())
        }
    }
}

/// Factory name for `path`: the file stem with a leading capital and every
/// character that cannot appear in an identifier replaced by `_`.
fn module_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut name: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '$' { c } else { '_' })
        .collect();
    if let Some(first) = name.get(..1) {
        let upper = first.to_ascii_uppercase();
        name.replace_range(..1, &upper);
    }
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}
