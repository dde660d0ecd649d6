//! rxstream CLI
//!
//! Command-line front end for the stream layer: count and read lines, follow
//! the end of a file, append lines and run scripts of stream operations.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};

use rxstream_core::StreamConfig;
use rxstream_native::{Session, StreamInfo};
use rxstream_parsers::logging::{self, TracingConfig};

/// rxstream - character and line stream tool
#[derive(Parser)]
#[command(name = "rxstream")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format for structured data
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Stream configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {s}")),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Count the lines left in a stream
    Lines(LinesArgs),

    /// Print lines of a stream
    Read(ReadArgs),

    /// Print the last lines of a stream
    Tail(TailArgs),

    /// Append lines to a stream (from arguments or standard input)
    Append(AppendArgs),

    /// Show state, size and cursors of a stream
    Info(InfoArgs),

    /// Run a script of stream operations
    Exec(ExecArgs),
}

#[derive(Args)]
struct LinesArgs {
    /// Stream name
    stream: String,

    /// Only report whether any data is left (0 or 1)
    #[arg(short, long)]
    quick: bool,
}

#[derive(Args)]
struct ReadArgs {
    /// Stream name
    stream: String,

    /// First line to print
    #[arg(short, long, default_value = "1")]
    line: u64,

    /// Maximum number of lines to print
    #[arg(short = 'n', long)]
    max: Option<u64>,
}

#[derive(Args)]
struct TailArgs {
    /// Stream name
    stream: String,

    /// Number of lines
    #[arg(short = 'n', long, default_value = "10")]
    lines: u64,
}

#[derive(Args)]
struct AppendArgs {
    /// Stream name
    stream: String,

    /// Lines to append; standard input is read when none are given
    text: Vec<String>,
}

#[derive(Args)]
struct InfoArgs {
    /// Stream name
    stream: String,
}

#[derive(Args)]
struct ExecArgs {
    /// Script file, one operation per line:
    /// `stream NAME COMMAND...`, `linein NAME [LINE]`, `lineout NAME [TEXT...]`,
    /// `charin NAME [POS] [LEN]`, `charout NAME TEXT...`, `lines NAME [quick]`,
    /// `chars NAME`, `state NAME`, `describe NAME`
    script: PathBuf,
}

fn load_config(path: Option<&PathBuf>) -> Result<StreamConfig> {
    let Some(path) = path else {
        return Ok(StreamConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: StreamConfig = serde_json::from_str(&text)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    debug!(?config, "loaded configuration");
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_with_config(TracingConfig::from_verbosity(cli.verbose));

    let config = load_config(cli.config.as_ref())?;
    let mut session = Session::new(config);

    let result = match cli.command {
        Commands::Lines(args) => cmd_lines(&mut session, args, cli.format),
        Commands::Read(args) => cmd_read(&mut session, args),
        Commands::Tail(args) => cmd_tail(&mut session, args),
        Commands::Append(args) => cmd_append(&mut session, args),
        Commands::Info(args) => cmd_info(&mut session, args, cli.format),
        Commands::Exec(args) => cmd_exec(&mut session, args, cli.format),
    };
    session.close_all();
    result
}

/// Open for reading, turning a failed open into an error
fn open_for_read(session: &mut Session, name: &str) -> Result<()> {
    let status = session
        .command(name, "OPEN READ")
        .with_context(|| format!("Failed to open {name}"))?;
    if status != "READY:" {
        bail!("Cannot open {name}: {status}");
    }
    Ok(())
}

/// Print lines until end of stream or `max` lines
fn print_lines(session: &mut Session, name: &str, max: Option<u64>) -> Result<u64> {
    let mut printed = 0;
    while max.map_or(true, |max| printed < max) {
        let line = session.linein(name, None, None)?;
        if session.state(name) != "READY" {
            break;
        }
        println!("{}", String::from_utf8_lossy(&line));
        printed += 1;
    }
    Ok(printed)
}

fn cmd_lines(session: &mut Session, args: LinesArgs, format: OutputFormat) -> Result<()> {
    open_for_read(session, &args.stream)?;
    let count = session.lines(&args.stream, args.quick)?;

    match format {
        OutputFormat::Json => {
            let report = serde_json::json!({ "stream": args.stream, "lines": count, "quick": args.quick });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => println!("{count}"),
    }
    Ok(())
}

fn cmd_read(session: &mut Session, args: ReadArgs) -> Result<()> {
    open_for_read(session, &args.stream)?;
    if args.line > 1 {
        session
            .linein(&args.stream, Some(args.line), Some(0))
            .with_context(|| format!("Invalid line {}", args.line))?;
        if session.state(&args.stream) != "READY" {
            bail!("{} has fewer than {} lines", args.stream, args.line);
        }
    }
    let printed = print_lines(session, &args.stream, args.max)?;
    info!(stream = %args.stream, printed, "read complete");
    Ok(())
}

fn cmd_tail(session: &mut Session, args: TailArgs) -> Result<()> {
    open_for_read(session, &args.stream)?;
    if args.lines == 0 {
        return Ok(());
    }
    // Asking for more lines than exist leaves the cursor at line 1
    let position = session
        .command(&args.stream, &format!("SEEK <{} READ LINE", args.lines))
        .with_context(|| format!("Failed to position {}", args.stream))?;
    debug!(stream = %args.stream, %position, "tail start");
    print_lines(session, &args.stream, None)?;
    Ok(())
}

fn cmd_append(session: &mut Session, args: AppendArgs) -> Result<()> {
    let status = session
        .command(&args.stream, "OPEN WRITE APPEND")
        .with_context(|| format!("Failed to open {}", args.stream))?;
    if status != "READY:" {
        bail!("Cannot open {} for append: {status}", args.stream);
    }

    let mut written = 0;
    let mut write = |session: &mut Session, line: &[u8]| -> Result<()> {
        if session.lineout(&args.stream, Some(line), None)? != 0 {
            bail!("Write to {} failed: {}", args.stream, session.description(&args.stream));
        }
        written += 1;
        Ok(())
    };

    if args.text.is_empty() {
        loop {
            let line = session.linein("STDIN", None, None)?;
            if session.state("STDIN") != "READY" {
                break;
            }
            write(session, &line)?;
        }
    } else {
        for text in &args.text {
            write(session, text.as_bytes())?;
        }
    }

    info!(stream = %args.stream, written, "append complete");
    Ok(())
}

#[derive(Serialize)]
struct InfoReport {
    path: String,
    bytes: String,
    modified: String,
    lines: u64,
    chars: u64,
    #[serde(flatten)]
    stream: StreamInfo,
}

fn cmd_info(session: &mut Session, args: InfoArgs, format: OutputFormat) -> Result<()> {
    let name = args.stream.as_str();
    let path = session.command(name, "QUERY EXISTS")?;
    if path.is_empty() {
        bail!("{name} does not exist");
    }
    open_for_read(session, name)?;

    let report = InfoReport {
        path,
        bytes: session.command(name, "QUERY SIZE")?,
        modified: session.command(name, "QUERY TIMESTAMP")?,
        lines: session.lines(name, false)?,
        chars: session.chars(name)?,
        stream: session.stream(name).info(),
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            println!("Stream:      {}", report.stream.name);
            println!("Path:        {}", report.path);
            println!("Type:        {}", report.stream.stream_type);
            println!("Size:        {} bytes", report.bytes);
            println!("Modified:    {}", report.modified);
            println!("Lines:       {}", report.lines);
            println!("Chars:       {}", report.chars);
            println!("State:       {}", report.stream.description);
        }
    }
    Ok(())
}

/// One executed script operation
#[derive(Serialize)]
struct StepResult<'a> {
    line: usize,
    op: &'a str,
    stream: &'a str,
    result: String,
}

fn parse_arg<T: std::str::FromStr>(value: Option<&str>, what: &str, line: usize) -> Result<Option<T>> {
    value
        .map(|text| {
            text.parse::<T>()
                .map_err(|_| anyhow::anyhow!("line {line}: invalid {what} '{text}'"))
        })
        .transpose()
}

fn cmd_exec(session: &mut Session, args: ExecArgs, format: OutputFormat) -> Result<()> {
    let script = fs::read_to_string(&args.script)
        .with_context(|| format!("Failed to read script {}", args.script.display()))?;

    logging::instrument("exec", || {
        for (index, raw) in script.lines().enumerate() {
            let number = index + 1;
            let text = raw.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }

            let (op, tail) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
            let tail = tail.trim_start();
            let (name, rest) = tail.split_once(char::is_whitespace).unwrap_or((tail, ""));
            let rest = rest.trim();
            if name.is_empty() {
                bail!("line {number}: missing stream name");
            }
            let mut fields = rest.split_whitespace();

            let result = match op.to_ascii_lowercase().as_str() {
                "stream" => session
                    .command(name, rest)
                    .with_context(|| format!("line {number}: {rest}"))?,
                "linein" => {
                    let line = parse_arg(fields.next(), "line", number)?;
                    String::from_utf8_lossy(&session.linein(name, line, None)?).into_owned()
                }
                "lineout" => {
                    let data = (!rest.is_empty()).then_some(rest.as_bytes());
                    session.lineout(name, data, None)?.to_string()
                }
                "charin" => {
                    let position = parse_arg(fields.next(), "position", number)?;
                    let length = parse_arg(fields.next(), "length", number)?;
                    String::from_utf8_lossy(&session.charin(name, position, length)?).into_owned()
                }
                "charout" => session.charout(name, Some(rest.as_bytes()), None)?.to_string(),
                "lines" => session
                    .lines(name, rest.eq_ignore_ascii_case("quick"))?
                    .to_string(),
                "chars" => session.chars(name)?.to_string(),
                "state" => session.state(name),
                "describe" => session.description(name),
                other => bail!("line {number}: unknown operation '{other}'"),
            };

            match format {
                OutputFormat::Json => {
                    let step = StepResult { line: number, op, stream: name, result };
                    println!("{}", serde_json::to_string(&step)?);
                }
                OutputFormat::Text => println!("{result}"),
            }
        }
        Ok(())
    })
}
