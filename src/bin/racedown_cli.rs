use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

use racedown_rs::{
    Completion, FileSource, InputFormat, ReadErrorPolicy, SessionController, SessionState,
    TranscodeConfig,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Fastq,
    Fasta,
}

/// Downsample a FASTQ/FASTA file, keeping a diverse subset of its records.
#[derive(Debug, Parser)]
#[command(name = "racedown-rs", version, about)]
struct Args {
    /// Input FASTQ or FASTA file
    input: PathBuf,

    /// Output file (gzip-compressed if it ends in .gz); defaults to the
    /// download file name in the current directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Distance threshold (tau), in [0, 100)
    #[arg(short, long, default_value_t = 10.0)]
    tau: f32,

    /// k-mer length, in [3, 30]
    #[arg(short, long, default_value_t = 14)]
    k: u8,

    /// Input format; guessed from the file extension if omitted
    #[arg(short, long, value_enum)]
    format: Option<FormatArg>,

    /// Engine buffer size in bytes
    #[arg(long, default_value_t = racedown_rs::engine::DEFAULT_CAPACITY_BYTES)]
    buffer_bytes: usize,

    /// Fail instead of writing partial output when the input can't be read
    #[arg(long)]
    strict: bool,
}

fn spinner(color: &str, msg: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template(&format!("{{spinner:.{color}}} {{msg}}"))
            .expect("Invalid spinner template"),
    );
    spinner.set_message(msg.to_string());
    spinner
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let mut config = TranscodeConfig::for_input(&args.input);
    if let Some(format) = args.format {
        config.format = match format {
            FormatArg::Fastq => InputFormat::Fastq,
            FormatArg::Fasta => InputFormat::Fasta,
        };
    }
    config.distance_threshold = args.tau;
    config.kmer_length = args.k;
    config.capacity_bytes = args.buffer_bytes;
    if args.strict {
        config.read_error_policy = ReadErrorPolicy::Fail;
    }

    match run(&args, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args, config: TranscodeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let source = FileSource::open(&args.input)?;
    let mut session = SessionController::new(config)?;

    // 1. Stream the file through the engine
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .expect("Invalid progress template")
            .progress_chars("=> "),
    );
    bar.set_message(format!("{}", args.input.display()));

    session.submit(Box::new(source))?;
    session.wait(|p| bar.set_position(p.round() as u64))?;

    let artifact = match session.state() {
        SessionState::Done { artifact } => artifact,
        _ => {
            bar.abandon_with_message("failed");
            let message = session
                .last_error()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "run ended without a result".to_string());
            return Err(message.into());
        }
    };

    match artifact.completion() {
        Completion::Complete => bar.finish_with_message("done"),
        Completion::Truncated { offset, reason } => {
            bar.abandon_with_message(format!("input unreadable at byte {offset}: {reason}"));
        }
    }
    let stats = artifact.stats();
    let kept = artifact.len();

    // 2. Write the downsampled output
    let spinner = spinner("yellow", "Writing output...");
    let written = match &args.output {
        Some(path) => session.download_to(path)?,
        None => session.download(".")?,
    };
    match written {
        Some(path) => spinner.finish_with_message(format!(
            "Wrote {} of {} bytes to {} ({} chunk(s)).",
            kept,
            stats.bytes_read,
            path.display(),
            stats.cycles
        )),
        None => spinner.finish_with_message("Nothing to write."),
    }
    Ok(())
}
