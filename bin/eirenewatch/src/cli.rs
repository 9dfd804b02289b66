use clap::Parser;
use eirene_tracing::LogFormat;

#[derive(Parser, Debug)]
#[command(name = "eirenewatch", version, about = "Watch a config file and supervise the tasks it describes")]
pub struct Cli {
    /// One or more task-file paths. Entries containing `*` are glob-expanded.
    #[arg(default_value = "eirenewatch.toml")]
    pub task_files: Vec<String>,

    /// Enable verbose (debug) logging. Equivalent to `RUST_LOG=debug`.
    #[arg(short, long)]
    pub verbose: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Full)]
    pub log_format: LogFormat,
}
