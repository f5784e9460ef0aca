use clap::Parser;
use log_tail::{Config, FileIdentifier, SeekInfo, Tailer};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Print lines appended to a file, following it across rotations.
#[derive(Debug, Parser)]
#[command(name = "log-tail", version)]
struct Args {
    /// File to follow
    path: PathBuf,

    /// Keep reading as the file grows
    #[arg(short, long)]
    follow: bool,

    /// Follow by name: also reopen the file after rotation or deletion
    #[arg(short = 'F', long)]
    follow_name: bool,

    /// Poll for changes instead of using filesystem notifications
    #[arg(long)]
    poll: bool,

    /// Poll interval in milliseconds
    #[arg(long, default_value_t = 250)]
    poll_interval_ms: u64,

    /// Print existing content instead of starting at the end
    #[arg(long)]
    from_start: bool,

    /// Resume at this byte offset
    #[arg(long, conflicts_with = "from_start")]
    offset: Option<u64>,

    /// File identifier the offset was recorded for
    #[arg(long, requires = "offset")]
    identifier: Option<String>,

    /// Prefix each line with its resumable offset and file identifier
    #[arg(long)]
    show_offsets: bool,
}

impl Args {
    fn config(&self) -> Config {
        let location = match (self.offset, self.from_start) {
            (Some(offset), _) => Some(SeekInfo::resume(
                offset,
                self.identifier.clone().map(FileIdentifier::from),
            )),
            (None, true) => Some(SeekInfo::start()),
            (None, false) => None,
        };

        Config {
            follow: self.follow || self.follow_name,
            reopen: self.follow_name,
            poll: self.poll,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            location,
            ..Config::default()
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut tailer = match Tailer::start(&args.path, args.config()).await {
        Ok(tailer) => tailer,
        Err(e) => {
            eprintln!("Error following {}: {}", args.path.display(), e);
            process::exit(1);
        }
    };

    loop {
        tokio::select! {
            line = tailer.next_line() => match line {
                Some(line) => match &line.err {
                    None if args.show_offsets => {
                        let id = line.file_identifier.as_ref().map(|id| id.as_str()).unwrap_or("-");
                        println!("{}\t{}\t{}", line.offset, id, line.text);
                    }
                    None => println!("{}", line.text),
                    Some(e) => eprintln!("Error reading {}: {}", args.path.display(), e),
                },
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tailer.cleanup();
                break;
            }
        }
    }

    if let Err(e) = tailer.stop().await {
        eprintln!("Error stopping tailer: {}", e);
        process::exit(1);
    }
}
