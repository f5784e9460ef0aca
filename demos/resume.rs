use log_tail::{Config, SeekInfo, Tailer};
use std::path::Path;
use std::time::Duration;

/// Reads whatever is new since the last run, then records where it stopped.
///
/// The saved position includes the file identifier, so if the log was rotated
/// between runs the stale offset is ignored and the new file is read from the
/// start.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let log = args.next().unwrap_or_else(|| "app.log".to_string());
    let state = args.next().unwrap_or_else(|| "app.log.position".to_string());

    let location = load_position(Path::new(&state))?.unwrap_or_else(SeekInfo::start);
    println!("Resuming {} at {:?}", log, location);

    let config = Config {
        location: Some(location),
        ..Config::follow_name()
    };
    let mut tailer = Tailer::start(&log, config).await?;

    let mut last = None;
    // Stop once the file has been quiet for a second
    while let Ok(Some(line)) = tokio::time::timeout(Duration::from_secs(1), tailer.next_line()).await {
        if let Some(e) = &line.err {
            eprintln!("Error: {}", e);
            continue;
        }
        println!("{}", line.text);
        last = Some(line.seek_info());
    }
    tailer.stop().await?;

    if let Some(position) = last {
        std::fs::write(&state, serde_json::to_string(&position)?)?;
        println!("Saved position {} to {}", position.offset, state);
    }

    Ok(())
}

fn load_position(path: &Path) -> Result<Option<SeekInfo>, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&content)?))
}
