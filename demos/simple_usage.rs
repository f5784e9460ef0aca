use log_tail::{Config, tail_file};
use tokio_stream::StreamExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "app.log".to_string());

    // Follow the file by name, surviving rotation, starting at its current end
    let mut lines = tail_file(&path, Config::follow_name()).await?;

    println!("Following {} - waiting for new lines...", path);

    let mut count = 0;
    while let Some(line) = lines.next().await {
        match line.err {
            None => println!("[{:>8}] {}", line.offset, line.text),
            Some(e) => eprintln!("Error: {}", e),
        }

        count += 1;
        if count >= 10 {
            // Only show the first few lines for demo
            break;
        }
    }

    lines.stop().await?;
    Ok(())
}
