mod client;
mod db;
mod parser;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

#[derive(Parser)]
#[command(name = "fb_crawler", about = "Facebook page feed crawler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl a page's feed, newest first, storing posts to the DB
    Crawl {
        /// Page URL, e.g. https://www.facebook.com/mohw.gov.tw
        url: String,
        /// Max pages to fetch
        #[arg(short = 'n', long, default_value = "5")]
        pages: usize,
        /// Stop once the newest post on a page is older than this
        /// (YYYY-MM-DD)
        #[arg(long)]
        until: Option<String>,
    },
    /// Parse a saved response body from a file (offline, no network)
    Parse {
        /// Path to a raw response body
        file: PathBuf,
    },
    /// Show crawl statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Crawl { url, pages, until } => crawl(&url, pages, until.as_deref()).await,
        Commands::Parse { file } => {
            let body = std::fs::read_to_string(&file)?;
            let parsed = parser::parse_response(&body)?;
            for row in &parsed.rows {
                println!(
                    "{} | {} | {} | {}",
                    row.time,
                    row.post_id,
                    row.name,
                    preview(&row.message, 60)
                );
            }
            for skip in &parsed.skipped {
                println!("skipped #{}: {}", skip.index, skip.reason);
            }
            println!(
                "\n{} rows, {} skipped, cursor: {}",
                parsed.rows.len(),
                parsed.skipped.len(),
                parsed.cursor.as_deref().unwrap_or("-")
            );
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Posts:    {}", s.posts);
            println!("Pages:    {}", s.pages);
            println!("Earliest: {}", s.earliest.as_deref().unwrap_or("-"));
            println!("Latest:   {}", s.latest.as_deref().unwrap_or("-"));
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Page loop: fetch → parse → persist → thread the cursor. Stops on the page
/// budget, an empty page, a missing cursor, or a `--until` date threshold.
async fn crawl(url: &str, pages: usize, until: Option<&str>) -> anyhow::Result<()> {
    let conn = db::connect()?;
    db::init_schema(&conn)?;
    let session = client::Session::bootstrap(url).await?;

    let pb = ProgressBar::new(pages as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} pages")?
            .progress_chars("=> "),
    );

    let mut cursor: Option<String> = None;
    let mut total_saved = 0usize;
    for page_no in 0..pages {
        let body = session.fetch_feed(cursor.as_deref()).await?;
        let parsed = parser::parse_response(&body)?;

        for skip in &parsed.skipped {
            warn!(page = page_no, index = skip.index, reason = %skip.reason, "record skipped");
        }
        total_saved += db::save_posts(&conn, &parsed.rows)?;
        pb.inc(1);

        if let Some(max) = &parsed.max_time {
            println!("The maximum date of these posts is: {max}, keep crawling...");
        }

        if parsed.rows.is_empty() {
            debug!(page = page_no, "empty page, stopping");
            break;
        }
        if let (Some(until), Some(max)) = (until, parsed.max_time.as_deref()) {
            // Pages run backwards in time: once the newest post on a page is
            // older than the threshold, every later page is older too.
            if max < until {
                debug!(page = page_no, max, until, "date threshold reached");
                break;
            }
        }
        match parsed.cursor {
            Some(c) => cursor = Some(c),
            None => break,
        }
    }

    pb.finish_and_clear();
    println!("Saved {total_saved} new posts.");
    Ok(())
}

fn preview(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
