mod db;
mod dom;
mod export;
mod parser;
mod scraper;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use parser::Transcript;

#[derive(Parser)]
#[command(
    name = "transcript_scraper",
    about = "Marks portal scraper and transcript extractor"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the marks page for a PIN into the cache
    Fetch {
        pin: String,
        /// Refetch even if the cached page is still fresh
        #[arg(short, long)]
        force: bool,
    },
    /// Extract a transcript from the cached page
    Parse { pin: String },
    /// Fetch + parse in one pipeline
    Run {
        pin: String,
        #[arg(short, long)]
        force: bool,
    },
    /// Extract a transcript from a local HTML file
    File {
        path: PathBuf,
        /// Print full JSON instead of the summary table
        #[arg(long)]
        json: bool,
    },
    /// Print the cached transcript for a PIN
    Show { pin: String },
    /// Export the cached transcript as csv or json
    Export {
        pin: String,
        #[arg(short, long, default_value = "json")]
        format: String,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Re-run extraction over every cached page
    Reparse {
        /// Max pages to reparse (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Show cache statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let conn = db::connect()?;
    db::init_schema(&conn)?;

    let result = match cli.command {
        Commands::Fetch { pin, force } => {
            fetch_pin(&conn, &pin, force).await?;
            Ok(())
        }
        Commands::Parse { pin } => parse_pin(&conn, &pin),
        Commands::Run { pin, force } => {
            if fetch_pin(&conn, &pin, force).await?.is_some() {
                parse_pin(&conn, &pin)?;
            }
            Ok(())
        }
        Commands::File { path, json } => {
            let html = std::fs::read_to_string(&path)?;
            let transcript = parser::extract_html(&html);
            if transcript.is_not_found() {
                println!("No transcript found in {}.", path.display());
            } else if json {
                println!("{}", export::to_json(&transcript)?);
            } else {
                print_transcript(&transcript);
            }
            Ok(())
        }
        Commands::Show { pin } => {
            match db::load_transcript(&conn, &pin)? {
                Some(transcript) => print_transcript(&transcript),
                None => println!("No transcript for {}. Run 'run {}' first.", pin, pin),
            }
            Ok(())
        }
        Commands::Export { pin, format, out } => {
            let Some(transcript) = db::load_transcript(&conn, &pin)? else {
                println!("No transcript for {}. Run 'run {}' first.", pin, pin);
                return Ok(());
            };
            let rendered = match format.as_str() {
                "json" => export::to_json(&transcript)?,
                "csv" => export::to_csv(&transcript),
                other => bail!("unknown export format '{}', expected csv or json", other),
            };
            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)?;
                    println!("Wrote {}", path.display());
                }
                None => println!("{rendered}"),
            }
            Ok(())
        }
        Commands::Reparse { limit } => reparse(&conn, limit),
        Commands::Stats => {
            let s = db::get_stats(&conn)?;
            println!("PINs:        {}", s.pins);
            println!("Fetched:     {}", s.fetched);
            println!("Pages:       {}", s.pages);
            println!("Errors:      {}", s.errors);
            println!("Transcripts: {}", s.transcripts);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Fetch one PIN, honoring the cache window. Returns the page row id on
/// success, None when the fetch failed (the failure is still recorded).
async fn fetch_pin(conn: &Connection, pin: &str, force: bool) -> Result<Option<i64>> {
    let pin_id = db::upsert_pin(conn, pin)?;

    if !force {
        if let Some(page) = db::latest_page(conn, pin)? {
            if page.html.is_some() && db::is_fresh(&page.fetched_at) {
                println!(
                    "Cache hit for {} (fetched {} UTC); use --force to refetch.",
                    pin, page.fetched_at
                );
                return Ok(Some(page.id));
            }
        }
    }

    let row = scraper::fetch_transcript_page(pin_id, pin).await?;
    let error = row.error.clone();
    let size = row.html.as_ref().map_or(0, |h| h.len());
    let page_id = db::insert_page(conn, &row)?;

    match error {
        Some(e) => {
            println!("Fetch failed for {}: {}", pin, e);
            Ok(None)
        }
        None => {
            println!("Fetched {} ({} bytes).", pin, size);
            Ok(Some(page_id))
        }
    }
}

fn parse_pin(conn: &Connection, pin: &str) -> Result<()> {
    let Some(page) = db::latest_page(conn, pin)? else {
        println!("No cached page for {}. Run 'fetch' first.", pin);
        return Ok(());
    };
    let Some(html) = page.html else {
        println!(
            "Last fetch for {} failed: {}",
            pin,
            page.error.unwrap_or_default()
        );
        return Ok(());
    };

    let transcript = parser::extract_html(&html);
    if transcript.is_not_found() {
        println!("No result found for {}. Verify the PIN and try again.", pin);
        return Ok(());
    }

    db::save_transcript(conn, pin, page.id, &transcript)?;
    println!(
        "Saved {}: {} semesters, {} subjects.",
        pin,
        transcript.semesters.len(),
        transcript.subject_count()
    );
    Ok(())
}

fn reparse(conn: &Connection, limit: Option<usize>) -> Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pages = db::latest_pages(conn, limit)?;
    if pages.is_empty() {
        println!("No cached pages. Run 'fetch' first.");
        return Ok(());
    }
    println!("Reparsing {} pages...", pages.len());

    let pb = ProgressBar::new(pages.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec})")?
            .progress_chars("=> "),
    );

    let mut saved = 0usize;
    let mut not_found = 0usize;

    for chunk in pages.chunks(100) {
        let results: Vec<(i64, String, Transcript)> = chunk
            .par_iter()
            .map(|page| (page.id, page.pin.clone(), parser::extract_html(&page.html)))
            .collect();

        for (page_id, pin, transcript) in results {
            if transcript.is_not_found() {
                not_found += 1;
            } else {
                db::save_transcript(conn, &pin, page_id, &transcript)?;
                saved += 1;
            }
            pb.inc(1);
        }
    }

    pb.finish_and_clear();
    println!("Saved {} transcripts ({} pages had no result).", saved, not_found);
    Ok(())
}

fn print_transcript(transcript: &Transcript) {
    let or_dash = |s: &str| {
        if s.is_empty() {
            "-".to_string()
        } else {
            s.to_string()
        }
    };

    println!("Student: {}", or_dash(&transcript.student_name));
    println!("Roll No: {}", or_dash(&transcript.roll_number));

    for semester in &transcript.semesters {
        println!(
            "\nSemester {}   SGPA {}   CGPA {}",
            semester.semester,
            or_dash(&semester.sgpa),
            or_dash(&semester.cgpa)
        );
        println!(
            "{:<10} | {:<32} | {:^5} | {:>5} | {:>6} | {:>7} | {:<10}",
            "Code", "Subject", "Grade", "GP", "Credit", "Points", "Status"
        );
        println!("{}", "-".repeat(92));
        for subject in &semester.subjects {
            println!(
                "{:<10} | {:<32} | {:^5} | {:>5} | {:>6} | {:>7} | {:<10}",
                truncate(&subject.subject_code, 10),
                truncate(&subject.subject_name, 32),
                subject.grade,
                subject.grade_point,
                subject.credit,
                subject.points,
                subject.status,
            );
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_strings() {
        assert_eq!(truncate("Operating Systems", 32), "Operating Systems");
        assert_eq!(truncate("ab", 2), "ab");
        assert_eq!(truncate("", 0), "");
    }

    #[test]
    fn truncate_survives_tiny_limits() {
        assert_eq!(truncate("abcdef", 2), "ab...");
        assert_eq!(truncate("abcdef", 1), "a...");
        assert_eq!(truncate("ab", 0), "...");
    }
}
