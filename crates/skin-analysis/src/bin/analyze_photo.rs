//! CLI tool to send a photo through the remote analysis service.
//! Usage: cargo run -p skin-analysis --features cli --bin analyze_photo -- <photo.jpg> [name city]

use base64::Engine;
use skin_analysis::{AnalysisApi, AnalysisClient, Category};
use std::path::PathBuf;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skin_analysis=debug".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <photo> [name city]", args[0]);
        std::process::exit(1);
    }

    let client = AnalysisClient::from_env();
    println!("Phase one: {}", client.config().phase_one_url);
    println!("Phase two: {}", client.config().phase_two_url);

    if args.len() >= 4 {
        println!("\n=== Identity ===");
        match client.submit_identity(&args[2], &args[3]).await {
            Ok(ack) => println!("Accepted ({}): {}", ack.status, ack.body),
            Err(e) => {
                eprintln!("Identity submission failed: {}", e);
                std::process::exit(2);
            }
        }
    }

    let photo_path = PathBuf::from(&args[1]);
    let bytes = match std::fs::read(&photo_path) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Failed to read {}: {}", photo_path.display(), e);
            std::process::exit(1);
        }
    };
    println!("\nLoaded {} ({} bytes)", photo_path.display(), bytes.len());
    let payload = base64::engine::general_purpose::STANDARD.encode(&bytes);

    println!("\n=== Demographics ===");
    let response = match client.submit_image(&payload).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Image analysis failed: {}", e);
            std::process::exit(2);
        }
    };
    if !response.message.is_empty() {
        println!("Message: {}", response.message);
    }

    for category in Category::ALL {
        let group = response.data.group(category);
        println!("\n{} ({} labels)", category.as_str().to_uppercase(), group.len());
        let mut entries: Vec<(&String, &f64)> = group.iter().collect();
        entries.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));
        for (label, p) in entries {
            println!("  {:<18} {:>3}%", label, (p * 100.0).round() as i64);
        }
    }
}
