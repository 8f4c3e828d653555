use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;

use activity_sync::config;
use activity_sync::snapshot::{fetch_recent_posts, SnapshotClient, SnapshotService};

#[derive(Parser, Debug)]
#[command(about = "Fetch one member snapshot and print the normalized posts")]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Member access token (falls back to SNAPSHOT_TOKEN)
    #[arg(long, env = "SNAPSHOT_TOKEN")]
    token: String,

    /// Number of posts to keep
    #[arg(long, default_value = "20")]
    limit: usize,

    /// Print the raw records instead of normalized posts
    #[arg(long)]
    raw: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    let client = SnapshotClient::from_config(&cfg)?;

    if args.raw {
        let records = client.fetch_raw(&args.token, args.limit).await?;
        println!("Raw records: {}", records.len());
        for record in records {
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        return Ok(());
    }

    let posts = fetch_recent_posts(&client, &args.token, args.limit, Utc::now()).await?;
    println!("Posts: {}", posts.len());
    for post in posts {
        println!(
            "  {} [{}] {} -> {}",
            post.post_urn,
            post.media_type.as_str(),
            post.created_at_ms,
            post.permalink
        );
        println!("    {}", post.text_preview);
    }
    Ok(())
}
