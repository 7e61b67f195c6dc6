//! # shardwalk
//!
//! The binary for the shardwalk traversal engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 apps/shardwalk (THE BINARY)              │
//! │                                                          │
//! │  ┌─────────────┐   ┌──────────────┐   ┌──────────────┐   │
//! │  │    CLI      │   │  Query ops   │   │    Bench     │   │
//! │  │   (clap)    │   │ (LDBC-style) │   │ (tokio pool) │   │
//! │  └──────┬──────┘   └──────┬───────┘   └──────┬───────┘   │
//! │         └─────────────────┼──────────────────┘           │
//! │                           ▼                              │
//! │                  ┌─────────────────┐                     │
//! │                  │ shardwalk-core  │                     │
//! │                  │  (THE ENGINE)   │                     │
//! │                  └─────────────────┘                     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! shardwalk init
//! shardwalk load -f demos/social.json
//! shardwalk traverse -s Person:1 -r knows
//! shardwalk query friends -p 1 -f Carmen
//! shardwalk -B memory bench -f demos/social.json -w 8 -o 10000
//! ```

use clap::Parser;
use shardwalk::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // SHARDWALK_LOG_FORMAT=json switches to machine-parseable output.
    let log_format = std::env::var("SHARDWALK_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "shardwalk=info,shardwalk_core=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  shardwalk v{}
  batched traversal over sharded key-value graphs
"#,
        env!("CARGO_PKG_VERSION")
    );
}
