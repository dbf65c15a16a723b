use anyhow::Result;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use wp_seo_optimizer::config::Config;
use wp_seo_optimizer::engine::discovery::DiscoveryParams;
use wp_seo_optimizer::pipeline::{CycleStats, Optimizer};
use wp_seo_optimizer::rewrite::gemini::GeminiRewriter;
use wp_seo_optimizer::rewrite::rotation::RotatingRewriter;
use wp_seo_optimizer::store::Store;
use wp_seo_optimizer::wordpress::rest::WordPressRest;

/// Granularity of the idle wait between cycles, so Ctrl+C is honored quickly.
const POLL_SLICE: Duration = Duration::from_secs(30);

/// Wait until `deadline` in short slices, leaving early when shutdown has
/// been requested. Returns true when the caller should stop instead of
/// starting another cycle.
async fn wait_for_next_cycle(deadline: Instant, shutdown: &AtomicBool) -> bool {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            return true;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return false;
        }
        tokio::time::sleep(remaining.min(POLL_SLICE)).await;
    }
}

fn print_cycle_report(stats: &CycleStats) {
    println!();
    println!("  Cycle report");
    println!("  ------------");
    println!("  Posts found:     {}", stats.found);
    println!("  Posts processed: {}", stats.processed);
    println!("  Succeeded:       {}", stats.succeeded);
    println!("  Failed:          {}", stats.failed);
    println!("  Elapsed:         {:.1}s", stats.elapsed_seconds);
    for error in &stats.errors {
        println!("  Error: {}", error);
    }
    println!();
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_file = std::fs::File::create("seo-optimizer.log")?;
    tracing_subscriber::fmt()
        .with_env_filter("wp_seo_optimizer=info")
        .with_writer(log_file)
        .with_ansi(false)
        .init();

    let once_mode = std::env::args().any(|arg| arg == "--once");

    let config = Config::load(Path::new("config.toml"))?;

    // Load saved credentials from .env (real env vars take precedence)
    Config::load_env_file();

    println!();
    println!("  WP SEO Optimizer v0.1.0");
    println!("  =======================");
    println!();
    println!("  Loading credentials (.env / env vars / interactive prompt):");
    println!();

    let username = Config::wordpress_username()?;
    let password = Config::wordpress_password()?;
    let gemini_keys = Config::gemini_api_keys()?;

    println!();
    println!("  Credentials loaded ({} Gemini key(s)). Starting...", gemini_keys.len());
    println!();

    let store = Store::open(Path::new(&config.store.db_path))?;
    let source = WordPressRest::new(&config.wordpress.base_url, &username, &password)?;

    let gemini = GeminiRewriter::new(&config.rewrite.base_url, &config.rewrite.model, "");
    let rewriter = RotatingRewriter::resume(gemini, gemini_keys, config.rewrite.max_retries, &store)?;

    let params = DiscoveryParams {
        author_id: config.optimizer.target_author_id,
        fetch_limit: config.optimizer.fetch_limit,
        movie_category_id: config.optimizer.movie_category_id,
        series_category_id: config.optimizer.series_category_id,
    };
    let domain = config.wordpress.domain().to_string();
    let mut optimizer = Optimizer::new(
        source,
        rewriter,
        store,
        domain,
        params,
        config.optimizer.max_posts_per_cycle,
    );

    if once_mode {
        println!("  ** ONE-SHOT MODE **");
        match optimizer.run_cycle().await {
            Ok(stats) => {
                optimizer
                    .store()
                    .set_statistic("last_cycle_result", &serde_json::to_value(&stats)?)?;
                print_cycle_report(&stats);
            }
            Err(e) => {
                eprintln!("  Cycle failed: {:#}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    println!(
        "  Continuous mode: one cycle every {} minutes (Ctrl+C to stop)",
        config.optimizer.check_interval_minutes
    );
    println!();

    // One listener for the whole run. A signal mid-cycle sets the flag; the
    // in-flight cycle always runs to completion first.
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested, finishing the current cycle");
                shutdown.store(true, Ordering::SeqCst);
            }
        });
    }

    let interval = Duration::from_secs(config.optimizer.check_interval_minutes * 60);
    loop {
        // First cycle runs immediately; the wait comes after.
        match optimizer.run_cycle().await {
            Ok(stats) => {
                optimizer
                    .store()
                    .set_statistic("last_cycle_result", &serde_json::to_value(&stats)?)?;
                println!(
                    "  Cycle done: {} found, {} succeeded, {} failed",
                    stats.found, stats.succeeded, stats.failed
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "cycle failed");
                eprintln!("  Cycle failed: {:#}", e);
            }
        }

        let deadline = Instant::now() + interval;
        if wait_for_next_cycle(deadline, &shutdown).await {
            println!();
            println!("  Stopping before the next cycle.");
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_wait_runs_to_deadline_without_shutdown() {
        let shutdown = AtomicBool::new(false);
        let deadline = Instant::now() + Duration::from_secs(90);
        assert!(!wait_for_next_cycle(deadline, &shutdown).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_stops_early_when_shutdown_is_requested() {
        let shutdown = Arc::new(AtomicBool::new(false));
        let deadline = Instant::now() + Duration::from_secs(1200);
        let waiter = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { wait_for_next_cycle(deadline, &shutdown).await })
        };

        // The flag is set mid-wait; the next slice check notices it long
        // before the deadline.
        tokio::time::sleep(Duration::from_secs(65)).await;
        shutdown.store(true, Ordering::SeqCst);
        assert!(waiter.await.unwrap());
    }
}
