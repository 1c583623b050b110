use clap::Parser;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "scrape-gateway")]
#[command(about = "Rate-limited caching gateway for social media scraping APIs")]
pub struct Args {
    // Port to run the operational server on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    // Redis connection URL; the in-memory cache takes over when unreachable
    #[arg(long, default_value = "redis://127.0.0.1:6379/0")]
    pub redis_url: String,

    // Scraping provider API token; provider endpoints are registered when set
    #[arg(long)]
    pub scraper_token: Option<String>,

    // Scratch directory for binary payloads spilled by the in-memory cache
    #[arg(long, default_value = "/tmp/scrape-gateway-cache")]
    pub scratch_dir: String,
}
