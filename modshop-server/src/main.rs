use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

mod context;
mod server;

use crate::server::run_server;

#[derive(Parser, Debug, Clone)]
#[command(name = "modshop")]
#[command(author, version, about = "ModShop - Messenger storefront bot for mod accounts")]
pub struct Args {
    /// Address the webhook listener binds to
    #[arg(long, env = "SERVER_ADDR", default_value = "0.0.0.0:3000")]
    pub server_addr: String,

    /// Postgres connection URL.
    #[arg(long, env = "DATABASE_URL", default_value = "postgres://modshop@localhost:5432/modshop")]
    pub db_url: String,

    /// Page access token used for the Send API
    #[arg(long, env = "PAGE_ACCESS_TOKEN")]
    pub page_access_token: String,

    /// Token echoed back during the webhook subscription handshake
    #[arg(long, env = "VERIFY_TOKEN")]
    pub verify_token: String,

    /// Comma separated sender ids allowed to become admins
    #[arg(long, env = "ADMIN_IDS", value_delimiter = ',')]
    pub admin_ids: Vec<String>,

    #[arg(long, env = "VISION_API_KEY")]
    pub vision_api_key: String,

    #[arg(long, env = "VISION_API_BASE")]
    pub vision_api_base: Option<String>,

    #[arg(long, env = "VISION_MODEL")]
    pub vision_model: Option<String>,

    /// Seconds before an idle conversation is forgotten
    #[arg(long, env = "IDLE_TIMEOUT_SECS", default_value_t = 1800)]
    pub idle_timeout_secs: u64,

    /// Upper bound on one receipt analysis
    #[arg(long, env = "AI_TIMEOUT_SECS", default_value_t = 90)]
    pub ai_timeout_secs: u64,

    /// Ask buyers for an account password after their email
    #[arg(long, env = "COLLECT_PASSWORD", default_value = "false")]
    pub collect_password: bool,

    #[arg(long, env = "JOB_POLL_SECS", default_value_t = 15)]
    pub job_poll_secs: u64,

    /// Don't queue or poll account-creation jobs
    #[arg(long, default_value = "false")]
    pub no_job_poller: bool,
}

fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::from_default_env()
        .add_directive("modshop=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(sub)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    init_tracing()?;
    let args = Args::parse();
    info!(
        "ModShop starting. addr={}, admins={}, job_poller={}",
        args.server_addr,
        args.admin_ids.len(),
        !args.no_job_poller
    );

    if let Err(e) = run_server(args).await {
        error!("Server error: {:?}", e);
        return Err(e.into());
    }
    Ok(())
}
