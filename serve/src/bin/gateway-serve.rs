//! Process entry point: loads `.env`/XDG config, then serves the gateway's HTTP+SSE
//! surface (base spec §6).

use clap::Parser;

#[derive(Parser)]
#[command(name = "gateway-serve")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "LISTEN_ADDR")]
    addr: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt::init();
    let _ = env_config::load_and_apply("gateway", None);

    let args = Args::parse();
    serve::run_serve(args.addr.as_deref()).await
}
