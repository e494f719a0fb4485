use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Parser;
use iotgate::auth;
use iotgate::config::Config;
use iotgate::Session;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "iotgate")]
#[command(about = "Check MQTT device credentials against the identity provider")]
struct Args {
    /// Configuration file (TOML); AUTH0_* variables override it
    #[arg(long, env = "IOTGATE_CONFIG")]
    config: Option<PathBuf>,

    /// MQTT client identifier
    #[arg(long, default_value = "")]
    client_id: String,

    /// Username, or "JWT" to present a bearer token as the password
    #[arg(long)]
    username: String,

    /// Password or bearer token
    #[arg(long, env = "IOTGATE_PASSWORD", hide_env_values = true)]
    password: String,

    /// Topic to check publish permission for (repeatable)
    #[arg(long)]
    publish: Vec<String>,

    /// Topic filter to check subscribe permission for (repeatable)
    #[arg(long)]
    subscribe: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => Config::default(),
    }
    .apply_env();

    let authenticator = auth::new(&config).context("invalid configuration")?;
    let authorizer = auth::authorizer();
    info!(strategy = ?config.auth.strategy, "Authenticator ready");

    let mut session = Session::new(args.client_id);
    session
        .authenticate(
            authenticator.as_ref(),
            Some(args.username),
            Some(Bytes::from(args.password)),
        )
        .await
        .context("authentication refused")?;

    let profile = session
        .profile()
        .context("session has no profile after authentication")?;
    println!(
        "authenticated client={} subject={} topics={:?}",
        session.client_id(),
        profile.subject(),
        profile.topics()
    );

    for topic in &args.publish {
        let allowed = authorizer.authorize_publish(&session, topic);
        println!("publish {topic}: {}", if allowed { "allow" } else { "deny" });
    }
    for filter in &args.subscribe {
        let allowed = authorizer.authorize_subscribe(&session, filter);
        println!("subscribe {filter}: {}", if allowed { "allow" } else { "deny" });
    }

    Ok(())
}
