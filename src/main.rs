use ghostbot::{BotConfig, BotEngine, TcpTransport};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ghostbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let server = env_or("GHOSTBOT_SERVER", "babylon.vrsites.com:5566");
    let name = env_or("GHOSTBOT_NAME", "yawgmoth_bot");
    let room_id = env_or("GHOSTBOT_ROOM", "eab63d0ea060b828578a4ae044f24d03");
    let owner = env_or("GHOSTBOT_OWNER", "yawgmoth");

    let mut config = BotConfig::new(name, room_id);
    // An empty owner means anyone may command the bot.
    if !owner.is_empty() {
        config = config.with_owner(owner);
    }

    info!(server = %server, name = %config.name, room_id = %config.room_id, "Starting ghostbot");

    let transport = match TcpTransport::connect(&server).await {
        Ok(transport) => transport,
        Err(e) => {
            error!(error = %e, server = %server, "Failed to connect");
            std::process::exit(1);
        }
    };

    if let Err(e) = BotEngine::new(config, transport).run().await {
        error!(error = %e, "Session ended with an error");
        std::process::exit(1);
    }

    info!("Session ended");
}
