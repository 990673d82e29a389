use chatbot_server::{
    run,
    telemetry::{get_subscriber, init_subscriber},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // a missing .env file is fine, the process env may already be set
    dotenvy::dotenv().ok();

    // Init logger
    let subscriber = get_subscriber("chatbot-server", "info", std::io::stdout);
    init_subscriber(subscriber)?;

    run().await?;

    Ok(())
}
