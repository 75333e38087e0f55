mod app;
mod cli;
mod layout;

use std::time::Duration;

use app::App;
use cli::{CliError, CliOptions};
use shared::config::{ChatConfig, load_dotenv};
use shared::conversation::ConversationController;
use shared::llm::{OpenAiGateway, OpenAiGatewayConfig};
use shared::preferences::{FileStorage, PreferenceStore};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let _options = match CliOptions::parse(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(CliError::HelpRequested) => {
            print_usage();
            std::process::exit(0);
        }
        Err(err) => {
            eprintln!("error: {err}");
            eprintln!();
            print_usage();
            std::process::exit(2);
        }
    };

    if let Err(err) = load_dotenv() {
        eprintln!("{err}");
        std::process::exit(1);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "koala_chat=warn,shared=warn".to_string()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match ChatConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "failed to load chat config");
            std::process::exit(1);
        }
    };

    let gateway = match OpenAiGatewayConfig::from_env().and_then(OpenAiGateway::new) {
        Ok(gateway) => gateway,
        Err(err) => {
            error!(error = %err, "failed to initialize openai gateway");
            std::process::exit(1);
        }
    };

    let store = PreferenceStore::new(FileStorage::new(&config.preferences_path));
    let preferences = store.load();
    info!(
        preferences_path = %config.preferences_path.display(),
        model = %config.model,
        "koala chat starting"
    );

    let controller = ConversationController::new(
        config.model,
        Duration::from_millis(config.stream_idle_timeout_ms),
        preferences,
    );

    if let Err(err) = App::new(controller, gateway, store).run().await {
        error!(error = %err, "koala chat failed");
        std::process::exit(1);
    }
}

fn print_usage() {
    eprintln!(
        "Usage: koala-chat [--help]\n\
         \n\
         Chat with the koala. Type a message and press enter to conspire.\n\
         \n\
         Commands:\n\
         - /settings  Edit the conspiracy context and spicyness\n\
         - /up, /down Scroll the conversation\n\
         - /quit      Exit (Ctrl-C also exits; during a reply it stops the reply)\n\
         \n\
         Environment:\n\
         - OPENAI_API_KEY (required), KOALA_MODEL, KOALA_PREFERENCES_PATH, RUST_LOG"
    );
}
