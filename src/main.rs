use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tokio::runtime::Runtime;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use instasum::config::{Settings, save_api_key};
use instasum::content::ContentScript;
use instasum::input::Router;
use instasum::models::{MENU_ITEM_ID, MenuClick, Message, MessageResponse};
use instasum::network::Orchestrator;
use instasum::platform::{
    ChannelTabs, DirResources, JsonFileStorage, MemoryDocument, MemoryMenus, ResourceLoader,
    runtime_channel,
};
use instasum::server::{GeminiService, serve};
use instasum::template::TemplateCache;
use instasum::ui::PopupController;

const CLI_TAB_ID: i64 = 1;

#[derive(Parser)]
#[command(name = "instasum")]
#[command(about = "Summaries, key highlights and important words for selected text")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the summarization backend
    Serve {
        /// Listen address, overrides `listen_addr`
        #[arg(long)]
        addr: Option<SocketAddr>,
    },

    /// Summarize text through the backend and print the popup markup
    Summarize {
        /// Text to summarize
        text: Option<String>,

        /// Take the text from the clipboard
        #[arg(long)]
        clipboard: bool,

        /// Directory holding config.json and summary-template.html
        #[arg(long)]
        extension_dir: Option<PathBuf>,
    },

    /// Print the last stored summary
    Last,

    /// Store the Gemini API key in the user config
    SetKey { key: String },
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = Settings::new()?;
    let rt = Runtime::new()?;
    match cli.command {
        Commands::Serve { addr } => {
            let addr = match addr {
                Some(addr) => addr,
                None => settings
                    .listen_addr
                    .parse()
                    .with_context(|| format!("invalid listen_addr {}", settings.listen_addr))?,
            };
            let api_key = settings
                .gemini_api_key
                .clone()
                .or_else(|| std::env::var("GEMINI_API_KEY").ok());
            let completions = Arc::new(GeminiService::new(settings.gemini_model.clone(), api_key));
            rt.block_on(serve(addr, completions))
        }
        Commands::Summarize {
            text,
            clipboard,
            extension_dir,
        } => {
            let text = match (text, clipboard) {
                (_, true) => arboard::Clipboard::new()?.get_text()?,
                (Some(text), false) => text,
                (None, false) => bail!("nothing to summarize: pass TEXT or --clipboard"),
            };
            let dir = extension_dir.unwrap_or_else(|| settings.extension_dir());
            let html = rt.block_on(summarize(&settings, dir, text))?;
            print!("{html}");
            Ok(())
        }
        Commands::Last => rt.block_on(last(&settings)),
        Commands::SetKey { key } => {
            let path = save_api_key(&key)?;
            println!("API key saved to {}", path.display());
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("instasum=info")),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn background(
    settings: &Settings,
    resources: Arc<dyn ResourceLoader>,
    tabs: Arc<ChannelTabs>,
) -> Router {
    let storage = Arc::new(JsonFileStorage::new(settings.storage_path()));
    let orchestrator = Arc::new(Orchestrator::new(
        reqwest::Client::new(),
        resources,
        storage,
        tabs,
    ));
    Router::new(Arc::new(MemoryMenus::new()), orchestrator)
}

/// Menu click → orchestrator → tab message → content script, all in-process.
async fn summarize(
    settings: &Settings,
    extension_dir: PathBuf,
    text: String,
) -> anyhow::Result<String> {
    info!(dir = %extension_dir.display(), "loading extension resources");
    let resources: Arc<dyn ResourceLoader> = Arc::new(DirResources::new(extension_dir));
    let tabs = Arc::new(ChannelTabs::new());
    let mut tab = tabs.connect(CLI_TAB_ID).await;

    let router = background(settings, resources.clone(), tabs);
    router.install()?;

    let templates = Arc::new(TemplateCache::new(resources));
    let mut content = ContentScript::new(PopupController::new(MemoryDocument::new(), templates));

    let click = MenuClick {
        menu_item_id: MENU_ITEM_ID.to_string(),
        selection_text: Some(text),
    };
    router.on_menu_click(click, Some(CLI_TAB_ID)).await;

    let message = tab.recv().await.context("no summary was delivered")?;
    content.handle_message(message).await;
    Ok(content.popup().document().render())
}

async fn last(settings: &Settings) -> anyhow::Result<()> {
    let resources = Arc::new(DirResources::new(settings.extension_dir()));
    let router = Arc::new(background(settings, resources, Arc::new(ChannelTabs::new())));
    let (sender, rx) = runtime_channel(1);
    tokio::spawn(router.listen(rx));

    match sender.send(Message::RequestSummary).await? {
        Some(MessageResponse::Summary(result)) => {
            println!("Summary:\n{}\n", result.summary);
            println!("Key highlights:\n{}\n", result.key_highlights);
            println!("Important words:\n{}", result.important_words);
            Ok(())
        }
        other => bail!("unexpected reply: {other:?}"),
    }
}
