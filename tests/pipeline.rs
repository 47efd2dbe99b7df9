use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpListener;

use instasum::content::ContentScript;
use instasum::input::Router;
use instasum::models::{MENU_ITEM_ID, MenuClick, Message, MessageResponse};
use instasum::network::Orchestrator;
use instasum::platform::{
    ChannelTabs, DirResources, MemoryDocument, MemoryMenus, MemoryStorage, ResourceLoader,
    runtime_channel,
};
use instasum::prompts::{IMPORTANT_WORDS_PROMPT, KEY_HIGHLIGHTS_PROMPT, SUMMARY_PROMPT};
use instasum::server::{CompletionService, build_router};
use instasum::template::TemplateCache;
use instasum::ui::{PopupController, PopupState};

struct Canned;

#[async_trait]
impl CompletionService for Canned {
    async fn complete(&self, _text: &str, prompt: &str) -> anyhow::Result<String> {
        Ok(match prompt {
            SUMMARY_PROMPT => "**Hello** world",
            KEY_HIGHLIGHTS_PROMPT => "- point one\n- point two",
            IMPORTANT_WORDS_PROMPT => "Hello",
            _ => anyhow::bail!("unexpected prompt"),
        }
        .to_string())
    }
}

async fn start_backend() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(Arc::new(Canned))).await.unwrap();
    });
    format!("http://{addr}")
}

fn extension_dir(api_endpoint: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.json"),
        serde_json::json!({ "apiEndpoint": api_endpoint }).to_string(),
    )
    .unwrap();
    std::fs::write(
        dir.path().join("summary-template.html"),
        "<p>{{summary}}</p><ul>{{keyHighlights}}</ul>",
    )
    .unwrap();
    dir
}

#[tokio::test]
async fn selection_to_popup_and_back() {
    let endpoint = start_backend().await;
    let dir = extension_dir(&endpoint);
    let resources: Arc<dyn ResourceLoader> = Arc::new(DirResources::new(dir.path()));

    let storage = Arc::new(MemoryStorage::new());
    let tabs = Arc::new(ChannelTabs::new());
    let mut tab = tabs.connect(3).await;
    let orchestrator = Arc::new(Orchestrator::new(
        reqwest::Client::new(),
        resources.clone(),
        storage,
        tabs,
    ));
    let router = Arc::new(Router::new(Arc::new(MemoryMenus::new()), orchestrator));
    router.install().unwrap();

    let click = MenuClick {
        menu_item_id: MENU_ITEM_ID.to_string(),
        selection_text: Some("Hello world".to_string()),
    };
    assert!(router.on_menu_click(click, Some(3)).await);

    let templates = Arc::new(TemplateCache::new(resources));
    let mut content = ContentScript::new(PopupController::new(MemoryDocument::new(), templates));
    let message = tab.recv().await.unwrap();
    assert!(content.handle_message(message).await);

    let handle = content.popup().handle().unwrap();
    let html = content
        .popup()
        .document()
        .node(handle.summary_popup)
        .unwrap()
        .inner_html
        .clone();
    assert!(html.contains("<strong>Hello</strong> world"));
    assert_eq!(html.matches("<li>").count(), 2);

    // the persisted result is what a later requestSummary sees
    let (sender, rx) = runtime_channel(4);
    tokio::spawn(Arc::clone(&router).listen(rx));
    let reply = sender.send(Message::RequestSummary).await.unwrap();
    let Some(MessageResponse::Summary(stored)) = reply else {
        panic!("expected a stored summary");
    };
    assert_eq!(stored.summary, "**Hello** world");
    assert_eq!(stored.important_words, "Hello");

    assert!(content.on_click(handle.overlay).await);
    assert_eq!(content.popup().state(), PopupState::Absent);
    assert_eq!(content.popup().document().body_len(), 0);
    assert!(!content.on_click(handle.overlay).await);
}

#[tokio::test]
async fn unreachable_config_shows_failure_popup() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("summary-template.html"),
        "<p>{{summary}}</p><ul>{{keyHighlights}}</ul>",
    )
    .unwrap();
    let resources: Arc<dyn ResourceLoader> = Arc::new(DirResources::new(dir.path()));

    let tabs = Arc::new(ChannelTabs::new());
    let mut tab = tabs.connect(1).await;
    let orchestrator = Orchestrator::new(
        reqwest::Client::new(),
        resources.clone(),
        Arc::new(MemoryStorage::new()),
        tabs,
    );
    orchestrator.process_selection("anything", 1).await;

    let message = tab.recv().await.unwrap();
    assert_eq!(message, Message::display_failure());

    let mut content = ContentScript::new(PopupController::new(
        MemoryDocument::new(),
        Arc::new(TemplateCache::new(resources)),
    ));
    content.handle_message(message).await;
    let rendered = content.popup().document().render();
    assert!(rendered.contains("<p>Failed to fetch data.</p><ul></ul>"));
}
