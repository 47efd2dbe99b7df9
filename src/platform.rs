//! Capabilities the extension scripts need from their host: bundled resources,
//! local storage, context menus, tab messaging, the runtime message bus and a
//! document to draw the popup into.
//!
//! Every capability is a trait so the core can run against a browser bridge,
//! the CLI, or the in-memory fakes used by the tests.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc, oneshot};
use tracing::debug;

use crate::error::PlatformError;
use crate::models::{MenuItem, Message, MessageResponse};

#[async_trait]
pub trait ResourceLoader: Send + Sync {
    /// Resolves a logical bundled path (e.g. `config.json`) to its URL.
    fn url(&self, path: &str) -> String;

    async fn load(&self, path: &str) -> Result<String, PlatformError>;
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Returns only the keys that are present.
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, String>, PlatformError>;

    async fn set(&self, items: Vec<(String, String)>) -> Result<(), PlatformError>;
}

pub trait Menus: Send + Sync {
    fn remove_all(&self);

    fn create(&self, item: MenuItem) -> Result<(), PlatformError>;
}

#[async_trait]
pub trait Tabs: Send + Sync {
    async fn send_message(&self, tab_id: i64, message: Message) -> Result<(), PlatformError>;
}

/// Extension directory on disk.
pub struct DirResources {
    root: PathBuf,
}

impl DirResources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ResourceLoader for DirResources {
    fn url(&self, path: &str) -> String {
        format!("file://{}", self.root.join(path).display())
    }

    async fn load(&self, path: &str) -> Result<String, PlatformError> {
        tokio::fs::read_to_string(self.root.join(path))
            .await
            .map_err(|e| PlatformError::Resource {
                path: path.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Resources served over HTTP, e.g. an unpacked extension behind a static file server.
pub struct HttpResources {
    base: String,
    client: reqwest::Client,
}

impl HttpResources {
    pub fn new(base: impl Into<String>, client: reqwest::Client) -> Self {
        Self { base: base.into(), client }
    }
}

#[async_trait]
impl ResourceLoader for HttpResources {
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base.trim_end_matches('/'), path)
    }

    async fn load(&self, path: &str) -> Result<String, PlatformError> {
        let url = self.url(path);
        let failed = |reason: String| PlatformError::Resource {
            path: path.to_string(),
            reason,
        };
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(failed(response.status().to_string()));
        }
        response.text().await.map_err(|e| failed(e.to_string()))
    }
}

/// Fixed in-memory resources. Counts every load so callers can assert on caching.
#[derive(Default)]
pub struct MemoryResources {
    files: HashMap<String, String>,
    loads: AtomicUsize,
}

impl MemoryResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, body: &str) -> Self {
        self.files.insert(path.to_string(), body.to_string());
        self
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceLoader for MemoryResources {
    fn url(&self, path: &str) -> String {
        format!("memory://{path}")
    }

    async fn load(&self, path: &str) -> Result<String, PlatformError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.files.get(path).cloned().ok_or_else(|| PlatformError::Resource {
            path: path.to_string(),
            reason: "404 Not Found".to_string(),
        })
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, String>, PlatformError> {
        let items = self.items.read().await;
        Ok(keys
            .iter()
            .filter_map(|k| items.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, items: Vec<(String, String)>) -> Result<(), PlatformError> {
        self.items.write().await.extend(items);
        Ok(())
    }
}

/// Local storage persisted as a flat JSON object, so the last summary survives
/// between CLI runs.
pub struct JsonFileStorage {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>, PlatformError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Storage for JsonFileStorage {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, String>, PlatformError> {
        let _guard = self.lock.lock().await;
        let mut all = self.read_all().await?;
        Ok(keys
            .iter()
            .filter_map(|k| all.remove(*k).map(|v| (k.to_string(), v)))
            .collect())
    }

    async fn set(&self, items: Vec<(String, String)>) -> Result<(), PlatformError> {
        let _guard = self.lock.lock().await;
        let mut all = self.read_all().await?;
        all.extend(items);
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, serde_json::to_string_pretty(&all)?).await?;
        debug!(path = %self.path.display(), "storage written");
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryMenus {
    items: Mutex<Vec<MenuItem>>,
}

impl MemoryMenus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> Vec<MenuItem> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Menus for MemoryMenus {
    fn remove_all(&self) {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn create(&self, item: MenuItem) -> Result<(), PlatformError> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        if items.iter().any(|existing| existing.id == item.id) {
            return Err(PlatformError::Menu(format!(
                "Cannot create item with duplicate id {}",
                item.id
            )));
        }
        items.push(item);
        Ok(())
    }
}

/// Routes tab messages to content scripts connected over mpsc channels.
#[derive(Default)]
pub struct ChannelTabs {
    tabs: RwLock<HashMap<i64, mpsc::UnboundedSender<Message>>>,
}

impl ChannelTabs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the content script of `tab_id`; a second connect replaces the first.
    pub async fn connect(&self, tab_id: i64) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.tabs.write().await.insert(tab_id, tx);
        rx
    }
}

#[async_trait]
impl Tabs for ChannelTabs {
    async fn send_message(&self, tab_id: i64, message: Message) -> Result<(), PlatformError> {
        let tabs = self.tabs.read().await;
        let tx = tabs.get(&tab_id).ok_or(PlatformError::TabUnavailable(tab_id))?;
        tx.send(message).map_err(|_| PlatformError::TabUnavailable(tab_id))
    }
}

/// Records every delivered message.
#[derive(Default)]
pub struct MemoryTabs {
    sent: Mutex<Vec<(i64, Message)>>,
}

impl MemoryTabs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(i64, Message)> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Tabs for MemoryTabs {
    async fn send_message(&self, tab_id: i64, message: Message) -> Result<(), PlatformError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((tab_id, message));
        Ok(())
    }
}

/// A runtime message together with the channel its answer goes back on.
/// The sender side waits until `reply` is used or dropped.
pub struct PendingMessage {
    pub message: Message,
    pub reply: oneshot::Sender<MessageResponse>,
}

#[derive(Clone)]
pub struct RuntimeSender {
    tx: mpsc::Sender<PendingMessage>,
}

pub fn runtime_channel(buffer: usize) -> (RuntimeSender, mpsc::Receiver<PendingMessage>) {
    let (tx, rx) = mpsc::channel(buffer);
    (RuntimeSender { tx }, rx)
}

impl RuntimeSender {
    /// Sends `message` and waits for the listener's answer. `None` when the
    /// listener handled the message without answering.
    pub async fn send(&self, message: Message) -> Result<Option<MessageResponse>, PlatformError> {
        let (reply, answer) = oneshot::channel();
        self.tx
            .send(PendingMessage { message, reply })
            .await
            .map_err(|_| PlatformError::Messaging("no runtime listener".to_string()))?;
        Ok(answer.await.ok())
    }
}

/// Opaque handle to a created element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementRef(u64);

/// The small slice of the DOM the popup needs.
pub trait Document: Send {
    fn create_element(&mut self, tag: &str, id: &str) -> ElementRef;
    fn append(&mut self, el: ElementRef);
    fn remove(&mut self, el: ElementRef) -> Result<(), PlatformError>;
    fn contains(&self, el: ElementRef) -> bool;
    fn set_inner_html(&mut self, el: ElementRef, html: &str) -> Result<(), PlatformError>;
    fn add_class(&mut self, el: ElementRef, class: &str) -> Result<(), PlatformError>;
    fn set_style(
        &mut self,
        el: ElementRef,
        property: &str,
        value: &str,
    ) -> Result<(), PlatformError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Node {
    pub tag: String,
    pub id: String,
    pub inner_html: String,
    pub classes: Vec<String>,
    pub styles: BTreeMap<String, String>,
}

/// Document body kept in memory. Removed nodes stay addressable, like detached DOM nodes.
#[derive(Debug, Default)]
pub struct MemoryDocument {
    next: u64,
    nodes: HashMap<ElementRef, Node>,
    body: Vec<ElementRef>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<ElementRef> {
        self.body.iter().copied().find(|el| self.nodes[el].id == id)
    }

    pub fn node(&self, el: ElementRef) -> Option<&Node> {
        self.nodes.get(&el)
    }

    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Serializes the body's children as HTML.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for el in &self.body {
            let node = &self.nodes[el];
            out.push_str(&format!("<{} id=\"{}\"", node.tag, node.id));
            if !node.classes.is_empty() {
                out.push_str(&format!(" class=\"{}\"", node.classes.join(" ")));
            }
            if !node.styles.is_empty() {
                let style = node
                    .styles
                    .iter()
                    .map(|(k, v)| format!("{k}: {v}"))
                    .collect::<Vec<_>>()
                    .join("; ");
                out.push_str(&format!(" style=\"{style}\""));
            }
            out.push_str(&format!(">{}</{}>\n", node.inner_html, node.tag));
        }
        out
    }

    fn node_mut(&mut self, el: ElementRef) -> Result<&mut Node, PlatformError> {
        self.nodes
            .get_mut(&el)
            .ok_or_else(|| PlatformError::ElementMissing(format!("{el:?}")))
    }
}

impl Document for MemoryDocument {
    fn create_element(&mut self, tag: &str, id: &str) -> ElementRef {
        self.next += 1;
        let el = ElementRef(self.next);
        self.nodes.insert(
            el,
            Node {
                tag: tag.to_string(),
                id: id.to_string(),
                ..Node::default()
            },
        );
        el
    }

    fn append(&mut self, el: ElementRef) {
        if self.nodes.contains_key(&el) && !self.body.contains(&el) {
            self.body.push(el);
        }
    }

    fn remove(&mut self, el: ElementRef) -> Result<(), PlatformError> {
        let pos = self
            .body
            .iter()
            .position(|e| *e == el)
            .ok_or_else(|| PlatformError::ElementMissing(format!("{el:?}")))?;
        self.body.remove(pos);
        Ok(())
    }

    fn contains(&self, el: ElementRef) -> bool {
        self.body.contains(&el)
    }

    fn set_inner_html(&mut self, el: ElementRef, html: &str) -> Result<(), PlatformError> {
        self.node_mut(el)?.inner_html = html.to_string();
        Ok(())
    }

    fn add_class(&mut self, el: ElementRef, class: &str) -> Result<(), PlatformError> {
        let node = self.node_mut(el)?;
        if !node.classes.iter().any(|c| c == class) {
            node.classes.push(class.to_string());
        }
        Ok(())
    }

    fn set_style(
        &mut self,
        el: ElementRef,
        property: &str,
        value: &str,
    ) -> Result<(), PlatformError> {
        self.node_mut(el)?
            .styles
            .insert(property.to_string(), value.to_string());
        Ok(())
    }
}
