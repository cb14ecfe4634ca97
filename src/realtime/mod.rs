//! Realtime subscription bridge
//!
//! Pages subscribe to change notifications per table (optionally filtered to
//! one record), and each notification is turned into cache invalidation. No
//! payload is interpreted beyond what the filter needs.
//!
//! Subscriptions live in a registry keyed by channel. The first subscriber
//! of a channel joins it on the transport and the last one to drop leaves
//! it. Without a configured transport the bridge still keeps its registry
//! but nothing is ever delivered, and pages fall back to polling.

pub mod socket;

use crate::cache::{QueryCache, Resource};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::mpsc;
use uuid::Uuid;

pub use socket::{SocketConfig, SocketTransport};

#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    #[error("Realtime connection failed: {0}")]
    Connect(String),
    #[error("Realtime protocol error: {0}")]
    Protocol(String),
}

// =============================================================================
// Channels and events
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Messages,
    Calls,
    Leads,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Messages => "messages",
            Self::Calls => "calls",
            Self::Leads => "leads",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "messages" => Some(Self::Messages),
            "calls" => Some(Self::Calls),
            "leads" => Some(Self::Leads),
            _ => None,
        }
    }

    /// Row events worth listening to: new messages and calls, any lead change
    pub fn event(self) -> &'static str {
        match self {
            Self::Messages | Self::Calls => "INSERT",
            Self::Leads => "*",
        }
    }

    /// Cached resources a change in this table makes stale
    pub fn invalidates(self) -> &'static [Resource] {
        match self {
            Self::Messages => &[
                Resource::Conversations,
                Resource::Conversation,
                Resource::Dashboard,
            ],
            Self::Calls => &[Resource::Calls, Resource::Dashboard],
            Self::Leads => &[Resource::Leads, Resource::Dashboard],
        }
    }
}

/// Equality filter on one column, `column=eq.value` on the wire
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelFilter {
    pub column: String,
    pub value: String,
}

impl ChannelFilter {
    pub fn eq(column: impl Into<String>, value: impl fmt::Display) -> Self {
        Self {
            column: column.into(),
            value: value.to_string(),
        }
    }
}

impl fmt::Display for ChannelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=eq.{}", self.column, self.value)
    }
}

/// A table, optionally narrowed to rows matching a filter
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelSpec {
    pub table: Table,
    pub filter: Option<ChannelFilter>,
}

impl ChannelSpec {
    pub fn table(table: Table) -> Self {
        Self {
            table,
            filter: None,
        }
    }

    pub fn filtered(table: Table, filter: ChannelFilter) -> Self {
        Self {
            table,
            filter: Some(filter),
        }
    }

    /// Transport topic name
    pub fn topic(&self) -> String {
        match self.filter {
            Some(ref filter) => format!("realtime:{}:{}", self.table.as_str(), filter),
            None => format!("realtime:{}", self.table.as_str()),
        }
    }

    /// Whether an event belongs to this channel. An event that names its
    /// topic only matches that channel, so a row delivered once per joined
    /// topic runs each subscriber once.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.table != self.table {
            return false;
        }
        if let Some(ref topic) = event.topic {
            if *topic != self.topic() {
                return false;
            }
        }
        match self.filter {
            Some(ref filter) => event.fields.get(&filter.column) == Some(&filter.value),
            None => true,
        }
    }
}

impl fmt::Display for ChannelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.topic())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "INSERT" => Some(Self::Insert),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// "Something changed" notice. `fields` holds the changed row's scalar
/// columns as strings, used only for filter matching. `topic` is the
/// channel the transport received it on, when known.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub topic: Option<String>,
    pub fields: HashMap<String, String>,
}

impl ChangeEvent {
    pub fn new(table: Table, kind: ChangeKind) -> Self {
        Self {
            table,
            kind,
            topic: None,
            fields: HashMap::new(),
        }
    }

    pub fn on_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_field(mut self, column: impl Into<String>, value: impl fmt::Display) -> Self {
        self.fields.insert(column.into(), value.to_string());
        self
    }
}

// =============================================================================
// Transport
// =============================================================================

/// Delivers channel membership to the backend. Calls are fire-and-forget:
/// a transport queues them and applies them on its own task. They run under
/// the registry lock and must not block or call back into the bridge.
pub trait RealtimeTransport: Send + Sync {
    fn join(&self, channel: &ChannelSpec);
    fn leave(&self, channel: &ChannelSpec);

    /// Close the connection for good
    fn shutdown(&self) {}

    /// False for the null transport
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Transport used when no realtime backend is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransport;

impl RealtimeTransport for NullTransport {
    fn join(&self, channel: &ChannelSpec) {
        tracing::debug!("Realtime disabled, not joining {}", channel);
    }

    fn leave(&self, _channel: &ChannelSpec) {}

    fn is_enabled(&self) -> bool {
        false
    }
}

// =============================================================================
// Registry
// =============================================================================

type Callback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    channels: HashMap<ChannelSpec, BTreeMap<u64, Callback>>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Run every callback whose channel matches the event. Callbacks run
/// outside the registry lock so they may subscribe or unsubscribe.
fn dispatch_to(registry: &Mutex<Registry>, event: &ChangeEvent) -> usize {
    let callbacks: Vec<Callback> = {
        let registry = lock(registry);
        registry
            .channels
            .iter()
            .filter(|(spec, _)| spec.matches(event))
            .flat_map(|(_, callbacks)| callbacks.values().cloned())
            .collect()
    };
    for callback in &callbacks {
        callback(event);
    }
    callbacks.len()
}

/// Subscription registry plus the transport that feeds it
#[derive(Clone)]
pub struct RealtimeBridge {
    registry: Arc<Mutex<Registry>>,
    transport: Arc<dyn RealtimeTransport>,
}

impl fmt::Debug for RealtimeBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeBridge")
            .field("channels", &self.active_channels())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl RealtimeBridge {
    pub fn new(transport: Arc<dyn RealtimeTransport>) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            transport,
        }
    }

    /// Bridge with no transport; subscriptions are tracked but never fire
    pub fn disabled() -> Self {
        Self::new(Arc::new(NullTransport))
    }

    /// Bridge fed by `events`, e.g. the receiving half of a socket
    /// transport. The pump task ends when the sender side closes or every
    /// clone of the bridge is dropped.
    pub fn with_events(
        transport: Arc<dyn RealtimeTransport>,
        mut events: mpsc::UnboundedReceiver<ChangeEvent>,
    ) -> Self {
        let bridge = Self::new(transport);
        let registry: Weak<Mutex<Registry>> = Arc::downgrade(&bridge.registry);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                let delivered = dispatch_to(&registry, &event);
                tracing::debug!(
                    "Realtime {:?} on {} delivered to {} subscribers",
                    event.kind,
                    event.table.as_str(),
                    delivered
                );
            }
        });
        bridge
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_enabled()
    }

    /// Register `callback` for `channel`. The returned guard unsubscribes
    /// when dropped.
    pub fn subscribe<F>(&self, channel: ChannelSpec, callback: F) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        // Membership changes reach the transport in registry order
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        let callbacks = registry.channels.entry(channel.clone()).or_default();
        let first = callbacks.is_empty();
        callbacks.insert(id, Arc::new(callback));
        if first {
            tracing::debug!("Joining realtime channel {}", channel);
            self.transport.join(&channel);
        }
        drop(registry);

        Subscription {
            bridge: self.clone(),
            channel,
            id,
        }
    }

    fn unsubscribe(&self, channel: &ChannelSpec, id: u64) {
        let mut registry = lock(&self.registry);
        let Some(callbacks) = registry.channels.get_mut(channel) else {
            return;
        };
        callbacks.remove(&id);
        if callbacks.is_empty() {
            registry.channels.remove(channel);
            tracing::debug!("Leaving realtime channel {}", channel);
            self.transport.leave(channel);
        }
    }

    /// Forget every subscriber and close the transport. Guards still alive
    /// afterwards unsubscribe without effect.
    pub fn shutdown(&self) {
        let mut registry = lock(&self.registry);
        let dropped = registry.channels.len();
        registry.channels.clear();
        self.transport.shutdown();
        tracing::debug!("Realtime bridge shut down ({} channels dropped)", dropped);
    }

    /// Deliver an event to matching subscribers. Returns how many ran.
    pub fn dispatch(&self, event: &ChangeEvent) -> usize {
        dispatch_to(&self.registry, event)
    }

    /// Channels with at least one subscriber, in stable order
    pub fn active_channels(&self) -> Vec<ChannelSpec> {
        let registry = lock(&self.registry);
        let mut channels: Vec<ChannelSpec> = registry.channels.keys().cloned().collect();
        channels.sort();
        channels
    }

    pub fn subscriber_count(&self, channel: &ChannelSpec) -> usize {
        lock(&self.registry)
            .channels
            .get(channel)
            .map_or(0, |callbacks| callbacks.len())
    }

    // =========================================================================
    // Cache invalidation watchers
    // =========================================================================

    /// Invalidate the table's dependent resources on every matching change
    pub fn watch(&self, channel: ChannelSpec, cache: &QueryCache) -> Subscription {
        let cache = cache.clone();
        let resources = channel.table.invalidates();
        self.subscribe(channel, move |_event| cache.invalidate_all(resources))
    }

    /// New messages, optionally only for one conversation
    pub fn watch_messages(&self, conversation_id: Option<Uuid>, cache: &QueryCache) -> Subscription {
        let channel = match conversation_id {
            Some(id) => {
                ChannelSpec::filtered(Table::Messages, ChannelFilter::eq("conversation_id", id))
            }
            None => ChannelSpec::table(Table::Messages),
        };
        self.watch(channel, cache)
    }

    pub fn watch_calls(&self, cache: &QueryCache) -> Subscription {
        self.watch(ChannelSpec::table(Table::Calls), cache)
    }

    pub fn watch_leads(&self, cache: &QueryCache) -> Subscription {
        self.watch(ChannelSpec::table(Table::Leads), cache)
    }
}

/// Live subscription; unsubscribes on drop
pub struct Subscription {
    bridge: RealtimeBridge,
    channel: ChannelSpec,
    id: u64,
}

impl Subscription {
    pub fn channel(&self) -> &ChannelSpec {
        &self.channel
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bridge.unsubscribe(&self.channel, self.id);
    }
}

/// Subscription tied to a key such as the selected conversation id.
/// Changing the key tears the old subscription down before the new one is
/// established.
pub struct KeyedSubscription<K> {
    key: Option<K>,
    subscription: Option<Subscription>,
}

impl<K> Default for KeyedSubscription<K> {
    fn default() -> Self {
        Self {
            key: None,
            subscription: None,
        }
    }
}

impl<K: PartialEq + Clone> KeyedSubscription<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(&self) -> Option<&K> {
        self.key.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.subscription.is_some()
    }

    /// Switch to `key`. Returns false (and keeps the current subscription)
    /// when the key is unchanged.
    pub fn set_key<F>(&mut self, key: K, establish: F) -> bool
    where
        F: FnOnce(&K) -> Subscription,
    {
        if self.key.as_ref() == Some(&key) {
            return false;
        }
        self.clear();
        self.subscription = Some(establish(&key));
        self.key = Some(key);
        true
    }

    /// Tear down the current subscription
    pub fn clear(&mut self) {
        self.subscription = None;
        self.key = None;
    }
}
