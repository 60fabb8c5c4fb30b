//! Hydrating List Binding
//!
//! Ties the pieces together for one bound element:
//!
//! 1. extract the template and find the pre-rendered item nodes
//! 2. optionally create one collection item per pre-rendered item
//! 3. prime: queue the initial contents as `Existing` changes
//! 4. subscribe to the collection; each diff is classified and queued
//! 5. on each frame, apply the queued batch through the synchronizer
//!
//! Flushing never holds the queue lock while running hooks or touching the
//! document, so hooks and bindings may mutate the collection. Anything they
//! enqueue is applied on a following frame.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use super::classify::ChangeMap;
use super::config::{
    Collection, DataChangedHook, FlushHook, ForeachSettings, ForeachSource,
};
use super::scheduler::{FlushState, FrameScheduler, RenderQueue, TimerScheduler};
use super::synchronizer::{ListSynchronizer, SyncConfig};
use super::template::{find_live_nodes, TemplateFragment};
use crate::binding::{BindingContext, BindingProvider, DeclarativeBinder};
use crate::dom::{span_for, Document, NodeId};
use crate::error::Result;
use crate::reactive::{compare_arrays, ArrayChange, ComputedList, ObservableArray, Signal, SubscriberId};

/// The services a list binding runs against.
#[derive(Clone)]
pub struct Host {
    pub document: Document,
    pub binder: Arc<dyn BindingProvider>,
    pub scheduler: Arc<dyn FrameScheduler>,
}

impl Host {
    /// Declarative bindings with the given frame scheduler.
    pub fn new(document: Document, scheduler: Arc<dyn FrameScheduler>) -> Self {
        Self {
            document,
            binder: Arc::new(DeclarativeBinder::new()),
            scheduler,
        }
    }

    /// Declarative bindings flushed by a frame timer on the current tokio
    /// runtime.
    pub fn with_frame_timer(document: Document) -> Result<Self> {
        Ok(Self::new(document, Arc::new(TimerScheduler::from_current()?)))
    }

    pub fn with_binder(mut self, binder: Arc<dyn BindingProvider>) -> Self {
        self.binder = binder;
        self
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host").field("document", &self.document).finish()
    }
}

/// The collection subscription held by a binding.
enum Subscription {
    Array(ObservableArray),
    Signal(Signal<Vec<Value>>),
    Computed(ComputedList),
}

impl Subscription {
    fn cancel(&self, subscriber_id: SubscriberId) {
        match self {
            Subscription::Array(array) => array.unsubscribe(subscriber_id),
            Subscription::Signal(signal) => signal.unsubscribe(subscriber_id),
            Subscription::Computed(list) => list.unsubscribe(subscriber_id),
        }
    }
}

struct ForeachInner {
    subscriber_id: SubscriberId,
    queue: Mutex<RenderQueue>,
    sync: Mutex<ListSynchronizer>,
    scheduler: Arc<dyn FrameScheduler>,
    before_queue_flush: Option<FlushHook>,
    after_queue_flush: Option<FlushHook>,
    data_changed: Option<DataChangedHook>,
    subscription: Mutex<Option<Subscription>>,
    disposed: AtomicBool,
    flushes: AtomicUsize,
}

impl ForeachInner {
    fn on_array_change(self: &Arc<Self>, changes: &[ArrayChange]) {
        if self.disposed.load(Ordering::Acquire) {
            return;
        }
        let map = ChangeMap::classify(changes);
        if let Some(hook) = &self.data_changed {
            hook(&map);
        }

        let needs_frame = self.queue.lock().enqueue(map.into_queue());
        if needs_frame {
            self.request_frame();
        }
    }

    fn request_frame(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.scheduler.schedule_once(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.flush();
            }
        }));
    }

    fn flush(self: &Arc<Self>) {
        let batch = self.queue.lock().take_batch();

        if !batch.is_empty() && !self.disposed.load(Ordering::Acquire) {
            debug!(changes = batch.len(), "flushing list changes");
            if let Some(hook) = &self.before_queue_flush {
                hook(&batch);
            }
            {
                let mut sync = self.sync.lock();
                for change in &batch {
                    sync.apply(change);
                }
            }
            self.flushes.fetch_add(1, Ordering::Relaxed);
            if let Some(hook) = &self.after_queue_flush {
                hook(&batch);
            }
        }

        let more = self.queue.lock().finish();
        if more {
            self.request_frame();
        }
    }

    fn subscribe(self: &Arc<Self>, data: &Collection) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let subscription = match data {
            Collection::Static(_) => return,
            Collection::Array(array) => {
                array.subscribe_changes(self.subscriber_id, move |changes| {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_array_change(changes);
                    }
                });
                Subscription::Array(array.clone())
            }
            Collection::Computed(list) => {
                list.subscribe_changes(self.subscriber_id, move |changes| {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_array_change(changes);
                    }
                });
                Subscription::Computed(list.clone())
            }
            Collection::Signal(signal) => {
                // A plain cell reports no diff; compare against what it held.
                let previous = Mutex::new(signal.get_untracked());
                signal.subscribe(self.subscriber_id, move |next: &Vec<Value>| {
                    let changes = {
                        let mut previous = previous.lock();
                        let changes = compare_arrays(&previous, next);
                        previous.clone_from(next);
                        changes
                    };
                    if changes.is_empty() {
                        return;
                    }
                    if let Some(inner) = weak.upgrade() {
                        inner.on_array_change(&changes);
                    }
                });
                Subscription::Signal(signal.clone())
            }
        };
        *self.subscription.lock() = Some(subscription);
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(subscription) = self.subscription.lock().take() {
            subscription.cancel(self.subscriber_id);
        }
        debug!("list binding disposed");
    }
}

/// A list bound to pre-rendered markup.
///
/// Dropping the handle disposes the binding, as does removing the bound
/// node from the document.
///
/// # Example
///
/// ```rust,ignore
/// let doc = Document::from_html(
///     r#"<ul id="people">
///          <li data-init data-bind="text: name">Ann</li>
///          <li data-template data-bind="text: name"></li>
///        </ul>"#,
/// );
/// let people = ObservableArray::new(vec![json!({"name": "Ann"})]);
/// let host = Host::new(doc.clone(), Arc::new(ImmediateScheduler));
/// let list = doc.get_element_by_id("people").unwrap();
///
/// let binding = ForeachBinding::bind(&host, list, people.clone(), &BindingContext::root(json!({})))?;
/// people.push(json!({"name": "Bob"})); // renders a second <li> from the template
/// ```
pub struct ForeachBinding {
    inner: Arc<ForeachInner>,
}

impl ForeachBinding {
    /// Bind `source` to the span at `element`: an element, or the opening
    /// comment of a virtual element.
    ///
    /// Configuration problems are returned here; nothing is rendered in
    /// that case.
    pub fn bind(
        host: &Host,
        element: NodeId,
        source: impl Into<ForeachSource>,
        context: &Arc<BindingContext>,
    ) -> Result<Self> {
        let doc = &host.document;
        let mut options = source.into().into_options();
        if let Some(settings) = ForeachSettings::from_element(doc, element)? {
            options = options.merge_settings(settings);
        }
        let nodes_per_element = options.item_node_count();

        let span = span_for(doc, element)?;
        let named = options.name.is_some();
        let template =
            TemplateFragment::extract(doc, span.as_ref(), options.name.as_deref(), nodes_per_element)?;
        let existing_nodes = find_live_nodes(doc, span.as_ref(), named);

        if let Some(factory) = options.create_element.clone() {
            let items: Vec<Value> = (0..existing_nodes.len() / nodes_per_element)
                .map(|_| factory())
                .collect();
            options.data.fill(items);
        }

        debug!(
            existing = existing_nodes.len(),
            nodes_per_element,
            named,
            "binding list"
        );

        let sync = ListSynchronizer::new(SyncConfig {
            document: doc.clone(),
            host: span,
            template,
            existing_nodes,
            nodes_per_element,
            parent: Arc::clone(context),
            binder: Arc::clone(&host.binder),
            alias: options.alias.clone(),
            no_context: options.no_context,
        });

        let inner = Arc::new(ForeachInner {
            subscriber_id: SubscriberId::new(),
            queue: Mutex::new(RenderQueue::new()),
            sync: Mutex::new(sync),
            scheduler: Arc::clone(&host.scheduler),
            before_queue_flush: options.before_queue_flush.clone(),
            after_queue_flush: options.after_queue_flush.clone(),
            data_changed: options.data_changed.clone(),
            subscription: Mutex::new(None),
            disposed: AtomicBool::new(false),
            flushes: AtomicUsize::new(0),
        });

        let primed: Vec<ArrayChange> = options
            .data
            .snapshot()
            .into_iter()
            .enumerate()
            .map(|(index, value)| ArrayChange::existing(index, value))
            .collect();
        inner.on_array_change(&primed);
        inner.subscribe(&options.data);

        let weak = Arc::downgrade(&inner);
        doc.add_dispose_callback(element, move || {
            if let Some(inner) = weak.upgrade() {
                inner.dispose();
            }
        });

        Ok(Self { inner })
    }

    /// Stop following the collection. Rendered nodes are left in place.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Number of items currently rendered.
    pub fn len(&self) -> usize {
        self.inner.sync.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Item scopes in list order.
    pub fn item_contexts(&self) -> Vec<Arc<BindingContext>> {
        self.inner.sync.lock().item_contexts()
    }

    /// Last node of each item's span.
    pub fn anchors(&self) -> Vec<Option<NodeId>> {
        self.inner.sync.lock().anchors().to_vec()
    }

    /// Whether a frame has been requested and not yet flushed.
    pub fn is_flush_scheduled(&self) -> bool {
        self.inner.queue.lock().state() == FlushState::FlushScheduled
    }

    /// Operations waiting for the next flush.
    pub fn pending_changes(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// Number of non-empty batches applied so far.
    pub fn flush_count(&self) -> usize {
        self.inner.flushes.load(Ordering::Relaxed)
    }
}

impl Drop for ForeachBinding {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

impl std::fmt::Debug for ForeachBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForeachBinding")
            .field("items", &self.len())
            .field("pending_changes", &self.pending_changes())
            .field("flushes", &self.flush_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
