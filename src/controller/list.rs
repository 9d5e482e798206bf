use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

use crate::controller::debounce::Debouncer;
use crate::database::{EntityStore, Record};
use crate::entity::EntityDef;
use crate::filter::PageRequest;

#[derive(Debug, Clone, PartialEq)]
pub enum ListState {
    Idle,
    Loading,
    Loaded { records: Vec<Record>, total_count: i64 },
    Error(String),
}

/// Paginated, searchable, sortable view over one entity.
///
/// Every fetch takes a generation number; only the most recently requested
/// fetch may publish its result. Once closed, nothing is published.
pub struct ListController {
    store: Arc<dyn EntityStore>,
    entity: &'static EntityDef,
    max_page_size: i64,
    query: Mutex<PageRequest>,
    generation: AtomicU64,
    closed: AtomicBool,
    state: watch::Sender<ListState>,
}

impl ListController {
    pub fn new(store: Arc<dyn EntityStore>, entity: &'static EntityDef, page_size: i64, max_page_size: i64) -> Arc<Self> {
        let (state, _) = watch::channel(ListState::Idle);
        Arc::new(Self {
            store,
            entity,
            max_page_size,
            query: Mutex::new(PageRequest::new(0, page_size)),
            generation: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            state,
        })
    }

    pub fn entity(&self) -> &'static EntityDef {
        self.entity
    }

    pub fn subscribe(&self) -> watch::Receiver<ListState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ListState {
        self.state.borrow().clone()
    }

    pub fn query(&self) -> PageRequest {
        self.lock_query().clone()
    }

    fn lock_query(&self) -> MutexGuard<'_, PageRequest> {
        match self.query.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub async fn mount(&self) {
        self.fetch().await;
    }

    pub async fn set_page(&self, page: i64) {
        self.lock_query().page = page;
        self.fetch().await;
    }

    /// New page size; back to the first page
    pub async fn set_page_size(&self, page_size: i64) {
        {
            let mut query = self.lock_query();
            query.page_size = page_size;
            query.page = 0;
        }
        self.fetch().await;
    }

    /// New search term; back to the first page
    pub async fn set_search(&self, term: &str) {
        {
            let mut query = self.lock_query();
            query.search = Some(term.to_string()).filter(|t| !t.trim().is_empty());
            query.page = 0;
        }
        self.fetch().await;
    }

    pub async fn set_sort(&self, sort: Option<String>) {
        self.lock_query().sort = sort.filter(|s| !s.trim().is_empty());
        self.fetch().await;
    }

    /// Re-fetch the current page with the current query
    pub async fn refresh(&self) {
        self.fetch().await;
    }

    pub fn refresh_handle(self: &Arc<Self>) -> RefreshHandle {
        RefreshHandle(Arc::downgrade(self))
    }

    /// Search box input: each settled term triggers `set_search`
    pub fn search_debouncer(self: &Arc<Self>, quiet: Duration) -> Debouncer<String> {
        let weak = Arc::downgrade(self);
        Debouncer::new(quiet, move |term: String| {
            let weak = weak.clone();
            async move {
                if let Some(list) = weak.upgrade() {
                    list.set_search(&term).await;
                }
            }
        })
    }

    /// Unmount; in-flight responses are dropped from now on
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn fetch(&self) {
        if self.is_closed() {
            return;
        }
        let token = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let request = self.query();
        self.state.send_replace(ListState::Loading);

        let result = match request.to_filter(self.entity.table, self.entity.search_column, self.max_page_size) {
            Ok(filter) => self.store.list(self.entity, &filter).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        if self.is_closed() {
            debug!("list {}: closed, dropping response #{}", self.entity.table, token);
            return;
        }
        if self.generation.load(Ordering::SeqCst) != token {
            debug!("list {}: discarding stale response #{}", self.entity.table, token);
            return;
        }

        let next = match result {
            Ok(page) => ListState::Loaded { records: page.records, total_count: page.total_count },
            Err(message) => ListState::Error(message),
        };
        self.state.send_replace(next);
    }
}

/// Lets an editor ask its parent list to re-fetch without owning it
#[derive(Clone, Debug)]
pub struct RefreshHandle(Weak<ListController>);

impl RefreshHandle {
    pub async fn refresh(&self) {
        if let Some(list) = self.0.upgrade() {
            list.refresh().await;
        }
    }
}
