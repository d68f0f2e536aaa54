use crate::models::{ResultHit, SearchResultPage, PAGE_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Idle,
    LoadingFirstPage,
    Ready,
    LoadingNextPage,
}

/// Accumulates pages of hits into one ordered list. The server dictates
/// order; pages are concatenated by offset, never re-sorted client-side.
#[derive(Debug)]
pub struct PageAccumulator {
    state: PageState,
    hits: Vec<ResultHit>,
    next_offset: usize,
    has_next_page: bool,
    total_hits: usize,
    error: Option<String>,
    page_size: usize,
}

impl PageAccumulator {
    pub fn new() -> Self {
        Self::with_page_size(PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: PageState::Idle,
            hits: Vec::new(),
            next_offset: 0,
            has_next_page: false,
            total_hits: 0,
            error: None,
            page_size,
        }
    }

    /// Claims the next fetch, returning its offset. Returns `None` while a
    /// fetch is already in flight or when no further page exists, so
    /// re-entrant calls never duplicate requests.
    pub fn begin_fetch(&mut self) -> Option<usize> {
        match self.state {
            PageState::Idle => {
                self.state = PageState::LoadingFirstPage;
                Some(0)
            }
            PageState::Ready if self.has_next_page => {
                self.state = PageState::LoadingNextPage;
                Some(self.next_offset)
            }
            PageState::Ready | PageState::LoadingFirstPage | PageState::LoadingNextPage => None,
        }
    }

    /// Appends a successful page. A short page means the sequence is done;
    /// the total is read from the latest page, not summed.
    pub fn complete(&mut self, page: SearchResultPage) {
        self.error = None;
        self.has_next_page = page.hits.len() == self.page_size;
        self.next_offset = page
            .next_offset
            .unwrap_or(self.next_offset + page.hits.len());
        self.total_hits = page.total_hits;
        self.hits.extend(page.hits);
        self.state = PageState::Ready;
    }

    /// Records a failed fetch. Previously accumulated pages stay visible,
    /// stale but present.
    pub fn fail(&mut self, details: impl Into<String>) {
        self.error = Some(details.into());
        self.state = if self.hits.is_empty() {
            PageState::Idle
        } else {
            PageState::Ready
        };
    }

    /// Starts a new query generation from offset 0.
    pub fn reset(&mut self) {
        *self = Self::with_page_size(self.page_size);
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(
            self.state,
            PageState::LoadingFirstPage | PageState::LoadingNextPage
        )
    }

    pub fn hits(&self) -> &[ResultHit] {
        &self.hits
    }

    pub fn total_hits(&self) -> usize {
        self.total_hits
    }

    pub fn has_next_page(&self) -> bool {
        self.has_next_page
    }

    pub fn next_offset(&self) -> usize {
        self.next_offset
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

impl Default for PageAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
