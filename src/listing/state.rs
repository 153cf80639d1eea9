use uuid::Uuid;

use super::{FilterCondition, ListQuery, Listable, Page, Selection, SortSpec};

/// Issued when a fetch starts; a response is only applied if its ticket is
/// still the latest.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchTicket {
    generation: u64,
    pub query: ListQuery,
}

/// View state of one list screen: the current query, what is on screen and
/// what is selected.
///
/// Changing search, filters, sort or page size returns to page 1. Every
/// change bumps a generation counter so a response to an older query is
/// dropped instead of overwriting a newer one.
#[derive(Debug, Clone)]
pub struct ListState {
    query: ListQuery,
    generation: u64,
    visible: Vec<Uuid>,
    total: usize,
    selection: Selection,
}

impl ListState {
    pub fn new(page_size: usize) -> Self {
        Self {
            query: ListQuery::new(1, page_size.max(1)),
            generation: 0,
            visible: Vec::new(),
            total: 0,
            selection: Selection::new(),
        }
    }

    pub fn query(&self) -> &ListQuery {
        &self.query
    }

    pub fn visible(&self) -> &[Uuid] {
        &self.visible
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    fn changed(&mut self, reset_page: bool) {
        if reset_page {
            self.query.page = 1;
        }
        self.generation += 1;
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        let search = search.into();
        self.query.search = if search.trim().is_empty() { None } else { Some(search) };
        self.changed(true);
    }

    pub fn set_filters(&mut self, filters: Vec<FilterCondition>) {
        self.query.filters = filters;
        self.changed(true);
    }

    pub fn set_sort(&mut self, sort: Option<SortSpec>) {
        self.query.sort = sort;
        self.changed(true);
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.query.page_size = page_size.max(1);
        self.changed(true);
    }

    pub fn set_page(&mut self, page: usize) {
        self.query.page = page.max(1);
        self.changed(false);
    }

    pub fn total_pages(&self) -> usize {
        self.total.div_ceil(self.query.page_size.max(1))
    }

    pub fn begin_fetch(&self) -> FetchTicket {
        FetchTicket {
            generation: self.generation,
            query: self.query.clone(),
        }
    }

    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Apply a fetched page. Stale tickets are ignored and `false` is
    /// returned. Selection is narrowed to the rows now visible.
    pub fn accept<T: Listable>(&mut self, ticket: &FetchTicket, page: &Page<T>) -> bool {
        if !self.is_current(ticket) {
            tracing::debug!(
                stale = ticket.generation,
                current = self.generation,
                "Dropping stale list response"
            );
            return false;
        }
        self.visible = page.ids();
        self.total = page.total;
        self.selection.retain_visible(&self.visible);
        true
    }

    pub fn toggle(&mut self, id: Uuid) -> bool {
        if !self.visible.contains(&id) {
            return false;
        }
        self.selection.toggle(id)
    }

    pub fn toggle_all(&mut self) {
        self.selection.toggle_all(&self.visible);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }
}
