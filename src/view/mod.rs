use std::collections::HashSet;
use std::time::Instant;

use crate::api::FetchState;
use crate::page::{self, PageError, PageInfo, PageRequest};
use crate::query::debounce::Debouncer;
use crate::query::{apply_query, FilterFlag, QueryState, Queryable, SortKey};
use crate::store::RecordStore;

/// Everything one list screen owns: the record snapshot, the query
/// state, the cursor into the paginated view, the search debouncer and
/// the per-record action guard. Navigation never mutates records and
/// mutations never move the cursor further than the clamp requires.
pub struct ListView<T> {
    store: RecordStore<T>,
    query: QueryState,
    page: usize,
    page_size: usize,
    debounce: Debouncer,
    in_flight: HashSet<String>,
    pub fetch_state: FetchState,
}

impl<T: Queryable> ListView<T> {
    pub fn new(page_size: usize) -> Result<Self, PageError> {
        let page_size = page::validate_page_size(page_size)?;
        Ok(Self {
            store: RecordStore::new(),
            query: QueryState::default(),
            page: 1,
            page_size,
            debounce: Debouncer::new(),
            in_flight: HashSet::new(),
            fetch_state: FetchState::Idle,
        })
    }

    pub fn store(&self) -> &RecordStore<T> {
        &self.store
    }

    pub fn query(&self) -> &QueryState {
        &self.query
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Replace the snapshot with a fresh fetch. The cursor stays where
    /// it was unless the new data no longer reaches that page.
    pub fn load(&mut self, records: Vec<T>, skipped: usize) {
        self.store.load(records, skipped);
        self.clamp_page();
    }

    /// The full filtered and sorted view, independent of pagination.
    /// Exports and page math both start from this.
    pub fn view(&self) -> Vec<&T> {
        apply_query(self.store.records(), &self.query)
    }

    /// The visible slice plus the numbers the footer renders.
    pub fn current(&self) -> (Vec<&T>, PageInfo) {
        let view = self.view();
        let page_view = page::paginate(&view, self.page, self.page_size);
        let info = page_view.info();
        (page_view.items.to_vec(), info)
    }

    pub fn navigate(&mut self, request: PageRequest) -> Result<usize, PageError> {
        let total = page::total_pages(self.view().len(), self.page_size);
        self.page = page::navigate(self.page, total, request)?;
        Ok(self.page)
    }

    pub fn set_page_size(&mut self, size: usize) -> Result<(), PageError> {
        self.page_size = page::validate_page_size(size)?;
        self.page = 1;
        Ok(())
    }

    pub fn set_sort(&mut self, sort: SortKey) {
        self.query.sort = sort;
    }

    /// Returns whether the flag is enabled after the toggle.
    pub fn toggle_filter(&mut self, flag: FilterFlag) -> bool {
        let enabled = if self.query.filters.remove(&flag) {
            false
        } else {
            self.query.filters.insert(flag);
            true
        };
        self.clamp_page();
        enabled
    }

    /// Record a keystroke. Nothing is applied until the debounce window
    /// elapses without further input.
    pub fn type_search(&mut self, term: impl Into<String>, now: Instant) {
        self.debounce.submit(term, now);
    }

    pub fn search_deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    /// Apply the pending search term if its window has elapsed. Returns
    /// whether the view changed.
    pub fn poll_search(&mut self, now: Instant) -> bool {
        match self.debounce.poll(now) {
            Some(term) => {
                self.commit_search(term);
                true
            }
            None => false,
        }
    }

    pub fn commit_search(&mut self, term: impl Into<String>) {
        self.query.search = term.into();
        self.clamp_page();
    }

    /// Remove a record the server confirmed deleted.
    pub fn apply_delete(&mut self, id: &str) -> Option<T> {
        let removed = self.store.remove(id);
        if removed.is_some() {
            self.clamp_page();
        }
        removed
    }

    /// Swap in the record the server returned from an update.
    pub fn apply_update(&mut self, record: T) -> bool {
        self.store.update(record)
    }

    /// Claim a record for a remote action. False means an action on the
    /// same record is still running and this one must not start.
    pub fn try_begin_action(&mut self, id: &str) -> bool {
        self.in_flight.insert(id.to_string())
    }

    pub fn finish_action(&mut self, id: &str) {
        self.in_flight.remove(id);
    }

    pub fn action_in_flight(&self, id: &str) -> bool {
        self.in_flight.contains(id)
    }

    fn clamp_page(&mut self) {
        let total = page::total_pages(self.view().len(), self.page_size);
        self.page = self.page.clamp(1, total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::NumericField;
    use std::time::{Duration, Instant};

    struct Item {
        id: String,
        name: String,
    }

    impl Queryable for Item {
        fn id(&self) -> &str {
            &self.id
        }

        fn display_name(&self) -> String {
            self.name.clone()
        }

        fn search_fields(&self) -> Vec<&str> {
            vec![&self.name]
        }

        fn numeric_field(&self, _field: NumericField) -> Option<f64> {
            None
        }
    }

    fn items(n: usize) -> Vec<Item> {
        (1..=n)
            .map(|i| Item {
                id: i.to_string(),
                name: format!("rec {i:02}"),
            })
            .collect()
    }

    #[test]
    fn page_size_change_resets_to_first_page() {
        let mut view = ListView::new(10).unwrap();
        view.load(items(23), 0);
        view.navigate(PageRequest::Last).unwrap();
        assert_eq!(view.page(), 3);

        view.set_page_size(25).unwrap();
        let (_, info) = view.current();
        assert_eq!(info.page, 1);
        assert_eq!(info.total_pages, 1);
    }

    #[test]
    fn rejects_page_sizes_outside_the_option_set() {
        assert!(ListView::<Item>::new(7).is_err());
        let mut view = ListView::<Item>::new(10).unwrap();
        assert!(view.set_page_size(0).is_err());
        assert_eq!(view.page_size(), 10);
    }

    #[test]
    fn narrowing_search_pulls_the_cursor_back_in_range() {
        let mut view = ListView::new(10).unwrap();
        view.load(items(23), 0);
        view.navigate(PageRequest::Last).unwrap();

        view.commit_search("rec 0");
        let (rows, info) = view.current();
        assert_eq!(info.page, 1);
        assert_eq!(info.total_pages, 1);
        assert_eq!(rows.len(), 9);
    }

    #[test]
    fn delete_on_the_last_page_clamps_backward() {
        let mut view = ListView::new(10).unwrap();
        view.load(items(21), 0);
        view.navigate(PageRequest::Last).unwrap();
        assert_eq!(view.page(), 3);

        assert!(view.apply_delete("21").is_some());
        let (rows, info) = view.current();
        assert_eq!(info.page, 2);
        assert_eq!(rows.len(), 10);
        assert_eq!(info.total, 20);
    }

    #[test]
    fn out_of_range_jump_leaves_the_cursor_alone() {
        let mut view = ListView::new(10).unwrap();
        view.load(items(23), 0);
        assert!(view.navigate(PageRequest::Jump(9)).is_err());
        assert_eq!(view.page(), 1);
        assert_eq!(view.navigate(PageRequest::Jump(3)), Ok(3));
    }

    #[test]
    fn typed_search_commits_only_after_the_window() {
        let mut view = ListView::new(10).unwrap();
        view.load(items(5), 0);
        let t0 = Instant::now();

        view.type_search("rec 03", t0);
        assert!(!view.poll_search(t0 + Duration::from_millis(100)));
        assert_eq!(view.query().search, "");

        assert!(view.poll_search(t0 + Duration::from_millis(300)));
        assert_eq!(view.query().search, "rec 03");
        assert_eq!(view.view().len(), 1);
    }

    #[test]
    fn second_action_on_the_same_record_is_refused() {
        let mut view = ListView::new(10).unwrap();
        view.load(items(3), 0);

        assert!(view.try_begin_action("2"));
        assert!(!view.try_begin_action("2"));
        assert!(view.action_in_flight("2"));
        assert!(view.try_begin_action("3"));

        view.finish_action("2");
        assert!(view.try_begin_action("2"));
    }
}
