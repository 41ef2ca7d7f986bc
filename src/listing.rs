use secrecy::SecretString;
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, error};

use crate::api::JobSource;
use crate::error::PortalError;
use crate::filters::{derive_facet_options, FacetKey, FacetOptions, FilterDraft, FilterState};
use crate::models::Job;
use crate::session::Session;

pub const PAGE_SIZE: usize = 5;

pub fn total_pages(count: usize) -> usize {
    count.div_ceil(PAGE_SIZE).max(1)
}

pub fn page_window(len: usize, page: usize) -> Range<usize> {
    let start = page.saturating_sub(1).saturating_mul(PAGE_SIZE).min(len);
    let end = start.saturating_add(PAGE_SIZE).min(len);
    start..end
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    None,
    Page,
    Fetch,
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub seq: u64,
    pub filters: FilterState,
    pub token: Arc<SecretString>,
}

#[derive(Debug)]
pub struct ListingController {
    session: Session,
    draft: FilterDraft,
    options: FacetOptions,
    jobs: Vec<Job>,
    current_page: usize,
    total_pages: usize,
    loading: bool,
    last_seq: u64,
}

impl ListingController {
    pub fn new(session: Session) -> Self {
        Self::from_query(session, "")
    }

    pub fn from_query(session: Session, query: &str) -> Self {
        let initial = FilterState::from_query(query);
        debug!(filters = initial.len(), "Initialised listing filters from query");
        Self {
            session,
            draft: FilterDraft::new(initial),
            options: FacetOptions::default(),
            jobs: Vec::new(),
            current_page: 1,
            total_pages: 1,
            loading: false,
            last_seq: 0,
        }
    }

    pub fn pending(&self) -> &FilterState {
        self.draft.pending()
    }

    pub fn applied(&self) -> &FilterState {
        self.draft.applied()
    }

    pub fn options(&self) -> &FacetOptions {
        &self.options
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn page_jobs(&self) -> &[Job] {
        &self.jobs[page_window(self.jobs.len(), self.current_page)]
    }

    pub fn query_string(&self) -> String {
        self.draft.applied().to_query()
    }

    pub fn toggle_facet_value(&mut self, key: FacetKey, value: &str) -> Refresh {
        self.draft.toggle(key, value);
        Refresh::None
    }

    pub fn apply_pending_filters(&mut self) -> Refresh {
        self.draft.commit();
        self.current_page = 1;
        Refresh::Fetch
    }

    pub fn clear_all_filters(&mut self) -> Refresh {
        self.draft.reset();
        self.current_page = 1;
        Refresh::Fetch
    }

    /// Removes an applied value straight from its chip, without an Apply.
    pub fn remove_applied_value(&mut self, key: FacetKey, value: &str) -> Refresh {
        if !self.draft.remove_applied(key, value) {
            return Refresh::None;
        }
        self.current_page = 1;
        Refresh::Fetch
    }

    pub fn set_page(&mut self, page: usize) -> Refresh {
        let page = page.clamp(1, self.total_pages);
        if page == self.current_page {
            return Refresh::None;
        }
        self.current_page = page;
        Refresh::Page
    }

    pub fn next_page(&mut self) -> Refresh {
        self.set_page(self.current_page.saturating_add(1))
    }

    pub fn prev_page(&mut self) -> Refresh {
        self.set_page(self.current_page.saturating_sub(1))
    }

    /// Starts a fetch for the applied filters. Without a token nothing is
    /// sent and the state is left as it is.
    pub fn begin_fetch(&mut self) -> Option<FetchRequest> {
        let Some(token) = self.session.token() else {
            debug!("No auth token; skipping job fetch");
            return None;
        };
        self.last_seq += 1;
        self.loading = true;
        Some(FetchRequest {
            seq: self.last_seq,
            filters: self.draft.applied().clone(),
            token: Arc::clone(token),
        })
    }

    /// Applies a finished fetch. Responses are taken in arrival order, so a
    /// slow earlier request can overwrite a newer one.
    pub fn finish_fetch(&mut self, seq: u64, outcome: Result<Vec<Job>, PortalError>) {
        self.loading = false;
        match outcome {
            Ok(jobs) => {
                if seq != self.last_seq {
                    debug!(seq, latest = self.last_seq, "Applying out-of-order listing response");
                }
                self.options = derive_facet_options(&jobs);
                self.total_pages = total_pages(jobs.len());
                self.current_page = self.current_page.clamp(1, self.total_pages);
                self.jobs = jobs;
                debug!(
                    seq,
                    count = self.jobs.len(),
                    page = self.current_page,
                    pages = self.total_pages,
                    "Job listing updated"
                );
            }
            Err(e) => {
                error!(seq, "Error fetching jobs: {}", e);
            }
        }
    }

    pub async fn fetch_jobs(&mut self, source: &dyn JobSource) {
        let Some(request) = self.begin_fetch() else {
            return;
        };
        let outcome = source.list_jobs(&request.filters, &request.token).await;
        self.finish_fetch(request.seq, outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// In-memory listing that filters like the server and records every call.
    struct FakeSource {
        jobs: Vec<Job>,
        calls: Mutex<Vec<FilterState>>,
        fail: bool,
    }

    impl FakeSource {
        fn new(jobs: Vec<Job>) -> Self {
            Self {
                jobs,
                calls: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(Vec::new())
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl JobSource for FakeSource {
        async fn list_jobs(&self, filters: &FilterState, _token: &SecretString) -> Result<Vec<Job>, PortalError> {
            self.calls.lock().unwrap().push(filters.clone());
            if self.fail {
                return Err(PortalError::Api {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            Ok(self
                .jobs
                .iter()
                .filter(|job| {
                    FacetKey::ALL.into_iter().all(|key| {
                        filters.get(key).is_empty() || job.facet(key).is_some_and(|v| filters.contains(key, v))
                    })
                })
                .cloned()
                .collect())
        }
    }

    fn job(id: usize, city: &str, job_type: &str) -> Job {
        Job {
            id: Some(id.to_string()),
            title: Some(format!("Job {}", id)),
            city: Some(city.to_string()),
            job_type: Some(job_type.to_string()),
            ..Job::default()
        }
    }

    /// Twelve jobs: three in Pune, the rest spread over Mumbai and Delhi.
    fn catalog() -> Vec<Job> {
        (0..12)
            .map(|i| {
                let city = match i {
                    0 | 4 | 8 => "Pune",
                    _ if i % 2 == 0 => "Mumbai",
                    _ => "Delhi",
                };
                let job_type = if i < 6 { "Full-Time" } else { "Contract" };
                job(i, city, job_type)
            })
            .collect()
    }

    fn signed_in() -> Session {
        Session::with_token("token")
    }

    fn ids(jobs: &[Job]) -> Vec<String> {
        jobs.iter().map(|j| j.id().to_string()).collect()
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0), 1);
        assert_eq!(total_pages(1), 1);
        assert_eq!(total_pages(5), 1);
        assert_eq!(total_pages(6), 2);
        assert_eq!(total_pages(12), 3);
        for count in 0..40 {
            assert_eq!(total_pages(count), std::cmp::max(1, count.div_ceil(5)));
        }
    }

    #[test]
    fn test_page_window() {
        assert_eq!(page_window(12, 1), 0..5);
        assert_eq!(page_window(12, 2), 5..10);
        assert_eq!(page_window(12, 3), 10..12);
        assert_eq!(page_window(12, 4), 12..12);
        assert_eq!(page_window(0, 1), 0..0);
    }

    #[test]
    fn test_initialize_from_query() {
        let controller = ListingController::from_query(signed_in(), "?cities=Pune&jobTypes=Contract&foo=bar");
        assert_eq!(controller.applied(), controller.pending());
        assert!(controller.applied().contains(FacetKey::Cities, "Pune"));
        assert!(controller.applied().contains(FacetKey::JobTypes, "Contract"));
        assert_eq!(controller.applied().len(), 2);
        assert_eq!(controller.current_page(), 1);
        assert_eq!(controller.total_pages(), 1);
    }

    #[test]
    fn test_toggle_only_touches_pending() {
        let mut controller = ListingController::new(signed_in());
        assert_eq!(controller.toggle_facet_value(FacetKey::Cities, "Pune"), Refresh::None);
        assert!(controller.pending().contains(FacetKey::Cities, "Pune"));
        assert!(controller.applied().is_empty());
        assert_eq!(controller.query_string(), "");

        controller.toggle_facet_value(FacetKey::Cities, "Pune");
        assert!(controller.pending().is_empty());
    }

    #[tokio::test]
    async fn test_twelve_jobs_paginate() {
        let source = FakeSource::new(catalog());
        let mut controller = ListingController::new(signed_in());
        controller.fetch_jobs(&source).await;

        assert_eq!(controller.total_pages(), 3);
        assert_eq!(ids(controller.page_jobs()), ["0", "1", "2", "3", "4"]);

        assert_eq!(controller.set_page(2), Refresh::Page);
        assert_eq!(ids(controller.page_jobs()), ["5", "6", "7", "8", "9"]);
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test]
    async fn test_set_page_clamps() {
        let source = FakeSource::new(catalog());
        let mut controller = ListingController::new(signed_in());
        controller.fetch_jobs(&source).await;

        assert_eq!(controller.set_page(99), Refresh::Page);
        assert_eq!(controller.current_page(), 3);
        assert_eq!(ids(controller.page_jobs()), ["10", "11"]);

        assert_eq!(controller.set_page(0), Refresh::Page);
        assert_eq!(controller.current_page(), 1);
        assert_eq!(controller.set_page(1), Refresh::None);
        assert_eq!(controller.prev_page(), Refresh::None);

        for page in [0, 1, 2, 3, 4, 1000, usize::MAX] {
            controller.set_page(page);
            assert!((1..=controller.total_pages()).contains(&controller.current_page()));
        }
    }

    #[tokio::test]
    async fn test_apply_narrows_and_resets_page() {
        let source = FakeSource::new(catalog());
        let mut controller = ListingController::new(signed_in());
        controller.fetch_jobs(&source).await;
        controller.set_page(2);

        controller.toggle_facet_value(FacetKey::Cities, "Pune");
        let pending = controller.pending().clone();
        assert_eq!(controller.apply_pending_filters(), Refresh::Fetch);
        assert_eq!(controller.applied(), &pending);
        assert_eq!(controller.current_page(), 1);

        controller.fetch_jobs(&source).await;
        assert_eq!(controller.total_pages(), 1);
        assert_eq!(controller.current_page(), 1);
        assert_eq!(ids(controller.page_jobs()), ["0", "4", "8"]);
        assert_eq!(controller.query_string(), "cities=Pune");
    }

    #[tokio::test]
    async fn test_facets_narrow_with_results() {
        let source = FakeSource::new(catalog());
        let mut controller = ListingController::new(signed_in());
        controller.fetch_jobs(&source).await;
        assert_eq!(controller.options().get(FacetKey::Cities), ["Pune", "Delhi", "Mumbai"]);
        assert_eq!(controller.options().get(FacetKey::JobTypes), ["Full-Time", "Contract"]);

        controller.toggle_facet_value(FacetKey::JobTypes, "Contract");
        controller.apply_pending_filters();
        controller.fetch_jobs(&source).await;

        assert_eq!(controller.options().get(FacetKey::JobTypes), ["Contract"]);
        assert_eq!(controller.options().get(FacetKey::Cities), ["Mumbai", "Delhi", "Pune"]);
    }

    #[tokio::test]
    async fn test_clear_all_filters() {
        let source = FakeSource::new(catalog());
        let mut controller = ListingController::from_query(signed_in(), "cities=Pune&jobTypes=Contract");
        controller.toggle_facet_value(FacetKey::Departments, "Sales");

        assert_eq!(controller.clear_all_filters(), Refresh::Fetch);
        assert!(controller.applied().is_empty());
        assert!(controller.pending().is_empty());
        assert_eq!(controller.query_string(), "");
        assert_eq!(controller.current_page(), 1);

        controller.fetch_jobs(&source).await;
        assert_eq!(controller.jobs().len(), 12);
        assert_eq!(source.calls.lock().unwrap()[0], FilterState::new());
    }

    #[tokio::test]
    async fn test_remove_applied_value_refetches() {
        let source = FakeSource::new(catalog());
        let mut controller = ListingController::from_query(signed_in(), "cities=Pune&cities=Delhi");
        controller.fetch_jobs(&source).await;
        assert_eq!(controller.jobs().len(), 9);

        assert_eq!(controller.remove_applied_value(FacetKey::Cities, "Delhi"), Refresh::Fetch);
        assert!(!controller.pending().contains(FacetKey::Cities, "Delhi"));
        assert_eq!(controller.query_string(), "cities=Pune");
        controller.fetch_jobs(&source).await;
        assert_eq!(controller.jobs().len(), 3);

        assert_eq!(controller.remove_applied_value(FacetKey::Cities, "Delhi"), Refresh::None);
    }

    #[tokio::test]
    async fn test_no_token_skips_fetch() {
        let source = FakeSource::new(catalog());
        let mut controller = ListingController::new(Session::anonymous());
        assert!(controller.begin_fetch().is_none());

        controller.fetch_jobs(&source).await;
        assert_eq!(source.call_count(), 0);
        assert!(controller.jobs().is_empty());
        assert!(!controller.is_loading());
        assert_eq!(controller.total_pages(), 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_state() {
        let mut controller = ListingController::new(signed_in());
        controller.fetch_jobs(&FakeSource::new(catalog())).await;
        controller.set_page(3);
        let before = ids(controller.jobs());

        controller.toggle_facet_value(FacetKey::Cities, "Pune");
        controller.apply_pending_filters();
        controller.fetch_jobs(&FakeSource::failing()).await;

        assert!(!controller.is_loading());
        assert_eq!(ids(controller.jobs()), before);
        assert_eq!(controller.total_pages(), 3);
        assert_eq!(controller.options().get(FacetKey::Cities).len(), 3);
    }

    #[test]
    fn test_overlapping_fetches_last_arrival_wins() {
        let mut controller = ListingController::new(signed_in());
        let first = controller.begin_fetch().unwrap();
        controller.toggle_facet_value(FacetKey::Cities, "Pune");
        controller.apply_pending_filters();
        let second = controller.begin_fetch().unwrap();
        assert!(controller.is_loading());
        assert!(second.seq > first.seq);
        assert!(second.filters.contains(FacetKey::Cities, "Pune"));

        controller.finish_fetch(second.seq, Ok(vec![job(1, "Pune", "Full-Time")]));
        controller.finish_fetch(first.seq, Ok(catalog()));

        assert_eq!(controller.jobs().len(), 12);
        assert_eq!(controller.total_pages(), 3);
    }

    #[test]
    fn test_empty_result_reports_one_page() {
        let mut controller = ListingController::new(signed_in());
        let request = controller.begin_fetch().unwrap();
        controller.finish_fetch(request.seq, Ok(Vec::new()));
        assert_eq!(controller.total_pages(), 1);
        assert_eq!(controller.current_page(), 1);
        assert!(controller.page_jobs().is_empty());
        assert_eq!(controller.next_page(), Refresh::None);
    }
}
