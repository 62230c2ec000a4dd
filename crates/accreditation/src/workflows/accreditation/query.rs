use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{Application, ApplicationStatus};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const DEFAULT_MAX_PAGE_SIZE: usize = 100;

/// Filter and pagination parameters shared by every application list view.
///
/// Filters are handed to the repository untouched; only the pagination fields are normalised here.
/// [`ApplicationQuery::matches`] is the reference filter used by the in-memory stores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ApplicationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_to: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,
}

impl ApplicationQuery {
    /// Resolve the page window, clamping to the configured limits.
    pub fn normalized(mut self, limits: PageLimits) -> Self {
        self.page = Some(self.page.unwrap_or(1).max(1));
        self.page_size = Some(
            self.page_size
                .unwrap_or(limits.default_page_size)
                .clamp(1, limits.max_page_size.max(1)),
        );
        self
    }

    pub fn page(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    pub fn page_size(&self) -> usize {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1)
    }

    /// Number of items to skip before the requested page.
    pub fn offset(&self) -> usize {
        (self.page() - 1).saturating_mul(self.page_size())
    }

    /// Case-insensitive search over name, passport and outlet; exact nationality and status;
    /// inclusive submission date range.
    pub fn matches(&self, application: &Application) -> bool {
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            let applicant = &application.applicant;
            let hit = [
                &applicant.full_name,
                &applicant.passport_number,
                &applicant.media_outlet,
            ]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        if let Some(nationality) = self
            .nationality
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            if !application
                .applicant
                .nationality
                .eq_ignore_ascii_case(nationality)
            {
                return false;
            }
        }

        if self.status.is_some_and(|status| status != application.status) {
            return false;
        }

        let submitted = application.created_at.date_naive();
        if self.submitted_from.is_some_and(|from| submitted < from) {
            return false;
        }
        if self.submitted_to.is_some_and(|to| submitted > to) {
            return false;
        }

        true
    }
}

/// Page-size dials sourced from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

/// One page of a filtered collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
}

impl<T> Page<T> {
    /// Slice an already-filtered collection according to `query`.
    pub fn from_filtered(items: Vec<T>, query: &ApplicationQuery) -> Self {
        let total = items.len();
        let items = items
            .into_iter()
            .skip(query.offset())
            .take(query.page_size())
            .collect();
        Self {
            items,
            page: query.page(),
            page_size: query.page_size(),
            total,
        }
    }

    pub fn total_pages(&self) -> usize {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(self.page_size)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total: self.total,
        }
    }
}
