//! Shared query types

use serde::Deserialize;

use crate::api::validation::{FieldError, Validate, Validator};
use crate::models::pagination::{DEFAULT_LIMIT, MAX_LIMIT};
use crate::models::ListParams;

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

fn check_page(v: &mut Validator, page: u32, limit: u32) {
    v.check(page >= 1, "page", "page must be at least 1");
    v.check(
        (1..=MAX_LIMIT).contains(&limit),
        "limit",
        "limit must be between 1 and 100",
    );
}

/// `?page=&limit=`
#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl PaginationQuery {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.limit)
    }
}

impl Validate for PaginationQuery {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut v = Validator::new();
        check_page(&mut v, self.page, self.limit);
        v.finish()
    }
}

/// Product listing filters plus pagination
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category_slug: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl ProductQuery {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.limit)
    }
}

impl Validate for ProductQuery {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut v = Validator::new();
        check_page(&mut v, self.page, self.limit);
        v.optional_length("search", self.search.as_deref(), 0, 200);
        v.finish()
    }
}
