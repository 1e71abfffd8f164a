use serde::Serialize;

use crate::db::models::{PaginatedResponse, Pagination};

pub mod accounts;
pub mod auth;
pub mod forums;
pub mod jobs;
pub mod learning_paths;
pub mod mentorship;
pub mod progress;
pub mod resources;

/// Plain acknowledgement body for actions with nothing else to return.
#[derive(Debug, Serialize)]
pub struct Detail {
    pub detail: &'static str,
}

impl Detail {
    pub const fn new(detail: &'static str) -> Self {
        Self { detail }
    }
}

pub fn page<T>((items, total): (Vec<T>, i64), pagination: &Pagination) -> PaginatedResponse<T> {
    PaginatedResponse::new(items, total, pagination.limit(), pagination.page())
}
