//! HTTP request handlers

use serde::Deserialize;
use shared::Pagination;

mod auth;
mod certificate;
mod coach;
mod collaborator;
mod course;
mod epp;
mod health;
mod inspection;
mod location;
mod reporting;
mod training;
mod user;

pub use auth::*;
pub use certificate::*;
pub use coach::*;
pub use collaborator::*;
pub use course::*;
pub use epp::*;
pub use health::*;
pub use inspection::*;
pub use location::*;
pub use reporting::*;
pub use training::*;
pub use user::*;

/// `page` / `per_page` query parameters shared by list endpoints
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::from_query(self.page, self.per_page)
    }
}
