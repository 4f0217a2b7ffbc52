pub mod auth;
pub mod budgets;
pub mod cart;
pub mod catalog;
pub mod company;
pub mod dashboard;
pub mod files;
pub mod notifications;
pub mod purchases;
pub mod users;

use serde::Deserialize;

use crate::config;

/// Common `?page=&limit=` query, clamped to the configured bounds.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageQuery {
    pub fn resolve(&self) -> (i64, i64) {
        let api = &config::config().api;
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(api.default_page_limit)
            .clamp(1, api.max_page_limit);
        (page, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_and_limit_are_clamped() {
        let q = PageQuery {
            page: Some(0),
            limit: Some(10_000),
        };
        let (page, limit) = q.resolve();
        assert_eq!(page, 1);
        assert_eq!(limit, config::config().api.max_page_limit);
    }

    #[test]
    fn defaults_apply_when_absent() {
        let (page, limit) = PageQuery::default().resolve();
        assert_eq!(page, 1);
        assert_eq!(limit, config::config().api.default_page_limit);
    }
}
