use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::repo_types::{Role, User};

pub const DEFAULT_PAGE_LIMIT: i64 = 10;
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Public part of the user returned to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            role: u.role,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl Pagination {
    /// Page numbers start at 1; anything lower is treated as the first page.
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersPage {
    pub items: Vec<PublicUser>,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
    pub total_count: i64,
}

impl UsersPage {
    pub fn new(items: Vec<PublicUser>, pagination: &Pagination, total_count: i64) -> Self {
        let limit = pagination.limit();
        Self {
            items,
            page: pagination.page(),
            limit,
            total_pages: (total_count + limit - 1) / limit,
            total_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: &'static str,
    pub id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_and_clamps() {
        let p = Pagination::default();
        assert_eq!((p.page(), p.limit(), p.offset()), (1, 10, 0));

        let p = Pagination { page: Some(0), limit: Some(1000) };
        assert_eq!((p.page(), p.limit()), (1, MAX_PAGE_LIMIT));

        let p = Pagination { page: Some(3), limit: Some(0) };
        assert_eq!((p.page(), p.limit(), p.offset()), (3, 1, 2));

        let p = Pagination { page: Some(i64::MAX), limit: Some(50) };
        assert_eq!(p.offset(), i64::MAX);
    }

    #[test]
    fn total_pages_rounds_up() {
        let p = Pagination { page: Some(1), limit: Some(10) };
        assert_eq!(UsersPage::new(vec![], &p, 0).total_pages, 0);
        assert_eq!(UsersPage::new(vec![], &p, 10).total_pages, 1);
        assert_eq!(UsersPage::new(vec![], &p, 11).total_pages, 2);
    }

    #[test]
    fn page_serializes_camel_case() {
        let p = Pagination::default();
        let json = serde_json::to_value(UsersPage::new(vec![], &p, 3)).unwrap();
        assert_eq!(json["totalPages"], 1);
        assert_eq!(json["totalCount"], 3);
        assert!(json["items"].as_array().unwrap().is_empty());
    }
}
