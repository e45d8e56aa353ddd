//! ListUsers query
//!
//! Paginated listing over the read model.

use crate::read_model::{ListUsersOptions, ReadModel, UserRow};

/// A page of matching rows alongside the total count across all pages,
/// since `count` in the response reflects every matching row, not just
/// the ones returned on this page.
pub struct UserPage {
    pub rows: Vec<UserRow>,
    pub total: i64,
}

pub struct ListUsersQuery {
    read_model: ReadModel,
}

impl ListUsersQuery {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self {
            read_model: ReadModel::new(pool),
        }
    }

    pub async fn execute(&self, options: &ListUsersOptions) -> Result<UserPage, sqlx::Error> {
        let rows = self.read_model.list_users(options).await?;
        let total = self.read_model.count_users(options).await?;
        Ok(UserPage { rows, total })
    }
}
