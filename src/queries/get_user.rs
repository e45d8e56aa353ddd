//! GetUser query
//!
//! Fetches current user state from the read model.

use uuid::Uuid;

use crate::read_model::{ReadModel, UserRow};

pub struct GetUserQuery {
    read_model: ReadModel,
}

impl GetUserQuery {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self {
            read_model: ReadModel::new(pool),
        }
    }

    pub async fn execute(&self, user_id: Uuid) -> Result<Option<UserRow>, sqlx::Error> {
        self.read_model.get_user(user_id).await
    }
}
