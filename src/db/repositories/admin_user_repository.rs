use crate::db::connection::DbPool;
use crate::db::models::AdminUser;
use sqlx::Error;
use uuid::Uuid;

pub async fn get_admin_user(pool: &DbPool, username: &str) -> Result<Option<AdminUser>, Error> {
    sqlx::query_as::<_, AdminUser>(
        "SELECT id, username, password_hash, created_at FROM admin_users WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await
}

pub async fn get_admin_user_by_id(pool: &DbPool, user_id: Uuid) -> Result<Option<AdminUser>, Error> {
    sqlx::query_as::<_, AdminUser>(
        "SELECT id, username, password_hash, created_at FROM admin_users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn create_admin_user(
    pool: &DbPool,
    username: &str,
    password_hash: &str,
) -> Result<AdminUser, Error> {
    sqlx::query_as::<_, AdminUser>(
        "INSERT INTO admin_users (id, username, password_hash) VALUES ($1, $2, $3) RETURNING id, username, password_hash, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(username)
    .bind(password_hash)
    .fetch_one(pool)
    .await
}
