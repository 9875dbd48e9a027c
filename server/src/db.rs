//! Storage layer: thin sqlx wrappers over the chat tables.
//!
//! Persistence is deliberately dumb — every function is a single query (or
//! one transaction) with no business logic. Routing decisions never live
//! here.

use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use uuid::Uuid;

use crate::models::{GroupChat, GroupMessage, Message};

pub type DbPool = PgPool;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/bazaar".to_string()),
            max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50),
            min_connections: 2,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

/// Initialize database connection pool with configuration
pub async fn init_db(config: DbConfig) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    Ok(pool)
}

/// Initialize database with default configuration
pub async fn init_db_default() -> Result<DbPool> {
    init_db(DbConfig::default()).await
}

// Direct messages

pub async fn insert_message(
    pool: &DbPool,
    sender_id: &str,
    receiver_id: &str,
    body: &str,
) -> Result<Message> {
    sqlx::query_as::<_, Message>(
        "INSERT INTO messages (id, sender_id, receiver_id, body, seen, sent_at)
         VALUES ($1, $2, $3, $4, FALSE, NOW())
         RETURNING *",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(sender_id)
    .bind(receiver_id)
    .bind(body)
    .fetch_one(pool)
    .await
    .context("Failed to insert message")
}

pub async fn list_messages_between(
    pool: &DbPool,
    user_a: &str,
    user_b: &str,
    limit: i64,
) -> Result<Vec<Message>> {
    sqlx::query_as::<_, Message>(
        "SELECT * FROM messages
         WHERE (sender_id = $1 AND receiver_id = $2)
            OR (sender_id = $2 AND receiver_id = $1)
         ORDER BY sent_at DESC
         LIMIT $3",
    )
    .bind(user_a)
    .bind(user_b)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to list messages")
}

/// Mark every unseen message from `counterpart_id` to `reader_id` as seen.
/// Returns the number of rows touched.
pub async fn mark_messages_seen(
    pool: &DbPool,
    reader_id: &str,
    counterpart_id: &str,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE messages SET seen = TRUE
         WHERE sender_id = $1 AND receiver_id = $2 AND seen = FALSE",
    )
    .bind(counterpart_id)
    .bind(reader_id)
    .execute(pool)
    .await
    .context("Failed to mark messages seen")?;
    Ok(result.rows_affected())
}

/// Fetch messages by id, restricted to conversations `user_id` is part of.
/// Used to derive the propagation audience before a delete.
pub async fn get_messages_for_user(
    pool: &DbPool,
    message_ids: &[String],
    user_id: &str,
) -> Result<Vec<Message>> {
    sqlx::query_as::<_, Message>(
        "SELECT * FROM messages
         WHERE id = ANY($1) AND (sender_id = $2 OR receiver_id = $2)",
    )
    .bind(message_ids)
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to fetch messages by id")
}

pub async fn delete_messages(pool: &DbPool, message_ids: &[String]) -> Result<u64> {
    let result = sqlx::query("DELETE FROM messages WHERE id = ANY($1)")
        .bind(message_ids)
        .execute(pool)
        .await
        .context("Failed to delete messages")?;
    Ok(result.rows_affected())
}

/// Update a message body; only the sender may edit. Returns the updated row,
/// or `None` if no such message belongs to the editor.
pub async fn update_message_body(
    pool: &DbPool,
    message_id: &str,
    editor_id: &str,
    body: &str,
) -> Result<Option<Message>> {
    sqlx::query_as::<_, Message>(
        "UPDATE messages SET body = $1, edited_at = NOW()
         WHERE id = $2 AND sender_id = $3
         RETURNING *",
    )
    .bind(body)
    .bind(message_id)
    .bind(editor_id)
    .fetch_optional(pool)
    .await
    .context("Failed to update message")
}

// Group chats

pub async fn create_group(
    pool: &DbPool,
    seller_id: &str,
    name: &str,
    member_ids: &[String],
) -> Result<GroupChat> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let group = sqlx::query_as::<_, GroupChat>(
        "INSERT INTO group_chats (id, seller_id, name, created_at, updated_at)
         VALUES ($1, $2, $3, NOW(), NOW())
         RETURNING *",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(seller_id)
    .bind(name)
    .fetch_one(&mut *tx)
    .await
    .context("Failed to create group")?;

    for member_id in member_ids {
        sqlx::query(
            "INSERT INTO group_members (group_id, user_id, added_at)
             VALUES ($1, $2, NOW())
             ON CONFLICT (group_id, user_id) DO NOTHING",
        )
        .bind(&group.id)
        .bind(member_id)
        .execute(&mut *tx)
        .await
        .context("Failed to add group member")?;
    }

    tx.commit().await.context("Failed to commit transaction")?;
    Ok(group)
}

pub async fn get_group(pool: &DbPool, group_id: &str) -> Result<Option<GroupChat>> {
    sqlx::query_as::<_, GroupChat>("SELECT * FROM group_chats WHERE id = $1")
        .bind(group_id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch group")
}

pub async fn list_groups_for(pool: &DbPool, user_id: &str) -> Result<Vec<GroupChat>> {
    sqlx::query_as::<_, GroupChat>(
        "SELECT g.* FROM group_chats g
         INNER JOIN group_members m ON g.id = m.group_id
         WHERE m.user_id = $1 OR g.seller_id = $1
         ORDER BY g.updated_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list groups")
}

/// Persisted membership — distinct from the session-scoped live subscriber
/// set the realtime layer tracks.
pub async fn group_member_ids(pool: &DbPool, group_id: &str) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>("SELECT user_id FROM group_members WHERE group_id = $1")
        .bind(group_id)
        .fetch_all(pool)
        .await
        .context("Failed to list group members")
}

pub async fn is_group_member(pool: &DbPool, user_id: &str, group_id: &str) -> Result<bool> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(
             SELECT 1 FROM group_members WHERE group_id = $1 AND user_id = $2
             UNION
             SELECT 1 FROM group_chats WHERE id = $1 AND seller_id = $2
         )",
    )
    .bind(group_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
    .context("Failed to check group membership")
}

pub async fn update_group_members(
    pool: &DbPool,
    group_id: &str,
    add: &[String],
    remove: &[String],
) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    for member_id in add {
        sqlx::query(
            "INSERT INTO group_members (group_id, user_id, added_at)
             VALUES ($1, $2, NOW())
             ON CONFLICT (group_id, user_id) DO NOTHING",
        )
        .bind(group_id)
        .bind(member_id)
        .execute(&mut *tx)
        .await
        .context("Failed to add group member")?;
    }

    if !remove.is_empty() {
        sqlx::query("DELETE FROM group_members WHERE group_id = $1 AND user_id = ANY($2)")
            .bind(group_id)
            .bind(remove)
            .execute(&mut *tx)
            .await
            .context("Failed to remove group members")?;
    }

    sqlx::query("UPDATE group_chats SET updated_at = NOW() WHERE id = $1")
        .bind(group_id)
        .execute(&mut *tx)
        .await
        .context("Failed to touch group")?;

    tx.commit().await.context("Failed to commit transaction")
}

/// Advance the reader's group read marker. Returns the number of rows
/// touched (zero for a non-member).
pub async fn mark_group_read(pool: &DbPool, group_id: &str, reader_id: &str) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE group_members SET last_read_at = NOW()
         WHERE group_id = $1 AND user_id = $2",
    )
    .bind(group_id)
    .bind(reader_id)
    .execute(pool)
    .await
    .context("Failed to update group read marker")?;
    Ok(result.rows_affected())
}

// Group messages

pub async fn insert_group_message(
    pool: &DbPool,
    group_id: &str,
    sender_id: &str,
    body: &str,
) -> Result<GroupMessage> {
    sqlx::query_as::<_, GroupMessage>(
        "INSERT INTO group_messages (id, group_id, sender_id, body, sent_at)
         VALUES ($1, $2, $3, $4, NOW())
         RETURNING *",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(group_id)
    .bind(sender_id)
    .bind(body)
    .fetch_one(pool)
    .await
    .context("Failed to insert group message")
}

pub async fn list_group_messages(
    pool: &DbPool,
    group_id: &str,
    limit: i64,
) -> Result<Vec<GroupMessage>> {
    sqlx::query_as::<_, GroupMessage>(
        "SELECT * FROM group_messages
         WHERE group_id = $1
         ORDER BY sent_at DESC
         LIMIT $2",
    )
    .bind(group_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to list group messages")
}

/// Delete group messages authored by `sender_id`. Returns the ids actually
/// deleted.
pub async fn delete_group_messages(
    pool: &DbPool,
    group_id: &str,
    message_ids: &[String],
    sender_id: &str,
) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        "DELETE FROM group_messages
         WHERE group_id = $1 AND id = ANY($2) AND sender_id = $3
         RETURNING id",
    )
    .bind(group_id)
    .bind(message_ids)
    .bind(sender_id)
    .fetch_all(pool)
    .await
    .context("Failed to delete group messages")
}

pub async fn update_group_message_body(
    pool: &DbPool,
    message_id: &str,
    editor_id: &str,
    body: &str,
) -> Result<Option<GroupMessage>> {
    sqlx::query_as::<_, GroupMessage>(
        "UPDATE group_messages SET body = $1, edited_at = NOW()
         WHERE id = $2 AND sender_id = $3
         RETURNING *",
    )
    .bind(body)
    .bind(message_id)
    .bind(editor_id)
    .fetch_optional(pool)
    .await
    .context("Failed to update group message")
}

// Push tokens

pub async fn push_tokens_for(pool: &DbPool, user_id: &str) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>("SELECT token FROM device_tokens WHERE user_id = $1")
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to list device tokens")
}
