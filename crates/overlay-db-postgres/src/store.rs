//! PostgreSQL implementation of [`OverrideStore`].

use async_trait::async_trait;
use overlay_core::{OverrideRecord, UserId};
use overlay_storage::{OverrideStore, StorageError};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::PgPool;
use tracing::{debug, instrument};

use crate::config::PostgresConfig;
use crate::error::{PostgresError, Result};
use crate::{migrations, pool};

/// Row shape shared by the select queries.
type OverrideRow = (String, i32, Option<String>, String);

// Byte-wise collation keeps the tie-break identical to `overlay_core::precedence_cmp`.
const SELECT_FOR_USER: &str = r#"
    SELECT user_id, priority, override_name, override_dir
    FROM user_template_override
    WHERE user_id = $1
    ORDER BY priority ASC,
             override_dir COLLATE "C" ASC,
             override_name COLLATE "C" ASC NULLS LAST
"#;

const SELECT_ALL: &str = r#"
    SELECT user_id, priority, override_name, override_dir
    FROM user_template_override
    ORDER BY user_id COLLATE "C" ASC,
             priority ASC,
             override_dir COLLATE "C" ASC,
             override_name COLLATE "C" ASC NULLS LAST
"#;

/// Override store backed by the `user_template_override` table.
#[derive(Clone)]
pub struct PostgresOverrideStore {
    pool: PgPool,
}

impl PostgresOverrideStore {
    /// Wraps an existing pool. Migrations are not run.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a pool from `config` and runs migrations if enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be created or a migration fails.
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let pool = pool::create_pool(config).await?;
        if config.run_migrations {
            migrations::run(&pool).await?;
        }
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Inserts a record, returning its row id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn insert(&self, record: &OverrideRecord) -> Result<i64> {
        let id: i64 = query_scalar(
            r#"
            INSERT INTO user_template_override (user_id, priority, override_name, override_dir)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(record.user_id.as_str())
        .bind(record.priority)
        .bind(record.override_name.as_deref())
        .bind(record.override_dir.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Deletes every record owned by `user_id`, returning the number removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete_for_user(&self, user_id: &UserId) -> Result<u64> {
        let result = query("DELETE FROM user_template_override WHERE user_id = $1")
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn fetch(
        &self,
        sql: &'static str,
        user_id: Option<&UserId>,
    ) -> Result<Vec<OverrideRecord>> {
        let mut q = query_as::<sqlx_postgres::Postgres, OverrideRow>(sql);
        if let Some(user_id) = user_id {
            q = q.bind(user_id.as_str());
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_record).collect()
    }
}

fn row_to_record(
    (user_id, priority, override_name, override_dir): OverrideRow,
) -> Result<OverrideRecord> {
    if user_id.is_empty() {
        return Err(PostgresError::invalid_row("user_id must not be empty"));
    }
    Ok(OverrideRecord {
        user_id: UserId::new(user_id),
        priority,
        override_name,
        override_dir,
    })
}

#[async_trait]
impl OverrideStore for PostgresOverrideStore {
    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn find_overrides_for_user(
        &self,
        user_id: &UserId,
    ) -> std::result::Result<Vec<OverrideRecord>, StorageError> {
        let records = self.fetch(SELECT_FOR_USER, Some(user_id)).await?;
        debug!(count = records.len(), "loaded overrides");
        Ok(records)
    }

    #[instrument(skip(self))]
    async fn list_overrides(&self) -> std::result::Result<Vec<OverrideRecord>, StorageError> {
        Ok(self.fetch(SELECT_ALL, None).await?)
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
