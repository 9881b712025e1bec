use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    ChangeEvent, ChangeFeed, OperatorId, Result, Revision, StoreError, Ticket, TicketId,
    TicketMutation, TicketQuery, TicketStatus,
    store::{TicketStore, next_record, validate_for_create},
};

const TICKET_COLUMNS: &str =
    "id, name, description, status, created_at, used_at, used_by, revision";

/// PostgreSQL-backed ticket store.
///
/// Compare-and-set is a single `UPDATE ... WHERE revision = $expected`, so it
/// stays atomic per key across any number of processes sharing the database.
/// Change events only reach subscribers attached to this process's feed.
#[derive(Clone)]
pub struct PostgresTicketStore {
    pool: PgPool,
    feed: ChangeFeed,
}

impl PostgresTicketStore {
    /// Creates a new PostgreSQL ticket store.
    pub fn new(pool: PgPool) -> Self {
        Self::with_feed(pool, ChangeFeed::new())
    }

    /// Creates a store publishing to an existing feed.
    pub fn with_feed(pool: PgPool, feed: ChangeFeed) -> Self {
        Self { pool, feed }
    }

    /// Connects to `database_url` and creates a store.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_ticket(row: PgRow) -> Result<Ticket> {
        let status: String = row.try_get("status")?;
        let status: TicketStatus = status
            .parse()
            .map_err(|e: crate::ParseStatusError| StoreError::InvalidRecord(e.to_string()))?;

        Ok(Ticket {
            id: TicketId::new(row.try_get::<String, _>("id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            status,
            created_at: row.try_get("created_at")?,
            used_at: row.try_get("used_at")?,
            used_by: row
                .try_get::<Option<String>, _>("used_by")?
                .map(OperatorId::new),
            revision: Revision::new(row.try_get("revision")?),
        })
    }

    async fn current_revision(&self, id: &TicketId) -> Result<Option<Revision>> {
        let revision: Option<i64> =
            sqlx::query_scalar("SELECT revision FROM tickets WHERE id = $1")
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        Ok(revision.map(Revision::new))
    }
}

#[async_trait]
impl TicketStore for PostgresTicketStore {
    async fn get(&self, id: &TicketId) -> Result<Ticket> {
        let row = sqlx::query(&format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Self::row_to_ticket(row),
            None => Err(StoreError::NotFound(id.clone())),
        }
    }

    async fn create(&self, ticket: Ticket) -> Result<Ticket> {
        validate_for_create(&ticket)?;

        sqlx::query(
            r#"
            INSERT INTO tickets (id, name, description, status, created_at, used_at, used_by, revision)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(ticket.id.as_str())
        .bind(&ticket.name)
        .bind(&ticket.description)
        .bind(ticket.status.as_str())
        .bind(ticket.created_at)
        .bind(ticket.used_at)
        .bind(ticket.used_by.as_ref().map(|o| o.as_str()))
        .bind(ticket.revision.as_i64())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::AlreadyExists(ticket.id.clone());
            }
            StoreError::Transport(e)
        })?;

        self.feed.publish(ChangeEvent::created(ticket.clone()));
        Ok(ticket)
    }

    async fn conditional_update(
        &self,
        id: &TicketId,
        expected: Revision,
        mutation: TicketMutation,
    ) -> Result<Ticket> {
        let current = self.get(id).await?;
        if current.revision != expected {
            return Err(StoreError::RevisionConflict {
                id: id.clone(),
                expected,
                actual: current.revision,
            });
        }

        let next = next_record(&current, &mutation);

        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET status = $3, used_at = $4, used_by = $5, revision = $6
            WHERE id = $1 AND revision = $2
            "#,
        )
        .bind(id.as_str())
        .bind(expected.as_i64())
        .bind(next.status.as_str())
        .bind(next.used_at)
        .bind(next.used_by.as_ref().map(|o| o.as_str()))
        .bind(next.revision.as_i64())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Someone else's write landed between our read and our update.
            let actual = self
                .current_revision(id)
                .await?
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            return Err(StoreError::RevisionConflict {
                id: id.clone(),
                expected,
                actual,
            });
        }

        self.feed.publish(ChangeEvent::updated(next.clone()));
        Ok(next)
    }

    async fn list(&self, query: TicketQuery) -> Result<Vec<Ticket>> {
        let mut sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic query
        if query.prefix.is_some() {
            param_count += 1;
            sql.push_str(&format!(
                " AND left(id, char_length(${param_count})) = ${param_count}"
            ));
        }
        if query.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ${param_count}"));
        }

        sql.push_str(" ORDER BY created_at ASC, id ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(prefix) = query.prefix {
            sqlx_query = sqlx_query.bind(prefix);
        }
        if let Some(status) = query.status {
            sqlx_query = sqlx_query.bind(status.as_str());
        }
        // Past i64::MAX no row can match, so saturate instead of wrapping negative.
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(i64::try_from(offset).unwrap_or(i64::MAX));
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_ticket).collect()
    }

    fn feed(&self) -> &ChangeFeed {
        &self.feed
    }
}
