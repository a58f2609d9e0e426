use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{Connection, PgConnection};
use tracing::debug;

use crate::error::SinkError;
use crate::types::{InteractionKind, NormalizedInteraction, UploadBatch};

/// Destination for normalized interactions.
///
/// Writes are not deduplicated: delivering the same event twice stores it twice.
#[async_trait]
pub trait InteractionSink: Send {
    /// Insert a whole batch, one bulk insert per destination table, committed once at the end.
    /// Nothing is stored if any part of it fails.
    async fn insert_batch(&mut self, batch: &UploadBatch) -> Result<(), SinkError>;

    /// Insert a single interaction and commit it immediately.
    async fn insert_one(&mut self, interaction: &NormalizedInteraction) -> Result<(), SinkError>;
}

/// Writes interactions over the single connection owned by an ingestion session.
pub struct PgSink {
    conn: PgConnection,
}

impl PgSink {
    pub fn new(conn: PgConnection) -> Self {
        Self { conn }
    }

    pub fn connection(&mut self) -> &mut PgConnection {
        &mut self.conn
    }

    /// Gracefully close the connection. Dropping the sink also closes it, just less politely.
    pub async fn close(self) -> Result<(), sqlx::Error> {
        self.conn.close().await
    }
}

fn batch_insert_query(kind: InteractionKind) -> &'static str {
    match kind {
        InteractionKind::Rating => {
            r#"
INSERT INTO rating_interaction
    (event_at, rating_id, exhibition_id)
SELECT * FROM UNNEST($1::timestamp[], $2::int[], $3::int[])
            "#
        }
        InteractionKind::Request => {
            r#"
INSERT INTO request_interaction
    (event_at, request_id, exhibition_id)
SELECT * FROM UNNEST($1::timestamp[], $2::int[], $3::int[])
            "#
        }
    }
}

fn single_insert_query(kind: InteractionKind) -> &'static str {
    match kind {
        InteractionKind::Rating => {
            r#"
INSERT INTO rating_interaction
    (event_at, rating_id, exhibition_id)
VALUES
    ($1, $2::int, $3::int)
            "#
        }
        InteractionKind::Request => {
            r#"
INSERT INTO request_interaction
    (event_at, request_id, exhibition_id)
VALUES
    ($1, $2::int, $3::int)
            "#
        }
    }
}

async fn insert_rows(
    conn: &mut PgConnection,
    kind: InteractionKind,
    rows: &[NormalizedInteraction],
) -> Result<(), SinkError> {
    if rows.is_empty() {
        return Ok(());
    }

    let mut event_ats: Vec<NaiveDateTime> = Vec::with_capacity(rows.len());
    let mut value_ids: Vec<i32> = Vec::with_capacity(rows.len());
    let mut exhibition_ids: Vec<i32> = Vec::with_capacity(rows.len());
    for row in rows {
        event_ats.push(row.event_at);
        value_ids.push(row.value_id);
        exhibition_ids.push(row.exhibition_id);
    }

    let result = sqlx::query(batch_insert_query(kind))
        .bind(&event_ats)
        .bind(&value_ids)
        .bind(&exhibition_ids)
        .execute(&mut *conn)
        .await
        .map_err(|error| SinkError::from_sqlx("INSERT", kind.table(), error))?;

    debug!(
        table = kind.table(),
        rows = result.rows_affected(),
        "bulk inserted interactions"
    );

    Ok(())
}

#[async_trait]
impl InteractionSink for PgSink {
    async fn insert_batch(&mut self, batch: &UploadBatch) -> Result<(), SinkError> {
        let mut tx = self
            .conn
            .begin()
            .await
            .map_err(|error| SinkError::from_sqlx("BEGIN", "interactions", error))?;

        insert_rows(&mut tx, InteractionKind::Rating, &batch.ratings).await?;
        insert_rows(&mut tx, InteractionKind::Request, &batch.requests).await?;

        tx.commit()
            .await
            .map_err(|error| SinkError::from_sqlx("COMMIT", "interactions", error))?;

        Ok(())
    }

    async fn insert_one(&mut self, interaction: &NormalizedInteraction) -> Result<(), SinkError> {
        // Outside an explicit transaction every statement commits on its own.
        sqlx::query(single_insert_query(interaction.kind))
            .bind(interaction.event_at)
            .bind(interaction.value_id)
            .bind(interaction.exhibition_id)
            .execute(&mut self.conn)
            .await
            .map_err(|error| SinkError::from_sqlx("INSERT", interaction.kind.table(), error))?;

        Ok(())
    }
}
