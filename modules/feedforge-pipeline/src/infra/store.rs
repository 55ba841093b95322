// Postgres persistence for published items and narratives.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use feedforge_common::{ContentItem, Narrative};

use crate::traits::ItemStore;

pub struct PgStore {
    pool: PgPool,
}

/// A row from the content_items table.
#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    source_url: String,
    source_name: String,
    title: Option<String>,
    raw_text: String,
    cleaned_text: Option<String>,
    tags: Option<Json<Vec<String>>>,
    embedding: Option<Json<Vec<f32>>>,
    summary: Option<String>,
    publish_snippet: Option<String>,
    published_at: Option<DateTime<Utc>>,
    ingested_at: DateTime<Utc>,
}

impl From<ItemRow> for ContentItem {
    fn from(row: ItemRow) -> Self {
        ContentItem {
            id: row.id,
            source_url: row.source_url,
            source_name: row.source_name,
            title: row.title,
            raw_text: row.raw_text,
            cleaned_text: row.cleaned_text,
            tags: row.tags.map(|t| t.0),
            embedding: row.embedding.map(|e| e.0),
            summary: row.summary,
            publish_snippet: row.publish_snippet,
            published_at: row.published_at,
            ingested_at: row.ingested_at,
            excluded: None,
            last_verdict: None,
        }
    }
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables on first run. Idempotent.
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS content_items (
                id UUID PRIMARY KEY,
                source_url TEXT NOT NULL UNIQUE,
                source_name TEXT NOT NULL,
                title TEXT,
                raw_text TEXT NOT NULL,
                cleaned_text TEXT,
                tags JSONB,
                embedding JSONB,
                summary TEXT,
                publish_snippet TEXT,
                published_at TIMESTAMPTZ,
                ingested_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS narratives (
                id UUID PRIMARY KEY,
                tag TEXT NOT NULL,
                body TEXT NOT NULL,
                member_ids JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ItemStore for PgStore {
    async fn recent_items(&self, days: i64) -> Result<Vec<ContentItem>> {
        let cutoff = Utc::now() - Duration::days(days);
        let rows = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT * FROM content_items
            WHERE ingested_at >= $1
            ORDER BY ingested_at DESC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ContentItem::from).collect())
    }

    async fn persist_items(&self, items: &[ContentItem]) -> Result<()> {
        // Re-crawls of the same URL update in place rather than piling up.
        for item in items {
            sqlx::query(
                r#"
                INSERT INTO content_items
                    (id, source_url, source_name, title, raw_text, cleaned_text,
                     tags, embedding, summary, publish_snippet, published_at,
                     ingested_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                ON CONFLICT (source_url) DO UPDATE SET
                    title = EXCLUDED.title,
                    cleaned_text = EXCLUDED.cleaned_text,
                    tags = EXCLUDED.tags,
                    embedding = EXCLUDED.embedding,
                    summary = EXCLUDED.summary,
                    publish_snippet = EXCLUDED.publish_snippet,
                    ingested_at = EXCLUDED.ingested_at
                "#,
            )
            .bind(item.id)
            .bind(&item.source_url)
            .bind(&item.source_name)
            .bind(&item.title)
            .bind(&item.raw_text)
            .bind(&item.cleaned_text)
            .bind(item.tags.as_ref().map(Json))
            .bind(item.embedding.as_ref().map(Json))
            .bind(&item.summary)
            .bind(&item.publish_snippet)
            .bind(item.published_at)
            .bind(item.ingested_at)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn persist_narrative(&self, narrative: &Narrative) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO narratives (id, tag, body, member_ids, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(narrative.id)
        .bind(&narrative.tag)
        .bind(&narrative.body)
        .bind(Json(&narrative.member_ids))
        .bind(narrative.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn prune(&self, days: i64) -> Result<u64> {
        let cutoff = Utc::now() - Duration::days(days);
        let result = sqlx::query("DELETE FROM content_items WHERE ingested_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
