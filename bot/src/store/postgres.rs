//! Postgres-backed document store.
//!
//! All guilds share one `documents` table; each row carries the guild id and
//! the logical table name, and the record itself lives in a JSONB column.
//! Filters become JSONB containment (`doc @> filter`).

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;

use super::document::{Document, DocumentStore, Filter};
use crate::error::StorageError;
use crate::types::TenantId;

/// Logical store for one guild inside the shared `documents` table.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    tenant: TenantId,
}

impl PgStore {
    pub fn new(pool: PgPool, tenant: TenantId) -> Self {
        Self { pool, tenant }
    }

    const fn tenant_key(&self) -> i64 {
        self.tenant.0 as i64
    }
}

/// Guild ids that own at least one document.
pub(super) async fn known_tenants(pool: &PgPool) -> Result<Vec<TenantId>, StorageError> {
    let rows: Vec<(i64,)> =
        sqlx::query_as("SELECT DISTINCT tenant_id FROM documents ORDER BY tenant_id")
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(id,)| TenantId(id as u64)).collect())
}

#[async_trait]
impl DocumentStore for PgStore {
    #[tracing::instrument(skip(self), fields(tenant = %self.tenant))]
    async fn all(&self, table: &str) -> Result<Vec<Document>, StorageError> {
        let rows: Vec<(Json<Document>,)> = sqlx::query_as(
            "SELECT doc FROM documents WHERE tenant_id = $1 AND table_name = $2 ORDER BY id",
        )
        .bind(self.tenant_key())
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(Json(doc),)| doc).collect())
    }

    #[tracing::instrument(skip(self), fields(tenant = %self.tenant))]
    async fn search(&self, table: &str, filter: &Filter) -> Result<Vec<Document>, StorageError> {
        let rows: Vec<(Json<Document>,)> = sqlx::query_as(
            r"
            SELECT doc FROM documents
            WHERE tenant_id = $1 AND table_name = $2 AND doc @> $3
            ORDER BY id
            ",
        )
        .bind(self.tenant_key())
        .bind(table)
        .bind(Json(filter.to_document()))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(Json(doc),)| doc).collect())
    }

    #[tracing::instrument(skip(self, doc), fields(tenant = %self.tenant))]
    async fn upsert(
        &self,
        table: &str,
        doc: Document,
        filter: &Filter,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r"
            UPDATE documents SET doc = doc || $4
            WHERE tenant_id = $1 AND table_name = $2 AND doc @> $3
            ",
        )
        .bind(self.tenant_key())
        .bind(table)
        .bind(Json(filter.to_document()))
        .bind(Json(&doc))
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            sqlx::query("INSERT INTO documents (tenant_id, table_name, doc) VALUES ($1, $2, $3)")
                .bind(self.tenant_key())
                .bind(table)
                .bind(Json(&doc))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(tenant = %self.tenant))]
    async fn remove(&self, table: &str, filter: &Filter) -> Result<u64, StorageError> {
        let removed = sqlx::query(
            "DELETE FROM documents WHERE tenant_id = $1 AND table_name = $2 AND doc @> $3",
        )
        .bind(self.tenant_key())
        .bind(table)
        .bind(Json(filter.to_document()))
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(removed)
    }
}
