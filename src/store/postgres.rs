//! Postgres-backed store.
//!
//! Counter moves are guarded inside the UPDATE itself, so two concurrent
//! allocations can never push an instance past capacity regardless of
//! interleaving. Binding writes and counter moves share one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::models::{Instance, TenantBinding};
use super::{GatewayStore, InsertOutcome, StoreError, TenantDirectory};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GatewayStore for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn list_instances(&self) -> Result<Vec<Instance>, StoreError> {
        let instances = sqlx::query_as::<_, Instance>(
            "SELECT id, base_url, is_active, tenant_count FROM instances ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(instances)
    }

    async fn get_instance(&self, instance_id: i64) -> Result<Option<Instance>, StoreError> {
        let instance = sqlx::query_as::<_, Instance>(
            "SELECT id, base_url, is_active, tenant_count FROM instances WHERE id = $1",
        )
        .bind(instance_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(instance)
    }

    async fn find_available_instance(
        &self,
        capacity: i32,
    ) -> Result<Option<Instance>, StoreError> {
        let instance = sqlx::query_as::<_, Instance>(
            r#"
            SELECT id, base_url, is_active, tenant_count
            FROM instances
            WHERE is_active AND tenant_count < $1
            ORDER BY tenant_count ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(capacity)
        .fetch_optional(&self.pool)
        .await?;
        Ok(instance)
    }

    async fn get_binding(&self, tenant_id: &str) -> Result<Option<TenantBinding>, StoreError> {
        let binding = sqlx::query_as::<_, TenantBinding>(
            "SELECT * FROM tenant_bindings WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(binding)
    }

    async fn list_bindings(&self) -> Result<Vec<TenantBinding>, StoreError> {
        let bindings =
            sqlx::query_as::<_, TenantBinding>("SELECT * FROM tenant_bindings ORDER BY tenant_id")
                .fetch_all(&self.pool)
                .await?;
        Ok(bindings)
    }

    async fn insert_binding(
        &self,
        tenant_id: &str,
        instance_id: i64,
        capacity: i32,
    ) -> Result<InsertOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, TenantBinding>(
            "SELECT * FROM tenant_bindings WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(binding) = existing {
            tx.rollback().await?;
            return Ok(InsertOutcome::AlreadyBound(binding));
        }

        let incremented = sqlx::query(
            r#"
            UPDATE instances
            SET tenant_count = tenant_count + 1
            WHERE id = $1 AND is_active AND tenant_count < $2
            "#,
        )
        .bind(instance_id)
        .bind(capacity)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if incremented == 0 {
            tx.rollback().await?;
            return Ok(InsertOutcome::CapacityRace);
        }

        let inserted = sqlx::query_as::<_, TenantBinding>(
            r#"
            INSERT INTO tenant_bindings (tenant_id, instance_id, connected, created_at, updated_at)
            VALUES ($1, $2, false, NOW(), NOW())
            ON CONFLICT (tenant_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(instance_id)
        .fetch_optional(&mut *tx)
        .await?;

        match inserted {
            Some(binding) => {
                tx.commit().await?;
                Ok(InsertOutcome::Inserted(binding))
            }
            None => {
                // Another writer won the unique-insert race; undo our increment.
                tx.rollback().await?;
                match self.get_binding(tenant_id).await? {
                    Some(binding) => Ok(InsertOutcome::AlreadyBound(binding)),
                    None => Err(StoreError::NotFound(format!(
                        "binding for tenant {tenant_id} vanished mid-insert"
                    ))),
                }
            }
        }
    }

    async fn delete_binding(&self, tenant_id: &str) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let instance_id: Option<i64> = sqlx::query_scalar(
            "DELETE FROM tenant_bindings WHERE tenant_id = $1 RETURNING instance_id",
        )
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(instance_id) = instance_id else {
            tx.rollback().await?;
            return Ok(false);
        };

        sqlx::query(
            "UPDATE instances SET tenant_count = GREATEST(tenant_count - 1, 0) WHERE id = $1",
        )
        .bind(instance_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn update_binding(&self, binding: &TenantBinding) -> Result<(), StoreError> {
        let updated = sqlx::query(
            r#"
            UPDATE tenant_bindings
            SET connected = $2,
                phone = $3,
                connected_at = $4,
                disconnected_at = $5,
                updated_at = $6
            WHERE tenant_id = $1
            "#,
        )
        .bind(&binding.tenant_id)
        .bind(binding.connected)
        .bind(&binding.phone)
        .bind(binding.connected_at)
        .bind(binding.disconnected_at)
        .bind(binding.updated_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(StoreError::NotFound(format!(
                "binding for tenant {}",
                binding.tenant_id
            )));
        }
        Ok(())
    }

    async fn touch_pairing_issued(
        &self,
        tenant_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let updated = sqlx::query(
            r#"
            UPDATE tenant_bindings
            SET last_pairing_code_issued_at = $2, updated_at = $2
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .bind(at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(StoreError::NotFound(format!("binding for tenant {tenant_id}")));
        }
        Ok(())
    }
}

/// Tenant directory backed by the application's tenants table.
#[derive(Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantDirectory for PgDirectory {
    async fn tenant_exists(&self, tenant_id: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM tenants WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}
