use crate::domain::portfolio::Portfolio;
use crate::storage::{PgStore, PortfolioStore};
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use uuid::Uuid;

#[async_trait::async_trait]
impl PortfolioStore for PgStore {
    async fn create_portfolio(&self, owner: &str, name: &str) -> anyhow::Result<Portfolio> {
        let portfolio = Portfolio::new(Uuid::new_v4(), owner.trim(), name.trim());
        anyhow::ensure!(!portfolio.owner.is_empty(), "owner must be non-empty");
        anyhow::ensure!(!portfolio.name.is_empty(), "name must be non-empty");

        sqlx::query(
            "INSERT INTO portfolios (id, owner, name, created_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .persistent(false)
        .bind(portfolio.id)
        .bind(&portfolio.owner)
        .bind(&portfolio.name)
        .bind(portfolio.created_at)
        .execute(self.pool())
        .await
        .context("insert portfolios failed")?;

        Ok(portfolio)
    }

    async fn delete_portfolio(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut tx = self.pool().begin().await.context("begin transaction failed")?;

        sqlx::query("DELETE FROM portfolio_members WHERE portfolio_id = $1")
            .persistent(false)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("delete portfolio_members failed")?;

        let res = sqlx::query("DELETE FROM portfolios WHERE id = $1")
            .persistent(false)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("delete portfolios failed")?;

        tx.commit().await.context("commit transaction failed")?;
        Ok(res.rows_affected() > 0)
    }

    async fn fetch_portfolio(&self, id: Uuid) -> anyhow::Result<Option<Portfolio>> {
        let row = sqlx::query_as::<_, (Uuid, String, String, DateTime<Utc>)>(
            "SELECT id, owner, name, created_at FROM portfolios WHERE id = $1",
        )
        .persistent(false)
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .with_context(|| format!("select portfolio failed (id={id})"))?;

        let Some((id, owner, name, created_at)) = row else {
            return Ok(None);
        };

        let members = self.fetch_portfolio_members(id).await?;
        Ok(Some(Portfolio {
            id,
            owner,
            name,
            created_at,
            members,
        }))
    }

    async fn list_portfolios(&self, owner: &str) -> anyhow::Result<Vec<Portfolio>> {
        let rows = sqlx::query_as::<_, (Uuid, String, String, DateTime<Utc>)>(
            "SELECT id, owner, name, created_at \
             FROM portfolios \
             WHERE owner = $1 \
             ORDER BY created_at ASC, id ASC",
        )
        .persistent(false)
        .bind(owner)
        .fetch_all(self.pool())
        .await
        .with_context(|| format!("select portfolios failed (owner={owner})"))?;

        let mut out = Vec::with_capacity(rows.len());
        for (id, owner, name, created_at) in rows {
            let members = self.fetch_portfolio_members(id).await?;
            out.push(Portfolio {
                id,
                owner,
                name,
                created_at,
                members,
            });
        }
        Ok(out)
    }

    async fn fetch_portfolio_members(&self, id: Uuid) -> anyhow::Result<BTreeSet<String>> {
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT symbol FROM portfolio_members WHERE portfolio_id = $1 ORDER BY symbol ASC",
        )
        .bind(id)
        .fetch_all(self.pool())
        .await
        .with_context(|| format!("select portfolio_members failed (id={id})"))?;

        Ok(rows.into_iter().collect())
    }

    async fn add_member(&self, id: Uuid, symbol: &str) -> anyhow::Result<()> {
        let mut tx = self.pool().begin().await.context("begin transaction failed")?;

        // Row lock serializes concurrent membership writes on the same portfolio.
        let exists: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM portfolios WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .context("lock portfolios row failed")?;
        anyhow::ensure!(exists.is_some(), "portfolio {id} does not exist");

        sqlx::query(
            "INSERT INTO portfolio_members (portfolio_id, symbol) \
             VALUES ($1, $2) \
             ON CONFLICT (portfolio_id, symbol) DO NOTHING",
        )
        .persistent(false)
        .bind(id)
        .bind(symbol)
        .execute(&mut *tx)
        .await
        .context("insert portfolio_members failed")?;

        tx.commit().await.context("commit transaction failed")?;
        Ok(())
    }

    async fn remove_member(&self, id: Uuid, symbol: &str) -> anyhow::Result<()> {
        let mut tx = self.pool().begin().await.context("begin transaction failed")?;

        sqlx::query("SELECT id FROM portfolios WHERE id = $1 FOR UPDATE")
            .persistent(false)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("lock portfolios row failed")?;

        sqlx::query("DELETE FROM portfolio_members WHERE portfolio_id = $1 AND symbol = $2")
            .persistent(false)
            .bind(id)
            .bind(symbol)
            .execute(&mut *tx)
            .await
            .context("delete portfolio_members failed")?;

        tx.commit().await.context("commit transaction failed")?;
        Ok(())
    }
}
