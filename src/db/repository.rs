//! Database repository for CRUD operations.
//!
//! Every write bumps the global revision so dashboards can detect changes.
//! Concurrent edits are last-write-wins.

use chrono::{NaiveDate, Utc};
use sqlx::sqlite::{Sqlite, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::balance::{Balance, PaidAmount};
use crate::db::SCHEMA_VERSION;
use crate::errors::AppError;
use crate::models::{
    CreateParticipantRequest, CreatePaymentRequest, CreateProductRequest,
    CreateRegistrationRequest, CreateSeasonRequest, DayOfWeek, DeclarationSubmission, Discount,
    FormStatus, HealthDeclaration, Participant, Payment, Pool, Product, ProductFilter, ProductType,
    Registration, RegistrationFilter, RevisionInfo, Season, UpdateParticipantRequest,
    UpdateProductRequest, UpdateRegistrationRequest, UpdateSeasonRequest,
};
use crate::schedule::{calculate_end_date, Schedule};

const SEASON_COLUMNS: &str = "id, name, start_date, end_date, created_at, updated_at";

const POOL_COLUMNS: &str = "id, name, created_at, updated_at";

const PRODUCT_COLUMNS: &str = "id, name, product_type, season_id, pool_id, start_date, end_date, \
     price, max_participants, meetings_count, days_of_week, start_time, notes, created_at, updated_at";

const PARTICIPANT_COLUMNS: &str =
    "id, first_name, last_name, id_number, phone, health_approval, created_at, updated_at";

const REGISTRATION_SELECT: &str = r#"SELECT r.id, r.product_id, r.participant_id, r.registration_date,
           r.required_amount, r.discount_amount, r.discount_approved, r.receipt_number,
           r.created_at, r.updated_at,
           COALESCE((SELECT SUM(p.amount) FROM payments p WHERE p.registration_id = r.id), 0.0)
               AS paid_amount
    FROM registrations r"#;

const PAYMENT_COLUMNS: &str =
    "id, registration_id, amount, payment_date, receipt_number, created_at";

const DECLARATION_COLUMNS: &str = "id, participant_id, registration_id, token, form_status, \
     submission_date, notes, signature, parent_name, parent_id_number, created_at, updated_at";

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the current revision ID.
    pub async fn get_revision_id(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("revision_id"))
    }

    /// Get revision info.
    pub async fn get_revision_info(&self) -> Result<RevisionInfo, AppError> {
        let row = sqlx::query("SELECT revision_id, generated_at FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(RevisionInfo {
            schema_version: SCHEMA_VERSION,
            revision_id: row.get("revision_id"),
            generated_at: row.get("generated_at"),
        })
    }

    /// Increment the revision ID and return the new value.
    pub async fn increment_revision(&self) -> Result<i64, AppError> {
        bump_revision(&self.pool).await?;
        self.get_revision_id().await
    }

    // ==================== SEASON OPERATIONS ====================

    /// List all seasons, newest first.
    pub async fn list_seasons(&self) -> Result<Vec<Season>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM seasons ORDER BY start_date DESC, name",
            SEASON_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(season_from_row).collect())
    }

    /// Get a season by ID.
    pub async fn get_season(&self, id: &str) -> Result<Option<Season>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM seasons WHERE id = ?", SEASON_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(season_from_row))
    }

    /// Create a new season.
    pub async fn create_season(&self, request: &CreateSeasonRequest) -> Result<Season, AppError> {
        validate_date_range(request.start_date, request.end_date)?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO seasons (id, name, start_date, end_date, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(request.name.trim())
        .bind(request.start_date)
        .bind(request.end_date)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(Season {
            id,
            name: request.name.trim().to_string(),
            start_date: request.start_date,
            end_date: request.end_date,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Update a season.
    pub async fn update_season(
        &self,
        id: &str,
        request: &UpdateSeasonRequest,
    ) -> Result<Season, AppError> {
        let existing = self
            .get_season(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Season {} not found", id)))?;

        let name = request
            .name
            .as_deref()
            .map(str::trim)
            .unwrap_or(&existing.name)
            .to_string();
        let start_date = request.start_date.unwrap_or(existing.start_date);
        let end_date = request.end_date.unwrap_or(existing.end_date);
        validate_date_range(start_date, end_date)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "UPDATE seasons SET name = ?, start_date = ?, end_date = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&name)
        .bind(start_date)
        .bind(end_date)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(Season {
            id: id.to_string(),
            name,
            start_date,
            end_date,
            created_at: existing.created_at,
            updated_at: now,
        })
    }

    /// Delete a season that no product references.
    pub async fn delete_season(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let products: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE season_id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if products > 0 {
            return Err(AppError::HasDependents {
                message: format!("Cannot delete season: {} products belong to it", products),
                dependents: products,
            });
        }

        let result = sqlx::query("DELETE FROM seasons WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Season {} not found", id)));
        }

        bump_revision(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    /// List the pools linked to a season.
    pub async fn list_season_pools(&self, season_id: &str) -> Result<Vec<Pool>, AppError> {
        let rows = sqlx::query(
            r#"SELECT p.id, p.name, p.created_at, p.updated_at
               FROM pools p JOIN season_pools sp ON sp.pool_id = p.id
               WHERE sp.season_id = ? ORDER BY p.name"#,
        )
        .bind(season_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(pool_from_row).collect())
    }

    /// Link a pool to a season. Linking twice is a no-op.
    pub async fn link_pool_to_season(&self, season_id: &str, pool_id: &str) -> Result<(), AppError> {
        self.ensure_exists("seasons", "Season", season_id).await?;
        self.ensure_exists("pools", "Pool", pool_id).await?;

        sqlx::query("INSERT OR IGNORE INTO season_pools (season_id, pool_id) VALUES (?, ?)")
            .bind(season_id)
            .bind(pool_id)
            .execute(&self.pool)
            .await?;

        self.increment_revision().await?;
        Ok(())
    }

    /// Remove a pool from a season.
    pub async fn unlink_pool_from_season(
        &self,
        season_id: &str,
        pool_id: &str,
    ) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM season_pools WHERE season_id = ? AND pool_id = ?")
            .bind(season_id)
            .bind(pool_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Pool {} is not linked to season {}",
                pool_id, season_id
            )));
        }

        self.increment_revision().await?;
        Ok(())
    }

    // ==================== POOL OPERATIONS ====================

    /// List all pools.
    pub async fn list_pools(&self) -> Result<Vec<Pool>, AppError> {
        let rows = sqlx::query(&format!("SELECT {} FROM pools ORDER BY name", POOL_COLUMNS))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(pool_from_row).collect())
    }

    /// Get a pool by ID.
    pub async fn get_pool(&self, id: &str) -> Result<Option<Pool>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM pools WHERE id = ?", POOL_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(pool_from_row))
    }

    /// Create a new pool.
    pub async fn create_pool(&self, name: &str) -> Result<Pool, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query("INSERT INTO pools (id, name, created_at, updated_at) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(name.trim())
            .bind(&now)
            .bind(&now)
            .execute(&self.pool)
            .await?;

        self.increment_revision().await?;

        Ok(Pool {
            id,
            name: name.trim().to_string(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Rename a pool.
    pub async fn update_pool(&self, id: &str, name: &str) -> Result<Pool, AppError> {
        let existing = self
            .get_pool(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Pool {} not found", id)))?;
        let now = Utc::now().to_rfc3339();

        sqlx::query("UPDATE pools SET name = ?, updated_at = ? WHERE id = ?")
            .bind(name.trim())
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.increment_revision().await?;

        Ok(Pool {
            id: id.to_string(),
            name: name.trim().to_string(),
            created_at: existing.created_at,
            updated_at: now,
        })
    }

    /// Delete a pool that no product references.
    pub async fn delete_pool(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let products: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE pool_id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if products > 0 {
            return Err(AppError::HasDependents {
                message: format!("Cannot delete pool: {} products use it", products),
                dependents: products,
            });
        }

        let result = sqlx::query("DELETE FROM pools WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Pool {} not found", id)));
        }

        bump_revision(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    // ==================== PRODUCT OPERATIONS ====================

    /// List products, optionally filtered by season and pool.
    pub async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, AppError> {
        let rows = sqlx::query(&format!(
            r#"SELECT {} FROM products
               WHERE (? IS NULL OR season_id = ?) AND (? IS NULL OR pool_id = ?)
               ORDER BY start_date, name"#,
            PRODUCT_COLUMNS
        ))
        .bind(&filter.season_id)
        .bind(&filter.season_id)
        .bind(&filter.pool_id)
        .bind(&filter.pool_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(product_from_row).collect())
    }

    /// Get a product by ID.
    pub async fn get_product(&self, id: &str) -> Result<Option<Product>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM products WHERE id = ?", PRODUCT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(product_from_row))
    }

    /// Create a new product, deriving its end date from the schedule when absent.
    pub async fn create_product(&self, request: &CreateProductRequest) -> Result<Product, AppError> {
        self.ensure_reference("seasons", "Season", &request.season_id)
            .await?;
        if let Some(pool_id) = &request.pool_id {
            self.ensure_reference("pools", "Pool", pool_id).await?;
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let mut product = Product {
            id,
            name: request.name.trim().to_string(),
            product_type: request.product_type,
            season_id: request.season_id.clone(),
            pool_id: request.pool_id.clone(),
            start_date: request.start_date,
            end_date: request.end_date,
            price: request.price,
            max_participants: request.max_participants,
            meetings_count: request.meetings_count,
            days_of_week: request.days_of_week.clone(),
            start_time: request.start_time.clone(),
            notes: request.notes.clone(),
            created_at: now.clone(),
            updated_at: now,
        };
        if product.end_date.is_none() {
            product.end_date = calculate_end_date(&Schedule::of(&product));
        }

        sqlx::query(&format!(
            "INSERT INTO products ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            PRODUCT_COLUMNS
        ))
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.product_type.as_str())
        .bind(&product.season_id)
        .bind(&product.pool_id)
        .bind(product.start_date)
        .bind(product.end_date)
        .bind(product.price)
        .bind(product.max_participants)
        .bind(product.meetings_count.map(i64::from))
        .bind(days_to_json(&product.days_of_week)?)
        .bind(&product.start_time)
        .bind(&product.notes)
        .bind(&product.created_at)
        .bind(&product.updated_at)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(product)
    }

    /// Update a product.
    ///
    /// Changing the schedule without an explicit end date re-derives it.
    pub async fn update_product(
        &self,
        id: &str,
        request: &UpdateProductRequest,
    ) -> Result<Product, AppError> {
        let existing = self
            .get_product(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Product {} not found", id)))?;

        if let Some(season_id) = &request.season_id {
            self.ensure_reference("seasons", "Season", season_id).await?;
        }
        if let Some(Some(pool_id)) = &request.pool_id {
            self.ensure_reference("pools", "Pool", pool_id).await?;
        }

        let schedule_changed = request.start_date.is_some()
            || request.meetings_count.is_some()
            || request.days_of_week.is_some();

        let mut product = Product {
            id: id.to_string(),
            name: request
                .name
                .as_deref()
                .map(|n| n.trim().to_string())
                .unwrap_or(existing.name),
            product_type: request.product_type.unwrap_or(existing.product_type),
            season_id: request.season_id.clone().unwrap_or(existing.season_id),
            pool_id: request.pool_id.clone().unwrap_or(existing.pool_id),
            start_date: request.start_date.or(existing.start_date),
            end_date: request.end_date.or(existing.end_date),
            price: request.price.unwrap_or(existing.price),
            max_participants: request.max_participants.unwrap_or(existing.max_participants),
            meetings_count: request.meetings_count.or(existing.meetings_count),
            days_of_week: request
                .days_of_week
                .clone()
                .unwrap_or(existing.days_of_week),
            start_time: request.start_time.clone().unwrap_or(existing.start_time),
            notes: request.notes.clone().unwrap_or(existing.notes),
            created_at: existing.created_at,
            updated_at: Utc::now().to_rfc3339(),
        };
        if schedule_changed && request.end_date.is_none() {
            product.end_date = calculate_end_date(&Schedule::of(&product)).or(product.end_date);
        }

        sqlx::query(
            r#"UPDATE products SET
                name = ?, product_type = ?, season_id = ?, pool_id = ?, start_date = ?,
                end_date = ?, price = ?, max_participants = ?, meetings_count = ?,
                days_of_week = ?, start_time = ?, notes = ?, updated_at = ?
            WHERE id = ?"#,
        )
        .bind(&product.name)
        .bind(product.product_type.as_str())
        .bind(&product.season_id)
        .bind(&product.pool_id)
        .bind(product.start_date)
        .bind(product.end_date)
        .bind(product.price)
        .bind(product.max_participants)
        .bind(product.meetings_count.map(i64::from))
        .bind(days_to_json(&product.days_of_week)?)
        .bind(&product.start_time)
        .bind(&product.notes)
        .bind(&product.updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(product)
    }

    /// Delete a product that has no registrations.
    pub async fn delete_product(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let registrations: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM registrations WHERE product_id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if registrations > 0 {
            return Err(AppError::HasDependents {
                message: format!(
                    "Cannot delete product: {} registrations exist",
                    registrations
                ),
                dependents: registrations,
            });
        }

        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Product {} not found", id)));
        }

        bump_revision(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    // ==================== PARTICIPANT OPERATIONS ====================

    /// List all participants.
    pub async fn list_participants(&self) -> Result<Vec<Participant>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM participants ORDER BY last_name, first_name",
            PARTICIPANT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(participant_from_row).collect())
    }

    /// Get a participant by ID.
    pub async fn get_participant(&self, id: &str) -> Result<Option<Participant>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM participants WHERE id = ?",
            PARTICIPANT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(participant_from_row))
    }

    /// Create a new participant.
    pub async fn create_participant(
        &self,
        request: &CreateParticipantRequest,
    ) -> Result<Participant, AppError> {
        let now = Utc::now().to_rfc3339();
        let participant = Participant {
            id: uuid::Uuid::new_v4().to_string(),
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            id_number: request.id_number.trim().to_string(),
            phone: request.phone.trim().to_string(),
            health_approval: false,
            created_at: now.clone(),
            updated_at: now,
        };

        sqlx::query(&format!(
            "INSERT INTO participants ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            PARTICIPANT_COLUMNS
        ))
        .bind(&participant.id)
        .bind(&participant.first_name)
        .bind(&participant.last_name)
        .bind(&participant.id_number)
        .bind(&participant.phone)
        .bind(participant.health_approval as i32)
        .bind(&participant.created_at)
        .bind(&participant.updated_at)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(participant)
    }

    /// Update a participant.
    pub async fn update_participant(
        &self,
        id: &str,
        request: &UpdateParticipantRequest,
    ) -> Result<Participant, AppError> {
        let existing = self
            .get_participant(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Participant {} not found", id)))?;

        let trimmed = |value: &Option<String>, current: String| {
            value
                .as_deref()
                .map(|v| v.trim().to_string())
                .unwrap_or(current)
        };

        let participant = Participant {
            id: id.to_string(),
            first_name: trimmed(&request.first_name, existing.first_name),
            last_name: trimmed(&request.last_name, existing.last_name),
            id_number: trimmed(&request.id_number, existing.id_number),
            phone: trimmed(&request.phone, existing.phone),
            health_approval: request.health_approval.unwrap_or(existing.health_approval),
            created_at: existing.created_at,
            updated_at: Utc::now().to_rfc3339(),
        };

        sqlx::query(
            r#"UPDATE participants SET first_name = ?, last_name = ?, id_number = ?, phone = ?,
                   health_approval = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&participant.first_name)
        .bind(&participant.last_name)
        .bind(&participant.id_number)
        .bind(&participant.phone)
        .bind(participant.health_approval as i32)
        .bind(&participant.updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(participant)
    }

    /// Delete a participant who has no registrations.
    pub async fn delete_participant(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let registrations: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM registrations WHERE participant_id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if registrations > 0 {
            return Err(AppError::HasDependents {
                message: format!(
                    "Cannot delete participant: {} registrations exist",
                    registrations
                ),
                dependents: registrations,
            });
        }

        let result = sqlx::query("DELETE FROM participants WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Participant {} not found", id)));
        }

        bump_revision(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Set the cached health approval flag.
    pub async fn set_health_approval(&self, participant_id: &str, approved: bool) -> Result<(), AppError> {
        let result =
            sqlx::query("UPDATE participants SET health_approval = ?, updated_at = ? WHERE id = ?")
                .bind(approved as i32)
                .bind(Utc::now().to_rfc3339())
                .bind(participant_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Participant {} not found",
                participant_id
            )));
        }

        self.increment_revision().await?;
        Ok(())
    }

    // ==================== REGISTRATION OPERATIONS ====================

    /// List registrations with their derived balances.
    pub async fn list_registrations(
        &self,
        filter: &RegistrationFilter,
    ) -> Result<Vec<Registration>, AppError> {
        let rows = sqlx::query(&format!(
            r#"{}
               WHERE (? IS NULL OR r.product_id = ?)
                 AND (? IS NULL OR r.participant_id = ?)
                 AND (? IS NULL OR r.product_id IN (SELECT id FROM products WHERE season_id = ?))
               ORDER BY r.registration_date DESC, r.created_at DESC"#,
            REGISTRATION_SELECT
        ))
        .bind(&filter.product_id)
        .bind(&filter.product_id)
        .bind(&filter.participant_id)
        .bind(&filter.participant_id)
        .bind(&filter.season_id)
        .bind(&filter.season_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(registration_from_row).collect())
    }

    /// Get a registration by ID.
    pub async fn get_registration(&self, id: &str) -> Result<Option<Registration>, AppError> {
        let row = sqlx::query(&format!("{} WHERE r.id = ?", REGISTRATION_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(registration_from_row))
    }

    /// Register a participant to a product.
    ///
    /// The required amount defaults to the product price.
    pub async fn create_registration(
        &self,
        request: &CreateRegistrationRequest,
    ) -> Result<Registration, AppError> {
        let product = self.get_product(&request.product_id).await?.ok_or_else(|| {
            AppError::validation(format!("Product {} does not exist", request.product_id))
        })?;
        self.ensure_reference("participants", "Participant", &request.participant_id)
            .await?;

        let required_amount = request.required_amount.unwrap_or(product.price);
        if required_amount < 0.0 {
            return Err(AppError::validation("Required amount cannot be negative"));
        }
        validate_discount(required_amount, &request.discount)?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let registration_date = request
            .registration_date
            .unwrap_or_else(|| Utc::now().date_naive());
        let (discount_amount, discount_approved) = request.discount.to_columns();
        let receipt_number = non_empty(request.receipt_number.as_deref());

        sqlx::query(
            r#"INSERT INTO registrations (
                id, product_id, participant_id, registration_date, required_amount,
                discount_amount, discount_approved, receipt_number, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(&request.product_id)
        .bind(&request.participant_id)
        .bind(registration_date)
        .bind(required_amount)
        .bind(discount_amount)
        .bind(discount_approved as i32)
        .bind(&receipt_number)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(Registration {
            id,
            product_id: request.product_id.clone(),
            participant_id: request.participant_id.clone(),
            registration_date,
            required_amount,
            discount: request.discount,
            receipt_number,
            paid_amount: 0.0,
            balance: Balance::compute(required_amount, &request.discount, PaidAmount::Explicit(0.0)),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Update a registration's terms.
    pub async fn update_registration(
        &self,
        id: &str,
        request: &UpdateRegistrationRequest,
    ) -> Result<Registration, AppError> {
        let existing = self
            .get_registration(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Registration {} not found", id)))?;

        if let Some(product_id) = &request.product_id {
            self.ensure_reference("products", "Product", product_id)
                .await?;
        }

        let product_id = request.product_id.clone().unwrap_or(existing.product_id);
        let registration_date = request
            .registration_date
            .unwrap_or(existing.registration_date);
        let required_amount = request.required_amount.unwrap_or(existing.required_amount);
        let discount = request.discount.unwrap_or(existing.discount);
        let receipt_number = match &request.receipt_number {
            Some(receipt) => non_empty(Some(receipt.as_str())),
            None => existing.receipt_number,
        };
        if required_amount < 0.0 {
            return Err(AppError::validation("Required amount cannot be negative"));
        }
        validate_discount(required_amount, &discount)?;

        let (discount_amount, discount_approved) = discount.to_columns();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"UPDATE registrations SET product_id = ?, registration_date = ?, required_amount = ?,
                   discount_amount = ?, discount_approved = ?, receipt_number = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&product_id)
        .bind(registration_date)
        .bind(required_amount)
        .bind(discount_amount)
        .bind(discount_approved as i32)
        .bind(&receipt_number)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(Registration {
            id: id.to_string(),
            product_id,
            participant_id: existing.participant_id,
            registration_date,
            required_amount,
            discount,
            receipt_number,
            paid_amount: existing.paid_amount,
            balance: Balance::compute(
                required_amount,
                &discount,
                PaidAmount::Explicit(existing.paid_amount),
            ),
            created_at: existing.created_at,
            updated_at: now,
        })
    }

    /// Delete a registration that has no payments.
    pub async fn delete_registration(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let payments: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE registration_id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if payments > 0 {
            return Err(AppError::HasDependents {
                message: format!("Cannot delete registration: {} payments exist", payments),
                dependents: payments,
            });
        }

        let result = sqlx::query("DELETE FROM registrations WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Registration {} not found", id)));
        }

        bump_revision(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Approve a discount, adding `amount` to any discount already recorded.
    ///
    /// Not idempotent: applying the same discount twice adds it twice. The
    /// increment is written first so the row stays locked until the capped
    /// total is validated and committed.
    pub async fn apply_discount(&self, id: &str, amount: f64) -> Result<Registration, AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"UPDATE registrations
               SET discount_amount = COALESCE(discount_amount, 0) + ?,
                   discount_approved = 1,
                   updated_at = ?
               WHERE id = ?"#,
        )
        .bind(amount)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Registration {} not found", id)));
        }

        let row = sqlx::query(&format!("{} WHERE r.id = ?", REGISTRATION_SELECT))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        let registration = registration_from_row(&row);
        validate_discount(registration.required_amount, &registration.discount)?;

        bump_revision(&mut *tx).await?;
        tx.commit().await?;
        Ok(registration)
    }

    // ==================== PAYMENT OPERATIONS ====================

    /// List the payments of a registration, oldest first.
    pub async fn list_payments_for_registration(
        &self,
        registration_id: &str,
    ) -> Result<Vec<Payment>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE registration_id = ? ORDER BY payment_date, created_at",
            PAYMENT_COLUMNS
        ))
        .bind(registration_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(payment_from_row).collect())
    }

    /// Record a payment against a registration.
    ///
    /// No deduplication: identical requests create separate rows.
    pub async fn create_payment(&self, request: &CreatePaymentRequest) -> Result<Payment, AppError> {
        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM registrations WHERE id = ?")
            .bind(&request.registration_id)
            .fetch_one(&self.pool)
            .await?;
        if exists == 0 {
            return Err(AppError::NotFound(format!(
                "Registration {} not found",
                request.registration_id
            )));
        }

        let payment = Payment {
            id: uuid::Uuid::new_v4().to_string(),
            registration_id: request.registration_id.clone(),
            amount: request.amount,
            payment_date: request
                .payment_date
                .unwrap_or_else(|| Utc::now().date_naive()),
            receipt_number: request.receipt_number.trim().to_string(),
            created_at: Utc::now().to_rfc3339(),
        };

        sqlx::query(&format!(
            "INSERT INTO payments ({}) VALUES (?, ?, ?, ?, ?, ?)",
            PAYMENT_COLUMNS
        ))
        .bind(&payment.id)
        .bind(&payment.registration_id)
        .bind(payment.amount)
        .bind(payment.payment_date)
        .bind(&payment.receipt_number)
        .bind(&payment.created_at)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(payment)
    }

    /// Delete a payment.
    pub async fn delete_payment(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM payments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Payment {} not found", id)));
        }

        self.increment_revision().await?;
        Ok(())
    }

    // ==================== HEALTH DECLARATION OPERATIONS ====================

    /// List all health declarations.
    pub async fn list_declarations(&self) -> Result<Vec<HealthDeclaration>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM health_declarations ORDER BY created_at",
            DECLARATION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(declaration_from_row).collect())
    }

    /// Get a declaration by ID.
    pub async fn get_declaration(&self, id: &str) -> Result<Option<HealthDeclaration>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM health_declarations WHERE id = ?",
            DECLARATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(declaration_from_row))
    }

    /// Get a declaration by its public signing token.
    pub async fn get_declaration_by_token(
        &self,
        token: &str,
    ) -> Result<Option<HealthDeclaration>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM health_declarations WHERE token = ?",
            DECLARATION_COLUMNS
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(declaration_from_row))
    }

    /// Create a pending declaration with a fresh signing token.
    ///
    /// Returns the existing declaration when the registration already has one.
    pub async fn create_declaration_for_registration(
        &self,
        registration_id: &str,
    ) -> Result<HealthDeclaration, AppError> {
        let registration = self.get_registration(registration_id).await?.ok_or_else(|| {
            AppError::NotFound(format!("Registration {} not found", registration_id))
        })?;

        let existing = sqlx::query(&format!(
            "SELECT {} FROM health_declarations WHERE registration_id = ? ORDER BY created_at LIMIT 1",
            DECLARATION_COLUMNS
        ))
        .bind(registration_id)
        .fetch_optional(&self.pool)
        .await?;
        if let Some(row) = existing {
            return Ok(declaration_from_row(&row));
        }

        let now = Utc::now().to_rfc3339();
        let declaration = HealthDeclaration {
            id: uuid::Uuid::new_v4().to_string(),
            participant_id: registration.participant_id,
            registration_id: Some(registration.id),
            token: uuid::Uuid::new_v4().simple().to_string(),
            form_status: FormStatus::Pending,
            submission_date: None,
            notes: None,
            signature: None,
            parent_name: None,
            parent_id_number: None,
            created_at: now.clone(),
            updated_at: now,
        };

        sqlx::query(&format!(
            "INSERT INTO health_declarations ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            DECLARATION_COLUMNS
        ))
        .bind(&declaration.id)
        .bind(&declaration.participant_id)
        .bind(&declaration.registration_id)
        .bind(&declaration.token)
        .bind(declaration.form_status.as_str())
        .bind(&declaration.submission_date)
        .bind(&declaration.notes)
        .bind(&declaration.signature)
        .bind(&declaration.parent_name)
        .bind(&declaration.parent_id_number)
        .bind(&declaration.created_at)
        .bind(&declaration.updated_at)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(declaration)
    }

    /// Set a declaration's status on behalf of an operator.
    pub async fn update_declaration_status(
        &self,
        id: &str,
        status: FormStatus,
        notes: Option<&str>,
    ) -> Result<HealthDeclaration, AppError> {
        let existing = self
            .get_declaration(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Health declaration {} not found", id)))?;

        let now = Utc::now().to_rfc3339();
        let notes = notes.map(str::to_string).or(existing.notes.clone());
        let submission_date = match (status, &existing.submission_date) {
            (FormStatus::Signed, None) => Some(now.clone()),
            _ => existing.submission_date.clone(),
        };

        sqlx::query(
            "UPDATE health_declarations SET form_status = ?, notes = ?, submission_date = ?, updated_at = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(&notes)
        .bind(&submission_date)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(HealthDeclaration {
            form_status: status,
            notes,
            submission_date,
            updated_at: now,
            ..existing
        })
    }

    /// Record a guardian's submission from the public signing page.
    pub async fn submit_declaration(
        &self,
        token: &str,
        submission: &DeclarationSubmission,
    ) -> Result<HealthDeclaration, AppError> {
        let existing = self
            .get_declaration_by_token(token)
            .await?
            .ok_or_else(|| AppError::NotFound("Health declaration link not found".to_string()))?;

        let now = Utc::now().to_rfc3339();
        let notes = non_empty(submission.medical_notes.as_deref());
        let parent_id_number = non_empty(Some(submission.parent_id_number.as_str()));

        let result = sqlx::query(
            r#"UPDATE health_declarations SET form_status = ?, submission_date = ?, notes = ?,
                   signature = ?, parent_name = ?, parent_id_number = ?, updated_at = ?
               WHERE token = ? AND form_status = ?"#,
        )
        .bind(FormStatus::Signed.as_str())
        .bind(&now)
        .bind(&notes)
        .bind(&submission.signature)
        .bind(submission.parent_name.trim())
        .bind(&parent_id_number)
        .bind(&now)
        .bind(token)
        .bind(FormStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "Health declaration was already {}",
                existing.form_status.as_str()
            )));
        }

        self.increment_revision().await?;

        Ok(HealthDeclaration {
            form_status: FormStatus::Signed,
            submission_date: Some(now.clone()),
            notes,
            signature: Some(submission.signature.clone()),
            parent_name: Some(submission.parent_name.trim().to_string()),
            parent_id_number,
            updated_at: now,
            ..existing
        })
    }

    /// Resolve the participant a declaration belongs to.
    ///
    /// Tries the explicit registration link, then `participant_id` as a
    /// participant, then `participant_id` as a registration.
    pub async fn resolve_declaration_participant(
        &self,
        declaration: &HealthDeclaration,
    ) -> Result<Option<String>, AppError> {
        if let Some(registration_id) = &declaration.registration_id {
            let participant: Option<String> =
                sqlx::query_scalar("SELECT participant_id FROM registrations WHERE id = ?")
                    .bind(registration_id)
                    .fetch_optional(&self.pool)
                    .await?;
            if participant.is_some() {
                return Ok(participant);
            }
        }

        if self.get_participant(&declaration.participant_id).await?.is_some() {
            return Ok(Some(declaration.participant_id.clone()));
        }

        let participant: Option<String> =
            sqlx::query_scalar("SELECT participant_id FROM registrations WHERE id = ?")
                .bind(&declaration.participant_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(participant)
    }

    // ==================== HELPERS ====================

    /// Fail with `NotFound` unless `id` exists in `table`.
    async fn ensure_exists(&self, table: &str, label: &str, id: &str) -> Result<(), AppError> {
        if self.count_by_id(table, id).await? == 0 {
            return Err(AppError::NotFound(format!("{} {} not found", label, id)));
        }
        Ok(())
    }

    /// Fail with a validation error unless the referenced `id` exists in `table`.
    async fn ensure_reference(&self, table: &str, label: &str, id: &str) -> Result<(), AppError> {
        if self.count_by_id(table, id).await? == 0 {
            return Err(AppError::validation(format!("{} {} does not exist", label, id)));
        }
        Ok(())
    }

    async fn count_by_id(&self, table: &str, id: &str) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {} WHERE id = ?", table))
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// Bump the revision counter on any executor, pool or open transaction.
async fn bump_revision<'e, E>(executor: E) -> Result<(), AppError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let now = Utc::now().to_rfc3339();
    sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
        .bind(now)
        .execute(executor)
        .await?;
    Ok(())
}

fn validate_date_range(start: NaiveDate, end: NaiveDate) -> Result<(), AppError> {
    if end < start {
        return Err(AppError::validation("End date must not be before start date"));
    }
    Ok(())
}

/// Discounts must be non-negative and may not exceed the required amount.
fn validate_discount(required_amount: f64, discount: &Discount) -> Result<(), AppError> {
    let amount = discount.amount();
    if amount < 0.0 {
        return Err(AppError::validation("Discount cannot be negative"));
    }
    if amount > required_amount {
        return Err(AppError::validation(format!(
            "Discount {:.2} exceeds the required amount {:.2}",
            amount, required_amount
        )));
    }
    Ok(())
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn days_to_json(days: &[DayOfWeek]) -> Result<String, AppError> {
    Ok(serde_json::to_string(days)?)
}

// Helper functions for row conversion

fn season_from_row(row: &SqliteRow) -> Season {
    Season {
        id: row.get("id"),
        name: row.get("name"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn pool_from_row(row: &SqliteRow) -> Pool {
    Pool {
        id: row.get("id"),
        name: row.get("name"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn product_from_row(row: &SqliteRow) -> Product {
    let product_type: String = row.get("product_type");
    let meetings_count: Option<i64> = row.get("meetings_count");
    let days_of_week: Option<String> = row.get("days_of_week");

    Product {
        id: row.get("id"),
        name: row.get("name"),
        product_type: ProductType::parse(&product_type).unwrap_or(ProductType::Course),
        season_id: row.get("season_id"),
        pool_id: row.get("pool_id"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        price: row.get("price"),
        max_participants: row.get("max_participants"),
        meetings_count: meetings_count.and_then(|n| u32::try_from(n).ok()),
        days_of_week: days_of_week
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default(),
        start_time: row.get("start_time"),
        notes: row.get("notes"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn participant_from_row(row: &SqliteRow) -> Participant {
    let health_approval: i32 = row.get("health_approval");
    Participant {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        id_number: row.get("id_number"),
        phone: row.get("phone"),
        health_approval: health_approval != 0,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn registration_from_row(row: &SqliteRow) -> Registration {
    let discount_approved: i32 = row.get("discount_approved");
    let discount = Discount::from_columns(row.get("discount_amount"), discount_approved != 0);
    let required_amount: f64 = row.get("required_amount");
    let paid_amount: f64 = row.get("paid_amount");

    Registration {
        id: row.get("id"),
        product_id: row.get("product_id"),
        participant_id: row.get("participant_id"),
        registration_date: row.get("registration_date"),
        required_amount,
        discount,
        receipt_number: row.get("receipt_number"),
        paid_amount,
        balance: Balance::compute(required_amount, &discount, PaidAmount::Explicit(paid_amount)),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn payment_from_row(row: &SqliteRow) -> Payment {
    Payment {
        id: row.get("id"),
        registration_id: row.get("registration_id"),
        amount: row.get("amount"),
        payment_date: row.get("payment_date"),
        receipt_number: row.get("receipt_number"),
        created_at: row.get("created_at"),
    }
}

fn declaration_from_row(row: &SqliteRow) -> HealthDeclaration {
    let form_status: String = row.get("form_status");
    HealthDeclaration {
        id: row.get("id"),
        participant_id: row.get("participant_id"),
        registration_id: row.get("registration_id"),
        token: row.get("token"),
        form_status: FormStatus::parse(&form_status).unwrap_or(FormStatus::Pending),
        submission_date: row.get("submission_date"),
        notes: row.get("notes"),
        signature: row.get("signature"),
        parent_name: row.get("parent_name"),
        parent_id_number: row.get("parent_id_number"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use tempfile::TempDir;

    async fn repo() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .unwrap();
        (Repository::new(pool), temp_dir)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Season, pool, product and participant ready for registrations.
    async fn seed(repo: &Repository) -> (Product, Participant) {
        let season = repo
            .create_season(&CreateSeasonRequest {
                name: "Summer 2025".to_string(),
                start_date: date(2025, 1, 1),
                end_date: date(2025, 8, 31),
            })
            .await
            .unwrap();
        let pool = repo.create_pool("Olympic").await.unwrap();
        let product = repo
            .create_product(&CreateProductRequest {
                name: "Beginners".to_string(),
                product_type: ProductType::Course,
                season_id: season.id,
                pool_id: Some(pool.id),
                start_date: Some(date(2025, 1, 5)),
                end_date: None,
                price: 100.0,
                max_participants: 12,
                meetings_count: Some(4),
                days_of_week: vec![DayOfWeek::Sunday, DayOfWeek::Wednesday],
                start_time: Some("17:00".to_string()),
                notes: None,
            })
            .await
            .unwrap();
        let participant = repo
            .create_participant(&CreateParticipantRequest {
                first_name: "Noa".to_string(),
                last_name: "Levi".to_string(),
                id_number: "123456782".to_string(),
                phone: "050-1234567".to_string(),
            })
            .await
            .unwrap();
        (product, participant)
    }

    async fn register(repo: &Repository, product: &Product, participant: &Participant) -> Registration {
        repo.create_registration(&CreateRegistrationRequest {
            product_id: product.id.clone(),
            participant_id: participant.id.clone(),
            registration_date: Some(date(2025, 1, 1)),
            required_amount: None,
            discount: Discount::None,
            receipt_number: None,
        })
        .await
        .unwrap()
    }

    fn payment_request(registration_id: &str, amount: f64) -> CreatePaymentRequest {
        CreatePaymentRequest {
            registration_id: registration_id.to_string(),
            amount,
            payment_date: Some(date(2025, 1, 2)),
            receipt_number: "R-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_product_end_date_is_derived() {
        let (repo, _dir) = repo().await;
        let (product, _) = seed(&repo).await;
        assert_eq!(product.end_date, Some(date(2025, 1, 15)));

        let stored = repo.get_product(&product.id).await.unwrap().unwrap();
        assert_eq!(stored.end_date, Some(date(2025, 1, 15)));
        assert_eq!(stored.days_of_week, vec![DayOfWeek::Sunday, DayOfWeek::Wednesday]);
    }

    #[tokio::test]
    async fn test_required_amount_defaults_to_price() {
        let (repo, _dir) = repo().await;
        let (product, participant) = seed(&repo).await;
        let registration = register(&repo, &product, &participant).await;
        assert_eq!(registration.required_amount, 100.0);
        assert_eq!(registration.paid_amount, 0.0);
    }

    #[tokio::test]
    async fn test_paid_amount_is_sum_of_payments() {
        let (repo, _dir) = repo().await;
        let (product, participant) = seed(&repo).await;
        let registration = register(&repo, &product, &participant).await;

        repo.create_payment(&payment_request(&registration.id, 60.0))
            .await
            .unwrap();
        repo.create_payment(&payment_request(&registration.id, 40.0))
            .await
            .unwrap();

        let stored = repo.get_registration(&registration.id).await.unwrap().unwrap();
        assert_eq!(stored.paid_amount, 100.0);
        assert_eq!(stored.balance.status, crate::balance::PaymentStatus::Full);
    }

    #[tokio::test]
    async fn test_delete_registration_with_payments_is_refused() {
        let (repo, _dir) = repo().await;
        let (product, participant) = seed(&repo).await;
        let registration = register(&repo, &product, &participant).await;
        repo.create_payment(&payment_request(&registration.id, 10.0))
            .await
            .unwrap();

        let err = repo.delete_registration(&registration.id).await.unwrap_err();
        assert!(matches!(err, AppError::HasDependents { dependents: 1, .. }));

        assert!(repo.get_registration(&registration.id).await.unwrap().is_some());
        assert_eq!(
            repo.list_payments_for_registration(&registration.id)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_delete_pool_with_products_is_refused() {
        let (repo, _dir) = repo().await;
        let (product, _) = seed(&repo).await;
        let pool_id = product.pool_id.clone().unwrap();

        let err = repo.delete_pool(&pool_id).await.unwrap_err();
        assert!(matches!(err, AppError::HasDependents { .. }));

        repo.delete_product(&product.id).await.unwrap();
        repo.delete_pool(&pool_id).await.unwrap();
        assert!(repo.get_pool(&pool_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_apply_discount_accumulates_and_is_capped() {
        let (repo, _dir) = repo().await;
        let (product, participant) = seed(&repo).await;
        let registration = register(&repo, &product, &participant).await;

        let first = repo.apply_discount(&registration.id, 15.0).await.unwrap();
        assert_eq!(first.discount, Discount::Approved { amount: 15.0 });

        let second = repo.apply_discount(&registration.id, 15.0).await.unwrap();
        assert_eq!(second.discount, Discount::Approved { amount: 30.0 });
        assert_eq!(second.balance.effective_required, 70.0);

        let err = repo.apply_discount(&registration.id, 80.0).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let stored = repo.get_registration(&registration.id).await.unwrap().unwrap();
        assert_eq!(stored.discount, Discount::Approved { amount: 30.0 });
    }

    #[tokio::test]
    async fn test_concurrent_discounts_are_not_lost() {
        let (repo, _dir) = repo().await;
        let (product, participant) = seed(&repo).await;
        let registration = register(&repo, &product, &participant).await;

        let (a, b) = tokio::join!(
            repo.apply_discount(&registration.id, 10.0),
            repo.apply_discount(&registration.id, 10.0)
        );
        a.unwrap();
        b.unwrap();
        let stored = repo.get_registration(&registration.id).await.unwrap().unwrap();
        assert_eq!(stored.discount, Discount::Approved { amount: 20.0 });

        // Together these would exceed the required amount; only one may land.
        let (a, b) = tokio::join!(
            repo.apply_discount(&registration.id, 50.0),
            repo.apply_discount(&registration.id, 50.0)
        );
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        let stored = repo.get_registration(&registration.id).await.unwrap().unwrap();
        assert_eq!(stored.discount, Discount::Approved { amount: 70.0 });
    }

    #[tokio::test]
    async fn test_declaration_link_is_reused() {
        let (repo, _dir) = repo().await;
        let (product, participant) = seed(&repo).await;
        let registration = register(&repo, &product, &participant).await;

        let first = repo
            .create_declaration_for_registration(&registration.id)
            .await
            .unwrap();
        let second = repo
            .create_declaration_for_registration(&registration.id)
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.participant_id, participant.id);
        assert_eq!(first.form_status, FormStatus::Pending);
        assert_eq!(first.token.len(), 32);
    }

    #[tokio::test]
    async fn test_resolve_participant_for_legacy_declaration() {
        let (repo, _dir) = repo().await;
        let (product, participant) = seed(&repo).await;
        let registration = register(&repo, &product, &participant).await;

        // A historical row that stored the registration id in participant_id.
        let legacy = HealthDeclaration {
            id: "legacy".to_string(),
            participant_id: registration.id.clone(),
            registration_id: None,
            token: "legacy-token".to_string(),
            form_status: FormStatus::Signed,
            submission_date: None,
            notes: None,
            signature: None,
            parent_name: None,
            parent_id_number: None,
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
        };
        assert_eq!(
            repo.resolve_declaration_participant(&legacy).await.unwrap(),
            Some(participant.id.clone())
        );

        let orphan = HealthDeclaration {
            participant_id: "nobody".to_string(),
            ..legacy
        };
        assert_eq!(repo.resolve_declaration_participant(&orphan).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_revision_increments_on_writes() {
        let (repo, _dir) = repo().await;
        let before = repo.get_revision_id().await.unwrap();
        repo.create_pool("Training").await.unwrap();
        assert_eq!(repo.get_revision_id().await.unwrap(), before + 1);
    }
}
