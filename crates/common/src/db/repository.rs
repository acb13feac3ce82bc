//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations
//! with proper error handling.
//!
//! The purchased-lead insert and the unpaid->paid order update are raw
//! statements: the unique (user_id, collection_id, lead_key) constraint with
//! ON CONFLICT DO NOTHING and the conditional status update are the two
//! guards that make payment finalization idempotent and safe under
//! concurrent orders.

use crate::db::DbPool;
use crate::db::models::*;
use crate::errors::{AppError, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, Statement,
};
use std::collections::HashSet;
use uuid::Uuid;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Collection Operations
    // ========================================================================

    /// Create a new collection
    #[allow(clippy::too_many_arguments)]
    pub async fn create_collection(
        &self,
        title: String,
        description: String,
        countries: serde_json::Value,
        product_type: ProductType,
        fee_cents: i64,
        discount_cents: i64,
        columns: serde_json::Value,
        natural_key: serde_json::Value,
    ) -> Result<Collection> {
        let now = chrono::Utc::now();

        let collection = CollectionActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(title),
            description: Set(description),
            images: Set(serde_json::json!([])),
            countries: Set(countries),
            product_type: Set(String::from(product_type)),
            fee_cents: Set(fee_cents),
            discount_cents: Set(discount_cents),
            status: Set(String::from(CollectionStatus::Active)),
            featured: Set(false),
            columns: Set(columns),
            natural_key: Set(natural_key),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        collection.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Find collection by ID
    pub async fn find_collection_by_id(&self, id: Uuid) -> Result<Option<Collection>> {
        CollectionEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// List active collections with pagination, featured first
    pub async fn list_collections(&self, offset: u64, limit: u64) -> Result<(Vec<Collection>, u64)> {
        let paginator = CollectionEntity::find()
            .filter(CollectionColumn::Status.eq(String::from(CollectionStatus::Active)))
            .order_by_desc(CollectionColumn::Featured)
            .order_by_desc(CollectionColumn::CreatedAt)
            .paginate(self.read_conn(), limit);

        let total = paginator.num_items().await?;
        let collections = paginator.fetch_page(offset / limit).await?;

        Ok((collections, total))
    }

    // ========================================================================
    // Data Table Operations
    // ========================================================================

    /// Create a new data table
    pub async fn create_table(
        &self,
        owner_id: Uuid,
        name: String,
        columns: serde_json::Value,
        leads: i64,
        tags: serde_json::Value,
        source_file: Option<String>,
        delimiter: String,
    ) -> Result<DataTable> {
        let now = chrono::Utc::now();

        let table = DataTableActiveModel {
            id: Set(Uuid::new_v4()),
            owner_id: Set(owner_id),
            name: Set(name),
            columns: Set(columns),
            leads: Set(leads),
            tags: Set(tags),
            source_file: Set(source_file),
            delimiter: Set(delimiter),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        table.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Find data table by ID
    pub async fn find_table_by_id(&self, id: Uuid) -> Result<Option<DataTable>> {
        DataTableEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Fetch the tables that still exist from a set of ids
    ///
    /// Deleted tables are simply absent from the result; callers treat them
    /// as contributing zero leads.
    pub async fn find_tables_by_ids(&self, ids: &[Uuid]) -> Result<Vec<DataTable>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        DataTableEntity::find()
            .filter(DataTableColumn::Id.is_in(ids.to_vec()))
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Delete a data table and its rows
    pub async fn delete_table(&self, id: Uuid) -> Result<bool> {
        TableRowEntity::delete_many()
            .filter(TableRowColumn::TableId.eq(id))
            .exec(self.write_conn())
            .await?;

        let result = DataTableEntity::delete_by_id(id)
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Get all rows of a table ordered by source position
    pub async fn get_table_rows(&self, table_id: Uuid) -> Result<Vec<TableRow>> {
        TableRowEntity::find()
            .filter(TableRowColumn::TableId.eq(table_id))
            .order_by_asc(TableRowColumn::RowIndex)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Bulk-insert rows for a table
    pub async fn insert_table_rows(
        &self,
        table_id: Uuid,
        rows: Vec<(i64, serde_json::Value)>,
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let models: Vec<TableRowActiveModel> = rows
            .into_iter()
            .map(|(row_index, fields)| TableRowActiveModel {
                id: Set(Uuid::new_v4()),
                table_id: Set(table_id),
                row_index: Set(row_index),
                fields: Set(fields),
            })
            .collect();

        let inserted = models.len() as u64;
        TableRowEntity::insert_many(models)
            .exec(self.write_conn())
            .await?;

        Ok(inserted)
    }

    /// Replace a table's rows and refresh its stored lead count
    pub async fn replace_table_rows(
        &self,
        table_id: Uuid,
        columns: serde_json::Value,
        rows: Vec<(i64, serde_json::Value)>,
    ) -> Result<u64> {
        TableRowEntity::delete_many()
            .filter(TableRowColumn::TableId.eq(table_id))
            .exec(self.write_conn())
            .await?;

        let count = self.insert_table_rows(table_id, rows).await?;

        let mut table: DataTableActiveModel = DataTableEntity::find_by_id(table_id)
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::TableNotFound {
                id: table_id.to_string(),
            })?
            .into();

        table.columns = Set(columns);
        table.leads = Set(count as i64);
        table.updated_at = Set(chrono::Utc::now().into());
        table.update(self.write_conn()).await?;

        Ok(count)
    }

    // ========================================================================
    // Purchased Lead Ledger
    // ========================================================================

    /// Count distinct leads a user has bought from a collection
    pub async fn count_purchased(&self, user_id: Uuid, collection_id: Uuid) -> Result<u64> {
        PurchasedLeadEntity::find()
            .filter(PurchasedLeadColumn::UserId.eq(user_id))
            .filter(PurchasedLeadColumn::CollectionId.eq(collection_id))
            .count(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Check whether a specific lead is already owned
    pub async fn is_purchased(
        &self,
        user_id: Uuid,
        collection_id: Uuid,
        lead_key: &str,
    ) -> Result<bool> {
        let count = PurchasedLeadEntity::find()
            .filter(PurchasedLeadColumn::UserId.eq(user_id))
            .filter(PurchasedLeadColumn::CollectionId.eq(collection_id))
            .filter(PurchasedLeadColumn::LeadKey.eq(lead_key))
            .count(self.read_conn())
            .await?;

        Ok(count > 0)
    }

    /// Fetch every lead key a user owns in a collection
    pub async fn purchased_keys(
        &self,
        user_id: Uuid,
        collection_id: Uuid,
    ) -> Result<HashSet<String>> {
        let leads = PurchasedLeadEntity::find()
            .filter(PurchasedLeadColumn::UserId.eq(user_id))
            .filter(PurchasedLeadColumn::CollectionId.eq(collection_id))
            .all(self.read_conn())
            .await?;

        Ok(leads.into_iter().map(|l| l.lead_key).collect())
    }

    /// Record purchased leads, ignoring duplicates
    ///
    /// Returns the number of rows actually inserted. A key already present
    /// for (user, collection) is left untouched: duplicates are expected
    /// under retry and under concurrent orders, and must never error or
    /// overwrite.
    pub async fn insert_purchased_leads(
        &self,
        user_id: Uuid,
        collection_id: Uuid,
        order_id: Uuid,
        lead_keys: &[String],
    ) -> Result<u64> {
        let now = chrono::Utc::now();
        let mut recorded = 0u64;

        for key in lead_keys {
            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                r#"
                INSERT INTO purchased_leads (id, user_id, collection_id, lead_key, order_id, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (user_id, collection_id, lead_key) DO NOTHING
                "#,
                vec![
                    Uuid::new_v4().into(),
                    user_id.into(),
                    collection_id.into(),
                    key.clone().into(),
                    order_id.into(),
                    now.into(),
                ],
            );

            let result = self.write_conn().execute(stmt).await?;
            recorded += result.rows_affected();
        }

        Ok(recorded)
    }

    // ========================================================================
    // Delivery File Operations
    // ========================================================================

    /// Create a delivery file in waiting state
    ///
    /// The id is caller-supplied because the storage path is derived from it
    /// before the record exists.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_delivery_file(
        &self,
        id: Uuid,
        user_id: Uuid,
        title: String,
        file_type: String,
        countries: serde_json::Value,
        collection_id: Uuid,
        unit_price_cents: i64,
        volume: i64,
        columns: serde_json::Value,
        lead_keys: serde_json::Value,
        storage_path: String,
        order_id: Uuid,
    ) -> Result<DeliveryFile> {
        let file = DeliveryFileActiveModel {
            id: Set(id),
            user_id: Set(user_id),
            title: Set(title),
            file_type: Set(file_type),
            countries: Set(countries),
            collection_id: Set(collection_id),
            unit_price_cents: Set(unit_price_cents),
            volume: Set(volume),
            columns: Set(columns),
            lead_keys: Set(lead_keys),
            status: Set(String::from(FileStatus::Waiting)),
            storage_path: Set(storage_path),
            order_id: Set(order_id),
            created_at: Set(chrono::Utc::now().into()),
        };

        file.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Flip a file to ready once its extract has been written
    pub async fn mark_file_ready(&self, file_id: Uuid) -> Result<()> {
        let mut file: DeliveryFileActiveModel = DeliveryFileEntity::find_by_id(file_id)
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::FileNotFound {
                id: file_id.to_string(),
            })?
            .into();

        file.status = Set(String::from(FileStatus::Ready));
        file.update(self.write_conn()).await?;

        Ok(())
    }

    /// Find file by ID
    pub async fn find_file_by_id(&self, id: Uuid) -> Result<Option<DeliveryFile>> {
        DeliveryFileEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Get all files belonging to an order
    pub async fn files_for_order(&self, order_id: Uuid) -> Result<Vec<DeliveryFile>> {
        DeliveryFileEntity::find()
            .filter(DeliveryFileColumn::OrderId.eq(order_id))
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Order Operations
    // ========================================================================

    /// Create an unpaid order
    pub async fn create_order(
        &self,
        user_id: Uuid,
        volume: i64,
        price_cents: i64,
    ) -> Result<Order> {
        let order = OrderActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            volume: Set(volume),
            price_cents: Set(price_cents),
            status: Set(String::from(OrderStatus::Unpaid)),
            payment_method: Set(None),
            receipts: Set(serde_json::json!([])),
            created_at: Set(chrono::Utc::now().into()),
            paid_at: Set(None),
        };

        order.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Find order by ID
    pub async fn find_order_by_id(&self, id: Uuid) -> Result<Option<Order>> {
        OrderEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// List a user's orders with pagination
    pub async fn list_orders(
        &self,
        user_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<Order>, u64)> {
        let paginator = OrderEntity::find()
            .filter(OrderColumn::UserId.eq(user_id))
            .order_by_desc(OrderColumn::CreatedAt)
            .paginate(self.read_conn(), limit);

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(offset / limit).await?;

        Ok((orders, total))
    }

    /// Flip an order unpaid -> paid exactly once
    ///
    /// Returns true if this call performed the transition, false if the
    /// order was already paid (a concurrent or repeated finalization).
    pub async fn mark_order_paid(&self, order_id: Uuid, method: PaymentMethod) -> Result<bool> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE orders
            SET status = 'paid', payment_method = $2, paid_at = $3
            WHERE id = $1 AND status = 'unpaid'
            "#,
            vec![
                order_id.into(),
                String::from(method).into(),
                chrono::Utc::now().into(),
            ],
        );

        let result = self.write_conn().execute(stmt).await?;
        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // Wallet Operations
    // ========================================================================

    /// Create a wallet transaction
    pub async fn create_transaction(
        &self,
        user_id: Uuid,
        kind: TransactionKind,
        amount_cents: i64,
        status: TransactionStatus,
        order_id: Option<Uuid>,
        reference: Option<String>,
    ) -> Result<WalletTransaction> {
        let now = chrono::Utc::now();
        let completed_at = match status {
            TransactionStatus::Completed => Some(now.into()),
            _ => None,
        };

        let txn = WalletTransactionActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            kind: Set(String::from(kind)),
            amount_cents: Set(amount_cents),
            status: Set(String::from(status)),
            order_id: Set(order_id),
            reference: Set(reference),
            created_at: Set(now.into()),
            completed_at: Set(completed_at),
        };

        txn.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Find transaction by ID
    pub async fn find_transaction_by_id(&self, id: Uuid) -> Result<Option<WalletTransaction>> {
        WalletTransactionEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// List a user's transactions with pagination
    pub async fn list_transactions(
        &self,
        user_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<WalletTransaction>, u64)> {
        let paginator = WalletTransactionEntity::find()
            .filter(WalletTransactionColumn::UserId.eq(user_id))
            .order_by_desc(WalletTransactionColumn::CreatedAt)
            .paginate(self.read_conn(), limit);

        let total = paginator.num_items().await?;
        let transactions = paginator.fetch_page(offset / limit).await?;

        Ok((transactions, total))
    }

    /// Current balance: sum of completed transaction amounts
    pub async fn balance(&self, user_id: Uuid) -> Result<i64> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            SELECT COALESCE(SUM(amount_cents), 0)::bigint AS balance
            FROM wallet_transactions
            WHERE user_id = $1 AND status = 'completed'
            "#,
            vec![user_id.into()],
        );

        let row = self
            .read_conn()
            .query_one(stmt)
            .await?
            .ok_or_else(|| AppError::Internal {
                message: "Balance query returned no row".to_string(),
            })?;

        row.try_get_by_index::<i64>(0)
            .map_err(|e| AppError::Database(e.into()))
    }

    /// Approve a waiting top-up exactly once
    ///
    /// Returns true if this call completed the transaction, false if it was
    /// already completed or is not a waiting top-up.
    pub async fn approve_topup(&self, transaction_id: Uuid) -> Result<bool> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE wallet_transactions
            SET status = 'completed', completed_at = $2
            WHERE id = $1 AND status = 'waiting' AND kind = 'topup'
            "#,
            vec![transaction_id.into(), chrono::Utc::now().into()],
        );

        let result = self.write_conn().execute(stmt).await?;
        Ok(result.rows_affected() > 0)
    }
}
