//! Order pricing and building
//!
//! The build pipeline, as a pure computation plus a commit step:
//!
//! 1. resolve the selected columns and their live source tables
//! 2. scan rows, merge multi-table sources by natural key, apply filters
//! 3. exclude leads the user already purchased (best-effort pre-filter)
//! 4. enforce the requested volume, failing on insufficient inventory
//! 5. price the delivered volume
//! 6. commit: order + delivery file + extract; the ledger is written only
//!    when payment is finalized
//!
//! Payment finalization is idempotent: ledger inserts ignore duplicates and
//! the unpaid->paid flip is a conditional update, so a retried or concurrent
//! finalization neither double counts nor double charges.

use crate::catalog::{self, ColumnDef};
use crate::extract::{extract_path, ExtractWriter};
use crate::ledger::{lead_key, PurchasedLedger};
use crate::pricing::{self, Quote};
use crate::selection::{self, Selection};
use leadforge_common::db::models::{DeliveryFile, Order, PaymentMethod, TransactionKind, TransactionStatus};
use leadforge_common::db::Repository;
use leadforge_common::errors::{AppError, Result};
use leadforge_common::metrics;
use leadforge_common::notify::{Notifier, OrderEvent};
use leadforge_common::MAX_ORDER_VOLUME;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// A requested order build
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub collection_id: Uuid,
    pub user_id: Uuid,
    pub selection: Selection,
    pub volume: u64,
    pub title: Option<String>,
}

/// A committed draft order
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub order: Order,
    pub file: DeliveryFile,
    pub quote: Quote,
}

/// Candidate rows keyed by lead identity
///
/// A BTreeMap so truncation order is deterministic: two identical builds
/// deliver identical rows.
pub type CandidateSet = BTreeMap<String, HashMap<String, String>>;

/// Merge per-table rows into candidates aligned by natural key
///
/// Each row's lead key is derived from its own fields; rows missing a
/// natural-key field have no stable identity and are skipped. When several
/// tables contribute the same logical column for the same lead, the first
/// table's value wins.
pub fn merge_candidates(
    selected: &[&ColumnDef],
    natural_key: &[String],
    table_rows: &HashMap<Uuid, Vec<HashMap<String, String>>>,
) -> CandidateSet {
    let mut candidates: CandidateSet = BTreeMap::new();

    for (table_id, rows) in table_rows {
        // Logical columns fed by this table, with their underlying names
        let projections: Vec<(&ColumnDef, &str)> = selected
            .iter()
            .filter_map(|c| c.source.column_in_table(*table_id).map(|u| (*c, u)))
            .collect();

        if projections.is_empty() {
            continue;
        }

        for row in rows {
            let Some(key) = lead_key(natural_key, row) else {
                continue;
            };

            let candidate = candidates.entry(key).or_default();
            for (column, underlying) in &projections {
                if let Some(value) = row.get(*underlying) {
                    candidate
                        .entry(column.name.clone())
                        .or_insert_with(|| value.clone());
                }
            }
        }
    }

    candidates
}

/// Verify every selected column still has at least one live source table
///
/// A column whose referenced tables are all gone is a catalog integrity
/// problem, not a user input problem, and is reported distinctly.
pub fn ensure_sources_resolvable(
    selected: &[&ColumnDef],
    live_tables: &HashSet<Uuid>,
) -> Result<()> {
    for column in selected {
        let resolvable = column
            .source
            .refs()
            .iter()
            .any(|r| live_tables.contains(&r.table_id));
        if !resolvable {
            return Err(AppError::Configuration {
                message: format!(
                    "Column {} ('{}') has no remaining source table",
                    column.id, column.name
                ),
            });
        }
    }

    Ok(())
}

/// Drop candidates failing any applicable filter
pub fn apply_filters(
    mut candidates: CandidateSet,
    selected: &[&ColumnDef],
    filters: &Selection,
) -> CandidateSet {
    candidates.retain(|_, values| {
        selected.iter().all(|column| match filters.get(&column.id) {
            Some(filter) => selection::matches(
                filter,
                column.data_type,
                values.get(&column.name).map(String::as_str),
            ),
            None => true,
        })
    });

    candidates
}

/// Drop candidates the user already owns
pub fn exclude_purchased(mut candidates: CandidateSet, owned: &HashSet<String>) -> CandidateSet {
    candidates.retain(|key, _| !owned.contains(key));
    candidates
}

/// Truncate to the requested volume, or fail on insufficient inventory
///
/// Under-delivery is never silent: pricing is volume-based, so delivering
/// fewer rows than requested would bill for inventory that was never
/// available.
pub fn enforce_volume(
    candidates: CandidateSet,
    requested: u64,
) -> Result<Vec<(String, HashMap<String, String>)>> {
    let available = candidates.len() as u64;
    if available < requested {
        return Err(AppError::InsufficientInventory {
            requested,
            available,
        });
    }

    Ok(candidates.into_iter().take(requested as usize).collect())
}

/// Builds priced, deduplicated orders and finalizes their payment
pub struct OrderBuilder {
    repository: Repository,
    ledger: PurchasedLedger,
    writer: Arc<dyn ExtractWriter>,
    notifier: Arc<dyn Notifier>,
    extract_dir: PathBuf,
}

impl OrderBuilder {
    pub fn new(
        repository: Repository,
        writer: Arc<dyn ExtractWriter>,
        notifier: Arc<dyn Notifier>,
        extract_dir: PathBuf,
    ) -> Self {
        let ledger = PurchasedLedger::new(repository.clone());
        Self {
            repository,
            ledger,
            writer,
            notifier,
            extract_dir,
        }
    }

    /// Run the full build pipeline and commit the draft order
    #[instrument(skip(self, request), fields(collection_id = %request.collection_id, user_id = %request.user_id, volume = request.volume))]
    pub async fn build(&self, request: BuildRequest) -> Result<BuildOutcome> {
        let started = Instant::now();

        let outcome = self.run_build(&request).await;

        match &outcome {
            Ok(built) => {
                metrics::record_build(started.elapsed().as_secs_f64(), built.quote.volume);
                info!(
                    order_id = %built.order.id,
                    file_id = %built.file.id,
                    delivered = built.quote.volume,
                    total_cents = built.quote.total_cents,
                    "Order built"
                );
            }
            Err(e) => {
                metrics::record_build_failure(&format!("{:?}", e.code()));
            }
        }

        outcome
    }

    async fn run_build(&self, request: &BuildRequest) -> Result<BuildOutcome> {
        if request.volume == 0 || request.volume > MAX_ORDER_VOLUME {
            return Err(AppError::InvalidSelection {
                message: format!(
                    "Requested volume must be between 1 and {}",
                    MAX_ORDER_VOLUME
                ),
            });
        }

        // Step 1: resolve collection, columns and live source tables
        let collection = self
            .repository
            .find_collection_by_id(request.collection_id)
            .await?
            .ok_or_else(|| AppError::CollectionNotFound {
                id: request.collection_id.to_string(),
            })?;

        if !collection.is_active() {
            return Err(AppError::Conflict {
                message: format!("Collection {} is not active", collection.id),
            });
        }

        let columns = catalog::decode_columns(&collection.columns)?;
        let natural_key = collection.natural_key_fields();
        let selected = selection::validate_selection(&columns, &request.selection)?;

        if selected.is_empty() {
            return Err(AppError::InvalidSelection {
                message: "No columns selected".to_string(),
            });
        }

        let referenced = catalog::distinct_table_ids_of(&selected);
        let tables = self.repository.find_tables_by_ids(&referenced).await?;
        let live: HashSet<Uuid> = tables.iter().map(|t| t.id).collect();
        ensure_sources_resolvable(&selected, &live)?;

        // Step 2: scan rows and assemble filtered candidates
        let mut table_rows: HashMap<Uuid, Vec<HashMap<String, String>>> = HashMap::new();
        for table in &tables {
            let rows = self.repository.get_table_rows(table.id).await?;
            table_rows.insert(table.id, rows.iter().map(|r| r.field_map()).collect());
        }

        let candidates = merge_candidates(&selected, &natural_key, &table_rows);
        let candidates = apply_filters(candidates, &selected, &request.selection);

        // Step 3: best-effort purchased-lead exclusion; the unique ledger
        // constraint remains the binding guard at finalization
        let owned = self
            .ledger
            .purchased_keys(request.user_id, request.collection_id)
            .await?;
        let eligible = exclude_purchased(candidates, &owned);

        // Step 4: volume enforcement
        let delivered = enforce_volume(eligible, request.volume)?;

        // Step 5: pricing on the delivered volume
        let quote = pricing::quote(
            collection.fee_cents,
            collection.discount_cents,
            &selected,
            delivered.len() as u64,
        );

        // Step 6: commit order, file and extract
        let delivered_columns: Vec<String> = selected
            .iter()
            .filter(|c| c.visible)
            .map(|c| c.name.clone())
            .collect();

        let lead_keys: Vec<String> = delivered.iter().map(|(key, _)| key.clone()).collect();
        let extract_rows: Vec<Vec<String>> = delivered
            .iter()
            .map(|(_, values)| {
                delivered_columns
                    .iter()
                    .map(|name| values.get(name).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();

        let order = self
            .repository
            .create_order(request.user_id, quote.volume as i64, quote.total_cents)
            .await?;

        let file_id = Uuid::new_v4();
        let path = extract_path(&self.extract_dir, request.user_id, file_id);
        let title = request
            .title
            .clone()
            .unwrap_or_else(|| collection.title.clone());

        let file = self
            .repository
            .create_delivery_file(
                file_id,
                request.user_id,
                title,
                "csv".to_string(),
                collection.countries.clone(),
                collection.id,
                quote.unit_price_cents,
                quote.volume as i64,
                serde_json::json!(delivered_columns),
                serde_json::json!(lead_keys),
                path.to_string_lossy().to_string(),
                order.id,
            )
            .await?;

        self.writer
            .write_extract(&delivered_columns, &extract_rows, &path)
            .await?;
        self.repository.mark_file_ready(file.id).await?;

        self.notify_created(&order, collection.id);

        Ok(BuildOutcome { order, file, quote })
    }

    /// Finalize a paid order: record the ledger, flip the status, book the
    /// wallet movement
    ///
    /// Safe to call repeatedly; only the call that performs the
    /// unpaid->paid flip books the transaction and emits the event.
    #[instrument(skip(self))]
    pub async fn finalize_paid(
        &self,
        order_id: Uuid,
        method: PaymentMethod,
        reference: Option<String>,
    ) -> Result<Order> {
        let order = self
            .repository
            .find_order_by_id(order_id)
            .await?
            .ok_or_else(|| AppError::OrderNotFound {
                id: order_id.to_string(),
            })?;

        if order.is_paid() {
            return Ok(order);
        }

        let files = self.repository.files_for_order(order_id).await?;

        // Ledger first, flip second: a paid order must always have a fully
        // recorded ledger, and the inserts are idempotent under resume.
        for file in &files {
            let keys = file.delivered_lead_keys();
            self.ledger
                .record_purchases(order.user_id, file.collection_id, order_id, &keys)
                .await?;
        }

        let flipped = self
            .repository
            .mark_order_paid(order_id, method.clone())
            .await?;

        if flipped {
            // Only balance payments move wallet money; card funds settle at
            // the provider and never touch the balance ledger.
            if method == PaymentMethod::Balance {
                self.repository
                    .create_transaction(
                        order.user_id,
                        TransactionKind::Order,
                        -order.price_cents,
                        TransactionStatus::Completed,
                        Some(order_id),
                        reference.clone(),
                    )
                    .await?;
            }

            metrics::record_order_paid(order.price_cents, &String::from(method));
            info!(
                order_id = %order_id,
                reference = reference.as_deref().unwrap_or("-"),
                "Order paid"
            );

            if let Some(file) = files.first() {
                self.notify_paid(&order, file.collection_id);
            }
        } else {
            warn!(order_id = %order_id, "Order was finalized concurrently");
        }

        self.repository
            .find_order_by_id(order_id)
            .await?
            .ok_or_else(|| AppError::OrderNotFound {
                id: order_id.to_string(),
            })
    }

    /// Pay an unpaid order from the user's balance
    #[instrument(skip(self))]
    pub async fn pay_with_balance(&self, order_id: Uuid, user_id: Uuid) -> Result<Order> {
        let order = self
            .repository
            .find_order_by_id(order_id)
            .await?
            .ok_or_else(|| AppError::OrderNotFound {
                id: order_id.to_string(),
            })?;

        if order.user_id != user_id {
            return Err(AppError::Forbidden {
                message: "Order belongs to another user".to_string(),
            });
        }

        if order.is_paid() {
            return Err(AppError::Conflict {
                message: format!("Order {} is already paid", order_id),
            });
        }

        let balance = self.repository.balance(user_id).await?;
        if balance < order.price_cents {
            return Err(AppError::InsufficientFunds {
                balance_cents: balance,
                required_cents: order.price_cents,
            });
        }

        self.finalize_paid(order_id, PaymentMethod::Balance, None).await
    }

    fn notify_created(&self, order: &Order, collection_id: Uuid) {
        let notifier = Arc::clone(&self.notifier);
        let event = OrderEvent {
            order_id: order.id,
            user_id: order.user_id,
            collection_id,
            volume: order.volume,
            price_cents: order.price_cents,
        };

        // Fire and forget; delivery failures are logged by the notifier
        tokio::spawn(async move {
            notifier.order_created(&event).await;
        });
    }

    fn notify_paid(&self, order: &Order, collection_id: Uuid) {
        let notifier = Arc::clone(&self.notifier);
        let event = OrderEvent {
            order_id: order.id,
            user_id: order.user_id,
            collection_id,
            volume: order.volume,
            price_cents: order.price_cents,
        };

        tokio::spawn(async move {
            notifier.order_paid(&event).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnSource, DataType, TableColumnRef};
    use crate::selection::ColumnFilter;

    fn column(id: u32, name: &str, table_id: Uuid, underlying: &str) -> ColumnDef {
        ColumnDef {
            id,
            name: name.to_string(),
            data_type: DataType::Text,
            visible: true,
            required: true,
            extra_fee_cents: None,
            step: String::new(),
            source: ColumnSource::Single(TableColumnRef {
                table_id,
                column: underlying.to_string(),
            }),
        }
    }

    fn merged_column(id: u32, name: &str, refs: Vec<(Uuid, &str)>) -> ColumnDef {
        ColumnDef {
            id,
            name: name.to_string(),
            data_type: DataType::Text,
            visible: true,
            required: true,
            extra_fee_cents: None,
            step: String::new(),
            source: ColumnSource::Merged {
                refs: refs
                    .into_iter()
                    .map(|(table_id, column)| TableColumnRef {
                        table_id,
                        column: column.to_string(),
                    })
                    .collect(),
            },
        }
    }

    fn row(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn natural_key() -> Vec<String> {
        vec!["email".to_string()]
    }

    #[test]
    fn test_merge_single_table() {
        let table_id = Uuid::new_v4();
        let email = column(1, "email", table_id, "email");
        let country = column(2, "country", table_id, "country");
        let selected = vec![&email, &country];

        let mut table_rows = HashMap::new();
        table_rows.insert(
            table_id,
            vec![
                row(&[("email", "a@b.com"), ("country", "US")]),
                row(&[("email", "c@d.com"), ("country", "CA")]),
            ],
        );

        let candidates = merge_candidates(&selected, &natural_key(), &table_rows);
        assert_eq!(candidates.len(), 2);
        for values in candidates.values() {
            assert!(values.contains_key("email"));
            assert!(values.contains_key("country"));
        }
    }

    #[test]
    fn test_merge_aligns_tables_by_natural_key() {
        let table_a = Uuid::new_v4();
        let table_b = Uuid::new_v4();
        let email = merged_column(1, "email", vec![(table_a, "email"), (table_b, "mail")]);
        let phone = column(2, "phone", table_b, "phone");
        let selected = vec![&email, &phone];

        let mut table_rows = HashMap::new();
        table_rows.insert(table_a, vec![row(&[("email", "a@b.com")])]);
        table_rows.insert(
            table_b,
            vec![row(&[("email", "a@b.com"), ("mail", "a@b.com"), ("phone", "555")])],
        );

        let candidates = merge_candidates(&selected, &natural_key(), &table_rows);

        // Same natural key in both tables: one candidate with both fields
        assert_eq!(candidates.len(), 1);
        let values = candidates.values().next().unwrap();
        assert_eq!(values.get("email").map(String::as_str), Some("a@b.com"));
        assert_eq!(values.get("phone").map(String::as_str), Some("555"));
    }

    #[test]
    fn test_merge_skips_rows_without_natural_key() {
        let table_id = Uuid::new_v4();
        let email = column(1, "email", table_id, "email");
        let selected = vec![&email];

        let mut table_rows = HashMap::new();
        table_rows.insert(
            table_id,
            vec![
                row(&[("email", "a@b.com")]),
                row(&[("country", "US")]), // no email: no identity
            ],
        );

        let candidates = merge_candidates(&selected, &natural_key(), &table_rows);
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_merge_deduplicates_identical_keys_within_table() {
        let table_id = Uuid::new_v4();
        let email = column(1, "email", table_id, "email");
        let selected = vec![&email];

        let mut table_rows = HashMap::new();
        table_rows.insert(
            table_id,
            vec![
                row(&[("email", "a@b.com")]),
                row(&[("email", "a@b.com")]),
            ],
        );

        let candidates = merge_candidates(&selected, &natural_key(), &table_rows);
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_filters_exclude_non_matching_rows() {
        let table_id = Uuid::new_v4();
        let email = column(1, "email", table_id, "email");
        let country = column(2, "country", table_id, "country");
        let selected = vec![&email, &country];

        let mut table_rows = HashMap::new();
        table_rows.insert(
            table_id,
            vec![
                row(&[("email", "a@b.com"), ("country", "US")]),
                row(&[("email", "c@d.com"), ("country", "DE")]),
            ],
        );

        let candidates = merge_candidates(&selected, &natural_key(), &table_rows);

        let filters: Selection = [(
            2,
            ColumnFilter::Values {
                values: ["US".to_string()].into_iter().collect(),
            },
        )]
        .into_iter()
        .collect();

        let filtered = apply_filters(candidates, &selected, &filters);
        assert_eq!(filtered.len(), 1);
        assert_eq!(
            filtered.values().next().unwrap().get("country").map(String::as_str),
            Some("US")
        );
    }

    #[test]
    fn test_purchased_leads_excluded() {
        let table_id = Uuid::new_v4();
        let email = column(1, "email", table_id, "email");
        let selected = vec![&email];
        let key = natural_key();

        // 25 candidates, 5 of them already owned
        let rows: Vec<HashMap<String, String>> = (0..25)
            .map(|i| row(&[("email", format!("user{}@x.com", i).as_str())]))
            .collect();
        let mut table_rows = HashMap::new();
        table_rows.insert(table_id, rows);

        let candidates = merge_candidates(&selected, &key, &table_rows);
        assert_eq!(candidates.len(), 25);

        let owned: HashSet<String> = candidates.keys().take(5).cloned().collect();
        let eligible = exclude_purchased(candidates, &owned);

        assert_eq!(eligible.len(), 20);
        for owned_key in &owned {
            assert!(!eligible.contains_key(owned_key));
        }

        // Requesting exactly the remaining 20 succeeds
        let delivered = enforce_volume(eligible, 20).unwrap();
        assert_eq!(delivered.len(), 20);
        for (delivered_key, _) in &delivered {
            assert!(!owned.contains(delivered_key));
        }
    }

    #[test]
    fn test_all_source_tables_deleted_is_configuration_error() {
        let deleted = Uuid::new_v4();
        let email = column(1, "email", deleted, "email");
        let selected = vec![&email];

        let err = ensure_sources_resolvable(&selected, &HashSet::new()).unwrap_err();
        assert!(matches!(err, AppError::Configuration { .. }));
    }

    #[test]
    fn test_one_live_table_keeps_merged_column_resolvable() {
        let live = Uuid::new_v4();
        let deleted = Uuid::new_v4();
        let email = merged_column(1, "email", vec![(deleted, "email"), (live, "mail")]);
        let selected = vec![&email];

        let live_tables: HashSet<Uuid> = [live].into_iter().collect();
        assert!(ensure_sources_resolvable(&selected, &live_tables).is_ok());
    }

    #[test]
    fn test_insufficient_inventory_fails() {
        let table_id = Uuid::new_v4();
        let email = column(1, "email", table_id, "email");
        let selected = vec![&email];

        let rows: Vec<HashMap<String, String>> = (0..30)
            .map(|i| row(&[("email", format!("user{}@x.com", i).as_str())]))
            .collect();
        let mut table_rows = HashMap::new();
        table_rows.insert(table_id, rows);

        let candidates = merge_candidates(&selected, &natural_key(), &table_rows);

        let err = enforce_volume(candidates, 50).unwrap_err();
        match err {
            AppError::InsufficientInventory { requested, available } => {
                assert_eq!(requested, 50);
                assert_eq!(available, 30);
            }
            other => panic!("Expected InsufficientInventory, got {:?}", other.code()),
        }
    }

    #[test]
    fn test_volume_truncation_is_deterministic() {
        let table_id = Uuid::new_v4();
        let email = column(1, "email", table_id, "email");
        let selected = vec![&email];

        let rows: Vec<HashMap<String, String>> = (0..10)
            .map(|i| row(&[("email", format!("user{}@x.com", i).as_str())]))
            .collect();
        let mut table_rows = HashMap::new();
        table_rows.insert(table_id, rows);

        let a = merge_candidates(&selected, &natural_key(), &table_rows);
        let b = merge_candidates(&selected, &natural_key(), &table_rows);

        let delivered_a = enforce_volume(a, 4).unwrap();
        let delivered_b = enforce_volume(b, 4).unwrap();

        let keys_a: Vec<&String> = delivered_a.iter().map(|(k, _)| k).collect();
        let keys_b: Vec<&String> = delivered_b.iter().map(|(k, _)| k).collect();
        assert_eq!(keys_a, keys_b);
    }
}
