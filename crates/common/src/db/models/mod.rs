//! SeaORM entity models
//!
//! Database entities for the LeadForge marketplace

mod collection;
mod data_table;
mod delivery_file;
mod order;
mod purchased_lead;
mod table_row;
mod wallet_transaction;

pub use collection::{
    Entity as CollectionEntity,
    Model as Collection,
    ActiveModel as CollectionActiveModel,
    Column as CollectionColumn,
    CollectionStatus,
    ProductType,
};

pub use data_table::{
    Entity as DataTableEntity,
    Model as DataTable,
    ActiveModel as DataTableActiveModel,
    Column as DataTableColumn,
};

pub use table_row::{
    Entity as TableRowEntity,
    Model as TableRow,
    ActiveModel as TableRowActiveModel,
    Column as TableRowColumn,
};

pub use purchased_lead::{
    Entity as PurchasedLeadEntity,
    Model as PurchasedLead,
    ActiveModel as PurchasedLeadActiveModel,
    Column as PurchasedLeadColumn,
};

pub use delivery_file::{
    Entity as DeliveryFileEntity,
    Model as DeliveryFile,
    ActiveModel as DeliveryFileActiveModel,
    Column as DeliveryFileColumn,
    FileStatus,
};

pub use order::{
    Entity as OrderEntity,
    Model as Order,
    ActiveModel as OrderActiveModel,
    Column as OrderColumn,
    OrderStatus,
    PaymentMethod,
};

pub use wallet_transaction::{
    Entity as WalletTransactionEntity,
    Model as WalletTransaction,
    ActiveModel as WalletTransactionActiveModel,
    Column as WalletTransactionColumn,
    TransactionKind,
    TransactionStatus,
};
