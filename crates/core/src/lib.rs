//! Core of the Procura purchasing assistant: configuration, error taxonomy,
//! the loose record model and the heuristic search services the assistant's
//! functions call into.

pub mod config;
pub mod domain;
pub mod errors;
pub mod search;
pub mod services;
pub mod store;

pub use domain::criteria::{InvoiceCriteria, PriceListCriteria, PurchaseOrderCriteria};
pub use domain::order::{CreateOrderOutcome, CreateOrderRequest, OrderRow, RowRejection};
pub use domain::record::{CellValue, LooseRecord, RecordBatch};
pub use domain::session::SessionState;
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use search::{SearchError, SearchResult};
pub use services::{
    availability, DataAvailability, InvoiceService, PriceListService, PurchaseOrderService,
};
pub use store::{ArtifactHandle, ArtifactSink, CollectionKey, RecordDomain, RecordStore, StoreError};
