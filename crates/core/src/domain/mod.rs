pub mod criteria;
pub mod order;
pub mod record;
pub mod session;

pub use criteria::{InvoiceCriteria, PriceListCriteria, PurchaseOrderCriteria};
pub use order::{CreateOrderOutcome, CreateOrderRequest, OrderRow, RowRejection};
pub use record::{CellValue, LooseRecord, RecordBatch};
pub use session::SessionState;
