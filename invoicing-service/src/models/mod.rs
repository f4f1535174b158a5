//! Domain models for invoicing-service.

mod article;
mod idempotency;
mod invoice;
mod party;
mod payment;
mod tenant;
mod version;

pub use article::{Article, ArticleUpdate, CreateArticle};
pub use idempotency::IdempotencyRecord;
pub use invoice::{
    ConvertInvoice, CreateInvoice, Invoice, InvoiceDetail, InvoiceItem, InvoiceItemInput,
    ListInvoicesQuery, PublishInvoice, UpdateInvoice,
};
pub use party::{
    CreateCustomer, CreateSupplier, Customer, CustomerUpdate, Supplier, SupplierUpdate,
};
pub use payment::{CreatePayment, Payment};
pub use tenant::{Claims, TenantContext};
pub use version::{InvoiceSnapshot, InvoiceVersion};
