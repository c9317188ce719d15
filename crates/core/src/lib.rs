pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod pricing;

pub use catalog::Catalog;
pub use domain::customer::CustomerDetails;
pub use domain::order::{
    ForwardingReceipt, Order, OrderId, OrderLine, OrderRecord, OrderStatistics, OrderStatus,
    OrderTotals,
};
pub use domain::product::{OfferTag, Product, ProductCode};
pub use domain::selection::{Selection, SelectionEntry};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use pricing::{
    validate_submission, DeterministicPricingEngine, PricedOrder, PricingEngine, SubmissionError,
    SubmissionViolation,
};
