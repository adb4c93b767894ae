//! Storage-agnostic query building: contact search filters and pagination.

pub mod filter;
pub mod page;

pub use filter::{compile, normalize_phone, Clause, Condition, ContactField, ContactFilter, ContactSearch, Operator};
pub use page::{paginate, PageDescriptor, PageRequest, Paged, DEFAULT_PAGE, DEFAULT_PAGE_SIZE};
