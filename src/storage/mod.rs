//!
//! contactbook storage module
//! --------------------------
//! The `DirectoryStore` trait is the only seam between the resource services and
//! persistence. It exposes point lookups, scoped updates/deletes, and paged
//! listings for the three tables (users, contacts, addresses).
//!
//! Key responsibilities:
//! - Record and patch types shared by every backend.
//! - Ownership-scoped keys (`ContactKey`, `AddressKey`): every by-key call on a
//!   contact or address takes one, and only the ownership guard mints them.
//! - Listings return the page slice and the total count for the same predicate,
//!   computed from one consistent snapshot.
//!
//! `MemoryStore` is the bundled backend; it is wrapped in an `Arc<dyn DirectoryStore>`
//! (`SharedDirectory`) and handed to each service at construction.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::query::filter::ContactFilter;

mod memory;
mod snapshot;

pub use memory::MemoryStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{what} '{key}' already exists")]
    Duplicate { what: String, key: String },
    #[error("{what} '{key}' does not exist")]
    RowNotFound { what: String, key: String },
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

impl StoreError {
    pub(crate) fn duplicate(what: &str, key: impl ToString) -> Self {
        StoreError::Duplicate { what: what.to_string(), key: key.to_string() }
    }
    pub(crate) fn row_not_found(what: &str, key: impl ToString) -> Self {
        StoreError::RowNotFound { what: what.to_string(), key: key.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub full_name: String,
    pub password_hash: String,
    #[serde(default)]
    pub session_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub full_name: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub full_name: Option<String>,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: i64,
    pub owner: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewContact {
    pub owner: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Explicit partial update: only `Some` fields are written.
#[derive(Debug, Clone, Default)]
pub struct ContactPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl ContactPatch {
    pub fn apply(&self, c: &mut Contact) {
        if let Some(v) = &self.first_name { c.first_name = v.clone(); }
        if let Some(v) = &self.last_name { c.last_name = Some(v.clone()); }
        if let Some(v) = &self.email { c.email = Some(v.clone()); }
        if let Some(v) = &self.phone { c.phone = Some(v.clone()); }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: i64,
    pub contact_id: i64,
    pub street: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub country: String,
    pub postal_code: String,
}

#[derive(Debug, Clone)]
pub struct NewAddress {
    pub street: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub country: String,
    pub postal_code: String,
}

#[derive(Debug, Clone, Default)]
pub struct AddressPatch {
    pub street: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
}

impl AddressPatch {
    pub fn apply(&self, a: &mut Address) {
        if let Some(v) = &self.street { a.street = Some(v.clone()); }
        if let Some(v) = &self.city { a.city = Some(v.clone()); }
        if let Some(v) = &self.province { a.province = Some(v.clone()); }
        if let Some(v) = &self.country { a.country = v.clone(); }
        if let Some(v) = &self.postal_code { a.postal_code = v.clone(); }
    }
}

/// Composite key for a contact: the id is never used without its owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContactKey {
    id: i64,
    owner: String,
}

impl ContactKey {
    pub(crate) fn new(id: i64, owner: impl Into<String>) -> Self { Self { id, owner: owner.into() } }
    pub fn id(&self) -> i64 { self.id }
    pub fn owner(&self) -> &str { &self.owner }
}

/// Composite key for an address. Carries the parent contact key, so holding one
/// means the whole Address -> Contact -> User chain was checked.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AddressKey {
    id: i64,
    contact: ContactKey,
}

impl AddressKey {
    pub(crate) fn new(id: i64, contact: ContactKey) -> Self { Self { id, contact } }
    pub fn id(&self) -> i64 { self.id }
    pub fn contact_id(&self) -> i64 { self.contact.id }
    pub fn contact(&self) -> &ContactKey { &self.contact }
}

/// skip/take pair handed to a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: u64,
    pub limit: u64,
}

/// Page slice plus the total row count matching the same predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice<T> {
    pub rows: Vec<T>,
    pub total: u64,
}

pub trait DirectoryStore: Send + Sync {
    fn insert_user(&self, user: NewUser) -> StoreResult<User>;
    fn find_user(&self, username: &str) -> StoreResult<Option<User>>;
    fn find_user_by_token(&self, token: &str) -> StoreResult<Option<User>>;
    /// Replace the user's single live session token.
    fn set_session_token(&self, username: &str, token: &str) -> StoreResult<()>;
    /// Clear the user's token only if it is still `token`. Returns whether it was cleared.
    fn clear_session_token(&self, username: &str, token: &str) -> StoreResult<bool>;
    /// Apply a profile patch to whichever user currently holds `token`.
    /// Returns `None` when no user holds it any more.
    fn update_user_for_session(&self, token: &str, patch: &UserPatch) -> StoreResult<Option<User>>;

    fn insert_contact(&self, contact: NewContact) -> StoreResult<Contact>;
    fn find_contact(&self, key: &ContactKey) -> StoreResult<Option<Contact>>;
    fn update_contact(&self, key: &ContactKey, patch: &ContactPatch) -> StoreResult<Contact>;
    /// Deletes the contact and every address under it.
    fn delete_contact(&self, key: &ContactKey) -> StoreResult<()>;
    fn page_contacts(&self, filter: &ContactFilter, window: Window) -> StoreResult<Slice<Contact>>;

    fn insert_address(&self, parent: &ContactKey, address: NewAddress) -> StoreResult<Address>;
    fn find_address(&self, key: &AddressKey) -> StoreResult<Option<Address>>;
    fn update_address(&self, key: &AddressKey, patch: &AddressPatch) -> StoreResult<Address>;
    fn delete_address(&self, key: &AddressKey) -> StoreResult<()>;
    fn page_addresses(&self, parent: &ContactKey, window: Window) -> StoreResult<Slice<Address>>;
}

pub type SharedDirectory = Arc<dyn DirectoryStore>;
