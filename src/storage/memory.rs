use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    snapshot, Address, AddressKey, AddressPatch, Contact, ContactKey, ContactPatch, DirectoryStore, NewAddress,
    NewContact, NewUser, Slice, StoreError, StoreResult, User, UserPatch, Window,
};
use crate::query::filter::{Condition, ContactField, ContactFilter, Operator};

/// All rows of the directory. Ordered maps keep listings in id order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Tables {
    users: BTreeMap<String, User>,
    contacts: BTreeMap<i64, Contact>,
    addresses: BTreeMap<i64, Address>,
    next_contact_id: i64,
    next_address_id: i64,
    /// session token -> username; rebuilt from `users` on load
    #[serde(skip)]
    tokens: HashMap<String, String>,
}

impl Tables {
    fn reindex(&mut self) {
        self.tokens = self
            .users
            .values()
            .filter_map(|u| u.session_token.as_ref().map(|t| (t.clone(), u.username.clone())))
            .collect();
    }

    fn owned_contact(&self, key: &ContactKey) -> Option<&Contact> {
        self.contacts.get(&key.id()).filter(|c| c.owner == key.owner())
    }

    fn owned_address(&self, key: &AddressKey) -> Option<&Address> {
        self.owned_contact(key.contact())?;
        self.addresses.get(&key.id()).filter(|a| a.contact_id == key.contact_id())
    }
}

/// In-process transactional directory.
///
/// A single `RwLock` guards every table: reads of a listing (count and slice)
/// share one read guard, and each mutation (including the contact -> address
/// cascade) runs under one write guard. When a snapshot path is configured a
/// mutation is applied to a staged copy, written out, and only then swapped in,
/// so a failed write leaves the live tables untouched.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    snapshot: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Open a store backed by a JSON snapshot file, loading it if it exists.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut tables = snapshot::load(&path)?.unwrap_or_default();
        tables.reindex();
        info!(
            target: "storage",
            "directory opened from {}: users={}, contacts={}, addresses={}",
            path.display(), tables.users.len(), tables.contacts.len(), tables.addresses.len()
        );
        Ok(Self { tables: Arc::new(RwLock::new(tables)), snapshot: Some(path) })
    }

    /// Run one mutation under the write guard. `change` must check before it
    /// writes; with a snapshot it runs on a copy that replaces the tables only
    /// after the snapshot is saved.
    fn commit<R>(&self, change: impl FnOnce(&mut Tables) -> StoreResult<R>) -> StoreResult<R> {
        let mut live = self.tables.write();
        let Some(path) = &self.snapshot else { return change(&mut *live); };
        let mut staged = (*live).clone();
        let out = change(&mut staged)?;
        snapshot::save(path, &staged)?;
        *live = staged;
        Ok(out)
    }
}

fn field_value(c: &Contact, field: ContactField) -> Option<&str> {
    match field {
        ContactField::Owner => Some(c.owner.as_str()),
        ContactField::FirstName => Some(c.first_name.as_str()),
        ContactField::LastName => c.last_name.as_deref(),
        ContactField::Email => c.email.as_deref(),
        ContactField::Phone => c.phone.as_deref(),
    }
}

fn condition_matches(c: &Contact, cond: &Condition) -> bool {
    let Some(v) = field_value(c, cond.field) else { return false; };
    match cond.operator {
        Operator::Equals => v == cond.value,
        Operator::Contains => v.contains(cond.value.as_str()),
    }
}

/// AND across clauses, OR within a clause.
fn filter_matches(c: &Contact, filter: &ContactFilter) -> bool {
    filter.clauses().iter().all(|clause| clause.any_of.iter().any(|cond| condition_matches(c, cond)))
}

fn to_usize(n: u64) -> usize { usize::try_from(n).unwrap_or(usize::MAX) }

impl DirectoryStore for MemoryStore {
    fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        self.commit(|t| {
            if t.users.contains_key(&user.username) {
                return Err(StoreError::duplicate("user", &user.username));
            }
            let row = User {
                username: user.username,
                full_name: user.full_name,
                password_hash: user.password_hash,
                session_token: None,
            };
            t.users.insert(row.username.clone(), row.clone());
            Ok(row)
        })
    }

    fn find_user(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self.tables.read().users.get(username).cloned())
    }

    fn find_user_by_token(&self, token: &str) -> StoreResult<Option<User>> {
        let t = self.tables.read();
        Ok(t.tokens.get(token).and_then(|u| t.users.get(u)).cloned())
    }

    fn set_session_token(&self, username: &str, token: &str) -> StoreResult<()> {
        self.commit(|t| {
            if t.tokens.get(token).is_some_and(|holder| holder != username) {
                return Err(StoreError::duplicate("session token", "<redacted>"));
            }
            let user = t.users.get_mut(username).ok_or_else(|| StoreError::row_not_found("user", username))?;
            let previous = user.session_token.replace(token.to_string());
            if let Some(old) = previous {
                t.tokens.remove(&old);
            }
            t.tokens.insert(token.to_string(), username.to_string());
            Ok(())
        })
    }

    fn clear_session_token(&self, username: &str, token: &str) -> StoreResult<bool> {
        {
            // nothing to write when the token is already gone or was replaced
            let t = self.tables.read();
            if !t.users.contains_key(username) {
                return Err(StoreError::row_not_found("user", username));
            }
            if !t.tokens.get(token).is_some_and(|holder| holder == username) {
                return Ok(false);
            }
        }
        self.commit(|t| {
            let Some(user) = t.users.get_mut(username) else { return Ok(false); };
            if user.session_token.as_deref() != Some(token) {
                return Ok(false);
            }
            user.session_token = None;
            t.tokens.remove(token);
            Ok(true)
        })
    }

    fn update_user_for_session(&self, token: &str, patch: &UserPatch) -> StoreResult<Option<User>> {
        self.commit(|t| {
            let Some(username) = t.tokens.get(token).cloned() else { return Ok(None); };
            let Some(user) = t.users.get_mut(&username) else { return Ok(None); };
            if let Some(name) = &patch.full_name { user.full_name = name.clone(); }
            if let Some(hash) = &patch.password_hash { user.password_hash = hash.clone(); }
            Ok(Some(user.clone()))
        })
    }

    fn insert_contact(&self, contact: NewContact) -> StoreResult<Contact> {
        self.commit(|t| {
            if !t.users.contains_key(&contact.owner) {
                return Err(StoreError::row_not_found("user", &contact.owner));
            }
            t.next_contact_id += 1;
            let row = Contact {
                id: t.next_contact_id,
                owner: contact.owner,
                first_name: contact.first_name,
                last_name: contact.last_name,
                email: contact.email,
                phone: contact.phone,
            };
            t.contacts.insert(row.id, row.clone());
            Ok(row)
        })
    }

    fn find_contact(&self, key: &ContactKey) -> StoreResult<Option<Contact>> {
        Ok(self.tables.read().owned_contact(key).cloned())
    }

    fn update_contact(&self, key: &ContactKey, patch: &ContactPatch) -> StoreResult<Contact> {
        self.commit(|t| {
            let row = t
                .contacts
                .get_mut(&key.id())
                .filter(|c| c.owner == key.owner())
                .ok_or_else(|| StoreError::row_not_found("contact", key.id()))?;
            patch.apply(row);
            Ok(row.clone())
        })
    }

    fn delete_contact(&self, key: &ContactKey) -> StoreResult<()> {
        let cascaded = self.commit(|t| {
            if t.owned_contact(key).is_none() {
                return Err(StoreError::row_not_found("contact", key.id()));
            }
            t.contacts.remove(&key.id());
            let before = t.addresses.len();
            t.addresses.retain(|_, a| a.contact_id != key.id());
            Ok(before - t.addresses.len())
        })?;
        debug!(target: "storage", contact_id = key.id(), cascaded, "contact deleted");
        Ok(())
    }

    fn page_contacts(&self, filter: &ContactFilter, window: Window) -> StoreResult<Slice<Contact>> {
        let t = self.tables.read();
        let matching = t.contacts.values().filter(|c| filter_matches(c, filter));
        let total = matching.clone().count() as u64;
        let rows = matching.skip(to_usize(window.offset)).take(to_usize(window.limit)).cloned().collect();
        Ok(Slice { rows, total })
    }

    fn insert_address(&self, parent: &ContactKey, address: NewAddress) -> StoreResult<Address> {
        self.commit(|t| {
            if t.owned_contact(parent).is_none() {
                return Err(StoreError::row_not_found("contact", parent.id()));
            }
            t.next_address_id += 1;
            let row = Address {
                id: t.next_address_id,
                contact_id: parent.id(),
                street: address.street,
                city: address.city,
                province: address.province,
                country: address.country,
                postal_code: address.postal_code,
            };
            t.addresses.insert(row.id, row.clone());
            Ok(row)
        })
    }

    fn find_address(&self, key: &AddressKey) -> StoreResult<Option<Address>> {
        Ok(self.tables.read().owned_address(key).cloned())
    }

    fn update_address(&self, key: &AddressKey, patch: &AddressPatch) -> StoreResult<Address> {
        self.commit(|t| {
            if t.owned_address(key).is_none() {
                return Err(StoreError::row_not_found("address", key.id()));
            }
            let row = t.addresses.get_mut(&key.id()).ok_or_else(|| StoreError::row_not_found("address", key.id()))?;
            patch.apply(row);
            Ok(row.clone())
        })
    }

    fn delete_address(&self, key: &AddressKey) -> StoreResult<()> {
        self.commit(|t| {
            if t.owned_address(key).is_none() {
                return Err(StoreError::row_not_found("address", key.id()));
            }
            t.addresses.remove(&key.id());
            Ok(())
        })
    }

    fn page_addresses(&self, parent: &ContactKey, window: Window) -> StoreResult<Slice<Address>> {
        let t = self.tables.read();
        if t.owned_contact(parent).is_none() {
            return Ok(Slice { rows: Vec::new(), total: 0 });
        }
        let matching = t.addresses.values().filter(|a| a.contact_id == parent.id());
        let total = matching.clone().count() as u64;
        let rows = matching.skip(to_usize(window.offset)).take(to_usize(window.limit)).cloned().collect();
        Ok(Slice { rows, total })
    }
}
