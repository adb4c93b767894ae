use tracing::debug;

use super::principal::Identity;
use crate::error::{AppError, AppResult};
use crate::storage::{Address, AddressKey, Contact, ContactKey, DirectoryStore};

fn contact_not_found() -> AppError {
    AppError::not_found("contact_not_found", "contact is not found")
}

fn address_not_found() -> AppError {
    AppError::not_found("address_not_found", "address is not found")
}

/// Resolves a resource path to an ownership-scoped key before any storage
/// read or write is allowed. Resources that are absent and resources owned by
/// someone else both surface as `NotFound`, so ids cannot be enumerated.
pub struct OwnershipGuard<'a> {
    store: &'a dyn DirectoryStore,
}

impl<'a> OwnershipGuard<'a> {
    pub fn new(store: &'a dyn DirectoryStore) -> Self { Self { store } }

    /// `(contact_id, owner = caller)`; the id alone never authorizes.
    pub fn contact(&self, who: &Identity, contact_id: i64) -> AppResult<(ContactKey, Contact)> {
        let key = ContactKey::new(contact_id, who.username.as_str());
        match self.store.find_contact(&key)? {
            Some(row) => Ok((key, row)),
            None => {
                debug!(target: "auth", user = %who.username, contact_id, "contact access denied");
                Err(contact_not_found())
            }
        }
    }

    /// Address ownership is transitive: the parent contact must belong to the
    /// caller, and the address must belong to that contact.
    pub fn address(&self, who: &Identity, contact_id: i64, address_id: i64) -> AppResult<(AddressKey, Address)> {
        let (parent, _) = self.contact(who, contact_id)?;
        let key = AddressKey::new(address_id, parent);
        match self.store.find_address(&key)? {
            Some(row) => Ok((key, row)),
            None => {
                debug!(target: "auth", user = %who.username, contact_id, address_id, "address access denied");
                Err(address_not_found())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, NewAddress, NewContact, NewUser};

    fn user(store: &MemoryStore, name: &str) -> Identity {
        store
            .insert_user(NewUser { username: name.into(), full_name: name.into(), password_hash: String::new() })
            .unwrap();
        Identity { username: name.into(), full_name: name.into(), token: format!("{}-token", name) }
    }

    fn contact(store: &MemoryStore, owner: &str) -> Contact {
        store
            .insert_contact(NewContact {
                owner: owner.into(),
                first_name: "A".into(),
                last_name: None,
                email: None,
                phone: None,
            })
            .unwrap()
    }

    fn address(store: &MemoryStore, parent: &Contact) -> Address {
        store
            .insert_address(
                &ContactKey::new(parent.id, parent.owner.as_str()),
                NewAddress { street: None, city: None, province: None, country: "ID".into(), postal_code: "123".into() },
            )
            .unwrap()
    }

    #[test]
    fn owner_gets_key_for_own_contact() {
        let store = MemoryStore::new();
        let a = user(&store, "alice");
        let c = contact(&store, "alice");
        let (key, row) = OwnershipGuard::new(&store).contact(&a, c.id).unwrap();
        assert_eq!(key.id(), c.id);
        assert_eq!(key.owner(), "alice");
        assert_eq!(row, c);
    }

    #[test]
    fn other_users_contact_is_not_found() {
        let store = MemoryStore::new();
        user(&store, "alice");
        let b = user(&store, "bob");
        let c = contact(&store, "alice");
        let err = OwnershipGuard::new(&store).contact(&b, c.id).unwrap_err();
        assert!(err.is_not_found());
        assert!(OwnershipGuard::new(&store).contact(&b, 9999).unwrap_err().is_not_found());
    }

    #[test]
    fn address_requires_parent_owned_by_caller() {
        let store = MemoryStore::new();
        let a = user(&store, "alice");
        let b = user(&store, "bob");
        let ca = contact(&store, "alice");
        let addr = address(&store, &ca);

        let guard = OwnershipGuard::new(&store);
        assert!(guard.address(&a, ca.id, addr.id).is_ok());
        // right (contact_id, address_id) pair, wrong caller
        assert!(guard.address(&b, ca.id, addr.id).unwrap_err().is_not_found());
    }

    #[test]
    fn address_must_hang_off_the_named_contact() {
        let store = MemoryStore::new();
        let a = user(&store, "alice");
        let c1 = contact(&store, "alice");
        let c2 = contact(&store, "alice");
        let addr = address(&store, &c1);
        let err = OwnershipGuard::new(&store).address(&a, c2.id, addr.id).unwrap_err();
        assert_eq!(err.code_str(), "address_not_found");
    }
}
