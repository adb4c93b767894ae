use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AppResult;
use crate::identity::{Identity, OwnershipGuard};
use crate::query::page::{paginate, PageRequest, Paged};
use crate::storage::{Address, AddressPatch, NewAddress, SharedDirectory};
use crate::validation;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateAddressRequest {
    pub street: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAddressRequest {
    pub street: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressResponse {
    pub id: i64,
    pub street: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub country: String,
    pub postal_code: String,
}

impl From<Address> for AddressResponse {
    fn from(a: Address) -> Self {
        Self {
            id: a.id,
            street: a.street,
            city: a.city,
            province: a.province,
            country: a.country,
            postal_code: a.postal_code,
        }
    }
}

fn check_locality(street: Option<&str>, city: Option<&str>, province: Option<&str>) -> AppResult<()> {
    validation::optional(street, |v| validation::length("street", v, validation::STREET_MAX))?;
    validation::optional(city, |v| validation::name("city", v))?;
    validation::optional(province, |v| validation::name("province", v))
}

fn check_postal_code(value: &str) -> AppResult<()> {
    validation::length("postal_code", value, validation::POSTAL_CODE_MAX)
}

/// Addresses are always reached through their parent contact.
pub struct AddressService {
    store: SharedDirectory,
}

impl AddressService {
    pub fn new(store: SharedDirectory) -> Self { Self { store } }

    fn guard(&self) -> OwnershipGuard<'_> { OwnershipGuard::new(self.store.as_ref()) }

    pub fn create(&self, who: &Identity, contact_id: i64, req: CreateAddressRequest) -> AppResult<AddressResponse> {
        check_locality(req.street.as_deref(), req.city.as_deref(), req.province.as_deref())?;
        let country = validation::required("country", req.country.as_deref())?;
        validation::name("country", country)?;
        let postal_code = validation::required("postal_code", req.postal_code.as_deref())?;
        check_postal_code(postal_code)?;

        let (parent, _) = self.guard().contact(who, contact_id)?;
        let address = self.store.insert_address(
            &parent,
            NewAddress {
                street: req.street.clone(),
                city: req.city.clone(),
                province: req.province.clone(),
                country: country.to_string(),
                postal_code: postal_code.to_string(),
            },
        )?;
        info!(target: "addresses", user = %who.username, contact_id, address_id = address.id, "address created");
        Ok(address.into())
    }

    pub fn get(&self, who: &Identity, contact_id: i64, address_id: i64) -> AppResult<AddressResponse> {
        let (_, address) = self.guard().address(who, contact_id, address_id)?;
        Ok(address.into())
    }

    pub fn update(
        &self,
        who: &Identity,
        contact_id: i64,
        address_id: i64,
        req: UpdateAddressRequest,
    ) -> AppResult<AddressResponse> {
        validation::any_present(
            "address",
            &[
                req.street.is_some(),
                req.city.is_some(),
                req.province.is_some(),
                req.country.is_some(),
                req.postal_code.is_some(),
            ],
        )?;
        check_locality(req.street.as_deref(), req.city.as_deref(), req.province.as_deref())?;
        validation::optional(req.country.as_deref(), |v| validation::name("country", v))?;
        validation::optional(req.postal_code.as_deref(), check_postal_code)?;

        let (key, _) = self.guard().address(who, contact_id, address_id)?;
        let patch = AddressPatch {
            street: req.street,
            city: req.city,
            province: req.province,
            country: req.country,
            postal_code: req.postal_code,
        };
        let address = self.store.update_address(&key, &patch)?;
        info!(target: "addresses", user = %who.username, contact_id, address_id, "address updated");
        Ok(address.into())
    }

    pub fn delete(&self, who: &Identity, contact_id: i64, address_id: i64) -> AppResult<bool> {
        let (key, _) = self.guard().address(who, contact_id, address_id)?;
        self.store.delete_address(&key)?;
        info!(target: "addresses", user = %who.username, contact_id, address_id, "address deleted");
        Ok(true)
    }

    pub fn list(&self, who: &Identity, contact_id: i64, page: PageRequest) -> AppResult<Paged<AddressResponse>> {
        let (parent, _) = self.guard().contact(who, contact_id)?;
        let slice = self.store.page_addresses(&parent, page.window())?;
        Ok(paginate(page, slice, "address")?.map(AddressResponse::from))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::AppError;
    use crate::service::contact::{ContactService, CreateContactRequest};
    use crate::storage::{DirectoryStore, MemoryStore, NewUser};

    struct Fixture {
        contacts: ContactService,
        addresses: AddressService,
        alice: Identity,
        bob: Identity,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let mut ids = Vec::new();
        for name in ["alice", "bob"] {
            store
                .insert_user(NewUser { username: name.into(), full_name: name.into(), password_hash: String::new() })
                .unwrap();
            ids.push(Identity { username: name.into(), full_name: name.into(), token: String::new() });
        }
        let bob = ids.pop().unwrap();
        let alice = ids.pop().unwrap();
        Fixture { contacts: ContactService::new(store.clone()), addresses: AddressService::new(store), alice, bob }
    }

    fn contact_for(fx: &Fixture, who: &Identity) -> i64 {
        fx.contacts
            .create(who, CreateContactRequest { first_name: Some("A".into()), ..Default::default() })
            .unwrap()
            .id
    }

    fn jakarta() -> CreateAddressRequest {
        CreateAddressRequest {
            street: Some("Jl. Sudirman 1".into()),
            city: Some("Jakarta".into()),
            province: None,
            country: Some("Indonesia".into()),
            postal_code: Some("10220".into()),
        }
    }

    #[test]
    fn create_requires_country_and_postal_code() {
        let fx = fixture();
        let cid = contact_for(&fx, &fx.alice);
        let no_country = CreateAddressRequest { country: None, ..jakarta() };
        assert_eq!(fx.addresses.create(&fx.alice, cid, no_country).unwrap_err().message(), "country is required");
        let long_postal = CreateAddressRequest { postal_code: Some("12345678901".into()), ..jakarta() };
        assert!(matches!(fx.addresses.create(&fx.alice, cid, long_postal), Err(AppError::Validation { .. })));

        let a = fx.addresses.create(&fx.alice, cid, jakarta()).unwrap();
        assert_eq!(fx.addresses.get(&fx.alice, cid, a.id).unwrap(), a);
    }

    #[test]
    fn foreign_contact_blocks_every_address_operation() {
        let fx = fixture();
        let cid = contact_for(&fx, &fx.alice);
        let a = fx.addresses.create(&fx.alice, cid, jakarta()).unwrap();

        assert!(fx.addresses.create(&fx.bob, cid, jakarta()).unwrap_err().is_not_found());
        assert!(fx.addresses.get(&fx.bob, cid, a.id).unwrap_err().is_not_found());
        let upd = UpdateAddressRequest { city: Some("Bandung".into()), ..Default::default() };
        assert!(fx.addresses.update(&fx.bob, cid, a.id, upd).unwrap_err().is_not_found());
        assert!(fx.addresses.delete(&fx.bob, cid, a.id).unwrap_err().is_not_found());
        assert!(fx.addresses.list(&fx.bob, cid, PageRequest::default()).unwrap_err().is_not_found());

        assert_eq!(fx.addresses.get(&fx.alice, cid, a.id).unwrap().city.as_deref(), Some("Jakarta"));
    }

    #[test]
    fn update_and_delete() {
        let fx = fixture();
        let cid = contact_for(&fx, &fx.alice);
        let a = fx.addresses.create(&fx.alice, cid, jakarta()).unwrap();

        let nothing = fx.addresses.update(&fx.alice, cid, a.id, UpdateAddressRequest::default()).unwrap_err();
        assert!(matches!(nothing, AppError::Validation { .. }));

        let upd = UpdateAddressRequest { province: Some("DKI Jakarta".into()), ..Default::default() };
        let after = fx.addresses.update(&fx.alice, cid, a.id, upd).unwrap();
        assert_eq!(after.province.as_deref(), Some("DKI Jakarta"));
        assert_eq!(after.postal_code, "10220");

        assert!(fx.addresses.delete(&fx.alice, cid, a.id).unwrap());
        assert_eq!(fx.addresses.get(&fx.alice, cid, a.id).unwrap_err().code_str(), "address_not_found");
    }

    #[test]
    fn list_pages_and_reports_empty_as_not_found() {
        let fx = fixture();
        let cid = contact_for(&fx, &fx.alice);
        assert_eq!(
            fx.addresses.list(&fx.alice, cid, PageRequest::default()).unwrap_err().message(),
            "address could not be found"
        );
        for _ in 0..3 {
            fx.addresses.create(&fx.alice, cid, jakarta()).unwrap();
        }
        let page = fx.addresses.list(&fx.alice, cid, PageRequest::new(2, 2).unwrap()).unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.page.total_page, 2);
        assert_eq!(page.page.current_page, 2);
    }

    #[test]
    fn deleting_contact_removes_its_addresses() {
        let fx = fixture();
        let cid = contact_for(&fx, &fx.alice);
        let a = fx.addresses.create(&fx.alice, cid, jakarta()).unwrap();
        fx.contacts.delete(&fx.alice, cid).unwrap();
        assert!(fx.addresses.get(&fx.alice, cid, a.id).unwrap_err().is_not_found());
    }
}
