use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::AppResult;
use crate::identity::{Identity, OwnershipGuard};
use crate::query::filter::{compile, normalize_phone, ContactSearch};
use crate::query::page::{paginate, PageRequest, Paged};
use crate::storage::{Contact, ContactPatch, NewContact, SharedDirectory};
use crate::validation;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateContactRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateContactRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Public view of a contact; the owner never leaves the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactResponse {
    pub id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl From<Contact> for ContactResponse {
    fn from(c: Contact) -> Self {
        Self { id: c.id, first_name: c.first_name, last_name: c.last_name, email: c.email, phone: c.phone }
    }
}

fn check_optional_fields(last_name: Option<&str>, email: Option<&str>, phone: Option<&str>) -> AppResult<()> {
    validation::optional(last_name, |v| validation::name("last_name", v))?;
    validation::optional(email, |v| validation::email("email", v))?;
    validation::optional(phone, |v| validation::phone("phone", v))
}

pub struct ContactService {
    store: SharedDirectory,
}

impl ContactService {
    pub fn new(store: SharedDirectory) -> Self { Self { store } }

    fn guard(&self) -> OwnershipGuard<'_> { OwnershipGuard::new(self.store.as_ref()) }

    pub fn create(&self, who: &Identity, req: CreateContactRequest) -> AppResult<ContactResponse> {
        let first_name = validation::required("first_name", req.first_name.as_deref())?;
        validation::name("first_name", first_name)?;
        check_optional_fields(req.last_name.as_deref(), req.email.as_deref(), req.phone.as_deref())?;

        let contact = self.store.insert_contact(NewContact {
            owner: who.username.clone(),
            first_name: first_name.to_string(),
            last_name: req.last_name,
            email: req.email,
            phone: req.phone.as_deref().map(normalize_phone),
        })?;
        info!(target: "contacts", user = %who.username, contact_id = contact.id, "contact created");
        Ok(contact.into())
    }

    pub fn get(&self, who: &Identity, contact_id: i64) -> AppResult<ContactResponse> {
        let (_, contact) = self.guard().contact(who, contact_id)?;
        Ok(contact.into())
    }

    pub fn update(&self, who: &Identity, contact_id: i64, req: UpdateContactRequest) -> AppResult<ContactResponse> {
        validation::any_present(
            "contact",
            &[req.first_name.is_some(), req.last_name.is_some(), req.email.is_some(), req.phone.is_some()],
        )?;
        validation::optional(req.first_name.as_deref(), |v| validation::name("first_name", v))?;
        check_optional_fields(req.last_name.as_deref(), req.email.as_deref(), req.phone.as_deref())?;

        let (key, _) = self.guard().contact(who, contact_id)?;
        let patch = ContactPatch {
            first_name: req.first_name,
            last_name: req.last_name,
            email: req.email,
            phone: req.phone.as_deref().map(normalize_phone),
        };
        let contact = self.store.update_contact(&key, &patch)?;
        info!(target: "contacts", user = %who.username, contact_id, "contact updated");
        Ok(contact.into())
    }

    /// Removes the contact together with its addresses.
    pub fn delete(&self, who: &Identity, contact_id: i64) -> AppResult<bool> {
        let (key, _) = self.guard().contact(who, contact_id)?;
        self.store.delete_contact(&key)?;
        info!(target: "contacts", user = %who.username, contact_id, "contact deleted");
        Ok(true)
    }

    pub fn search(&self, who: &Identity, search: &ContactSearch, page: PageRequest) -> AppResult<Paged<ContactResponse>> {
        let filter = compile(who, search);
        debug!(target: "contacts", user = %who.username, page = page.page(), size = page.size(), "search: {}", filter);
        let slice = self.store.page_contacts(&filter, page.window())?;
        Ok(paginate(page, slice, "contact")?.map(ContactResponse::from))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::AppError;
    use crate::storage::{DirectoryStore, MemoryStore, NewUser};

    fn setup(users: &[&str]) -> (ContactService, Vec<Identity>) {
        let store = Arc::new(MemoryStore::new());
        let ids = users
            .iter()
            .map(|u| {
                store
                    .insert_user(NewUser { username: u.to_string(), full_name: u.to_string(), password_hash: String::new() })
                    .unwrap();
                Identity { username: u.to_string(), full_name: u.to_string(), token: String::new() }
            })
            .collect();
        (ContactService::new(store), ids)
    }

    fn named(first: &str, last: Option<&str>) -> CreateContactRequest {
        CreateContactRequest { first_name: Some(first.into()), last_name: last.map(Into::into), ..Default::default() }
    }

    #[test]
    fn create_validates_and_strips_phone_whitespace() {
        let (svc, who) = setup(&["u1"]);
        let missing = svc.create(&who[0], CreateContactRequest::default()).unwrap_err();
        assert_eq!(missing.message(), "first_name is required");

        let bad_email = CreateContactRequest { email: Some("nope".into()), ..named("A", None) };
        assert!(matches!(svc.create(&who[0], bad_email), Err(AppError::Validation { .. })));

        let req = CreateContactRequest { phone: Some("081 269 69696".into()), ..named("A", None) };
        let c = svc.create(&who[0], req).unwrap();
        assert_eq!(c.phone.as_deref(), Some("08126969696"));
        assert_eq!(svc.get(&who[0], c.id).unwrap(), c);
    }

    #[test]
    fn update_needs_a_field_and_keeps_the_rest() {
        let (svc, who) = setup(&["u1"]);
        let c = svc.create(&who[0], named("Ann", Some("Lee"))).unwrap();
        let empty = svc.update(&who[0], c.id, UpdateContactRequest::default()).unwrap_err();
        assert!(matches!(empty, AppError::Validation { .. }));

        let blank = UpdateContactRequest { last_name: Some(String::new()), ..Default::default() };
        assert!(matches!(svc.update(&who[0], c.id, blank), Err(AppError::Validation { .. })));

        let upd = UpdateContactRequest { email: Some("ann@lee.io".into()), ..Default::default() };
        let after = svc.update(&who[0], c.id, upd).unwrap();
        assert_eq!(after.first_name, "Ann");
        assert_eq!(after.last_name.as_deref(), Some("Lee"));
        assert_eq!(after.email.as_deref(), Some("ann@lee.io"));
    }

    #[test]
    fn other_tenant_sees_not_found_everywhere() {
        let (svc, who) = setup(&["u1", "u2"]);
        let c = svc.create(&who[0], named("A", None)).unwrap();
        assert!(svc.get(&who[1], c.id).unwrap_err().is_not_found());
        let upd = UpdateContactRequest { first_name: Some("B".into()), ..Default::default() };
        assert!(svc.update(&who[1], c.id, upd).unwrap_err().is_not_found());
        assert!(svc.delete(&who[1], c.id).unwrap_err().is_not_found());
        assert!(svc.search(&who[1], &ContactSearch::default(), PageRequest::default()).unwrap_err().is_not_found());
        assert_eq!(svc.get(&who[0], c.id).unwrap().first_name, "A");
    }

    #[test]
    fn search_matches_first_or_last_name_and_pages() {
        let (svc, who) = setup(&["u1"]);
        svc.create(&who[0], named("Ana", Some("Smith"))).unwrap();
        svc.create(&who[0], named("Bob", Some("Anders"))).unwrap();
        svc.create(&who[0], named("Carl", None)).unwrap();

        let hits = svc
            .search(&who[0], &ContactSearch { name: Some("An".into()), ..Default::default() }, PageRequest::default())
            .unwrap();
        let names: Vec<_> = hits.data.iter().map(|c| c.first_name.as_str()).collect();
        assert_eq!(names, vec!["Ana", "Bob"]);
        assert_eq!(hits.page.total_page, 1);

        let second = svc.search(&who[0], &ContactSearch::default(), PageRequest::new(2, 2).unwrap()).unwrap();
        assert_eq!(second.data.len(), 1);
        assert_eq!(second.page.total_page, 2);
    }

    #[test]
    fn delete_then_get_is_not_found() {
        let (svc, who) = setup(&["u1"]);
        let c = svc.create(&who[0], named("A", None)).unwrap();
        assert!(svc.delete(&who[0], c.id).unwrap());
        assert!(svc.get(&who[0], c.id).unwrap_err().is_not_found());
        assert!(svc.delete(&who[0], c.id).unwrap_err().is_not_found());
    }
}
