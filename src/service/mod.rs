//! Resource services: the operations behind each HTTP route. Every service
//! takes the authenticated `Identity` explicitly and reaches storage only
//! through keys minted by the `OwnershipGuard`.

pub mod address;
pub mod contact;
pub mod user;

pub use address::{AddressResponse, AddressService, CreateAddressRequest, UpdateAddressRequest};
pub use contact::{ContactResponse, ContactService, CreateContactRequest, UpdateContactRequest};
pub use user::{LoginUserRequest, RegisterUserRequest, UpdateUserRequest, UserResponse, UserService};

use crate::storage::SharedDirectory;

/// The three services over one shared directory.
pub struct Services {
    pub users: UserService,
    pub contacts: ContactService,
    pub addresses: AddressService,
}

impl Services {
    pub fn new(store: SharedDirectory) -> Self {
        Self {
            users: UserService::new(store.clone()),
            contacts: ContactService::new(store.clone()),
            addresses: AddressService::new(store),
        }
    }
}
