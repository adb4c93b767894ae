//! Identity and session management: who is calling, and what they may touch.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod session;
mod guard;

pub use principal::Identity;
pub use session::{IdentityChanges, SessionAuthority, SessionToken};
pub use guard::OwnershipGuard;
