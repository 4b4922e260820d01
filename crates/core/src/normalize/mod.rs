//! Deterministic canonical forms for names, EINs, NTEE codes, locations,
//! and officer roles. Every function here is pure: equal input bytes yield
//! equal outputs.

mod ein;
mod location;
mod ntee;
mod org;
mod person;
mod role;

pub use ein::{parse_ein, Ein};
pub use location::state_from_location;
pub use ntee::NteeCode;
pub use org::normalize_org_name;
pub use person::normalize_person_name;
pub use role::{classify_role, influence_score, RoleCategory};
