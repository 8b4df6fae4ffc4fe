//! Protocol data types consumed by the trust validator and logout flows

pub mod assertion;
pub mod logout;
pub mod name_id;
pub mod response;

pub use assertion::{Assertion, AssertionItem, EncryptedAssertion};
pub use logout::LogoutRequest;
pub use name_id::{NameId, NAMEID_FORMAT_EMAIL, NAMEID_FORMAT_PERSISTENT, NAMEID_FORMAT_TRANSIENT};
pub use response::{Response, Signature, Status, STATUS_SUCCESS};
