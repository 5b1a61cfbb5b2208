//! Wire-level models shared by the executor and the repository.

mod method;
mod request;

pub use method::NetworkingMethod;
pub use request::{AUTHORIZATION_HEADER, HttpRequest, RawResponse};
