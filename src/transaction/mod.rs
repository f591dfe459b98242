pub mod model;
pub mod signature;

pub use model::ClientReq;
pub use signature::{KeyRegistry, verify_signature_hex};
