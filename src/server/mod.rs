pub mod access;
mod customers;
pub mod dto;
mod leads;
pub mod response;
mod router;
pub mod validation;

pub use router::{AppState, create_router};
