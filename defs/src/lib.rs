mod deployment;
mod errors;

pub use deployment::{Deployment, OBJTYPE_DEPLOYMENT};
pub use errors::StoreError;
