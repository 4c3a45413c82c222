pub(crate) mod error;
#[cfg(test)]
pub(crate) mod test_utils;

pub use error::{Error, ListRole, Result, TransferDirection};
