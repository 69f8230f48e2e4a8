mod types;

pub use types::RaplDomain;
