pub mod id;
pub mod keyed_mutex;
pub mod validation;
