pub mod diff;
pub mod edit;
pub mod expand;
pub mod next;
pub mod validate;
