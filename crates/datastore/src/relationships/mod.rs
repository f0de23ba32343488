//! Relationships - Forward references and their reverse collections

pub mod reference;
pub mod reverse;
