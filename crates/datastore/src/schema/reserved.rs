//! Reserved property names

use crate::error::{ModelError, ModelResult};

/// Names taken by the model base type
pub const RESERVED_WORDS: &[&str] = &[
    "key_name",
    "key",
    "put",
    "delete",
    "is_saved",
    "has_key",
    "dynamic_properties",
    "instance_properties",
    "parent",
    "parent_key",
    "get",
    "get_by_key_name",
    "get_by_id",
    "get_or_insert",
    "all",
    "from_entity",
    "kind",
    "properties",
    "fields",
    "schema",
    "entity",
];

/// Names both beginning and ending with `__`
pub fn is_special_name(name: &str) -> bool {
    name.len() >= 4 && name.starts_with("__") && name.ends_with("__")
}

pub fn check_reserved_word(attr_name: &str) -> ModelResult<()> {
    if is_special_name(attr_name) {
        return Err(ModelError::ReservedWord(
            "Cannot define property.  All names both beginning and ending with '__' are reserved."
                .to_string(),
        ));
    }

    if RESERVED_WORDS.contains(&attr_name) {
        return Err(ModelError::ReservedWord(format!(
            "Cannot define property using reserved word '{0}'. If you would like to use this \
             name in the datastore consider using a different name like {0}_ and adding \
             name='{0}' to the parameter list of the property definition.",
            attr_name
        )));
    }

    Ok(())
}
