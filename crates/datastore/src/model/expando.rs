//! Dynamic properties of expando kinds

use std::collections::BTreeMap;

use super::Model;
use crate::error::{ModelError, ModelResult};
use crate::schema::check_reserved_word;
use crate::value::Value;

impl Model {
    fn require_expando(&self) -> ModelResult<()> {
        if self.schema.is_expando() {
            Ok(())
        } else {
            Err(ModelError::Property(format!(
                "{} does not accept dynamic properties",
                self.kind()
            )))
        }
    }

    /// Assign a dynamic property; a null value removes it
    pub fn set_dynamic(&mut self, name: &str, value: impl Into<Value>) -> ModelResult<()> {
        self.require_expando()?;
        let value = value.into();

        if self.schema.property(name).is_some() {
            return self.set(name, value);
        }
        check_reserved_word(name)?;
        if name.starts_with('_') {
            return Err(ModelError::Property(format!(
                "Dynamic property names cannot start with '_': {}",
                name
            )));
        }

        match &value {
            Value::Null => {
                self.dynamic.remove(name);
                return Ok(());
            }
            Value::List(items) if items.is_empty() => {
                return Err(ModelError::Validation(format!(
                    "Cannot store empty list to dynamic property {}",
                    name
                )));
            }
            _ => check_dynamic_type(name, &value)?,
        }

        self.dynamic.insert(name.to_string(), value);
        Ok(())
    }

    pub fn get_dynamic(&self, name: &str) -> Option<&Value> {
        self.dynamic.get(name)
    }

    /// Remove a dynamic property
    pub fn delete_dynamic(&mut self, name: &str) -> ModelResult<()> {
        self.require_expando()?;
        if self.schema.property(name).is_some() {
            return Err(ModelError::Property(format!(
                "Cannot delete declared property {}",
                name
            )));
        }
        self.dynamic
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ModelError::Property(format!("{} has no property {}", self.kind(), name)))
    }

    /// Names of the dynamic properties, sorted
    pub fn dynamic_properties(&self) -> Vec<String> {
        self.dynamic.keys().cloned().collect()
    }

    /// Names of every declared and dynamic property on this instance
    pub fn instance_properties(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .schema
            .properties()
            .iter()
            .map(|property| property.attr_name().to_string())
            .collect();
        names.extend(self.dynamic.keys().cloned());
        names
    }

    pub fn dynamic_values(&self) -> &BTreeMap<String, Value> {
        &self.dynamic
    }
}

/// Dates and times have no storage form of their own without a declared
/// property to narrow them back, and lists cannot nest
fn check_dynamic_type(name: &str, value: &Value) -> ModelResult<()> {
    match value {
        Value::Date(_) | Value::Time(_) => Err(ModelError::Validation(format!(
            "Dynamic property {} cannot hold a {}; use a DateTime",
            name,
            value.value_type()
        ))),
        Value::List(items) => {
            for item in items {
                if matches!(item, Value::List(_) | Value::Null) {
                    return Err(ModelError::Validation(format!(
                        "Items of dynamic property {} cannot be {}",
                        name,
                        item.value_type()
                    )));
                }
                check_dynamic_type(name, item)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use crate::property::Property;
    use crate::schema::SchemaBuilder;
    use chrono::NaiveDate;

    fn client_and_schema() -> (Client, std::sync::Arc<crate::schema::Schema>) {
        let client = Client::in_memory();
        let schema = SchemaBuilder::new("Person")
            .property("name", Property::string())
            .expando()
            .build(client.registry())
            .unwrap();
        (client, schema)
    }

    #[test]
    fn test_dynamic_assignment() {
        let (client, schema) = client_and_schema();
        let mut person = Model::builder(&schema)
            .set("name", "Ann")
            .set("age", 32i64)
            .build(&client)
            .unwrap();

        person.set_dynamic("city", "Lyon").unwrap();
        assert_eq!(person.get("age").unwrap(), Value::Integer(32));
        assert_eq!(person.dynamic_properties(), vec!["age".to_string(), "city".to_string()]);
        assert_eq!(
            person.instance_properties(),
            vec!["name".to_string(), "age".to_string(), "city".to_string()]
        );

        person.set_dynamic("city", Value::Null).unwrap();
        assert!(person.get_dynamic("city").is_none());

        person.delete_dynamic("age").unwrap();
        assert!(person.delete_dynamic("age").is_err());
    }

    #[test]
    fn test_dynamic_assignment_rules() {
        let (client, schema) = client_and_schema();
        let mut person = Model::builder(&schema).build(&client).unwrap();

        assert!(matches!(
            person.set_dynamic("key_name", "x").unwrap_err(),
            ModelError::ReservedWord(_)
        ));
        assert!(person.set_dynamic("_hidden", 1i64).is_err());
        assert_eq!(
            person.set_dynamic("tags", Vec::<Value>::new()).unwrap_err(),
            ModelError::Validation("Cannot store empty list to dynamic property tags".into())
        );
        let day = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        assert!(person.set_dynamic("born", day).is_err());
        assert!(person.set_dynamic("tags", vec!["a", "b"]).is_ok());
    }

    #[test]
    fn test_declared_names_go_through_property() {
        let (client, schema) = client_and_schema();
        let mut person = Model::builder(&schema).build(&client).unwrap();
        assert!(matches!(
            person.set_dynamic("name", 5i64).unwrap_err(),
            ModelError::Validation(_)
        ));
        assert!(person.dynamic_properties().is_empty());
    }

    #[test]
    fn test_fixed_kind_rejects_dynamic() {
        let client = Client::in_memory();
        let schema = SchemaBuilder::new("Fixed").build(client.registry()).unwrap();
        let mut fixed = Model::builder(&schema).build(&client).unwrap();
        assert!(matches!(
            fixed.set_dynamic("x", 1i64).unwrap_err(),
            ModelError::Property(_)
        ));
    }
}
