use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use elif_datastore::{
    Client, GeoPt, Im, Key, Model, Property, Schema, SchemaBuilder, StaticUsers, User, Value,
};

fn note_schema(client: &Client) -> Arc<Schema> {
    SchemaBuilder::new("Note")
        .property("body", Property::string())
        .property("created", Property::date_time().auto_now_add())
        .property("updated", Property::date_time().auto_now())
        .property("owner", Property::user().auto_now_add())
        .property("last_editor", Property::user().auto_now())
        .build(client.registry())
        .unwrap()
}

#[tokio::test]
async fn test_auto_now_is_recomputed_on_every_put() {
    let client = Client::in_memory();
    let note = note_schema(&client);

    let mut model = Model::builder(&note).set("body", "draft").build(&client).unwrap();
    let built_at = model.get("created").unwrap();
    assert!(matches!(built_at, Value::DateTime(_)));

    let key = model.put(&client).await.unwrap();
    let first = Model::find(&note, &client, key.clone()).await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;
    model.set("body", "final").unwrap();
    model.put(&client).await.unwrap();
    let second = Model::find(&note, &client, key).await.unwrap().unwrap();

    assert_eq!(first.get("created").unwrap(), built_at);
    assert_eq!(second.get("created").unwrap(), built_at);

    let first_update = first.get("updated").unwrap().as_datetime().unwrap();
    let second_update = second.get("updated").unwrap().as_datetime().unwrap();
    assert!(second_update > first_update);
    assert_eq!(second.get("body").unwrap(), Value::from("final"));
}

#[tokio::test]
async fn test_current_user_properties_follow_the_user_service() {
    let ada = User::new("ada@example.com", "example.com").unwrap();
    let bob = User::new("bob@example.com", "example.com").unwrap();
    let users = Arc::new(StaticUsers::new(Some(ada.clone())));
    let client = Client::in_memory().with_users(users.clone());
    let note = note_schema(&client);

    let mut model = Model::builder(&note).build(&client).unwrap();
    assert_eq!(model.get("owner").unwrap(), Value::User(ada.clone()));
    let key = model.put(&client).await.unwrap();

    let stored = Model::find(&note, &client, key.clone()).await.unwrap().unwrap();
    assert_eq!(stored.get("owner").unwrap(), Value::User(ada.clone()));
    assert_eq!(stored.get("last_editor").unwrap(), Value::User(ada.clone()));

    users.sign_in(bob.clone());
    model.put(&client).await.unwrap();
    let stored = Model::find(&note, &client, key).await.unwrap().unwrap();
    assert_eq!(stored.get("owner").unwrap(), Value::User(ada));
    assert_eq!(stored.get("last_editor").unwrap(), Value::User(bob));

    users.sign_out();
    let mut anonymous = Model::builder(&note).build(&client).unwrap();
    assert_eq!(anonymous.get("owner").unwrap(), Value::Null);
    let key = anonymous.put(&client).await.unwrap();
    let stored = Model::find(&note, &client, key).await.unwrap().unwrap();
    assert_eq!(stored.get("last_editor").unwrap(), Value::Null);
}

#[tokio::test]
async fn test_typed_values_survive_a_round_trip() {
    let client = Client::in_memory();
    let profile = SchemaBuilder::new("Profile")
        .property("score", Property::float())
        .property("active", Property::boolean())
        .property("token", Property::byte_string())
        .property("avatar", Property::blob())
        .property("home", Property::geo_pt())
        .property("stars", Property::rating())
        .property("site", Property::link())
        .property("mail", Property::email())
        .property("account", Property::user())
        .property("pointer", Property::reference_any())
        .property("genre", Property::category())
        .property("phone", Property::phone_number())
        .property("address", Property::postal_address())
        .property("chat", Property::im())
        .property("born", Property::date())
        .property("alarm", Property::time())
        .build(client.registry())
        .unwrap();

    let ada = User::new("ada@example.com", "example.com").unwrap();
    let elsewhere = Key::from_path(None, "Document", "readme").unwrap();
    let born = NaiveDate::from_ymd_opt(1815, 12, 10).unwrap();
    let alarm = NaiveTime::from_hms_opt(6, 30, 0).unwrap();

    let mut model = Model::builder(&profile)
        .key_name("ada")
        .set("score", 2.5)
        .set("active", true)
        .set("token", Value::ByteString(vec![1, 2, 3]))
        .set("avatar", Value::Blob(vec![7; 600]))
        .set("home", "37.4,-122.1")
        .set("stars", 80)
        .set("site", "https://example.com/ada")
        .set("mail", "ada@example.com")
        .set("account", ada.clone())
        .set("pointer", elsewhere.clone())
        .set("genre", "poetry")
        .set("phone", "555-0100")
        .set("address", "12 St James's Square")
        .set("chat", "xmpp ada@example.com")
        .set("born", born)
        .set("alarm", alarm)
        .build(&client)
        .unwrap();
    let key = model.put(&client).await.unwrap();

    let loaded = Model::find(&profile, &client, key.clone()).await.unwrap().unwrap();
    let expected = [
        ("score", Value::Float(2.5)),
        ("active", Value::Boolean(true)),
        ("token", Value::ByteString(vec![1, 2, 3])),
        ("avatar", Value::Blob(vec![7; 600])),
        ("home", Value::GeoPt(GeoPt::new(37.4, -122.1).unwrap())),
        ("stars", Value::Rating(80)),
        ("site", Value::Link("https://example.com/ada".to_string())),
        ("mail", Value::Email("ada@example.com".to_string())),
        ("account", Value::User(ada)),
        ("pointer", Value::Key(elsewhere)),
        ("genre", Value::Category("poetry".to_string())),
        ("phone", Value::PhoneNumber("555-0100".to_string())),
        ("address", Value::PostalAddress("12 St James's Square".to_string())),
        ("chat", Value::Im(Im::new("xmpp", "ada@example.com").unwrap())),
        ("born", Value::Date(born)),
        ("alarm", Value::Time(alarm)),
    ];
    for (name, value) in expected {
        assert_eq!(loaded.get(name).unwrap(), value, "{}", name);
    }

    let raw = client
        .datastore()
        .get(&[key], &client.call_options())
        .await
        .unwrap();
    let raw = raw[0].as_ref().unwrap();
    assert_eq!(
        raw.get("born"),
        Some(&Value::DateTime(born.and_time(NaiveTime::default())))
    );
    assert!(!raw.is_indexed("avatar"));
}
