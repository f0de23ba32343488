use std::sync::Arc;

use elif_datastore::{Client, Key, Model, ModelError, Property, Schema, SchemaBuilder, Value};

fn story_schema(client: &Client) -> Arc<Schema> {
    SchemaBuilder::new("Story")
        .property("title", Property::string().required())
        .property("rank", Property::integer().default(1))
        .property("body", Property::text())
        .build(client.registry())
        .unwrap()
}

#[tokio::test]
async fn test_put_then_find_by_key_name_and_id() {
    let client = Client::in_memory();
    let story = story_schema(&client);

    let mut named = Model::builder(&story)
        .key_name("intro")
        .set("title", "Introduction")
        .build(&client)
        .unwrap();
    assert!(!named.is_saved());
    assert!(named.has_key());
    let named_key = named.put(&client).await.unwrap();
    assert!(named.is_saved());
    assert_eq!(named_key.name(), Some("intro"));

    let mut numbered = Model::builder(&story)
        .set("title", "Untitled")
        .build(&client)
        .unwrap();
    assert!(!numbered.has_key());
    assert!(matches!(numbered.key().unwrap_err(), ModelError::NotSaved(_)));
    let numbered_key = numbered.put(&client).await.unwrap();
    let id = numbered_key.id().unwrap();

    let loaded = Model::get_by_key_name(&story, &client, "intro", None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.get("title").unwrap(), Value::from("Introduction"));
    assert_eq!(loaded.get("rank").unwrap(), Value::Integer(1));
    assert!(loaded.is_saved());

    let by_id = Model::get_by_id(&story, &client, id, None).await.unwrap().unwrap();
    assert_eq!(by_id.key().unwrap(), numbered_key);

    let several = Model::get_by_key_names(&story, &client, &["intro", "missing"], None)
        .await
        .unwrap();
    assert!(several[0].is_some());
    assert!(several[1].is_none());
}

#[tokio::test]
async fn test_required_property_checked_at_put() {
    let client = Client::in_memory();
    let story = story_schema(&client);

    let mut untitled = Model::builder(&story).build(&client).unwrap();
    let err = untitled.put(&client).await.unwrap_err();
    assert!(matches!(err, ModelError::Validation(ref msg) if msg == "Property title is required"));
    assert!(!untitled.is_saved());

    let err = untitled.set("title", "").unwrap_err();
    assert!(matches!(err, ModelError::Validation(_)));
}

#[tokio::test]
async fn test_delete_keeps_key_and_allows_put_again() {
    let client = Client::in_memory();
    let story = story_schema(&client);

    let mut model = Model::builder(&story)
        .key_name("draft")
        .set("title", "Draft")
        .build(&client)
        .unwrap();
    let key = model.put(&client).await.unwrap();

    model.delete(&client).await.unwrap();
    assert!(!model.is_saved());
    assert_eq!(model.key().unwrap(), key);
    assert!(Model::find(&story, &client, key.clone()).await.unwrap().is_none());

    model.put(&client).await.unwrap();
    assert!(Model::find(&story, &client, &key).await.unwrap().is_some());
}

#[tokio::test]
async fn test_find_rejects_unrelated_kind() {
    let client = Client::in_memory();
    let story = story_schema(&client);
    let comment = SchemaBuilder::new("Comment")
        .property("text", Property::string())
        .build(client.registry())
        .unwrap();

    let mut model = Model::builder(&story)
        .key_name("s")
        .set("title", "T")
        .build(&client)
        .unwrap();
    let key = model.put(&client).await.unwrap();

    let err = Model::find(&comment, &client, key).await.unwrap_err();
    assert!(matches!(
        err,
        ModelError::Kind(ref msg) if msg == "Kind 'Story' is not a subclass of kind 'Comment'"
    ));
}

#[tokio::test]
async fn test_subkind_instances_load_through_base_schema() {
    let client = Client::in_memory();
    let story = story_schema(&client);
    let feature = SchemaBuilder::new("Feature")
        .extends(&story)
        .property("section", Property::string())
        .build(client.registry())
        .unwrap();

    let mut model = Model::builder(&feature)
        .key_name("f")
        .set("title", "Feature")
        .set("section", "science")
        .build(&client)
        .unwrap();
    let key = model.put(&client).await.unwrap();

    let loaded = Model::find(&story, &client, key).await.unwrap().unwrap();
    assert_eq!(loaded.kind(), "Feature");
    assert_eq!(loaded.get("section").unwrap(), Value::from("science"));
}

#[tokio::test]
async fn test_parent_is_fetched_and_cached() {
    let client = Client::in_memory();
    let story = story_schema(&client);
    let comment = SchemaBuilder::new("Comment")
        .property("text", Property::string())
        .build(client.registry())
        .unwrap();

    let mut parent = Model::builder(&story)
        .key_name("root")
        .set("title", "Root")
        .build(&client)
        .unwrap();
    let parent_key = parent.put(&client).await.unwrap();

    let mut child = Model::builder(&comment)
        .parent(&parent)
        .set("text", "first")
        .build(&client)
        .unwrap();
    let child_key = child.put(&client).await.unwrap();
    assert_eq!(child_key.parent(), Some(parent_key.clone()));
    assert_eq!(child_key.root(), parent_key);

    let mut loaded = Model::find(&comment, &client, child_key).await.unwrap().unwrap();
    assert_eq!(loaded.parent_key(), Some(parent_key));
    let fetched = loaded.parent(&client).await.unwrap().unwrap();
    assert_eq!(fetched.get("title").unwrap(), Value::from("Root"));
}

#[tokio::test]
async fn test_unsaved_parent_is_rejected() {
    let client = Client::in_memory();
    let story = story_schema(&client);
    let comment = SchemaBuilder::new("Comment").build(client.registry()).unwrap();

    let unsaved = Model::builder(&story).set("title", "x").build(&client).unwrap();
    let err = Model::builder(&comment).parent(&unsaved).build(&client).unwrap_err();
    assert!(matches!(err, ModelError::Validation(_)));
}

#[tokio::test]
async fn test_encoded_key_round_trips_through_find() {
    let client = Client::in_memory();
    let story = story_schema(&client);

    let mut model = Model::builder(&story)
        .key_name("encoded")
        .set("title", "Encoded")
        .build(&client)
        .unwrap();
    let key = model.put(&client).await.unwrap();
    let encoded = key.encode().unwrap();

    let loaded = Model::find(&story, &client, encoded.as_str()).await.unwrap().unwrap();
    assert_eq!(loaded.key().unwrap(), key);
    assert!(matches!(
        Model::find(&story, &client, "not a key").await.unwrap_err(),
        ModelError::BadKey(_)
    ));
}

#[tokio::test]
async fn test_allocate_ids_are_not_reused() {
    let client = Client::in_memory();
    let story = story_schema(&client);

    let template = Key::incomplete(None, "Story").unwrap();
    let (first, last) = client.allocate_ids(&template, 10).await.unwrap();
    assert_eq!(last - first, 9);

    let mut model = Model::builder(&story).set("title", "after").build(&client).unwrap();
    let key = model.put(&client).await.unwrap();
    assert!(key.id().unwrap() > last);
}

#[tokio::test]
async fn test_largest_explicit_id_is_rejected_without_panicking() {
    let client = Client::in_memory();
    let story = story_schema(&client);

    let mut model = Model::builder(&story)
        .key(Key::from_path(None, "Story", i64::MAX).unwrap())
        .set("title", "edge")
        .build(&client)
        .unwrap();
    assert!(matches!(
        model.put(&client).await.unwrap_err(),
        ModelError::BadArgument(_)
    ));
    assert!(!model.is_saved());

    let template = Key::incomplete(None, "Story").unwrap();
    client.allocate_ids(&template, 1).await.unwrap();
    assert!(matches!(
        client.allocate_ids(&template, i64::MAX as u64).await.unwrap_err(),
        ModelError::BadArgument(_)
    ));

    let mut next = Model::builder(&story).set("title", "next").build(&client).unwrap();
    assert!(next.put(&client).await.unwrap().id().unwrap() > 0);
}
