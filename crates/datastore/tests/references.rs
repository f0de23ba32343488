use std::sync::Arc;

use elif_datastore::{Client, Key, Model, ModelError, Property, Schema, SchemaBuilder, Value};

struct Kinds {
    author: Arc<Schema>,
    story: Arc<Schema>,
}

fn kinds(client: &Client) -> Kinds {
    let author = SchemaBuilder::new("Author")
        .property("name", Property::string())
        .build(client.registry())
        .unwrap();
    let story = SchemaBuilder::new("Story")
        .property("title", Property::string())
        .property("author", Property::reference("Author").collection_name("stories"))
        .property("editor", Property::reference("Author").collection_name("edited"))
        .build(client.registry())
        .unwrap();
    Kinds { author, story }
}

async fn saved_author(client: &Client, kinds: &Kinds, name: &str) -> Model {
    let mut author = Model::builder(&kinds.author)
        .key_name(name)
        .set("name", name)
        .build(client)
        .unwrap();
    author.put(client).await.unwrap();
    author
}

#[tokio::test]
async fn test_reference_resolves_lazily_after_load() {
    let client = Client::in_memory();
    let kinds = kinds(&client);
    let ada = saved_author(&client, &kinds, "ada").await;

    let mut story = Model::builder(&kinds.story)
        .key_name("engines")
        .set("title", "Engines")
        .set_reference("author", &ada)
        .build(&client)
        .unwrap();
    let key = story.put(&client).await.unwrap();

    let mut loaded = Model::find(&kinds.story, &client, key).await.unwrap().unwrap();
    assert_eq!(loaded.reference_key("author").unwrap(), Some(ada.key().unwrap()));
    assert_eq!(loaded.get("author").unwrap(), Value::Key(ada.key().unwrap()));

    let author = loaded.get_reference("author", &client).await.unwrap().unwrap();
    assert_eq!(author.get("name").unwrap(), Value::from("ada"));

    assert!(loaded.get_reference("editor", &client).await.unwrap().is_none());
}

#[tokio::test]
async fn test_dangling_reference_fails_to_resolve() {
    let client = Client::in_memory();
    let kinds = kinds(&client);
    let mut ghost = saved_author(&client, &kinds, "ghost").await;

    let mut story = Model::builder(&kinds.story)
        .set_reference("author", &ghost)
        .build(&client)
        .unwrap();
    let key = story.put(&client).await.unwrap();
    ghost.delete(&client).await.unwrap();

    let mut loaded = Model::find(&kinds.story, &client, key).await.unwrap().unwrap();
    let err = loaded.get_reference("author", &client).await.unwrap_err();
    assert!(matches!(
        err,
        ModelError::EntityNotFound(ref msg) if msg.starts_with("Reference property author failed to be resolved")
    ));
}

#[tokio::test]
async fn test_reference_assignment_checks_target() {
    let client = Client::in_memory();
    let kinds = kinds(&client);

    let unsaved = Model::builder(&kinds.author).set("name", "x").build(&client).unwrap();
    let err = Model::builder(&kinds.story)
        .set_reference("author", &unsaved)
        .build(&client)
        .unwrap_err();
    assert!(matches!(
        err,
        ModelError::Validation(ref msg)
            if msg == "Author instance must have a complete key before it can be stored as a reference"
    ));

    let mut other_story = Model::builder(&kinds.story).key_name("other").build(&client).unwrap();
    other_story.put(&client).await.unwrap();
    let mut story = Model::builder(&kinds.story).build(&client).unwrap();
    let err = story.set_reference("author", &other_story).unwrap_err();
    assert!(matches!(err, ModelError::Kind(ref msg) if msg == "Property author must be an instance of Author"));

    let err = story.set_reference("title", &other_story).unwrap_err();
    assert!(matches!(err, ModelError::Property(_)));

    let author_key = Key::from_path(None, "Author", "by-key").unwrap();
    story.set("author", author_key.clone()).unwrap();
    assert_eq!(story.reference_key("author").unwrap(), Some(author_key));
    assert!(matches!(
        story.set("author", 7).unwrap_err(),
        ModelError::Validation(_)
    ));
}

#[tokio::test]
async fn test_reverse_collection_queries_referencing_instances() {
    let client = Client::in_memory();
    let kinds = kinds(&client);
    let ada = saved_author(&client, &kinds, "ada").await;
    let grace = saved_author(&client, &kinds, "grace").await;

    for (title, author, editor) in [
        ("one", &ada, &grace),
        ("two", &ada, &ada),
        ("three", &grace, &ada),
    ] {
        let mut story = Model::builder(&kinds.story)
            .key_name(title)
            .set("title", title)
            .set_reference("author", author)
            .set_reference("editor", editor)
            .build(&client)
            .unwrap();
        story.put(&client).await.unwrap();
    }

    let mut written = ada
        .reverse_collection(&client, "stories")
        .unwrap()
        .order("title")
        .unwrap();
    let titles: Vec<String> = written
        .fetch::<Model>(&client, 10, 0)
        .await
        .unwrap()
        .iter()
        .map(|story| story.get("title").unwrap().as_str().unwrap().to_string())
        .collect();
    assert_eq!(titles, vec!["one", "two"]);

    let mut edited = ada.reverse_collection(&client, "edited").unwrap();
    assert_eq!(edited.count(&client, None).await.unwrap(), 2);

    assert_eq!(ada.reverse_collections(&client), vec!["edited", "stories"]);
    assert!(matches!(
        ada.reverse_collection(&client, "missing").unwrap_err(),
        ModelError::Property(ref msg) if msg == "Author has no collection missing"
    ));
}

#[tokio::test]
async fn test_colliding_collection_names_are_rejected() {
    let client = Client::in_memory();
    SchemaBuilder::new("Person")
        .property("name", Property::string())
        .build(client.registry())
        .unwrap();

    let err = SchemaBuilder::new("Letter")
        .property("sender", Property::reference("Person"))
        .property("recipient", Property::reference("Person"))
        .build(client.registry())
        .unwrap_err();
    assert!(matches!(
        err,
        ModelError::DuplicateProperty(ref msg) if msg == "Class Person already has property letter_set"
    ));

    let err = SchemaBuilder::new("Note")
        .property("owner", Property::reference("Person").collection_name("name"))
        .build(client.registry())
        .unwrap_err();
    assert!(matches!(err, ModelError::DuplicateProperty(_)));
}

#[tokio::test]
async fn test_self_reference_builds_a_tree() {
    let client = Client::in_memory();
    let node = SchemaBuilder::new("Node")
        .property("label", Property::string())
        .property("up", Property::self_reference().collection_name("children"))
        .build(client.registry())
        .unwrap();

    let mut root = Model::builder(&node).key_name("root").set("label", "root").build(&client).unwrap();
    root.put(&client).await.unwrap();
    for label in ["a", "b"] {
        let mut child = Model::builder(&node)
            .key_name(label)
            .set("label", label)
            .set_reference("up", &root)
            .build(&client)
            .unwrap();
        child.put(&client).await.unwrap();
    }

    let mut children = root.reverse_collection(&client, "children").unwrap();
    let keys: Vec<Key> = children.fetch(&client, 10, 0).await.unwrap();
    assert_eq!(keys.len(), 2);
}
