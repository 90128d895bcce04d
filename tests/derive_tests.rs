/// Derive tests
///
/// `#[derive(Model)]` output checked through the registered metadata.
/// Run with: cargo test --test derive_tests

use topaz::{Model, PropRole, Relation, ResultSet, Value, map_rows};

#[derive(Debug, Default, Model)]
struct Group {
    id: i64,
    title: String,
}

#[derive(Debug, Default, Model)]
struct Tag {
    label: String,
}

#[derive(Debug, Default, Model)]
#[model(table = "members")]
struct Member {
    id: i64,
    #[prop(name = "user_name")]
    name: String,
    #[prop(read_only)]
    display: String,
    #[prop(belongs_to, by_key = "group_id")]
    group: Option<Group>,
    #[prop(has_many)]
    tags: Vec<Tag>,
    #[prop(table)]
    profile: Group,
    #[prop(skip)]
    cache: Vec<String>,
}

#[derive(Model)]
#[model(no_constructor)]
struct Opaque {
    id: i32,
}

#[test]
fn test_properties_in_declaration_order() {
    let meta = Member::meta();
    let names: Vec<&str> = meta.properties().map(|p| p.name()).collect();

    assert_eq!(names, vec!["id", "name", "display", "group", "tags", "profile"]);
    assert!(!meta.contains("cache"));
    assert_eq!(meta.table_name(), "members");
}

#[test]
fn test_roles_and_options() {
    let meta = Member::meta();

    let name = meta.get("name").unwrap();
    assert_eq!(name.role(), PropRole::Column);
    assert_eq!(name.target_name(), "user_name");

    assert!(meta.get("display").unwrap().is_read_only());

    let group = meta.get("group").unwrap();
    assert_eq!(group.relation(), Some(Relation::BelongsTo));
    assert_eq!(group.by_key(), Some("group_id"));

    assert_eq!(meta.get("tags").unwrap().relation(), Some(Relation::HasMany));
    assert_eq!(meta.get("profile").unwrap().relation(), Some(Relation::HasOne));
}

#[test]
fn test_derived_model_maps_rows() {
    let rs = ResultSet::from_labels(
        &["id", "user_name", "display", "group.title", "tags.label", "profile.id", "cache"],
        vec![vec![
            Value::BigInt(5),
            Value::from("eve"),
            Value::from("ignored"),
            Value::from("admins"),
            Value::from("red"),
            Value::Integer(9),
            Value::from("ignored"),
        ]],
    );

    let members = map_rows::<Member>(&rs).unwrap();
    let member = &members[0];

    assert_eq!(member.id, 5);
    assert_eq!(member.name, "eve");
    assert_eq!(member.display, "");
    assert_eq!(member.group.as_ref().map(|g| g.title.as_str()), Some("admins"));
    assert_eq!(member.tags.len(), 1);
    assert_eq!(member.tags[0].label, "red");
    assert_eq!(member.profile.id, 9);
    assert!(member.cache.is_empty());
}

#[test]
fn test_no_constructor_model() {
    let rs = ResultSet::from_labels(&["id"], vec![vec![Value::Integer(1)]]);
    assert!(map_rows::<Opaque>(&rs).is_err());

    let opaque = Opaque { id: 4 };
    let meta = Opaque::meta();
    let values = meta.column_values(&opaque);
    assert_eq!(values, vec![("id", Value::Integer(4))]);
}
