#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use keyed_model::{
    Constraint, CreateOptions, DestroyOptions, Entity, FieldRegistry, FindOptions, KeyedModel,
    MemoryTable, MemoryTransaction, Model, ModelError, OneOrMany, Order, Record, UpdateOptions,
    ViolationKind, Where,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
struct Ticket {
    key: i64,
    status: String,
    priority: i64,
}

#[derive(Serialize)]
struct NewTicket {
    status: String,
    priority: i64,
}

#[derive(Default, Serialize)]
struct TicketChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<i64>,
}

#[derive(Default, Serialize)]
struct TicketQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<OneOrMany<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<OneOrMany<String>>,
    #[serde(rename = "!status", skip_serializing_if = "Option::is_none")]
    not_status: Option<OneOrMany<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<OneOrMany<i64>>,
}

struct Tickets;

impl Model for Tickets {
    type Entity = Ticket;
    type CreateValues = NewTicket;
    type UpdateValues = TicketChanges;
    type QueryItem = TicketQuery;

    fn table_name() -> &'static str {
        "tickets"
    }
}

/// Registry `{key, a, b}` with untyped payloads, so malformed input can be
/// sent through the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
struct Pair {
    key: i64,
    a: i64,
    b: i64,
}

struct Pairs;

impl Model for Pairs {
    type Entity = Pair;
    type CreateValues = Value;
    type UpdateValues = Value;
    type QueryItem = Value;

    fn table_name() -> &'static str {
        "pairs"
    }
}

fn records(rows: Value) -> Vec<Record> {
    match rows {
        Value::Array(rows) => rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn tickets() -> KeyedModel<Tickets, MemoryTable> {
    let table = MemoryTable::new();
    table.seed(
        "tickets",
        records(json!([
            {"key": 1, "status": "open", "priority": 2},
            {"key": 2, "status": "closed", "priority": 1},
            {"key": 3, "status": "archived", "priority": 3},
            {"key": 4, "status": "review", "priority": 1}
        ])),
    );
    KeyedModel::new(table).unwrap()
}

fn pairs() -> KeyedModel<Pairs, MemoryTable> {
    let table = MemoryTable::new();
    table.seed("pairs", records(json!([{"key": 5, "a": 0, "b": 0}])));
    KeyedModel::new(table).unwrap()
}

fn keys(entities: &[Ticket]) -> Vec<i64> {
    entities.iter().map(|t| t.key).collect()
}

fn status(values: &[&str]) -> Option<OneOrMany<String>> {
    match values {
        [one] => Some(OneOrMany::One(one.to_string())),
        many => Some(OneOrMany::Many(many.iter().map(|s| s.to_string()).collect())),
    }
}

#[test]
fn test_construction_requires_key_field() {
    let registry = FieldRegistry::new()
        .with_field("a", Constraint::integer())
        .with_field("b", Constraint::integer());
    let result = KeyedModel::<Pairs, _>::with_registry(MemoryTable::new(), registry);
    assert!(matches!(result, Err(ModelError::Configuration(_))));

    let registry = FieldRegistry::new().with_key(Constraint::date());
    let result = KeyedModel::<Pairs, _>::with_registry(MemoryTable::new(), registry);
    assert!(matches!(result, Err(ModelError::Configuration(_))));

    let registry = FieldRegistry::new()
        .with_key(Constraint::string())
        .with_field("a", Constraint::integer());
    assert!(KeyedModel::<Pairs, _>::with_registry(MemoryTable::new(), registry).is_ok());
}

#[test]
fn test_field_names() {
    let model = tickets();
    assert_eq!(model.field_names(false), vec!["key", "status", "priority"]);
    assert_eq!(model.field_names(true), vec!["status", "priority"]);
    assert_eq!(model.table(), "tickets");
}

#[tokio::test]
async fn test_find_by_key() {
    let model = tickets();

    let ticket = model.find_by_key(2, FindOptions::new()).await.unwrap();
    assert_eq!(
        ticket,
        Some(Ticket {
            key: 2,
            status: "closed".into(),
            priority: 1
        })
    );

    let missing = model.find_by_key(99, FindOptions::new()).await.unwrap();
    assert_eq!(missing, None);
}

#[tokio::test]
async fn test_find_by_key_validates_key_type() {
    let model = tickets();
    let err = model.find_by_key("2", FindOptions::new()).await.unwrap_err();
    assert!(err.is_validation());

    let unchecked = model
        .find_by_key("2", FindOptions::new().without_validation())
        .await
        .unwrap();
    assert_eq!(unchecked, None);
}

#[tokio::test]
async fn test_or_of_items_end_to_end() {
    let model = tickets();
    let filter = Where::any([
        TicketQuery {
            status: status(&["open"]),
            ..Default::default()
        },
        TicketQuery {
            not_status: status(&["closed", "archived"]),
            ..Default::default()
        },
    ]);

    let found = model
        .find_all(filter, FindOptions::new().order_by("key", Order::Asc))
        .await
        .unwrap();
    assert_eq!(keys(&found), vec![1, 4]);
}

#[tokio::test]
async fn test_filter_violations_are_all_reported() {
    let model = pairs();
    let filter = Where::any([
        json!({"a": 1, "!a": 2}),
        json!({"b": "1", "c": 3}),
    ]);

    let err = model.find_all(filter, FindOptions::new()).await.unwrap_err();
    let violations = err.violations().unwrap();
    assert_eq!(violations.len(), 3);
    assert!(violations.iter().any(|v| v.path == "[0].a" && v.kind == ViolationKind::Exclusive));
    assert!(violations.iter().any(|v| v.path == "[1].b" && v.kind == ViolationKind::Type));
    assert!(violations.iter().any(|v| v.path == "[1].c" && v.kind == ViolationKind::Unknown));
}

#[tokio::test]
async fn test_find_all_orders_and_paginates() {
    let model = tickets();
    let opts = FindOptions::new()
        .order_by("priority", Order::Desc)
        .order_by("key", Order::Asc)
        .offset(1)
        .limit(2);

    let found = model.find_all(Where::one(TicketQuery::default()), opts).await.unwrap();
    assert_eq!(keys(&found), vec![1, 2]);

    let err = model
        .find_all(
            Where::one(TicketQuery::default()),
            FindOptions::new().order_by("color", Order::Asc),
        )
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_update_by_key() {
    let model = tickets();
    let changes = TicketChanges {
        status: Some("closed".into()),
        ..Default::default()
    };

    let updated = model
        .update_by_key(1, &changes, UpdateOptions::new())
        .await
        .unwrap();
    assert_eq!(updated.status, "closed");
    assert_eq!(updated.priority, 2);

    let missing = model
        .update_by_key(99, &changes, UpdateOptions::new())
        .await
        .unwrap_err();
    assert!(missing.is_not_found());
}

#[tokio::test]
async fn test_save_is_update_by_key_of_non_key_fields() {
    let saved_model = pairs();
    let updated_model = pairs();

    let saved = saved_model
        .save(&Pair { key: 5, a: 1, b: 2 }, UpdateOptions::new())
        .await
        .unwrap();
    let updated = updated_model
        .update_by_key(5, &json!({"a": 1, "b": 2}), UpdateOptions::new())
        .await
        .unwrap();

    assert_eq!(saved, updated);
    assert_eq!(
        saved_model.client().records("pairs"),
        updated_model.client().records("pairs")
    );
}

#[tokio::test]
async fn test_values_are_not_coerced() {
    let model = pairs();
    let err = model
        .update_by_key(5, &json!({"a": "1"}), UpdateOptions::new())
        .await
        .unwrap_err();
    assert!(
        err.violations()
            .unwrap()
            .iter()
            .any(|v| v.path == "a" && v.kind == ViolationKind::Type)
    );

    // Values validation off, query validation still on
    let err = model
        .update_by_key(
            "5",
            &json!({"a": "1"}),
            UpdateOptions::new().without_values_validation(),
        )
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let stored = model
        .update_by_key(
            5,
            &json!({"b": 9}),
            UpdateOptions::new().without_values_validation(),
        )
        .await
        .unwrap();
    assert_eq!(stored.b, 9);
}

#[tokio::test]
async fn test_create_requires_every_non_key_field() {
    let model = pairs();

    let err = model
        .create(&json!({"a": 1}), CreateOptions::new())
        .await
        .unwrap_err();
    assert!(
        err.violations()
            .unwrap()
            .iter()
            .any(|v| v.path == "b" && v.kind == ViolationKind::Required)
    );

    let err = model
        .create(&json!({"key": 7, "a": 1, "b": 2}), CreateOptions::new())
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let created = model
        .create(&json!({"a": 1, "b": 2}), CreateOptions::new())
        .await
        .unwrap();
    assert_eq!(created, Pair { key: 6, a: 1, b: 2 });
}

#[tokio::test]
async fn test_update_accepts_empty_values() {
    let model = tickets();
    let unchanged = model
        .update_by_key(3, &TicketChanges::default(), UpdateOptions::new())
        .await
        .unwrap();
    assert_eq!(unchanged.status, "archived");
}

#[tokio::test]
async fn test_destroy_by_key_and_delete() {
    let model = tickets();

    model.destroy_by_key(2, DestroyOptions::new()).await.unwrap();
    assert_eq!(model.find_by_key(2, FindOptions::new()).await.unwrap(), None);

    let err = model.destroy_by_key(2, DestroyOptions::new()).await.unwrap_err();
    assert!(err.is_not_found());

    let ticket = model.find_by_key(1, FindOptions::new()).await.unwrap().unwrap();
    model.delete(&ticket, DestroyOptions::new()).await.unwrap();
    assert_eq!(
        model.count(Where::one(TicketQuery::default()), FindOptions::new()).await.unwrap(),
        2
    );
}

#[tokio::test]
async fn test_generic_operations_through_keyed_model() {
    let model = tickets();
    let low = || TicketQuery {
        priority: Some(OneOrMany::One(1)),
        ..Default::default()
    };

    let created = model
        .create(
            &NewTicket {
                status: "open".into(),
                priority: 1,
            },
            CreateOptions::new(),
        )
        .await
        .unwrap();
    assert_eq!(created.key, 5);

    let changes = TicketChanges {
        status: Some("triaged".into()),
        ..Default::default()
    };
    let updated = model
        .update(Where::one(low()), &changes, UpdateOptions::new())
        .await
        .unwrap();
    assert_eq!(keys(&updated), vec![2, 4, 5]);

    let first = model
        .find_one(
            Where::one(TicketQuery {
                key: Some(OneOrMany::Many(vec![3, 4])),
                ..Default::default()
            }),
            FindOptions::new().order_by("key", Order::Desc),
        )
        .await
        .unwrap();
    assert_eq!(first.map(|t| t.key), Some(4));

    let removed = model
        .destroy(Where::one(low()), DestroyOptions::new())
        .await
        .unwrap();
    assert_eq!(removed, 3);

    let err = model
        .destroy_one(Where::one(low()), DestroyOptions::new())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_transaction_is_forwarded() {
    let model = tickets();
    let mut tx = MemoryTransaction::new();

    model
        .find_by_key(1, FindOptions::new().transaction(&mut tx))
        .await
        .unwrap();
    model
        .update_by_key(
            1,
            &TicketChanges::default(),
            UpdateOptions::new().transaction(&mut tx),
        )
        .await
        .unwrap();
    model
        .destroy_by_key(1, DestroyOptions::new().transaction(&mut tx))
        .await
        .unwrap();
    model.find_by_key(2, FindOptions::new()).await.unwrap();

    assert_eq!(
        tx.statements(),
        &["SELECT tickets", "UPDATE tickets", "DELETE tickets"]
    );
}

#[test]
fn test_derived_registry() {
    #[derive(Clone, Serialize, Deserialize, Entity)]
    struct Account {
        key: String,
        #[serde(rename = "displayName")]
        #[field(name = "displayName")]
        display_name: String,
        active: bool,
        balance: f64,
        opened: chrono::DateTime<chrono::Utc>,
        nickname: Option<String>,
        #[field(skip)]
        #[serde(skip)]
        tags: Vec<String>,
    }

    let registry = Account::field_registry();
    assert_eq!(
        registry.field_names(false),
        vec!["key", "displayName", "active", "balance", "opened", "nickname"]
    );
    assert_eq!(registry.get("key").map(|f| f.constraint()), Some(&Constraint::string()));
    assert_eq!(registry.get("balance").map(|f| f.constraint()), Some(&Constraint::number()));
    assert_eq!(registry.get("opened").map(|f| f.constraint()), Some(&Constraint::date()));
    assert_eq!(registry.get("nickname").map(|f| f.constraint()), Some(&Constraint::string()));
    assert!(registry.get("nickname").is_some_and(|f| f.is_optional()));
    assert!(!registry.get("balance").is_some_and(|f| f.is_optional()));
    assert!(registry.require_key().is_ok());

    let account = Account {
        key: "acc-1".into(),
        display_name: "Ada".into(),
        active: true,
        balance: 0.0,
        opened: chrono::Utc::now(),
        nickname: None,
        tags: Vec::new(),
    };
    assert_eq!(account.key().to_string(), "acc-1");
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
struct Person {
    key: i64,
    name: String,
    nickname: Option<String>,
}

struct People;

impl Model for People {
    type Entity = Person;
    type CreateValues = Value;
    type UpdateValues = Value;
    type QueryItem = Value;

    fn table_name() -> &'static str {
        "people"
    }
}

fn people() -> KeyedModel<People, MemoryTable> {
    let table = MemoryTable::new();
    table.seed(
        "people",
        records(json!([{"key": 1, "name": "ada", "nickname": "countess"}])),
    );
    KeyedModel::new(table).unwrap()
}

#[tokio::test]
async fn test_optional_fields_round_trip() {
    let model = people();
    let registry = Person::field_registry();
    assert!(registry.get("nickname").is_some_and(|f| f.is_optional()));
    assert!(!registry.get("name").is_some_and(|f| f.is_optional()));

    let cleared = model
        .save(
            &Person {
                key: 1,
                name: "ada".into(),
                nickname: None,
            },
            UpdateOptions::new(),
        )
        .await
        .unwrap();
    assert_eq!(cleared.nickname, None);
    assert_eq!(
        model.find_by_key(1, FindOptions::new()).await.unwrap(),
        Some(cleared)
    );

    let created = model
        .create(&json!({"name": "grace"}), CreateOptions::new())
        .await
        .unwrap();
    assert_eq!(
        created,
        Person {
            key: 2,
            name: "grace".into(),
            nickname: None
        }
    );

    let renamed = model
        .update_by_key(2, &json!({"nickname": "amazing"}), UpdateOptions::new())
        .await
        .unwrap();
    assert_eq!(renamed.nickname.as_deref(), Some("amazing"));

    let unnamed = model
        .find_all(Where::one(json!({"nickname": null})), FindOptions::new())
        .await
        .unwrap();
    assert_eq!(unnamed.iter().map(|p| p.key).collect::<Vec<_>>(), vec![1]);

    let err = model
        .create(&json!({"name": null}), CreateOptions::new())
        .await
        .unwrap_err();
    assert!(
        err.violations()
            .unwrap()
            .iter()
            .any(|v| v.path == "name" && v.kind == ViolationKind::Type)
    );
}

#[tokio::test]
async fn test_unvalidated_values_cannot_rewrite_keys() {
    let loose = pairs();
    let err = loose
        .update_by_key(
            5,
            &json!({"key": 6}),
            UpdateOptions::new().without_values_validation(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::StorageError(_)));
    assert!(loose.find_by_key(5, FindOptions::new()).await.unwrap().is_some());
}
