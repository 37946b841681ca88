use bson::DateTime;
use docmodel::{memory::InMemoryStore, prelude::*};

struct Data;
struct Source;
struct Item;
struct Stamped;
struct Address;
struct Person;
struct Employee;
struct Boss;

impl Model for Data {
    fn collection_name() -> &'static str {
        "data"
    }

    fn declare(schema: &mut Declaration) {
        schema
            .field("str", TypeMarker::String)
            .field("num", TypeMarker::Number)
            .field("bool", TypeMarker::Boolean)
            .field("date", TypeMarker::Date)
            .field("obj", TypeMarker::Object)
            .field("buf", TypeMarker::Buffer)
            .field("arr", TypeMarker::Array)
            .field("strs", FieldDecl::array_of(TypeMarker::String))
            .field("nums", FieldDecl::array_of(TypeMarker::Number))
            .field("bools", FieldDecl::array_of(TypeMarker::Boolean))
            .field("dates", FieldDecl::array_of(TypeMarker::Date))
            .field("objs", FieldDecl::array_of(TypeMarker::Object))
            .field("bufs", FieldDecl::array_of(TypeMarker::Buffer));
    }
}

impl Model for Source {
    fn collection_name() -> &'static str {
        "sources"
    }

    fn declare(schema: &mut Declaration) {
        schema.field(
            "source",
            TypeMarker::String
                .options()
                .choices(["reddit", "wired"])
                .default_value("reddit"),
        );
    }
}

impl Model for Item {
    fn collection_name() -> &'static str {
        "items"
    }

    fn declare(schema: &mut Declaration) {
        schema.field("price", TypeMarker::Number.options().min(0.0).max(100.0));
    }
}

impl Model for Stamped {
    fn collection_name() -> &'static str {
        "stamped"
    }

    fn declare(schema: &mut Declaration) {
        schema.field(
            "created",
            TypeMarker::Date
                .options()
                .default_with(|| DateTime::now().into()),
        );
    }
}

impl Model for Address {
    fn collection_name() -> &'static str {
        "address"
    }

    fn declare(schema: &mut Declaration) {
        schema
            .field("street", TypeMarker::String)
            .field("city", TypeMarker::String);
    }
}

impl Model for Person {
    fn collection_name() -> &'static str {
        "person"
    }

    fn declare(schema: &mut Declaration) {
        schema
            .field("name", TypeMarker::String.options().required())
            .field("address", Address::reference())
            .field("addresses", FieldDecl::array_of(Address::reference()));
    }
}

impl Model for Employee {
    fn collection_name() -> &'static str {
        "employee"
    }

    fn declare(schema: &mut Declaration) {
        schema
            .field("name", TypeMarker::String)
            .field("boss", Boss::reference());
    }
}

impl Model for Boss {
    fn collection_name() -> &'static str {
        "boss"
    }

    fn declare(schema: &mut Declaration) {
        schema
            .field("salary", TypeMarker::Number)
            .field("employees", FieldDecl::array_of(Employee::reference()));
    }
}

fn store() -> DocumentStore<InMemoryStore> {
    DocumentStore::new(InMemoryStore::new())
}

async fn address(store: &DocumentStore<InMemoryStore>, street: &str) -> Document {
    let address = store.create::<Address>().unwrap();
    address.set("street", street);
    address.set("city", "Springfield");
    store.save(&address).await.unwrap()
}

fn kind(err: DocumentStoreError) -> ValidationErrorKind {
    err.validation_kind()
        .cloned()
        .unwrap_or_else(|| panic!("expected a validation error, got {err:?}"))
}

#[tokio::test]
async fn scalar_types_round_trip() {
    let store = store();
    let now = DateTime::now();

    let data = store.create::<Data>().unwrap();
    data.set("str", "hello");
    data.set("num", 26);
    data.set("bool", true);
    data.set("date", now);
    data.set("obj", doc! { "hi": "bye" });
    data.set("buf", Value::buffer(b"hello".to_vec()));
    data.set("arr", Value::array(vec![Value::from(1), Value::from("number"), Value::from(true)]));
    store.save(&data).await.unwrap();

    let loaded = store
        .load_one::<Data>(doc! {})
        .await
        .unwrap()
        .unwrap();

    assert_eq!(loaded.id(), data.id());
    assert_eq!(loaded.get("str"), Some(Value::from("hello")));
    assert_eq!(loaded.get("num"), Some(Value::Number(26.0)));
    assert_eq!(loaded.get("bool"), Some(Value::Boolean(true)));
    assert_eq!(loaded.get("date").and_then(|date| date.as_date()), Some(now));
    assert_eq!(loaded.get("obj"), Some(Value::from(doc! { "hi": "bye" })));
    assert_eq!(
        loaded.get("buf").as_ref().and_then(Value::as_buffer),
        Some(b"hello".as_slice())
    );
    assert_eq!(
        loaded.get("arr"),
        Some(Value::array(vec![Value::from(1), Value::from("number"), Value::from(true)]))
    );
}

#[tokio::test]
async fn chrono_dates_keep_millisecond_precision() {
    let store = store();
    let now = chrono::Utc::now();

    let data = store.create::<Data>().unwrap();
    data.set("date", now);
    store.save(&data).await.unwrap();

    let loaded = store
        .load_by_id::<Data>(data.id().unwrap())
        .await
        .unwrap()
        .unwrap();
    let date = loaded.get("date").and_then(|date| date.as_date()).unwrap();

    assert_eq!(date.timestamp_millis(), now.timestamp_millis());
}

#[tokio::test]
async fn typed_arrays_round_trip_in_order() {
    let store = store();
    let dates = [DateTime::from_millis(1_000), DateTime::from_millis(2_000)];

    let data = store.create::<Data>().unwrap();
    data.set("strs", Value::array(["1", "2", "3"]));
    data.set("nums", Value::array([1, 2, 3]));
    data.set("bools", Value::array([true, false]));
    data.set("dates", Value::array(dates));
    data.set("objs", Value::array([doc! { "a": 1 }, doc! { "b": 2 }]));
    data.set(
        "bufs",
        Value::array([Value::buffer(b"one".to_vec()), Value::buffer(b"two".to_vec())]),
    );
    store.save(&data).await.unwrap();

    let loaded = store
        .load_one::<Data>(doc! {})
        .await
        .unwrap()
        .unwrap();

    assert_eq!(loaded.get("strs"), Some(Value::array(["1", "2", "3"])));
    assert_eq!(loaded.get("nums"), Some(Value::array([1.0, 2.0, 3.0])));
    assert_eq!(loaded.get("bools"), Some(Value::array([true, false])));
    assert_eq!(loaded.get("dates"), Some(Value::array(dates)));
    assert_eq!(
        loaded.get("objs"),
        Some(Value::array([doc! { "a": 1 }, doc! { "b": 2 }]))
    );
    assert_eq!(
        loaded.get("bufs"),
        Some(Value::array([Value::buffer(b"one".to_vec()), Value::buffer(b"two".to_vec())]))
    );
}

#[tokio::test]
async fn type_mismatches_are_rejected_without_writing() {
    let store = store();

    let data = store.create::<Data>().unwrap();
    data.set("num", "26");
    let err = store.save(&data).await.unwrap_err();
    assert!(matches!(kind(err), ValidationErrorKind::TypeMismatch { .. }));

    let data = store.create::<Data>().unwrap();
    data.set("strs", Value::array([1, 2, 3]));
    let err = store.save(&data).await.unwrap_err();
    assert!(matches!(kind(err), ValidationErrorKind::TypeMismatch { .. }));

    assert!(!data.is_saved());
    assert_eq!(store.count::<Data>(doc! {}).await.unwrap(), 0);
}

#[tokio::test]
async fn choices_restrict_values() {
    let store = store();

    let source = store.create::<Source>().unwrap();
    source.set("source", "wired");
    store.save(&source).await.unwrap();

    let source = store.create::<Source>().unwrap();
    source.set("source", "google");
    let err = store.save(&source).await.unwrap_err();
    assert_eq!(kind(err), ValidationErrorKind::ChoiceViolation);

    assert_eq!(store.count::<Source>(doc! {}).await.unwrap(), 1);
}

#[tokio::test]
async fn ranges_are_inclusive() {
    let store = store();

    for price in [0, 50, 100] {
        let item = store.create::<Item>().unwrap();
        item.set("price", price);
        store.save(&item).await.unwrap();
    }

    for price in [-1, 101] {
        let item = store.create::<Item>().unwrap();
        item.set("price", price);
        let err = store.save(&item).await.unwrap_err();
        assert_eq!(kind(err), ValidationErrorKind::RangeViolation);
    }

    assert_eq!(store.count::<Item>(doc! {}).await.unwrap(), 3);
}

#[tokio::test]
async fn literal_defaults_are_written_back() {
    let store = store();

    let source = store.create::<Source>().unwrap();
    store.save(&source).await.unwrap();

    assert_eq!(source.get("source"), Some(Value::from("reddit")));

    let loaded = store
        .load_by_id::<Source>(source.id().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.get("source"), Some(Value::from("reddit")));
}

#[tokio::test]
async fn produced_defaults_run_at_save_time() {
    let store = store();
    let before = DateTime::now();

    let stamped = store.create::<Stamped>().unwrap();
    store.save(&stamped).await.unwrap();

    let created = stamped
        .get("created")
        .and_then(|created| created.as_date())
        .unwrap();
    assert!(created >= before);
    assert!(created <= DateTime::now());
}

#[tokio::test]
async fn required_fields_reject_unset_and_null() {
    let store = store();

    let person = store.create::<Person>().unwrap();
    let err = store.save(&person).await.unwrap_err();
    assert_eq!(kind(err), ValidationErrorKind::RequiredMissing);

    person.set("name", Value::Null);
    let err = store.save(&person).await.unwrap_err();
    assert_eq!(kind(err), ValidationErrorKind::RequiredMissing);
}

#[tokio::test]
async fn references_are_populated_on_load() {
    let store = store();
    let home = address(&store, "742 Evergreen Terrace").await;

    let person = store.create::<Person>().unwrap();
    person.set("name", "Homer");
    person.set("address", &home);
    store.save(&person).await.unwrap();

    let loaded = store
        .load_one::<Person>(doc! { "name": "Homer" })
        .await
        .unwrap()
        .unwrap();
    let resolved = loaded
        .get("address")
        .and_then(|address| address.as_document())
        .unwrap();

    assert!(resolved.is::<Address>());
    assert_eq!(resolved.id(), home.id());
    assert_eq!(resolved.get("street"), Some(Value::from("742 Evergreen Terrace")));
}

#[tokio::test]
async fn reference_arrays_are_populated_in_order() {
    let store = store();
    let first = address(&store, "1 First St").await;
    let second = address(&store, "2 Second St").await;

    let person = store.create::<Person>().unwrap();
    person.set("name", "Marge");
    person.push("addresses", &first).unwrap();
    person.push("addresses", &second).unwrap();
    store.save(&person).await.unwrap();

    let loaded = store
        .load_one::<Person>(doc! { "name": "Marge" })
        .await
        .unwrap()
        .unwrap();
    let streets = loaded
        .get("addresses")
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(|address| address.as_document().unwrap().get("street"))
        .collect::<Vec<_>>();

    assert_eq!(
        streets,
        vec![Some(Value::from("1 First St")), Some(Value::from("2 Second St"))]
    );
}

#[tokio::test]
async fn cyclic_references_resolve_one_level() {
    let store = store();

    let boss = store.create::<Boss>().unwrap();
    boss.set("salary", 10_000);
    store.save(&boss).await.unwrap();

    let employee = store.create::<Employee>().unwrap();
    employee.set("name", "Scott");
    employee.set("boss", boss.downgrade());
    store.save(&employee).await.unwrap();

    boss.push("employees", &employee).unwrap();
    store.save(&boss).await.unwrap();

    let boss_id = boss.id().unwrap();
    let employee_id = employee.id().unwrap();

    let loaded = store
        .load_one::<Boss>(doc! { "salary": 10_000 })
        .await
        .unwrap()
        .unwrap();
    let employees = loaded.get("employees").unwrap();
    let first = employees.as_array().unwrap()[0].as_document().unwrap();

    assert!(first.is::<Employee>());
    assert_eq!(first.get("name"), Some(Value::from("Scott")));
    assert_eq!(first.get("boss"), Some(Value::from(boss_id.to_string())));

    let loaded = store
        .load_one::<Employee>(doc! { "name": "Scott" })
        .await
        .unwrap()
        .unwrap();
    let resolved = loaded.get("boss").unwrap().as_document().unwrap();

    assert_eq!(resolved.get("salary"), Some(Value::Number(10_000.0)));
    assert_eq!(
        resolved.get("employees"),
        Some(Value::array([employee_id.to_string()]))
    );
}

#[tokio::test]
async fn references_to_unsaved_documents_are_rejected() {
    let store = store();

    let employee = store.create::<Employee>().unwrap();
    employee.set("boss", store.create::<Boss>().unwrap());

    assert!(matches!(
        store.save(&employee).await,
        Err(DocumentStoreError::UnsavedReference { field }) if field == "boss"
    ));
    assert_eq!(store.count::<Employee>(doc! {}).await.unwrap(), 0);
}

#[tokio::test]
async fn references_of_the_wrong_type_are_rejected() {
    let store = store();
    let home = address(&store, "Nowhere").await;

    let employee = store.create::<Employee>().unwrap();
    employee.set("boss", &home);

    let err = store.save(&employee).await.unwrap_err();
    assert!(matches!(kind(err), ValidationErrorKind::TypeMismatch { .. }));
}

#[tokio::test]
async fn missing_referenced_documents_fail_the_load() {
    let store = store();
    let home = address(&store, "Gone").await;

    let person = store.create::<Person>().unwrap();
    person.set("name", "Bart");
    person.set("address", &home);
    store.save(&person).await.unwrap();

    store.drop_collection("address").await.unwrap();

    let err = store
        .load_one::<Person>(doc! { "name": "Bart" })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DocumentStoreError::ReferenceNotFound { ref collection, ref id }
            if collection == "address" && *id == home.id().unwrap().to_string()
    ));

    // Without population the stored identifier comes back untouched.
    let loaded = store
        .load_one_with::<Person>(
            doc! { "name": "Bart" },
            LoadOptions::new().populate(Populate::None),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        loaded.get("address"),
        Some(Value::from(home.id().unwrap().to_string()))
    );
}

#[tokio::test]
async fn population_can_be_limited_to_fields() {
    let store = store();
    let home = address(&store, "Home").await;
    let work = address(&store, "Work").await;

    let person = store.create::<Person>().unwrap();
    person.set("name", "Lisa");
    person.set("address", &home);
    person.set("addresses", Value::array([&work]));
    store.save(&person).await.unwrap();

    let loaded = store
        .load_one_with::<Person>(
            doc! { "name": "Lisa" },
            LoadOptions::new().populate(Populate::fields(["addresses"])),
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        loaded.get("address"),
        Some(Value::from(home.id().unwrap().to_string()))
    );
    assert!(loaded.get("addresses").unwrap().as_array().unwrap()[0]
        .as_document()
        .is_some());
}

#[tokio::test]
async fn identifier_strings_are_accepted_as_references() {
    let store = store();
    let home = address(&store, "By id").await;

    let person = store.create::<Person>().unwrap();
    person.set("name", "Maggie");
    person.set("address", home.id().unwrap().to_string());
    store.save(&person).await.unwrap();

    let loaded = store
        .load_one::<Person>(doc! { "name": "Maggie" })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        loaded.get("address").and_then(|address| address.as_document()).unwrap().id(),
        home.id()
    );
}

#[tokio::test]
async fn saving_again_updates_in_place() {
    let store = store();

    let person = store.create::<Person>().unwrap();
    person.set("name", "Ned");
    store.save(&person).await.unwrap();
    let id = person.id();

    person.set("name", "Ned Flanders");
    store.save(&person).await.unwrap();

    assert_eq!(person.id(), id);
    assert_eq!(store.count::<Person>(doc! {}).await.unwrap(), 1);
    assert!(store
        .load_one::<Person>(doc! { "name": "Ned" })
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn load_one_without_a_match_is_none() {
    let store = store();

    assert!(store
        .load_one::<Person>(doc! { "name": "Nobody" })
        .await
        .unwrap()
        .is_none());
    assert!(store
        .load_many::<Person>(doc! {})
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn undeclared_fields_are_not_written() {
    let store = store();

    let person = store.create::<Person>().unwrap();
    person.set("name", "Moe");
    person.set("nickname", "Szyslak");
    person.save(&store).await.unwrap();

    let loaded = store
        .load_by_id::<Person>(person.id().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.get("nickname"), None);
    assert_eq!(person.get("nickname"), Some(Value::from("Szyslak")));
}
