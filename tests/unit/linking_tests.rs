use indexmap::IndexMap;
use std::collections::HashMap;
use std::rc::Rc;

use xml_ormz::{
    Attributes, ConfigurationError, DiagnosticKind, Document, FieldDescriptor, Forest, Instance,
    Linker, Mapper, RecordingReporter, Resolved, SchemaRegistry, SchemaType, ValidationError,
    Value, resolver,
};

const CONTACTS: &str = r#"<Contacts>
    <Person name="Ann" address="Main St"/>
    <Person name="Bob" address="High St"/>
    <Person name="Cy" address="Nowhere"/>
</Contacts>"#;

const ADDRESSES: &str = r#"<Addresses>
    <Apartment location="Main St"/>
    <Apartment location="High St"/>
</Addresses>"#;

/// Address text to apartment location, as a caller-supplied environment
type Directory = HashMap<String, String>;

fn contacts(home: FieldDescriptor) -> Rc<SchemaRegistry> {
    SchemaRegistry::build(
        SchemaType::new("Contacts").child(
            SchemaType::new("Person")
                .field("name", FieldDescriptor::string())
                .field("address", FieldDescriptor::string())
                .field("home", home),
        ),
    )
    .unwrap()
}

fn addresses() -> Rc<SchemaRegistry> {
    SchemaRegistry::build(
        SchemaType::new("Addresses")
            .child(SchemaType::new("Apartment").field("location", FieldDescriptor::string())),
    )
    .unwrap()
}

fn directory_lookup() -> FieldDescriptor {
    FieldDescriptor::reference(["Addresses.Apartment"]).with_resolver(resolver(
        |context, person: &Instance| {
            let directory = context.env::<Directory>()?;
            let address = person.get("address")?;
            let location = directory.get(address.as_str()?)?;
            context
                .instances_of("Apartment")
                .into_iter()
                .find(|apartment| {
                    apartment.get("location").as_ref().and_then(Value::as_str)
                        == Some(location.as_str())
                })
                .map(Resolved::One)
        },
    ))
}

fn map(registry: &Rc<SchemaRegistry>, source: &str, xml: &str) -> Forest {
    let document = Document::parse_str(source, xml).unwrap();
    Mapper::new(Rc::clone(registry), Rc::new(RecordingReporter::new()))
        .parse(&document)
        .unwrap()
}

#[test]
fn test_resolver_uses_environment_and_all_forests() {
    let contacts = contacts(directory_lookup());
    let addresses = addresses();
    let forests = vec![
        map(&contacts, "contacts.xml", CONTACTS),
        map(&addresses, "addresses.xml", ADDRESSES),
    ];
    let reporter = Rc::new(RecordingReporter::new());

    let mut linker = Linker::new(
        forests,
        vec![Rc::clone(&contacts), Rc::clone(&addresses)],
        reporter.clone(),
    )
    .unwrap();
    let mut directory = Directory::new();
    directory.insert("Main St".to_string(), "Main St".to_string());
    directory.insert("High St".to_string(), "High St".to_string());
    linker.set_environment(directory);

    let report = linker.link().unwrap();
    assert_eq!(report.unresolved, 1);
    assert_eq!(reporter.count(DiagnosticKind::UnresolvedReference), 1);

    let people = linker.forests()[0].of_type("Person");
    let homes: Vec<Option<String>> = people
        .iter()
        .map(|p| {
            p.get("home")
                .and_then(|home| home.as_reference().and_then(|a| a.get("location")))
                .map(|location| location.to_string())
        })
        .collect();
    assert_eq!(
        homes,
        vec![Some("Main St".to_string()), Some("High St".to_string()), None]
    );
}

#[test]
fn test_wrong_target_type_fails_after_pass() {
    // resolves every person to itself, which is not an apartment
    let home = FieldDescriptor::reference(["Addresses.Apartment"])
        .with_resolver(resolver(|_, person: &Instance| Some(Resolved::One(person.clone()))));
    let contacts = contacts(home);
    let addresses = addresses();
    let forests = vec![map(&contacts, "contacts.xml", CONTACTS)];
    let reporter = Rc::new(RecordingReporter::new());

    let linker = Linker::new(forests, vec![contacts, addresses], reporter.clone()).unwrap();
    let result = linker.link();

    assert!(matches!(result, Err(ValidationError::ReferenceTarget { .. })));
    // every person was attempted
    assert_eq!(reporter.count(DiagnosticKind::LinkFailure), 3);
}

#[test]
fn test_reference_array_null_and_empty_results() {
    let registry = SchemaRegistry::build(
        SchemaType::new("Team").child(
            SchemaType::new("Member")
                .field("name", FieldDescriptor::string())
                .field(
                    "friends",
                    FieldDescriptor::reference_array(["Member"]).with_resolver(resolver(
                        |_, member: &Instance| match member.get("name")?.as_str()? {
                            "Ann" => Some(Resolved::Many(Vec::new())),
                            _ => None,
                        },
                    )),
                ),
        ),
    )
    .unwrap();
    let forest = map(
        &registry,
        "team.xml",
        r#"<Team><Member name="Ann"/><Member name="Bob"/></Team>"#,
    );
    let reporter = Rc::new(RecordingReporter::new());

    let linker = Linker::new(vec![forest], vec![registry], reporter.clone()).unwrap();
    let report = linker.link().unwrap();

    assert_eq!(report.empty, 1);
    assert_eq!(report.unresolved, 1);
    assert_eq!(reporter.count(DiagnosticKind::EmptyReference), 1);
    assert_eq!(reporter.warnings(), 1);
    for member in linker.forests()[0].of_type("Member") {
        assert_eq!(member.get("friends"), Some(Value::References(Vec::new())));
    }
}

#[test]
fn test_configuration_checked_before_linking() {
    let contacts = contacts(FieldDescriptor::reference(["Addresses.Apartment"]));
    let forest = map(&contacts, "contacts.xml", CONTACTS);

    let result = Linker::new(
        vec![forest],
        vec![contacts, addresses()],
        Rc::new(RecordingReporter::new()),
    );
    assert!(matches!(
        result,
        Err(ConfigurationError::MissingResolver { field, .. }) if field == "home"
    ));
}

/// Builds a `Member` that no forest owns
fn stranger() -> impl Fn() -> Option<Instance> + 'static {
    let outsiders = SchemaRegistry::build(
        SchemaType::new("Team")
            .child(SchemaType::new("Member").field("name", FieldDescriptor::string())),
    )
    .unwrap();
    let member = outsiders.model_type("Team.Member").unwrap();
    move || {
        let mut values: Attributes = IndexMap::new();
        values.insert("name".to_string(), Some(Value::from("Zed")));
        Instance::new(&member, values, &RecordingReporter::new()).ok()
    }
}

#[test]
fn test_targets_outside_forests_are_unresolved() {
    let make_peer = stranger();
    let make_friend = stranger();
    let registry = SchemaRegistry::build(
        SchemaType::new("Team").child(
            SchemaType::new("Member")
                .field("name", FieldDescriptor::string())
                .field(
                    "peer",
                    FieldDescriptor::reference(["Member"])
                        .with_resolver(resolver(move |_, _| make_peer().map(Resolved::One))),
                )
                .field(
                    "friends",
                    FieldDescriptor::reference_array(["Member"]).with_resolver(resolver(
                        move |context, member: &Instance| {
                            let mut friends: Vec<Instance> = context
                                .instances_of("Member")
                                .into_iter()
                                .filter(|other| !other.ptr_eq(member))
                                .collect();
                            friends.push(make_friend()?);
                            Some(Resolved::Many(friends))
                        },
                    )),
                ),
        ),
    )
    .unwrap();
    let forest = map(
        &registry,
        "team.xml",
        r#"<Team><Member name="Ann"/><Member name="Bob"/></Team>"#,
    );
    let reporter = Rc::new(RecordingReporter::new());

    let linker = Linker::new(vec![forest], vec![registry], reporter.clone()).unwrap();
    let report = linker.link().unwrap();

    assert_eq!(report.assigned, 0);
    assert_eq!(report.unresolved, 4);
    assert_eq!(reporter.count(DiagnosticKind::UnresolvedReference), 4);

    let members = linker.forests()[0].of_type("Member");
    assert_eq!(members[0].get("peer"), None);
    let friends = members[0].get("friends").unwrap();
    let friends = friends.as_references().unwrap();
    assert_eq!(friends.len(), 1);
    assert!(friends[0].ptr_eq(&members[1]));
}
