// End-to-end scenarios: build a small schema, resolve and freeze the
// whole context, then query the merged views and the algebra.

use std::io;
use std::sync::{Arc, Mutex};

use metacore::object::{AlternativeType, FunctionType, TupleType};
use metacore::{
    Attribute, ClassType, CollectionKind, DbColumn, DeferredIndex, IndexPart, MetaError,
    MetaObject, Reference, ReferenceAspect, StorageSpec, TypeContext, TypeId, TypeRef,
    TypeSystem,
};

fn simple(name: &str, column: &str) -> Attribute {
    Attribute::new(name, StorageSpec::new(1)).with_column(DbColumn::new(column, true))
}

/// Party (abstract, primary key on name) <- Person <- Employee, plus a
/// Company branch and a reference from Employee to Company.
fn build_company_schema() -> (TypeContext, TypeId, TypeId, TypeId, TypeId) {
    let mut ctx = TypeContext::new();
    ctx.register_primitive("String").unwrap();

    let mut party = ClassType::new("Party");
    party.set_abstract(true).unwrap();
    party
        .add_attribute(simple("name", "NAME").mandatory(true))
        .unwrap();
    party
        .set_primary_key(
            DeferredIndex::new("PARTY_PK", vec![IndexPart::attribute("name")]).unique(true),
        )
        .unwrap();
    let party_id = ctx.add(MetaObject::Class(party)).unwrap();

    let mut person = ClassType::new("Person");
    person.set_superclass("Party").unwrap();
    person.add_attribute(simple("age", "AGE")).unwrap();
    let person_id = ctx.add(MetaObject::Class(person)).unwrap();

    let mut company = ClassType::new("Company");
    company.set_superclass("Party").unwrap();
    let company_id = ctx.add(MetaObject::Class(company)).unwrap();

    let mut employee = ClassType::new("Employee");
    employee.set_superclass("Person").unwrap();
    employee
        .override_attribute(simple("name", "NAME").mandatory(true).immutable(true))
        .unwrap();
    employee
        .add_attribute(
            Attribute::new("employer", StorageSpec::new(1))
                .with_reference(Reference::new("Company").use_default_index(true))
                .with_column(DbColumn::with_aspect(
                    "EMPLOYER_ID",
                    true,
                    ReferenceAspect::TargetId,
                )),
        )
        .unwrap();
    let employee_id = ctx.add(MetaObject::Class(employee)).unwrap();

    (ctx, party_id, person_id, company_id, employee_id)
}

#[test]
fn merged_attributes_and_layout() {
    let (mut ctx, party_id, person_id, _, employee_id) = build_company_schema();
    ctx.resolve_references().unwrap();

    for id in [party_id, person_id, employee_id] {
        assert!(ctx.node(id).is_frozen());
    }

    let employee = ctx.node(employee_id).as_class().unwrap();
    let all: Vec<_> = employee
        .attributes(&ctx)
        .unwrap()
        .iter()
        .map(|a| a.name().to_string())
        .collect();
    assert_eq!(all, ["name", "age", "employer"]);

    // The override replaces the inherited attribute in place and is
    // owned by the overriding class at the inherited position.
    let name = employee.attribute(&ctx, "name").unwrap();
    assert!(name.is_immutable());
    assert_eq!(name.owner(), Some(employee_id));
    assert_eq!(name.cache_index(), Some(0));

    // Inherited, not overridden: still owned by the declaring class.
    let age = employee.attribute(&ctx, "age").unwrap();
    assert_eq!(age.owner(), Some(person_id));
    assert_eq!(age.cache_index(), Some(1));

    // Locally declared attributes extend the superclass layout.
    let employer = employee.attribute(&ctx, "employer").unwrap();
    assert_eq!(employer.owner(), Some(employee_id));
    assert_eq!(employer.cache_index(), Some(2));

    assert_eq!(employee.cache_size(&ctx).unwrap(), 3);
    assert_eq!(employee.db_column_count(&ctx).unwrap(), 3);
    assert!(employee.is_inherited(&ctx, "age"));
    assert!(!employee.is_inherited(&ctx, "employer"));
    assert!(employee.inherits_from(&ctx, party_id));
    assert!(employee.inherits_from(&ctx, person_id));
    assert!(!employee.inherits_from(&ctx, employee_id));

    // Unrelated class sees none of it.
    let party = ctx.node(party_id).as_class().unwrap();
    assert!(party.attribute(&ctx, "employer").is_none());
}

#[test]
fn primary_key_and_reference_index() {
    let (mut ctx, _, _, _, employee_id) = build_company_schema();
    ctx.resolve_references().unwrap();

    let employee = ctx.node(employee_id).as_class().unwrap();

    // Primary key is inherited from Party.
    let pk = employee.primary_key(&ctx).unwrap().unwrap();
    assert_eq!(pk.name(), "PARTY_PK");
    assert!(pk.is_unique());

    // The reference requested the default lookup index.
    let indexes = employee.indexes(&ctx).unwrap();
    let employer_index = indexes.iter().find(|i| i.name() == "employer").unwrap();
    let cols: Vec<_> = employer_index.columns().iter().map(|c| c.column()).collect();
    assert_eq!(cols, ["EMPLOYER_ID"]);
}

#[test]
fn subclass_index_replaces_inherited_by_name() {
    let mut ctx = TypeContext::new();

    let mut base = ClassType::new("Base");
    base.add_attribute(simple("a", "A")).unwrap();
    base.add_attribute(simple("b", "B")).unwrap();
    base.add_index(DeferredIndex::new(
        "BY_KEY",
        vec![IndexPart::attribute("a")],
    ))
    .unwrap();
    ctx.add(MetaObject::Class(base)).unwrap();

    let mut sub = ClassType::new("Sub");
    sub.set_superclass("Base").unwrap();
    sub.add_index(DeferredIndex::new(
        "BY_KEY",
        vec![IndexPart::attribute("b")],
    ))
    .unwrap();
    let sub_id = ctx.add(MetaObject::Class(sub)).unwrap();

    ctx.resolve_references().unwrap();

    let sub = ctx.node(sub_id).as_class().unwrap();
    let indexes = sub.indexes(&ctx).unwrap();
    assert_eq!(indexes.len(), 1);
    assert_eq!(indexes[0].name(), "BY_KEY");
    let cols: Vec<_> = indexes[0].columns().iter().map(|c| c.column()).collect();
    assert_eq!(cols, ["B"]);
}

#[test]
fn identical_column_set_index_replaced_in_place() {
    let mut ctx = TypeContext::new();

    let mut base = ClassType::new("Base");
    base.add_attribute(simple("a", "A")).unwrap();
    base.add_index(DeferredIndex::new(
        "FIRST",
        vec![IndexPart::attribute("a")],
    ))
    .unwrap();
    ctx.add(MetaObject::Class(base)).unwrap();

    let mut sub = ClassType::new("Sub");
    sub.set_superclass("Base").unwrap();
    // Identical column set under a different name: the re-declared
    // index replaces the inherited one in place.
    sub.add_index(DeferredIndex::new(
        "SECOND",
        vec![IndexPart::attribute("a")],
    ))
    .unwrap();
    let sub_id = ctx.add(MetaObject::Class(sub)).unwrap();

    ctx.resolve_references().unwrap();

    let sub = ctx.node(sub_id).as_class().unwrap();
    let indexes = sub.indexes(&ctx).unwrap();
    assert_eq!(indexes.len(), 1);
    assert_eq!(indexes[0].name(), "SECOND");
}

/// Per-thread buffer handed to the subscriber so a test can assert on
/// what was logged.
#[derive(Clone, Default)]
struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[test]
fn identical_column_set_replacement_is_logged() {
    let capture = LogCapture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(capture.clone())
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .without_time()
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let mut ctx = TypeContext::new();

        let mut base = ClassType::new("Base");
        base.add_attribute(simple("a", "A")).unwrap();
        base.add_index(DeferredIndex::new(
            "FIRST",
            vec![IndexPart::attribute("a")],
        ))
        .unwrap();
        ctx.add(MetaObject::Class(base)).unwrap();

        let mut sub = ClassType::new("Sub");
        sub.set_superclass("Base").unwrap();
        sub.add_index(DeferredIndex::new(
            "SECOND",
            vec![IndexPart::attribute("a")],
        ))
        .unwrap();
        ctx.add(MetaObject::Class(sub)).unwrap();

        ctx.resolve_references().unwrap();
    });

    let log = capture.contents();
    assert!(log.contains("identical column set"), "missing warning: {log}");
    assert!(log.contains("FIRST"), "replaced index not named: {log}");
}

#[test]
fn override_shape_change_rejected() {
    let mut ctx = TypeContext::new();

    let mut base = ClassType::new("Base");
    base.add_attribute(simple("a", "A")).unwrap();
    base.add_attribute(simple("b", "B")).unwrap();
    ctx.add(MetaObject::Class(base)).unwrap();

    let mut sub = ClassType::new("Sub");
    sub.set_superclass("Base").unwrap();
    // Wider cache, and 'b' after it is not overridden.
    sub.override_attribute(
        Attribute::new("a", StorageSpec::new(3)).with_column(DbColumn::new("A", true)),
    )
    .unwrap();
    ctx.add(MetaObject::Class(sub)).unwrap();

    let err = ctx.resolve_references().unwrap_err();
    assert!(matches!(err, MetaError::InvalidOverride { .. }));
}

#[test]
fn override_shape_change_allowed_for_trailing_run() {
    let mut ctx = TypeContext::new();

    let mut base = ClassType::new("Base");
    base.add_attribute(simple("a", "A")).unwrap();
    base.add_attribute(simple("b", "B")).unwrap();
    ctx.add(MetaObject::Class(base)).unwrap();

    let mut sub = ClassType::new("Sub");
    sub.set_superclass("Base").unwrap();
    // 'b' is the last inherited attribute; every attribute from its
    // position to the end is overridden, so the shape may change.
    sub.override_attribute(
        Attribute::new("b", StorageSpec::new(3))
            .with_column(DbColumn::new("B1", true))
            .with_column(DbColumn::new("B2", true)),
    )
    .unwrap();
    let sub_id = ctx.add(MetaObject::Class(sub)).unwrap();

    ctx.resolve_references().unwrap();
    assert!(ctx.node(sub_id).is_frozen());
}

#[test]
fn override_dropping_mandatory_rejected() {
    let mut ctx = TypeContext::new();

    let mut base = ClassType::new("Base");
    base.add_attribute(simple("a", "A").mandatory(true)).unwrap();
    ctx.add(MetaObject::Class(base)).unwrap();

    let mut sub = ClassType::new("Sub");
    sub.set_superclass("Base").unwrap();
    sub.override_attribute(simple("a", "A")).unwrap();
    ctx.add(MetaObject::Class(sub)).unwrap();

    let err = ctx.resolve_references().unwrap_err();
    assert!(matches!(err, MetaError::InvalidOverride { .. }));
}

#[test]
fn override_widening_monomorphic_reference_rejected() {
    let mut ctx = TypeContext::new();
    ctx.add(MetaObject::Class(ClassType::new("Target"))).unwrap();

    let mut base = ClassType::new("Base");
    base.add_attribute(
        Attribute::new("ref", StorageSpec::new(1))
            .with_reference(Reference::new("Target").monomorphic(true))
            .with_column(DbColumn::with_aspect("REF_ID", true, ReferenceAspect::TargetId)),
    )
    .unwrap();
    ctx.add(MetaObject::Class(base)).unwrap();

    let mut sub = ClassType::new("Sub");
    sub.set_superclass("Base").unwrap();
    sub.override_attribute(
        Attribute::new("ref", StorageSpec::new(1))
            .with_reference(Reference::new("Target"))
            .with_column(DbColumn::with_aspect("REF_ID", true, ReferenceAspect::TargetId)),
    )
    .unwrap();
    ctx.add(MetaObject::Class(sub)).unwrap();

    let err = ctx.resolve_references().unwrap_err();
    assert!(matches!(err, MetaError::InvalidOverride { .. }));
}

#[test]
fn override_dropping_default_index_rejected() {
    let mut ctx = TypeContext::new();
    ctx.add(MetaObject::Class(ClassType::new("Target"))).unwrap();

    let mut base = ClassType::new("Base");
    base.add_attribute(
        Attribute::new("ref", StorageSpec::new(1))
            .with_reference(Reference::new("Target").use_default_index(true))
            .with_column(DbColumn::with_aspect("REF_ID", true, ReferenceAspect::TargetId)),
    )
    .unwrap();
    ctx.add(MetaObject::Class(base)).unwrap();

    let mut sub = ClassType::new("Sub");
    sub.set_superclass("Base").unwrap();
    sub.override_attribute(
        Attribute::new("ref", StorageSpec::new(1))
            .with_reference(Reference::new("Target"))
            .with_column(DbColumn::with_aspect("REF_ID", true, ReferenceAspect::TargetId)),
    )
    .unwrap();
    ctx.add(MetaObject::Class(sub)).unwrap();

    let err = ctx.resolve_references().unwrap_err();
    assert!(matches!(err, MetaError::InvalidOverride { .. }));
}

#[test]
fn override_enabling_default_index_allowed() {
    let mut ctx = TypeContext::new();
    ctx.add(MetaObject::Class(ClassType::new("Target"))).unwrap();

    let mut base = ClassType::new("Base");
    base.add_attribute(
        Attribute::new("ref", StorageSpec::new(1))
            .with_reference(Reference::new("Target"))
            .with_column(DbColumn::with_aspect("REF_ID", true, ReferenceAspect::TargetId)),
    )
    .unwrap();
    ctx.add(MetaObject::Class(base)).unwrap();

    let mut sub = ClassType::new("Sub");
    sub.set_superclass("Base").unwrap();
    sub.override_attribute(
        Attribute::new("ref", StorageSpec::new(1))
            .with_reference(Reference::new("Target").use_default_index(true))
            .with_column(DbColumn::with_aspect("REF_ID", true, ReferenceAspect::TargetId)),
    )
    .unwrap();
    let sub_id = ctx.add(MetaObject::Class(sub)).unwrap();

    ctx.resolve_references().unwrap();
    assert!(ctx.node(sub_id).is_frozen());
}

#[test]
fn override_of_missing_attribute_rejected() {
    let mut ctx = TypeContext::new();
    ctx.add(MetaObject::Class(ClassType::new("Base"))).unwrap();

    let mut sub = ClassType::new("Sub");
    sub.set_superclass("Base").unwrap();
    sub.override_attribute(simple("ghost", "GHOST")).unwrap();
    ctx.add(MetaObject::Class(sub)).unwrap();

    let err = ctx.resolve_references().unwrap_err();
    assert!(matches!(err, MetaError::InvalidOverride { .. }));
}

#[test]
fn final_class_cannot_be_subclassed() {
    let mut ctx = TypeContext::new();

    let mut sealed = ClassType::new("Sealed");
    sealed.set_final(true).unwrap();
    ctx.add(MetaObject::Class(sealed)).unwrap();

    let mut sub = ClassType::new("Sub");
    sub.set_superclass("Sealed").unwrap();
    ctx.add(MetaObject::Class(sub)).unwrap();

    let err = ctx.resolve_references().unwrap_err();
    assert!(matches!(err, MetaError::FinalSuperclass { .. }));
}

#[test]
fn copy_rebuilds_in_a_fresh_context() {
    let (mut ctx, party_id, person_id, company_id, employee_id) = build_company_schema();
    ctx.resolve_references().unwrap();

    let mut other = TypeContext::new();
    other.register_primitive("String").unwrap();
    for id in [party_id, person_id, company_id, employee_id] {
        other.add(ctx.node(id).copy(&ctx)).unwrap();
    }
    other.resolve_references().unwrap();

    let employee_id = other.get_type("Employee").unwrap();
    let employee = other.node(employee_id).as_class().unwrap();
    assert!(other.node(employee_id).is_frozen());
    let all: Vec<_> = employee
        .attributes(&other)
        .unwrap()
        .iter()
        .map(|a| a.name().to_string())
        .collect();
    assert_eq!(all, ["name", "age", "employer"]);
    // The copy got its own layout in the new context.
    let employer = employee.attribute(&other, "employer").unwrap();
    assert_eq!(employer.owner(), Some(employee_id));
}

#[test]
fn alternative_membership() {
    let (mut ctx, party_id, person_id, _, employee_id) = build_company_schema();

    let mut alt = AlternativeType::new("PartyOrString");
    alt.add_specialisation("Party").unwrap();
    alt.add_specialisation("String").unwrap();
    let alt_id = ctx.add(MetaObject::Alternative(alt)).unwrap();
    ctx.resolve_references().unwrap();

    let string_id = ctx.get_type("String").unwrap();
    assert!(ctx.is_subtype(person_id, alt_id));
    assert!(ctx.is_subtype(employee_id, alt_id));
    assert!(ctx.is_subtype(string_id, alt_id));
    assert!(!ctx.is_subtype(TypeId::ANY, alt_id));

    // Flattened at freeze.
    let MetaObject::Alternative(alt) = ctx.node(alt_id) else {
        panic!("not an alternative");
    };
    let flattened = alt.flattened().unwrap();
    assert_eq!(flattened.len(), 2);
    assert!(flattened.contains(&party_id));
    assert!(flattened.contains(&string_id));
}

#[test]
fn structural_subtyping() {
    let (mut ctx, _, _, _, _) = build_company_schema();

    let person_list = ctx
        .get_collection(CollectionKind::List, "Person")
        .unwrap();
    let party_list = ctx.get_collection(CollectionKind::List, "Party").unwrap();
    let party_set = ctx.get_collection(CollectionKind::Set, "Party").unwrap();
    let party_any = ctx
        .get_collection(CollectionKind::Collection, "Party")
        .unwrap();

    let pair = ctx
        .add(MetaObject::Tuple(TupleType::new(
            "PersonAndName",
            vec![TypeRef::named("Person"), TypeRef::named("String")],
        )))
        .unwrap();
    let wider_pair = ctx
        .add(MetaObject::Tuple(TupleType::new(
            "PartyAndName",
            vec![TypeRef::named("Party"), TypeRef::named("String")],
        )))
        .unwrap();

    let getter = ctx
        .add(MetaObject::Function(FunctionType::new(
            "PersonGetter",
            TypeRef::named("Person"),
            vec![TypeRef::named("String")],
            false,
        )))
        .unwrap();
    let wider_getter = ctx
        .add(MetaObject::Function(FunctionType::new(
            "PartyGetter",
            TypeRef::named("Party"),
            vec![TypeRef::named("String")],
            false,
        )))
        .unwrap();

    ctx.resolve_references().unwrap();

    // Element covariance; LIST and SET stay apart, COLLECTION matches
    // either raw kind.
    assert!(ctx.is_subtype(person_list, party_list));
    assert!(!ctx.is_subtype(party_list, person_list));
    assert!(!ctx.is_subtype(party_list, party_set));
    assert!(ctx.is_subtype(party_list, party_any));
    assert!(ctx.is_subtype(party_set, party_any));

    assert!(ctx.is_subtype(pair, wider_pair));
    assert!(!ctx.is_subtype(wider_pair, pair));

    assert!(ctx.is_subtype(getter, wider_getter));
    assert!(!ctx.is_subtype(wider_getter, getter));
}

#[test]
fn collection_attribute_synthesizes_type() {
    let (mut ctx, _, _, _, _) = build_company_schema();

    let mut team = ClassType::new("Team");
    team.add_attribute(
        Attribute::new("members", StorageSpec::new(1))
            .with_reference(Reference::new("LIST<Person>")),
    )
    .unwrap();
    ctx.add(MetaObject::Class(team)).unwrap();
    ctx.resolve_references().unwrap();

    // The collection type was synthesized during resolution.
    let list_id = ctx.get_type("LIST<Person>").unwrap();
    assert!(ctx.node(list_id).is_frozen());

    let team = ctx.node_named("Team").unwrap().as_class().unwrap();
    let members = team.attribute(&ctx, "members").unwrap();
    assert_eq!(members.reference().unwrap().target().unwrap(), list_id);
}

#[test]
fn algebra_over_frozen_schema() {
    let (mut ctx, party_id, person_id, company_id, employee_id) = build_company_schema();
    ctx.resolve_references().unwrap();

    let system = TypeSystem::new(Arc::new(ctx), "Party").unwrap();
    assert_eq!(system.root_item(), party_id);
    assert_eq!(system.union(person_id, company_id), party_id);
    assert_eq!(system.union(employee_id, person_id), person_id);
    assert_eq!(
        system.intersection(person_id, company_id),
        TypeId::INVALID
    );
    assert!(system.has_common_instances(employee_id, person_id));
    assert!(!system.has_common_instances(person_id, company_id));

    let concrete = system.concrete_subtypes(party_id);
    assert_eq!(concrete.len(), 3);
    assert!(!concrete.contains(&party_id));
}
