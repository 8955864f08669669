//! Integration tests for edit transactions.

use proptest::prelude::*;
use tracekb_core::{
    builtin, ktbs, Config, CoreError, EditMode, Iri, LockTimeout, Registry, StateParams, Store,
};
use tracekb_storage::{Term, Triple};

fn create_store() -> Store {
    Store::in_memory(
        Config::new(LockTimeout::IMMEDIATE),
        Registry::with_trace_kinds(),
    )
    .unwrap()
}

fn create_base(store: &Store) -> Iri {
    store
        .post(store.root(), ktbs::BASE, Some("base1"), |_| Ok(()))
        .unwrap()
}

#[test]
fn method_requires_exactly_one_parent() {
    let store = create_store();
    let base = create_base(&store);

    let err = store
        .post(&base, ktbs::METHOD, Some("m"), |_| Ok(()))
        .unwrap_err();
    let CoreError::Validation { diagnosis, .. } = &err else {
        panic!("expected a validation error, got {err}");
    };
    assert!(diagnosis.mentions("hasParentMethod"), "{diagnosis}");

    let method = store
        .post(&base, ktbs::METHOD, Some("m"), |tx| {
            tx.add(ktbs::HAS_PARENT_METHOD, Term::iri(builtin::FILTER));
            Ok(())
        })
        .unwrap();
    assert_eq!(store.kind_of(&method).unwrap().rdf_type(), ktbs::METHOD);
}

#[test]
fn failed_validation_leaves_state_unchanged() {
    let store = create_store();
    let base = create_base(&store);
    let method = store
        .post(&base, ktbs::METHOD, Some("m"), |tx| {
            tx.add(ktbs::HAS_PARENT_METHOD, Term::iri(builtin::FILTER));
            Ok(())
        })
        .unwrap();
    let before = store.get_state(&method, StateParams::default()).unwrap();
    let etag = store.etag(&method).unwrap();
    let version = store.version(&method).unwrap();

    let err = store
        .edit(&method, EditMode::Replace, |tx| {
            tx.add(ktbs::HAS_PARENT_METHOD, Term::iri(builtin::SPARQL));
            tx.add(ktbs::HAS_PARAMETER, Term::literal("not a parameter"));
            Ok(())
        })
        .unwrap_err();
    let diagnosis = err.diagnosis().unwrap();
    assert_eq!(diagnosis.messages().len(), 2, "{diagnosis}");

    assert_eq!(store.get_state(&method, StateParams::default()).unwrap(), before);
    assert_eq!(store.etag(&method).unwrap(), etag);
    assert_eq!(store.version(&method).unwrap(), version);
}

#[test]
fn explicit_commit_reports_changes() {
    let store = create_store();
    let base = create_base(&store);
    let method = store
        .post(&base, ktbs::METHOD, Some("m"), |tx| {
            tx.add(ktbs::HAS_PARENT_METHOD, Term::iri(builtin::FILTER));
            Ok(())
        })
        .unwrap();
    let etag = store.etag(&method).unwrap();

    let mut tx = store.begin_edit(&method, EditMode::Replace).unwrap();
    tx.set(ktbs::HAS_PARENT_METHOD, Term::iri(builtin::FUSION));
    tx.add(ktbs::HAS_PARAMETER, Term::literal("k=v"));
    assert!(tx.diagnose().is_valid());
    let (added, removed) = tx.changes();
    assert_eq!((added.len(), removed.len()), (2, 1));

    let report = tx.commit().unwrap();
    assert!(report.changed);
    assert_eq!(report.added, 2);
    assert_eq!(report.removed, 1);
    assert_ne!(report.etag, etag);
    assert_eq!(store.etag(&method).unwrap(), report.etag);
    assert_eq!(store.version(&method).unwrap(), report.version);
}

#[test]
fn edit_rebases_on_concurrent_commit() {
    let store = create_store();
    let base = create_base(&store);
    let label = |v: &str| {
        Triple::new(
            Term::iri(base.as_str()),
            tracekb_core::vocab::RDFS_LABEL,
            Term::literal(v),
        )
    };

    let mut first = store.begin_edit(&base, EditMode::Append).unwrap();
    first.insert(label("one"));

    store
        .edit(&base, EditMode::Append, |tx| {
            tx.insert(label("two"));
            Ok(())
        })
        .unwrap();
    first.commit().unwrap();

    let state = store.get_state(&base, StateParams::default()).unwrap();
    assert!(state.contains(&label("one")));
    assert!(state.contains(&label("two")));
}

#[test]
fn declared_type_cannot_be_removed() {
    let store = create_store();
    let base = create_base(&store);
    let err = store
        .edit(&base, EditMode::Internal, |tx| {
            tx.remove_all(tracekb_core::vocab::RDF_TYPE);
            Ok(())
        })
        .unwrap_err();
    assert!(err.diagnosis().unwrap().mentions("declared type"));
    assert_eq!(store.kind_of(&base).unwrap().rdf_type(), ktbs::BASE);
}

#[derive(Debug, Clone)]
enum Step {
    AddParent(usize),
    RemoveParent(usize),
    AddParameter(u8),
    RemoveParameter(u8),
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0..3usize).prop_map(Step::AddParent),
        (0..3usize).prop_map(Step::RemoveParent),
        any::<u8>().prop_map(|n| Step::AddParameter(n % 4)),
        any::<u8>().prop_map(|n| Step::RemoveParameter(n % 4)),
    ]
}

const PARENTS: [&str; 3] = [builtin::FILTER, builtin::FUSION, builtin::SPARQL];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn cardinality_holds_after_any_edit_sequence(
        batches in prop::collection::vec(prop::collection::vec(step_strategy(), 1..4), 1..12)
    ) {
        let store = create_store();
        let base = create_base(&store);
        let method = store
            .post(&base, ktbs::METHOD, Some("m"), |tx| {
                tx.add(ktbs::HAS_PARENT_METHOD, Term::iri(builtin::FILTER));
                Ok(())
            })
            .unwrap();
        let m = method.as_str();

        for batch in batches {
            let before = store.etag(&method).unwrap();
            let result = store.edit(&method, EditMode::Internal, |tx| {
                for step in &batch {
                    match step {
                        Step::AddParent(i) => {
                            tx.add(ktbs::HAS_PARENT_METHOD, Term::iri(PARENTS[*i]));
                        }
                        Step::RemoveParent(i) => {
                            tx.remove(&Triple::new(
                                Term::iri(m),
                                ktbs::HAS_PARENT_METHOD,
                                Term::iri(PARENTS[*i]),
                            ));
                        }
                        Step::AddParameter(n) => {
                            tx.add(ktbs::HAS_PARAMETER, Term::literal(format!("p{n}={n}")));
                        }
                        Step::RemoveParameter(n) => {
                            tx.remove(&Triple::new(
                                Term::iri(m),
                                ktbs::HAS_PARAMETER,
                                Term::literal(format!("p{n}={n}")),
                            ));
                        }
                    }
                }
                Ok(())
            });

            let state = store.get_state(&method, StateParams::default()).unwrap();
            prop_assert_eq!(state.count_out(m, ktbs::HAS_PARENT_METHOD), 1);
            prop_assert_eq!(state.count_in(m, ktbs::CONTAINS), 1);
            if result.is_err() {
                prop_assert_eq!(store.etag(&method).unwrap(), before);
            }
        }
    }
}
