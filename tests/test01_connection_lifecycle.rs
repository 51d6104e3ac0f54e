mod common;

use common::{MockProvider, Script};
use sql_exec::prelude::*;
use sql_exec::ProviderComponent;

#[test]
fn open_twice_creates_one_connection() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockProvider::new();
    let mut db = mock.manager();

    db.open()?;
    db.open()?;

    let calls = mock.calls();
    assert_eq!(calls.connections_created, 1);
    assert_eq!(calls.opens, 1);
    assert_eq!(db.connection_state(), Some(ConnectionState::Open));
    Ok(())
}

#[test]
fn close_without_connection_is_noop() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockProvider::new();
    let mut db = mock.manager();
    db.add_parameter(Parameter::input("id", 1));

    db.close()?;

    assert_eq!(mock.calls().closes, 0);
    assert_eq!(db.parameter_count(), 0);
    assert_eq!(db.connection_state(), None);
    Ok(())
}

#[test]
fn reopen_after_close_allocates_new_connection() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockProvider::new();
    let mut db = mock.manager();

    db.open()?;
    db.close()?;
    assert_eq!(db.connection_state(), Some(ConnectionState::Closed));
    db.open()?;

    let calls = mock.calls();
    assert_eq!(calls.connections_created, 2);
    assert_eq!(calls.opens, 2);
    assert_eq!(calls.closes, 1);
    Ok(())
}

#[test]
fn null_connection_is_provider_resolution() {
    let mock = MockProvider::with_script(Script {
        null_connection: true,
        ..Script::default()
    });
    let mut db = mock.manager();

    let err = db.open().unwrap_err();
    assert!(matches!(
        err,
        SqlExecError::ProviderResolution {
            component: ProviderComponent::Connection,
            ..
        }
    ));

    // executors surface the same error, not an enriched one
    let err = db
        .execute_non_query(CommandKind::Text, "DELETE FROM t")
        .unwrap_err();
    assert!(err.is_provider_resolution());
    assert!(err.context().is_none());
}

#[test]
fn failed_open_is_enriched_by_executors() {
    let mock = MockProvider::with_script(Script {
        fail_open: true,
        ..Script::default()
    });
    let mut db = mock.manager();

    let err = db.open().unwrap_err();
    assert!(matches!(err, SqlExecError::Driver(DriverError::Other(_))));

    let err = db.execute_scalar(CommandKind::Text, "SELECT 1").unwrap_err();
    let SqlExecError::Execution { operation, .. } = &err else {
        panic!("expected execution error, got {err:?}");
    };
    assert_eq!(*operation, "scalar");
}

#[test]
fn every_executor_opens_on_demand() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockProvider::new();

    let mut db = mock.manager();
    db.execute_non_query(CommandKind::Text, "UPDATE t SET x = 1")?;
    assert_eq!(db.connection_state(), Some(ConnectionState::Open));

    let mut db = mock.manager();
    db.execute_reader(CommandKind::Text, "SELECT 1")?;
    assert_eq!(db.connection_state(), Some(ConnectionState::Open));

    let mut db = mock.manager();
    db.execute_scalar(CommandKind::Text, "SELECT 1")?;
    assert_eq!(db.connection_state(), Some(ConnectionState::Open));

    let mut db = mock.manager();
    db.execute_data_table(CommandKind::Text, "SELECT 1")?;
    assert_eq!(db.connection_state(), Some(ConnectionState::Open));

    let mut db = mock.manager();
    db.execute_data_set(CommandKind::Text, "SELECT 1")?;
    assert_eq!(db.connection_state(), Some(ConnectionState::Open));

    assert_eq!(mock.calls().opens, 5);
    Ok(())
}

#[test]
fn release_only_teardown_leaves_connection_open() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockProvider::new();
    let mut db = mock.manager();
    db.open()?;
    db.dispose();

    assert_eq!(mock.calls().closes, 0);
    Ok(())
}

#[test]
fn close_connection_teardown_closes_on_drop() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockProvider::new();
    {
        let mut db = mock.manager_with(|b| b.teardown(TeardownPolicy::CloseConnection));
        db.open()?;
    }
    assert_eq!(mock.calls().closes, 1);
    Ok(())
}

#[test]
fn scope_closes_after_success() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockProvider::new();
    let mut db = mock.manager();

    let affected = db.scope(|db| db.execute_non_query(CommandKind::Text, "UPDATE t SET x = 1"))?;

    assert_eq!(affected, 1);
    assert_eq!(db.connection_state(), Some(ConnectionState::Closed));
    assert_eq!(mock.calls().closes, 1);
    Ok(())
}

#[test]
fn scope_rolls_back_on_error() {
    let mock = MockProvider::with_script(Script {
        non_query_results: [Err("constraint violated".to_owned())].into(),
        ..Script::default()
    });
    let mut db = mock.manager();

    let result = db.scope(|db| {
        db.begin_default_transaction()?;
        db.execute_non_query(CommandKind::Text, "INSERT INTO t VALUES (1)")?;
        db.commit_transaction()
    });

    assert!(matches!(result, Err(SqlExecError::Execution { .. })));
    assert!(!db.is_in_transaction());
    let calls = mock.calls();
    assert_eq!(calls.rollbacks, 1);
    assert_eq!(calls.commits, 0);
    assert_eq!(calls.closes, 1);
}

#[test]
fn scope_cleans_up_when_closure_panics() {
    let mock = MockProvider::new();
    let mut db = mock.manager();

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _: Result<(), SqlExecError> = db.scope(|db| {
            db.begin_default_transaction()?;
            panic!("boom");
        });
    }));

    assert!(outcome.is_err());
    let calls = mock.calls();
    assert_eq!(calls.rollbacks, 1);
    assert_eq!(calls.closes, 1);
}

#[test]
fn unregistered_provider_fails_at_construction() {
    let err = ManagerOptions::builder(ProviderTag::Odbc, "DSN=x")
        .build_with(&ProviderRegistry::empty())
        .unwrap_err();
    assert!(matches!(
        err,
        SqlExecError::ProviderResolution {
            component: ProviderComponent::Factory,
            ..
        }
    ));
}
