#![cfg(feature = "test-utils")]

use sql_model::executor::{PreparedStatement, StatementState};
use sql_model::params::BoundParameter;
use sql_model::test_utils::{Call, MockConnection, result_set};
use sql_model::{
    NativeType, Predicate, QueryExecutor, QueryOutcome, RowValues, Session, SqlModelError,
    WhereClause,
};
use tokio::runtime::Runtime;

mod common;

fn unprepare_count(mock: &MockConnection) -> usize {
    mock.calls()
        .iter()
        .filter(|call| matches!(call, Call::Unprepare(_)))
        .count()
}

#[test]
fn failed_execute_still_unprepares_once() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let mock = MockConnection::new();
    mock.push_error("Conversion failed when converting the varchar value 'x' to data type int.");
    let executor = QueryExecutor::new(mock.clone());

    let err = rt
        .block_on(executor.execute(
            "SELECT * FROM [People] WHERE [RecordId] = @RecordId",
            &[BoundParameter::new("RecordId", NativeType::Int, "x")],
        ))
        .unwrap_err();
    assert!(err.to_string().starts_with("Conversion failed"));
    assert_eq!(unprepare_count(&mock), 1);
    assert!(matches!(mock.calls().last(), Some(Call::Unprepare(_))));
    Ok(())
}

#[test]
fn cleanup_failures_surface_unless_execute_failed() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let mock = MockConnection::new();
    let executor = QueryExecutor::new(mock.clone());
    let params = [BoundParameter::new("RecordId", NativeType::Int, 1)];
    let sql = "DELETE FROM [People] WHERE [RecordId] = @RecordId";

    mock.push_affected(1).fail_next_unprepare("Could not find prepared statement with handle 1.");
    let err = rt.block_on(executor.execute(sql, &params)).unwrap_err();
    assert_eq!(err.to_string(), "Could not find prepared statement with handle 1.");

    mock.push_error("deadlock victim")
        .fail_next_unprepare("Could not find prepared statement with handle 2.");
    let err = rt.block_on(executor.execute(sql, &params)).unwrap_err();
    assert_eq!(err.to_string(), "deadlock victim");
    assert_eq!(unprepare_count(&mock), 2);
    Ok(())
}

#[test]
fn concurrent_operations_never_interleave() -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()?;
    let (mock, person) = common::person_model(&rt)?;

    rt.block_on(async {
        let mut tasks = Vec::new();
        for i in 0..16 {
            let person = person.clone();
            tasks.push(tokio::spawn(async move {
                person
                    .find(WhereClause::new().where_eq("RecordId", i), None)
                    .await
            }));
        }
        for task in tasks {
            task.await??;
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    let calls = mock.calls();
    assert_eq!(calls.len(), 48);
    for step in calls.chunks(3) {
        let (Call::Prepare { .. }, Call::Execute { handle, .. }, Call::Unprepare(released)) =
            (&step[0], &step[1], &step[2])
        else {
            panic!("protocol steps interleaved: {step:?}");
        };
        assert_eq!(handle, released);
    }
    Ok(())
}

#[test]
fn prepared_statement_walks_its_states() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let mut mock = MockConnection::new();
    let probe = mock.clone();

    rt.block_on(async {
        let mut statement = PreparedStatement::new("SELECT @A + @B AS [Total]");
        statement.input("A", NativeType::Int)?.input("B", NativeType::Int)?;
        assert!(statement.input("A", NativeType::Int).is_err());
        assert_eq!(statement.state(), StatementState::Unprepared);

        statement.prepare(&mut mock).await?;
        let StatementState::Prepared(handle) = statement.state() else {
            panic!("not prepared");
        };
        assert!(statement.input("C", NativeType::Int).is_err());

        // a missing value is caught without a round trip
        let one = RowValues::Int(1);
        let err = statement.execute(&mut mock, &[("A", &one)]).await.unwrap_err();
        assert!(matches!(err, SqlModelError::Validation(_)));
        assert_eq!(probe.calls().len(), 1);

        let two = RowValues::Int(2);
        statement.execute(&mut mock, &[("B", &two), ("A", &one)]).await?;
        assert_eq!(statement.state(), StatementState::Prepared(handle));
        statement.unprepare(&mut mock).await?;
        assert_eq!(statement.state(), StatementState::Unprepared);
        Ok::<(), SqlModelError>(())
    })?;

    let calls = probe.calls();
    assert_eq!(
        calls[1],
        Call::Execute {
            handle: sql_model::executor::StatementHandle(1),
            values: vec![RowValues::Int(1), RowValues::Int(2)],
        }
    );
    assert_eq!(calls.len(), 3);
    Ok(())
}

#[test]
fn run_query_binds_typed_predicates() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let mock = MockConnection::new();
    let session = Session::new(mock.clone());

    mock.push_rows(result_set(&["Total"], vec![vec![RowValues::Int(3)]]));
    let clause = WhereClause::new().with("MinAge", Predicate::new(30).typed(NativeType::Int));
    let outcome = rt.block_on(session.run_query(
        "SELECT COUNT(*) AS [Total] FROM [People] WHERE [Age] >= @MinAge",
        Some(&clause),
    ))?;
    let rows = outcome.into_rows();
    assert_eq!(rows.results[0].get("Total"), Some(&RowValues::Int(3)));

    let calls = mock.calls();
    let Call::Prepare { inputs, .. } = &calls[0] else {
        panic!("expected a prepare, got {calls:?}");
    };
    assert_eq!(inputs[0].name, "MinAge");
    assert_eq!(inputs[0].native_type, NativeType::Int);

    // without a type there is nothing to declare the parameter as
    mock.clear_calls();
    let untyped = WhereClause::new().where_eq("MinAge", 30);
    let err = rt
        .block_on(session.run_query("SELECT 1 WHERE @MinAge > 0", Some(&untyped)))
        .unwrap_err();
    assert!(matches!(err, SqlModelError::Validation(_)));
    assert!(mock.calls().is_empty());

    mock.push_affected(4);
    let outcome = rt.block_on(session.run_query("UPDATE [People] SET [Active] = 1", None))?;
    assert!(matches!(outcome, QueryOutcome::RowsAffected(4)));
    assert_eq!(
        mock.calls(),
        vec![Call::SimpleQuery("UPDATE [People] SET [Active] = 1".into())]
    );
    Ok(())
}

#[test]
fn executor_hands_the_connection_back() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockConnection::new();
    let executor = QueryExecutor::new(mock);
    let clone = executor.clone();
    assert!(clone.into_inner().is_none());
    let mock = executor.into_inner().ok_or("connection still shared")?;
    assert!(mock.calls().is_empty());
    Ok(())
}
