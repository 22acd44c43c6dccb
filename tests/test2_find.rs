#![cfg(feature = "test-utils")]

use serde_json::json;
use sql_model::native_type::Length;
use sql_model::test_utils::{Call, result_set};
use sql_model::{NativeType, Operator, Predicate, RowValues, SqlModelError, WhereClause};
use tokio::runtime::Runtime;

mod common;

#[test]
fn find_renders_binds_and_hydrates() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let (mock, person) = common::person_model(&rt)?;
    mock.push_rows(result_set(
        &["RecordId", "FirstName", "LastName"],
        vec![vec![RowValues::Int(7), "Jon".into(), "Snow".into()]],
    ));

    let clause = WhereClause::from_json(&json!({
        "FirstName": {"value": "Jon"},
        "LastName": {"value": "Watson", "operator": "<>"}
    }))?;
    let found = rt.block_on(person.find(clause, None))?;

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get("RecordId"), Some(&RowValues::Int(7)));
    assert_eq!(found[0].get("LastName"), Some(&RowValues::Text("Snow".into())));

    let calls = mock.calls();
    let Call::Prepare { sql, inputs } = &calls[0] else {
        panic!("expected a prepare, got {calls:?}");
    };
    assert_eq!(
        sql,
        "SELECT TOP 10 * FROM [People] WHERE [FirstName] = @FirstName AND [LastName] <> @LastName"
    );
    let varchar20 = NativeType::VarChar {
        length: Length::Bounded(20),
    };
    assert_eq!(inputs.len(), 2);
    assert_eq!(inputs[0].name, "FirstName");
    assert_eq!(inputs[0].native_type, varchar20);
    assert_eq!(inputs[1].name, "LastName");
    let Call::Execute { values, .. } = &calls[1] else {
        panic!("expected an execute, got {calls:?}");
    };
    assert_eq!(values, &vec![RowValues::from("Jon"), RowValues::from("Watson")]);
    assert!(matches!(calls[2], Call::Unprepare(_)));
    Ok(())
}

#[test]
fn find_without_predicates_uses_a_plain_query() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let (mock, person) = common::person_model(&rt)?;

    let found = rt.block_on(person.find(WhereClause::new(), Some(25)))?;
    assert!(found.is_empty());
    assert_eq!(
        mock.calls(),
        vec![Call::SimpleQuery("SELECT TOP 25 * FROM [People]".into())]
    );
    Ok(())
}

#[test]
fn find_all_applies_the_default_limit() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let (mock, person) = common::person_model(&rt)?;

    rt.block_on(person.find_all(WhereClause::new().with(
        "RecordId",
        Predicate::new(3).operator(Operator::Gt),
    )))?;
    assert_eq!(
        mock.statements(),
        vec!["SELECT TOP 10 * FROM [People] WHERE [RecordId] > @RecordId".to_string()]
    );
    Ok(())
}

#[test]
fn unknown_predicate_column_fails_before_any_query() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let (mock, person) = common::person_model(&rt)?;

    let err = rt
        .block_on(person.find(WhereClause::new().where_eq("Nickname", "Jonny"), None))
        .unwrap_err();
    assert!(matches!(err, SqlModelError::Validation(_)));
    assert_eq!(
        err.to_string(),
        "Validation error: Field Nickname is not a valid field in the table schema."
    );
    assert!(mock.calls().is_empty());
    Ok(())
}

#[test]
fn hydration_projects_onto_the_schema() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let (mock, person) = common::person_model(&rt)?;
    // an extra column and a missing one
    mock.push_rows(result_set(
        &["RecordId", "FirstName", "Computed"],
        vec![vec![RowValues::Int(1), "Jon".into(), RowValues::Float(1.5)]],
    ));

    let found = rt.block_on(person.find(WhereClause::new(), None))?;
    let record = &found[0];
    assert_eq!(record.get("FirstName"), Some(&RowValues::Text("Jon".into())));
    assert_eq!(record.get("LastName"), Some(&RowValues::Null));
    assert_eq!(record.get("Computed"), None);
    assert_eq!(
        record.to_json(),
        json!({"RecordId": 1, "FirstName": "Jon", "LastName": null})
    );
    Ok(())
}

#[test]
fn driver_errors_pass_through_verbatim() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let (mock, person) = common::person_model(&rt)?;
    mock.push_error("Invalid object name 'People'.");

    let err = rt
        .block_on(person.find(WhereClause::new().where_eq("FirstName", "Jon"), None))
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid object name 'People'.");
    // the statement was still released
    assert!(matches!(mock.calls().last(), Some(Call::Unprepare(_))));
    Ok(())
}
