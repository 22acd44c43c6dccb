#![cfg(feature = "test-utils")]

use sql_model::test_utils::{Call, CatalogRow, MockConnection, catalog_set, result_set};
use sql_model::{RowValues, Session, SqlModelError};
use tokio::runtime::Runtime;

mod common;

#[test]
fn save_inserts_new_records_and_stores_the_identity() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let (mock, person) = common::person_model(&rt)?;
    // SCOPE_IDENTITY() is numeric and may come back as a float
    mock.push_rows(result_set(&["RecordId"], vec![vec![RowValues::Float(42.0)]]));

    let mut record = person.new_record();
    assert!(record.is_new());
    record.set("FirstName", "Jon")?.set("LastName", "Watson")?;
    rt.block_on(person.save(&mut record))?;

    assert_eq!(record.get("RecordId"), Some(&RowValues::Int(42)));
    assert!(!record.is_new());
    assert_eq!(
        mock.statements(),
        vec![
            "INSERT INTO [People] ([FirstName], [LastName]) VALUES (@FirstName, @LastName);\n\
             SELECT SCOPE_IDENTITY() AS [RecordId];\n"
                .to_string()
        ]
    );
    Ok(())
}

#[test]
fn save_updates_records_with_a_key() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let (mock, person) = common::person_model(&rt)?;
    mock.push_affected(1);

    let mut record = person.new_record();
    record
        .set("RecordId", 42)?
        .set("FirstName", "Jon")?
        .set("LastName", "Watson")?;
    rt.block_on(person.save(&mut record))?;

    let calls = mock.calls();
    let Call::Prepare { sql, .. } = &calls[0] else {
        panic!("expected a prepare, got {calls:?}");
    };
    assert_eq!(
        sql,
        "UPDATE [People] SET [FirstName] = @FirstName, [LastName] = @LastName WHERE [RecordId] = @RecordId"
    );
    let Call::Execute { values, .. } = &calls[1] else {
        panic!("expected an execute, got {calls:?}");
    };
    assert_eq!(
        values,
        &vec![RowValues::from("Jon"), RowValues::from("Watson"), RowValues::Int(42)]
    );
    assert_eq!(record.get("RecordId"), Some(&RowValues::Int(42)));
    Ok(())
}

#[test]
fn delete_clears_the_key_and_is_not_repeatable() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let (mock, person) = common::person_model(&rt)?;
    mock.push_affected(1);

    let mut record = person.new_record();
    record.set("RecordId", 42)?;
    assert!(rt.block_on(person.delete(&mut record))?);
    assert_eq!(record.get("RecordId"), Some(&RowValues::Null));
    assert_eq!(
        mock.statements(),
        vec!["DELETE FROM [People] WHERE [RecordId] = @RecordId".to_string()]
    );

    mock.clear_calls();
    let err = rt.block_on(person.delete(&mut record)).unwrap_err();
    assert!(matches!(err, SqlModelError::MissingPrimaryKey { .. }));
    assert_eq!(err.to_string(), "Person has no primary key value. Cannot delete.");
    assert!(mock.calls().is_empty());
    Ok(())
}

#[test]
fn delete_reports_when_no_row_matched() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let (mock, person) = common::person_model(&rt)?;
    mock.push_affected(0);

    let mut record = person.new_record();
    record.set("RecordId", 9)?;
    assert!(!rt.block_on(person.delete(&mut record))?);
    Ok(())
}

#[test]
fn assignment_is_checked_against_the_schema() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let (_mock, person) = common::person_model(&rt)?;

    let mut record = person.new_record();
    assert!(matches!(
        record.set("Nickname", "Jonny"),
        Err(SqlModelError::Validation(_))
    ));
    assert!(record.set("FirstName", "x".repeat(21)).is_err());
    assert!(record.set("RecordId", "forty-two").is_err());
    assert!(record.set("FirstName", "x".repeat(20)).is_ok());
    Ok(())
}

#[test]
fn keyless_and_key_only_tables() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let mock = MockConnection::new();
    mock.push_rows(catalog_set(&[
        CatalogRow::new("AuditLog", "Message", "nvarchar").length(100),
        CatalogRow::new("AuditLog", "LoggedAt", "datetime2").precision(0, 3),
    ]));
    mock.push_rows(catalog_set(&[
        CatalogRow::new("Tickets", "TicketId", "bigint").primary_key(),
    ]));
    let session = Session::new(mock.clone());
    let audit = rt
        .block_on(session.discover_model("AuditLog", "Audit"))?
        .remove("Audit")
        .ok_or("Audit not discovered")?;
    let ticket = rt
        .block_on(session.discover_model("Tickets", "Ticket"))?
        .remove("Ticket")
        .ok_or("Ticket not discovered")?;
    mock.clear_calls();

    // without a key every save inserts and there is no identity to read back
    let mut entry = audit.new_record();
    entry.set("Message", "started")?;
    rt.block_on(audit.save(&mut entry))?;
    assert!(entry.is_new());
    assert_eq!(
        mock.statements(),
        vec![
            "INSERT INTO [AuditLog] ([Message], [LoggedAt]) VALUES (@Message, @LoggedAt);\n"
                .to_string()
        ]
    );
    assert!(matches!(
        rt.block_on(audit.delete(&mut entry)),
        Err(SqlModelError::MissingPrimaryKey { .. })
    ));

    mock.clear_calls();
    mock.push_rows(result_set(&["TicketId"], vec![vec![RowValues::Int(5)]]));
    let mut next = ticket.new_record();
    rt.block_on(ticket.save(&mut next))?;
    assert_eq!(next.get("TicketId"), Some(&RowValues::Int(5)));
    assert_eq!(
        mock.calls(),
        vec![Call::SimpleQuery(
            "INSERT INTO [Tickets] DEFAULT VALUES;\nSELECT SCOPE_IDENTITY() AS [TicketId];\n"
                .into()
        )]
    );
    Ok(())
}

#[test]
fn records_stay_with_their_model() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let (_mock, person) = common::person_model(&rt)?;
    let (_other_mock, other) = {
        let mock = MockConnection::new();
        mock.push_rows(catalog_set(&[CatalogRow::new("Pets", "PetId", "int").primary_key()]));
        let session = Session::new(mock.clone());
        let pet = rt
            .block_on(session.discover_model("Pets", "Pet"))?
            .remove("Pet")
            .ok_or("Pet not discovered")?;
        (mock, pet)
    };

    let mut record = person.new_record();
    let err = rt.block_on(other.save(&mut record)).unwrap_err();
    assert!(matches!(err, SqlModelError::Validation(_)));
    Ok(())
}
