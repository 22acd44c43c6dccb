#![allow(dead_code)]

use sql_model::test_utils::{CatalogRow, MockConnection, catalog_set};
use sql_model::{Model, Session};
use tokio::runtime::Runtime;

pub fn people_catalog() -> Vec<CatalogRow> {
    vec![
        CatalogRow::new("People", "RecordId", "int").primary_key(),
        CatalogRow::new("People", "FirstName", "varchar").length(20),
        CatalogRow::new("People", "LastName", "varchar").length(20),
    ]
}

/// A model over a fresh mock with `People` discovered as `Person`. The discovery calls
/// are cleared from the mock's log.
pub fn person_model(
    rt: &Runtime,
) -> Result<(MockConnection, Model<MockConnection>), Box<dyn std::error::Error>> {
    let mock = MockConnection::new();
    mock.push_rows(catalog_set(&people_catalog()));
    let session = Session::new(mock.clone());
    let mut models = rt.block_on(session.discover_model("People", "Person"))?;
    let person = models.remove("Person").ok_or("Person not discovered")?;
    mock.clear_calls();
    Ok((mock, person))
}
