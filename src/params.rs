use serde::Serialize;

use crate::native_type::NativeType;
use crate::types::RowValues;

/// A named, typed statement input: the unit handed to the execution protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParameter {
    pub name: String,
    pub native_type: NativeType,
    pub value: RowValues,
}

impl BoundParameter {
    pub fn new(
        name: impl Into<String>,
        native_type: NativeType,
        value: impl Into<RowValues>,
    ) -> Self {
        Self {
            name: name.into(),
            native_type,
            value: value.into(),
        }
    }
}

/// A declared input of a prepared statement, without its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamDecl {
    pub name: String,
    pub native_type: NativeType,
}

impl ParamDecl {
    /// `@name type`, as it appears in a parameter definition list.
    #[must_use]
    pub fn definition(&self) -> String {
        format!("@{} {}", self.name, self.native_type.declaration())
    }
}

/// Render a full parameter definition list, e.g. `@FirstName varchar(20), @RecordId int`.
#[must_use]
pub fn definition_list(decls: &[ParamDecl]) -> String {
    decls
        .iter()
        .map(ParamDecl::definition)
        .collect::<Vec<_>>()
        .join(", ")
}
