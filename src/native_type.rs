//! Mapping from SQL Server catalog type names to the typed parameter descriptors used when
//! binding statement inputs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SqlModelError};
use crate::schema::ColumnDescriptor;
use crate::types::RowValues;

/// Catalog sentinel for `(max)` lengths.
pub const MAX_LENGTH_SENTINEL: i32 = -1;

/// Scale SQL Server assumes for time-like types declared without one.
pub const DEFAULT_TIME_SCALE: u8 = 7;

/// Declared length of a character or binary type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Length {
    Bounded(u32),
    Max,
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Length::Bounded(n) => write!(f, "{n}"),
            Length::Max => f.write_str("max"),
        }
    }
}

/// A SQL Server parameter type, carrying whatever width, precision, or scale binding needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NativeType {
    Char { length: u32 },
    NChar { length: u32 },
    VarChar { length: Length },
    NVarChar { length: Length },
    Binary { length: u32 },
    VarBinary { length: Length },
    BigInt,
    Int,
    SmallInt,
    TinyInt,
    Bit,
    Real,
    Float,
    Money,
    SmallMoney,
    Decimal { precision: u8, scale: u8 },
    Numeric { precision: u8, scale: u8 },
    Date,
    DateTime,
    SmallDateTime,
    DateTime2 { scale: u8 },
    Time { scale: u8 },
    DateTimeOffset { scale: u8 },
    UniqueIdentifier,
    Text,
    NText,
    Image,
    Xml,
    Udt,
    Geography,
    Geometry,
}

/// Map one catalog column descriptor to its native parameter type.
///
/// # Errors
///
/// Returns [`SqlModelError::UnrecognizedType`] carrying the raw type name when the name is
/// not one this crate knows how to bind, and [`SqlModelError::Validation`] when a width,
/// precision, or scale is out of range for the type.
pub fn map_type(descriptor: &ColumnDescriptor) -> Result<NativeType> {
    let length = || -> Result<Length> {
        match descriptor.max_length {
            Some(MAX_LENGTH_SENTINEL) => Ok(Length::Max),
            other => Ok(Length::Bounded(fixed_length(descriptor, other)?)),
        }
    };
    let precision = || narrow(descriptor, "precision", descriptor.precision.unwrap_or(18));
    let scale = || narrow(descriptor, "scale", descriptor.scale.unwrap_or(0));
    let time_scale = || {
        narrow(
            descriptor,
            "scale",
            descriptor.scale.unwrap_or(i32::from(DEFAULT_TIME_SCALE)),
        )
    };

    let native = match descriptor.data_type.to_ascii_lowercase().as_str() {
        "char" => NativeType::Char {
            length: fixed_length(descriptor, descriptor.max_length)?,
        },
        "nchar" => NativeType::NChar {
            length: fixed_length(descriptor, descriptor.max_length)?,
        },
        "varchar" => NativeType::VarChar { length: length()? },
        "nvarchar" => NativeType::NVarChar { length: length()? },
        "binary" => NativeType::Binary {
            length: fixed_length(descriptor, descriptor.max_length)?,
        },
        "varbinary" => NativeType::VarBinary { length: length()? },
        "bigint" => NativeType::BigInt,
        "int" => NativeType::Int,
        "smallint" => NativeType::SmallInt,
        "tinyint" => NativeType::TinyInt,
        "bit" => NativeType::Bit,
        "real" => NativeType::Real,
        "float" => NativeType::Float,
        "money" => NativeType::Money,
        "smallmoney" => NativeType::SmallMoney,
        "decimal" => NativeType::Decimal {
            precision: precision()?,
            scale: scale()?,
        },
        "numeric" => NativeType::Numeric {
            precision: precision()?,
            scale: scale()?,
        },
        "date" => NativeType::Date,
        "datetime" => NativeType::DateTime,
        "smalldatetime" => NativeType::SmallDateTime,
        "datetime2" => NativeType::DateTime2 {
            scale: time_scale()?,
        },
        "time" => NativeType::Time {
            scale: time_scale()?,
        },
        "datetimeoffset" => NativeType::DateTimeOffset {
            scale: time_scale()?,
        },
        "uniqueidentifier" => NativeType::UniqueIdentifier,
        "text" => NativeType::Text,
        "ntext" => NativeType::NText,
        "image" => NativeType::Image,
        "xml" => NativeType::Xml,
        "udt" => NativeType::Udt,
        "geography" => NativeType::Geography,
        "geometry" => NativeType::Geometry,
        _ => return Err(SqlModelError::UnrecognizedType(descriptor.data_type.clone())),
    };
    Ok(native)
}

fn fixed_length(descriptor: &ColumnDescriptor, raw: Option<i32>) -> Result<u32> {
    // char and binary default to a single unit, as in DDL
    let raw = raw.unwrap_or(1);
    u32::try_from(raw).map_err(|_| {
        SqlModelError::validation(format!(
            "column {} has invalid length {raw} for type {}",
            descriptor.name, descriptor.data_type
        ))
    })
}

fn narrow(descriptor: &ColumnDescriptor, what: &str, raw: i32) -> Result<u8> {
    u8::try_from(raw).map_err(|_| {
        SqlModelError::validation(format!(
            "column {} has invalid {what} {raw} for type {}",
            descriptor.name, descriptor.data_type
        ))
    })
}

impl NativeType {
    /// The declaration used in a parameter list, e.g. `varchar(20)` or `decimal(10,2)`.
    #[must_use]
    pub fn declaration(&self) -> String {
        match self {
            NativeType::Char { length } => format!("char({length})"),
            NativeType::NChar { length } => format!("nchar({length})"),
            NativeType::VarChar { length } => format!("varchar({length})"),
            NativeType::NVarChar { length } => format!("nvarchar({length})"),
            NativeType::Binary { length } => format!("binary({length})"),
            NativeType::VarBinary { length } => format!("varbinary({length})"),
            NativeType::Decimal { precision, scale } => format!("decimal({precision},{scale})"),
            NativeType::Numeric { precision, scale } => format!("numeric({precision},{scale})"),
            NativeType::DateTime2 { scale } => format!("datetime2({scale})"),
            NativeType::Time { scale } => format!("time({scale})"),
            NativeType::DateTimeOffset { scale } => format!("datetimeoffset({scale})"),
            // user-defined types travel as their serialized bytes
            NativeType::Udt => "varbinary(max)".to_string(),
            other => other.name().to_string(),
        }
    }

    /// The bare SQL Server type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            NativeType::Char { .. } => "char",
            NativeType::NChar { .. } => "nchar",
            NativeType::VarChar { .. } => "varchar",
            NativeType::NVarChar { .. } => "nvarchar",
            NativeType::Binary { .. } => "binary",
            NativeType::VarBinary { .. } => "varbinary",
            NativeType::BigInt => "bigint",
            NativeType::Int => "int",
            NativeType::SmallInt => "smallint",
            NativeType::TinyInt => "tinyint",
            NativeType::Bit => "bit",
            NativeType::Real => "real",
            NativeType::Float => "float",
            NativeType::Money => "money",
            NativeType::SmallMoney => "smallmoney",
            NativeType::Decimal { .. } => "decimal",
            NativeType::Numeric { .. } => "numeric",
            NativeType::Date => "date",
            NativeType::DateTime => "datetime",
            NativeType::SmallDateTime => "smalldatetime",
            NativeType::DateTime2 { .. } => "datetime2",
            NativeType::Time { .. } => "time",
            NativeType::DateTimeOffset { .. } => "datetimeoffset",
            NativeType::UniqueIdentifier => "uniqueidentifier",
            NativeType::Text => "text",
            NativeType::NText => "ntext",
            NativeType::Image => "image",
            NativeType::Xml => "xml",
            NativeType::Udt => "udt",
            NativeType::Geography => "geography",
            NativeType::Geometry => "geometry",
        }
    }

    #[must_use]
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            NativeType::BigInt | NativeType::Int | NativeType::SmallInt | NativeType::TinyInt
        )
    }

    /// Whether `value` can be bound to a parameter of this type.
    ///
    /// `Null` is accepted everywhere. Integer values are range-checked against the integer
    /// widths, and bounded character values are length-checked in characters.
    #[must_use]
    pub fn accepts(&self, value: &RowValues) -> bool {
        use NativeType as N;
        use RowValues as V;

        match (self, value) {
            (_, V::Null) => true,
            (N::BigInt, V::Int(_)) => true,
            (N::Int, V::Int(i)) => i32::try_from(*i).is_ok(),
            (N::SmallInt, V::Int(i)) => i16::try_from(*i).is_ok(),
            (N::TinyInt, V::Int(i)) => u8::try_from(*i).is_ok(),
            (N::Bit, V::Bool(_)) => true,
            (N::Bit, V::Int(i)) => *i == 0 || *i == 1,
            (
                N::Real
                | N::Float
                | N::Money
                | N::SmallMoney
                | N::Decimal { .. }
                | N::Numeric { .. },
                V::Int(_) | V::Float(_),
            ) => true,
            (N::Decimal { .. } | N::Numeric { .. } | N::Money | N::SmallMoney, V::Text(s)) => {
                s.trim().parse::<f64>().is_ok()
            }
            (N::Char { length } | N::NChar { length }, V::Text(s)) => {
                char_count_fits(s, Length::Bounded(*length))
            }
            (N::VarChar { length } | N::NVarChar { length }, V::Text(s)) => {
                char_count_fits(s, *length)
            }
            (N::VarChar { .. } | N::NVarChar { .. } | N::Text | N::NText | N::Xml, V::JSON(_)) => {
                true
            }
            (N::Text | N::NText | N::Xml | N::UniqueIdentifier, V::Text(_)) => true,
            (
                N::Date
                | N::DateTime
                | N::SmallDateTime
                | N::DateTime2 { .. }
                | N::Time { .. }
                | N::DateTimeOffset { .. },
                V::Timestamp(_) | V::Text(_),
            ) => true,
            (
                N::Binary { .. }
                | N::VarBinary { .. }
                | N::Image
                | N::Udt
                | N::Geography
                | N::Geometry,
                V::Blob(_),
            ) => true,
            _ => false,
        }
    }
}

fn char_count_fits(s: &str, length: Length) -> bool {
    match length {
        Length::Max => true,
        Length::Bounded(n) => s.chars().count() <= n as usize,
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.declaration())
    }
}
