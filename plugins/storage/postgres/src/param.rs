use std::error::Error;

use bytes::{BufMut, BytesMut};
use postgres_types::{to_sql_checked, Format, IsNull, ToSql, Type};

use kobo_api::{BackendError, SqlValue};

/// Binds a [`SqlValue`] in text format.
///
/// The server runs its own input parser for the column's declared type, so
/// `"5"` lands in a `bigint`, `"2024-01-01T08:00:00"` in a `timestamp` and
/// `"1.5,2.5"` in a `point`. A value the column cannot parse fails the
/// statement, not the connection.
#[derive(Debug)]
pub struct PgParam<'a>(pub &'a SqlValue);

impl ToSql for PgParam<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        if let SqlValue::Document(_) = self.0 {
            if *ty != Type::JSONB && *ty != Type::JSON {
                return Err(Box::new(BackendError::query(format!(
                    "column is of type {ty} but expression is of type jsonb"
                ))));
            }
        }
        match self.0.to_text()? {
            None => Ok(IsNull::Yes),
            Some(text) => {
                out.put_slice(text.as_bytes());
                Ok(IsNull::No)
            }
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn encode_format(&self, _ty: &Type) -> Format {
        Format::Text
    }

    to_sql_checked!();
}
