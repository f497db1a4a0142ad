#![forbid(unsafe_code)]

use rusqlite::Row;
use rusqlite::types::Type;

/// Reads a text column through one of the `pm_core` enum parsers.
pub(in crate::store) fn enum_col<T>(
    row: &Row<'_>,
    idx: usize,
    parse: fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let raw = row.get::<_, String>(idx)?;
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown enum value: {raw}").into(),
        )
    })
}

pub(in crate::store) fn opt_enum_col<T>(
    row: &Row<'_>,
    idx: usize,
    parse: fn(&str) -> Option<T>,
) -> rusqlite::Result<Option<T>> {
    match row.get::<_, Option<String>>(idx)? {
        None => Ok(None),
        Some(raw) => parse(&raw).map(Some).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                Type::Text,
                format!("unknown enum value: {raw}").into(),
            )
        }),
    }
}

pub(in crate::store) fn bool_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<bool> {
    Ok(row.get::<_, i64>(idx)? != 0)
}
