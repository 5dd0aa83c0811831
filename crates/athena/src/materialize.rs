//! Turn raw result rows into a [`Table`].

use tracing::debug;

use unload_core::{Column, Table, Value};

use crate::error::AthenaError;
use crate::result::ResultSet;

pub struct TableMaterializer;

impl TableMaterializer {
    /// Row 0 names the columns; data rows fill them by position.
    ///
    /// A header-only result gives a zero-row table. A data row whose length
    /// differs from the header, a NULL header cell, or a result with no
    /// header at all is [`AthenaError::MalformedResult`]. Columns are text
    /// typed; NULL cells stay null.
    pub fn from_result_set(result: &ResultSet) -> Result<Table, AthenaError> {
        let header = result.header().ok_or_else(|| {
            AthenaError::MalformedResult(format!("query {} returned no header row", result.job_id))
        })?;

        let columns = header
            .iter()
            .enumerate()
            .map(|(i, name)| {
                name.as_deref().map(Column::text).ok_or_else(|| {
                    AthenaError::MalformedResult(format!("header column {i} has no name"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut table = Table::new(columns);
        for (i, row) in result.data_rows().iter().enumerate() {
            if row.len() != header.len() {
                return Err(AthenaError::MalformedResult(format!(
                    "data row {} has {} values, header has {} columns",
                    i,
                    row.len(),
                    header.len()
                )));
            }
            let values = row
                .iter()
                .map(|cell| match cell {
                    Some(s) => Value::Text(s.clone()),
                    None => Value::Null,
                })
                .collect();
            table
                .push_row(values)
                .map_err(|e| AthenaError::MalformedResult(e.to_string()))?;
        }

        debug!(
            job_id = %result.job_id,
            columns = table.column_count(),
            rows = table.row_count(),
            "Materialized result set"
        );

        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unload_core::ColumnType;

    #[test]
    fn positional_fill() {
        let rs = ResultSet::new(
            "q",
            vec![
                vec![Some("id".into()), Some("name".into())],
                vec![Some("1".into()), Some("alice".into())],
                vec![Some("2".into()), None],
            ],
        );
        let table = TableMaterializer::from_result_set(&rs).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.columns()[0], Column::new("id", ColumnType::Text));
        assert_eq!(table.get(0, "name"), Some(&Value::Text("alice".into())));
        assert_eq!(table.get(1, "name"), Some(&Value::Null));
    }

    #[test]
    fn header_only_is_empty_table() {
        let rs = ResultSet::from_strings("q", [vec!["existing_column"]]);
        let table = TableMaterializer::from_result_set(&rs).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.column_count(), 1);
    }

    #[test]
    fn short_row_is_malformed() {
        let rs = ResultSet::from_strings("q", [vec!["a", "b"], vec!["1"]]);
        let err = TableMaterializer::from_result_set(&rs).unwrap_err();
        assert!(matches!(err, AthenaError::MalformedResult(_)));
    }

    #[test]
    fn long_row_is_malformed() {
        let rs = ResultSet::from_strings("q", [vec!["a"], vec!["1", "2"]]);
        assert!(matches!(
            TableMaterializer::from_result_set(&rs),
            Err(AthenaError::MalformedResult(_))
        ));
    }

    #[test]
    fn missing_header_is_malformed() {
        let rs = ResultSet::new("q", vec![]);
        assert!(matches!(
            TableMaterializer::from_result_set(&rs),
            Err(AthenaError::MalformedResult(_))
        ));

        let null_header = ResultSet::new("q", vec![vec![None]]);
        assert!(matches!(
            TableMaterializer::from_result_set(&null_header),
            Err(AthenaError::MalformedResult(_))
        ));
    }
}
