use serde::{Deserialize, Serialize};

/// Raw rows fetched for one query execution.
///
/// Row 0 is the column header as returned by Athena; the remaining rows are
/// values. Every value is text, `None` represents SQL NULL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    /// Execution id the rows came from.
    pub job_id: String,
    /// Header row followed by data rows, in fetch order.
    pub rows: Vec<Vec<Option<String>>>,
}

impl ResultSet {
    pub fn new(job_id: impl Into<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self {
            job_id: job_id.into(),
            rows,
        }
    }

    /// Build from plain strings (no NULLs); handy for fixtures.
    pub fn from_strings<R, S>(job_id: impl Into<String>, rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(|v| Some(v.into())).collect())
            .collect();
        Self::new(job_id, rows)
    }

    pub fn header(&self) -> Option<&[Option<String>]> {
        self.rows.first().map(Vec::as_slice)
    }

    pub fn data_rows(&self) -> &[Vec<Option<String>>] {
        self.rows.get(1..).unwrap_or(&[])
    }

    /// Number of data rows (header excluded).
    pub fn row_count(&self) -> usize {
        self.data_rows().len()
    }

    /// `true` when there are no data rows.
    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_and_data_split() {
        let rs = ResultSet::from_strings("q-1", [vec!["id", "name"], vec!["1", "a"], vec!["2", "b"]]);
        assert_eq!(
            rs.header(),
            Some(&[Some("id".to_string()), Some("name".to_string())][..])
        );
        assert_eq!(rs.row_count(), 2);
        assert!(!rs.is_empty());
    }

    #[test]
    fn header_only_and_no_rows() {
        let header_only = ResultSet::from_strings("q-2", [vec!["id"]]);
        assert!(header_only.is_empty());
        assert!(header_only.header().is_some());

        let nothing = ResultSet::new("q-3", vec![]);
        assert!(nothing.is_empty());
        assert!(nothing.header().is_none());
        assert!(nothing.data_rows().is_empty());
    }
}
