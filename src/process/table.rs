/// One fetched item: column/value pairs in the order the payload listed them.
pub type Record = Vec<(String, String)>;

/// An in-memory table of string cells.
///
/// Every row carries exactly `headers.len()` cells; the mutating helpers keep
/// that true.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// A zero-row table with the given header.
    pub fn empty(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Assemble records into a table.
    ///
    /// Columns are `declared` first, then any other column in first-seen order.
    /// Records that lack a column get an empty cell.
    pub fn from_records(records: &[Record], declared: &[String]) -> Self {
        let mut headers: Vec<String> = Vec::with_capacity(declared.len());
        for name in declared {
            if !headers.contains(name) {
                headers.push(name.clone());
            }
        }
        for record in records {
            for (name, _) in record {
                if !headers.contains(name) {
                    headers.push(name.clone());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                headers
                    .iter()
                    .map(|h| {
                        record
                            .iter()
                            .find(|(name, _)| name == h)
                            .map(|(_, v)| v.clone())
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect();

        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }

    /// Remove the named columns. Names not in the table are ignored.
    pub fn drop_columns<S: AsRef<str>>(&mut self, names: &[S]) {
        let keep: Vec<bool> = self
            .headers
            .iter()
            .map(|h| !names.iter().any(|n| n.as_ref() == h))
            .collect();
        self.retain_columns(&keep);
    }

    /// Remove the columns at the given positions. Out-of-range positions are ignored.
    pub fn drop_indices(&mut self, indices: &[usize]) {
        let keep: Vec<bool> = (0..self.headers.len())
            .map(|i| !indices.contains(&i))
            .collect();
        self.retain_columns(&keep);
    }

    fn retain_columns(&mut self, keep: &[bool]) {
        if keep.iter().all(|k| *k) {
            return;
        }
        self.headers = retain_by_mask(std::mem::take(&mut self.headers), keep);
        for row in &mut self.rows {
            *row = retain_by_mask(std::mem::take(row), keep);
        }
    }

    /// Append a column holding the same value on every row.
    pub fn add_constant_column(&mut self, name: &str, value: &str) {
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            row.push(value.to_string());
        }
    }

    /// Move `leading` columns to the front, in that order; the rest keep their order.
    /// Names not in the table are ignored.
    pub fn reorder<S: AsRef<str>>(&mut self, leading: &[S]) {
        let mut order: Vec<usize> = Vec::with_capacity(self.headers.len());
        for idx in leading.iter().filter_map(|n| self.column_index(n.as_ref())) {
            if !order.contains(&idx) {
                order.push(idx);
            }
        }
        for i in 0..self.headers.len() {
            if !order.contains(&i) {
                order.push(i);
            }
        }
        self.headers = order.iter().map(|&i| self.headers[i].clone()).collect();
        for row in &mut self.rows {
            *row = order.iter().map(|&i| std::mem::take(&mut row[i])).collect();
        }
    }
}

fn retain_by_mask(values: Vec<String>, keep: &[bool]) -> Vec<String> {
    values
        .into_iter()
        .zip(keep)
        .filter_map(|(v, k)| k.then_some(v))
        .collect()
}
