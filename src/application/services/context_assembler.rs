use crate::domain::{Document, DomainError, COMPLAINT_TEXT_FIELD};

/// Tabular grounding artifact: one row per document over a fixed column set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Context {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// RFC 4180 rendering with a header row. An empty context renders as "".
    pub fn to_csv(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }
        let mut out = String::new();
        push_record(&mut out, &self.columns);
        for row in &self.rows {
            push_record(&mut out, row);
        }
        out
    }

    /// Parses text produced by [`Context::to_csv`], as echoed back by the
    /// service in a `generate_response` request.
    pub fn from_csv(text: &str) -> Result<Self, DomainError> {
        let mut records = parse_records(text)?.into_iter();
        let Some(columns) = records.next() else {
            return Ok(Self::default());
        };
        let width = columns.len();
        let mut rows = Vec::new();
        for (index, mut record) in records.enumerate() {
            if record.len() > width {
                return Err(DomainError::validation(format!(
                    "context row {} has {} fields but the header has {}",
                    index + 1,
                    record.len(),
                    width
                )));
            }
            record.resize(width, String::new());
            rows.push(record);
        }
        Ok(Self { columns, rows })
    }
}

/// Builds a [`Context`] from retrieved documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextAssembler;

impl ContextAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Columns are the union of metadata fields in first-seen order, followed
    /// by the complaint text. Fields a document lacks render empty.
    pub fn assemble(&self, documents: &[Document]) -> Context {
        if documents.is_empty() {
            return Context::default();
        }

        let mut columns: Vec<String> = Vec::new();
        for document in documents {
            for key in document.metadata.keys() {
                if key != COMPLAINT_TEXT_FIELD && !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = documents
            .iter()
            .map(|document| {
                columns
                    .iter()
                    .map(|column| document.metadata.get(column).cloned().unwrap_or_default())
                    .chain(std::iter::once(document.text.clone()))
                    .collect()
            })
            .collect();

        columns.push(COMPLAINT_TEXT_FIELD.to_string());
        Context { columns, rows }
    }
}

fn push_record(out: &mut String, fields: &[String]) {
    for (index, field) in fields.iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        if field.contains([',', '"', '\n', '\r']) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push('\n');
}

fn parse_records(text: &str) -> Result<Vec<Vec<String>>, DomainError> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                other => field.push(other),
            }
            continue;
        }
        match ch {
            '"' if field.is_empty() => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            other => field.push(other),
        }
    }

    if in_quotes {
        return Err(DomainError::validation("context has an unterminated quoted field"));
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records.retain(|r| !(r.len() == 1 && r[0].trim().is_empty()));
    Ok(records)
}
