use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::memory::Dataset;

/// Bytes written per table file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatasetFiles {
    pub tables: Vec<(String, u64)>,
}

impl DatasetFiles {
    pub fn bytes_written(&self) -> u64 {
        self.tables.iter().map(|(_, bytes)| bytes).sum()
    }
}

#[derive(Serialize)]
struct RoleRow {
    user_id: i64,
    role: schoolseed_core::Role,
}

/// Write every table of `dataset` as `<table>.csv` inside `dir`.
pub fn write_dataset(dir: &Path, dataset: &Dataset) -> Result<DatasetFiles, csv::Error> {
    let roles: Vec<RoleRow> = dataset
        .users
        .iter()
        .map(|user| RoleRow {
            user_id: user.id,
            role: user.role,
        })
        .collect();

    let mut files = DatasetFiles::default();
    let mut write = |table: &str, bytes: u64| files.tables.push((table.to_string(), bytes));
    write("users", write_table_csv(&dir.join("users.csv"), &dataset.users)?);
    write("roles", write_table_csv(&dir.join("roles.csv"), &roles)?);
    write(
        "personal_data",
        write_table_csv(&dir.join("personal_data.csv"), &dataset.personal_data)?,
    );
    write("courses", write_table_csv(&dir.join("courses.csv"), &dataset.courses)?);
    write("families", write_table_csv(&dir.join("families.csv"), &dataset.families)?);
    write("subjects", write_table_csv(&dir.join("subjects.csv"), &dataset.subjects)?);
    write(
        "timetables",
        write_table_csv(&dir.join("timetables.csv"), &dataset.timetables)?,
    );
    write(
        "assessments",
        write_table_csv(&dir.join("assessments.csv"), &dataset.assessments)?,
    );
    write("grades", write_table_csv(&dir.join("grades.csv"), &dataset.grades)?);
    write("messages", write_table_csv(&dir.join("messages.csv"), &dataset.messages)?);
    write(
        "message_courses",
        write_table_csv(&dir.join("message_courses.csv"), &dataset.message_courses)?,
    );
    write(
        "subject_messages",
        write_table_csv(&dir.join("subject_messages.csv"), &dataset.subject_messages)?,
    );
    Ok(files)
}

/// Write rows as CSV with a header taken from the row's field names.
///
/// Empty tables still get a file, with no header.
pub fn write_table_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<u64, csv::Error> {
    let writer = BufWriter::new(File::create(path).map_err(csv::Error::from)?);
    let counting = CountingWriter::new(writer);
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(counting);

    for row in rows {
        writer.serialize(row)?;
    }

    writer.flush()?;
    let counting = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(counting.bytes_written())
}

struct CountingWriter<W: Write> {
    inner: W,
    bytes: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, bytes: 0 }
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let size = self.inner.write(buf)?;
        self.bytes = self.bytes.saturating_add(size as u64);
        Ok(size)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
