use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{CoreError, Result};
use crate::model::EtfRecord;
use crate::render::Document;

/// Reads the JSON document store written by [`save_records`]. Every record is
/// validated on the way in.
pub fn load_records(path: &Path) -> Result<Vec<EtfRecord>> {
    let file = File::open(path)?;
    let records: Vec<EtfRecord> = serde_json::from_reader(BufReader::new(file))?;
    tracing::debug!(records = records.len(), path = %path.display(), "loaded records");
    Ok(records)
}

pub fn save_records(path: &Path, records: &[EtfRecord]) -> Result<()> {
    replace_file(path, |writer| {
        serde_json::to_writer_pretty(&mut *writer, records)?;
        writer.write_all(b"\n")?;
        Ok(())
    })
}

/// Writes into a temporary sibling of `target` and renames it over the target
/// once the contents are synced, so readers never see a partial file.
fn replace_file<F>(target: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<()>,
{
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;
    let mut temp = NamedTempFile::new_in(&dir)?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        write(&mut writer)?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    temp.persist(target).map_err(|err| CoreError::Io(err.error))?;
    Ok(())
}

pub struct JsonlWriter<W> {
    writer: W,
}

impl<W: Write> JsonlWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write_document(&mut self, document: &Document) -> Result<()> {
        let mut buf = serde_json::to_vec(document)?;
        buf.push(b'\n');
        self.writer.write_all(&buf)?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Writes rendered documents as JSONL, one `{"ticker", "text"}` object per
/// line, for the fine-tuning corpus.
pub fn export_documents(path: &Path, documents: &[Document]) -> Result<usize> {
    replace_file(path, |writer| {
        let mut jsonl = JsonlWriter::new(writer);
        for document in documents {
            jsonl.write_document(document)?;
        }
        Ok(())
    })?;
    Ok(documents.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, FieldMap, FieldValue};
    use tempfile::tempdir;

    #[test]
    fn records_roundtrip_through_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/records.json");
        let record = EtfRecord {
            ticker: "AAA".into(),
            display_name: "AAA US Equity".into(),
            base_fields: FieldMap::from([("Name".to_string(), FieldValue::NotApplicable)]),
            categories: Category::ALL.iter().map(|c| (*c, FieldMap::new())).collect(),
        };
        save_records(&path, std::slice::from_ref(&record)).unwrap();
        let loaded = load_records(&path).unwrap();
        assert_eq!(loaded, vec![record]);
    }

    #[test]
    fn failed_save_keeps_previous_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.json");
        save_records(&path, &[]).unwrap();
        let before = fs::read(&path).unwrap();

        let err = replace_file(&path, |writer| {
            writer.write_all(b"[{\"ticker\": ")?;
            Err(CoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")))
        })
        .unwrap_err();
        assert!(matches!(err, CoreError::Io(_)));
        assert_eq!(fs::read(&path).unwrap(), before);
        assert!(load_records(&path).unwrap().is_empty());
        let entries = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn jsonl_writer_ends_lines() {
        let mut writer = JsonlWriter::new(Vec::new());
        writer
            .write_document(&Document {
                ticker: "AAA".into(),
                text: "line one\nline two".into(),
            })
            .unwrap();
        let buf = writer.into_inner();
        assert!(buf.ends_with(b"\n"));
        let parsed: Document = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed.text, "line one\nline two");
    }
}
