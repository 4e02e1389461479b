use std::io::{Read, Write};
use std::path::Path;

use bytemuck::cast_slice;
use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

const MAGIC: &[u8; 4] = b"FEMB";
const VERSION: u32 = 1;

/// Row-major `rows x dimension` matrix of f32 embeddings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingMatrix {
    dimension: usize,
    data: Vec<f32>,
}

impl EmbeddingMatrix {
    pub fn new(dimension: usize) -> Result<Self> {
        Self::with_capacity(dimension, 0)
    }

    pub fn with_capacity(dimension: usize, rows: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(IndexError::ZeroDimension);
        }
        Ok(Self {
            dimension,
            data: Vec::with_capacity(dimension * rows),
        })
    }

    pub fn from_rows<I>(dimension: usize, rows: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<[f32]>,
    {
        let mut matrix = Self::new(dimension)?;
        for row in rows {
            matrix.push(row.as_ref())?;
        }
        Ok(matrix)
    }

    pub fn push(&mut self, row: &[f32]) -> Result<()> {
        if row.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: row.len(),
            });
        }
        self.data.extend_from_slice(row);
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn rows(&self) -> usize {
        self.data.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        let start = index.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dimension)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub(crate) fn is_well_formed(&self) -> bool {
        self.dimension > 0 && self.data.len() % self.dimension == 0
    }

    /// blake3 over the little-endian payload; identical matrices share a digest.
    pub fn digest(&self) -> String {
        blake3::hash(cast_slice(&self.le_payload())).to_hex().to_string()
    }

    fn le_payload(&self) -> Vec<[u8; 4]> {
        self.data.iter().map(|value| value.to_le_bytes()).collect()
    }

    /// Writes `FEMB`, version, rows and dimension, then the f32 payload in
    /// little-endian layout.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&(self.rows() as u64).to_le_bytes())?;
        writer.write_all(&(self.dimension as u64).to_le_bytes())?;
        writer.write_all(cast_slice(&self.le_payload()))?;
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R, path: &Path) -> Result<Self> {
        let invalid = |reason: String| IndexError::InvalidEmbeddings {
            path: path.to_path_buf(),
            reason,
        };
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(invalid("bad magic".to_string()));
        }
        let version = u32::from_le_bytes(read_array(reader)?);
        if version != VERSION {
            return Err(invalid(format!("unsupported version {version}")));
        }
        let rows = u64::from_le_bytes(read_array(reader)?) as usize;
        let dimension = u64::from_le_bytes(read_array(reader)?) as usize;
        if dimension == 0 {
            return Err(invalid("zero dimension".to_string()));
        }
        let len = rows
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(std::mem::size_of::<f32>()))
            .ok_or_else(|| invalid("header overflows".to_string()))?;
        // The header is untrusted, so the buffer only grows as bytes arrive.
        let mut payload = Vec::new();
        let read = reader.by_ref().take(len as u64).read_to_end(&mut payload)?;
        if read != len {
            return Err(invalid(format!(
                "truncated payload: header promises {len} bytes, found {read}"
            )));
        }
        let mut trailing = [0u8; 1];
        if reader.read(&mut trailing)? != 0 {
            return Err(invalid("trailing bytes after payload".to_string()));
        }
        Ok(Self {
            dimension,
            data: cast_slice::<u8, [u8; 4]>(&payload)
                .iter()
                .map(|bytes| f32::from_le_bytes(*bytes))
                .collect(),
        })
    }
}

fn read_array<R: Read, const N: usize>(reader: &mut R) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn push_rejects_wrong_dimension() {
        let mut matrix = EmbeddingMatrix::new(3).unwrap();
        matrix.push(&[1.0, 2.0, 3.0]).unwrap();
        let err = matrix.push(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            IndexError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert_eq!(matrix.rows(), 1);
    }

    #[test]
    fn binary_format_roundtrips_and_detects_truncation() {
        let matrix =
            EmbeddingMatrix::from_rows(2, [[0.5f32, -1.0], [3.25, 4.0], [0.0, 1.5]]).unwrap();
        let mut buf = Vec::new();
        matrix.write_to(&mut buf).unwrap();
        let path = Path::new("embeddings.bin");
        let decoded = EmbeddingMatrix::read_from(&mut Cursor::new(&buf), path).unwrap();
        assert_eq!(decoded, matrix);
        assert_eq!(decoded.digest(), matrix.digest());

        buf.truncate(buf.len() - 2);
        let err = EmbeddingMatrix::read_from(&mut Cursor::new(&buf), path).unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    fn header(rows: u64, dimension: u64) -> Vec<u8> {
        let mut buf = MAGIC.to_vec();
        buf.extend_from_slice(&VERSION.to_le_bytes());
        buf.extend_from_slice(&rows.to_le_bytes());
        buf.extend_from_slice(&dimension.to_le_bytes());
        buf
    }

    #[test]
    fn oversized_row_count_is_refused_without_allocating() {
        let mut buf = header(1 << 61, 1);
        buf.extend_from_slice(&[0u8; 8]);
        let err = EmbeddingMatrix::read_from(&mut Cursor::new(&buf), Path::new("huge.bin"))
            .unwrap_err();
        assert!(matches!(err, IndexError::InvalidEmbeddings { .. }));
    }

    #[test]
    fn payload_is_little_endian() {
        let matrix = EmbeddingMatrix::from_rows(2, [[1.0f32, -2.5]]).unwrap();
        let mut buf = Vec::new();
        matrix.write_to(&mut buf).unwrap();
        let mut expected = header(1, 2);
        expected.extend_from_slice(&1.0f32.to_le_bytes());
        expected.extend_from_slice(&(-2.5f32).to_le_bytes());
        assert_eq!(buf, expected);
        assert_eq!(
            EmbeddingMatrix::read_from(&mut Cursor::new(&buf), Path::new("le.bin")).unwrap(),
            matrix
        );
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert!(matches!(
            EmbeddingMatrix::new(0),
            Err(IndexError::ZeroDimension)
        ));
    }
}
