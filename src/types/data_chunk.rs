use crate::common::error::{VexelError, VexelResult};
use crate::types::logical_type::LogicalType;
use crate::types::value::Value;
use crate::types::vector::Vector;

/// A DataChunk represents a collection of named vectors (columns) for batch
/// processing. This is the unit of data handed to compiled expressions.
#[derive(Debug, Clone)]
pub struct DataChunk {
    /// The vectors (columns) in this chunk
    vectors: Vec<Vector>,
    /// Column names, 1:1 with `vectors`
    names: Vec<String>,
    /// The number of rows in this chunk
    count: usize,
}

impl DataChunk {
    /// Create a new empty data chunk
    pub fn new() -> Self {
        Self {
            vectors: Vec::new(),
            names: Vec::new(),
            count: 0,
        }
    }

    /// Create a chunk with `row_count` rows and no columns. Used as the
    /// evaluation input for expressions that reference no columns.
    pub fn with_rows(row_count: usize) -> Self {
        Self {
            vectors: Vec::new(),
            names: Vec::new(),
            count: row_count,
        }
    }

    /// Create a data chunk from named vectors.
    pub fn from_named_vectors(columns: Vec<(String, Vector)>) -> VexelResult<Self> {
        if columns.is_empty() {
            return Ok(Self::new());
        }

        let count = columns[0].1.count();
        for (i, (_, vector)) in columns.iter().enumerate() {
            if vector.count() != count {
                return Err(VexelError::InvalidValue(format!(
                    "Vector {} has count {}, expected {}",
                    i,
                    vector.count(),
                    count
                )));
            }
        }

        let (names, vectors) = columns.into_iter().unzip();
        Ok(Self {
            vectors,
            names,
            count,
        })
    }

    /// Create a data chunk from vectors with generated column names.
    pub fn from_vectors(vectors: Vec<Vector>) -> VexelResult<Self> {
        let columns = vectors
            .into_iter()
            .enumerate()
            .map(|(i, v)| (format!("c{}", i), v))
            .collect();
        Self::from_named_vectors(columns)
    }

    /// Get the number of vectors (columns) in this chunk
    pub fn column_count(&self) -> usize {
        self.vectors.len()
    }

    /// Get the number of rows in this chunk
    pub fn count(&self) -> usize {
        self.count
    }

    /// Get the number of rows in this chunk (alias for count)
    pub fn len(&self) -> usize {
        self.count
    }

    /// Check if this chunk is empty
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Get a reference to a vector at the specified column index
    pub fn get_vector(&self, column_index: usize) -> Option<&Vector> {
        self.vectors.get(column_index)
    }

    /// Get a column's name at the specified index
    pub fn get_name(&self, column_index: usize) -> Option<&str> {
        self.names.get(column_index).map(|s| s.as_str())
    }

    /// Resolve a column name to its index
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Get a value at the specified row and column
    pub fn get_value(&self, row_idx: usize, column_index: usize) -> VexelResult<Value> {
        match self.vectors.get(column_index) {
            Some(vector) => vector.get_value(row_idx),
            None => Err(VexelError::InvalidValue(format!(
                "Column {} not found",
                column_index
            ))),
        }
    }

    /// Add a named column to this chunk
    pub fn add_column(&mut self, name: impl Into<String>, vector: Vector) -> VexelResult<()> {
        if self.vectors.is_empty() {
            self.count = vector.count();
        } else if vector.count() != self.count {
            return Err(VexelError::InvalidValue(format!(
                "Vector has count {}, expected {}",
                vector.count(),
                self.count
            )));
        }

        self.names.push(name.into());
        self.vectors.push(vector);
        Ok(())
    }

    /// The row type describing this chunk's columns.
    pub fn schema(&self) -> LogicalType {
        LogicalType::Row(
            self.names
                .iter()
                .zip(self.vectors.iter())
                .map(|(name, vector)| (name.clone(), vector.get_type().clone()))
                .collect(),
        )
    }
}

impl Default for DataChunk {
    fn default() -> Self {
        Self::new()
    }
}
