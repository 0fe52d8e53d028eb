use crate::common::error::{VexelError, VexelResult};
use crate::types::logical_type::LogicalType;
use crate::types::physical_type::PhysicalType;
use crate::types::value::Value;
use serde::{Deserialize, Serialize};

/// A validity mask for tracking null values in a vector.
/// Uses a bitset for efficient storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidityMask {
    /// Bitset where each bit represents whether the corresponding value is valid (1) or null (0)
    data: Vec<u64>,
    /// Number of entries in the mask
    count: usize,
}

impl ValidityMask {
    /// Create a new validity mask with the specified capacity
    pub fn new(count: usize) -> Self {
        let data_size = count.div_ceil(64);
        Self {
            data: vec![0u64; data_size],
            count,
        }
    }

    /// Create a validity mask where all entries are valid
    pub fn all_valid(count: usize) -> Self {
        Self {
            data: vec![u64::MAX; count.div_ceil(64)],
            count,
        }
    }

    /// Set the validity of a specific entry
    pub fn set_valid(&mut self, index: usize, valid: bool) {
        if index >= self.count {
            return;
        }
        let word_index = index / 64;
        let bit_index = index % 64;

        if valid {
            self.data[word_index] |= 1u64 << bit_index;
        } else {
            self.data[word_index] &= !(1u64 << bit_index);
        }
    }

    /// Set a specific entry as invalid (null)
    pub fn set_invalid(&mut self, index: usize) {
        self.set_valid(index, false);
    }

    /// Check if a specific entry is valid
    pub fn is_valid(&self, index: usize) -> bool {
        if index >= self.count {
            return false;
        }
        let word_index = index / 64;
        let bit_index = index % 64;
        (self.data[word_index] & (1u64 << bit_index)) != 0
    }

    /// Check if a specific entry is null
    pub fn is_null(&self, index: usize) -> bool {
        !self.is_valid(index)
    }

    /// Get the number of entries in the mask
    pub fn count(&self) -> usize {
        self.count
    }

    /// Count the number of valid entries
    pub fn valid_count(&self) -> usize {
        (0..self.count).filter(|&i| self.is_valid(i)).count()
    }

    /// Count the number of null entries
    pub fn null_count(&self) -> usize {
        self.count - self.valid_count()
    }

    /// Resize the validity mask; new entries start invalid
    pub fn resize(&mut self, new_count: usize) {
        self.data.resize(new_count.div_ceil(64), 0);
        self.count = new_count;
    }
}

/// A selection vector: an ordered set of row indices in a batch on which an
/// operation is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionVector {
    /// Indices into the data
    data: Vec<usize>,
    /// Number of valid entries
    count: usize,
}

impl SelectionVector {
    /// Create a new empty selection vector with capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            count: 0,
        }
    }

    /// Create a selection vector with sequential indices [0, 1, 2, ..., count-1].
    /// This is the most common case for unfiltered data.
    pub fn sequential(count: usize) -> Self {
        Self {
            data: (0..count).collect(),
            count,
        }
    }

    /// Create a selection vector from existing indices
    pub fn from_indices(indices: Vec<usize>) -> Self {
        let count = indices.len();
        Self {
            data: indices,
            count,
        }
    }

    /// Get the index at a specific position
    #[inline]
    pub fn get_index(&self, position: usize) -> usize {
        debug_assert!(
            position < self.count,
            "Index {} out of bounds (count: {})",
            position,
            self.count
        );
        self.data[position]
    }

    /// Append an index to the selection vector
    #[inline]
    pub fn append(&mut self, index: usize) {
        self.data.push(index);
        self.count += 1;
    }

    /// Get the number of entries
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Check if empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The largest selected index plus one; the minimum size of any vector
    /// addressed through this selection.
    pub fn required_size(&self) -> usize {
        self.as_slice().iter().map(|i| i + 1).max().unwrap_or(0)
    }

    /// Get a slice of the indices
    pub fn as_slice(&self) -> &[usize] {
        &self.data[..self.count]
    }

    /// Iterate over the selected row indices in order
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.as_slice().iter().copied()
    }
}

/// A Vector is a columnar data container: the actual data, a validity mask,
/// and the logical type of the entries.
///
/// Fixed-width values live in a flat byte buffer; variable-width values
/// (VARCHAR, VARBINARY) live in a shared arena addressed by per-row
/// (offset, length) views; nested values fall back to boxed storage.
#[derive(Debug, Clone)]
pub struct Vector {
    /// The logical type of this vector
    logical_type: LogicalType,
    /// The physical type for storage
    physical_type: PhysicalType,
    /// Fixed-width data (stored as raw bytes)
    data: Vec<u8>,
    /// Variable-width data arena
    arena: Vec<u8>,
    /// Per-row (offset, length) into the arena for variable-width types
    views: Vec<(u32, u32)>,
    /// Boxed storage for nested types
    nested: Vec<Value>,
    /// Validity mask for null values
    validity: ValidityMask,
    /// Number of entries in the vector
    count: usize,
    /// Capacity of the vector
    capacity: usize,
}

impl Vector {
    /// Create a new vector with the specified type and capacity.
    /// All entries start as null.
    pub fn new(logical_type: LogicalType, capacity: usize) -> Self {
        let physical_type = logical_type.get_physical_type();
        let element_size = physical_type.get_size().unwrap_or(0);

        Self {
            logical_type,
            physical_type,
            data: vec![0u8; element_size * capacity],
            arena: Vec::new(),
            views: vec![(0, 0); capacity],
            nested: vec![Value::Null; capacity],
            validity: ValidityMask::new(capacity),
            count: 0,
            capacity,
        }
    }

    /// Create a vector of `count` copies of `value`.
    pub fn constant(logical_type: LogicalType, value: &Value, count: usize) -> VexelResult<Self> {
        let mut vector = Self::new(logical_type, count);
        vector.count = count;
        for i in 0..count {
            vector.set_value(i, value)?;
        }
        Ok(vector)
    }

    /// Create a vector from a slice of values with an explicit type.
    pub fn from_values_typed(logical_type: LogicalType, values: &[Value]) -> VexelResult<Self> {
        let mut vector = Self::new(logical_type, values.len());
        vector.count = values.len();
        for (i, value) in values.iter().enumerate() {
            vector.set_value(i, value)?;
        }
        Ok(vector)
    }

    /// Create a vector from a slice of values, inferring the type from the
    /// first non-null entry.
    pub fn from_values(values: &[Value]) -> VexelResult<Self> {
        if values.is_empty() {
            return Err(VexelError::InvalidValue(
                "Cannot create vector from empty values".to_string(),
            ));
        }

        let logical_type = values
            .iter()
            .find(|v| !v.is_null())
            .map(|v| v.get_type())
            .unwrap_or(LogicalType::Unknown);
        Self::from_values_typed(logical_type, values)
    }

    /// Get the logical type of this vector
    pub fn get_type(&self) -> &LogicalType {
        &self.logical_type
    }

    /// Get the physical type of this vector
    pub fn get_physical_type(&self) -> &PhysicalType {
        &self.physical_type
    }

    /// Get the number of entries in the vector
    pub fn count(&self) -> usize {
        self.count
    }

    /// Get the number of entries in the vector
    pub fn len(&self) -> usize {
        self.count
    }

    /// Get the capacity of the vector
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Check if the vector is empty
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Resize the vector; new entries are null
    pub fn resize(&mut self, new_count: usize) -> VexelResult<()> {
        if new_count > self.capacity {
            self.reserve(new_count)?;
        }
        self.count = new_count;
        Ok(())
    }

    /// Reserve capacity for additional entries
    pub fn reserve(&mut self, new_capacity: usize) -> VexelResult<()> {
        if new_capacity <= self.capacity {
            return Ok(());
        }

        let element_size = self.physical_type.get_size().unwrap_or(0);
        self.data.resize(element_size * new_capacity, 0);
        self.views.resize(new_capacity, (0, 0));
        self.nested.resize(new_capacity, Value::Null);
        self.validity.resize(new_capacity);
        self.capacity = new_capacity;
        Ok(())
    }

    /// Reserve space in the variable-width arena, e.g. ahead of writing a
    /// batch of bounded-size strings.
    pub fn reserve_arena(&mut self, additional: usize) {
        self.arena.reserve(additional);
    }

    /// Set a value at a specific index. The value must match the vector's
    /// logical type exactly; NULL marks the entry invalid.
    pub fn set_value(&mut self, index: usize, value: &Value) -> VexelResult<()> {
        if index >= self.capacity {
            return Err(VexelError::InvalidValue(format!(
                "Index {} exceeds vector capacity {}",
                index, self.capacity
            )));
        }

        if value.is_null() {
            self.validity.set_valid(index, false);
            return Ok(());
        }

        match (value, &self.logical_type) {
            (Value::Boolean(v), LogicalType::Boolean) => self.store_bytes(index, &[*v as u8]),
            (Value::TinyInt(v), LogicalType::TinyInt) => self.store_bytes(index, &v.to_le_bytes()),
            (Value::SmallInt(v), LogicalType::SmallInt) => {
                self.store_bytes(index, &v.to_le_bytes())
            }
            (Value::Integer(v), LogicalType::Integer) => self.store_bytes(index, &v.to_le_bytes()),
            (Value::BigInt(v), LogicalType::BigInt) => self.store_bytes(index, &v.to_le_bytes()),
            (Value::HugeInt(v), LogicalType::HugeInt) => self.store_bytes(index, &v.to_le_bytes()),
            (Value::Real(v), LogicalType::Real) => self.store_bytes(index, &v.to_le_bytes()),
            (Value::Double(v), LogicalType::Double) => self.store_bytes(index, &v.to_le_bytes()),
            (Value::Date(v), LogicalType::Date) => self.store_bytes(index, &v.to_le_bytes()),
            (Value::Timestamp(v), LogicalType::Timestamp) => {
                self.store_bytes(index, &v.to_le_bytes())
            }
            (Value::Decimal { value, scale, .. }, LogicalType::Decimal { scale: to_scale, .. }) => {
                if scale != to_scale {
                    return Err(VexelError::InvalidType(format!(
                        "Decimal scale mismatch: value has scale {}, vector has scale {}",
                        scale, to_scale
                    )));
                }
                self.store_bytes(index, &value.to_le_bytes())
            }
            (Value::Varchar(s), LogicalType::Varchar) => self.store_arena(index, s.as_bytes()),
            (Value::Varbinary(b), LogicalType::Varbinary) => self.store_arena(index, b),
            (Value::Array(_), LogicalType::Array(_))
            | (Value::Row(_), LogicalType::Row(_))
            | (_, LogicalType::Map { .. }) => {
                self.nested[index] = value.clone();
            }
            (value, ty) => {
                return Err(VexelError::InvalidType(format!(
                    "Cannot store {} value in {} vector",
                    value.get_type(),
                    ty
                )))
            }
        }

        self.validity.set_valid(index, true);
        if index >= self.count {
            self.count = index + 1;
        }
        Ok(())
    }

    /// Mark an entry as null
    pub fn set_null(&mut self, index: usize) {
        self.validity.set_valid(index, false);
        if index < self.capacity && index >= self.count {
            self.count = index + 1;
        }
    }

    fn store_bytes(&mut self, index: usize, bytes: &[u8]) {
        let offset = index * bytes.len();
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    fn store_arena(&mut self, index: usize, bytes: &[u8]) {
        let offset = self.arena.len() as u32;
        self.arena.extend_from_slice(bytes);
        self.views[index] = (offset, bytes.len() as u32);
    }

    /// Get a value at a specific index
    pub fn get_value(&self, index: usize) -> VexelResult<Value> {
        if index >= self.count {
            return Err(VexelError::InvalidValue(format!(
                "Index {} exceeds vector count {}",
                index, self.count
            )));
        }

        if !self.validity.is_valid(index) {
            return Ok(Value::Null);
        }

        let value = match &self.logical_type {
            LogicalType::Boolean => Value::Boolean(self.data[index] != 0),
            LogicalType::TinyInt => Value::TinyInt(i8::from_le_bytes(self.read_bytes(index))),
            LogicalType::SmallInt => Value::SmallInt(i16::from_le_bytes(self.read_bytes(index))),
            LogicalType::Integer => Value::Integer(i32::from_le_bytes(self.read_bytes(index))),
            LogicalType::BigInt => Value::BigInt(i64::from_le_bytes(self.read_bytes(index))),
            LogicalType::HugeInt => Value::HugeInt(i128::from_le_bytes(self.read_bytes(index))),
            LogicalType::Real => Value::Real(f32::from_le_bytes(self.read_bytes(index))),
            LogicalType::Double => Value::Double(f64::from_le_bytes(self.read_bytes(index))),
            LogicalType::Date => Value::Date(i32::from_le_bytes(self.read_bytes(index))),
            LogicalType::Timestamp => Value::Timestamp(i64::from_le_bytes(self.read_bytes(index))),
            LogicalType::Decimal { precision, scale } => Value::Decimal {
                value: i128::from_le_bytes(self.read_bytes(index)),
                precision: *precision,
                scale: *scale,
            },
            LogicalType::Varchar => {
                let bytes = self.read_arena(index);
                Value::Varchar(String::from_utf8_lossy(bytes).into_owned())
            }
            LogicalType::Varbinary => Value::Varbinary(self.read_arena(index).to_vec()),
            LogicalType::Array(_) | LogicalType::Row(_) | LogicalType::Map { .. } => {
                self.nested[index].clone()
            }
            other => {
                return Err(VexelError::InvalidType(format!(
                    "Unsupported vector type for value extraction: {}",
                    other
                )))
            }
        };
        Ok(value)
    }

    fn read_bytes<const N: usize>(&self, index: usize) -> [u8; N] {
        let offset = index * N;
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(&self.data[offset..offset + N]);
        bytes
    }

    fn read_arena(&self, index: usize) -> &[u8] {
        let (offset, len) = self.views[index];
        &self.arena[offset as usize..(offset + len) as usize]
    }

    /// Get the validity mask
    pub fn get_validity(&self) -> &ValidityMask {
        &self.validity
    }

    /// Check if a specific entry is null
    pub fn is_null(&self, index: usize) -> bool {
        self.validity.is_null(index)
    }

    /// Check if a specific entry is valid
    pub fn is_valid(&self, index: usize) -> bool {
        self.validity.is_valid(index)
    }

    /// Get the number of null values
    pub fn null_count(&self) -> usize {
        self.validity.null_count()
    }

    /// Get the number of valid values
    pub fn valid_count(&self) -> usize {
        self.validity.valid_count()
    }

    /// Append a value to the vector
    pub fn push(&mut self, value: &Value) -> VexelResult<()> {
        if self.count >= self.capacity {
            self.reserve((self.capacity * 2).max(8))?;
        }

        let index = self.count;
        if value.is_null() {
            self.validity.set_valid(index, false);
            self.count += 1;
        } else {
            self.set_value(index, value)?;
        }
        Ok(())
    }

    /// Get an iterator over the values in this vector
    pub fn iter(&self) -> VectorIterator<'_> {
        VectorIterator {
            vector: self,
            index: 0,
        }
    }
}

/// Iterator for Vector values
pub struct VectorIterator<'a> {
    vector: &'a Vector,
    index: usize,
}

impl<'a> Iterator for VectorIterator<'a> {
    type Item = VexelResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.vector.count {
            None
        } else {
            let result = self.vector.get_value(self.index);
            self.index += 1;
            Some(result)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_mask() {
        let mut mask = ValidityMask::new(10);

        // Initially all invalid
        assert_eq!(mask.null_count(), 10);
        assert_eq!(mask.valid_count(), 0);

        mask.set_valid(0, true);
        mask.set_valid(3, true);
        mask.set_valid(7, true);

        assert_eq!(mask.valid_count(), 3);
        assert_eq!(mask.null_count(), 7);
        assert!(mask.is_valid(0));
        assert!(mask.is_valid(3));
        assert!(mask.is_valid(7));
        assert!(!mask.is_valid(1));
    }

    #[test]
    fn test_selection_vector() {
        let sel_vec = SelectionVector::from_indices(vec![2, 5, 1, 8]);

        assert_eq!(sel_vec.count(), 4);
        assert_eq!(sel_vec.get_index(0), 2);
        assert_eq!(sel_vec.get_index(1), 5);
        assert_eq!(sel_vec.get_index(3), 8);
        assert_eq!(sel_vec.required_size(), 9);

        let seq = SelectionVector::sequential(3);
        assert_eq!(seq.as_slice(), &[0, 1, 2]);
    }

    #[test]
    fn test_vector_creation() {
        let vector = Vector::new(LogicalType::Integer, 100);

        assert_eq!(vector.get_type(), &LogicalType::Integer);
        assert_eq!(vector.capacity(), 100);
        assert_eq!(vector.count(), 0);
        assert!(vector.is_empty());
    }

    #[test]
    fn test_vector_from_values() -> VexelResult<()> {
        let values = vec![Value::integer(1), Value::integer(2), Value::integer(3)];

        let vector = Vector::from_values(&values)?;

        assert_eq!(vector.count(), 3);
        assert_eq!(vector.get_type(), &LogicalType::Integer);

        for (i, expected) in values.iter().enumerate() {
            let actual = vector.get_value(i)?;
            assert_eq!(actual, *expected);
        }

        Ok(())
    }

    #[test]
    fn test_vector_null_values() -> VexelResult<()> {
        let values = vec![
            Value::integer(1),
            Value::Null,
            Value::integer(3),
            Value::Null,
        ];

        let vector = Vector::from_values(&values)?;

        assert_eq!(vector.count(), 4);
        assert_eq!(vector.null_count(), 2);
        assert_eq!(vector.valid_count(), 2);

        assert!(vector.is_valid(0));
        assert!(vector.is_null(1));
        assert!(vector.is_valid(2));
        assert!(vector.is_null(3));

        Ok(())
    }

    #[test]
    fn test_vector_strings() -> VexelResult<()> {
        let values = vec![
            Value::varchar("hello"),
            Value::varchar(""),
            Value::Null,
            Value::varchar("a much longer string that will not fit inline"),
        ];
        let vector = Vector::from_values_typed(LogicalType::Varchar, &values)?;

        assert_eq!(vector.get_value(0)?, Value::varchar("hello"));
        assert_eq!(vector.get_value(1)?, Value::varchar(""));
        assert!(vector.get_value(2)?.is_null());
        assert_eq!(
            vector.get_value(3)?,
            Value::varchar("a much longer string that will not fit inline")
        );
        Ok(())
    }

    #[test]
    fn test_vector_decimal_roundtrip() -> VexelResult<()> {
        let ty = LogicalType::Decimal {
            precision: 10,
            scale: 2,
        };
        let mut vector = Vector::new(ty, 4);
        vector.set_value(0, &Value::decimal(12345, 10, 2))?;
        vector.set_value(1, &Value::decimal(-99, 10, 2))?;
        assert_eq!(vector.get_value(0)?, Value::decimal(12345, 10, 2));
        assert_eq!(vector.get_value(1)?, Value::decimal(-99, 10, 2));

        // Scale mismatch is a type error, not silent truncation.
        assert!(vector.set_value(2, &Value::decimal(5, 10, 3)).is_err());
        Ok(())
    }

    #[test]
    fn test_vector_push_grows() -> VexelResult<()> {
        let mut vector = Vector::new(LogicalType::Integer, 2);

        vector.push(&Value::integer(10))?;
        vector.push(&Value::integer(20))?;
        vector.push(&Value::integer(30))?; // Should trigger resize

        assert_eq!(vector.count(), 3);
        assert_eq!(vector.get_value(0)?, Value::integer(10));
        assert_eq!(vector.get_value(1)?, Value::integer(20));
        assert_eq!(vector.get_value(2)?, Value::integer(30));

        Ok(())
    }

    #[test]
    fn test_vector_constant() -> VexelResult<()> {
        let vector = Vector::constant(LogicalType::BigInt, &Value::bigint(7), 5)?;
        assert_eq!(vector.count(), 5);
        for i in 0..5 {
            assert_eq!(vector.get_value(i)?, Value::bigint(7));
        }
        Ok(())
    }
}
