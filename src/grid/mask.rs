use crate::error::{ProcessingError, Result};
use crate::grid::Field;
use ndarray::Array2;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Mask values below this threshold mark water / out-of-domain cells.
const VALID_THRESHOLD: f64 = 0.5;

/// Land/water grid marking which cells may carry data.
#[derive(Debug, Clone, PartialEq)]
pub struct LandMask {
    valid: Array2<bool>,
}

impl LandMask {
    pub fn new(valid: Array2<bool>) -> Self {
        Self { valid }
    }

    /// Mask with every cell valid.
    pub fn all_valid(height: usize, width: usize) -> Self {
        Self::new(Array2::from_elem((height, width), true))
    }

    /// Load a mask stored as a headerless CSV of 0/1 values.
    ///
    /// The file may hold either `height` rows of `width` values or its
    /// transpose; a transposed file is flipped so that rows are latitude bands.
    pub fn from_csv(path: &Path, height: usize, width: usize) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file, height, width)
    }

    pub fn from_reader<R: Read>(reader: R, height: usize, width: usize) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut rows: Vec<Vec<bool>> = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            let row = record
                .iter()
                .map(|value| {
                    value
                        .parse::<f64>()
                        .map(|v| v >= VALID_THRESHOLD)
                        .map_err(|_| {
                            ProcessingError::InvalidFormat(format!(
                                "Invalid mask value: '{}'",
                                value
                            ))
                        })
                })
                .collect::<Result<Vec<_>>>()?;
            rows.push(row);
        }

        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, |r| r.len());
        if rows.iter().any(|r| r.len() != n_cols) {
            return Err(ProcessingError::InvalidFormat(
                "Mask rows have differing lengths".to_string(),
            ));
        }

        let flat: Vec<bool> = rows.into_iter().flatten().collect();
        let grid = Array2::from_shape_vec((n_rows, n_cols), flat)?;

        if (n_rows, n_cols) == (height, width) {
            Ok(Self::new(grid))
        } else if (n_rows, n_cols) == (width, height) {
            Ok(Self::new(grid.reversed_axes().as_standard_layout().to_owned()))
        } else {
            Err(ProcessingError::InvalidFormat(format!(
                "Mask is {}x{}, expected {}x{}",
                n_rows, n_cols, height, width
            )))
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.valid.dim()
    }

    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        self.valid.get((row, col)).copied().unwrap_or(false)
    }

    pub fn valid_cells(&self) -> usize {
        self.valid.iter().filter(|v| **v).count()
    }

    /// Force every invalid cell of `field` to "no value".
    pub fn apply(&self, field: &mut Field) -> Result<()> {
        if field.dim() != self.valid.dim() {
            return Err(ProcessingError::InvalidFormat(format!(
                "Field shape {:?} does not match mask shape {:?}",
                field.dim(),
                self.valid.dim()
            )));
        }

        field.zip_mut_with(&self.valid, |value, valid| {
            if !*valid {
                *value = None;
            }
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_read_row_major_mask() -> Result<()> {
        let csv = "0,1,1\n1,1,0\n";
        let mask = LandMask::from_reader(csv.as_bytes(), 2, 3)?;

        assert_eq!(mask.shape(), (2, 3));
        assert!(!mask.is_valid(0, 0));
        assert!(mask.is_valid(0, 1));
        assert!(!mask.is_valid(1, 2));
        assert_eq!(mask.valid_cells(), 4);
        Ok(())
    }

    #[test]
    fn test_read_transposed_mask() -> Result<()> {
        // 3 rows (longitude bands) x 2 columns (latitude bands)
        let csv = "0,1\n1,1\n1,0.0\n";
        let mask = LandMask::from_reader(csv.as_bytes(), 2, 3)?;

        assert_eq!(mask.shape(), (2, 3));
        assert!(!mask.is_valid(0, 0));
        assert!(mask.is_valid(0, 1));
        assert!(mask.is_valid(1, 0));
        assert!(!mask.is_valid(1, 2));
        Ok(())
    }

    #[test]
    fn test_wrong_shape_rejected() {
        let csv = "0,1\n1,1\n";
        assert!(LandMask::from_reader(csv.as_bytes(), 3, 3).is_err());
    }

    #[test]
    fn test_apply_clears_invalid_cells() -> Result<()> {
        let mask = LandMask::new(array![[true, false], [false, true]]);
        let mut field = array![[Some(1.0), Some(2.0)], [None, Some(0.0)]];

        mask.apply(&mut field)?;

        assert_eq!(field, array![[Some(1.0), None], [None, Some(0.0)]]);
        Ok(())
    }

    #[test]
    fn test_apply_checks_shape() {
        let mask = LandMask::all_valid(2, 2);
        let mut field = Array2::from_elem((3, 2), Some(1.0));
        assert!(mask.apply(&mut field).is_err());
    }
}
