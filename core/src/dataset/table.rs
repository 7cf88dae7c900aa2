//! In-memory table and feature/target selection.

use crate::error::{Error, Result};
use ndarray::{Array1, Array2, Axis};
use polars::prelude::{CsvReadOptions, DataFrame, DataType, NamedFrom, SerReader, Series};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::io::Cursor;
use tracing::debug;

/// Which columns become features and which one is the label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub features: Vec<String>,
    pub target: String,
}

/// Column computed as the row-wise sum of other columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedColumn {
    pub name: String,
    pub sum_of: Vec<String>,
}

/// Named columns backed by a polars frame
#[derive(Debug, Clone)]
pub struct Table {
    frame: DataFrame,
}

impl Table {
    /// Parse CSV bytes with a header row
    pub fn from_csv_bytes(bytes: Vec<u8>) -> Result<Self> {
        let frame = CsvReadOptions::default()
            .with_has_header(true)
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()?;
        Ok(Self { frame })
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn width(&self) -> usize {
        self.frame.width()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.get_column_names().iter().any(|c| *c == name)
    }

    fn series(&self, name: &str) -> Result<&Series> {
        if !self.has_column(name) {
            return Err(Error::MissingColumn(name.to_string()));
        }
        Ok(self.frame.column(name)?)
    }

    /// Numeric column as `f64`; nulls are rejected
    pub fn numeric_column(&self, name: &str) -> Result<Vec<f64>> {
        let series = self.series(name)?;
        let dtype = series.dtype();
        if !(dtype.is_numeric() || *dtype == DataType::Boolean) {
            return Err(Error::NonNumeric {
                column: name.to_string(),
                dtype: dtype.to_string(),
            });
        }

        let cast = series.cast(&DataType::Float64)?;
        cast.f64()?
            .into_iter()
            .enumerate()
            .map(|(row, value)| {
                value.ok_or_else(|| Error::MissingValue {
                    column: name.to_string(),
                    row,
                })
            })
            .collect()
    }

    /// Any column rendered as text; nulls become empty strings
    pub fn string_column(&self, name: &str) -> Result<Vec<String>> {
        let series = self.series(name)?;
        let cast = series.cast(&DataType::String)?;
        Ok(cast
            .str()?
            .into_iter()
            .map(|value| value.unwrap_or_default().to_string())
            .collect())
    }

    /// Append `name` as the row-wise sum of `sources`
    pub fn with_sum_column(mut self, name: &str, sources: &[String]) -> Result<Self> {
        if sources.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Derived column '{}' needs at least one source column",
                name
            )));
        }

        let mut sums = vec![0.0; self.height()];
        for source in sources {
            for (total, value) in sums.iter_mut().zip(self.numeric_column(source)?) {
                *total += value;
            }
        }

        // Integer stats stay integers
        let column = if sums.iter().all(|v| v.fract() == 0.0) {
            Series::new(name, sums.iter().map(|v| *v as i64).collect::<Vec<i64>>())
        } else {
            Series::new(name, sums)
        };
        self.frame.with_column(column)?;
        debug!("Derived column '{}' from {:?}", name, sources);
        Ok(self)
    }

    /// Apply every derived column in order
    pub fn with_derived(self, derived: &[DerivedColumn]) -> Result<Self> {
        derived
            .iter()
            .try_fold(self, |table, column| table.with_sum_column(&column.name, &column.sum_of))
    }

    /// Build the feature matrix and encoded label vector
    pub fn select(&self, spec: &FeatureSpec) -> Result<LabeledData> {
        if spec.features.is_empty() {
            return Err(Error::InvalidInput("Feature list cannot be empty".to_string()));
        }

        let n_rows = self.height();
        let mut features = Array2::<f64>::zeros((n_rows, spec.features.len()));
        for (idx, name) in spec.features.iter().enumerate() {
            let column = Array1::from(self.numeric_column(name)?);
            features.column_mut(idx).assign(&column);
        }

        let (targets, class_labels) = encode_target(self.series(&spec.target)?, &spec.target)?;

        Ok(LabeledData {
            features,
            targets,
            feature_names: spec.features.clone(),
            class_labels,
            row_ids: (0..n_rows).collect(),
        })
    }
}

/// Map a target column to class indices and their ordered labels.
///
/// Booleans become `False = 0`, `True = 1`; numbers and strings are
/// indexed in ascending order of their distinct values.
fn encode_target(series: &Series, name: &str) -> Result<(Array1<u32>, Vec<String>)> {
    let missing = |row: usize| Error::MissingValue {
        column: name.to_string(),
        row,
    };

    match series.dtype() {
        DataType::Boolean => {
            let targets = series
                .bool()?
                .into_iter()
                .enumerate()
                .map(|(row, value)| value.map(u32::from).ok_or_else(|| missing(row)))
                .collect::<Result<Vec<u32>>>()?;
            Ok((
                Array1::from(targets),
                vec!["False".to_string(), "True".to_string()],
            ))
        }
        dtype if dtype.is_numeric() => {
            let cast = series.cast(&DataType::Int64)?;
            let values = cast
                .i64()?
                .into_iter()
                .enumerate()
                .map(|(row, value)| value.ok_or_else(|| missing(row)))
                .collect::<Result<Vec<i64>>>()?;
            let classes: BTreeSet<i64> = values.iter().copied().collect();
            Ok(index_classes(values, classes))
        }
        _ => {
            let cast = series.cast(&DataType::String)?;
            let values = cast
                .str()?
                .into_iter()
                .enumerate()
                .map(|(row, value)| value.map(str::to_string).ok_or_else(|| missing(row)))
                .collect::<Result<Vec<String>>>()?;
            let classes: BTreeSet<String> = values.iter().cloned().collect();
            Ok(index_classes(values, classes))
        }
    }
}

fn index_classes<T>(values: Vec<T>, classes: BTreeSet<T>) -> (Array1<u32>, Vec<String>)
where
    T: Ord + ToString + std::hash::Hash,
{
    let labels: Vec<String> = classes.iter().map(ToString::to_string).collect();
    let index: HashMap<T, u32> = classes
        .into_iter()
        .enumerate()
        .map(|(idx, class)| (class, idx as u32))
        .collect();
    let targets = values.iter().map(|value| index[value]).collect();
    (targets, labels)
}

/// Feature matrix, encoded labels and bookkeeping for one set of rows
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledData {
    pub features: Array2<f64>,
    pub targets: Array1<u32>,
    pub feature_names: Vec<String>,
    /// Label text for each class index
    pub class_labels: Vec<String>,
    /// Row of the source table each sample came from
    pub row_ids: Vec<usize>,
}

impl LabeledData {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn n_classes(&self) -> usize {
        self.class_labels.len()
    }

    /// Index of a class label, e.g. `"True"`
    pub fn class_index(&self, label: &str) -> Option<u32> {
        self.class_labels
            .iter()
            .position(|l| l == label)
            .map(|idx| idx as u32)
    }

    /// Rows at the given positions, in that order
    pub fn subset(&self, positions: &[usize]) -> LabeledData {
        LabeledData {
            features: self.features.select(Axis(0), positions),
            targets: self.targets.select(Axis(0), positions),
            feature_names: self.feature_names.clone(),
            class_labels: self.class_labels.clone(),
            row_ids: positions.iter().map(|&pos| self.row_ids[pos]).collect(),
        }
    }

    /// First `n` rows (fewer if the data is shorter)
    pub fn head(&self, n: usize) -> LabeledData {
        let positions: Vec<usize> = (0..n.min(self.len())).collect();
        self.subset(&positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POKEDEX: &str = "\
#,Name,HP,Attack,Defense,Generation,Legendary
1,Bulbasaur,45,49,49,1,False
144,Articuno,90,85,100,1,True
25,Pikachu,35,55,40,1,False
150,Mewtwo,106,110,90,1,True
";

    fn table(csv: &str) -> Table {
        Table::from_csv_bytes(csv.as_bytes().to_vec()).unwrap()
    }

    #[test]
    fn test_boolean_target_encoding() {
        let table = table(POKEDEX);
        let data = table
            .select(&FeatureSpec {
                features: vec!["HP".to_string(), "Attack".to_string()],
                target: "Legendary".to_string(),
            })
            .unwrap();

        assert_eq!(data.class_labels, vec!["False", "True"]);
        assert_eq!(data.targets.to_vec(), vec![0, 1, 0, 1]);
        assert_eq!(data.features.row(1).to_vec(), vec![90.0, 85.0]);
        assert_eq!(data.class_index("True"), Some(1));
    }

    #[test]
    fn test_string_target_is_sorted() {
        let table = table("x,label\n1.0,b\n2.0,a\n3.0,c\n4.0,a\n");
        let data = table
            .select(&FeatureSpec {
                features: vec!["x".to_string()],
                target: "label".to_string(),
            })
            .unwrap();

        assert_eq!(data.class_labels, vec!["a", "b", "c"]);
        assert_eq!(data.targets.to_vec(), vec![1, 0, 2, 0]);
    }

    #[test]
    fn test_integer_target_keeps_values_as_labels() {
        let table = table("x,y\n1,2\n2,0\n3,2\n");
        let data = table
            .select(&FeatureSpec {
                features: vec!["x".to_string()],
                target: "y".to_string(),
            })
            .unwrap();

        assert_eq!(data.class_labels, vec!["0", "2"]);
        assert_eq!(data.targets.to_vec(), vec![1, 0, 1]);
    }

    #[test]
    fn test_sum_column() {
        let table = table(POKEDEX)
            .with_derived(&[DerivedColumn {
                name: "Total_Stats".to_string(),
                sum_of: vec!["HP".to_string(), "Attack".to_string(), "Defense".to_string()],
            }])
            .unwrap();

        assert_eq!(
            table.numeric_column("Total_Stats").unwrap(),
            vec![143.0, 275.0, 130.0, 306.0]
        );
        assert_eq!(table.string_column("Total_Stats").unwrap()[0], "143");
    }

    #[test]
    fn test_missing_column() {
        let table = table(POKEDEX);
        let err = table
            .select(&FeatureSpec {
                features: vec!["Sp. Atk".to_string()],
                target: "Legendary".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, Error::MissingColumn(name) if name == "Sp. Atk"));
    }

    #[test]
    fn test_text_feature_rejected() {
        let table = table(POKEDEX);
        let err = table.numeric_column("Name").unwrap_err();
        assert!(matches!(err, Error::NonNumeric { .. }));
    }

    #[test]
    fn test_null_feature_rejected() {
        let table = table("x,y\n1,a\n,b\n");
        let err = table.numeric_column("x").unwrap_err();
        assert!(matches!(err, Error::MissingValue { row: 1, .. }));
    }

    #[test]
    fn test_subset_tracks_row_ids() {
        let data = table(POKEDEX)
            .select(&FeatureSpec {
                features: vec!["HP".to_string()],
                target: "Legendary".to_string(),
            })
            .unwrap();

        let subset = data.subset(&[3, 0]);
        assert_eq!(subset.row_ids, vec![3, 0]);
        assert_eq!(subset.features.column(0).to_vec(), vec![106.0, 45.0]);

        let nested = subset.subset(&[1]);
        assert_eq!(nested.row_ids, vec![0]);
        assert_eq!(subset.head(10).len(), 2);
    }
}
