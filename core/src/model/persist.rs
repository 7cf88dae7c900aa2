//! Saving and loading fitted models.
//!
//! Local files use bincode; the JSON form is what gets uploaded as the
//! `model.json` artifact.

use crate::error::{Error, Result};
use crate::model::forest::ForestModel;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

impl ForestModel {
    /// Write the model to `path` in bincode form
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)
            .map_err(|e| Error::Serialization(format!("{}", e)))?;

        info!("Saved model to {}", path.display());
        Ok(())
    }

    /// Read a model written by [`ForestModel::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let model: ForestModel = bincode::deserialize_from(reader)
            .map_err(|e| Error::Serialization(format!("{}: {}", path.display(), e)))?;

        info!("Loaded model from {}", path.display());
        Ok(model)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(format!("{}", e)))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(format!("{}", e)))
    }
}

#[cfg(test)]
mod tests {
    use crate::dataset::{BundledDataset, FeatureSpec, Table};
    use crate::error::Error;
    use crate::model::{ForestModel, ForestParams};

    #[test]
    fn test_saved_model_predicts_identically() {
        let dataset = BundledDataset::Iris;
        let data = Table::from_csv_bytes(dataset.csv().as_bytes().to_vec())
            .unwrap()
            .select(&FeatureSpec {
                features: dataset.feature_names(),
                target: dataset.target_name().to_string(),
            })
            .unwrap();
        let model = ForestModel::fit(&data, &ForestParams::new(10, 4)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("my_model.bin");
        model.save(&path).unwrap();
        let loaded = ForestModel::load(&path).unwrap();

        assert_eq!(loaded.params(), model.params());
        assert_eq!(loaded.feature_names(), model.feature_names());
        assert_eq!(
            loaded.predict(&data.features).unwrap(),
            model.predict(&data.features).unwrap()
        );

        let from_json = ForestModel::from_json(&model.to_json().unwrap()).unwrap();
        assert_eq!(from_json.class_labels(), model.class_labels());
    }

    #[test]
    fn test_garbage_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.bin");
        std::fs::write(&path, b"not a model").unwrap();
        assert!(matches!(
            ForestModel::load(&path),
            Err(Error::Serialization(_))
        ));
    }
}
