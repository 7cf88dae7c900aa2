//! Logged model layout
//!
//! A logged model is a directory under the run's artifacts holding an
//! `MLmodel` descriptor, the serialized model, and optionally an input
//! example in pandas "split" orientation.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MLMODEL_FILE: &str = "MLmodel";
pub const INPUT_EXAMPLE_FILE: &str = "input_example.json";

/// One column of a model signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    #[serde(rename = "type")]
    pub dtype: String,
    pub name: String,
    #[serde(default = "required")]
    pub required: bool,
}

fn required() -> bool {
    true
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, dtype: impl Into<String>) -> Self {
        Self {
            dtype: dtype.into(),
            name: name.into(),
            required: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModelSignature {
    pub inputs: Vec<ColumnSpec>,
    pub outputs: Vec<ColumnSpec>,
}

/// Sample rows stored next to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputExample {
    pub columns: Vec<String>,
    pub data: Vec<Vec<f64>>,
}

/// A serialized model ready to be logged
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    /// Flavor key in the `MLmodel` descriptor
    pub flavor: String,
    /// Extra entries of the flavor section
    pub flavor_config: BTreeMap<String, String>,
    /// File name of the serialized model inside the model directory
    pub model_file: String,
    pub model_bytes: Vec<u8>,
    pub signature: Option<ModelSignature>,
    pub input_example: Option<InputExample>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignatureDoc {
    /// JSON-encoded column list
    pub inputs: String,
    pub outputs: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InputExampleInfo {
    pub artifact_path: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub pandas_orient: String,
}

/// The `MLmodel` YAML document
#[derive(Debug, Serialize, Deserialize)]
pub struct MlModelDoc {
    pub artifact_path: String,
    pub flavors: BTreeMap<String, BTreeMap<String, String>>,
    pub model_uuid: String,
    pub run_id: String,
    pub utc_time_created: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_input_example_info: Option<InputExampleInfo>,
}

impl ModelArtifact {
    /// Build the descriptor for this model logged under `artifact_path` of `run_id`
    pub fn descriptor(
        &self,
        run_id: &str,
        artifact_path: &str,
        model_uuid: &str,
        created: DateTime<Utc>,
    ) -> Result<MlModelDoc> {
        let mut flavor = self.flavor_config.clone();
        flavor.insert("model_data".to_string(), self.model_file.clone());

        let signature = match &self.signature {
            Some(sig) => Some(SignatureDoc {
                inputs: serde_json::to_string(&sig.inputs)?,
                outputs: serde_json::to_string(&sig.outputs)?,
            }),
            None => None,
        };

        Ok(MlModelDoc {
            artifact_path: artifact_path.to_string(),
            flavors: BTreeMap::from([(self.flavor.clone(), flavor)]),
            model_uuid: model_uuid.to_string(),
            run_id: run_id.to_string(),
            utc_time_created: created.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
            signature,
            saved_input_example_info: self.input_example.as_ref().map(|_| InputExampleInfo {
                artifact_path: INPUT_EXAMPLE_FILE.to_string(),
                kind: "dataframe".to_string(),
                pandas_orient: "split".to_string(),
            }),
        })
    }

    /// `(relative path, contents)` for every file of the model directory
    pub fn files(&self, descriptor: &MlModelDoc) -> Result<Vec<(String, Vec<u8>)>> {
        let mut files = vec![
            (
                MLMODEL_FILE.to_string(),
                serde_yaml::to_string(descriptor)?.into_bytes(),
            ),
            (self.model_file.clone(), self.model_bytes.clone()),
        ];
        if let Some(example) = &self.input_example {
            files.push((
                INPUT_EXAMPLE_FILE.to_string(),
                serde_json::to_vec(example)?,
            ));
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact() -> ModelArtifact {
        ModelArtifact {
            flavor: "smartcore".to_string(),
            flavor_config: BTreeMap::from([(
                "estimator".to_string(),
                "RandomForestClassifier".to_string(),
            )]),
            model_file: "model.json".to_string(),
            model_bytes: b"{}".to_vec(),
            signature: Some(ModelSignature {
                inputs: vec![ColumnSpec::new("HP", "double")],
                outputs: vec![ColumnSpec::new("Legendary", "string")],
            }),
            input_example: Some(InputExample {
                columns: vec!["HP".to_string()],
                data: vec![vec![45.0], vec![90.0]],
            }),
        }
    }

    #[test]
    fn test_descriptor_contents() {
        let created = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let doc = artifact()
            .descriptor("run1", "model", "uuid-1", created)
            .unwrap();

        assert_eq!(doc.flavors["smartcore"]["model_data"], "model.json");
        assert_eq!(doc.flavors["smartcore"]["estimator"], "RandomForestClassifier");
        assert_eq!(doc.utc_time_created, "2024-05-01 12:00:00.000000");
        let inputs: Vec<ColumnSpec> =
            serde_json::from_str(&doc.signature.as_ref().unwrap().inputs).unwrap();
        assert_eq!(inputs[0].name, "HP");
        assert_eq!(
            doc.saved_input_example_info.as_ref().unwrap().pandas_orient,
            "split"
        );
    }

    #[test]
    fn test_model_files() {
        let artifact = artifact();
        let doc = artifact
            .descriptor("run1", "model", "uuid-1", Utc::now())
            .unwrap();
        let files = artifact.files(&doc).unwrap();
        let names: Vec<&str> = files.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["MLmodel", "model.json", "input_example.json"]);

        let yaml = String::from_utf8(files[0].1.clone()).unwrap();
        assert!(yaml.contains("run_id: run1"));
        let example: serde_json::Value = serde_json::from_slice(&files[2].1).unwrap();
        assert_eq!(example["columns"][0], "HP");
        assert_eq!(example["data"][1][0], 90.0);
    }
}
