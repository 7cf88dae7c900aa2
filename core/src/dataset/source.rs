//! Dataset sources: remote CSV over HTTP, local CSV files, bundled datasets.

use crate::dataset::table::Table;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info};

/// Datasets compiled into the binary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundledDataset {
    /// Fisher's iris measurements, 150 rows, `species` target
    Iris,
}

impl BundledDataset {
    pub fn csv(&self) -> &'static str {
        match self {
            BundledDataset::Iris => include_str!("iris.csv"),
        }
    }

    /// Feature columns in their conventional order
    pub fn feature_names(&self) -> Vec<String> {
        match self {
            BundledDataset::Iris => [
                "sepal length (cm)",
                "sepal width (cm)",
                "petal length (cm)",
                "petal width (cm)",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }

    pub fn target_name(&self) -> &'static str {
        match self {
            BundledDataset::Iris => "species",
        }
    }
}

/// Where a recipe reads its table from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Url(String),
    File(PathBuf),
    Bundled(BundledDataset),
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Url(url) => write!(f, "{}", url),
            DataSource::File(path) => write!(f, "{}", path.display()),
            DataSource::Bundled(dataset) => write!(f, "bundled:{:?}", dataset),
        }
    }
}

impl DataSource {
    /// Raw CSV bytes for this source
    pub async fn fetch_bytes(&self, client: &reqwest::Client) -> Result<Vec<u8>> {
        match self {
            DataSource::Url(url) => {
                debug!("Downloading dataset from {}", url);
                let response = client.get(url).send().await.map_err(|source| Error::Fetch {
                    url: url.clone(),
                    source,
                })?;

                if !response.status().is_success() {
                    return Err(Error::FetchStatus {
                        url: url.clone(),
                        status: response.status().as_u16(),
                    });
                }

                let bytes = response.bytes().await.map_err(|source| Error::Fetch {
                    url: url.clone(),
                    source,
                })?;
                Ok(bytes.to_vec())
            }
            DataSource::File(path) => Ok(tokio::fs::read(path).await?),
            DataSource::Bundled(dataset) => Ok(dataset.csv().as_bytes().to_vec()),
        }
    }
}

/// Read a data source into a [`Table`]
pub async fn load(source: &DataSource, client: &reqwest::Client) -> Result<Table> {
    let bytes = source.fetch_bytes(client).await?;
    let table = Table::from_csv_bytes(bytes)?;

    info!(
        "Loaded {} rows x {} columns from {}",
        table.height(),
        table.width(),
        source
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bundled_iris_loads() {
        let client = reqwest::Client::new();
        let table = load(&DataSource::Bundled(BundledDataset::Iris), &client)
            .await
            .unwrap();

        assert_eq!(table.height(), 150);
        for name in BundledDataset::Iris.feature_names() {
            assert!(table.has_column(&name), "missing {}", name);
        }
        assert!(table.has_column(BundledDataset::Iris.target_name()));
    }

    #[tokio::test]
    async fn test_local_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.csv");
        std::fs::write(&path, "a,b\n1,2\n3,4\n").unwrap();

        let client = reqwest::Client::new();
        let table = load(&DataSource::File(path), &client).await.unwrap();
        assert_eq!(table.height(), 2);
        assert_eq!(table.column_names(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let client = reqwest::Client::new();
        let err = load(&DataSource::File(PathBuf::from("/nonexistent/x.csv")), &client)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_source_toml_shape() {
        #[derive(Deserialize)]
        struct Holder {
            data: DataSource,
        }

        let holder: Holder = toml::from_str(r#"data = { url = "https://example.org/x.csv" }"#).unwrap();
        assert_eq!(holder.data, DataSource::Url("https://example.org/x.csv".to_string()));

        let holder: Holder = toml::from_str(r#"data = { bundled = "iris" }"#).unwrap();
        assert_eq!(holder.data, DataSource::Bundled(BundledDataset::Iris));
    }
}
