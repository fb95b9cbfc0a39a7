//! Application package: the deployable file set.

use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::error::{Result, VespaError};

/// A Vespa schema definition.
#[derive(Debug, Clone)]
pub struct Schema {
    /// Schema name (e.g. `product`).
    pub name: String,
    /// Full content of the `.sd` file.
    pub content: String,
}

impl Schema {
    /// Create a schema; the name and content must be non-empty.
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let content = content.into();
        if name.is_empty() {
            return Err(VespaError::Configuration("schema name cannot be empty".into()));
        }
        if content.is_empty() {
            return Err(VespaError::Configuration("schema content cannot be empty".into()));
        }
        Ok(Self { name, content })
    }
}

/// A Vespa application package: schemas, `services.xml`, and any other
/// configuration files, keyed by their path inside the package.
///
/// New packages start with default `services.xml` and `deployment.xml`
/// contents; add or replace files as needed and serialize with
/// [`ApplicationPackage::to_zip_bytes`] for deployment.
#[derive(Debug, Clone)]
pub struct ApplicationPackage {
    name: String,
    files: BTreeMap<String, Bytes>,
}

impl ApplicationPackage {
    /// Create a package with the given name and default configuration files.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(VespaError::Configuration(
                "application package name cannot be empty".into(),
            ));
        }
        let mut package = Self {
            name,
            files: BTreeMap::new(),
        };
        package.add_file("services.xml", DEFAULT_SERVICES_XML)?;
        package.add_file("deployment.xml", DEFAULT_DEPLOYMENT_XML)?;
        Ok(package)
    }

    /// The package name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a schema under `schemas/<name>.sd`.
    pub fn add_schema(&mut self, schema: &Schema) -> Result<()> {
        self.add_file(format!("schemas/{}.sd", schema.name), schema.content.clone())
    }

    /// Add or replace a file at a path relative to the package root.
    ///
    /// Absolute paths and `..` traversal are rejected.
    pub fn add_file(&mut self, path: impl AsRef<str>, content: impl Into<Bytes>) -> Result<()> {
        let normalized = normalize_path(path.as_ref())?;
        self.files.insert(normalized, content.into());
        Ok(())
    }

    /// Recursively add the contents of a local directory under `destination`
    /// inside the package. Pass `"."` to place them at the package root.
    pub fn add_directory(&mut self, source: impl AsRef<Path>, destination: &str) -> Result<()> {
        let source = source.as_ref();
        if !source.is_dir() {
            return Err(VespaError::Configuration(format!(
                "source directory does not exist or is not a directory: {}",
                source.display()
            )));
        }
        let destination = if destination == "." {
            String::new()
        } else {
            normalize_path(destination)?
        };

        let mut stack = vec![(source.to_path_buf(), destination)];
        while let Some((dir, prefix)) = stack.pop() {
            let entries = std::fs::read_dir(&dir).map_err(|e| {
                VespaError::Configuration(format!("failed to read directory {}: {e}", dir.display()))
            })?;
            for entry in entries {
                let entry = entry.map_err(|e| {
                    VespaError::Configuration(format!("failed to read directory entry: {e}"))
                })?;
                let file_name = entry.file_name().to_string_lossy().to_string();
                let child = if prefix.is_empty() {
                    file_name
                } else {
                    format!("{prefix}/{file_name}")
                };
                let path = entry.path();
                if path.is_dir() {
                    stack.push((path, child));
                } else {
                    let content = std::fs::read(&path).map_err(|e| {
                        VespaError::Configuration(format!(
                            "failed to read file {}: {e}",
                            path.display()
                        ))
                    })?;
                    self.add_file(child, content)?;
                }
            }
        }
        Ok(())
    }

    /// Content of a file in the package, if present.
    pub fn file_content(&self, path: &str) -> Option<&Bytes> {
        let normalized = normalize_path(path).ok()?;
        self.files.get(&normalized)
    }

    /// Paths of all files in the package, in sorted order.
    pub fn file_paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Names of the schemas in the package (files under `schemas/` with a
    /// `.sd` extension).
    pub fn schema_names(&self) -> Vec<String> {
        self.files
            .keys()
            .filter_map(|path| {
                path.strip_prefix("schemas/")?
                    .strip_suffix(".sd")
                    .filter(|name| !name.contains('/'))
                    .map(str::to_string)
            })
            .collect()
    }

    /// Serialize the package as a deployable zip archive. Output is
    /// deterministic: entries are written in sorted path order.
    pub fn to_zip_bytes(&self) -> Result<Bytes> {
        let mut buffer = Cursor::new(Vec::new());
        let mut zip = ZipWriter::new(&mut buffer);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (path, content) in &self.files {
            zip.start_file(path.as_str(), options).map_err(|e| {
                VespaError::Configuration(format!("failed to add {path} to zip archive: {e}"))
            })?;
            zip.write_all(content).map_err(|e| {
                VespaError::Configuration(format!("failed to write {path} to zip archive: {e}"))
            })?;
        }

        zip.finish()
            .map_err(|e| VespaError::Configuration(format!("failed to finalize zip archive: {e}")))?;
        Ok(Bytes::from(buffer.into_inner()))
    }
}

/// Normalize a package-relative path, rejecting absolute paths and traversal.
fn normalize_path(path: &str) -> Result<String> {
    let raw = PathBuf::from(path.replace('\\', "/"));
    let mut parts: Vec<String> = Vec::new();
    for component in raw.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().to_string()),
            Component::CurDir => {}
            _ => {
                return Err(VespaError::Configuration(format!(
                    "invalid relative path: {path}"
                )));
            }
        }
    }
    if parts.is_empty() {
        return Err(VespaError::Configuration(format!("invalid relative path: {path}")));
    }
    Ok(parts.join("/"))
}

const DEFAULT_SERVICES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<services version="1.0" xmlns:deploy="vespa" xmlns:preprocess="properties">
    <container id="default" version="1.0">
        <search/>
        <document-api/>
        <nodes count="1"/>
    </container>
    <content id="default_content" version="1.0">
        <redundancy>1</redundancy>
        <documents>
            <!-- Define document types -->
        </documents>
        <nodes count="1"/>
    </content>
</services>
"#;

const DEFAULT_DEPLOYMENT_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<deployment version="1.0">
    <prod>
        <region active="true">default</region>
    </prod>
</deployment>
"#;
