//! File-backed loaders.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};
use crate::loader::format::{Format, JsonFormat, TomlFormat};
use crate::loader::ConfigurationLoader;
use crate::node::{ConfigNode, ConfigurationOptions};

/// Loads and saves one file in format `F`.
#[derive(Debug, Clone)]
pub struct FileLoader<F> {
    path: PathBuf,
    format: F,
    options: ConfigurationOptions,
}

/// TOML file loader with default options.
pub fn toml(path: impl Into<PathBuf>) -> FileLoader<TomlFormat> {
    FileLoader::new(path, TomlFormat)
}

/// JSON file loader with default options.
pub fn json(path: impl Into<PathBuf>) -> FileLoader<JsonFormat> {
    FileLoader::new(path, JsonFormat)
}

impl<F: Format> FileLoader<F> {
    /// Default options restricted to the format's native scalar kinds.
    pub fn new(path: impl Into<PathBuf>, format: F) -> Self {
        let options = ConfigurationOptions::defaults().with_native_types(format.native_types());
        Self {
            path: path.into(),
            format,
            options,
        }
    }

    pub fn with_options(mut self, options: ConfigurationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> ConfigError {
        ConfigError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn with_header(&self, node: &ConfigNode, body: String) -> String {
        let (Some(header), Some(prefix)) = (node.options().header(), self.format.comment_prefix())
        else {
            return body;
        };
        let mut out = String::new();
        for line in header.lines() {
            out.push_str(prefix);
            if !line.is_empty() {
                out.push(' ');
                out.push_str(line);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&body);
        out
    }

    fn write_atomically(&self, content: &str) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(content.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl<F: Format> ConfigurationLoader for FileLoader<F> {
    fn load_with(&self, options: ConfigurationOptions) -> ConfigResult<ConfigNode> {
        let mut node = ConfigNode::new(options);
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "Configuration file missing, starting empty");
                node.set_empty_map();
                return Ok(node);
            }
            Err(e) => return Err(self.io_error(e)),
        };
        self.format
            .parse(&content, &mut node)
            .map_err(|e| e.with_source_path(&self.path))?;
        tracing::debug!(path = %self.path.display(), format = F::NAME, "Loaded configuration");
        Ok(node)
    }

    fn save(&self, node: &ConfigNode) -> ConfigResult<()> {
        let body = self.format.render(node)?;
        let content = self.with_header(node, body);
        self.write_atomically(&content)
            .map_err(|e| self.io_error(e))?;
        tracing::debug!(path = %self.path.display(), format = F::NAME, "Saved configuration");
        Ok(())
    }

    fn default_options(&self) -> ConfigurationOptions {
        self.options.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;

    #[test]
    fn test_missing_file_is_empty_map() {
        let dir = tempfile::tempdir().unwrap();
        let loader = toml(dir.path().join("absent.toml"));
        let node = loader.load().unwrap();
        assert!(node.is_map());
    }

    #[test]
    fn test_save_and_reload_toml() {
        let dir = tempfile::tempdir().unwrap();
        let loader = toml(dir.path().join("nested/app.toml"));
        let mut node = loader.create_node();
        node.node_mut("port").set::<u16>(8080).unwrap();
        node.node_mut(["db", "url"]).set_value("pg://localhost");
        loader.save(&node).unwrap();

        let mut loaded = loader.load().unwrap();
        assert_eq!(loaded.node_mut("port").get::<u16>().unwrap(), Some(8080));
        assert_eq!(
            loaded.node_mut(["db", "url"]).get::<String>().unwrap().as_deref(),
            Some("pg://localhost")
        );
    }

    #[test]
    fn test_header_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.toml");
        let options = ConfigurationOptions::defaults().with_header(Some("Managed file\n\nEdit freely".into()));
        let loader = toml(&path).with_options(options);
        let mut node = loader.create_node();
        node.node_mut("a").set_value(true);
        loader.save(&node).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# Managed file\n#\n# Edit freely\n\n"), "{text}");
    }

    #[test]
    fn test_parse_error_carries_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ nope").unwrap();
        match json(&path).load() {
            Err(ConfigError::Parsing(e)) => assert_eq!(e.source_path.as_deref(), Some(path.as_path())),
            other => panic!("unexpected {other:?}"),
        }
    }
}
