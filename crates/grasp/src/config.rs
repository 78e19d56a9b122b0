//! `grasp.toml` loading.

use anyhow::{anyhow, bail, Context, Result};
use grasp_types::{FieldInfo, StructDef, TypeTable};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::OutputFormat;

pub const DEFAULT_CONFIG_FILE: &str = "grasp.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub desugar: DesugarConfig,
    #[serde(default, rename = "struct")]
    pub structs: Vec<StructConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    pub format: Option<OutputFormat>,
    pub color: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DesugarConfig {
    /// Prefix of generated prelude bindings
    pub binding_prefix: Option<String>,
}

/// An aggregate declared outside the fragments.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StructConfig {
    pub name: String,
    /// `"name: Type"` strings, in declaration order
    #[serde(default)]
    pub fields: Vec<String>,
}

impl Config {
    /// Load `path`, or `./grasp.toml` when no path is given. A missing default
    /// file means an empty configuration; a missing explicit one is an error.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let (path, explicit) = match path {
            Some(path) => (path, true),
            None => (Path::new(DEFAULT_CONFIG_FILE), false),
        };
        if !explicit && !path.exists() {
            log::debug!("no {} found, using defaults", DEFAULT_CONFIG_FILE);
            return Ok(Config::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Config::parse(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        log::info!("loaded config {}", path.display());
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Config> {
        let config: Config = toml::from_str(text)?;
        if let Some(prefix) = &config.desugar.binding_prefix {
            if !is_identifier_prefix(prefix) {
                bail!("binding_prefix `{}` is not a valid identifier prefix", prefix);
            }
        }
        Ok(config)
    }

    /// Struct declarations as field metadata.
    pub fn type_table(&self) -> Result<TypeTable> {
        let mut table = TypeTable::new();
        for decl in &self.structs {
            let fields = decl
                .fields
                .iter()
                .map(|field| parse_field(field))
                .collect::<Result<Vec<_>>>()
                .with_context(|| format!("in struct `{}`", decl.name))?;
            table.insert(StructDef::new(decl.name.clone(), fields));
        }
        Ok(table)
    }
}

fn parse_field(text: &str) -> Result<FieldInfo> {
    let (name, ty) = text
        .split_once(':')
        .ok_or_else(|| anyhow!("field `{}` must be written `name: Type`", text))?;
    let name = name.trim();
    if !is_identifier_prefix(name) {
        bail!("`{}` is not a field name", name);
    }
    let ty = grasp_parser::parse_type(ty.trim())
        .map_err(|e| anyhow!("bad type for field `{}`: {}", name, e))?;
    Ok(FieldInfo {
        name: name.to_string(),
        ty,
    })
}

fn is_identifier_prefix(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}
