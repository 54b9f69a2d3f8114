//! Description-document loader for the `.mdap/` directory structure.
//!
//! This module loads the documents an execution needs from disk:
//! - `agents/*.md`: agent definitions with YAML front matter
//! - `pipelines/*.yaml`: pipeline descriptions
//! - `strategies/*`: named strategy text blobs referenced via
//!   `strategy: { file: <name> }`

use gray_matter::engine::YAML;
use gray_matter::Matter;
use mdap_protocol::agent_models::AgentSpec;
use mdap_protocol::pipeline_models::MdapPipeline;
use std::path::Path;
use walkdir::WalkDir;

use crate::config::error::{ConfigError, ConfigResult};

/// Everything loaded from an `.mdap/` directory.
#[derive(Debug, Default)]
pub struct WorkspaceDocs {
    /// Agent definitions from `agents/*.md`.
    pub agents: Vec<AgentSpec>,

    /// Named strategy blobs from `strategies/*`, keyed by file stem.
    pub strategies: Vec<(String, String)>,

    /// Pipeline descriptions from `pipelines/*.yaml`.
    pub pipelines: Vec<MdapPipeline>,
}

/// Loads all description documents from the `.mdap/` directory under `root`.
///
/// Missing directories (or a missing `.mdap/` altogether) yield empty sets
/// rather than an error; files that exist but cannot be read or parsed fail
/// with a `ConfigError` carrying the offending path.
pub fn load_docs(root: &Path) -> ConfigResult<WorkspaceDocs> {
    let mdap_dir = root.join(".mdap");

    if !mdap_dir.exists() {
        return Ok(WorkspaceDocs::default());
    }

    Ok(WorkspaceDocs {
        agents: load_agents(&mdap_dir)?,
        strategies: load_strategies(&mdap_dir)?,
        pipelines: load_pipelines(&mdap_dir)?,
    })
}

/// Loads all agent definitions from `agents/*.md`.
fn load_agents(mdap_dir: &Path) -> ConfigResult<Vec<AgentSpec>> {
    let agents_dir = mdap_dir.join("agents");

    if !agents_dir.exists() {
        return Ok(Vec::new());
    }

    let mut agents = Vec::new();

    for entry in WalkDir::new(&agents_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|source| ConfigError::DirectoryWalk {
            path: agents_dir.clone(),
            source,
        })?;

        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("md") {
            continue;
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        // Front matter carries the metadata, the body carries the
        // instruction text.
        let matter = Matter::<YAML>::new();
        let parsed = matter.parse(&content);

        let mut agent: AgentSpec = parsed
            .data
            .ok_or_else(|| ConfigError::MarkdownParse {
                path: path.to_path_buf(),
                reason: "Missing YAML front matter".to_string(),
            })?
            .deserialize()
            .map_err(|e| ConfigError::MarkdownParse {
                path: path.to_path_buf(),
                reason: format!("Failed to deserialize front matter: {}", e),
            })?;

        agent.instruction = parsed.content.trim().to_string();

        agents.push(agent);
    }

    Ok(agents)
}

/// Loads named strategy blobs from `strategies/*`.
fn load_strategies(mdap_dir: &Path) -> ConfigResult<Vec<(String, String)>> {
    let strategies_dir = mdap_dir.join("strategies");

    if !strategies_dir.exists() {
        return Ok(Vec::new());
    }

    let mut strategies = Vec::new();

    for entry in WalkDir::new(&strategies_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|source| ConfigError::DirectoryWalk {
            path: strategies_dir.clone(),
            source,
        })?;

        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        strategies.push((name.to_string(), content.trim_end().to_string()));
    }

    Ok(strategies)
}

/// Loads all pipeline descriptions from `pipelines/*.yaml`.
fn load_pipelines(mdap_dir: &Path) -> ConfigResult<Vec<MdapPipeline>> {
    let pipelines_dir = mdap_dir.join("pipelines");

    if !pipelines_dir.exists() {
        return Ok(Vec::new());
    }

    let mut pipelines = Vec::new();

    for entry in WalkDir::new(&pipelines_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|source| ConfigError::DirectoryWalk {
            path: pipelines_dir.clone(),
            source,
        })?;

        let path = entry.path();
        let ext = path.extension().and_then(|s| s.to_str());
        if ext != Some("yaml") && ext != Some("yml") {
            continue;
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let pipeline: MdapPipeline =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::YamlParse {
                path: path.to_path_buf(),
                source,
            })?;

        pipelines.push(pipeline);
    }

    Ok(pipelines)
}
