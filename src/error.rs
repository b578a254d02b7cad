use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::Stage;

/// Failures talking to a text or video generation service.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Failed to serialize request: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Request to {endpoint} failed: {source}")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    #[error("Response contained no completion choices")]
    NoChoices,

    #[error("Response contained no video locator")]
    EmptyLocator,

    #[error("Failed to download {url}: {message}")]
    Transfer { url: String, message: String },

    #[error("Failed to write {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The generated script could not be turned into an idea and scenes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("No 'Idea:' line found in generated content")]
    MissingIdea,

    #[error("No 'Scene N:' lines found in generated content")]
    NoScenes,
}

/// Failures of the external concatenation tool.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("No input segments to concatenate")]
    NoInputs,

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}\nstdout: {stdout}\nstderr: {stderr}")]
    Failed {
        program: String,
        status: String,
        stdout: String,
        stderr: String,
    },
}

/// Failures publishing to a single destination.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("No uploader registered for platform '{0}'")]
    UnknownPlatform(String),

    #[error("{platform} upload requires {credential}, which is not configured")]
    MissingCredential {
        platform: &'static str,
        credential: &'static str,
    },

    #[error("Failed to read video {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{platform} upload failed: {source}")]
    Upload {
        platform: &'static str,
        #[source]
        source: ServiceError,
    },
}

/// Invalid or missing settings detected before the pipeline starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// A fatal failure that ends the run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Idea generation failed: {0}")]
    IdeaRequest(#[source] ServiceError),

    #[error("Could not parse generated script: {0}")]
    Parse(#[from] ParseError),

    #[error("No detailed prompts were generated for {attempted} scenes")]
    NoPrompts { attempted: usize },

    #[error("No video segments were generated for {attempted} prompts")]
    NoSegments { attempted: usize },

    #[error("Concatenation failed: {0}")]
    Concatenation(#[from] ToolError),

    #[error("{context}: {source}")]
    Resource {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// The last stage the run completed before failing.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::IdeaRequest(_) | PipelineError::Parse(_) => Stage::Init,
            PipelineError::Resource { .. } => Stage::IdeaGenerated,
            PipelineError::NoPrompts { .. } => Stage::IdeaGenerated,
            PipelineError::NoSegments { .. } => Stage::PromptsGenerated,
            PipelineError::Concatenation(_) => Stage::SegmentsGenerated,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
