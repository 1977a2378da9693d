//! Versioned prompt composition: a policy contract plus a versioned answer
//! template, both markdown files with a frontmatter header. Formatting
//! replaces only the `{context}` and `{query}` tokens; anything else in the
//! template survives verbatim.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{info, warn};

use crate::config::PromptsConfig;
use crate::error::{CoreError, CoreResult};

pub const TOKEN_CONTEXT: &str = "{context}";
pub const TOKEN_QUERY: &str = "{query}";

const POLICY_DIR: &str = "policy";
const RAG_ANSWER_DIR: &str = "rag_answer";
const FALLBACK_VERSION: &str = "v1";

fn version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^v\d+$").expect("static regex"))
}

fn frontmatter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\A---\s*\n(.*?)\n---\s*\n").expect("static regex"))
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PromptMetadata {
    pub kind: String,
    pub version: String,
    pub lang: String,
    pub description: String,
    pub inputs: Vec<String>,
}

/// Parse the YAML-ish frontmatter block, returning metadata and the body.
/// Files without frontmatter yield default metadata and the full content.
pub fn parse_frontmatter(content: &str) -> (PromptMetadata, String) {
    let Some(captures) = frontmatter_re().captures(content) else {
        return (PromptMetadata::default(), content.to_string());
    };

    let yaml_block = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
    let body = content[captures.get(0).map(|m| m.end()).unwrap_or(0)..].to_string();

    let mut metadata = PromptMetadata::default();
    let mut current_key = String::new();

    for line in yaml_block.lines() {
        let line = line.trim_end();
        if line.is_empty() || line.trim_start().starts_with('#') {
            continue;
        }

        if line.trim_start().starts_with("- ") {
            if current_key == "inputs" {
                metadata
                    .inputs
                    .push(line.trim_start()[2..].trim().to_string());
            }
            continue;
        }

        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            let value = value.trim().trim_matches('"').trim_matches('\'');
            current_key = key.to_string();
            match key {
                "type" => metadata.kind = value.to_string(),
                "version" => metadata.version = value.to_string(),
                "lang" => metadata.lang = value.to_string(),
                "description" => metadata.description = value.to_string(),
                _ => {}
            }
        }
    }

    (metadata, body)
}

pub struct PromptComposer {
    version: String,
    lang: String,
    prompts_dir: PathBuf,
    policy_file: String,
    composed: OnceLock<String>,
    template_meta: OnceLock<PromptMetadata>,
}

impl PromptComposer {
    pub fn new(
        prompts_dir: impl Into<PathBuf>,
        version: &str,
        lang: &str,
        policy_file: &str,
    ) -> CoreResult<Self> {
        let version = version.trim();
        if !version_re().is_match(version) {
            return Err(CoreError::validation(format!(
                "Invalid prompt version '{version}'. Expected v1, v2, ..."
            )));
        }
        Ok(Self {
            version: version.to_string(),
            lang: lang.to_string(),
            prompts_dir: prompts_dir.into(),
            policy_file: policy_file.to_string(),
            composed: OnceLock::new(),
            template_meta: OnceLock::new(),
        })
    }

    pub fn from_config(config: &PromptsConfig) -> CoreResult<Self> {
        Self::new(
            &config.dir,
            &config.prompt_version,
            &config.lang,
            &config.policy_file,
        )
    }

    /// Composed prompt (policy + blank line + version template), cached per
    /// instance after the first successful load.
    pub fn template(&self) -> CoreResult<String> {
        if let Some(composed) = self.composed.get() {
            return Ok(composed.clone());
        }
        let composed = self.compose()?;
        Ok(self.composed.get_or_init(|| composed).clone())
    }

    /// Template metadata, available after the first `template()` call.
    pub fn metadata(&self) -> Option<&PromptMetadata> {
        self.template_meta.get()
    }

    /// Safe formatting: only `{context}` and `{query}` are replaced.
    pub fn format(&self, context: &str, query: &str) -> CoreResult<String> {
        let template = self.template()?;

        if !template.contains(TOKEN_CONTEXT) || !template.contains(TOKEN_QUERY) {
            return Err(CoreError::service_unavailable(
                "PromptTemplates",
                format!(
                    "Template {} is missing required {TOKEN_CONTEXT}/{TOKEN_QUERY} tokens",
                    self.version
                ),
            ));
        }

        Ok(template
            .replace(TOKEN_CONTEXT, context)
            .replace(TOKEN_QUERY, query))
    }

    fn compose(&self) -> CoreResult<String> {
        let policy = self.load_policy()?;
        let (template_body, meta) = self.load_template()?;
        let _ = self.template_meta.set(meta);
        Ok(format!("{}\n\n{}", policy.trim_end(), template_body.trim_start()))
    }

    fn policy_path(&self) -> PathBuf {
        self.prompts_dir.join(POLICY_DIR).join(&self.policy_file)
    }

    fn template_path(&self, version: &str) -> PathBuf {
        self.prompts_dir
            .join(RAG_ANSWER_DIR)
            .join(format!("{}_{}.md", version, self.lang))
    }

    fn load_policy(&self) -> CoreResult<String> {
        let path = self.policy_path();
        let content = read_prompt_file(&path)?;
        let (_, body) = parse_frontmatter(&content);
        info!(path = %path.display(), chars = body.len(), "loaded policy contract");
        Ok(body)
    }

    /// The configured version, falling back to v1 when its file is absent.
    fn load_template(&self) -> CoreResult<(String, PromptMetadata)> {
        let primary = self.template_path(&self.version);
        match read_prompt_file(&primary) {
            Ok(content) => {
                let (meta, body) = parse_frontmatter(&content);
                return Ok((body, meta));
            }
            Err(error) if self.version == FALLBACK_VERSION => return Err(error),
            Err(_) => {
                warn!(
                    version = %self.version,
                    "prompt template missing, falling back to v1"
                );
            }
        }

        let fallback = self.template_path(FALLBACK_VERSION);
        let content = read_prompt_file(&fallback)?;
        let (meta, body) = parse_frontmatter(&content);
        Ok((body, meta))
    }
}

fn read_prompt_file(path: &Path) -> CoreResult<String> {
    std::fs::read_to_string(path).map_err(|e| {
        CoreError::service_unavailable(
            "PromptTemplates",
            format!("Cannot read prompt file {}: {e}", path.display()),
        )
    })
}
