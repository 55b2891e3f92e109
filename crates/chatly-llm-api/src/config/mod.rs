use std::fmt;

/// Default Azure OpenAI REST API version
pub const DEFAULT_API_VERSION: &str = "2024-10-21";

/// Header Azure OpenAI expects the key in
pub const AZURE_API_KEY_HEADER: &str = "api-key";

/// Header OpenAI-compatible services expect the bearer token in
pub const BEARER_AUTH_HEADER: &str = "authorization";

/// Backend flavour for the completion service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    AzureOpenAi,
    OpenAi,
}

impl BackendType {
    /// Parse backend type from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "azure" | "azure-openai" | "azure_openai" | "aoai" => Some(Self::AzureOpenAi),
            "openai" | "open-ai" | "openai-compatible" => Some(Self::OpenAi),
            _ => None,
        }
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        match self {
            Self::AzureOpenAi => "azure",
            Self::OpenAi => "openai",
        }
    }

    /// Name of the header that carries the credential
    pub fn credential_header(&self) -> &'static str {
        match self {
            Self::AzureOpenAi => AZURE_API_KEY_HEADER,
            Self::OpenAi => BEARER_AUTH_HEADER,
        }
    }
}

/// Connection settings for one completion backend
#[derive(Clone)]
pub struct BackendConfig {
    pub backend: BackendType,
    pub endpoint: String,
    pub credential: String,
    pub deployment: String,
    pub api_version: String,
}

// The credential never goes through Debug
impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("backend", &self.backend)
            .field("endpoint", &self.endpoint)
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

impl BackendConfig {
    pub fn new(
        backend: BackendType,
        endpoint: impl Into<String>,
        credential: impl Into<String>,
        deployment: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            endpoint: endpoint.into(),
            credential: credential.into(),
            deployment: deployment.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Full URL of the chat completions operation
    pub fn completions_url(&self) -> String {
        match self.backend {
            BackendType::AzureOpenAi => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                self.endpoint.trim_end_matches('/'),
                self.deployment,
                self.api_version
            ),
            BackendType::OpenAi => normalize_api_url(&self.endpoint),
        }
    }

    /// Header name and value that authenticate a request
    pub fn credential_header(&self) -> (&'static str, String) {
        match self.backend {
            BackendType::AzureOpenAi => (AZURE_API_KEY_HEADER, self.credential.clone()),
            BackendType::OpenAi => (BEARER_AUTH_HEADER, format!("Bearer {}", self.credential)),
        }
    }

    /// Value of the `model` request field; Azure routes by deployment instead
    pub fn model_field(&self) -> Option<String> {
        match self.backend {
            BackendType::AzureOpenAi => None,
            BackendType::OpenAi => Some(self.deployment.clone()),
        }
    }
}

/// Normalize API URL by ensuring it has the correct path for OpenAI-compatible endpoints
pub fn normalize_api_url(url: &str) -> String {
    // If URL already contains the completions path, use it as-is
    if url.contains("/chat/completions") {
        return url.to_string();
    }

    let base = url.trim_end_matches('/');
    if base.ends_with("/v1") {
        format!("{}/chat/completions", base)
    } else {
        format!("{}/v1/chat/completions", base)
    }
}
