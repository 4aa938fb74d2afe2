pub mod providers;
pub mod retry;
pub mod streaming;

use osa_core::config::ModelConfig;
use osa_core::traits::LlmClient;

pub use providers::anthropic::AnthropicClient;
pub use providers::azure::AzureClient;
pub use providers::bedrock::BedrockClient;
pub use providers::cohere::CohereClient;
pub use providers::gemini::GeminiClient;
pub use providers::openai::OpenAiClient;
pub use retry::RetryingClient;

/// Create an LLM client based on the provider name.
///
/// Supports 16 providers:
/// - `anthropic` / `claude` — Anthropic Messages API
/// - `gemini` — Google Gemini native API
/// - `azure` — Azure OpenAI (api-key header, deployment URL)
/// - `bedrock` — AWS Bedrock (stub, v0.3.0)
/// - `cohere` — Cohere v2 Chat API
/// - `openai` — OpenAI (default fallback)
/// - 10 preset providers (OpenAI-compatible): ollama, groq, openrouter,
///   together, fireworks, cerebras, xai, mistral, perplexity, deepseek
pub fn create_client(config: &ModelConfig) -> Box<dyn LlmClient> {
    match config.provider.as_str() {
        "anthropic" | "claude" => Box::new(AnthropicClient::new()),
        "gemini" | "google" => Box::new(GeminiClient::new()),
        "azure" | "azure-openai" => Box::new(AzureClient::new()),
        "bedrock" | "aws-bedrock" | "aws" => Box::new(BedrockClient::new()),
        "cohere" => Box::new(CohereClient::new()),
        // Everything else uses the OpenAI-compatible client.
        // For known presets, apply default base_url and extra headers
        // via the config's extra_headers and base_url fields (set during
        // config loading or init).
        _ => Box::new(OpenAiClient::new()),
    }
}

/// Per-million-token (input, output) USD rates for known models, used to
/// estimate the cost of a completed LLM call. Unknown model ids fall back
/// to a conservative flat rate rather than reporting zero cost.
fn per_million_rates(model_id: &str) -> (f64, f64) {
    if model_id.contains("opus") {
        (15.0, 75.0)
    } else if model_id.contains("sonnet") {
        (3.0, 15.0)
    } else if model_id.contains("haiku") {
        (0.80, 4.0)
    } else if model_id.contains("gpt-4o-mini") {
        (0.15, 0.60)
    } else if model_id.contains("gpt-4o") || model_id.contains("gpt-4") {
        (2.50, 10.0)
    } else if model_id.contains("gemini-1.5-pro") || model_id.contains("gemini-2") {
        (1.25, 5.0)
    } else if model_id.contains("gemini") {
        (0.075, 0.30)
    } else {
        (1.0, 3.0)
    }
}

/// Estimate the USD cost of a completed LLM call from its token usage.
pub fn estimate_cost_usd(model_id: &str, input_tokens: u64, output_tokens: u64) -> f64 {
    let (input_rate, output_rate) = per_million_rates(model_id);
    (input_tokens as f64 / 1_000_000.0) * input_rate
        + (output_tokens as f64 / 1_000_000.0) * output_rate
}

/// Resolve preset defaults into a ModelConfig, filling in base_url and
/// extra_headers if not already set by the user.
pub fn apply_preset_defaults(config: &mut ModelConfig) {
    if let Some(preset) = providers::presets::get_preset(&config.provider) {
        // Fill base_url if not set
        if config.base_url.is_none() {
            config.base_url = Some(preset.default_base_url.to_string());
        }

        // Merge preset headers (user headers take precedence)
        let merged = providers::presets::build_extra_headers(&preset, &config.extra_headers);
        config.extra_headers = merged.into_iter().collect();
    }
}
