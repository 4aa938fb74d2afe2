pub mod anthropic;
pub mod azure;
pub mod bedrock;
pub mod cohere;
pub mod gemini;
pub mod openai;
pub mod presets;

pub use anthropic::AnthropicClient;
pub use azure::AzureClient;
pub use bedrock::BedrockClient;
pub use cohere::CohereClient;
pub use gemini::GeminiClient;
pub use openai::OpenAiClient;
