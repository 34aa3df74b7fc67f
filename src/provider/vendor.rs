use serde_json::{Map, Value};

/// Known backend vendors and their request quirks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vendor {
    /// SiliconFlow hosted models
    SiliconFlow,
    /// Alibaba Cloud DashScope, OpenAI-compatible mode
    Alibaba,
    /// Any other chat-completions endpoint
    OpenAiCompatible,
}

impl Vendor {
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "siliconflow" => Self::SiliconFlow,
            "alibaba" | "dashscope" => Self::Alibaba,
            _ => Self::OpenAiCompatible,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::SiliconFlow => "SiliconFlow",
            Self::Alibaba => "Alibaba DashScope",
            Self::OpenAiCompatible => "OpenAI-compatible",
        }
    }

    /// Largest `max_tokens` the vendor accepts, if it enforces one
    pub fn max_tokens_ceiling(&self) -> Option<u32> {
        match self {
            Self::SiliconFlow => Some(16384),
            Self::Alibaba => Some(8192),
            Self::OpenAiCompatible => None,
        }
    }

    /// Request body fields sent unless the provider config overrides them
    pub fn default_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        if let Self::Alibaba = self {
            // Qwen3 models reject non-streaming calls with thinking enabled
            params.insert("enable_thinking".to_string(), Value::Bool(false));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_from_name() {
        assert_eq!(Vendor::from_name("SiliconFlow"), Vendor::SiliconFlow);
        assert_eq!(Vendor::from_name("dashscope"), Vendor::Alibaba);
        assert_eq!(Vendor::from_name("openrouter"), Vendor::OpenAiCompatible);
    }

    #[test]
    fn test_vendor_ceilings_differ() {
        let silicon = Vendor::SiliconFlow.max_tokens_ceiling().unwrap();
        let alibaba = Vendor::Alibaba.max_tokens_ceiling().unwrap();
        assert!(alibaba < silicon);
        assert_eq!(Vendor::OpenAiCompatible.max_tokens_ceiling(), None);
    }

    #[test]
    fn test_alibaba_disables_thinking_by_default() {
        let params = Vendor::Alibaba.default_params();
        assert_eq!(params.get("enable_thinking"), Some(&Value::Bool(false)));
        assert!(Vendor::SiliconFlow.default_params().is_empty());
    }
}
