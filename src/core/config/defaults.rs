use crate::core::config::data::Config;

/// Model used when neither `--model` nor `default_model` is set.
pub const FALLBACK_MODEL: &str = "claude-3-5-sonnet-20240620";

impl Config {
    pub fn effective_model(&self, requested: Option<&str>) -> String {
        requested
            .filter(|model| !model.trim().is_empty())
            .map(str::to_string)
            .or_else(|| self.default_model.clone())
            .unwrap_or_else(|| FALLBACK_MODEL.to_string())
    }

    pub fn set_api_key(&mut self, provider: &str, key: String) {
        self.provider_mut(provider).api_key = Some(key);
    }

    pub fn unset_api_key(&mut self, provider: &str) {
        let normalized = provider.to_lowercase();
        if let Some(entry) = self.providers.get_mut(&normalized) {
            entry.api_key = None;
            if *entry == Default::default() {
                self.providers.remove(&normalized);
            }
        }
    }

    pub fn set_base_url(&mut self, provider: &str, base_url: String) {
        self.provider_mut(provider).base_url = Some(base_url);
    }

    pub fn unset_base_url(&mut self, provider: &str) {
        let normalized = provider.to_lowercase();
        if let Some(entry) = self.providers.get_mut(&normalized) {
            entry.base_url = None;
            if *entry == Default::default() {
                self.providers.remove(&normalized);
            }
        }
    }
}
