use callscreen_core::NumberNormalizer;

/// Rewrites national caller-ID numbers into E.164 form
#[derive(Debug, Clone)]
pub struct E164Normalizer {
    country_code: String,
    trunk_prefix: String,
}

impl E164Normalizer {
    pub fn new(country_code: impl Into<String>, trunk_prefix: impl Into<String>) -> Self {
        Self {
            country_code: country_code.into(),
            trunk_prefix: trunk_prefix.into(),
        }
    }
}

impl NumberNormalizer for E164Normalizer {
    fn normalize(&self, raw: &str) -> String {
        let mut value: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '+').collect();
        if value.is_empty() || value.starts_with('+') {
            return value;
        }

        if !self.trunk_prefix.is_empty() {
            if let Some(rest) = value.strip_prefix(self.trunk_prefix.as_str()) {
                value = rest.to_string();
            }
        }

        if !self.country_code.is_empty() && !value.starts_with(self.country_code.as_str()) {
            format!("+{}{}", self.country_code, value)
        } else {
            format!("+{}", value)
        }
    }
}
