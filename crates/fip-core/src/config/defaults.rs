//! Built-in default values.
//!
//! The `Default` impls on each config struct in [`super`] already encode
//! these; this module exists as the single place operators and tests can
//! look up "what do we ship with" without reading every struct.

use super::Config;

/// Render the built-in defaults as a TOML document, for `fip config init`.
pub fn default_toml() -> String {
    toml::to_string_pretty(&Config::default()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_toml_round_trips() {
        let rendered = default_toml();
        let parsed: Config = toml::from_str(&rendered).expect("default toml must parse");
        assert_eq!(parsed.llm.model, Config::default().llm.model);
    }
}
