use super::{Config, ConfigLayer};

pub fn merge_layers(user: Option<ConfigLayer>, project: Option<ConfigLayer>) -> Config {
    let mut config = Config::default();
    if let Some(layer) = user {
        layer.apply_to(&mut config);
    }
    if let Some(layer) = project {
        layer.apply_to(&mut config);
    }
    config
}

/// Applies `ARBOLADO_*` variables from the process environment.
pub fn apply_env_overrides(config: &mut Config) {
    apply_env_overrides_from(config, |key| std::env::var(key).ok());
}

/// Applies `ARBOLADO_*` variables read through `lookup`.
pub fn apply_env_overrides_from<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup("ARBOLADO_GEOCODER_URL") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            config.geocoding.endpoint = trimmed.trim_end_matches('/').to_string();
        }
    }

    if let Some(raw) = lookup("ARBOLADO_GEOCODING_DISABLED") {
        match raw.trim() {
            "" | "0" | "false" => {}
            "1" | "true" => config.geocoding.enabled = false,
            other => {
                tracing::warn!("invalid ARBOLADO_GEOCODING_DISABLED `{other}`, ignoring");
            }
        }
    }
}
