use std::env;
use tracing::Level;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) stage: String,
    pub(crate) component: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OpsAlertConfig {
    pub(crate) webhook_url: Url,
    pub(crate) min_level: Level,
}

#[derive(Debug, Clone)]
pub(crate) struct ObservabilityConfig {
    pub(crate) service_context: ServiceContext,
    pub(crate) ops_alert: Option<OpsAlertConfig>,
    /// Problems found while reading the environment, logged once tracing is up.
    pub(crate) warnings: Vec<String>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        Self::from_lookup(component, |key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(component: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let component = component.trim().to_string();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let service_context = ServiceContext {
            service_name: non_empty("SERVICE_NAME").unwrap_or_else(|| component.clone()),
            stage: non_empty("STAGE").unwrap_or_else(|| "local".to_string()),
            component,
        };

        let mut warnings = Vec::new();

        let webhook_url = match non_empty("OPS_ALERT_WEBHOOK_URL") {
            None => None,
            Some(raw) => match Url::parse(raw.trim()) {
                Ok(url) => Some(url),
                Err(err) => {
                    // The URL embeds a secret, so only the parse error is reported.
                    warnings.push(format!(
                        "OPS_ALERT_WEBHOOK_URL is invalid; ops alerts disabled ({err})"
                    ));
                    None
                }
            },
        };

        let ops_alert = webhook_url.map(|webhook_url| {
            let min_level = match non_empty("OPS_ALERT_LEVEL") {
                None => Level::ERROR,
                Some(raw) => parse_level(&raw).unwrap_or_else(|| {
                    warnings.push(format!(
                        "OPS_ALERT_LEVEL `{raw}` is not a level; using ERROR"
                    ));
                    Level::ERROR
                }),
            };

            OpsAlertConfig {
                webhook_url,
                min_level,
            }
        });

        Self {
            service_context,
            ops_alert,
            warnings,
        }
    }
}

fn parse_level(input: &str) -> Option<Level> {
    match input.trim().to_ascii_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> ObservabilityConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ObservabilityConfig::from_lookup("backend", |key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config_with(&[]);

        assert_eq!(config.service_context.service_name, "backend");
        assert_eq!(config.service_context.stage, "local");
        assert!(config.ops_alert.is_none());
        assert!(config.warnings.is_empty());
    }

    #[test]
    fn ops_alerts_default_to_error_level() {
        let config = config_with(&[("OPS_ALERT_WEBHOOK_URL", "https://hooks.example.com/abc")]);

        let ops_alert = config.ops_alert.unwrap();
        assert_eq!(ops_alert.min_level, Level::ERROR);
    }

    #[test]
    fn ops_alert_level_is_parsed() {
        let config = config_with(&[
            ("OPS_ALERT_WEBHOOK_URL", "https://hooks.example.com/abc"),
            ("OPS_ALERT_LEVEL", "Warning"),
        ]);

        assert_eq!(config.ops_alert.unwrap().min_level, Level::WARN);
    }

    #[test]
    fn bad_values_become_warnings() {
        let config = config_with(&[
            ("OPS_ALERT_WEBHOOK_URL", "https://hooks.example.com/abc"),
            ("OPS_ALERT_LEVEL", "loud"),
        ]);
        assert_eq!(config.ops_alert.unwrap().min_level, Level::ERROR);
        assert_eq!(config.warnings.len(), 1);

        let config = config_with(&[("OPS_ALERT_WEBHOOK_URL", "not a url")]);
        assert!(config.ops_alert.is_none());
        assert_eq!(config.warnings.len(), 1);
        assert!(!config.warnings[0].contains("not a url"));
    }
}
