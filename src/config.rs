//! Configuração do sentinel carregada a partir de `sentinel.toml`.
//!
//! O documento de configuração é mantido como uma árvore JSON genérica
//! ([`Settings`]) acessada por chave de nível superior através de
//! [`ConfigProvider`]. Cada transição lê a sua própria seção e a converte
//! numa struct tipada na inicialização. A struct [`SentinelConfig`] reúne os
//! parâmetros do próprio processo, com defaults sensíveis.
//! A variável de ambiente `SENTINEL_STORE` tem precedência sobre o arquivo.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::SentinelError;

/// Nome do arquivo de configuração procurado no diretório atual.
pub const DEFAULT_CONFIG_FILE: &str = "sentinel.toml";

/// Acesso a valores de configuração por chave de nível superior.
pub trait ConfigProvider: Send + Sync {
    /// Valor associado a `key`, se existir.
    fn get(&self, key: &str) -> Option<Value>;

    /// A árvore completa de configuração.
    fn get_all(&self) -> Value;
}

/// Documento de configuração validado, carregado uma vez na inicialização.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    root: Map<String, Value>,
}

impl Settings {
    /// Cria a configuração a partir de um valor JSON. Valores que não são
    /// objetos resultam numa configuração vazia.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(root) => Self { root },
            _ => Self::default(),
        }
    }

    /// Interpreta um documento TOML.
    pub fn from_toml(contents: &str) -> Result<Self, SentinelError> {
        let value: Value = toml::from_str(contents)?;
        Ok(Self::from_value(value))
    }

    /// Carrega a configuração de `path`, ou de `sentinel.toml` no diretório atual.
    /// Usa uma configuração vazia se o arquivo padrão não existir; um caminho
    /// explícito inexistente é erro.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        let mut settings = if path.exists() || explicit {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Self::from_toml(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            Self::default()
        };

        // Variável de ambiente tem precedência sobre o arquivo para o caminho do store.
        if let Ok(store) = std::env::var("SENTINEL_STORE") {
            if !store.is_empty() {
                settings.root.insert("store_path".into(), Value::String(store));
            }
        }

        Ok(settings)
    }

    /// Parâmetros do próprio processo.
    pub fn sentinel(&self) -> Result<SentinelConfig, SentinelError> {
        section_root(self)
    }
}

impl ConfigProvider for Settings {
    fn get(&self, key: &str) -> Option<Value> {
        self.root.get(key).cloned()
    }

    fn get_all(&self) -> Value {
        Value::Object(self.root.clone())
    }
}

/// Lê a seção `key` de qualquer [`ConfigProvider`] como uma struct tipada.
pub fn section<T>(config: &dyn ConfigProvider, key: &str) -> Result<T, SentinelError>
where
    T: DeserializeOwned + Default,
{
    match config.get(key) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value).map_err(|e| {
            SentinelError::Config(format!("Config section '{key}' is malformed: {e}"))
        }),
    }
}

/// Lê a árvore completa de qualquer [`ConfigProvider`] como uma struct tipada.
pub fn section_root<T>(config: &dyn ConfigProvider) -> Result<T, SentinelError>
where
    T: DeserializeOwned,
{
    serde_json::from_value(config.get_all())
        .map_err(|e| SentinelError::Config(format!("Config is malformed: {e}")))
}

/// Configuração de nível superior do processo.
///
/// Chaves desconhecidas são ignoradas: as seções das transições vivem no
/// mesmo documento.
#[derive(Debug, Clone, Deserialize)]
pub struct SentinelConfig {
    /// Caminho do arquivo JSON com os documentos.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Recusa iniciar se alguma transição habilitada falhar na validação.
    #[serde(default)]
    pub strict_transitions: bool,

    /// Transições habilitadas, por nome. Ausente: todas as transições conhecidas.
    #[serde(default)]
    pub transitions: Option<Map<String, Value>>,
}

// Valor padrão para o caminho do store: "sentinel-docs.json".
fn default_store_path() -> PathBuf {
    PathBuf::from("sentinel-docs.json")
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            strict_transitions: false,
            transitions: None,
        }
    }
}

impl SentinelConfig {
    /// Indica se a transição `name` está habilitada.
    ///
    /// Aceita `name = true/false` ou `name = { disable = true }`.
    pub fn transition_enabled(&self, name: &str) -> bool {
        let Some(table) = &self.transitions else {
            return true;
        };
        match table.get(name) {
            None => false,
            Some(Value::Bool(enabled)) => *enabled,
            Some(Value::Object(entry)) => !entry
                .get("disable")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            Some(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Sample {
        #[serde(default)]
        forms: Vec<String>,
    }

    #[test]
    fn default_config_values() {
        let config = SentinelConfig::default();
        assert_eq!(config.store_path, PathBuf::from("sentinel-docs.json"));
        assert!(!config.strict_transitions);
        assert!(config.transition_enabled("update_contact"));
    }

    #[test]
    fn deserialize_partial_toml() {
        let settings = Settings::from_toml(
            r#"
            strict_transitions = true
            schedule_morning_hours = 9

            [update_contact]
            mark_contact_update_forms = ["vaccination"]
            form_field_name = "fields.vaccination_state"
        "#,
        )
        .unwrap();

        let config = settings.sentinel().unwrap();
        assert!(config.strict_transitions);
        assert_eq!(config.store_path, PathBuf::from("sentinel-docs.json"));

        assert_eq!(settings.get("schedule_morning_hours"), Some(json!(9)));
        assert_eq!(
            settings.get("update_contact"),
            Some(json!({
                "mark_contact_update_forms": ["vaccination"],
                "form_field_name": "fields.vaccination_state"
            }))
        );
        assert_eq!(settings.get("nope"), None);
    }

    #[test]
    fn get_all_returns_whole_tree() {
        let settings = Settings::from_value(json!({"a": {"b": 1}}));
        assert_eq!(settings.get_all(), json!({"a": {"b": 1}}));
    }

    #[test]
    fn section_missing_uses_default() {
        let settings = Settings::default();
        let sample: Sample = section(&settings, "sample").unwrap();
        assert_eq!(sample, Sample::default());
    }

    #[test]
    fn section_malformed_is_config_error() {
        let settings = Settings::from_value(json!({"sample": {"forms": "not-a-list"}}));
        let err = section::<Sample>(&settings, "sample").unwrap_err();
        assert!(matches!(err, SentinelError::Config(_)));
    }

    #[test]
    fn transitions_table_selects_enabled() {
        let settings = Settings::from_toml(
            r#"
            [transitions]
            update_contact = true
            update_sent_forms = { disable = true }
        "#,
        )
        .unwrap();
        let config = settings.sentinel().unwrap();
        assert!(config.transition_enabled("update_contact"));
        assert!(!config.transition_enabled("update_sent_forms"));
        assert!(!config.transition_enabled("unlisted"));
    }

    #[test]
    fn load_falls_back_to_defaults() {
        // No ambiente de teste, tipicamente não há sentinel.toml no diretório de trabalho.
        let settings = Settings::load(None).unwrap();
        assert!(!settings.sentinel().unwrap().strict_transitions);
    }

    #[test]
    fn load_explicit_missing_path_fails() {
        assert!(Settings::load(Some(Path::new("/definitely/not/here.toml"))).is_err());
    }
}
