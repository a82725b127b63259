//! Localized user-facing strings.
//!
//! Templates use `{name}` placeholders. Unknown keys render as `_key_` so a
//! missing translation is visible without breaking the caller.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

pub const DEFAULT_LANGUAGE: &str = "en";

const EN: &[(&str, &str)] = &[
    ("status_starting", "Starting download..."),
    ("status_accelerated", "Accelerated download with {count} connections"),
    ("status_unsupported", "Server does not support ranges, using a single connection"),
    ("status_normal", "Downloading with a single connection"),
    ("status_completed", "Download complete"),
    ("status_cancelled", "Download cancelled"),
    ("status_error", "Download failed"),
    ("status_file_error", "File error"),
    ("error_title", "Error"),
    ("error_url", "Invalid URL"),
    ("error_url_msg", "The URL '{url}' is not a valid http(s) address."),
    ("error_download", "Download error"),
    ("error_download_msg", "The download could not be completed: {error}"),
    ("error_file", "File error"),
    ("error_file_msg", "The file could not be written: {error}"),
    ("error_unknown_msg", "An unexpected error occurred: {error}"),
];

const PT_BR: &[(&str, &str)] = &[
    ("status_starting", "Iniciando download..."),
    ("status_accelerated", "Download acelerado com {count} conexões"),
    ("status_unsupported", "O servidor não suporta intervalos, usando uma conexão"),
    ("status_normal", "Baixando com uma conexão"),
    ("status_completed", "Download concluído"),
    ("status_cancelled", "Download cancelado"),
    ("status_error", "Falha no download"),
    ("status_file_error", "Erro de arquivo"),
    ("error_title", "Erro"),
    ("error_url", "URL inválida"),
    ("error_url_msg", "A URL '{url}' não é um endereço http(s) válido."),
    ("error_download", "Erro de download"),
    ("error_download_msg", "Não foi possível concluir o download: {error}"),
    ("error_file", "Erro de arquivo"),
    ("error_file_msg", "Não foi possível gravar o arquivo: {error}"),
    ("error_unknown_msg", "Ocorreu um erro inesperado: {error}"),
];

#[derive(Debug, Clone)]
pub struct Localizer {
    languages: HashMap<String, HashMap<String, String>>,
    current: String,
}

impl Localizer {
    /// Builds a localizer from the built-in tables.
    pub fn new(language: &str) -> Self {
        let mut languages = HashMap::new();
        languages.insert("en".to_string(), table(EN));
        languages.insert("pt_BR".to_string(), table(PT_BR));

        let mut localizer = Self {
            languages,
            current: DEFAULT_LANGUAGE.to_string(),
        };
        localizer.set_language(language);
        localizer
    }

    /// Merges every `<code>.json` file in `dir` over the built-in tables.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        let mut loaded = 0;
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read language directory {:?}", dir))?;

        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(code) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {:?}", path))?;
            let strings: HashMap<String, String> = serde_json::from_str(&content)
                .with_context(|| format!("Invalid language file {:?}", path))?;

            debug!(language = code, keys = strings.len(), "loaded language file");
            self.languages
                .entry(code.to_string())
                .or_default()
                .extend(strings);
            loaded += 1;
        }
        Ok(loaded)
    }

    pub fn set_language(&mut self, code: &str) {
        if self.languages.contains_key(code) {
            self.current = code.to_string();
        } else {
            warn!(language = code, "unknown language, falling back to {}", DEFAULT_LANGUAGE);
            self.current = DEFAULT_LANGUAGE.to_string();
        }
    }

    pub fn language(&self) -> &str {
        &self.current
    }

    pub fn available_languages(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.languages.keys().cloned().collect();
        codes.sort();
        codes
    }

    pub fn get(&self, key: &str) -> String {
        self.format(key, &[])
    }

    pub fn format(&self, key: &str, args: &[(&str, &str)]) -> String {
        let Some(template) = self
            .languages
            .get(&self.current)
            .and_then(|strings| strings.get(key))
        else {
            return format!("_{}_", key);
        };

        args.iter().fold(template.clone(), |acc, (name, value)| {
            acc.replace(&format!("{{{}}}", name), value)
        })
    }
}

impl Default for Localizer {
    fn default() -> Self {
        Self::new(DEFAULT_LANGUAGE)
    }
}

fn table(entries: &[(&str, &str)]) -> HashMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_filled() {
        let strings = Localizer::new("en");
        assert_eq!(
            strings.format("status_accelerated", &[("count", "8")]),
            "Accelerated download with 8 connections"
        );
    }

    #[test]
    fn unknown_key_and_language() {
        let strings = Localizer::new("xx_YY");
        assert_eq!(strings.language(), "en");
        assert_eq!(strings.get("no_such_key"), "_no_such_key_");
    }

    #[test]
    fn builtin_tables_share_keys() {
        let en: Vec<&str> = EN.iter().map(|(k, _)| *k).collect();
        let pt: Vec<&str> = PT_BR.iter().map(|(k, _)| *k).collect();
        assert_eq!(en, pt);
    }

    #[test]
    fn language_files_extend_tables() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("de.json"),
            r#"{"status_cancelled": "Download abgebrochen"}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut strings = Localizer::new("en");
        assert_eq!(strings.load_dir(dir.path()).unwrap(), 1);
        strings.set_language("de");
        assert_eq!(strings.get("status_cancelled"), "Download abgebrochen");
        assert_eq!(strings.available_languages(), vec!["de", "en", "pt_BR"]);
    }
}
