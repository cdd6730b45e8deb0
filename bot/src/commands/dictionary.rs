//! Guild glossary: `define` stores a definition, `whatis` reads it back.

use super::{usage, Invocation};
use crate::error::EngineError;
use crate::settings::{self, Section};

fn word_key(word: &str) -> String {
    word.to_lowercase()
}

pub(super) async fn define(call: &Invocation<'_>) -> Result<String, EngineError> {
    let tenant = call.tenant;

    match call.args {
        [word] => {
            let key = word_key(word);
            if tenant.entry(Section::Dict, &key).await.is_none() {
                return Err(EngineError::not_found(format!("Definition of '{word}'")));
            }
            settings::set(tenant, Section::Dict, &key, None).await?;
            Ok(format!("Removed definition of {key}"))
        }
        [word, text @ ..] if !text.is_empty() => {
            let key = word_key(word);
            settings::set(tenant, Section::Dict, &key, Some(&text.join(" "))).await?;
            Ok(format!("Defined {key}"))
        }
        _ => Err(usage(call.def)),
    }
}

pub(super) async fn whatis(call: &Invocation<'_>) -> Result<String, EngineError> {
    let tenant = call.tenant;

    match call.args {
        [] => {
            let words = tenant.entries(Section::Dict).await;
            if words.is_empty() {
                return Ok("Nothing has been defined yet".to_string());
            }
            let names: Vec<&str> = words.keys().map(String::as_str).collect();
            Ok(format!("Defined words: {}", names.join(", ")))
        }
        [word] => {
            let key = word_key(word);
            tenant
                .entry(Section::Dict, &key)
                .await
                .map(|text| format!("{key}: {text}"))
                .ok_or_else(|| EngineError::not_found(format!("Definition of '{word}'")))
        }
        _ => Err(usage(call.def)),
    }
}
