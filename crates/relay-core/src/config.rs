use std::{env, fs, path::Path, time::Duration};

use crate::{errors::Error, Result};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

pub const DEFAULT_MEDIA_REPLY: &str = "Si la imagen que acabas de enviar corresponde a un comprobante de pago, por favor, adjuntalo la imagen del comprobante en el siguiente formulario: https://forms.gle/AqY1iVC7XgUrK6y28";

pub const DEFAULT_VOICE_NOTE_REPLY: &str =
    "No puedo reproducir el contenido del audio en este momento, ¿podrías escribir tu consulta?";

/// Typed configuration for the relay bot.
#[derive(Clone, Debug)]
pub struct Config {
    // Messaging
    pub telegram_bot_token: String,
    pub ignore_groups: bool,
    pub typing_enabled: bool,

    // Completion API
    pub openai_api_key: String,
    pub assistant_id: String,
    pub openai_base_url: String,
    pub openai_poll_interval: Duration,
    pub openai_request_timeout: Duration,

    // Canned replies
    pub media_reply: String,
    pub voice_note_reply: String,
}

impl Config {
    /// Load from the process environment, after merging an optional `.env`.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let vars = Vars(&lookup);

        let telegram_bot_token = vars.required("TELEGRAM_BOT_TOKEN")?;
        let openai_api_key = vars.required("OPENAI_API_KEY")?;
        let assistant_id = vars.required("ASSISTANT_ID")?;

        let openai_base_url = vars
            .string("OPENAI_BASE_URL")
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let openai_poll_interval =
            Duration::from_millis(vars.u64("OPENAI_POLL_INTERVAL_MS").unwrap_or(500));
        let openai_request_timeout =
            Duration::from_secs(vars.u64("OPENAI_REQUEST_TIMEOUT_SECS").unwrap_or(60));

        let ignore_groups = vars.bool("IGNORE_GROUPS").unwrap_or(true);
        let typing_enabled = vars.bool("TYPING_ENABLED").unwrap_or(true);

        let media_reply = vars
            .string("MEDIA_REPLY")
            .unwrap_or_else(|| DEFAULT_MEDIA_REPLY.to_string());
        let voice_note_reply = vars
            .string("VOICE_NOTE_REPLY")
            .unwrap_or_else(|| DEFAULT_VOICE_NOTE_REPLY.to_string());

        Ok(Self {
            telegram_bot_token,
            ignore_groups,
            typing_enabled,
            openai_api_key,
            assistant_id,
            openai_base_url,
            openai_poll_interval,
            openai_request_timeout,
            media_reply,
            voice_note_reply,
        })
    }
}

struct Vars<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    /// Trimmed, non-empty value.
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.string(key)
            .ok_or_else(|| Error::Config(format!("{key} environment variable is required")))
    }

    fn bool(&self, key: &str) -> Option<bool> {
        self.string(key)
            .map(|s| matches!(s.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
    }

    fn u64(&self, key: &str) -> Option<u64> {
        self.string(key).and_then(|s| s.parse::<u64>().ok())
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}
