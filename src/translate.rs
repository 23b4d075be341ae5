use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Command;
use std::str::FromStr;
use strum::{Display, EnumString};
use tracing::{debug, info, warn};
use url::Url;

use crate::cue::Cue;
use crate::review::Prompter;

/// Source and target language codes, e.g. `en` -> `pt`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguagePair {
    pub from: String,
    pub to: String,
}

impl LanguagePair {
    pub fn new(from: &str, to: &str) -> Result<Self> {
        let from = from.trim().to_lowercase();
        let to = to.trim().to_lowercase();
        if from.is_empty() || to.is_empty() {
            return Err(anyhow!("Language codes must not be empty"));
        }
        if from == to {
            return Err(anyhow!("Source and target language are both '{}'", from));
        }
        Ok(Self { from, to })
    }

    /// Argos package name for this pair
    pub fn package_name(&self) -> String {
        format!("translate-{}_{}", self.from, self.to)
    }
}

impl fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

impl FromStr for LanguagePair {
    type Err = anyhow::Error;

    /// Parse "en:pt" or "en->pt"
    fn from_str(s: &str) -> Result<Self> {
        let (from, to) = s
            .split_once("->")
            .or_else(|| s.split_once(':'))
            .ok_or_else(|| anyhow!("Expected a language pair like 'en:pt', got '{}'", s))?;
        Self::new(from, to)
    }
}

/// A machine translation engine
pub trait Translator {
    /// Make sure the pair can be translated, installing it if needed.
    ///
    /// Calling this for an already available pair does nothing.
    fn ensure_available(&self, pair: &LanguagePair) -> Result<()>;

    fn translate(&self, text: &str, pair: &LanguagePair) -> Result<String>;
}

/// Translation engine to use
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TranslatorBackend {
    /// Local Argos Translate packages (offline)
    #[default]
    Argos,
    /// A LibreTranslate HTTP server
    LibreTranslate,
}

/// Offline translation with the argos-translate and argospm CLIs
#[derive(Debug, Clone, Default)]
pub struct ArgosTranslator;

impl ArgosTranslator {
    fn installed_packages(&self) -> Result<Vec<String>> {
        let output = Command::new("argospm")
            .arg("list")
            .output()
            .context("Failed to run argospm")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("argospm list failed: {}", stderr.trim()));
        }
        Ok(parse_package_list(&String::from_utf8_lossy(&output.stdout)))
    }

    fn argospm(&self, args: &[&str]) -> Result<()> {
        let output = Command::new("argospm")
            .args(args)
            .output()
            .context("Failed to run argospm")?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(anyhow!("argospm {} failed: {}", args.join(" "), stderr.trim()))
        }
    }
}

/// Package names from `argospm list` output, one per line
fn parse_package_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("translate-"))
        .map(str::to_string)
        .collect()
}

impl Translator for ArgosTranslator {
    fn ensure_available(&self, pair: &LanguagePair) -> Result<()> {
        let package = pair.package_name();
        info!("Checking translation model {}...", pair);

        if self.installed_packages()?.contains(&package) {
            info!("Model already installed");
            return Ok(());
        }

        info!("Downloading and installing translation model {}...", pair);
        self.argospm(&["update"])?;
        self.argospm(&["install", &package]).map_err(|e| {
            anyhow!(
                "Translation model {} is not available ({}): {}",
                pair,
                package,
                e
            )
        })?;

        if !self.installed_packages()?.contains(&package) {
            return Err(anyhow!("Translation model {} could not be installed", pair));
        }
        info!("Model installed successfully");
        Ok(())
    }

    fn translate(&self, text: &str, pair: &LanguagePair) -> Result<String> {
        let output = Command::new("argos-translate")
            .args(["--from-lang", &pair.from])
            .args(["--to-lang", &pair.to])
            .arg(text)
            .output()
            .context("Failed to run argos-translate")?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(anyhow!("argos-translate failed: {}", stderr.trim()))
        }
    }
}

#[derive(Debug, Deserialize)]
struct LibreLanguage {
    code: String,
    #[serde(default)]
    targets: Vec<String>,
}

#[derive(Serialize)]
struct LibreTranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
struct LibreTranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

/// Translation through a LibreTranslate server
#[derive(Debug, Clone)]
pub struct LibreTranslateClient {
    base_url: Url,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
}

impl LibreTranslateClient {
    pub fn new(base_url: &str, api_key: Option<&str>) -> Result<Self> {
        let mut base_url =
            Url::parse(base_url).with_context(|| format!("Invalid LibreTranslate URL '{}'", base_url))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            api_key: api_key.map(str::to_string),
            client: reqwest::blocking::Client::new(),
        })
    }

    fn endpoint(&self, name: &str) -> Result<Url> {
        Ok(self.base_url.join(name)?)
    }
}

/// Whether a `/languages` listing can translate the pair
fn supports_pair(languages: &[LibreLanguage], pair: &LanguagePair) -> bool {
    languages
        .iter()
        .find(|lang| lang.code == pair.from)
        .map(|lang| lang.targets.iter().any(|t| *t == pair.to))
        .unwrap_or(false)
}

impl Translator for LibreTranslateClient {
    fn ensure_available(&self, pair: &LanguagePair) -> Result<()> {
        let languages: Vec<LibreLanguage> = self
            .client
            .get(self.endpoint("languages")?)
            .send()?
            .error_for_status()?
            .json()?;

        if supports_pair(&languages, pair) {
            debug!("LibreTranslate server supports {}", pair);
            Ok(())
        } else {
            Err(anyhow!(
                "LibreTranslate server at {} cannot translate {}",
                self.base_url,
                pair
            ))
        }
    }

    fn translate(&self, text: &str, pair: &LanguagePair) -> Result<String> {
        let request = LibreTranslateRequest {
            q: text,
            source: &pair.from,
            target: &pair.to,
            format: "text",
            api_key: self.api_key.as_deref(),
        };
        let response: LibreTranslateResponse = self
            .client
            .post(self.endpoint("translate")?)
            .json(&request)
            .send()?
            .error_for_status()?
            .json()?;
        Ok(response.translated_text.trim().to_string())
    }
}

/// Translate every cue, keeping index and timing.
///
/// The pair is made available before any cue is touched. With a prompter,
/// each translation is shown for manual correction; an empty answer keeps it.
pub fn translate_cues<T>(
    cues: Vec<Cue>,
    translator: &T,
    pair: &LanguagePair,
    mut editor: Option<&mut (dyn Prompter + '_)>,
) -> Result<Vec<Cue>>
where
    T: Translator + ?Sized,
{
    translator.ensure_available(pair)?;
    info!("Translating {} subtitle(s) {}...", cues.len(), pair);

    let mut translated = Vec::with_capacity(cues.len());
    for mut cue in cues {
        let mut text = translator.translate(&cue.content, pair)?;

        if let Some(prompter) = editor.as_deref_mut() {
            prompter.show(&format!("\nOriginal: {}", cue.content))?;
            prompter.show(&format!("Translated: {}", text))?;
            let answer = prompter.ask("Edit translation? (enter = keep / new text): ")?;
            let answer = answer.trim();
            if !answer.is_empty() {
                text = answer.to_string();
            }
        }

        if text.trim().is_empty() {
            warn!("Cue {} translated to empty text, keeping original", cue.index);
        } else {
            cue.content = text;
        }
        translated.push(cue);
    }

    Ok(translated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::tests::ScriptedPrompter;
    use std::cell::RefCell;
    use std::time::Duration;

    /// Uppercases text; knows only the pairs it was given
    struct FakeTranslator {
        available: Vec<LanguagePair>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeTranslator {
        fn new(available: Vec<LanguagePair>) -> Self {
            Self {
                available,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Translator for FakeTranslator {
        fn ensure_available(&self, pair: &LanguagePair) -> Result<()> {
            if self.available.contains(pair) {
                Ok(())
            } else {
                Err(anyhow!("pair {} not found", pair))
            }
        }

        fn translate(&self, text: &str, _pair: &LanguagePair) -> Result<String> {
            self.calls.borrow_mut().push(text.to_string());
            if text == "silence" {
                return Ok(String::new());
            }
            Ok(text.to_uppercase())
        }
    }

    fn cues() -> Vec<Cue> {
        vec![
            Cue::new(1, Duration::from_millis(0), Duration::from_millis(1500), "hello world"),
            Cue::new(2, Duration::from_millis(1500), Duration::from_millis(2000), "good bye"),
        ]
    }

    fn en_pt() -> LanguagePair {
        LanguagePair::new("en", "pt").unwrap()
    }

    #[test]
    fn test_language_pair_parsing() {
        assert_eq!("en:pt".parse::<LanguagePair>().unwrap(), en_pt());
        assert_eq!(" EN -> pt ".parse::<LanguagePair>().unwrap(), en_pt());
        assert!("en".parse::<LanguagePair>().is_err());
        assert!("en:en".parse::<LanguagePair>().is_err());
        assert!(":pt".parse::<LanguagePair>().is_err());
        assert_eq!(en_pt().package_name(), "translate-en_pt");
    }

    #[test]
    fn test_translation_keeps_index_and_timing() {
        let translator = FakeTranslator::new(vec![en_pt()]);
        let original = cues();
        let translated = translate_cues(original.clone(), &translator, &en_pt(), None).unwrap();

        assert_eq!(translated.len(), original.len());
        for (before, after) in original.iter().zip(&translated) {
            assert_eq!(before.index, after.index);
            assert_eq!(before.start, after.start);
            assert_eq!(before.end, after.end);
        }
        assert_eq!(translated[0].content, "HELLO WORLD");
        assert_eq!(translated[1].content, "GOOD BYE");
    }

    #[test]
    fn test_missing_pair_fails_before_translating() {
        let translator = FakeTranslator::new(Vec::new());
        let result = translate_cues(cues(), &translator, &en_pt(), None);
        assert!(result.is_err());
        assert!(translator.calls.borrow().is_empty());
    }

    #[test]
    fn test_manual_override() {
        let translator = FakeTranslator::new(vec![en_pt()]);
        let mut prompter = ScriptedPrompter::new(&["olá mundo", ""]);
        let translated =
            translate_cues(cues(), &translator, &en_pt(), Some(&mut prompter)).unwrap();

        assert_eq!(translated[0].content, "olá mundo");
        assert_eq!(translated[1].content, "GOOD BYE");
        assert!(prompter.shown.iter().any(|line| line.contains("Original: hello world")));
    }

    #[test]
    fn test_empty_translation_keeps_original() {
        let translator = FakeTranslator::new(vec![en_pt()]);
        let input = vec![Cue::new(
            1,
            Duration::from_millis(0),
            Duration::from_millis(500),
            "silence",
        )];
        let translated = translate_cues(input, &translator, &en_pt(), None).unwrap();
        assert_eq!(translated[0].content, "silence");
    }

    #[test]
    fn test_parse_package_list() {
        let stdout = "translate-en_pt\ntranslate-pt_en\n\nsome noise\n";
        assert_eq!(
            parse_package_list(stdout),
            vec!["translate-en_pt".to_string(), "translate-pt_en".to_string()]
        );
    }

    #[test]
    fn test_supports_pair() {
        let languages: Vec<LibreLanguage> = serde_json::from_str(
            r#"[{"code": "en", "name": "English", "targets": ["pt", "es"]},
                {"code": "pt", "name": "Portuguese", "targets": ["en"]}]"#,
        )
        .unwrap();
        assert!(supports_pair(&languages, &en_pt()));
        assert!(!supports_pair(&languages, &LanguagePair::new("pt", "es").unwrap()));
        assert!(!supports_pair(&languages, &LanguagePair::new("de", "en").unwrap()));
    }

    #[test]
    fn test_libretranslate_url() {
        let client = LibreTranslateClient::new("http://localhost:5000/api", None).unwrap();
        assert_eq!(
            client.endpoint("translate").unwrap().as_str(),
            "http://localhost:5000/api/translate"
        );
        assert!(LibreTranslateClient::new("not a url", None).is_err());
    }
}
