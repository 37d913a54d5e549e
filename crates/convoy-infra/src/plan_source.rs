//! File-backed delivery plan.
//!
//! Each run reads its inputs fresh from the configuration directory:
//!
//! | File                | Content                                       |
//! |---------------------|-----------------------------------------------|
//! | `credentials.txt`   | one credential blob per line (`//`, `#` skip) |
//! | `conversation.txt`  | numeric conversation id                       |
//! | `messages.txt`      | message templates, one per line               |
//! | `first_names.txt`   | first-name pool (may be empty)                |
//! | `last_names.txt`    | last-name pool (may be empty)                 |
//! | `delay.txt`         | seconds between ticks (optional, default 10)  |

use std::path::{Path, PathBuf};

use convoy_core::plan::PlanSource;
use convoy_types::credential::{ConversationId, Credential};
use convoy_types::error::ConfigError;
use convoy_types::plan::{DeliveryPlan, NameLists, DEFAULT_DELAY_SECS};

pub const CREDENTIALS_FILE: &str = "credentials.txt";
pub const CONVERSATION_FILE: &str = "conversation.txt";
pub const MESSAGES_FILE: &str = "messages.txt";
pub const FIRST_NAMES_FILE: &str = "first_names.txt";
pub const LAST_NAMES_FILE: &str = "last_names.txt";
pub const DELAY_FILE: &str = "delay.txt";

/// Loads [`DeliveryPlan`]s from a configuration directory.
#[derive(Debug, Clone)]
pub struct FilePlanSource {
    dir: PathBuf,
}

impl FilePlanSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl PlanSource for FilePlanSource {
    async fn load(&self) -> Result<DeliveryPlan, ConfigError> {
        load_plan(&self.dir).await
    }
}

/// Read and validate every delivery file in `dir`.
///
/// Fails fast on the first missing required file or rule violation.
pub async fn load_plan(dir: &Path) -> Result<DeliveryPlan, ConfigError> {
    let credentials: Vec<Credential> = credential_lines(&read_required(dir, CREDENTIALS_FILE).await?)
        .into_iter()
        .enumerate()
        .map(|(index, blob)| Credential::new(index, blob))
        .collect();
    if credentials.is_empty() {
        return Err(ConfigError::NoCredentials);
    }

    let conversation_id: ConversationId = read_required(dir, CONVERSATION_FILE).await?.parse()?;

    let templates = lines(&read_required(dir, MESSAGES_FILE).await?);
    if templates.is_empty() {
        return Err(ConfigError::NoTemplates);
    }

    let names = NameLists {
        first: lines(&read_required(dir, FIRST_NAMES_FILE).await?),
        last: lines(&read_required(dir, LAST_NAMES_FILE).await?),
    };

    let delay_secs = match read_optional(dir, DELAY_FILE).await? {
        Some(content) => parse_delay(&content),
        None => {
            tracing::debug!("No {DELAY_FILE} found, using {DEFAULT_DELAY_SECS}s");
            DEFAULT_DELAY_SECS
        }
    };

    tracing::info!(
        conversation = %conversation_id,
        credentials = credentials.len(),
        templates = templates.len(),
        delay_secs,
        "Delivery files loaded"
    );

    Ok(DeliveryPlan {
        credentials,
        conversation_id,
        templates,
        names,
        delay_secs,
    })
}

async fn read_optional(dir: &Path, file: &str) -> Result<Option<String>, ConfigError> {
    match tokio::fs::read_to_string(dir.join(file)).await {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(ConfigError::Unreadable {
            file: file.to_string(),
            message: err.to_string(),
        }),
    }
}

async fn read_required(dir: &Path, file: &str) -> Result<String, ConfigError> {
    read_optional(dir, file)
        .await?
        .ok_or_else(|| ConfigError::MissingFile {
            file: file.to_string(),
        })
}

/// Trimmed, non-blank lines.
fn lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

fn credential_lines(content: &str) -> Vec<String> {
    lines(content)
        .into_iter()
        .filter(|line| !line.starts_with("//") && !line.starts_with('#'))
        .collect()
}

/// Leading integer of `content`; anything unusable (or zero) falls back to the default.
fn parse_delay(content: &str) -> u64 {
    let trimmed = content.trim();
    let digits = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .map_or(trimmed, |end| &trimmed[..end]);
    match digits.parse::<u64>() {
        Ok(secs) if secs > 0 => secs,
        _ => {
            tracing::warn!(content = trimmed, "Unusable delay, using {DEFAULT_DELAY_SECS}s");
            DEFAULT_DELAY_SECS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write(dir: &Path, file: &str, content: &str) {
        tokio::fs::write(dir.join(file), content).await.unwrap();
    }

    async fn valid_dir() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        write(dir, CREDENTIALS_FILE, "// primary\nblob-a\n\n# spare\n  blob-b  \n").await;
        write(dir, CONVERSATION_FILE, " 1234567890\n").await;
        write(dir, MESSAGES_FILE, "hello\n\n  world  \n").await;
        write(dir, FIRST_NAMES_FILE, "Ada\nGrace\n").await;
        write(dir, LAST_NAMES_FILE, "").await;
        write(dir, DELAY_FILE, "15\n").await;
        tmp
    }

    #[tokio::test]
    async fn load_plan_parses_every_file() {
        let tmp = valid_dir().await;
        let plan = FilePlanSource::new(tmp.path()).load().await.unwrap();

        let blobs: Vec<&str> = plan.credentials.iter().map(|c| c.expose()).collect();
        assert_eq!(blobs, vec!["blob-a", "blob-b"]);
        assert_eq!(plan.credentials[1].index(), 1);
        assert_eq!(plan.conversation_id.as_str(), "1234567890");
        assert_eq!(plan.templates, vec!["hello", "world"]);
        assert_eq!(plan.names.first, vec!["Ada", "Grace"]);
        assert!(plan.names.last.is_empty());
        assert_eq!(plan.delay_secs, 15);
    }

    #[tokio::test]
    async fn load_plan_only_comments_is_no_credentials() {
        let tmp = valid_dir().await;
        write(tmp.path(), CREDENTIALS_FILE, "// nothing here\n# or here\n\n").await;

        let err = load_plan(tmp.path()).await.unwrap_err();
        assert_eq!(err, ConfigError::NoCredentials);
    }

    #[tokio::test]
    async fn load_plan_rejects_non_numeric_conversation() {
        let tmp = valid_dir().await;
        write(tmp.path(), CONVERSATION_FILE, "group-42").await;

        let err = load_plan(tmp.path()).await.unwrap_err();
        assert!(matches!(err, ConfigError::NonNumericConversation(_)));
    }

    #[tokio::test]
    async fn load_plan_requires_name_files() {
        let tmp = valid_dir().await;
        tokio::fs::remove_file(tmp.path().join(LAST_NAMES_FILE)).await.unwrap();

        let err = load_plan(tmp.path()).await.unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingFile {
                file: LAST_NAMES_FILE.to_string()
            }
        );
    }

    #[tokio::test]
    async fn load_plan_empty_messages_is_error() {
        let tmp = valid_dir().await;
        write(tmp.path(), MESSAGES_FILE, "\n   \n").await;

        assert_eq!(load_plan(tmp.path()).await.unwrap_err(), ConfigError::NoTemplates);
    }

    #[tokio::test]
    async fn load_plan_missing_delay_uses_default() {
        let tmp = valid_dir().await;
        tokio::fs::remove_file(tmp.path().join(DELAY_FILE)).await.unwrap();

        let plan = load_plan(tmp.path()).await.unwrap();
        assert_eq!(plan.delay_secs, DEFAULT_DELAY_SECS);
    }

    #[tokio::test]
    async fn load_plan_missing_directory_reports_credentials_file() {
        let tmp = TempDir::new().unwrap();
        let err = load_plan(&tmp.path().join("absent")).await.unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingFile {
                file: CREDENTIALS_FILE.to_string()
            }
        );
    }

    #[test]
    fn parse_delay_falls_back_on_garbage() {
        assert_eq!(parse_delay("30"), 30);
        assert_eq!(parse_delay(" 15s\n"), 15);
        assert_eq!(parse_delay("0"), DEFAULT_DELAY_SECS);
        assert_eq!(parse_delay(""), DEFAULT_DELAY_SECS);
        assert_eq!(parse_delay("soon"), DEFAULT_DELAY_SECS);
        assert_eq!(parse_delay("-5"), DEFAULT_DELAY_SECS);
    }
}
