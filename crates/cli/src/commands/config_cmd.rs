//! `banter config`: configuration management commands.

use std::path::{Path, PathBuf};

use banter_config::AppConfig;

use super::load_config;

pub fn validate(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match load_config(path) {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let warnings = advisories(&config);
            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Provider:   {}", config.provider);
            println!("   Model:      {}", config.model);
            println!("   Agent:      {}", config.agent.all_names().join(", "));
            println!(
                "   Catch-up:   after {} messages ({} when named)",
                config.activity.catchup_after_messages,
                config.activity.catchup_if_mentioned_after_messages
            );
            println!(
                "   Threshold:  {:.2}",
                config.engagement.preferences.min_engage_threshold
            );
            println!("   Overrides:  {}", config.engagement.channel_overrides.len());
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

/// Settings that load fine but will make the agent behave oddly.
fn advisories(config: &AppConfig) -> Vec<&'static str> {
    let mut warnings = Vec::new();

    if config.api_key.is_none() {
        warnings.push("No API key set (set BANTER_API_KEY, OPENROUTER_API_KEY or OPENAI_API_KEY)");
    }

    if config.agent.user_id.is_empty() {
        warnings.push("agent.user_id is empty: @mentions and replies will never trigger");
    }

    if config.activity.catchup_if_mentioned_after_messages > config.activity.catchup_after_messages {
        warnings.push("catchup_if_mentioned_after_messages exceeds catchup_after_messages");
    }

    if config.bot_interaction.max_back_and_forth == 0 {
        warnings.push("max_back_and_forth = 0: every reply from another bot starts a cooldown");
    }

    warnings
}

pub fn show(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(path).map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub fn path(path: Option<&Path>) {
    println!("{}", resolve(path).display());
}

pub fn init(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = resolve(path);

    if config_path.exists() {
        println!("⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete it and re-run `banter config init`.");
        return Ok(());
    }

    if let Some(dir) = config_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Created config.toml at: {}", config_path.display());
    println!("\n📝 Next steps:");
    println!("   1. Set agent.user_id to the bot's platform user ID");
    println!("   2. Add an API key, or export OPENROUTER_API_KEY");
    println!("   3. Run: banter replay <transcript.jsonl>");
    Ok(())
}

fn resolve(path: Option<&Path>) -> PathBuf {
    path.map_or_else(AppConfig::config_path, Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_path_is_config_toml() {
        let path = resolve(None);
        assert!(path.to_str().unwrap().ends_with("config.toml"));
    }

    #[test]
    fn init_writes_a_loadable_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        init(Some(&path)).unwrap();
        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.model, AppConfig::default().model);

        std::fs::write(&path, "model = \"custom\"\n").unwrap();
        init(Some(&path)).unwrap();
        let kept = std::fs::read_to_string(&path).unwrap();
        assert!(kept.contains("custom"));
    }

    #[test]
    fn advisories_flag_missing_identity() {
        let config = AppConfig::default();
        let warnings = advisories(&config);
        assert!(warnings.iter().any(|w| w.contains("user_id")));

        let mut configured = AppConfig::default();
        configured.api_key = Some("sk-test".into());
        configured.agent.user_id = "123".into();
        assert!(advisories(&configured).is_empty());
    }
}
