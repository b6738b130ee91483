//! `banter score`: engagement breakdown for one message.

use std::path::Path;

use banter_config::AppConfig;
use banter_core::channel::{Author, ChannelLocation, ChatMessage};
use banter_core::metrics::NoMetrics;
use banter_engagement::{AgentIdentity, EngagementContext, EngagementDecision, EngagementScorer};

use super::load_config;

/// Stand-in agent ID when the config leaves `agent.user_id` empty.
const CLI_AGENT_ID: &str = "banter-cli";

pub async fn run(
    config_path: Option<&Path>,
    text: &str,
    dm: bool,
    mention: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let decision = score(&config, text, dm, mention).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
    } else {
        print_decision(&decision);
    }
    Ok(())
}

async fn score(config: &AppConfig, text: &str, dm: bool, mention: bool) -> EngagementDecision {
    let mut agent_config = config.agent.clone();
    if agent_config.user_id.is_empty() {
        agent_config.user_id = CLI_AGENT_ID.into();
    }
    let agent = AgentIdentity::from_config(&agent_config);

    let location = if dm {
        ChannelLocation::dm("cli")
    } else {
        ChannelLocation::guild("cli", "cli")
    };
    let message = ChatMessage {
        id: "cli".into(),
        author: Author {
            id: "cli-user".into(),
            name: "you".into(),
            is_bot: false,
        },
        location,
        content: text.into(),
        mentions: if mention {
            vec![agent.user_id.clone()]
        } else {
            vec![]
        },
        reply_to: None,
        timestamp: chrono::Utc::now(),
    };

    let context = EngagementContext::new(&message, &[], &NoMetrics, &agent);
    let (weights, preferences) = config
        .engagement
        .effective_for(message.channel_key().as_str());
    EngagementScorer::default()
        .decide(&context, &weights, &preferences)
        .await
}

fn print_decision(decision: &EngagementDecision) {
    let verdict = if decision.engage { "✅ engage" } else { "⏸  stay quiet" };
    println!("🎯 Score {:.3}: {verdict}", decision.score);
    println!("   {}", decision.reason);
    println!();
    println!("{:<18} {:>7} {:>7} {:>13}", "Signal", "Value", "Weight", "Contribution");
    println!("{:<18} {:>7} {:>7} {:>13}", "──────", "─────", "──────", "────────────");
    for c in &decision.breakdown {
        println!(
            "{:<18} {:>7.3} {:>7.3} {:>13.3}",
            c.signal, c.value, c.weight, c.contribution
        );
    }
    if !decision.reasons.is_empty() {
        println!();
        for reason in &decision.reasons {
            println!("   • {reason}");
        }
    }
}
