use std::collections::HashSet;
use std::env;
use std::fs;
use std::time::Duration;

use minijinja::{Environment, UndefinedBehavior};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use crate::communication_channel::AgentId;
use crate::error::ConfigError;
use crate::template::{ResponseContext, ResponseKind};

const SECONDS_IN_MINUTE: u64 = 60;
const AUTO_REPLY_DELAY: u64 = 5 * SECONDS_IN_MINUTE;
const AGENT_REPLY_WINDOW: u64 = 10 * SECONDS_IN_MINUTE;

/// Responses sent by the bot. Each one is a minijinja template rendered
/// against a [`ResponseContext`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Responses {
    pub data_correction: String,
    pub auto_reply: String,
    pub follow_up: String,
    pub completion_ack: String,
    pub staff_alert: String,
}

impl Default for Responses {
    fn default() -> Self {
        Self {
            data_correction: "📌 برجاء مراجعة البيانات التالية بدقة:\n- الاسم الكامل\n- تاريخ الرحلة\n- خط السير\n⚠️ سيتم تحملكم المسؤولية عند وجود أخطاء".to_string(),
            auto_reply: "👌 رسالتك وصلت، وفي موظف هيتابع معاك حالًا إن شاء الله ✨".to_string(),
            follow_up: "⏰ لم يتم الرد حتى الآن.\nسيتم المتابعة قريبًا من أحد ممثلي الخدمة.".to_string(),
            completion_ack: "شكراً لك، تم إيقاف المتابعة. يمكنك التواصل معنا مجدداً عند الحاجة.".to_string(),
            staff_alert: "🚨 تنبيه تأخر رد\n\n🔹 اسم الجروب: {{ group_name }}\n\n📝 الرسالة: \"{{ message }}\"\n\n🕒 وقت الرسالة: {{ received_at }}\n\n⏱ المدة: أكثر من {{ waited_minutes }} دقائق\n\n👉 الرجاء المتابعة العاجلة".to_string(),
        }
    }
}

/// Escalation policy as written by an operator, before validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub trusted_agents: Vec<String>,
    pub staff_channel_name: String,
    pub excluded_conversation_name: String,
    pub brand_pattern: String,
    pub auto_reply_delay_secs: u64,
    pub agent_reply_window_secs: u64,
    pub data_correction_prefix: String,
    pub acknowledgement_emoji: String,
    pub completion_keywords: Vec<String>,
    pub timezone: String,
    pub responses: Responses,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            trusted_agents: vec![],
            staff_channel_name: "خاص بموظفين Eyana".to_string(),
            excluded_conversation_name: "🧳🚢(جروب عام )إيانا تورز سوهاج🧳✈️".to_string(),
            brand_pattern: "إيانا|ايانا|eyana".to_string(),
            auto_reply_delay_secs: AUTO_REPLY_DELAY,
            agent_reply_window_secs: AGENT_REPLY_WINDOW,
            data_correction_prefix: "0*".to_string(),
            acknowledgement_emoji: "👍".to_string(),
            completion_keywords: vec![
                "تمام".to_string(),
                "شكرا".to_string(),
                "خلص".to_string(),
            ],
            timezone: "Africa/Cairo".to_string(),
            responses: Responses::default(),
        }
    }
}

/// Loads the policy: defaults, then `POLICY_FILE` (JSON) if set, then
/// individual environment overrides.
pub fn config_from_env() -> Result<PolicyConfig, ConfigError> {
    let mut config = match env::var("POLICY_FILE") {
        Ok(path) => load_policy_file(&path)?,
        Err(_) => PolicyConfig::default(),
    };
    config.apply_overrides(|key| env::var(key).ok())?;
    Ok(config)
}

fn load_policy_file(path: &str) -> Result<PolicyConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::PolicyFile {
        path: path.to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::PolicyParse {
        path: path.to_string(),
        source,
    })
}

impl PolicyConfig {
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(agents) = lookup("TRUSTED_AGENTS") {
            self.trusted_agents = agents
                .split(',')
                .map(str::trim)
                .filter(|agent| !agent.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(name) = lookup("STAFF_CHANNEL_NAME") {
            self.staff_channel_name = name;
        }
        if let Some(name) = lookup("EXCLUDED_CONVERSATION_NAME") {
            self.excluded_conversation_name = name;
        }
        if let Some(pattern) = lookup("BRAND_PATTERN") {
            self.brand_pattern = pattern;
        }
        if let Some(secs) = lookup("AUTO_REPLY_DELAY_SECS") {
            self.auto_reply_delay_secs = parse_secs("AUTO_REPLY_DELAY_SECS", &secs)?;
        }
        if let Some(secs) = lookup("AGENT_REPLY_WINDOW_SECS") {
            self.agent_reply_window_secs = parse_secs("AGENT_REPLY_WINDOW_SECS", &secs)?;
        }
        if let Some(timezone) = lookup("ESCALATION_TIMEZONE") {
            self.timezone = timezone;
        }
        Ok(())
    }
}

fn parse_secs(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|err| ConfigError::InvalidValue {
        key,
        message: err.to_string(),
    })
}

/// Validated, immutable form of [`PolicyConfig`] used by the engine.
#[derive(Debug)]
pub struct Policy {
    pub trusted_agents: HashSet<AgentId>,
    pub staff_channel_name: String,
    pub excluded_conversation_name: String,
    pub brand_pattern: Regex,
    pub auto_reply_delay: Duration,
    pub agent_reply_window: Duration,
    pub data_correction_prefix: String,
    pub acknowledgement_emoji: String,
    pub completion_keywords: Vec<String>,
    pub timezone: chrono_tz::Tz,
    responses: Responses,
    templates: Environment<'static>,
}

impl Policy {
    pub fn from_config(config: PolicyConfig) -> Result<Self, ConfigError> {
        let brand_pattern = RegexBuilder::new(&config.brand_pattern)
            .case_insensitive(true)
            .build()?;
        let timezone = config
            .timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|err| ConfigError::InvalidValue {
                key: "timezone",
                message: err.to_string(),
            })?;

        let mut templates = Environment::new();
        templates.set_undefined_behavior(UndefinedBehavior::Strict);

        let policy = Self {
            trusted_agents: config
                .trusted_agents
                .iter()
                .map(|agent| AgentId::normalize(agent))
                .filter(|agent| !agent.as_str().is_empty())
                .collect(),
            staff_channel_name: config.staff_channel_name,
            excluded_conversation_name: config.excluded_conversation_name,
            brand_pattern,
            auto_reply_delay: Duration::from_secs(config.auto_reply_delay_secs),
            agent_reply_window: Duration::from_secs(config.agent_reply_window_secs),
            data_correction_prefix: config.data_correction_prefix.trim().to_lowercase(),
            acknowledgement_emoji: config.acknowledgement_emoji,
            completion_keywords: config
                .completion_keywords
                .iter()
                .map(|keyword| keyword.trim().to_lowercase())
                .filter(|keyword| !keyword.is_empty())
                .collect(),
            timezone,
            responses: config.responses,
            templates,
        };

        let sample = ResponseContext::sample();
        for kind in ResponseKind::ALL {
            policy.render(kind, &sample).map_err(|source| ConfigError::Template {
                name: kind.name(),
                source,
            })?;
        }

        Ok(policy)
    }

    pub fn render(&self, kind: ResponseKind, context: &ResponseContext) -> Result<String, minijinja::Error> {
        let source = match kind {
            ResponseKind::DataCorrection => &self.responses.data_correction,
            ResponseKind::AutoReply => &self.responses.auto_reply,
            ResponseKind::FollowUp => &self.responses.follow_up,
            ResponseKind::CompletionAck => &self.responses.completion_ack,
            ResponseKind::StaffAlert => &self.responses.staff_alert,
        };
        self.templates.render_str(source, context)
    }

    pub fn waited_minutes(&self) -> u64 {
        self.auto_reply_delay.as_secs() / SECONDS_IN_MINUTE
    }
}
