//! Request classifier
//!
//! Scores free text against four keyword taxonomies (persona, urgency,
//! complexity, trigger type) and derives a workflow-type label from them.
//! Classification is a pure function of the input and the static tables below.

use crate::models::{
    ClassificationResult, Complexity, Confidence, MatchedKeywords, Persona, TriggerType, Urgency,
    WorkflowType,
};

/// Static keyword tables, zero allocation. Declaration order is the tie-break order.
const PERSONA_KEYWORDS: &[(Persona, &[&str])] = &[
    (
        Persona::Advisor,
        &["advisor", "adviser", "meeting", "client call", "review", "analysis", "recommendation"],
    ),
    (
        Persona::Client,
        &["client", "customer", "my portfolio", "my account", "i want", "help me", "show me"],
    ),
    (
        Persona::Operations,
        &["operations", "ops", "compliance", "trade", "settlement", "processing", "system"],
    ),
];

const URGENCY_KEYWORDS: &[(Urgency, &[&str])] = &[
    (
        Urgency::Critical,
        &["emergency", "urgent", "critical", "immediately", "crisis", "panic", "breaking"],
    ),
    (
        Urgency::High,
        &["important", "priority", "asap", "soon", "today", "now", "significant"],
    ),
    (Urgency::Medium, &["review", "analyze", "update", "check", "moderate"]),
    (Urgency::Low, &["when convenient", "sometime", "eventually", "minor", "optional"]),
];

const COMPLEXITY_KEYWORDS: &[(Complexity, &[&str])] = &[
    (
        Complexity::Simple,
        &["show", "display", "get", "retrieve", "simple", "quick", "basic"],
    ),
    (
        Complexity::Complex,
        &["analyze", "calculate", "assess", "evaluate", "comprehensive", "detailed"],
    ),
    (
        Complexity::MultiStep,
        &["workflow", "process", "sequence", "step by step", "orchestrate", "coordinate"],
    ),
    (
        Complexity::Orchestration,
        &["multiple", "all", "everyone", "coordination", "crisis", "company-wide"],
    ),
];

const TRIGGER_KEYWORDS: &[(TriggerType, &[&str])] = &[
    (
        TriggerType::EventDriven,
        &["threshold", "alert", "trigger", "breach", "exceed", "volatility", "news", "event"],
    ),
    (
        TriggerType::Scheduled,
        &["daily", "weekly", "monthly", "quarterly", "annual", "recurring", "scheduled"],
    ),
    (
        TriggerType::Manual,
        &["request", "please", "can you", "help", "i need", "manual"],
    ),
    (
        TriggerType::Threshold,
        &["above", "below", "over", "under", "limit", "boundary", "range"],
    ),
];

/// Inputs longer than this many tokens lean towards `complex`
const LONG_QUERY_TOKENS: usize = 20;
/// More than this many standalone "and"s lean towards `multi_step`
const CONJUNCTION_LIMIT: usize = 2;

const PERSONA_NORMALIZER: f64 = 3.0;
const DIMENSION_NORMALIZER: f64 = 2.0;

/// The four first-stage labels, as seen by the workflow-type rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Profile {
    pub persona: Persona,
    pub urgency: Urgency,
    pub complexity: Complexity,
    pub trigger_type: TriggerType,
}

/// One entry of the second-stage decision table: the first rule whose keywords
/// appear in the text decides the workflow type.
pub struct TypeRule {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
    pub resolve: fn(&Profile, &str) -> WorkflowType,
}

impl TypeRule {
    pub fn matches(&self, text: &str) -> bool {
        self.keywords.iter().any(|kw| text.contains(kw))
    }
}

/// Second-stage rules in precedence order. Market checks precede portfolio
/// checks and meeting checks precede crisis checks.
pub const WORKFLOW_TYPE_RULES: &[TypeRule] = &[
    TypeRule {
        name: "market",
        keywords: &["market", "volatility", "crash", "s&p", "dow", "nasdaq"],
        resolve: |profile, _| match profile.urgency {
            Urgency::Critical | Urgency::High => WorkflowType::MarketResponse,
            _ => WorkflowType::MarketMonitoring,
        },
    },
    TypeRule {
        name: "onboarding",
        keywords: &["onboarding", "new client"],
        resolve: |_, _| WorkflowType::ClientOnboarding,
    },
    TypeRule {
        name: "meeting",
        keywords: &["meeting", "review"],
        resolve: |_, _| WorkflowType::ClientMeetingPrep,
    },
    TypeRule {
        name: "crisis",
        keywords: &["crisis", "panic", "emergency", "urgent"],
        resolve: |profile, _| match profile.complexity {
            Complexity::MultiStep | Complexity::Orchestration => WorkflowType::MultiPersonaCrisis,
            _ => WorkflowType::CrisisManagement,
        },
    },
    TypeRule {
        name: "portfolio",
        keywords: &["portfolio", "performance", "allocation", "rebalancing"],
        resolve: |profile, _| match profile.trigger_type {
            TriggerType::Scheduled => WorkflowType::PerformanceReporting,
            _ => WorkflowType::PortfolioMonitoring,
        },
    },
    TypeRule {
        name: "compliance",
        keywords: &["compliance", "regulatory"],
        resolve: |profile, _| match profile.trigger_type {
            TriggerType::Scheduled => WorkflowType::ComplianceDeadlines,
            _ => WorkflowType::ContinuousCompliance,
        },
    },
    TypeRule {
        name: "risk",
        keywords: &["risk"],
        resolve: |_, text| {
            if text.contains("breach") || text.contains("exceed") {
                WorkflowType::RiskBreach
            } else {
                WorkflowType::RiskAssessment
            }
        },
    },
    TypeRule {
        name: "reporting",
        keywords: &["report", "daily", "weekly", "monthly", "quarterly"],
        resolve: |_, _| WorkflowType::ReportingCycle,
    },
    TypeRule {
        name: "campaign",
        keywords: &["campaign", "marketing", "outreach", "communication"],
        resolve: |_, _| WorkflowType::CampaignManagement,
    },
    TypeRule {
        name: "transaction",
        keywords: &["trade", "transaction", "buy", "sell", "order"],
        resolve: |_, _| WorkflowType::TransactionProcessing,
    },
];

/// Keyword classifier for incoming requests
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowClassifier;

impl WorkflowClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify free text. Never fails; unmatched input lands on
    /// operations/medium/simple/manual.
    pub fn classify(&self, text: &str) -> ClassificationResult {
        let lowered = text.to_lowercase();

        let persona = pick(&score(&lowered, PERSONA_KEYWORDS))
            .unwrap_or_else(|| persona_fallback(&lowered));

        let urgency = pick(&score(&lowered, URGENCY_KEYWORDS)).unwrap_or(Urgency::Medium);

        let mut complexity_scores = score(&lowered, COMPLEXITY_KEYWORDS);
        if text.split_whitespace().count() > LONG_QUERY_TOKENS {
            bump(&mut complexity_scores, Complexity::Complex);
        }
        if count_word(&lowered, "and") > CONJUNCTION_LIMIT {
            bump(&mut complexity_scores, Complexity::MultiStep);
        }
        let complexity = pick(&complexity_scores).unwrap_or(Complexity::Simple);

        let trigger_type =
            pick(&score(&lowered, TRIGGER_KEYWORDS)).unwrap_or(TriggerType::Manual);

        let profile = Profile {
            persona,
            urgency,
            complexity,
            trigger_type,
        };

        ClassificationResult {
            persona,
            urgency,
            complexity,
            trigger_type,
            workflow_type: determine_workflow_type(&profile, &lowered),
            confidence: confidence(&profile, &lowered),
            matched_keywords: MatchedKeywords {
                persona: matched(&lowered, PERSONA_KEYWORDS),
                urgency: matched(&lowered, URGENCY_KEYWORDS),
                complexity: matched(&lowered, COMPLEXITY_KEYWORDS),
                trigger: matched(&lowered, TRIGGER_KEYWORDS),
            },
            query_length: text.chars().count(),
        }
    }
}

/// Walk the rule table; fall back to a persona-specific support label.
pub fn determine_workflow_type(profile: &Profile, lowered: &str) -> WorkflowType {
    WORKFLOW_TYPE_RULES
        .iter()
        .find(|rule| rule.matches(lowered))
        .map(|rule| (rule.resolve)(profile, lowered))
        .unwrap_or(match profile.persona {
            Persona::Client => WorkflowType::ClientService,
            Persona::Advisor => WorkflowType::AdvisorSupport,
            Persona::Operations => WorkflowType::OperationsSupport,
        })
}

fn score<T: Copy>(text: &str, table: &[(T, &[&str])]) -> Vec<(T, usize)> {
    table
        .iter()
        .map(|(value, keywords)| (*value, keyword_hits(text, keywords)))
        .collect()
}

fn keyword_hits(text: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|kw| text.contains(**kw)).count()
}

fn bump<T: Copy + PartialEq>(scores: &mut [(T, usize)], value: T) {
    if let Some(entry) = scores.iter_mut().find(|(v, _)| *v == value) {
        entry.1 += 1;
    }
}

/// Highest non-zero score; the earliest entry wins ties.
fn pick<T: Copy>(scores: &[(T, usize)]) -> Option<T> {
    let mut best: Option<(T, usize)> = None;
    for &(value, hits) in scores {
        if hits > 0 && best.map_or(true, |(_, top)| hits > top) {
            best = Some((value, hits));
        }
    }
    best.map(|(value, _)| value)
}

fn persona_fallback(lowered: &str) -> Persona {
    if count_word(lowered, "my") > 0 || count_word(lowered, "i") > 0 || lowered.contains("help me")
    {
        Persona::Client
    } else {
        Persona::Operations
    }
}

fn count_word(lowered: &str, word: &str) -> usize {
    lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| *token == word)
        .count()
}

fn keywords_for<T: Copy + PartialEq>(table: &[(T, &'static [&'static str])], value: T) -> &'static [&'static str] {
    table
        .iter()
        .find(|(v, _)| *v == value)
        .map(|(_, keywords)| *keywords)
        .unwrap_or(&[])
}

fn confidence(profile: &Profile, lowered: &str) -> Confidence {
    let ratio = |hits: usize, normalizer: f64| (hits as f64 / normalizer).min(1.0);

    let persona = ratio(
        keyword_hits(lowered, keywords_for(PERSONA_KEYWORDS, profile.persona)),
        PERSONA_NORMALIZER,
    );
    let urgency = ratio(
        keyword_hits(lowered, keywords_for(URGENCY_KEYWORDS, profile.urgency)),
        DIMENSION_NORMALIZER,
    );
    let complexity = ratio(
        keyword_hits(lowered, keywords_for(COMPLEXITY_KEYWORDS, profile.complexity)),
        DIMENSION_NORMALIZER,
    );
    let trigger_type = ratio(
        keyword_hits(lowered, keywords_for(TRIGGER_KEYWORDS, profile.trigger_type)),
        DIMENSION_NORMALIZER,
    );

    Confidence {
        overall: round3((persona + urgency + complexity + trigger_type) / 4.0),
        persona: round3(persona),
        urgency: round3(urgency),
        complexity: round3(complexity),
        trigger_type: round3(trigger_type),
    }
}

fn matched<T>(lowered: &str, table: &[(T, &[&str])]) -> Vec<String> {
    table
        .iter()
        .flat_map(|(_, keywords)| keywords.iter())
        .filter(|kw| lowered.contains(**kw))
        .map(|kw| kw.to_string())
        .collect()
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
