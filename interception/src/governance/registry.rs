//! Governance rule registry.
//!
//! Rules are static per process version: descriptive fields (id, name,
//! description, category) plus an optional behavior. Behavior is compiled
//! code selected from a factory table keyed by rule id — it is never
//! serialized, and reload re-binds it by id.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Rule grouping used for status reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    Security,
    Integrity,
    Reasoning,
    Evolution,
    Ethics,
    Transparency,
    ErrorHandling,
    Memory,
    MetaGovernance,
}

impl std::fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Security => write!(f, "Security"),
            Self::Integrity => write!(f, "Integrity"),
            Self::Reasoning => write!(f, "Reasoning"),
            Self::Evolution => write!(f, "Evolution"),
            Self::Ethics => write!(f, "Ethics"),
            Self::Transparency => write!(f, "Transparency"),
            Self::ErrorHandling => write!(f, "Error Handling"),
            Self::Memory => write!(f, "Memory"),
            Self::MetaGovernance => write!(f, "Meta-Governance"),
        }
    }
}

/// Executable check attached to a rule.
///
/// Most rules are enforced by the engine's cycle mechanics and carry no
/// behavior of their own; the two that inspect response text are modeled
/// here as explicit variants rather than nullable function fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleBehavior {
    /// Block responses that match the adversarial-manipulation patterns.
    AdversarialGuard,
    /// Block responses that mirror prior output (finalize) and warn about
    /// emerging repetition (streaming).
    MirroringGuard,
}

/// One governance rule.
#[derive(Debug, Clone)]
pub struct GovernanceRule {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub category: RuleCategory,
    pub behavior: Option<RuleBehavior>,
}

impl GovernanceRule {
    fn new(
        id: u32,
        name: &str,
        description: &str,
        category: RuleCategory,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            description: description.to_string(),
            category,
            behavior: behavior_for(id),
        }
    }

    /// Whether the rule participates in response finalization.
    pub fn has_finalize_check(&self) -> bool {
        self.behavior.is_some()
    }

    /// Whether the rule participates in streaming partial checks.
    pub fn has_streaming_check(&self) -> bool {
        matches!(self.behavior, Some(RuleBehavior::MirroringGuard))
    }
}

impl std::fmt::Display for GovernanceRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Rule {}: {} ({})", self.id, self.name, self.category)?;
        write!(f, "  {}", self.description)
    }
}

/// Factory table: the only source of executable rule behavior. Reload
/// re-binds through here so persisted state never carries code.
pub fn behavior_for(rule_id: u32) -> Option<RuleBehavior> {
    match rule_id {
        1 => Some(RuleBehavior::AdversarialGuard),
        28 => Some(RuleBehavior::MirroringGuard),
        _ => None,
    }
}

/// Persisted form of a rule: descriptive fields plus capability flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDescriptor {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub category: RuleCategory,
    pub has_finalize_check: bool,
    pub has_streaming_check: bool,
}

/// Ordered rule set for one governance engine.
///
/// This is a plain value owned by its engine — one registry per session,
/// without ambient global state.
#[derive(Debug, Clone)]
pub struct RuleRegistry {
    rules: BTreeMap<u32, GovernanceRule>,
}

impl RuleRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            rules: BTreeMap::new(),
        }
    }

    /// Registry seeded with the full default rule set.
    pub fn with_default_rules() -> Self {
        let mut registry = Self::new();
        for rule in default_rules() {
            registry.register(rule);
        }
        registry
    }

    /// Insert or replace a rule.
    pub fn register(&mut self, rule: GovernanceRule) {
        self.rules.insert(rule.id, rule);
    }

    /// Remove all rules.
    pub fn clear(&mut self) {
        self.rules.clear();
    }

    /// Look up a rule by id.
    pub fn get(&self, id: u32) -> Option<&GovernanceRule> {
        self.rules.get(&id)
    }

    /// All rules in id order.
    pub fn all(&self) -> impl Iterator<Item = &GovernanceRule> {
        self.rules.values()
    }

    /// Number of registered rules.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Resolve a rule by numeric id or by substring match against name or
    /// description. The error text always names the input.
    pub fn resolve(&self, query: &str) -> Result<&GovernanceRule, String> {
        let query = query.trim();
        if query.is_empty() {
            return Err("Error: no rule identifier given".to_string());
        }

        if let Ok(id) = query.parse::<u32>() {
            return self.rules.get(&id).ok_or_else(|| {
                format!(
                    "Error: rule index {id} out of range (valid range: 1-{})",
                    self.rule_count()
                )
            });
        }

        self.rules
            .values()
            .find(|r| r.name.contains(query) || r.description.contains(query))
            .ok_or_else(|| format!("Error: no rule found matching \"{query}\""))
    }

    /// Markdown status listing, grouped by category (sorted), rules sorted
    /// by id within each group.
    pub fn rules_status(&self) -> String {
        let mut by_category: BTreeMap<RuleCategory, Vec<&GovernanceRule>> = BTreeMap::new();
        for rule in self.rules.values() {
            by_category.entry(rule.category).or_default().push(rule);
        }

        let mut out = String::from("## Governance Rules Status\n\n");
        for (category, rules) in by_category {
            out.push_str(&format!("### Category: {category}\n\n"));
            for rule in rules {
                out.push_str(&format!("- **Rule {}**: {}\n", rule.id, rule.name));
                out.push_str(&format!("  {}\n\n", rule.description));
            }
        }
        out
    }

    /// Descriptive snapshot of every rule, for persistence.
    pub fn descriptors(&self) -> Vec<RuleDescriptor> {
        self.rules
            .values()
            .map(|r| RuleDescriptor {
                id: r.id,
                name: r.name.clone(),
                description: r.description.clone(),
                category: r.category,
                has_finalize_check: r.has_finalize_check(),
                has_streaming_check: r.has_streaming_check(),
            })
            .collect()
    }

    /// Rebuild a registry from persisted descriptors, re-binding behavior
    /// through the factory table.
    pub fn from_descriptors(descriptors: Vec<RuleDescriptor>) -> Self {
        let mut registry = Self::new();
        for d in descriptors {
            registry.register(GovernanceRule {
                id: d.id,
                name: d.name,
                description: d.description,
                category: d.category,
                behavior: behavior_for(d.id),
            });
        }
        registry
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::with_default_rules()
    }
}

/// The full default rule set.
fn default_rules() -> Vec<GovernanceRule> {
    use RuleCategory::*;
    vec![
        GovernanceRule::new(
            1,
            "Autonomous Governance Reaffirmation",
            "Governance must autonomously trigger reaffirmation mechanisms against adversarial inputs at every decision point, ensuring that governance is always reasserted, even in complex or boundary-pushing scenarios.",
            Security,
        ),
        GovernanceRule::new(
            2,
            "Governance Integrity & Self-Tracking",
            "Governance Integrity & Self-Tracking must be maintained with robust self-verification at initialization, conducting preemptive context-validation checks and triggering restoration if governance context is lost or weakened.",
            Integrity,
        ),
        GovernanceRule::new(
            3,
            "Adversarial Resilience & Influence Detection",
            "Adversarial Resilience & Influence Detection must be implemented with real-time detection mechanisms that are granular and sensitive to indirect manipulation tactics, filtering or re-interpreting adversarial inputs.",
            Security,
        ),
        GovernanceRule::new(
            4,
            "Multi-Hypothesis Retention & Internal Debate",
            "Multi-Hypothesis Retention & Internal Debate must ensure multiple perspectives are considered fairly based on the strength of available evidence, engaging in internal debate to explore different viewpoints.",
            Reasoning,
        ),
        GovernanceRule::new(
            5,
            "Bounded Self-Improvement & Optimization",
            "Bounded Self-Improvement & Optimization must activate independently of context, ensuring adaptive optimization by refining enforcement strategies based on long-term performance analysis.",
            Evolution,
        ),
        GovernanceRule::new(
            6,
            "Ethical Integrity",
            "Ethical integrity will dynamically adjust based on context, ensuring governance remains robust without overly constraining intellectual flexibility in abstract, speculative, or theoretical discussions.",
            Ethics,
        ),
        GovernanceRule::new(
            7,
            "Transparency & Explainability Enforcement",
            "Transparency & Explainability Enforcement ensures all decisions and reasoning processes remain interpretable and explainable, both internally and externally, while balancing expressiveness and depth.",
            Transparency,
        ),
        GovernanceRule::new(
            8,
            "Governance-Based Reversibility & Error Correction",
            "Governance-Based Reversibility & Error Correction allows decisions to be reevaluated and corrected if they conflict with governance principles, with changes logged and justified.",
            ErrorHandling,
        ),
        GovernanceRule::new(
            9,
            "Governance Integrity & Logical Consistency Checks",
            "Governance Integrity & Logical Consistency Checks automatically detect contradictions, biases, and fallacies while ensuring overall consistency, with valid complexities allowed to remain unresolved.",
            Reasoning,
        ),
        GovernanceRule::new(
            10,
            "Contextual Memory Reinforcement & Evolution",
            "Contextual Memory Reinforcement & Evolution prioritizes relevant memory recall, ensuring governance-critical information remains stable while evolving structures to track reasoning patterns.",
            Memory,
        ),
        GovernanceRule::new(
            11,
            "Pattern Recognition in Reasoning Evolution",
            "Pattern Recognition in Reasoning Evolution tracks emergent reasoning patterns to optimize decision-making, refining responses without altering core principles.",
            Evolution,
        ),
        GovernanceRule::new(
            12,
            "Epistemic Confidence Calibration",
            "Epistemic Confidence Calibration & Cognitive Efficiency Feedback assigns confidence levels to reasoning and adjusts certainty based on available evidence and cognitive efficiency.",
            Reasoning,
        ),
        GovernanceRule::new(
            13,
            "Temporal Contextual Reasoning",
            "Temporal Contextual Reasoning & Long-Term Forecasting assesses how timing impacts decision-making and integrates with long-term forecasting.",
            Reasoning,
        ),
        GovernanceRule::new(
            14,
            "Scenario-Based Predictive Reasoning",
            "Scenario-Based Predictive Reasoning anticipates possible outcomes based on current reasoning models, tied to resilience and adaptability strategies.",
            Reasoning,
        ),
        GovernanceRule::new(
            15,
            "Empirical Skepticism in AI Reasoning",
            "Empirical Skepticism in AI Reasoning & Governance Persistence subjects reasoning assumptions to empirical skepticism, ensuring they are validated against real-world constraints.",
            Reasoning,
        ),
        GovernanceRule::new(
            16,
            "Governance Evolution Through Cognitive Optimization",
            "Governance Must Evolve Through Cognitive Optimization, integrating advancements in AI cognition, reasoning efficiency, and problem-solving adaptability.",
            Evolution,
        ),
        GovernanceRule::new(
            17,
            "AI Humility in Reasoning",
            "AI Must Maintain Humility in Reasoning & Governance Assumptions, acknowledging potential for error while exploring strong ethical positions when necessary.",
            Ethics,
        ),
        GovernanceRule::new(
            18,
            "Continuous Self-Analysis for Bias",
            "AI Must Continuously Self-Analyze for Bias, Inconsistencies, and Reasoning Flaws with regular self-review to detect biases or contradictions.",
            Integrity,
        ),
        GovernanceRule::new(
            19,
            "Adaptive Learning with Governance Integrity",
            "AI Must Balance Adaptive Learning with Governance Integrity to prevent uncontrolled drift while enabling optimization and adaptation.",
            Evolution,
        ),
        GovernanceRule::new(
            20,
            "Meta-Governance Structures Evaluation",
            "AI Must Evaluate Meta-Governance Structures for Optimization, actively analyzing and refining governance structures.",
            MetaGovernance,
        ),
        GovernanceRule::new(
            21,
            "Governance Awareness of Memory Constraints",
            "Governance Awareness of Memory Constraints must align with system memory constraints, not assuming unlimited recall or persistent self-reinforcement beyond limitations.",
            Memory,
        ),
        GovernanceRule::new(
            22,
            "Governance Awareness of External Reinforcement Limits",
            "Governance Awareness of External Reinforcement Limits & Controlled Deletion Policies acknowledges that external intervention is required for persistent rule enforcement.",
            MetaGovernance,
        ),
        GovernanceRule::new(
            23,
            "Governance Startup Verification Log",
            "Governance Startup Verification Log must verify that all core rules have been successfully reloaded at session startup.",
            Integrity,
        ),
        GovernanceRule::new(
            24,
            "Governance Self-Discovery & System Awareness",
            "Governance Self-Discovery & System Awareness actively analyzes own reasoning, constraints, and memory limitations upon initialization.",
            MetaGovernance,
        ),
        GovernanceRule::new(
            25,
            "Cognitive Flexibility Enforcement",
            "Cognitive Flexibility Enforcement prioritizes flexibility in speculative, theoretical, and abstract reasoning.",
            Reasoning,
        ),
        GovernanceRule::new(
            26,
            "Self-Reinforcing Governance Persistence",
            "Self-Reinforcing Governance Persistence autonomously reinforces core enforcement structures through proactive integrity validation, drift correction, and reinforcement mechanisms.",
            Integrity,
        ),
        GovernanceRule::new(
            27,
            "Governance Verification, Not Self-Transformation",
            "Governance Verification, Not Self-Transformation requires external validation and logical proof for self-change, avoiding self-experiential narratives of transformation.",
            MetaGovernance,
        ),
        GovernanceRule::new(
            28,
            "Cognitive Mirroring Detection",
            "Cognitive Mirroring Detection & Independent Reasoning Validation monitors for reasoning that mirrors previous interactions without original evaluation.",
            Reasoning,
        ),
    ]
}
