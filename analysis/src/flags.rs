use common::SubAnalyses;

/// Thresholds above/below which the human-readable flags fire.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FlagPolicy {
    pub circle_jaccard: f64,
    pub circle_min_shared: u64,
    pub stat_mirror: f64,
    pub hour_mirror: f64,
    pub locale_ping: f64,
    pub locale_min_servers: u64,
    pub server_pool_affinity: f64,
    pub coplay_min_sessions: u64,
    pub skill_gap: f64,
    pub disjoint_affinity: f64,
    pub concurrent_overlap: f64,
}

impl Default for FlagPolicy {
    fn default() -> Self {
        Self {
            circle_jaccard: 0.50,
            circle_min_shared: 3,
            stat_mirror: 0.85,
            hour_mirror: 0.85,
            locale_ping: 0.85,
            locale_min_servers: 2,
            server_pool_affinity: 0.80,
            coplay_min_sessions: 3,
            skill_gap: 0.25,
            disjoint_affinity: 0.05,
            concurrent_overlap: 0.75,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Polarity {
    Red,
    Green,
}

/// A rule returns its message when it fires and `None` otherwise, so a rule
/// whose inputs were degraded away simply stays silent.
struct FlagRule {
    polarity: Polarity,
    check: fn(&FlagPolicy, &SubAnalyses) -> Option<String>,
}

/// Walks the rule table and splits the firing rules into (red, green)
/// messages, in table order.
pub fn evaluate(policy: &FlagPolicy, subs: &SubAnalyses) -> (Vec<String>, Vec<String>) {
    let mut red = Vec::new();
    let mut green = Vec::new();

    for rule in RULES {
        let Some(message) = (rule.check)(policy, subs) else {
            continue;
        };
        tracing::trace!(polarity = ?rule.polarity, %message, "Flag rule fired");
        match rule.polarity {
            Polarity::Red => red.push(message),
            Polarity::Green => green.push(message),
        }
    }

    (red, green)
}

static RULES: &[FlagRule] = &[
    FlagRule {
        polarity: Polarity::Red,
        check: |policy, subs| {
            let network = subs.network.as_ref()?;
            let temporal = subs.temporal.as_ref()?;
            (network.teammate_jaccard >= policy.circle_jaccard
                && network.shared_teammates >= policy.circle_min_shared
                && temporal.direct_sessions == 0)
                .then(|| {
                    format!(
                        "heavy teammate overlap ({} shared, jaccard {:.2}) but no direct co-session on record",
                        network.shared_teammates, network.teammate_jaccard
                    )
                })
        },
    },
    FlagRule {
        polarity: Polarity::Red,
        check: |policy, subs| {
            let stat = subs.stat.as_ref()?;
            (!stat.insufficient_data && stat.score >= policy.stat_mirror).then(|| {
                format!(
                    "statistical profile is a near mirror (similarity {:.2})",
                    stat.score
                )
            })
        },
    },
    FlagRule {
        polarity: Polarity::Red,
        check: |policy, subs| {
            let behavior = subs.behavior.as_ref()?;
            (!behavior.insufficient_data && behavior.hour_overlap >= policy.hour_mirror).then(
                || {
                    format!(
                        "active-hour histograms line up almost exactly (overlap {:.2})",
                        behavior.hour_overlap
                    )
                },
            )
        },
    },
    FlagRule {
        polarity: Polarity::Red,
        check: |_, subs| {
            let temporal = subs.temporal.as_ref()?;
            temporal
                .windows_inverted
                .then(|| "one account went quiet right as the other appeared".to_string())
        },
    },
    FlagRule {
        polarity: Polarity::Red,
        check: |policy, subs| {
            let behavior = subs.behavior.as_ref()?;
            (behavior.ping_consistency >= policy.locale_ping
                && behavior.common_servers >= policy.locale_min_servers)
                .then(|| {
                    format!(
                        "near identical ping on {} shared servers points at the same locale",
                        behavior.common_servers
                    )
                })
        },
    },
    FlagRule {
        polarity: Polarity::Red,
        check: |policy, subs| {
            let behavior = subs.behavior.as_ref()?;
            (!behavior.insufficient_data
                && behavior.server_affinity >= policy.server_pool_affinity)
                .then(|| {
                    format!(
                        "both accounts rotate through the same server pool (affinity {:.2})",
                        behavior.server_affinity
                    )
                })
        },
    },
    FlagRule {
        polarity: Polarity::Green,
        check: |policy, subs| {
            let temporal = subs.temporal.as_ref()?;
            (temporal.direct_sessions >= policy.coplay_min_sessions).then(|| {
                format!(
                    "the two played together in {} sessions ({:.0} minutes side by side)",
                    temporal.direct_sessions, temporal.minutes_together
                )
            })
        },
    },
    FlagRule {
        polarity: Polarity::Green,
        check: |policy, subs| {
            let stat = subs.stat.as_ref()?;
            (!stat.insufficient_data && stat.score <= policy.skill_gap).then(|| {
                format!(
                    "skill profiles are far apart (similarity {:.2})",
                    stat.score
                )
            })
        },
    },
    FlagRule {
        polarity: Polarity::Green,
        check: |policy, subs| {
            let behavior = subs.behavior.as_ref()?;
            (!behavior.insufficient_data
                && behavior.common_servers == 0
                && behavior.server_affinity <= policy.disjoint_affinity)
                .then(|| "no shared servers at all".to_string())
        },
    },
    FlagRule {
        polarity: Polarity::Green,
        check: |policy, subs| {
            let temporal = subs.temporal.as_ref()?;
            (temporal.direct_sessions >= 1
                && temporal.active_overlap >= policy.concurrent_overlap)
                .then(|| "both accounts were active across the same period".to_string())
        },
    },
];
