//! Timecode normalization rules.
//!
//! Each rule is a pure rewrite of one timecode token with an explicit
//! precondition. [`Normalizer`] applies the ordered rule list to a token
//! until a full pass changes nothing or the iteration cap is reached.

use std::collections::BTreeSet;

use super::types::{IssueTag, Timestamp};

/// Caller-supplied knowledge about the track.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RuleContext {
    /// Upper bound on plausible timestamps, when known.
    pub expected_max: Option<Timestamp>,
}

impl RuleContext {
    pub fn with_expected_max_minutes(minutes: Option<f64>) -> Self {
        Self {
            expected_max: minutes.map(|m| Timestamp::from_secs_f64(m * 60.0)),
        }
    }
}

pub trait TimecodeRule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Tag recorded on the cue when this rule fires.
    fn tag(&self) -> IssueTag;

    /// Rewritten token, or `None` when the rule does not apply.
    fn apply(&self, token: &str, ctx: &RuleContext) -> Option<String>;
}

/// A token split into colon fields and an optional fraction.
struct Fields<'a> {
    clock: Vec<&'a str>,
    fraction: Option<&'a str>,
}

impl<'a> Fields<'a> {
    /// `None` unless every field is a non-empty run of digits.
    fn split(token: &'a str) -> Option<Self> {
        let (clock, fraction) = match token.split_once(',') {
            Some((clock, fraction)) => (clock, Some(fraction)),
            None => (token, None),
        };
        let clock: Vec<&str> = clock.split(':').collect();
        if !clock.iter().all(|f| is_digits(f)) || !fraction.is_none_or(is_digits) {
            return None;
        }
        Some(Self { clock, fraction })
    }

    /// `(h, m, s)` for three-field tokens.
    fn hms(&self) -> Option<(u64, u64, u64)> {
        match self.clock.as_slice() {
            [h, m, s] => Some((h.parse().ok()?, m.parse().ok()?, s.parse().ok()?)),
            _ => None,
        }
    }

    fn with_fraction(&self, clock: String) -> String {
        match self.fraction {
            Some(fraction) => format!("{},{}", clock, fraction),
            None => clock,
        }
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// `.` or a fourth colon field as fractional separator.
pub struct FractionSeparator;

impl TimecodeRule for FractionSeparator {
    fn name(&self) -> &'static str {
        "fraction_separator"
    }

    fn tag(&self) -> IssueTag {
        IssueTag::MalformedTimecode
    }

    fn apply(&self, token: &str, _ctx: &RuleContext) -> Option<String> {
        if token.contains(',') {
            return None;
        }
        if let Some((head, tail)) = token.rsplit_once('.') {
            if !head.is_empty() && is_digits(tail) {
                return Some(format!("{},{}", head, tail));
            }
            return None;
        }
        match token.split(':').collect::<Vec<_>>().as_slice() {
            [h, m, s, frac] if frac.len() == 3 && is_digits(frac) => {
                Some(format!("{}:{}:{},{}", h, m, s, frac))
            }
            _ => None,
        }
    }
}

/// `HH:MM:SS` (or `MM:SS`) without a fraction gains `,000`.
pub struct MissingFraction;

impl TimecodeRule for MissingFraction {
    fn name(&self) -> &'static str {
        "missing_fraction"
    }

    fn tag(&self) -> IssueTag {
        IssueTag::MissingFraction
    }

    fn apply(&self, token: &str, _ctx: &RuleContext) -> Option<String> {
        let fields = Fields::split(token)?;
        match (fields.fraction, fields.clock.len()) {
            (None, 2 | 3) => Some(format!("{},000", token)),
            _ => None,
        }
    }
}

/// Fractions are exactly three digits: shorter ones right-padded, longer
/// ones truncated.
pub struct FractionWidth;

impl TimecodeRule for FractionWidth {
    fn name(&self) -> &'static str {
        "fraction_width"
    }

    fn tag(&self) -> IssueTag {
        IssueTag::MalformedTimecode
    }

    fn apply(&self, token: &str, _ctx: &RuleContext) -> Option<String> {
        let fields = Fields::split(token)?;
        let fraction = fields.fraction?;
        let fixed = match fraction.len() {
            3 => return None,
            1 | 2 => format!("{:0<3}", fraction),
            _ => fraction[..3].to_string(),
        };
        Some(format!("{},{}", fields.clock.join(":"), fixed))
    }
}

/// `MM:SS,mmm` gains a zero hour.
pub struct MissingHour;

impl TimecodeRule for MissingHour {
    fn name(&self) -> &'static str {
        "missing_hour"
    }

    fn tag(&self) -> IssueTag {
        IssueTag::MissingHour
    }

    fn apply(&self, token: &str, _ctx: &RuleContext) -> Option<String> {
        let fields = Fields::split(token)?;
        match (fields.fraction, fields.clock.len()) {
            (Some(_), 2) => Some(format!("00:{}", token)),
            _ => None,
        }
    }
}

/// Seconds above 59 (including three-digit seconds) carry into minutes.
pub struct SecondsCarry;

impl TimecodeRule for SecondsCarry {
    fn name(&self) -> &'static str {
        "seconds_carry"
    }

    fn tag(&self) -> IssueTag {
        IssueTag::FieldOverflow
    }

    fn apply(&self, token: &str, _ctx: &RuleContext) -> Option<String> {
        let fields = Fields::split(token)?;
        let (_, m, s) = fields.hms()?;
        if s <= 59 {
            return None;
        }
        let clock = format!("{}:{:02}:{:02}", fields.clock[0], m.checked_add(s / 60)?, s % 60);
        Some(fields.with_fraction(clock))
    }
}

/// Minutes above 59 carry into hours.
pub struct MinutesCarry;

impl TimecodeRule for MinutesCarry {
    fn name(&self) -> &'static str {
        "minutes_carry"
    }

    fn tag(&self) -> IssueTag {
        IssueTag::FieldOverflow
    }

    fn apply(&self, token: &str, _ctx: &RuleContext) -> Option<String> {
        let fields = Fields::split(token)?;
        let (h, m, _) = fields.hms()?;
        if m <= 59 {
            return None;
        }
        let clock = format!("{:02}:{:02}:{}", h.checked_add(m / 60)?, m % 60, fields.clock[2]);
        Some(fields.with_fraction(clock))
    }
}

/// Clock fields rendered with two digits.
pub struct FieldWidth;

impl TimecodeRule for FieldWidth {
    fn name(&self) -> &'static str {
        "field_width"
    }

    fn tag(&self) -> IssueTag {
        IssueTag::MalformedTimecode
    }

    fn apply(&self, token: &str, _ctx: &RuleContext) -> Option<String> {
        let fields = Fields::split(token)?;
        let (h, m, s) = fields.hms()?;
        if m > 59 || s > 59 {
            return None;
        }
        let clock = format!("{:02}:{:02}:{:02}", h, m, s);
        if clock == fields.clock.join(":") {
            None
        } else {
            Some(fields.with_fraction(clock))
        }
    }
}

/// Reads `0H:MM:SS,mmm` as `00:MM:SS,mmm`.
///
/// Fires only when the context bounds the track below one hour, the literal
/// value exceeds that bound and the reinterpreted value does not.
pub struct HourArtifact;

impl TimecodeRule for HourArtifact {
    fn name(&self) -> &'static str {
        "hour_artifact"
    }

    fn tag(&self) -> IssueTag {
        IssueTag::HourArtifact
    }

    fn apply(&self, token: &str, ctx: &RuleContext) -> Option<String> {
        let bound = ctx.expected_max?;
        if bound >= Timestamp::from_parts(1, 0, 0, 0)? {
            return None;
        }
        let literal = Timestamp::parse(token)?;
        let (h, m, s, ms) = literal.parts();
        let reinterpreted = Timestamp::from_parts(0, m, s, ms)?;
        if h == 0 || literal <= bound || reinterpreted > bound {
            return None;
        }
        Some(reinterpreted.to_string())
    }
}

/// The rules in application order.
pub fn default_rules() -> Vec<Box<dyn TimecodeRule>> {
    vec![
        Box::new(FractionSeparator),
        Box::new(MissingFraction),
        Box::new(FractionWidth),
        Box::new(MissingHour),
        Box::new(SecondsCarry),
        Box::new(MinutesCarry),
        Box::new(FieldWidth),
        Box::new(HourArtifact),
    ]
}

/// Result of normalizing one token.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedToken {
    /// Token after the last pass.
    pub text: String,
    /// Parsed value, `None` when the token never reached canonical form.
    pub value: Option<Timestamp>,
    pub tags: BTreeSet<IssueTag>,
    /// Names of the rules that fired, in order.
    pub applied: Vec<&'static str>,
}

pub struct Normalizer {
    rules: Vec<Box<dyn TimecodeRule>>,
    context: RuleContext,
    iteration_cap: usize,
}

impl Normalizer {
    pub fn new(context: RuleContext, iteration_cap: usize) -> Self {
        Self::with_rules(default_rules(), context, iteration_cap)
    }

    pub fn with_rules(
        rules: Vec<Box<dyn TimecodeRule>>,
        context: RuleContext,
        iteration_cap: usize,
    ) -> Self {
        Self {
            rules,
            context,
            iteration_cap: iteration_cap.max(1),
        }
    }

    pub fn context(&self) -> &RuleContext {
        &self.context
    }

    pub fn normalize(&self, token: &str) -> NormalizedToken {
        let mut text = token.trim().to_string();
        let mut tags = BTreeSet::new();
        let mut applied = Vec::new();

        for _ in 0..self.iteration_cap {
            let mut changed = false;
            for rule in &self.rules {
                if let Some(rewritten) = rule.apply(&text, &self.context) {
                    if rewritten != text {
                        tracing::trace!("{}: {} -> {}", rule.name(), text, rewritten);
                        text = rewritten;
                        tags.insert(rule.tag());
                        applied.push(rule.name());
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }

        NormalizedToken {
            value: Timestamp::parse(&text),
            text,
            tags,
            applied,
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(RuleContext::default(), 5)
    }
}
