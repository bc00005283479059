use lookout_config::response::{AnswerStyle, MsRange, ResponseConfig};
use lookout_types::{
    AnswerOption, CaptureRegion, DelayBounds, InputAction, Key, Modifier, MouseButton,
    QuestionCandidate, ResponsePlan,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::PlanError;
use crate::normalize::normalize_text;

const PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':'];

/// How far past the target an overshooting pointer lands, in pixels
const OVERSHOOT_PX: std::ops::RangeInclusive<f64> = 10.0..=30.0;

fn bounds(range: MsRange) -> DelayBounds {
    DelayBounds::new(range.min, range.max)
}

fn combine(a: DelayBounds, b: DelayBounds) -> DelayBounds {
    DelayBounds::new(a.min_ms + b.min_ms, a.max_ms + b.max_ms)
}

/// Interpret a reply as a boolean answer
pub fn parse_bool(answer: &str) -> Option<bool> {
    let word = normalize_text(answer);
    let word = word.trim_matches(|c: char| !c.is_alphanumeric());
    match word {
        "true" | "t" | "yes" | "y" | "correct" => Some(true),
        "false" | "f" | "no" | "n" | "incorrect" => Some(false),
        _ => None,
    }
}

/// Pick the option a reply refers to: by label (`B`, `B)`, `b. Paris`),
/// then by exact text, then by containment
pub fn match_option<'a>(options: &'a [AnswerOption], answer: &str) -> Option<&'a AnswerOption> {
    let answer = normalize_text(answer);
    if answer.is_empty() {
        return None;
    }

    let head: String = answer
        .chars()
        .take_while(|c| c.is_alphanumeric())
        .collect();
    let after_head = &answer[head.len()..];
    let label_like = after_head.is_empty() || after_head.starts_with([')', '.', ':', ' ']);

    if label_like
        && let Some(option) = options
            .iter()
            .find(|o| normalize_text(&o.label) == head)
    {
        return Some(option);
    }

    let bare = answer.trim_end_matches(|c: char| PUNCTUATION.contains(&c));
    if let Some(option) = options.iter().find(|o| normalize_text(&o.text) == bare) {
        return Some(option);
    }

    if bare.chars().count() < 3 {
        return None;
    }
    options.iter().find(|o| {
        let text = normalize_text(&o.text);
        text.contains(bare) || (text.chars().count() >= 3 && bare.contains(text.as_str()))
    })
}

/// Turns an answer into a timed action sequence
pub struct PlanBuilder {
    config: ResponseConfig,
    rng: StdRng,
}

impl PlanBuilder {
    /// A fixed seed makes paths and jitter reproducible
    pub fn new(config: ResponseConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { config, rng }
    }

    pub fn build(
        &mut self,
        candidate: &QuestionCandidate,
        answer: &str,
    ) -> Result<ResponsePlan, PlanError> {
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(PlanError::EmptyAnswer);
        }

        let style = match self.config.answer_style {
            AnswerStyle::Auto if candidate.options.len() >= 2 => {
                if is_true_false(&candidate.options) && parse_bool(answer).is_some() {
                    AnswerStyle::TrueFalse
                } else {
                    AnswerStyle::MultipleChoice
                }
            }
            AnswerStyle::Auto => AnswerStyle::ShortAnswer,
            style => style,
        };

        let start = candidate.bounding_region.center();
        let mut plan = ResponsePlan::default();

        match style {
            AnswerStyle::MultipleChoice => {
                let option = match_option(&candidate.options, answer)
                    .ok_or_else(|| PlanError::NoMatchingOption(answer.to_string()))?;
                self.click(&mut plan, start, option.region);
            }
            AnswerStyle::TrueFalse => {
                let value = parse_bool(answer).ok_or_else(|| PlanError::NotBoolean(answer.to_string()))?;
                let wanted = if value { "true" } else { "false" };
                let option = candidate
                    .options
                    .iter()
                    .find(|o| normalize_text(&o.text) == wanted || normalize_text(&o.label) == wanted)
                    .ok_or_else(|| PlanError::NoMatchingOption(answer.to_string()))?;
                self.click(&mut plan, start, option.region);
            }
            AnswerStyle::ShortAnswer | AnswerStyle::Auto => {
                let region = candidate.bounding_region;
                let field = CaptureRegion::new(
                    region.x,
                    region.bottom() + self.config.answer_field_offset_px,
                    region.width,
                    1,
                );
                self.click(&mut plan, start, field);
                plan.push(InputAction::Wait, bounds(self.config.click_delay_ms));
                plan.push(
                    InputAction::KeyPress {
                        key: Key::Char('a'),
                        modifiers: vec![Modifier::Control],
                    },
                    bounds(self.config.click_delay_ms),
                );
                self.type_text(&mut plan, answer);
            }
        }

        // Think time lands before the very first action
        if let Some(first) = plan.actions.first_mut() {
            first.delay = combine(bounds(self.config.think_delay_ms), first.delay);
        }

        Ok(plan)
    }

    /// Curved pointer path to a jittered point inside `target`, then a click.
    /// Sometimes the path runs past the point and is corrected back onto it.
    fn click(&mut self, plan: &mut ResponsePlan, from: (i32, i32), target: CaptureRegion) {
        let (cx, cy) = target.center();
        let jitter = self.config.click_jitter_px.max(0);
        let to = (
            cx + self.rng.gen_range(-jitter..=jitter),
            cy + self.rng.gen_range(-jitter..=jitter),
        );

        let points = self.config.path_points.max(1);
        let step = bounds(self.config.move_duration_ms).scaled(1.0 / points as f64);

        if self.rng.gen_bool(self.config.overshoot_probability.clamp(0.0, 1.0)) {
            let angle = self.rng.gen_range(0.0..std::f64::consts::TAU);
            let distance = self.rng.gen_range(OVERSHOOT_PX);
            let past = (
                to.0 + (distance * angle.cos()).round() as i32,
                to.1 + (distance * angle.sin()).round() as i32,
            );
            for (x, y) in self.bezier(from, past, points) {
                plan.push(InputAction::MoveTo { x, y }, step);
            }

            let back = (points / 2).max(1);
            for i in 1..=back {
                let t = i as f64 / back as f64;
                let x = f64::from(past.0) + t * f64::from(to.0 - past.0);
                let y = f64::from(past.1) + t * f64::from(to.1 - past.1);
                plan.push(
                    InputAction::MoveTo {
                        x: x.round() as i32,
                        y: y.round() as i32,
                    },
                    step,
                );
            }
        } else {
            for (x, y) in self.bezier(from, to, points) {
                plan.push(InputAction::MoveTo { x, y }, step);
            }
        }

        plan.push(
            InputAction::Click {
                button: MouseButton::Left,
            },
            bounds(self.config.click_delay_ms),
        );
    }

    /// `points` positions along a quadratic curve, ending exactly at `to`
    fn bezier(&mut self, from: (i32, i32), to: (i32, i32), points: usize) -> Vec<(i32, i32)> {
        let deviation = self.config.curve_deviation_px.max(0);
        let control = (
            f64::from(from.0 + to.0) / 2.0 + f64::from(self.rng.gen_range(-deviation..=deviation)),
            f64::from(from.1 + to.1) / 2.0 + f64::from(self.rng.gen_range(-deviation..=deviation)),
        );

        (1..=points)
            .map(|i| {
                if i == points {
                    return to;
                }
                let t = i as f64 / points as f64;
                let u = 1.0 - t;
                let x = u * u * f64::from(from.0) + 2.0 * u * t * control.0 + t * t * f64::from(to.0);
                let y = u * u * f64::from(from.1) + 2.0 * u * t * control.1 + t * t * f64::from(to.1);
                (x.round() as i32, y.round() as i32)
            })
            .collect()
    }

    /// A letter is occasionally typed wrong first, then erased before the
    /// right one follows
    fn type_text(&mut self, plan: &mut ResponsePlan, text: &str) {
        let base = bounds(self.config.typing_delay_ms);
        let typo_chance = self.config.typo_probability.clamp(0.0, 1.0);
        for c in text.chars() {
            let delay = if c == ' ' {
                base.scaled(1.5)
            } else if PUNCTUATION.contains(&c) {
                base.scaled(2.0)
            } else {
                base
            };

            if c.is_ascii_alphabetic() && self.rng.gen_bool(typo_chance) {
                let wrong = self.wrong_letter(c);
                plan.push(InputAction::TypeChar(wrong), delay);
                plan.push(
                    InputAction::KeyPress {
                        key: Key::Backspace,
                        modifiers: Vec::new(),
                    },
                    base.scaled(2.0),
                );
                plan.push(InputAction::TypeChar(c), base.scaled(1.5));
                continue;
            }

            plan.push(InputAction::TypeChar(c), delay);
        }
    }

    fn wrong_letter(&mut self, intended: char) -> char {
        let intended = intended.to_ascii_lowercase();
        loop {
            let c = char::from(self.rng.gen_range(b'a'..=b'z'));
            if c != intended {
                return c;
            }
        }
    }
}

fn is_true_false(options: &[AnswerOption]) -> bool {
    options
        .iter()
        .all(|o| matches!(normalize_text(&o.text).as_str(), "true" | "false"))
}
