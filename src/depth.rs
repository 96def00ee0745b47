//! Free-text inundation depth → numeric range, and range → value factor.

use crate::structures::{DepthClass, FactorRow};
use regex::Regex;
use std::sync::LazyLock;

// ASCII digits only: a full-width number is skipped, not half-parsed.
const NUM: &str = r"([0-9]+(?:\.[0-9]+)?)";

static AT_LEAST: LazyLock<Regex> = LazyLock::new(|| compile(&format!("{NUM}m?以上")));
static BELOW: LazyLock<Regex> = LazyLock::new(|| compile(&format!("{NUM}m?未満")));
static RANGE: LazyLock<Regex> = LazyLock::new(|| compile(&format!("{NUM}~{NUM}m?")));
static ABOUT: LazyLock<Regex> = LazyLock::new(|| compile(&format!("{NUM}m?(?:程度)?")));

fn compile(pattern: &str) -> Regex {
    // Patterns are built from literals above.
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid depth pattern {pattern}: {e}"))
}

/// Default table, deepest first.
pub fn default_factor_table() -> Vec<FactorRow> {
    vec![
        FactorRow::new(10.0, "10m以上", 0.70),
        FactorRow::new(5.0, "5.0–10.0m", 0.80),
        FactorRow::new(3.0, "3.0–5.0m", 0.85),
        FactorRow::new(0.5, "0.5–3.0m", 0.90),
        FactorRow::new(0.0, "0–0.5m", 0.97),
    ]
}

/// Sort rows by descending `min` so the first row at or below a depth wins.
pub fn sort_factor_table(table: &mut [FactorRow]) {
    table.sort_by(|a, b| b.min.total_cmp(&a.min));
}

/// Wave dash and full-width tilde become `~`; whitespace is dropped.
fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '〜' | '～' => '~',
            other => other,
        })
        .flat_map(char::to_lowercase)
        .collect()
}

fn number(caps: &regex::Captures<'_>, i: usize) -> Option<f64> {
    caps.get(i)?.as_str().parse().ok()
}

/// Classify a depth text. Rules are tried in order: `N以上`, `N未満`,
/// `A~B`, then a bare or approximate `N`. Text with no number is
/// unclassified.
pub fn classify_depth(text: &str) -> DepthClass {
    let s = normalize(text);
    if s.is_empty() {
        return DepthClass::unclassified();
    }

    if let Some(v) = AT_LEAST.captures(&s).and_then(|c| number(&c, 1)) {
        return DepthClass {
            min: v,
            max: f64::INFINITY,
            label: Some(format!("{v}m以上")),
        };
    }
    if let Some(v) = BELOW.captures(&s).and_then(|c| number(&c, 1)) {
        return DepthClass {
            min: 0.0,
            max: v,
            label: Some(format!("0–{v}m")),
        };
    }
    if let Some(c) = RANGE.captures(&s) {
        if let (Some(a), Some(b)) = (number(&c, 1), number(&c, 2)) {
            let (min, max) = (a.min(b), a.max(b));
            return DepthClass {
                min,
                max,
                label: Some(format!("{min}–{max}m")),
            };
        }
    }
    if let Some(v) = ABOUT.captures(&s).and_then(|c| number(&c, 1)) {
        return DepthClass {
            min: v,
            max: v,
            label: Some(format!("{v}m")),
        };
    }

    DepthClass::unclassified()
}

/// Factor of the first row whose `min` is at or below `depth.min`, or `1.0`
/// for an unclassified depth or when no row applies. `table` must be sorted
/// deepest first.
pub fn factor_for(depth: &DepthClass, table: &[FactorRow]) -> f64 {
    if !depth.is_classified() {
        return 1.0;
    }
    table
        .iter()
        .find(|row| depth.min >= row.min)
        .map_or(1.0, |row| row.factor)
}

/// Pick the deepest class among `classes`, in the order given.
///
/// A candidate replaces the current best when it is open-ended, when its
/// upper bound is higher, or (while the best is bounded) when its lower
/// bound is higher. Unclassified entries are ignored.
pub fn deepest<'a>(classes: impl IntoIterator<Item = &'a DepthClass>) -> Option<DepthClass> {
    let mut best: Option<&DepthClass> = None;
    for cls in classes.into_iter().filter(|c| c.is_classified()) {
        let replace = match best {
            None => true,
            Some(b) => {
                cls.max == f64::INFINITY
                    || cls.max > b.max
                    || (b.max != f64::INFINITY && cls.min > b.min)
            }
        };
        if replace {
            best = Some(cls);
        }
    }
    best.cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(text: &str) -> (f64, f64, Option<String>) {
        let c = classify_depth(text);
        (c.min, c.max, c.label)
    }

    #[test]
    fn at_least() {
        assert_eq!(range("10m以上"), (10.0, f64::INFINITY, Some("10m以上".into())));
        assert_eq!(range(" 20 m 以上 "), (20.0, f64::INFINITY, Some("20m以上".into())));
    }

    #[test]
    fn below() {
        assert_eq!(range("0.5m未満"), (0.0, 0.5, Some("0–0.5m".into())));
        assert_eq!(range("0.3未満"), (0.0, 0.3, Some("0–0.3m".into())));
    }

    #[test]
    fn ranges_accept_both_tildes_and_reversed_bounds() {
        assert_eq!(range("0.5～3.0m"), (0.5, 3.0, Some("0.5–3m".into())));
        assert_eq!(range("5.0〜10.0m"), (5.0, 10.0, Some("5–10m".into())));
        assert_eq!(range("3~0.5"), (0.5, 3.0, Some("0.5–3m".into())));
    }

    #[test]
    fn approximate_and_bare_values() {
        assert_eq!(range("3m程度"), (3.0, 3.0, Some("3m".into())));
        assert_eq!(range("2.5M"), (2.5, 2.5, Some("2.5m".into())));
    }

    #[test]
    fn full_width_digits_do_not_hide_a_later_ascii_number() {
        assert_eq!(range("１~2m"), (2.0, 2.0, Some("2m".into())));
        assert_eq!(range("１０m以上 2m"), (2.0, 2.0, Some("2m".into())));
        assert_eq!(classify_depth("３m程度"), DepthClass::unclassified());
    }

    #[test]
    fn text_without_numbers_is_unclassified() {
        assert_eq!(classify_depth("unknown-text"), DepthClass::unclassified());
        assert_eq!(classify_depth(""), DepthClass::unclassified());
        assert_eq!(classify_depth("不明"), DepthClass::unclassified());
    }

    #[test]
    fn factor_uses_lower_bound_against_descending_table() {
        let table = default_factor_table();
        let d = |min: f64| DepthClass {
            min,
            max: min,
            label: Some(String::new()),
        };
        assert_eq!(factor_for(&d(7.0), &table), 0.80);
        assert_eq!(factor_for(&d(10.0), &table), 0.70);
        assert_eq!(factor_for(&d(0.5), &table), 0.90);
        assert_eq!(factor_for(&d(0.0), &table), 0.97);
        assert_eq!(factor_for(&DepthClass::unclassified(), &table), 1.0);
        assert_eq!(factor_for(&d(2.0), &table[..2]), 1.0);
    }

    #[test]
    fn custom_table_is_sorted_deepest_first() {
        let mut table = vec![
            FactorRow::new(0.0, "low", 0.99),
            FactorRow::new(3.0, "high", 0.5),
        ];
        sort_factor_table(&mut table);
        assert_eq!(table[0].label, "high");
        assert_eq!(factor_for(&classify_depth("4m"), &table), 0.5);
    }

    #[test]
    fn deepest_follows_discovery_order_rules() {
        let classes: Vec<DepthClass> = ["0.5～3.0m", "不明", "10m以上", "5.0～10.0m", "20m以上"]
            .iter()
            .map(|t| classify_depth(t))
            .collect();
        let best = deepest(&classes).unwrap();
        // A later open-ended class replaces an earlier one regardless of min.
        assert_eq!(best.label.as_deref(), Some("20m以上"));

        let bounded = deepest(&classes[..2]).unwrap();
        assert_eq!(bounded.label.as_deref(), Some("0.5–3m"));
        assert!(deepest(&classes[1..2]).is_none());
    }
}
