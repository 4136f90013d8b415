// ── Value formats ──
//
// A format says how a normalized value maps to what the device sends and
// accepts: a numeric range, or a table of enumerated literals.

use serde::{Deserialize, Serialize};
use shelly_api::WireValue;

use super::NormalizedValue;

/// One row of an enum table.
///
/// `inbound` is what the device reports, `outbound` what it accepts. Vendor
/// tables are asymmetric: a row may carry only one of the two.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumRow {
    pub canonical: String,
    pub inbound: Option<WireValue>,
    pub outbound: Option<WireValue>,
}

impl EnumRow {
    pub fn new(
        canonical: impl Into<String>,
        inbound: Option<WireValue>,
        outbound: Option<WireValue>,
    ) -> Self {
        Self {
            canonical: canonical.into(),
            inbound,
            outbound,
        }
    }

    /// A plain literal that reads and writes as itself.
    pub fn literal(value: &str) -> Self {
        let wire = Some(WireValue::from(value));
        Self::new(value, wire.clone(), wire)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Format {
    #[default]
    None,
    /// Both bounds are exclusive.
    Range { min: Option<f64>, max: Option<f64> },
    Enum { rows: Vec<EnumRow> },
}

// ── Vendor tables ────────────────────────────────────────────────────

pub const SWITCH_ON: &str = "switch_on";
pub const SWITCH_OFF: &str = "switch_off";
pub const SWITCH_TOGGLE: &str = "switch_toggle";

impl Format {
    pub fn range(min: f64, max: f64) -> Self {
        Self::Range {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn literals<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        Self::Enum {
            rows: values.into_iter().map(EnumRow::literal).collect(),
        }
    }

    /// Relay / light output: reports booleans, accepts on / off / toggle.
    pub fn switch() -> Self {
        Self::Enum {
            rows: vec![
                EnumRow::new(SWITCH_ON, Some(true.into()), Some("on".into())),
                EnumRow::new(SWITCH_OFF, Some(false.into()), Some("off".into())),
                EnumRow::new(SWITCH_TOGGLE, None, Some("toggle".into())),
            ],
        }
    }

    /// Gen1 roller: commands and reported states share literals.
    pub fn gen1_cover() -> Self {
        Self::Enum {
            rows: vec![
                EnumRow::new("open", None, Some("open".into())),
                EnumRow::new("opened", Some("open".into()), None),
                EnumRow::new("close", None, Some("close".into())),
                EnumRow::new("closed", Some("close".into()), None),
                EnumRow::new("stop", None, Some("stop".into())),
            ],
        }
    }

    /// Gen2 `cover:N` state / command literals.
    pub fn gen2_cover() -> Self {
        let state = |s: &str| EnumRow::new(s, Some(s.into()), None);
        Self::Enum {
            rows: vec![
                EnumRow::new("open", Some("open".into()), Some("open".into())),
                state("closed"),
                state("opening"),
                state("closing"),
                state("stopped"),
                state("calibrating"),
                EnumRow::new("close", None, Some("close".into())),
                EnumRow::new("stop", None, Some("stop".into())),
            ],
        }
    }

    pub fn rows(&self) -> Option<&[EnumRow]> {
        match self {
            Self::Enum { rows } => Some(rows),
            Self::None | Self::Range { .. } => None,
        }
    }

    /// `false` when the value touches or crosses a bound.
    pub fn admits(&self, value: f64) -> bool {
        match self {
            Self::Range { min, max } => {
                !(min.is_some_and(|m| m >= value) || max.is_some_and(|m| m <= value))
            }
            Self::None | Self::Enum { .. } => true,
        }
    }

    /// Row for a value the device reported.
    ///
    /// Matches the inbound column, then the outbound column. A column with
    /// more than one matching row settles the lookup as "no mapping".
    pub fn row_from_device(&self, raw: &WireValue) -> Option<&EnumRow> {
        let rows = self.rows()?;
        first_unique(&[
            find(rows, |r| r.inbound.as_ref().is_some_and(|c| cell_matches(c, raw))),
            find(rows, |r| r.outbound.as_ref().is_some_and(|c| cell_matches(c, raw))),
        ])
    }

    /// Row for a value about to be written.
    ///
    /// Matches the canonical column, then outbound, then inbound.
    pub fn row_to_device(&self, value: &NormalizedValue) -> Option<&EnumRow> {
        let rows = self.rows()?;
        let wire = value.to_wire();
        let text = wire.to_string();
        first_unique(&[
            find(rows, |r| r.canonical.eq_ignore_ascii_case(&text)),
            find(rows, |r| r.outbound.as_ref().is_some_and(|c| cell_matches(c, &wire))),
            find(rows, |r| r.inbound.as_ref().is_some_and(|c| cell_matches(c, &wire))),
        ])
    }
}

// ── Table lookup ─────────────────────────────────────────────────────

enum Lookup<'a> {
    Miss,
    One(&'a EnumRow),
    Ambiguous,
}

fn find(rows: &[EnumRow], pred: impl Fn(&EnumRow) -> bool) -> Lookup<'_> {
    let mut hits = rows.iter().filter(|r| pred(*r));
    match (hits.next(), hits.next()) {
        (None, _) => Lookup::Miss,
        (Some(row), None) => Lookup::One(row),
        (Some(_), Some(_)) => Lookup::Ambiguous,
    }
}

fn first_unique<'a>(columns: &[Lookup<'a>]) -> Option<&'a EnumRow> {
    for column in columns {
        match column {
            Lookup::Miss => {}
            Lookup::One(row) => return Some(*row),
            Lookup::Ambiguous => return None,
        }
    }
    None
}

/// Case-insensitive; boolean cells also accept 1/0 and their text forms.
fn cell_matches(cell: &WireValue, value: &WireValue) -> bool {
    match cell {
        WireValue::Bool(expected) => match value {
            WireValue::Bool(b) => b == expected,
            WireValue::Int(i) => *i == i64::from(*expected),
            WireValue::Text(s) => {
                let s = s.trim();
                if *expected {
                    s.eq_ignore_ascii_case("true") || s == "1"
                } else {
                    s.eq_ignore_ascii_case("false") || s == "0"
                }
            }
            WireValue::Float(_) => false,
        },
        _ => value.eq_ignore_case(&cell.to_string()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn boundaries_are_excluded() {
        let format = Format::range(0.0, 100.0);
        assert!(!format.admits(0.0));
        assert!(!format.admits(100.0));
        assert!(format.admits(0.5));
        assert!(format.admits(99.0));
    }

    #[test]
    fn open_ended_ranges() {
        let format = Format::Range {
            min: Some(-40.0),
            max: None,
        };
        assert!(format.admits(1e9));
        assert!(!format.admits(-40.0));
    }

    #[test]
    fn switch_reads_booleans_and_literals() {
        let format = Format::switch();
        let on = format.row_from_device(&WireValue::Int(1)).unwrap();
        assert_eq!(on.canonical, SWITCH_ON);
        let off = format.row_from_device(&"OFF".into()).unwrap();
        assert_eq!(off.canonical, SWITCH_OFF);
        assert!(format.row_from_device(&"maybe".into()).is_none());
    }

    #[test]
    fn duplicate_literals_are_ambiguous() {
        let format = Format::literals(["stop", "open", "Stop"]);
        assert!(format.row_from_device(&"stop".into()).is_none());
        assert_eq!(
            format.row_from_device(&"open".into()).unwrap().canonical,
            "open"
        );
    }

    #[test]
    fn gen1_cover_is_directional() {
        let format = Format::gen1_cover();
        let reported = format.row_from_device(&"open".into()).unwrap();
        assert_eq!(reported.canonical, "opened");

        let command = format
            .row_to_device(&NormalizedValue::Enum("open".into()))
            .unwrap();
        assert_eq!(command.outbound, Some("open".into()));
    }

    #[test]
    fn writes_accept_booleans_for_switches() {
        let format = Format::switch();
        let row = format.row_to_device(&NormalizedValue::Bool(false)).unwrap();
        assert_eq!(row.outbound, Some("off".into()));
    }
}
