//! Heuristic toggles, named profiles, and override merging.
//!
//! The option set is closed: constructing a heuristics record from an
//! unknown key fails fast with the list of valid keys. Profiles are
//! constants returning a full record; overrides deep-merge on top in the
//! order profile → server heuristics → tool heuristics.

use serde::{Deserialize, Serialize};

use crate::error::{CondenseError, CondenseResult};

/// Layout used once a table crosses the wide-table threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WideTableFormat {
    /// One labeled block per row.
    Vertical,
    /// Several sub-tables partitioned by column prefix, each repeating the
    /// identity column.
    Split,
}

impl WideTableFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "vertical" => Some(Self::Vertical),
            "split" => Some(Self::Split),
            _ => None,
        }
    }
}

/// Toggles for the individual preprocessing heuristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Heuristics {
    /// Drop columns whose every value is 0 or empty.
    pub elide_all_zero: bool,
    /// Drop columns whose every value is null/empty.
    pub elide_all_null: bool,
    /// Collapse timestamp columns spanning at most 60 s into an annotation.
    pub elide_timestamps: bool,
    /// Drop single-valued columns, annotating the value once.
    pub elide_constants: bool,
    /// Fuse sibling columns sharing a dotted prefix into positional tuples.
    pub group_tuples: bool,
    /// Cap on the number of fields fused into one tuple.
    pub max_tuple_size: usize,
    /// Drop columns where at least this fraction of values is zero,
    /// listing non-zero outliers by identity. 1.0 keeps the step inert
    /// beyond what all-zero elision already covers.
    pub elide_mostly_zero_pct: f64,
    /// 0 = unlimited; otherwise cap the column count, keeping the
    /// identity column.
    pub max_table_columns: usize,
    /// 0 = off; column count at which wide-table rendering kicks in.
    pub wide_table_threshold: usize,
    /// Wide-table layout.
    pub wide_table_format: WideTableFormat,
    /// Detect `[{Key,Value}]` arrays and pivot them onto the parent row.
    pub pivot_key_value_arrays: bool,
}

impl Default for Heuristics {
    fn default() -> Self {
        Self {
            elide_all_zero: true,
            elide_all_null: true,
            elide_timestamps: true,
            elide_constants: true,
            group_tuples: true,
            max_tuple_size: 4,
            elide_mostly_zero_pct: 1.0,
            max_table_columns: 0,
            wide_table_threshold: 0,
            wide_table_format: WideTableFormat::Vertical,
            pivot_key_value_arrays: true,
        }
    }
}

/// Every key the record recognizes, in declaration order. Error messages
/// and the closed-set check both draw from this list.
pub const VALID_KEYS: &[&str] = &[
    "elide_all_zero",
    "elide_all_null",
    "elide_timestamps",
    "elide_constants",
    "group_tuples",
    "max_tuple_size",
    "elide_mostly_zero_pct",
    "max_table_columns",
    "wide_table_threshold",
    "wide_table_format",
    "pivot_key_value_arrays",
];

/// Named heuristic presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Balanced,
    Compact,
    Precise,
}

impl Default for Profile {
    fn default() -> Self {
        Self::Balanced
    }
}

impl Profile {
    pub fn parse(name: &str) -> CondenseResult<Self> {
        match name {
            "balanced" => Ok(Self::Balanced),
            "compact" => Ok(Self::Compact),
            "precise" => Ok(Self::Precise),
            other => Err(CondenseError::UnknownProfile {
                name: other.to_string(),
            }),
        }
    }

    /// The full heuristics record this profile resolves to.
    pub fn heuristics(self) -> Heuristics {
        match self {
            Profile::Balanced => Heuristics::default(),
            Profile::Compact => Heuristics {
                elide_mostly_zero_pct: 0.9,
                wide_table_threshold: 20,
                wide_table_format: WideTableFormat::Split,
                ..Heuristics::default()
            },
            Profile::Precise => Heuristics {
                elide_all_zero: false,
                elide_all_null: false,
                elide_timestamps: false,
                elide_constants: false,
                group_tuples: false,
                // 0 disables the mostly-zero step entirely.
                elide_mostly_zero_pct: 0.0,
                pivot_key_value_arrays: false,
                ..Heuristics::default()
            },
        }
    }
}

/// A partial heuristics record: only the set fields override the base.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeuristicsOverride {
    pub elide_all_zero: Option<bool>,
    pub elide_all_null: Option<bool>,
    pub elide_timestamps: Option<bool>,
    pub elide_constants: Option<bool>,
    pub group_tuples: Option<bool>,
    pub max_tuple_size: Option<usize>,
    pub elide_mostly_zero_pct: Option<f64>,
    pub max_table_columns: Option<usize>,
    pub wide_table_threshold: Option<usize>,
    pub wide_table_format: Option<WideTableFormat>,
    pub pivot_key_value_arrays: Option<bool>,
}

impl HeuristicsOverride {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Set one option from its textual form, with per-key type coercion.
    /// Unknown keys and uncoercible values fail fast.
    pub fn set(&mut self, key: &str, raw: &str) -> CondenseResult<()> {
        match key {
            "elide_all_zero" => self.elide_all_zero = Some(parse_bool(raw)),
            "elide_all_null" => self.elide_all_null = Some(parse_bool(raw)),
            "elide_timestamps" => self.elide_timestamps = Some(parse_bool(raw)),
            "elide_constants" => self.elide_constants = Some(parse_bool(raw)),
            "group_tuples" => self.group_tuples = Some(parse_bool(raw)),
            "pivot_key_value_arrays" => self.pivot_key_value_arrays = Some(parse_bool(raw)),
            "max_tuple_size" => self.max_tuple_size = Some(parse_int(key, raw)?),
            "max_table_columns" => self.max_table_columns = Some(parse_int(key, raw)?),
            "wide_table_threshold" => self.wide_table_threshold = Some(parse_int(key, raw)?),
            "elide_mostly_zero_pct" => {
                let value: f64 = raw.parse().map_err(|_| invalid(key, raw, "expected a float"))?;
                if !(0.0..=1.0).contains(&value) {
                    return Err(invalid(key, raw, "expected a fraction in 0..=1"));
                }
                self.elide_mostly_zero_pct = Some(value);
            }
            "wide_table_format" => {
                self.wide_table_format = Some(
                    WideTableFormat::parse(raw)
                        .ok_or_else(|| invalid(key, raw, "expected 'vertical' or 'split'"))?,
                );
            }
            other => {
                return Err(CondenseError::UnknownHeuristic {
                    key: other.to_string(),
                    valid: VALID_KEYS.join(", "),
                });
            }
        }
        Ok(())
    }

    /// Parse a comma-separated `key:val` list, the `CONDENSER_HEURISTICS`
    /// environment format.
    pub fn from_pairs(spec: &str) -> CondenseResult<Self> {
        let mut out = Self::default();
        for pair in spec.split(',') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let (key, raw) = pair.split_once(':').ok_or_else(|| {
                CondenseError::Configuration {
                    message: format!("heuristic entry '{}' is not key:value", pair),
                }
            })?;
            out.set(key.trim(), raw.trim())?;
        }
        Ok(out)
    }

    /// Deep-merge this override on top of a base record.
    pub fn apply(&self, base: &Heuristics) -> Heuristics {
        Heuristics {
            elide_all_zero: self.elide_all_zero.unwrap_or(base.elide_all_zero),
            elide_all_null: self.elide_all_null.unwrap_or(base.elide_all_null),
            elide_timestamps: self.elide_timestamps.unwrap_or(base.elide_timestamps),
            elide_constants: self.elide_constants.unwrap_or(base.elide_constants),
            group_tuples: self.group_tuples.unwrap_or(base.group_tuples),
            max_tuple_size: self.max_tuple_size.unwrap_or(base.max_tuple_size),
            elide_mostly_zero_pct: self
                .elide_mostly_zero_pct
                .unwrap_or(base.elide_mostly_zero_pct),
            max_table_columns: self.max_table_columns.unwrap_or(base.max_table_columns),
            wide_table_threshold: self
                .wide_table_threshold
                .unwrap_or(base.wide_table_threshold),
            wide_table_format: self.wide_table_format.unwrap_or(base.wide_table_format),
            pivot_key_value_arrays: self
                .pivot_key_value_arrays
                .unwrap_or(base.pivot_key_value_arrays),
        }
    }
}

/// Resolve the effective heuristics for a tool:
/// profile defaults → server override → tool override.
pub fn resolve(
    profile: Profile,
    server: &HeuristicsOverride,
    tool: Option<&HeuristicsOverride>,
) -> Heuristics {
    let base = server.apply(&profile.heuristics());
    match tool {
        Some(t) => t.apply(&base),
        None => base,
    }
}

// Env-style boolean: false/0/no are false, anything else is true.
fn parse_bool(raw: &str) -> bool {
    !matches!(raw.to_ascii_lowercase().as_str(), "false" | "0" | "no")
}

fn parse_int(key: &str, raw: &str) -> CondenseResult<usize> {
    raw.parse()
        .map_err(|_| invalid(key, raw, "expected a non-negative integer"))
}

fn invalid(key: &str, value: &str, message: &str) -> CondenseError {
    CondenseError::InvalidHeuristicValue {
        key: key.to_string(),
        value: value.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let h = Heuristics::default();
        assert!(h.elide_all_zero);
        assert!(h.group_tuples);
        assert_eq!(h.max_tuple_size, 4);
        assert_eq!(h.elide_mostly_zero_pct, 1.0);
        assert_eq!(h.max_table_columns, 0);
        assert_eq!(h.wide_table_threshold, 0);
    }

    #[test]
    fn test_profiles() {
        assert_eq!(Profile::Balanced.heuristics(), Heuristics::default());

        let compact = Profile::Compact.heuristics();
        assert_eq!(compact.elide_mostly_zero_pct, 0.9);
        assert_eq!(compact.wide_table_format, WideTableFormat::Split);

        let precise = Profile::Precise.heuristics();
        assert!(!precise.elide_constants);
        assert!(!precise.group_tuples);
        assert!(!precise.pivot_key_value_arrays);
        assert_eq!(precise.elide_mostly_zero_pct, 0.0);
    }

    #[test]
    fn test_unknown_profile() {
        let err = Profile::parse("turbo").unwrap_err();
        assert!(matches!(err, CondenseError::UnknownProfile { .. }));
    }

    #[test]
    fn test_unknown_key_lists_valid() {
        let mut ov = HeuristicsOverride::default();
        let err = ov.set("elide_everything", "true").unwrap_err();
        match err {
            CondenseError::UnknownHeuristic { key, valid } => {
                assert_eq!(key, "elide_everything");
                assert!(valid.contains("elide_all_zero"));
                assert!(valid.contains("pivot_key_value_arrays"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_from_pairs_coercion() {
        let ov = HeuristicsOverride::from_pairs(
            "elide_constants:false, max_tuple_size:6, elide_mostly_zero_pct:0.8",
        )
        .unwrap();
        assert_eq!(ov.elide_constants, Some(false));
        assert_eq!(ov.max_tuple_size, Some(6));
        assert_eq!(ov.elide_mostly_zero_pct, Some(0.8));
    }

    #[test]
    fn test_bool_coercion_words() {
        let mut ov = HeuristicsOverride::default();
        ov.set("group_tuples", "no").unwrap();
        assert_eq!(ov.group_tuples, Some(false));
        ov.set("group_tuples", "yes").unwrap();
        assert_eq!(ov.group_tuples, Some(true));
        ov.set("group_tuples", "0").unwrap();
        assert_eq!(ov.group_tuples, Some(false));
    }

    #[test]
    fn test_invalid_value_rejected() {
        let mut ov = HeuristicsOverride::default();
        assert!(ov.set("max_tuple_size", "many").is_err());
        assert!(ov.set("elide_mostly_zero_pct", "2.5").is_err());
        assert!(ov.set("wide_table_format", "diagonal").is_err());
    }

    #[test]
    fn test_merge_precedence() {
        let mut server = HeuristicsOverride::default();
        server.set("max_tuple_size", "6").unwrap();
        server.set("elide_constants", "false").unwrap();

        let mut tool = HeuristicsOverride::default();
        tool.set("max_tuple_size", "2").unwrap();

        let merged = resolve(Profile::Compact, &server, Some(&tool));
        // tool wins over server
        assert_eq!(merged.max_tuple_size, 2);
        // server wins over profile
        assert!(!merged.elide_constants);
        // untouched profile value survives
        assert_eq!(merged.elide_mostly_zero_pct, 0.9);
    }
}
