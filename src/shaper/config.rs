//! Shaper configuration and its environment surface.

use std::collections::BTreeMap;

use crate::condense::heuristics::{HeuristicsOverride, Profile};
use crate::error::{CondenseError, CondenseResult};

/// Tool selector: everything, or an explicit allowlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolMatch {
    All,
    List(Vec<String>),
}

impl Default for ToolMatch {
    fn default() -> Self {
        Self::All
    }
}

impl ToolMatch {
    pub fn matches(&self, tool: &str) -> bool {
        match self {
            Self::All => true,
            Self::List(tools) => tools.iter().any(|t| t == tool),
        }
    }

    /// `*` selects everything; otherwise a comma-separated tool list.
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim();
        if spec == "*" {
            Self::All
        } else {
            Self::List(parse_list(spec))
        }
    }
}

/// Policy knobs consumed by the response shaper.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaperConfig {
    /// Tools that enter the full condensation pipeline.
    pub condense_tools: ToolMatch,
    /// Tools encoded to TOON without preprocessing.
    pub toon_only_tools: Vec<String>,
    /// Raw-encode tools matched by neither list.
    pub toon_fallback: bool,
    /// Skip shaping entirely for responses below this token count.
    pub min_token_threshold: usize,
    /// Return the original when the condensed text is not smaller.
    pub revert_if_larger: bool,
    /// Global token cap; 0 = off.
    pub max_token_limit: usize,
    /// Per-tool caps, winning over the global one.
    pub tool_token_limits: BTreeMap<String, usize>,
    /// Heuristic preset resolved before overrides.
    pub profile: Profile,
    /// Server-wide heuristic overrides.
    pub heuristics: HeuristicsOverride,
    /// Per-tool heuristic overrides, deep-merged on top.
    pub tool_heuristics: BTreeMap<String, HeuristicsOverride>,
    /// Parser override for all tools.
    pub format_hint: Option<String>,
    /// Per-tool parser overrides.
    pub tool_format_hints: BTreeMap<String, String>,
}

impl Default for ShaperConfig {
    fn default() -> Self {
        Self {
            condense_tools: ToolMatch::All,
            toon_only_tools: Vec::new(),
            toon_fallback: true,
            min_token_threshold: 0,
            revert_if_larger: false,
            max_token_limit: 0,
            tool_token_limits: BTreeMap::new(),
            profile: Profile::Balanced,
            heuristics: HeuristicsOverride::default(),
            tool_heuristics: BTreeMap::new(),
            format_hint: None,
            tool_format_hints: BTreeMap::new(),
        }
    }
}

impl ShaperConfig {
    /// Build a config from the `CONDENSER_*` environment surface.
    /// Configuration errors (unknown heuristics or profiles, malformed
    /// numbers) fail the load; they are the only errors the engine ever
    /// propagates.
    pub fn from_env() -> CondenseResult<Self> {
        let mut cfg = Self::default();
        if let Ok(v) = std::env::var("CONDENSE_TOOLS") {
            cfg.condense_tools = ToolMatch::parse(&v);
        }
        if let Ok(v) = std::env::var("TOON_ONLY_TOOLS") {
            cfg.toon_only_tools = parse_list(&v);
        }
        if let Ok(v) = std::env::var("TOON_FALLBACK") {
            cfg.toon_fallback = parse_env_bool(&v);
        }
        if let Ok(v) = std::env::var("MIN_TOKEN_THRESHOLD") {
            cfg.min_token_threshold = parse_env_int("MIN_TOKEN_THRESHOLD", &v)?;
        }
        if let Ok(v) = std::env::var("REVERT_IF_LARGER") {
            cfg.revert_if_larger = parse_env_bool(&v);
        }
        if let Ok(v) = std::env::var("MAX_TOKEN_LIMIT") {
            cfg.max_token_limit = parse_env_int("MAX_TOKEN_LIMIT", &v)?;
        }
        if let Ok(v) = std::env::var("TOOL_TOKEN_LIMITS") {
            cfg.tool_token_limits = parse_tool_limits(&v)?;
        }
        if let Ok(v) = std::env::var("CONDENSER_HEURISTICS") {
            cfg.heuristics = HeuristicsOverride::from_pairs(&v)?;
        }
        if let Ok(v) = std::env::var("CONDENSER_PROFILE") {
            cfg.profile = Profile::parse(v.trim())?;
        }
        if let Ok(v) = std::env::var("CONDENSER_FORMAT") {
            let hint = v.trim().to_string();
            if !hint.is_empty() {
                cfg.format_hint = Some(hint);
            }
        }
        Ok(cfg)
    }

    /// Effective heuristics for one tool:
    /// profile → server overrides → tool overrides.
    pub fn effective_heuristics(&self, tool: &str) -> crate::condense::Heuristics {
        crate::condense::heuristics::resolve(
            self.profile,
            &self.heuristics,
            self.tool_heuristics.get(tool),
        )
    }

    /// Per-tool token cap, falling back to the global limit. 0 = no cap.
    pub fn effective_limit(&self, tool: &str) -> usize {
        self.tool_token_limits
            .get(tool)
            .copied()
            .unwrap_or(self.max_token_limit)
    }

    /// Per-tool format hint, falling back to the global hint.
    pub fn effective_hint(&self, tool: &str) -> Option<&str> {
        self.tool_format_hints
            .get(tool)
            .map(String::as_str)
            .or(self.format_hint.as_deref())
    }
}

fn parse_list(spec: &str) -> Vec<String> {
    spec.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_env_bool(raw: &str) -> bool {
    !matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "false" | "0" | "no"
    )
}

fn parse_env_int(name: &str, raw: &str) -> CondenseResult<usize> {
    raw.trim()
        .parse()
        .map_err(|_| CondenseError::Configuration {
            message: format!("{name} must be a non-negative integer, got '{raw}'"),
        })
}

/// `tool:limit` comma list, e.g. `list_pods:2000, describe:500`.
fn parse_tool_limits(spec: &str) -> CondenseResult<BTreeMap<String, usize>> {
    let mut out = BTreeMap::new();
    for pair in spec.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (tool, limit) = pair.rsplit_once(':').ok_or_else(|| {
            CondenseError::Configuration {
                message: format!("token limit entry '{pair}' is not tool:limit"),
            }
        })?;
        out.insert(
            tool.trim().to_string(),
            parse_env_int("TOOL_TOKEN_LIMITS", limit)?,
        );
    }
    Ok(out)
}
