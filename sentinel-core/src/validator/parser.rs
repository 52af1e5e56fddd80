//! Free-form signal text → structured intermediate.
//!
//! The parser is deliberately forgiving: anything it cannot find is left
//! empty and the validator turns the gap into a failed check.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::Direction;
use crate::error::{CoreError, Result};

macro_rules! re {
    ($pat:expr) => {
        LazyLock::new(|| Regex::new($pat).unwrap())
    };
}

static RE_PAIR: LazyLock<Regex> = re!(r"\b([A-Z]{2,10})[/-]?(?:USDT|USDC|BUSD|PERP)\b");
static RE_LONG: LazyLock<Regex> = re!(r"(?i)\b(long|buy|compra|comprar)\b");
static RE_SHORT: LazyLock<Regex> = re!(r"(?i)\b(short|sell|venta|vender)\b");
static RE_ENTRADA: LazyLock<Regex> = re!(r"(?i)\bentrada\b");
static RE_ADD: LazyLock<Regex> =
    re!(r"(?i)\b(add|adding|increase|increasing|aumentar|aumenta|scale\s+in|average\s+down)\b");
static RE_LEVERAGE: LazyLock<Regex> = re!(r"(?i)\b(\d{1,3})\s*x\b");
static RE_PRICE: LazyLock<Regex> = re!(r"(\$)?(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)");
static RE_STOP_KW: LazyLock<Regex> = re!(r"(?i)\b(stop(?:[\s-]?loss)?|sl|invalidation)\b");
static RE_TARGET_KW: LazyLock<Regex> =
    re!(r"(?i)\b(targets?|tp\d?|take[\s-]?profit|objetivos?|tgt)\b");
static RE_ENTRY_KW: LazyLock<Regex> = re!(concat!(
    r"(?i)(\b(entry|entrada|buy|compra|sell|venta|at|increase|add|aumentar",
    r"|zone|esperar|long|short)\b|@)"
));
static RE_URGENCY: LazyLock<Regex> = re!(concat!(
    r"(?i)\b(urgent|urgente|now|ahora|asap|hurry|immediately|inmediatamente",
    r"|last\s+chance|don'?t\s+miss|no\s+te\s+lo\s+pierdas)\b"
));
static RE_EMOJI_BURST: LazyLock<Regex> = re!(r"(?:🚀|🔥|💰|💎|📈){2,}");
static RE_EXCLAIM: LazyLock<Regex> = re!(r"!{2,}");
static RE_CAPS_WORD: LazyLock<Regex> = re!(r"\b[A-Z]{4,}\b");

/// Words that are routinely upper-cased in signals and are not shouting.
const STRUCTURAL_WORDS: [&str; 12] = [
    "LONG", "SHORT", "ENTRY", "ENTRADA", "STOP", "LOSS", "TARGET", "TARGETS", "USDT", "USDC",
    "PERP", "BUSD",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    #[default]
    Open,
    /// Add to / increase an existing position.
    AddToPosition,
}

/// Lexical markers of fear-of-missing-out language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FomoMarkers {
    pub urgency_words: usize,
    pub emoji_bursts: usize,
    pub exclamation_runs: usize,
    pub shouting_words: usize,
}

impl FomoMarkers {
    /// Shouting counts as one marker once three words are in caps.
    pub fn total(&self) -> usize {
        self.urgency_words
            + self.emoji_bursts
            + self.exclamation_runs
            + usize::from(self.shouting_words >= 3)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedSignal {
    pub symbol: Option<String>,
    pub direction: Option<Direction>,
    pub entries: Vec<f64>,
    pub targets: Vec<f64>,
    pub stop_loss: Option<f64>,
    pub leverage: Option<f64>,
    pub intent: Intent,
    pub fomo: FomoMarkers,
}

impl ParsedSignal {
    /// Symbol and direction, or why they could not be extracted.
    pub fn require_core(&self) -> Result<(&str, Direction)> {
        match (self.symbol.as_deref(), self.direction) {
            (Some(symbol), Some(direction)) => Ok((symbol, direction)),
            (None, Some(_)) => Err(CoreError::MalformedSignalText("no symbol found".into())),
            (Some(_), None) => Err(CoreError::MalformedSignalText("no direction found".into())),
            (None, None) => Err(CoreError::MalformedSignalText(
                "no symbol or direction found".into(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ParserConfig {
    /// Bare tickers recognised without a quote currency.
    pub known_symbols: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            known_symbols: [
                "BTC", "ETH", "SOL", "BNB", "XRP", "ADA", "DOGE", "AVAX", "DOT", "LINK", "MATIC",
                "LTC",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PriceRole {
    Entry,
    Target,
    Stop,
}

#[derive(Debug, Clone)]
pub struct SignalParser {
    symbols: Option<Regex>,
    known: Vec<String>,
}

impl SignalParser {
    pub fn new(config: &ParserConfig) -> Result<Self> {
        let known: Vec<String> = config
            .known_symbols
            .iter()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        let symbols = if known.is_empty() {
            None
        } else {
            let alternation = known
                .iter()
                .map(|s| regex::escape(s))
                .collect::<Vec<_>>()
                .join("|");
            let pattern = format!(r"(?i)\b({alternation})\b");
            let regex = Regex::new(&pattern)
                .map_err(|e| CoreError::InvalidConfig(format!("known_symbols: {e}")))?;
            Some(regex)
        };
        Ok(Self { symbols, known })
    }

    pub fn parse(&self, text: &str) -> ParsedSignal {
        let mut parsed = ParsedSignal {
            symbol: self.symbol(text),
            direction: direction(text),
            leverage: RE_LEVERAGE
                .captures(text)
                .and_then(|c| c[1].parse::<f64>().ok()),
            intent: if RE_ADD.is_match(text) {
                Intent::AddToPosition
            } else {
                Intent::Open
            },
            fomo: self.fomo(text),
            ..ParsedSignal::default()
        };

        let mut unclassified = Vec::new();
        for line in text.lines() {
            for (offset, price) in prices(line) {
                match classify(line, offset) {
                    Some(PriceRole::Entry) => parsed.entries.push(price),
                    Some(PriceRole::Target) => parsed.targets.push(price),
                    Some(PriceRole::Stop) => {
                        if parsed.stop_loss.is_none() {
                            parsed.stop_loss = Some(price);
                        }
                    }
                    None => unclassified.push(price),
                }
            }
        }
        if parsed.entries.is_empty() && !unclassified.is_empty() {
            let split = unclassified.len().min(2);
            parsed.targets.extend(unclassified.drain(split..));
            parsed.entries = unclassified;
        }

        parsed
    }

    fn symbol(&self, text: &str) -> Option<String> {
        if let Some(c) = RE_PAIR.captures(text) {
            return Some(c[1].to_string());
        }
        self.symbols
            .as_ref()
            .and_then(|re| re.captures(text))
            .map(|c| c[1].to_uppercase())
    }

    fn fomo(&self, text: &str) -> FomoMarkers {
        let shouting_words = RE_CAPS_WORD
            .find_iter(text)
            .filter(|m| {
                let word = m.as_str();
                !STRUCTURAL_WORDS.contains(&word) && !self.known.iter().any(|k| k == word)
            })
            .count();
        FomoMarkers {
            urgency_words: RE_URGENCY.find_iter(text).count(),
            emoji_bursts: RE_EMOJI_BURST.find_iter(text).count(),
            exclamation_runs: RE_EXCLAIM.find_iter(text).count(),
            shouting_words,
        }
    }
}

fn direction(text: &str) -> Option<Direction> {
    let long = RE_LONG.find(text).map(|m| m.start());
    let short = RE_SHORT.find(text).map(|m| m.start());
    match (long, short) {
        (Some(l), Some(s)) => Some(if l <= s { Direction::Long } else { Direction::Short }),
        (Some(_), None) => Some(Direction::Long),
        (None, Some(_)) => Some(Direction::Short),
        (None, None) if RE_ENTRADA.is_match(text) => Some(Direction::Long),
        (None, None) => None,
    }
}

/// Prices in a line with their byte offsets. Labels ("Target 2:"), leverage
/// ("10x"), percentages and digits glued to words ("TP1") are skipped.
fn prices(line: &str) -> Vec<(usize, f64)> {
    let mut out = Vec::new();
    for caps in RE_PRICE.captures_iter(line) {
        let (Some(whole), Some(number)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        let dollar = caps.get(1).is_some();
        let before = line[..whole.start()].chars().next_back();
        if before.is_some_and(|c| c.is_alphanumeric() || c == '.') {
            continue;
        }
        let after = line[whole.end()..].trim_start().chars().next();
        match after {
            Some('%') | Some('x') | Some('X') => continue,
            Some(':') if !dollar => continue,
            _ => {}
        }
        if let Ok(value) = number.as_str().replace(',', "").parse::<f64>() {
            if value > 0.0 && value.is_finite() {
                out.push((whole.start(), value));
            }
        }
    }
    out
}

/// Role of the price at `offset`: the nearest keyword before it on the line,
/// else any keyword on the line (stop over target over entry).
fn classify(line: &str, offset: usize) -> Option<PriceRole> {
    let kinds = [
        (PriceRole::Stop, &*RE_STOP_KW),
        (PriceRole::Target, &*RE_TARGET_KW),
        (PriceRole::Entry, &*RE_ENTRY_KW),
    ];
    let prefix = &line[..offset];
    let nearest = kinds
        .iter()
        .filter_map(|(role, re)| re.find_iter(prefix).last().map(|m| (m.end(), *role)))
        .max_by_key(|(end, _)| *end)
        .map(|(_, role)| role);
    nearest.or_else(|| kinds.iter().find(|(_, re)| re.is_match(line)).map(|(role, _)| *role))
}
