//! The runtime value domain and its comparison semantics.
//!
//! Every evaluated expression yields a [`Value`]. The comparison rules carry
//! the engine's semantic pins:
//!
//! - `Undefined` compared with anything (itself included) is false for `=`,
//!   `!=`, and the ordering operators; `is` / `is not` treat `Undefined` as
//!   equal only to `Undefined`.
//! - `empty` equals any zero-length sequence, set, or string under `=`.
//! - Numbers are uniformly `f64`; `3` and `3.0` are the same value.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use regex_automata::dfa::regex::Regex as DfaRegex;
use regex_automata::util::syntax;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// A runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Seq(Vec<Value>),
    Set(Arc<LiteralSet>),
    /// Document interior node; never the result of an expression.
    Object(IndexMap<String, Value>),
    Regex(Arc<CompiledRegex>),
    Empty,
    Undefined,
}

impl Value {
    /// Equality under `=` / `!=`. `Undefined` is never equal to anything.
    pub fn loose_eq(&self, other: &Value) -> bool {
        use Value::*;
        match (self, other) {
            (Undefined, _) | (_, Undefined) => false,
            (Empty, Empty) => true,
            (Empty, v) | (v, Empty) => v.is_zero_len(),
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Number(a), Number(b)) => a == b,
            (Str(a), Str(b)) => a == b,
            (Seq(a), Seq(b)) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y)),
            (Set(a), Set(b)) => a.same_members(b),
            (Object(a), Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|w| v.loose_eq(w)))
            }
            (Regex(a), Regex(b)) => a.pattern() == b.pattern() && a.flags() == b.flags(),
            _ => false,
        }
    }

    /// Equality under `is` / `is not`: like [`loose_eq`](Self::loose_eq) but
    /// `Undefined is Undefined` holds.
    pub fn is_eq(&self, other: &Value) -> bool {
        matches!((self, other), (Value::Undefined, Value::Undefined)) || self.loose_eq(other)
    }

    /// Ordering under `<` `<=` `>` `>=`. Only numbers order with numbers and
    /// strings with strings; everything else is incomparable.
    pub fn partial_cmp_values(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Truthiness of a value at boolean position.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Seq(items) => !items.is_empty(),
            Value::Set(set) => !set.is_empty(),
            Value::Object(map) => !map.is_empty(),
            Value::Regex(_) => true,
            Value::Null | Value::Empty | Value::Undefined => false,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    fn is_zero_len(&self) -> bool {
        match self {
            Value::Str(s) => s.is_empty(),
            Value::Seq(items) => items.is_empty(),
            Value::Set(set) => set.is_empty(),
            _ => false,
        }
    }

    /// Total order over ground values, used for the sorted literal-set
    /// representation. Orders first by type tag, then by payload.
    pub(crate) fn total_cmp(&self, other: &Value) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Null => 0,
                Value::Bool(_) => 1,
                Value::Number(_) => 2,
                Value::Str(_) => 3,
                Value::Empty => 4,
                Value::Seq(_) => 5,
                Value::Set(_) => 6,
                Value::Object(_) => 7,
                Value::Regex(_) => 8,
                Value::Undefined => 9,
            }
        }
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

impl PartialEq for Value {
    /// Structural equality (fingerprints, tests). Unlike
    /// [`loose_eq`](Self::loose_eq) this treats `Undefined` as equal to
    /// itself.
    fn eq(&self, other: &Value) -> bool {
        matches!((self, other), (Value::Undefined, Value::Undefined)) || self.loose_eq(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{}", fmt_number(*n)),
            Value::Str(s) => write!(f, "'{s}'"),
            Value::Seq(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Set(set) => write!(f, "{set}"),
            Value::Object(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Regex(re) => write!(f, "/{}/{}", re.pattern(), re.flags()),
            Value::Empty => write!(f, "empty"),
            Value::Undefined => write!(f, "Undefined"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null | Value::Undefined => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Seq(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Set(set) => {
                let members = set.members();
                let mut seq = serializer.serialize_seq(Some(members.len()))?;
                for member in members {
                    seq.serialize_element(member)?;
                }
                seq.end()
            }
            Value::Object(map) => {
                let mut m = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    m.serialize_entry(k, v)?;
                }
                m.end()
            }
            Value::Regex(re) => serializer.serialize_str(&format!("/{}/{}", re.pattern(), re.flags())),
            Value::Empty => serializer.serialize_str(""),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Seq(items)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::Seq(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            ),
        }
    }
}

/// Canonical number rendering: integers print without a fraction part.
pub(crate) fn fmt_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Error constructing a literal set from non-ground members.
#[derive(Debug, Clone, thiserror::Error)]
#[error("literal set member must be a string, number, or constant, got {0}")]
pub struct NonGroundMember(pub String);

/// A compile-time ground collection, the left operand of `contains`.
///
/// The lookup representation is chosen once at construction:
/// small-range integers become a bitset, all-string sets a hash set, and
/// everything else a sorted vector probed by binary search.
#[derive(Debug)]
pub struct LiteralSet {
    members: Vec<Value>,
    repr: SetRepr,
}

#[derive(Debug)]
enum SetRepr {
    /// All members are integers inside a compact range. `bits[i]` covers
    /// values `base + 64*i ..`.
    IntBits { base: i64, bits: Vec<u64> },
    Strings(HashSet<String>),
    Sorted(Vec<Value>),
}

/// Integer sets spanning at most this many values get the bitset.
const BITSET_MAX_RANGE: i64 = 4096;

impl LiteralSet {
    /// Builds a set from ground members, picking the densest representation.
    /// Fails if any member is not a string, number, or constant.
    pub fn new(members: Vec<Value>) -> Result<Self, NonGroundMember> {
        for member in &members {
            match member {
                Value::Str(_) | Value::Number(_) | Value::Bool(_) | Value::Null | Value::Empty => {}
                other => return Err(NonGroundMember(other.to_string())),
            }
        }
        let repr = Self::pick_repr(&members);
        Ok(Self { members, repr })
    }

    fn pick_repr(members: &[Value]) -> SetRepr {
        if !members.is_empty() {
            let ints: Option<Vec<i64>> = members
                .iter()
                .map(|m| match m {
                    Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(*n as i64),
                    _ => None,
                })
                .collect();
            if let Some(ints) = ints {
                let base = *ints.iter().min().expect("non-empty");
                let max = *ints.iter().max().expect("non-empty");
                if max - base < BITSET_MAX_RANGE {
                    let mut bits = vec![0u64; (max - base) as usize / 64 + 1];
                    for v in ints {
                        let off = (v - base) as usize;
                        bits[off / 64] |= 1u64 << (off % 64);
                    }
                    return SetRepr::IntBits { base, bits };
                }
            }

            if members.iter().all(|m| matches!(m, Value::Str(_))) {
                let strings = members
                    .iter()
                    .map(|m| match m {
                        Value::Str(s) => s.clone(),
                        _ => unreachable!("checked all-string"),
                    })
                    .collect();
                return SetRepr::Strings(strings);
            }
        }

        let mut sorted = members.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        SetRepr::Sorted(sorted)
    }

    /// Membership test under `=` equality.
    pub fn contains(&self, probe: &Value) -> bool {
        match &self.repr {
            SetRepr::IntBits { base, bits } => match probe {
                Value::Number(n) if n.fract() == 0.0 => {
                    let off = *n as i64 - base;
                    if off < 0 {
                        return false;
                    }
                    let off = off as usize;
                    off / 64 < bits.len() && bits[off / 64] & (1u64 << (off % 64)) != 0
                }
                _ => false,
            },
            SetRepr::Strings(strings) => match probe {
                Value::Str(s) => strings.contains(s),
                _ => false,
            },
            SetRepr::Sorted(sorted) => sorted
                .binary_search_by(|m| m.total_cmp(probe))
                .is_ok(),
        }
    }

    /// Members in declaration order.
    pub fn members(&self) -> &[Value] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn same_members(&self, other: &LiteralSet) -> bool {
        if self.members.len() != other.members.len() {
            return false;
        }
        let mut a = self.members.clone();
        let mut b = other.members.clone();
        a.sort_by(|x, y| x.total_cmp(y));
        b.sort_by(|x, y| x.total_cmp(y));
        a.iter().zip(&b).all(|(x, y)| x.loose_eq(y))
    }

    #[cfg(test)]
    pub(crate) fn repr_name(&self) -> &'static str {
        match &self.repr {
            SetRepr::IntBits { .. } => "bitset",
            SetRepr::Strings(_) => "strings",
            SetRepr::Sorted(_) => "sorted",
        }
    }
}

impl PartialEq for LiteralSet {
    fn eq(&self, other: &Self) -> bool {
        self.same_members(other)
    }
}

impl fmt::Display for LiteralSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, member) in self.members.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{member}")?;
        }
        write!(f, "}}")
    }
}

/// Error compiling a regex literal.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegexError {
    #[error("unknown regex flag `{0}`")]
    UnknownFlag(char),
    #[error("invalid regex: {0}")]
    Build(String),
}

/// Accepted regex flags. `l` parses but has no effect on matching.
const REGEX_FLAGS: &str = "imsul";

/// A slash-delimited regex literal, compiled once at parse time.
///
/// Matching is unanchored substring search over a dense DFA.
pub struct CompiledRegex {
    pattern: String,
    flags: String,
    re: DfaRegex,
}

impl CompiledRegex {
    pub fn new(pattern: &str, flags: &str) -> Result<Self, RegexError> {
        for flag in flags.chars() {
            if !REGEX_FLAGS.contains(flag) {
                return Err(RegexError::UnknownFlag(flag));
            }
        }

        let syntax = syntax::Config::new()
            .case_insensitive(flags.contains('i'))
            .multi_line(flags.contains('m'))
            .dot_matches_new_line(flags.contains('s'));

        let re = DfaRegex::builder()
            .syntax(syntax)
            .build(pattern)
            .map_err(|e| RegexError::Build(e.to_string()))?;

        Ok(Self {
            pattern: pattern.to_owned(),
            flags: flags.to_owned(),
            re,
        })
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.re.is_match(haystack)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }
}

impl fmt::Debug for CompiledRegex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRegex")
            .field("pattern", &self.pattern)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl PartialEq for CompiledRegex {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.flags == other.flags
    }
}
