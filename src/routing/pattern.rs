use std::fmt;

use uuid::Uuid;

use crate::routing::RegistrationError;

/// Type tag of a `<type:name>` segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// Any single non-empty segment (the default for `<name>`).
    Str,
    /// `-?[0-9]+`, coerced to `i64`.
    Int,
    /// `-?[0-9]+(.[0-9]+)?`, coerced to `f64`.
    Float,
    /// Canonical hyphenated UUID.
    Uuid,
    /// Greedy: everything that is left of the path, slashes included.
    Path,
}

impl ParamType {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "string" => Some(ParamType::Str),
            "int" => Some(ParamType::Int),
            "float" => Some(ParamType::Float),
            "uuid" => Some(ParamType::Uuid),
            "path" => Some(ParamType::Path),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            ParamType::Str => "string",
            ParamType::Int => "int",
            ParamType::Float => "float",
            ParamType::Uuid => "uuid",
            ParamType::Path => "path",
        }
    }

    /// Applies the type predicate and converts. `None` means "this pattern
    /// does not match", never an error.
    fn coerce(&self, raw: &str) -> Option<ParamValue> {
        if raw.is_empty() {
            return None;
        }
        match self {
            ParamType::Str => Some(ParamValue::Str(raw.to_string())),
            ParamType::Path => Some(ParamValue::Path(raw.to_string())),
            ParamType::Int => {
                if !is_signed_digits(raw) {
                    return None;
                }
                raw.parse::<i64>().ok().map(ParamValue::Int)
            }
            ParamType::Float => {
                let (whole, frac) = match raw.split_once('.') {
                    Some((w, f)) => (w, Some(f)),
                    None => (raw, None),
                };
                let frac_ok = frac.is_none_or(|f| !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()));
                if !is_signed_digits(whole) || !frac_ok {
                    return None;
                }
                raw.parse::<f64>().ok().map(ParamValue::Float)
            }
            ParamType::Uuid => {
                // hyphenated form only; Uuid::parse_str also takes simple/braced/urn
                if raw.len() != 36 {
                    return None;
                }
                Uuid::parse_str(raw).ok().map(ParamValue::Uuid)
            }
        }
    }
}

fn is_signed_digits(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// A coerced path parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Float(f64),
    Uuid(Uuid),
    Path(String),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) | ParamValue::Path(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(n) => Some(*n),
            ParamValue::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            ParamValue::Uuid(u) => Some(*u),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Str(s) | ParamValue::Path(s) => f.write_str(s),
            ParamValue::Int(n) => write!(f, "{}", n),
            ParamValue::Float(n) => write!(f, "{}", n),
            ParamValue::Uuid(u) => write!(f, "{}", u),
        }
    }
}

/// Path parameters bound by a successful match, in pattern order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathParams {
    values: Vec<(String, ParamValue)>,
}

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ParamValue::as_str)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(ParamValue::as_int)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn push(&mut self, name: &str, value: ParamValue) {
        self.values.push((name.to_string(), value));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param { name: String, kind: ParamType },
}

/// Specificity of one pattern position. Lower wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Rank {
    Literal,
    Typed,
    Greedy,
}

/// A compiled `/literal/<type:name>` path template.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    source: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Compiles a pattern string.
    ///
    /// Each `/`-separated segment is either entirely literal or entirely one
    /// `<name>` / `<type:name>` placeholder. At most one `path` segment is
    /// allowed and it must come last.
    pub fn parse(pattern: &str) -> Result<Self, RegistrationError> {
        let invalid = |reason: &str| RegistrationError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        if !pattern.starts_with('/') {
            return Err(invalid("pattern must start with '/'"));
        }

        let mut segments = Vec::new();
        for raw in split_segments(pattern) {
            let segment = if let Some(inner) = raw.strip_prefix('<') {
                let inner = inner
                    .strip_suffix('>')
                    .ok_or_else(|| invalid("unterminated '<' in segment"))?;
                let (tag, name) = match inner.split_once(':') {
                    Some((tag, name)) => (tag, name),
                    None => ("string", inner),
                };
                let kind = ParamType::from_tag(tag)
                    .ok_or_else(|| invalid(&format!("unknown parameter type '{}'", tag)))?;
                if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                    return Err(invalid(&format!("invalid parameter name '{}'", name)));
                }
                Segment::Param { name: name.to_string(), kind }
            } else {
                if raw.contains('<') || raw.contains('>') {
                    return Err(invalid("placeholders must span a whole segment"));
                }
                Segment::Literal(raw.to_string())
            };
            segments.push(segment);
        }

        let mut names = Vec::new();
        for (idx, seg) in segments.iter().enumerate() {
            if let Segment::Param { name, kind } = seg {
                if names.contains(&name.as_str()) {
                    return Err(invalid(&format!("duplicate parameter name '{}'", name)));
                }
                names.push(name.as_str());
                if *kind == ParamType::Path && idx + 1 != segments.len() {
                    return Err(invalid("a path parameter must be the last segment"));
                }
            }
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Two patterns with the same shape match exactly the same paths,
    /// whatever their parameter names.
    pub fn same_shape(&self, other: &RoutePattern) -> bool {
        self.segments.len() == other.segments.len()
            && self.segments.iter().zip(&other.segments).all(|pair| match pair {
                (Segment::Literal(a), Segment::Literal(b)) => a == b,
                (Segment::Param { kind: a, .. }, Segment::Param { kind: b, .. }) => a == b,
                _ => false,
            })
    }

    pub(crate) fn ranks(&self) -> Vec<Rank> {
        self.segments
            .iter()
            .map(|seg| match seg {
                Segment::Literal(_) => Rank::Literal,
                Segment::Param { kind: ParamType::Path, .. } => Rank::Greedy,
                Segment::Param { .. } => Rank::Typed,
            })
            .collect()
    }

    /// Matches an already percent-decoded path.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let parts: Vec<&str> = split_segments(path).collect();
        let mut params = PathParams::new();

        for (idx, seg) in self.segments.iter().enumerate() {
            match seg {
                Segment::Literal(lit) => {
                    if parts.get(idx) != Some(&lit.as_str()) {
                        return None;
                    }
                }
                Segment::Param { name, kind: ParamType::Path } => {
                    let rest = parts.get(idx..)?.join("/");
                    params.push(name, ParamType::Path.coerce(&rest)?);
                    return Some(params);
                }
                Segment::Param { name, kind } => {
                    let raw = parts.get(idx)?;
                    params.push(name, kind.coerce(raw)?);
                }
            }
        }

        (parts.len() == self.segments.len()).then_some(params)
    }

    /// Fills the pattern with concrete values.
    ///
    /// Non-greedy values are percent-encoded; greedy values keep their
    /// slashes. Every value must pass its placeholder's type predicate, and
    /// a non-greedy value may not contain `/`, so the result always routes
    /// back to this pattern with the same parameters.
    pub fn build_path(&self, values: &[(String, String)]) -> Result<String, BuildError> {
        if self.segments.is_empty() {
            return Ok("/".to_string());
        }
        let mut out = String::new();
        for seg in &self.segments {
            out.push('/');
            match seg {
                Segment::Literal(lit) => out.push_str(lit),
                Segment::Param { name, kind } => {
                    let value = values
                        .iter()
                        .find(|(k, _)| k == name)
                        .map(|(_, v)| v.as_str())
                        .ok_or_else(|| BuildError::Missing(name.clone()))?;

                    let splits = *kind != ParamType::Path && value.contains('/');
                    if splits || kind.coerce(value).is_none() {
                        return Err(BuildError::Invalid {
                            param: name.clone(),
                            value: value.to_string(),
                        });
                    }

                    if *kind == ParamType::Path {
                        let encoded: Vec<_> =
                            value.split('/').map(|p| urlencoding::encode(p)).collect();
                        out.push_str(&encoded.join("/"));
                    } else {
                        out.push_str(&urlencoding::encode(value));
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Why [`RoutePattern::build_path`] could not fill a placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    Missing(String),
    Invalid { param: String, value: String },
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// `/` → no segments, `/a/b/` → `["a", "b", ""]`.
fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let empty = trimmed.is_empty();
    trimmed.split('/').filter(move |_| !empty)
}
