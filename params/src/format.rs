use std::sync::OnceLock;

use regex::Regex;

use crate::{Error, Mapping, Value};

/// `{{` and `}}` are escaped braces; everything else is `{name[.attr...][:spec]}`.
const PLACEHOLDER_PATTERN: &str = concat!(
    r"\{\{|\}\}",
    r"|\{([A-Za-z_][A-Za-z0-9_]*)((?:\.[A-Za-z_][A-Za-z0-9_]*)*)(?::([^{}]*))?\}",
);

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PLACEHOLDER_PATTERN).expect("placeholder pattern is valid"))
}

/// A parsed `{name.attr:spec}` placeholder.
#[derive(Debug, PartialEq)]
struct Placeholder<'a> {
    name: &'a str,
    /// attribute chain without leading dot, e.g. "date.doy" -> "doy"
    attrs: &'a str,
    spec: Option<&'a str>,
}

#[derive(Debug, PartialEq)]
enum Piece<'a> {
    Text(&'a str),
    Placeholder(Placeholder<'a>),
}

/// Root names of all placeholders in `s`, in order of appearance.
/// Stray braces are ignored here; they only matter when `s` is actually formatted.
pub fn placeholder_names(s: &str) -> impl Iterator<Item = &str> {
    placeholder_re()
        .captures_iter(s)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
}

fn parse(s: &str) -> Result<Vec<Piece<'_>>, Error> {
    let mut pieces = Vec::with_capacity(4);
    let mut last_end = 0;
    for caps in placeholder_re().captures_iter(s) {
        let whole = caps.get(0).expect("group 0 always matches");
        push_text(&s[last_end..whole.start()], s, &mut pieces)?;
        last_end = whole.end();

        match (caps.get(1), whole.as_str()) {
            (Some(name), _) => pieces.push(Piece::Placeholder(Placeholder {
                name: name.as_str(),
                attrs: caps
                    .get(2)
                    .map(|m| m.as_str().trim_start_matches('.'))
                    .unwrap_or(""),
                spec: caps.get(3).map(|m| m.as_str()),
            })),
            (None, "{{") => pieces.push(Piece::Text("{")),
            (None, _) => pieces.push(Piece::Text("}")),
        }
    }
    push_text(&s[last_end..], s, &mut pieces)?;
    Ok(pieces)
}

fn push_text<'a>(text: &'a str, whole: &str, pieces: &mut Vec<Piece<'a>>) -> Result<(), Error> {
    if text.contains(['{', '}']) {
        return Err(Error::MalformedTemplate(whole.to_owned()));
    }
    if !text.is_empty() {
        pieces.push(Piece::Text(text));
    }
    Ok(())
}

/// Format `s`, substituting placeholders with values from `perm`.
/// Fails if a placeholder names a parameter that `perm` doesn't have.
pub fn format_str(s: &str, perm: &Mapping) -> Result<String, Error> {
    let mut out = String::with_capacity(s.len() + 16);
    for piece in parse(s)? {
        match piece {
            Piece::Text(text) => out.push_str(text),
            Piece::Placeholder(p) => {
                let val = lookup(&p, perm)?;
                match p.spec {
                    Some(spec) if !spec.is_empty() => {
                        FormatSpec::parse(spec)?.write(&val, spec, &mut out)?
                    }
                    _ => out.push_str(&val.to_string()),
                }
            }
        }
    }
    Ok(out)
}

fn lookup(p: &Placeholder, perm: &Mapping) -> Result<Value, Error> {
    let mut val = perm
        .get(p.name)
        .cloned()
        .ok_or_else(|| Error::MissingParameter(p.name.to_owned()))?;
    if p.attrs.is_empty() {
        return Ok(val);
    }
    let mut path = p.name.to_owned();
    for attr in p.attrs.split('.') {
        val = val
            .attr(attr)
            .ok_or_else(|| Error::MissingAttribute(path.clone(), attr.to_owned()))?;
        path.push('.');
        path.push_str(attr);
    }
    Ok(val)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Align {
    Left,
    Right,
    Center,
}

impl Align {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '<' => Some(Self::Left),
            '>' => Some(Self::Right),
            '^' => Some(Self::Center),
            _ => None,
        }
    }
}

/// Subset of the common `[[fill]align][0][width][.precision][type]` mini-language.
#[derive(Debug, PartialEq)]
struct FormatSpec {
    fill: char,
    align: Option<Align>,
    zero: bool,
    width: usize,
    precision: Option<usize>,
    ty: Option<char>,
}

impl FormatSpec {
    fn parse(spec: &str) -> Result<Self, Error> {
        let invalid = || Error::InvalidFormatSpec(spec.to_owned());
        let chars: Vec<char> = spec.chars().collect();
        let mut i = 0;

        let mut fill = ' ';
        let mut align = None;
        if chars.len() >= 2 && Align::from_char(chars[1]).is_some() {
            fill = chars[0];
            align = Align::from_char(chars[1]);
            i = 2;
        } else if let Some(a) = chars.first().and_then(|c| Align::from_char(*c)) {
            align = Some(a);
            i = 1;
        }

        let mut zero = false;
        if chars.get(i) == Some(&'0') {
            zero = true;
            i += 1;
        }

        // no digits means no minimum width:
        let width = take_number(&chars, &mut i, spec)?.unwrap_or(0);

        let mut precision = None;
        if chars.get(i) == Some(&'.') {
            i += 1;
            precision = Some(take_number(&chars, &mut i, spec)?.ok_or_else(invalid)?);
        }

        let ty = match chars.get(i) {
            Some(c @ ('d' | 's' | 'f')) => {
                i += 1;
                Some(*c)
            }
            Some(_) => return Err(invalid()),
            None => None,
        };
        if i != chars.len() {
            return Err(invalid());
        }

        Ok(Self {
            fill,
            align,
            zero,
            width,
            precision,
            ty,
        })
    }

    fn write(&self, val: &Value, spec: &str, out: &mut String) -> Result<(), Error> {
        let incompatible = || Error::IncompatibleFormat(spec.to_owned(), val.type_name());
        let numeric = matches!(val, Value::Int(_) | Value::Float(_));

        let body = match (self.ty, val) {
            (Some('d'), Value::Int(i)) => i.to_string(),
            (Some('d'), _) => return Err(incompatible()),
            (Some('f'), Value::Int(i)) => format!("{:.*}", self.precision.unwrap_or(6), *i as f64),
            (Some('f'), Value::Float(x)) => format!("{:.*}", self.precision.unwrap_or(6), x),
            (Some('f'), _) => return Err(incompatible()),
            (_, Value::Float(x)) if self.precision.is_some() => {
                format!("{:.*}", self.precision.unwrap_or(6), x)
            }
            (_, Value::Str(s)) => match self.precision {
                Some(p) => s.chars().take(p).collect(),
                None => s.clone(),
            },
            (_, other) => other.to_string(),
        };

        let len = body.chars().count();
        if len >= self.width {
            out.push_str(&body);
            return Ok(());
        }
        let pad = self.width - len;

        // zero-padding goes between the sign and the digits:
        if self.zero && self.align.is_none() && numeric {
            let (sign, digits) = match body.strip_prefix('-') {
                Some(rest) => ("-", rest),
                None => ("", body.as_str()),
            };
            out.push_str(sign);
            out.extend(std::iter::repeat('0').take(pad));
            out.push_str(digits);
            return Ok(());
        }

        let fill = if self.zero && self.align.is_none() { '0' } else { self.fill };
        let align = self
            .align
            .unwrap_or(if numeric { Align::Right } else { Align::Left });
        let (left, right) = match align {
            Align::Left => (0, pad),
            Align::Right => (pad, 0),
            Align::Center => (pad / 2, pad - pad / 2),
        };
        out.extend(std::iter::repeat(fill).take(left));
        out.push_str(&body);
        out.extend(std::iter::repeat(fill).take(right));
        Ok(())
    }
}

/// Parse the run of digits starting at `i`, if any, and move `i` past it.
fn take_number(chars: &[char], i: &mut usize, spec: &str) -> Result<Option<usize>, Error> {
    let start = *i;
    while chars.get(*i).is_some_and(|c| c.is_ascii_digit()) {
        *i += 1;
    }
    if *i == start {
        return Ok(None);
    }
    chars[start..*i]
        .iter()
        .collect::<String>()
        .parse()
        .map(Some)
        .map_err(|_| Error::InvalidFormatSpec(spec.to_owned()))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::GpsDate;

    fn perm() -> Mapping {
        [
            ("station", Value::from("ONSA")),
            ("n", Value::Int(7)),
            ("neg", Value::Int(-7)),
            ("x", Value::Float(2.5)),
            ("date", Value::Date(GpsDate::from_ymd(2024, 1, 9).unwrap())),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_plain() -> Result<(), Error> {
        let p = perm();
        assert_eq!(format_str("{station}00SWE", &p)?, "ONSA00SWE");
        assert_eq!(format_str("no placeholders", &p)?, "no placeholders");
        assert_eq!(format_str("{date}", &p)?, "2024-01-09");
        assert_eq!(format_str("{{station}}", &p)?, "{station}");
        // whole-placeholder strings are still strings:
        assert_eq!(format_str("{n}", &p)?, "7");
        assert_eq!(format_str("{x}", &p)?, "2.5");
        Ok(())
    }

    #[test]
    fn test_attrs_and_specs() -> Result<(), Error> {
        let p = perm();
        assert_eq!(
            format_str("COD{date.gpsweek}{date.dow}.EPH", &p)?,
            "COD22962.EPH"
        );
        assert_eq!(format_str("{date.doy:03d}0", &p)?, "0090");
        assert_eq!(format_str("[{station:>6}]", &p)?, "[  ONSA]");
        assert_eq!(format_str("[{station:*^8}]", &p)?, "[**ONSA**]");
        assert_eq!(format_str("[{n:<3}]", &p)?, "[7  ]");
        assert_eq!(format_str("{neg:04d}", &p)?, "-007");
        assert_eq!(format_str("{x:.2f}", &p)?, "2.50");
        assert_eq!(format_str("{station:.2}", &p)?, "ON");
        Ok(())
    }

    #[test]
    fn test_errors() {
        let p = perm();
        assert!(matches!(
            format_str("{nope}", &p),
            Err(Error::MissingParameter(name)) if name == "nope"
        ));
        assert!(matches!(
            format_str("{date.century}", &p),
            Err(Error::MissingAttribute(path, attr)) if path == "date" && attr == "century"
        ));
        assert!(matches!(
            format_str("{station", &p),
            Err(Error::MalformedTemplate(_))
        ));
        assert!(matches!(
            format_str("{station:d}", &p),
            Err(Error::IncompatibleFormat(_, "string"))
        ));
        assert!(matches!(
            format_str("{n:x}", &p),
            Err(Error::InvalidFormatSpec(_))
        ));
        // widths too large for a usize are rejected, not ignored:
        assert!(matches!(
            format_str("{n:99999999999999999999999d}", &p),
            Err(Error::InvalidFormatSpec(_))
        ));
        assert!(matches!(
            format_str("{x:.99999999999999999999999f}", &p),
            Err(Error::InvalidFormatSpec(_))
        ));
    }

    #[test]
    fn test_placeholder_names() {
        let names: Vec<&str> =
            placeholder_names("{a}/{abc.doy:03d}/{{b}}/{ c }/{d.}").collect();
        assert_eq!(names, ["a", "abc"]);
    }
}
