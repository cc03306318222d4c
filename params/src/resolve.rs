use util::HashSet;

use crate::{format_str, permutations, placeholder_names, Error, Mapping};
use crate::{ParameterDomain, Permutation, Value};

/// The subset of `domain` whose parameters are referenced by a placeholder
/// somewhere in `template`. Matching is by placeholder root name, so `{abc}`
/// references `abc` but not `a`.
pub fn referenced(template: &Value, domain: &ParameterDomain) -> ParameterDomain {
    referenced_by(std::iter::once(template), domain)
}

fn referenced_by<'a>(
    templates: impl IntoIterator<Item = &'a Value>,
    domain: &ParameterDomain,
) -> ParameterDomain {
    let mut names = HashSet::default();
    for template in templates {
        template.for_each_str(&mut |s| names.extend(placeholder_names(s)));
    }
    domain.filter(|name| names.contains(name))
}

/// Expand `template` into one concrete copy per permutation of the parameters it uses.
///
/// Parameters the template never mentions are left out of the expansion,
/// so they can't multiply the result with identical copies.
/// If no parameters are used at all, the template is returned unchanged.
pub fn resolve(template: &Value, domain: &ParameterDomain) -> Result<Vec<Value>, Error> {
    expand(template, referenced(template, domain), substitute)
}

/// Same as [`resolve`], for a mapping of named arguments.
pub fn resolve_mapping(
    template: &Mapping,
    domain: &ParameterDomain,
) -> Result<Vec<Mapping>, Error> {
    let domain = referenced_by(template.iter().map(|(_, v)| v), domain);
    expand(template, domain, substitute_mapping)
}

fn expand<T: Clone>(
    template: &T,
    domain: ParameterDomain,
    substitute: fn(&T, &Permutation) -> Result<T, Error>,
) -> Result<Vec<T>, Error> {
    if domain.is_empty() {
        return Ok(vec![template.clone()]);
    }
    let perms = permutations(&domain)?;
    log::debug!(
        "resolving template with parameters [{}] into {} copies",
        domain.names().collect::<Vec<_>>().join(", "),
        perms.len(),
    );
    perms.iter().map(|perm| substitute(template, perm)).collect()
}

/// Format every string leaf of `template` with `perm`, keeping its structure.
/// Map keys are left alone.
pub fn substitute(template: &Value, perm: &Permutation) -> Result<Value, Error> {
    match template {
        Value::Str(s) => Ok(Value::Str(format_str(s, perm)?)),
        Value::List(items) => Ok(Value::List(
            items
                .iter()
                .map(|item| substitute(item, perm))
                .collect::<Result<_, _>>()?,
        )),
        Value::Map(map) => Ok(Value::Map(substitute_mapping(map, perm)?)),
        other => Ok(other.clone()),
    }
}

fn substitute_mapping(map: &Mapping, perm: &Permutation) -> Result<Mapping, Error> {
    let mut out = Mapping::with_capacity(map.len());
    for (k, v) in map.iter() {
        out.insert(k, substitute(v, perm)?);
    }
    Ok(out)
}
