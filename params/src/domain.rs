use crate::{Error, Mapping, Value};

/// One concrete assignment of a value to every parameter in a domain,
/// in the domain's parameter order.
pub type Permutation = Mapping;

/// Named parameters, each with an ordered list of candidate values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterDomain {
    params: Vec<(String, Vec<Value>)>,
}

impl ParameterDomain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter. Names must be unique.
    pub fn insert<T: Into<String>>(&mut self, name: T, values: Vec<Value>) -> Result<(), Error> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(Error::DuplicateParameter(name));
        }
        self.params.push((name, values));
        Ok(())
    }

    /// Builder-style version of `insert`.
    pub fn with<T: Into<String>>(mut self, name: T, values: Vec<Value>) -> Result<Self, Error> {
        self.insert(name, values)?;
        Ok(self)
    }

    /// Get the candidate values for a parameter.
    pub fn get(&self, name: &str) -> Option<&[Value]> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, vals)| vals.as_slice())
    }

    /// Number of parameters (not number of permutations).
    #[inline]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// A new domain with only the parameters for which `keep` returns true.
    pub fn filter<F: Fn(&str) -> bool>(&self, keep: F) -> Self {
        Self {
            params: self
                .params
                .iter()
                .filter(|(k, _)| keep(k))
                .cloned()
                .collect(),
        }
    }

    /// Number of permutations this domain produces: the product of all domain sizes.
    /// `None` if that doesn't fit in a `usize`.
    pub fn num_permutations(&self) -> Option<usize> {
        if self.params.iter().any(|(_, vals)| vals.is_empty()) {
            return Some(0);
        }
        self.params
            .iter()
            .try_fold(1usize, |acc, (_, vals)| acc.checked_mul(vals.len()))
    }
}

/// Every combination of parameter values, with the last parameter varying fastest.
///
/// An empty domain produces a single empty permutation;
/// a domain with any empty candidate list produces none.
pub fn permutations(domain: &ParameterDomain) -> Result<Vec<Permutation>, Error> {
    let total = domain
        .num_permutations()
        .ok_or(Error::TooManyPermutations)?;
    let mut perms = Vec::with_capacity(total);
    if total == 0 {
        return Ok(perms);
    }

    // odometer over candidate indices:
    let mut idxs = vec![0usize; domain.len()];
    loop {
        let perm: Permutation = domain
            .params
            .iter()
            .zip(&idxs)
            .map(|((name, vals), i)| (name.clone(), vals[*i].clone()))
            .collect();
        perms.push(perm);

        let mut k = idxs.len();
        loop {
            if k == 0 {
                debug_assert_eq!(perms.len(), total);
                return Ok(perms);
            }
            k -= 1;
            idxs[k] += 1;
            if idxs[k] < domain.params[k].1.len() {
                break;
            }
            idxs[k] = 0;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn strs(vals: &[&str]) -> Vec<Value> {
        vals.iter().map(|s| Value::from(*s)).collect()
    }

    #[test]
    fn test_product_order() -> Result<(), Error> {
        let domain = ParameterDomain::new()
            .with("a", vec![Value::Int(1), Value::Int(2)])?
            .with("b", strs(&["x", "y", "z"]))?;

        let perms = permutations(&domain)?;
        assert_eq!(perms.len(), 6);

        let flat: Vec<String> = perms
            .iter()
            .map(|p| format!("{}{}", p.get("a").unwrap(), p.get("b").unwrap()))
            .collect();
        assert_eq!(flat, ["1x", "1y", "1z", "2x", "2y", "2z"]);

        for perm in &perms {
            assert_eq!(perm.keys().collect::<Vec<_>>(), ["a", "b"]);
        }
        for (i, perm) in perms.iter().enumerate() {
            assert!(!perms[i + 1..].contains(perm));
        }
        Ok(())
    }

    #[test]
    fn test_sizes_multiply() -> Result<(), Error> {
        let domain = ParameterDomain::new()
            .with("a", strs(&["1", "2"]))?
            .with("b", strs(&["1", "2", "3"]))?
            .with("c", strs(&["1", "2", "3", "4"]))?;
        assert_eq!(domain.num_permutations(), Some(24));
        assert_eq!(permutations(&domain)?.len(), 24);
        Ok(())
    }

    #[test]
    fn test_empty() -> Result<(), Error> {
        let perms = permutations(&ParameterDomain::new())?;
        assert_eq!(perms, [Mapping::new()]);

        let domain = ParameterDomain::new()
            .with("a", strs(&["1"]))?
            .with("b", vec![])?;
        assert!(permutations(&domain)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_too_many_permutations() -> Result<(), Error> {
        // 2^64 combinations:
        let mut domain = ParameterDomain::new();
        for i in 0..64 {
            domain.insert(format!("p{i}"), strs(&["0", "1"]))?;
        }
        assert_eq!(domain.num_permutations(), None);
        assert!(matches!(
            permutations(&domain),
            Err(Error::TooManyPermutations)
        ));

        // ...unless one of them has no candidates at all:
        domain.insert("none", vec![])?;
        assert_eq!(domain.num_permutations(), Some(0));
        assert!(permutations(&domain)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_duplicate_name() {
        let res = ParameterDomain::new()
            .with("a", strs(&["1"]))
            .and_then(|d| d.with("a", strs(&["2"])));
        assert!(matches!(res, Err(Error::DuplicateParameter(name)) if name == "a"));
    }

    #[test]
    fn test_nested_values_are_cloned() -> Result<(), Error> {
        let list = Value::List(strs(&["p", "q"]));
        let domain = ParameterDomain::new().with("pair", vec![list.clone()])?;
        let perms = permutations(&domain)?;
        assert_eq!(perms[0].get("pair"), Some(&list));
        assert_eq!(domain.get("pair"), Some(&[list][..]));
        Ok(())
    }
}
