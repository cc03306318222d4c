use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;

use params::{GpsDate, Mapping, ParameterDomain, Value};
use sources::{MaxAge, Source};
use tasks::{Registry, TaskDefinition};
use util::HashSet;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Identifier \"{0}\" is used by more than one entry")]
    DuplicateIdentifier(String),
    #[error("Mapping keys must be strings, got {0:?}")]
    NonStringKey(serde_yaml::Value),
    #[error("YAML tags are not supported (found \"{0}\")")]
    UnsupportedTag(String),
    #[error("Number {0} is out of range")]
    NumberOutOfRange(serde_yaml::Number),
    #[error("Date range of \"{0}\" ends before it begins")]
    EmptyDateRange(String),
}

/// Top level of a campaign config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    pub identifier: String,
    #[serde(default)]
    pub description: String,
    /// Name of a registered operation
    pub run: String,
    #[serde(default)]
    pub arguments: serde_yaml::Mapping,
    #[serde(default)]
    pub parameters: serde_yaml::Mapping,
    /// Name of a registered dispatch hook
    pub dispatch: Option<String>,
    #[serde(default)]
    pub asynchronous: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub identifier: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    pub filenames: Option<Vec<String>>,
    pub destination: String,
    #[serde(default)]
    pub parameters: serde_yaml::Mapping,
    /// In days; absent means never re-fetch
    pub max_age: Option<f64>,
}

/// Candidate values of one parameter, as written in the config.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ParameterSpec {
    List(Vec<serde_yaml::Value>),
    DateRange { date_range: DateRange },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DateRange {
    beg: NaiveDate,
    end: NaiveDate,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("while reading config file {path:?}"))?;
        Self::parse(&text).with_context(|| format!("while parsing config file {path:?}"))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        check_unique(config.tasks.iter().map(|t| t.identifier.as_str()))?;
        check_unique(config.sources.iter().map(|s| s.identifier.as_str()))?;
        Ok(config)
    }

    /// Build task definitions, in config order.
    /// If `filter` is non-empty, only the definitions it names are built.
    pub fn definitions(&self, registry: &Registry, filter: &[String]) -> Result<Vec<TaskDefinition>> {
        let mut defs = Vec::with_capacity(self.tasks.len());
        for task in &self.tasks {
            if !filter.is_empty() && !filter.contains(&task.identifier) {
                log::debug!("skipping task {}", task.identifier);
                continue;
            }
            let def = task
                .to_definition(registry)
                .with_context(|| format!("while loading task \"{}\"", task.identifier))?;
            defs.push(def);
        }
        for name in filter {
            if !self.tasks.iter().any(|t| &t.identifier == name) {
                anyhow::bail!("No task named \"{name}\" in config");
            }
        }
        Ok(defs)
    }

    pub fn sources(&self) -> Result<Vec<Source>> {
        self.sources
            .iter()
            .map(|s| {
                s.to_source()
                    .with_context(|| format!("while loading source \"{}\"", s.identifier))
            })
            .collect()
    }
}

impl TaskConfig {
    fn to_definition(&self, registry: &Registry) -> Result<TaskDefinition> {
        let mut def = TaskDefinition::new(&self.identifier, registry.operation(&self.run)?)
            .with_description(&self.description)
            .with_arguments(to_mapping(&self.arguments)?)
            .with_parameters(to_domain(&self.parameters)?)
            .asynchronous(self.asynchronous);
        if let Some(hook) = &self.dispatch {
            def = def.with_dispatch(registry.hook(hook)?);
        }
        Ok(def)
    }
}

impl SourceConfig {
    fn to_source(&self) -> Result<Source> {
        let max_age = match self.max_age {
            Some(days) => MaxAge::days(days)?,
            None => MaxAge::Unbounded,
        };
        let mut source = Source::new(&self.identifier, &self.url, &self.destination)
            .with_description(&self.description)
            .with_parameters(to_domain(&self.parameters)?)
            .with_max_age(max_age);
        if let Some(filenames) = &self.filenames {
            source = source.with_filenames(filenames.clone());
        }
        Ok(source)
    }
}

fn check_unique<'a>(ids: impl Iterator<Item = &'a str>) -> Result<(), Error> {
    let mut seen = HashSet::default();
    for id in ids {
        if !seen.insert(id) {
            return Err(Error::DuplicateIdentifier(id.to_owned()));
        }
    }
    Ok(())
}

fn to_domain(yaml: &serde_yaml::Mapping) -> Result<ParameterDomain> {
    let mut domain = ParameterDomain::new();
    for (name, spec) in yaml {
        let name = key_to_string(name)?;
        let spec: ParameterSpec = serde_yaml::from_value(spec.clone())
            .with_context(|| format!("parameter \"{name}\" must be a list or a date_range"))?;
        let values: Vec<Value> = match spec {
            ParameterSpec::List(items) => items.iter().map(to_value).collect::<Result<_, _>>()?,
            ParameterSpec::DateRange { date_range } => {
                if date_range.end < date_range.beg {
                    return Err(Error::EmptyDateRange(name).into());
                }
                GpsDate::range(date_range.beg.into(), date_range.end.into())
                    .into_iter()
                    .map(Value::Date)
                    .collect()
            }
        };
        domain.insert(name, values)?;
    }
    Ok(domain)
}

fn to_mapping(yaml: &serde_yaml::Mapping) -> Result<Mapping, Error> {
    let mut map = Mapping::with_capacity(yaml.len());
    for (k, v) in yaml {
        map.insert(key_to_string(k)?, to_value(v)?);
    }
    Ok(map)
}

fn key_to_string(key: &serde_yaml::Value) -> Result<String, Error> {
    match key {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        other => Err(Error::NonStringKey(other.clone())),
    }
}

/// Convert a plain YAML value. Dates are not recognized here:
/// only `date_range` parameters produce date values.
fn to_value(yaml: &serde_yaml::Value) -> Result<Value, Error> {
    use serde_yaml::Value as Yaml;
    Ok(match yaml {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(*b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if n.is_f64() {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            } else {
                return Err(Error::NumberOutOfRange(n.clone()));
            }
        }
        Yaml::String(s) => Value::Str(s.clone()),
        Yaml::Sequence(items) => Value::List(items.iter().map(to_value).collect::<Result<_, _>>()?),
        Yaml::Mapping(map) => Value::Map(to_mapping(map)?),
        Yaml::Tagged(tagged) => return Err(Error::UnsupportedTag(tagged.tag.to_string())),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use tasks::Runnable;

    const CONFIG: &str = r#"
tasks:
  - identifier: compress
    description: Gzip daily observation files
    run: echo
    arguments: { fname: "data/{date.year}/{station}{date.doy:03d}0.obs", keep: true, level: 6 }
    parameters:
      date: { date_range: { beg: 2024-01-01, end: 2024-01-03 } }
      station: [ONSA, WTZR]
    asynchronous: true
sources:
  - identifier: orbits
    url: "ftp://ftp.aiub.unibe.ch/CODE/{date.year}"
    filenames: ["COD{date.gpsweek}{date.gpsweekday}.EPH.Z"]
    destination: "campaign/ORB"
    parameters: { date: { date_range: { beg: 2024-01-01, end: 2024-01-02 } } }
    max_age: 1.5
"#;

    fn registry() -> Result<Registry> {
        let mut reg = Registry::new();
        reg.add_operation("echo", |args: &Mapping| -> Result<Value> {
            Ok(Value::Map(args.clone()))
        })?;
        Ok(reg)
    }

    #[test]
    fn test_parse() -> Result<()> {
        let config = Config::parse(CONFIG)?;
        let mut defs = config.definitions(&registry()?, &[])?;
        assert_eq!(defs.len(), 1);

        let def = &mut defs[0];
        assert!(def.is_asynchronous());
        assert_eq!(def.description(), "Gzip daily observation files");
        assert_eq!(def.parameters().names().collect::<Vec<_>>(), ["date", "station"]);
        assert_eq!(def.parameters().get("date").map(<[_]>::len), Some(3));
        assert_eq!(def.arguments().get("keep"), Some(&Value::Bool(true)));
        assert_eq!(def.arguments().get("level"), Some(&Value::Int(6)));

        let tasks = def.tasks()?;
        assert_eq!(tasks.len(), 6);
        assert_eq!(
            tasks[1].arguments().get("fname"),
            Some(&Value::from("data/2024/WTZR0010.obs"))
        );

        let sources = config.sources()?;
        assert_eq!(sources[0].max_age(), MaxAge::Days(1.5));
        assert_eq!(sources[0].resolve()?.len(), 2);
        Ok(())
    }

    #[test]
    fn test_plain_dates_stay_strings() -> Result<()> {
        let config = Config::parse(
            "tasks:\n  - identifier: t\n    run: echo\n    parameters: { day: [2024-01-01] }\n",
        )?;
        let defs = config.definitions(&registry()?, &[])?;
        assert_eq!(
            defs[0].parameters().get("day"),
            Some(&[Value::from("2024-01-01")][..])
        );
        Ok(())
    }

    #[test]
    fn test_task_filter() -> Result<()> {
        let config = Config::parse(CONFIG)?;
        let reg = registry()?;
        assert_eq!(config.definitions(&reg, &["compress".to_owned()])?.len(), 1);
        assert!(config.definitions(&reg, &["nope".to_owned()]).is_err());
        Ok(())
    }

    #[test]
    fn test_errors() -> Result<()> {
        let reg = registry()?;

        let unknown_op = Config::parse("tasks:\n  - identifier: t\n    run: nope\n")?;
        assert!(unknown_op.definitions(&reg, &[]).is_err());

        let dup = Config::parse(
            "tasks:\n  - identifier: t\n    run: echo\n  - identifier: t\n    run: echo\n",
        );
        assert!(dup.is_err());

        let bad_param = Config::parse(
            "tasks:\n  - identifier: t\n    run: echo\n    parameters: { x: 3 }\n",
        )?;
        assert!(bad_param.definitions(&reg, &[]).is_err());

        let reversed = Config::parse(
            "tasks:\n  - identifier: t\n    run: echo\n    parameters: { d: { date_range: { beg: 2024-01-02, end: 2024-01-01 } } }\n",
        )?;
        assert!(reversed.definitions(&reg, &[]).is_err());

        let negative_age = Config::parse(
            "sources:\n  - identifier: s\n    url: https://example.com/\n    destination: d\n    max_age: -1\n",
        )?;
        assert!(negative_age.sources().is_err());

        assert!(Config::parse("tasks: []\nunknown: 1\n").is_err());
        Ok(())
    }
}
