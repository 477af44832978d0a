use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use serde::Deserialize;
use stampede_core::TestCase;
use stampede_core::runner::{OnUnreachable, ProbeConfig, RunConfig, Stage};

/// Top-level layout of a run file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct RunFileYaml {
    pub base_url: String,

    /// Unit applied to bare-number durations.
    #[serde(default)]
    pub time_unit: Option<YamlDuration>,

    #[serde(default)]
    pub request_timeout: Option<YamlDuration>,
    #[serde(default)]
    pub think_time: Option<YamlDuration>,
    #[serde(default)]
    pub response_time_threshold: Option<YamlDuration>,
    #[serde(default)]
    pub tick: Option<YamlDuration>,

    #[serde(default)]
    pub on_unreachable: Option<String>,

    #[serde(default)]
    pub probes: Option<ProbesYaml>,

    #[serde(default)]
    pub tests: Vec<TestCaseYaml>,

    #[serde(default)]
    pub stages: Vec<StageYaml>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct ProbesYaml {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub load_threshold: Option<YamlDuration>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct TestCaseYaml {
    pub name: String,
    #[serde(default)]
    pub method: Option<String>,
    pub url: String,
    pub expect: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct StageYaml {
    pub duration: YamlDuration,
    pub target: u64,
}

/// A duration as written in YAML: a humantime string, or a bare number of time units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum YamlDuration {
    Exact(Duration),
    Units(f64),
}

impl YamlDuration {
    fn resolve(self, unit: Duration) -> anyhow::Result<Duration> {
        match self {
            Self::Exact(d) => Ok(d),
            Self::Units(n) => Duration::try_from_secs_f64(unit.as_secs_f64() * n)
                .with_context(|| format!("duration of {n} time units is out of range")),
        }
    }
}

impl<'de> Deserialize<'de> for YamlDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl<'de> serde::de::Visitor<'de> for V {
            type Value = YamlDuration;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("duration as string (e.g. 10s, 250ms) or a number of time units")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(YamlDuration::Units(v as f64))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if v < 0 {
                    return Err(E::custom("duration must not be negative"));
                }
                Ok(YamlDuration::Units(v as f64))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if !v.is_finite() || v < 0.0 {
                    return Err(E::custom("duration must be a non-negative, finite number"));
                }
                Ok(YamlDuration::Units(v))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let v = v.trim();
                // Quoted bare numbers ('5') are time units, like unquoted ones.
                if let Ok(units) = v.parse::<f64>() {
                    return self.visit_f64(units);
                }
                let d = humantime::parse_duration(v).map_err(E::custom)?;
                Ok(YamlDuration::Exact(d))
            }

            fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                self.visit_str(&v)
            }
        }

        deserializer.deserialize_any(V)
    }
}

pub(crate) async fn load_run_config(path: &Path) -> anyhow::Result<RunConfig> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    parse_run_config(&raw).with_context(|| format!("invalid config: {}", path.display()))
}

pub(crate) fn parse_run_config(raw: &str) -> anyhow::Result<RunConfig> {
    let doc: RunFileYaml = serde_yaml::from_str(raw).context("failed to parse YAML")?;
    doc.into_run_config()
}

impl RunFileYaml {
    fn into_run_config(self) -> anyhow::Result<RunConfig> {
        let unit = match self.time_unit {
            Some(YamlDuration::Exact(d)) if !d.is_zero() => d,
            Some(_) => anyhow::bail!("`timeUnit` must be a positive duration string (e.g. 1s)"),
            None => Duration::from_secs(1),
        };
        let resolve = |d: YamlDuration, key: &str| {
            d.resolve(unit).with_context(|| format!("invalid `{key}`"))
        };

        let tests = self
            .tests
            .into_iter()
            .map(|t| {
                let method = parse_method(t.method.as_deref())
                    .with_context(|| format!("test case `{}`", t.name))?;
                Ok(TestCase::new(t.name, method, t.url, t.expect))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let stages = self
            .stages
            .into_iter()
            .enumerate()
            .map(|(idx, s)| {
                let duration = resolve(s.duration, &format!("stages[{idx}].duration"))?;
                Ok(Stage::new(duration, s.target))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let mut cfg = RunConfig::new(self.base_url, tests, stages);

        if let Some(d) = self.request_timeout {
            cfg.request_timeout = Some(resolve(d, "requestTimeout")?);
        }
        if let Some(d) = self.think_time {
            cfg.think_time = resolve(d, "thinkTime")?;
        }
        if let Some(d) = self.response_time_threshold {
            cfg.response_time_threshold = resolve(d, "responseTimeThreshold")?;
        }
        if let Some(d) = self.tick {
            cfg.tick = resolve(d, "tick")?;
        }
        if let Some(v) = self.on_unreachable {
            cfg.on_unreachable = v.trim().parse::<OnUnreachable>().map_err(|_| {
                anyhow::anyhow!("`onUnreachable` must be `abort` or `continue`, got `{v}`")
            })?;
        }
        if let Some(p) = self.probes {
            let mut probes = ProbeConfig::default();
            if let Some(path) = p.path {
                probes.path = path;
            }
            if let Some(d) = p.load_threshold {
                probes.load_threshold = resolve(d, "probes.loadThreshold")?;
            }
            cfg.probes = probes;
        }

        Ok(cfg)
    }
}

fn parse_method(raw: Option<&str>) -> anyhow::Result<http::Method> {
    let Some(raw) = raw else {
        return Ok(http::Method::GET);
    };
    let upper = raw.trim().to_ascii_uppercase();
    http::Method::from_bytes(upper.as_bytes())
        .with_context(|| format!("invalid http method `{raw}`"))
}
