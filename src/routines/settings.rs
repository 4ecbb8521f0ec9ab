use anyhow::Result;
use serde::{Deserialize, Serialize};

fn default_tol() -> f64 {
    1e-6
}

fn default_maxiters() -> usize {
    5000
}

fn default_alpha0() -> f64 {
    1.0
}

fn default_log_level() -> String {
    String::from("info")
}

/// Which optimizer driver to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    /// Serial Riemannian conjugate gradient
    Rcg,
    /// RCG partitioned over a communicator group
    RcgParallel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub algorithm: Algorithm,
    /// Convergence tolerance on the bound improvement
    #[serde(default = "default_tol")]
    pub tol: f64,
    /// Iteration budget; exhausting it is not an error
    #[serde(default = "default_maxiters")]
    pub maxiters: usize,
    /// Symmetric Dirichlet prior concentration
    #[serde(default = "default_alpha0")]
    pub alpha0: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Log {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file; `None` logs to stderr only
    #[serde(default)]
    pub file: Option<String>,
}

/// Run options for the weight estimation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    config: Config,
    log: Log,
}

impl Settings {
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn log(&self) -> &Log {
        &self.log
    }

    pub fn set_tol(&mut self, tol: f64) {
        self.config.tol = tol;
    }

    pub fn set_maxiters(&mut self, maxiters: usize) {
        self.config.maxiters = maxiters;
    }

    pub fn set_algorithm(&mut self, algorithm: Algorithm) {
        self.config.algorithm = algorithm;
    }

    /// Read settings from a TOML file, with `MIXCORE_`-prefixed environment
    /// variables overriding the file values.
    pub fn from_file(path: &str) -> Result<Self> {
        let parsed = config::Config::builder()
            .add_source(config::File::with_name(path).format(config::FileFormat::Toml))
            .add_source(config::Environment::with_prefix("MIXCORE").separator("_"))
            .build()?;
        let settings: Settings = parsed.try_deserialize()?;
        Ok(settings)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            config: Config {
                algorithm: Algorithm::Rcg,
                tol: default_tol(),
                maxiters: default_maxiters(),
                alpha0: default_alpha0(),
            },
            log: Log {
                level: default_log_level(),
                file: None,
            },
        }
    }
}

#[derive(Default)]
pub struct SettingsBuilder {
    algorithm: Option<Algorithm>,
    tol: Option<f64>,
    maxiters: Option<usize>,
    alpha0: Option<f64>,
    log_level: Option<String>,
    log_file: Option<String>,
}

impl SettingsBuilder {
    pub fn set_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    pub fn set_tol(mut self, tol: f64) -> Self {
        self.tol = Some(tol);
        self
    }

    pub fn set_maxiters(mut self, maxiters: usize) -> Self {
        self.maxiters = Some(maxiters);
        self
    }

    pub fn set_alpha0(mut self, alpha0: f64) -> Self {
        self.alpha0 = Some(alpha0);
        self
    }

    pub fn set_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    pub fn set_log_file(mut self, file: impl Into<String>) -> Self {
        self.log_file = Some(file.into());
        self
    }

    pub fn build(self) -> Settings {
        Settings {
            config: Config {
                algorithm: self.algorithm.unwrap_or(Algorithm::Rcg),
                tol: self.tol.unwrap_or_else(default_tol),
                maxiters: self.maxiters.unwrap_or_else(default_maxiters),
                alpha0: self.alpha0.unwrap_or_else(default_alpha0),
            },
            log: Log {
                level: self.log_level.unwrap_or_else(default_log_level),
                file: self.log_file,
            },
        }
    }
}
