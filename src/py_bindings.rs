use crate::config::{
    DomainConfig, LengthBonus, SuggestConfig, DEFAULT_BEAM_LENGTH, DEFAULT_BEAM_WIDTH,
    DEFAULT_FIRST_WORD_BEAM_WIDTH, DEFAULT_MAX_RETRIES, DEFAULT_NUM_SUGGESTIONS,
    DEFAULT_SAMPLE_LENGTH,
};
use crate::engine::{KeyPress, Registry, Suggester, Suggestion, SuggestionRequest};
use crate::error::{Result, SuggestError};
use crate::tokenize;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

impl From<SuggestError> for PyErr {
    fn from(err: SuggestError) -> Self {
        match err {
            SuggestError::MalformedContext(_)
            | SuggestError::UnknownDomain(_)
            | SuggestError::InvalidParameter(_) => PyValueError::new_err(err.to_string()),
            _ => PyRuntimeError::new_err(err.to_string()),
        }
    }
}

fn latency_budget_from_secs(seconds: f64) -> Result<Duration> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(SuggestError::InvalidParameter(
            "latency_budget must be a finite, non-negative number of seconds.".to_string(),
        ));
    }
    Ok(Duration::from_secs_f64(seconds))
}

fn panic_payload_to_string(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic payload".to_string()
}

#[derive(FromPyObject)]
enum KeyArg {
    Letter(char),
    Tap((f64, f64)),
}

impl From<KeyArg> for KeyPress {
    fn from(key: KeyArg) -> Self {
        match key {
            KeyArg::Letter(c) => KeyPress::Letter(c),
            KeyArg::Tap((x, y)) => KeyPress::Tap { x, y },
        }
    }
}

#[pyclass(frozen, name = "Suggestion")]
#[derive(Clone, Debug, PartialEq)]
pub struct PySuggestion {
    #[pyo3(get)]
    first_word: Vec<String>,
    #[pyo3(get)]
    continuation: Vec<String>,
    #[pyo3(get)]
    probabilities: Option<Vec<f64>>,
}

impl From<Suggestion> for PySuggestion {
    fn from(s: Suggestion) -> Self {
        Self {
            first_word: s.first_word,
            continuation: s.continuation,
            probabilities: s.probabilities,
        }
    }
}

#[pymethods]
impl PySuggestion {
    fn __repr__(&self) -> String {
        format!(
            "Suggestion(first_word={:?}, continuation={:?}, probabilities={:?})",
            self.first_word, self.continuation, self.probabilities
        )
    }
}

#[pyclass(frozen, name = "Suggester")]
pub struct PySuggester {
    inner: Suggester,
}

#[pymethods]
impl PySuggester {
    #[new]
    #[pyo3(signature = (
        domains,
        num_suggestions=DEFAULT_NUM_SUGGESTIONS,
        beam_width=DEFAULT_BEAM_WIDTH,
        first_word_beam_width=DEFAULT_FIRST_WORD_BEAM_WIDTH,
        beam_length=DEFAULT_BEAM_LENGTH,
        sample_length=DEFAULT_SAMPLE_LENGTH,
        latency_budget=0.3,
        length_bonus=None,
        pos_weights=None,
        max_retries=DEFAULT_MAX_RETRIES,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        py: Python<'_>,
        domains: Vec<(String, String)>,
        num_suggestions: usize,
        beam_width: usize,
        first_word_beam_width: usize,
        beam_length: usize,
        sample_length: usize,
        latency_budget: f64,
        length_bonus: Option<f64>,
        pos_weights: Option<Vec<f64>>,
        max_retries: usize,
    ) -> PyResult<Self> {
        let config = SuggestConfig {
            num_suggestions,
            beam_width,
            first_word_beam_width,
            beam_length,
            sample_length,
            latency_budget: latency_budget_from_secs(latency_budget)?,
            length_bonus: length_bonus.map(LengthBonus::new),
            pos_weights,
            max_retries,
        };
        config.validate()?;

        let configs = domains
            .iter()
            .map(|(name, basename)| DomainConfig::from_basename(name.as_str(), basename))
            .collect::<Vec<_>>();
        let registry = py.allow_threads(|| Registry::load(&configs))?;
        let inner = Suggester::new(Arc::new(registry), config)?;
        Ok(Self { inner })
    }

    fn domains(&self) -> Vec<String> {
        self.inner
            .registry()
            .names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    #[pyo3(signature = (
        text_so_far,
        domain,
        current_word=None,
        rare_word_bonus=0.0,
        use_corpus_constraint=false,
        temperature=0.0,
        seed=None,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn suggest(
        &self,
        py: Python<'_>,
        text_so_far: String,
        domain: String,
        current_word: Option<Vec<KeyArg>>,
        rare_word_bonus: f64,
        use_corpus_constraint: bool,
        temperature: f64,
        seed: Option<u64>,
    ) -> PyResult<Vec<PySuggestion>> {
        let request = SuggestionRequest {
            text_so_far,
            current_word: current_word
                .unwrap_or_default()
                .into_iter()
                .map(KeyPress::from)
                .collect(),
            domain,
            rare_word_bonus,
            use_corpus_constraint,
            temperature,
            seed,
        };
        let result = py.allow_threads(|| {
            catch_unwind(AssertUnwindSafe(|| self.inner.suggest(&request)))
                .map_err(panic_payload_to_string)
        });
        let suggestions = result.map_err(|message| {
            PyRuntimeError::new_err(format!("suggestion engine panicked during suggest(): {message}"))
        })??;
        Ok(suggestions.into_iter().map(PySuggestion::from).collect())
    }
}

#[pyfunction]
fn tokenize_so_far(text: &str) -> PyResult<Vec<String>> {
    Ok(tokenize::tokenize_so_far(text)?)
}

#[pymodule(gil_used = true)]
fn _core(_py: Python<'_>, module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<PySuggester>()?;
    module.add_class::<PySuggestion>()?;
    module.add_function(wrap_pyfunction!(tokenize_so_far, module)?)?;
    module.add("DEFAULT_BEAM_WIDTH", DEFAULT_BEAM_WIDTH)?;
    module.add("DEFAULT_BEAM_LENGTH", DEFAULT_BEAM_LENGTH)?;
    Ok(())
}
