//! Scriptable [`Typesetter`] for tests.
//!
//! Available in this crate's tests and, behind the `mock` feature, to
//! downstream crates exercising the pipeline without a real engine.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::{EngineError, TexOptions, Typesetter};

type ResponseFn = Box<dyn FnMut(&str, &TexOptions) -> Result<String, EngineError> + Send>;

/// Test double for the external engine.
///
/// Records every document it is asked to typeset and produces responses
/// from a caller-supplied closure. An optional per-call delay makes timing
/// assertions (queue ordering, single-flight) possible.
pub struct MockTypesetter {
    response: ResponseFn,
    delay: Duration,
    load_error: Option<String>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockTypesetter {
    /// Mock that answers every call with the same markup.
    #[must_use]
    pub fn fixed(markup: &str) -> Self {
        let markup = markup.to_owned();
        Self::with_response(move |_, _| Ok(markup.clone()))
    }

    /// Mock whose responses come from `response`.
    #[must_use]
    pub fn with_response(
        response: impl FnMut(&str, &TexOptions) -> Result<String, EngineError> + Send + 'static,
    ) -> Self {
        Self {
            response: Box::new(response),
            delay: Duration::ZERO,
            load_error: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Mock whose `load` fails with the given reason.
    #[must_use]
    pub fn failing_load(reason: &str) -> Self {
        let mut mock = Self::fixed("<svg/>");
        mock.load_error = Some(reason.to_owned());
        mock
    }

    /// Sleep this long inside every `texify` call.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Shared log of every document passed to `texify`, in call order.
    #[must_use]
    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }
}

impl Typesetter for MockTypesetter {
    fn load(&mut self, _asset_root: &Path) -> Result<(), EngineError> {
        match &self.load_error {
            Some(reason) => Err(EngineError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    fn texify(&mut self, document: &str, options: &TexOptions) -> Result<String, EngineError> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.calls
            .lock()
            .unwrap()
            .push(document.to_owned());
        (self.response)(document, options)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_fixed_response() {
        let mut mock = MockTypesetter::fixed("<svg>x</svg>");
        mock.load(Path::new("assets")).unwrap();

        let markup = mock.texify("doc", &TexOptions::default()).unwrap();
        assert_eq!(markup, "<svg>x</svg>");
    }

    #[test]
    fn test_records_calls_in_order() {
        let mut mock = MockTypesetter::fixed("<svg/>");
        let calls = mock.calls();

        mock.texify("first", &TexOptions::default()).unwrap();
        mock.texify("second", &TexOptions::default()).unwrap();

        assert_eq!(*calls.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_failing_load() {
        let mut mock = MockTypesetter::failing_load("no snapshot");
        let err = mock.load(Path::new("assets")).unwrap_err();
        assert!(matches!(err, EngineError::Unavailable(_)));
    }
}
