// Error reporting utilities
// Emits the accumulated codes of a transaction as structured log events.

use crate::context::ErrorContexts;

#[derive(Debug, Clone, Default)]
pub struct ErrorReporter {
    component: String,
}

impl ErrorReporter {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    /// Logs every accumulated code and returns how many were reported.
    pub fn report(&self, transaction_id: &str, contexts: &ErrorContexts) -> usize {
        let mut reported = 0;
        for context in contexts.non_empty() {
            for code in context.codes().iter() {
                tracing::warn!(
                    component = %self.component,
                    transaction_id = transaction_id,
                    context = %context.kind(),
                    error_code = code.id(),
                    "KIM error recorded: {}",
                    code.text()
                );
                reported += 1;
            }
        }
        if reported == 0 {
            tracing::debug!(component = %self.component, transaction_id = transaction_id, "no KIM errors recorded");
        }
        reported
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::*;
    use crate::context::ErrorContextKind;

    #[test]
    fn test_report_counts_codes_across_contexts() {
        let mut contexts = ErrorContexts::new();
        contexts.accumulate(ErrorContextKind::Decrypt, CODE_4009);
        contexts.accumulate(ErrorContextKind::Decrypt, CODE_X021);
        contexts.address_cert.add("a@b.de", CODE_X005, false);

        let reporter = ErrorReporter::new("pop3");
        assert_eq!(reporter.report("tx-1", &contexts), 3);
        assert_eq!(reporter.report("tx-2", &ErrorContexts::new()), 0);
    }
}
