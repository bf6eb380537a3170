use std::fmt;

use serde_json::Value;

use super::template::Template;

/// Caller-supplied acceptance check applied to every parsed value.
///
/// `Ok(false)` rejects the value. `Err` carries a description of why the check could
/// not be made; the value is dropped in that case too.
pub type Predicate = Box<dyn Fn(&Value) -> Result<bool, String> + Send + Sync>;

/// Why a parsed value was kept or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    Accepted,
    TemplateMismatch,
    PredicateRejected,
    PredicateFailed,
}

/// Template check followed by the predicate; either may be absent.
pub(crate) struct ObjectValidator<'a> {
    pub(crate) template: Option<&'a Template>,
    pub(crate) predicate: Option<&'a Predicate>,
}

impl ObjectValidator<'_> {
    pub(crate) fn judge(&self, value: &Value) -> Verdict {
        if let Some(template) = self.template {
            if !template.matches(value) {
                return Verdict::TemplateMismatch;
            }
        }
        if let Some(predicate) = self.predicate {
            match predicate(value) {
                Ok(true) => {}
                Ok(false) => return Verdict::PredicateRejected,
                Err(error) => {
                    tracing::debug!(%error, "validator failed on parsed JSON value");
                    return Verdict::PredicateFailed;
                }
            }
        }
        Verdict::Accepted
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Accepted => "accepted",
            Self::TemplateMismatch => "template mismatch",
            Self::PredicateRejected => "rejected by validator",
            Self::PredicateFailed => "validator error",
        })
    }
}
