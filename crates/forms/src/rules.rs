//! Field-level validation rules.

use std::sync::Arc;

use formtree_core::Value;

/// Custom check: `Err(message)` marks the field invalid.
pub type CustomCheck = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Bounds and options of a numericality rule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Numericality {
    pub allow_blank: bool,
    pub only_integer: bool,
    pub greater_than: Option<f64>,
    pub greater_than_or_equal_to: Option<f64>,
    pub less_than: Option<f64>,
    pub less_than_or_equal_to: Option<f64>,
}

impl Numericality {
    pub fn allow_blank(mut self) -> Self {
        self.allow_blank = true;
        self
    }

    pub fn only_integer(mut self) -> Self {
        self.only_integer = true;
        self
    }

    pub fn greater_than(mut self, bound: f64) -> Self {
        self.greater_than = Some(bound);
        self
    }

    pub fn at_least(mut self, bound: f64) -> Self {
        self.greater_than_or_equal_to = Some(bound);
        self
    }

    pub fn less_than(mut self, bound: f64) -> Self {
        self.less_than = Some(bound);
        self
    }

    pub fn at_most(mut self, bound: f64) -> Self {
        self.less_than_or_equal_to = Some(bound);
        self
    }

    fn check(&self, value: &Value, out: &mut Vec<String>) {
        if value.is_blank() && self.allow_blank {
            return;
        }
        let Some(n) = value.as_number() else {
            out.push("is not a number".to_string());
            return;
        };
        if self.only_integer && n.fract() != 0.0 {
            out.push("must be an integer".to_string());
        }
        if let Some(b) = self.greater_than.filter(|b| n <= *b) {
            out.push(format!("must be greater than {b}"));
        }
        if let Some(b) = self.greater_than_or_equal_to.filter(|b| n < *b) {
            out.push(format!("must be greater than or equal to {b}"));
        }
        if let Some(b) = self.less_than.filter(|b| n >= *b) {
            out.push(format!("must be less than {b}"));
        }
        if let Some(b) = self.less_than_or_equal_to.filter(|b| n > *b) {
            out.push(format!("must be less than or equal to {b}"));
        }
    }
}

/// One validation declared on a property, evaluated in declaration order.
#[derive(Clone)]
pub enum Rule {
    Presence,
    Numericality(Numericality),
    Inclusion { values: Vec<Value>, allow_blank: bool },
    Length { min: Option<usize>, max: Option<usize> },
    Custom { name: String, check: CustomCheck },
}

impl Rule {
    pub fn presence() -> Self {
        Self::Presence
    }

    pub fn numericality(options: Numericality) -> Self {
        Self::Numericality(options)
    }

    /// Optional number within `min..=max`.
    pub fn range(min: f64, max: f64) -> Self {
        Self::Numericality(Numericality::default().allow_blank().at_least(min).at_most(max))
    }

    pub fn inclusion<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Inclusion {
            values: values.into_iter().map(Into::into).collect(),
            allow_blank: false,
        }
    }

    pub fn length(min: Option<usize>, max: Option<usize>) -> Self {
        Self::Length { min, max }
    }

    pub fn custom<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        Self::Custom {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// Error messages this rule produces for `value` (empty when it passes).
    pub fn check(&self, value: &Value) -> Vec<String> {
        let mut out = Vec::new();
        match self {
            Self::Presence => {
                if value.is_blank() {
                    out.push("can't be blank".to_string());
                }
            }
            Self::Numericality(opts) => opts.check(value, &mut out),
            Self::Inclusion { values, allow_blank } => {
                if !(value.is_blank() && *allow_blank) && !includes(values, value) {
                    out.push("is not included in the list".to_string());
                }
            }
            Self::Length { min, max } => {
                if let Some(s) = value.as_text() {
                    let len = s.chars().count();
                    if let Some(min) = min.filter(|m| len < *m) {
                        out.push(format!("is too short (minimum is {min} characters)"));
                    }
                    if let Some(max) = max.filter(|m| len > *m) {
                        out.push(format!("is too long (maximum is {max} characters)"));
                    }
                }
            }
            Self::Custom { check, .. } => {
                if let Err(msg) = check(value) {
                    out.push(msg);
                }
            }
        }
        out
    }
}

fn includes(values: &[Value], value: &Value) -> bool {
    values
        .iter()
        .any(|v| v == value || (!value.is_null() && v.to_string() == value.to_string()))
}

impl core::fmt::Debug for Rule {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Presence => f.write_str("Presence"),
            Self::Numericality(n) => f.debug_tuple("Numericality").field(n).finish(),
            Self::Inclusion { values, allow_blank } => f
                .debug_struct("Inclusion")
                .field("values", values)
                .field("allow_blank", allow_blank)
                .finish(),
            Self::Length { min, max } => f
                .debug_struct("Length")
                .field("min", min)
                .field("max", max)
                .finish(),
            Self::Custom { name, .. } => f.debug_struct("Custom").field("name", name).finish(),
        }
    }
}
